// ==========================================
// 表格数据导入系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 表头映射 + 逐行导入（整批事务,行级失败隔离,支持试运行）
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 模型描述与对象实例
pub mod domain;

// 数据仓储层 - 持久化后端
pub mod repository;

// 导入层 - 表头解析与导入管道
pub mod importer;

// 配置层 - 运行选项与 config_kv
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::{
    AttributeDef, Cardinality, LoadReport, ModelSchema, OperatorKind, Record, RecordRef,
    RelationshipDef, RowFailure, SchemaRegistry, TypeResolver, Value, ValueType,
};

// 导入管道
pub use importer::{
    ImportError, ImportResult, Loader, MethodDetail, MethodMapper, MethodMapping,
    OperatorCatalog, TemplateGenerator, TemplateOptions,
};

// 持久化后端
pub use repository::{MemoryStore, PersistenceBackend, SqliteStore, StoreError};

// 配置
pub use config::{ConfigManager, LoadOptions};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "表格数据导入系统";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
