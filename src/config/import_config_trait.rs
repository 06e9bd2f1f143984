// ==========================================
// 表格数据导入系统 - 导入配置读取 Trait
// ==========================================
// 职责: 定义导入模块所需的配置读取接口（不包含实现）
// 约定: 返回 None 表示未配置,由 LoadOptions 保留调用方取值
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use std::collections::BTreeMap;
use std::error::Error;

// ==========================================
// ImportConfigReader Trait
// ==========================================
// 用途: 导入模块所需的配置读取接口
// 实现者: ConfigManager（从 config_kv 表读取）
// 作用域: 模型级配置优先于 global
pub trait ImportConfigReader: Send + Sync {
    // ===== 运行模式 =====

    /// 是否试运行
    fn get_dummy_run(&self, model: &str) -> Result<Option<bool>, Box<dyn Error>>;

    /// 是否严格映射
    fn get_strict(&self, model: &str) -> Result<Option<bool>, Box<dyn Error>>;

    /// 是否强制映射全部列
    fn get_include_all(&self, model: &str) -> Result<Option<bool>, Box<dyn Error>>;

    // ===== 列策略 =====

    /// 必填列（逗号分隔存储）
    fn get_mandatory_columns(&self, model: &str) -> Result<Option<Vec<String>>, Box<dyn Error>>;

    /// 强制映射列（逗号分隔存储）
    fn get_force_inclusion(&self, model: &str) -> Result<Option<Vec<String>>, Box<dyn Error>>;

    // ===== 绑定行为 =====

    /// 多值单元格分隔符
    ///
    /// # 默认值
    /// - "|"
    fn get_multi_value_delimiter(&self, model: &str) -> Result<Option<String>, Box<dyn Error>>;

    /// 关联记录不存在时是否自动创建
    ///
    /// # 默认值
    /// - true
    fn get_create_missing_associations(&self, model: &str)
        -> Result<Option<bool>, Box<dyn Error>>;

    /// 额外日期格式（分号分隔存储）
    fn get_date_formats(&self, model: &str) -> Result<Option<Vec<String>>, Box<dyn Error>>;

    /// 操作符默认值（键 `default/<operator>`）
    fn get_default_values(&self, model: &str) -> Result<BTreeMap<String, String>, Box<dyn Error>>;
}
