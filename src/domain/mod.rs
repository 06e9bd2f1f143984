// ==========================================
// 表格数据导入系统 - 领域模型层
// ==========================================
// 职责: 定义目标模型描述、对象实例、值类型、导入报告
// 红线: 不含数据访问逻辑,不含导入流程逻辑
// ==========================================

pub mod model;
pub mod record;
pub mod report;
pub mod types;

// 重导出核心类型
pub use model::{
    AttributeDef, Cardinality, ModelSchema, RelationshipDef, SchemaRegistry, TypeResolver,
    NAMESPACE_SEPARATOR,
};
pub use record::{Record, RecordId, RecordRef};
pub use report::{FailureKind, LoadReport, RowFailure, RowOutcome};
pub use types::{OperatorKind, Value, ValueType};
