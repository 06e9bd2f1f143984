// ==========================================
// 表格数据导入系统 - 持久化层
// ==========================================
// 职责: 提供导入管道的持久化后端
// 红线: 存储层不含映射规则,只做事务与 CRUD
// ==========================================

pub mod error;
pub mod memory_store;
pub mod sqlite_store;
pub mod store_trait;

// 重导出核心类型
pub use error::{StoreError, StoreResult};
pub use memory_store::MemoryStore;
pub use sqlite_store::SqliteStore;
pub use store_trait::{PersistenceBackend, SaveOutcome, TransactionExit};
