// ==========================================
// 表格数据导入系统 - 配置层
// ==========================================
// 职责: 导入运行选项 + config_kv 配置读取,支持模型级覆写
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod import_config_trait;
pub mod load_options;

pub use config_manager::{config_keys, ConfigManager, ConfigScope};
pub use import_config_trait::ImportConfigReader;
pub use load_options::{LoadOptions, DEFAULT_MULTI_VALUE_DELIMITER};
