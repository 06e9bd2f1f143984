// ==========================================
// 表格数据导入系统 - 导入层
// ==========================================
// 职责: 表头 → 操作符绑定,逐行导入,结果汇总
// 支持: Excel, CSV
// ==========================================

// 模块声明
pub mod error;
pub mod file_parser;
pub mod importer_trait;
pub mod inflection;
pub mod loader;
pub mod method_detail;
pub mod method_mapper;
pub mod operator_catalog;
pub mod reporter;
pub mod template_generator;
pub mod value_coercer;

// 重导出核心类型
pub use error::{ErrorCategory, ImportError, ImportResult};
pub use file_parser::{CsvParser, ExcelParser, ParsedFile, UniversalFileParser};
pub use loader::Loader;
pub use method_detail::{FindBy, MethodDetail, ResolvedType};
pub use method_mapper::{HeaderCell, MethodMapper, MethodMapping};
pub use operator_catalog::{Operator, OperatorCatalog, OperatorSet};
pub use reporter::LoadReporter;
pub use template_generator::{TemplateGenerator, TemplateOptions};
pub use value_coercer::DefaultValueCoercer;

// 重导出 Trait 接口
pub use importer_trait::{FileParser, Reporter, ValueCoercer};
