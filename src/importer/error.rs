// ==========================================
// 表格数据导入系统 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 分类: 配置错误 / 映射错误 / 绑定错误 / 保存错误 / 致命错误
// ==========================================

use crate::repository::StoreError;
use thiserror::Error;

// ==========================================
// ErrorCategory - 错误处理分类
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// 运行前失败（操作符类型非法、必填列缺失）
    Configuration,
    /// 严格模式下表头无法映射
    Mapping,
    /// 单行绑定失败（行级隔离）
    Bind,
    /// 单行保存被拒绝（行级隔离）
    Save,
    /// 逃逸出行级隔离的错误，整批回滚
    Fatal,
}

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 文件相关错误 =====
    #[error("文件不存在: {0}")]
    FileNotFound(String),

    #[error("文件格式不支持: {0}（仅支持 .xlsx/.xls/.csv）")]
    UnsupportedFormat(String),

    #[error("文件读取失败: {0}")]
    FileReadError(String),

    #[error("Excel 解析失败: {0}")]
    ExcelParseError(String),

    #[error("CSV 解析失败: {0}")]
    CsvParseError(String),

    #[error("文件缺少表头行")]
    MissingHeader,

    // ===== 配置错误 =====
    #[error("不支持的操作符类型: {0}")]
    UnsupportedOperatorKind(String),

    #[error("缺少必填列: {}", .0.join(", "))]
    MissingMandatoryColumns(Vec<String>),

    #[error("未注册的模型: {0}")]
    UnknownModel(String),

    #[error("必填列无法映射到模型 {model}: {column}")]
    MandatoryColumnUnbound { model: String, column: String },

    #[error("配置值格式错误 (key: {key}, value: {value}): {message}")]
    ConfigValueError {
        key: String,
        value: String,
        message: String,
    },

    #[error("配置读取失败: {0}")]
    ConfigReadError(String),

    // ===== 映射错误 =====
    #[error("表头无法映射 (列 {index}, 模型 {model}): {column}")]
    UnmappedColumn {
        model: String,
        column: String,
        index: usize,
    },

    // ===== 绑定错误 =====
    #[error("类型转换失败 (行 {row}, 字段 {field}): {message}")]
    TypeConversionError {
        row: usize,
        field: String,
        message: String,
    },

    #[error("日期格式错误 (行 {row}, 字段 {field}): 无法识别 {value}")]
    DateFormatError {
        row: usize,
        field: String,
        value: String,
    },

    #[error("关联解析失败 (行 {row}, 字段 {field}): {message}")]
    AssociationError {
        row: usize,
        field: String,
        message: String,
    },

    // ===== 保存错误 =====
    #[error("保存被拒绝 (行 {row}): {}", .messages.join("; "))]
    SaveRejected { row: usize, messages: Vec<String> },

    // ===== 存储错误 =====
    #[error(transparent)]
    Store(#[from] StoreError),

    // ===== 通用错误 =====
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ImportError {
    /// 错误处理分类
    pub fn category(&self) -> ErrorCategory {
        match self {
            ImportError::UnsupportedOperatorKind(_)
            | ImportError::MissingMandatoryColumns(_)
            | ImportError::MandatoryColumnUnbound { .. }
            | ImportError::ConfigValueError { .. }
            | ImportError::ConfigReadError(_)
            | ImportError::UnknownModel(_)
            | ImportError::FileNotFound(_)
            | ImportError::UnsupportedFormat(_)
            | ImportError::FileReadError(_)
            | ImportError::ExcelParseError(_)
            | ImportError::CsvParseError(_)
            | ImportError::MissingHeader => ErrorCategory::Configuration,
            ImportError::UnmappedColumn { .. } => ErrorCategory::Mapping,
            ImportError::TypeConversionError { .. }
            | ImportError::DateFormatError { .. }
            | ImportError::AssociationError { .. } => ErrorCategory::Bind,
            ImportError::SaveRejected { .. } => ErrorCategory::Save,
            ImportError::Store(e) if e.is_constraint() => ErrorCategory::Save,
            ImportError::Store(_) | ImportError::InternalError(_) | ImportError::Other(_) => {
                ErrorCategory::Fatal
            }
        }
    }

    /// 是否可在行边界隔离（记为失败后继续下一行）
    pub fn is_row_recoverable(&self) -> bool {
        matches!(self.category(), ErrorCategory::Bind | ErrorCategory::Save)
    }
}

// 实现 From<std::io::Error>
impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::FileReadError(err.to_string())
    }
}

// 实现 From<csv::Error>
impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::CsvParseError(err.to_string())
    }
}

// 实现 From<calamine::Error>
impl From<calamine::Error> for ImportError {
    fn from(err: calamine::Error) -> Self {
        ImportError::ExcelParseError(err.to_string())
    }
}

// 实现 From<calamine::XlsxError>
impl From<calamine::XlsxError> for ImportError {
    fn from(err: calamine::XlsxError) -> Self {
        ImportError::ExcelParseError(err.to_string())
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        assert_eq!(
            ImportError::UnsupportedOperatorKind("habtm".into()).category(),
            ErrorCategory::Configuration
        );
        assert_eq!(
            ImportError::UnmappedColumn {
                model: "Project".into(),
                column: "Bogus".into(),
                index: 2
            }
            .category(),
            ErrorCategory::Mapping
        );
        assert!(ImportError::TypeConversionError {
            row: 1,
            field: "value_as_integer".into(),
            message: "abc".into()
        }
        .is_row_recoverable());
        assert!(ImportError::Store(StoreError::UniqueConstraintViolation("x".into()))
            .is_row_recoverable());
        assert!(!ImportError::Store(StoreError::DatabaseConnectionError("gone".into()))
            .is_row_recoverable());
    }

    #[test]
    fn test_missing_mandatory_message() {
        let err = ImportError::MissingMandatoryColumns(vec!["title".into(), "owner".into()]);
        assert!(err.to_string().contains("title, owner"));
    }
}
