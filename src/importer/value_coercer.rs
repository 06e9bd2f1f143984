// ==========================================
// 表格数据导入系统 - 单元格值转换器
// ==========================================
// 职责: 原始单元格文本 → 目标值类型（TRIM / 空值标准化 / 数值 / 布尔 / 日期）
// 红线: 转换失败返回绑定错误,由加载器在行边界隔离
// ==========================================

use crate::config::{LoadOptions, DEFAULT_MULTI_VALUE_DELIMITER};
use crate::domain::{Value, ValueType};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::importer_trait::ValueCoercer;
use chrono::{NaiveDate, NaiveDateTime};

/// 内置日期格式（按顺序尝试）
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y%m%d", "%Y/%m/%d", "%d/%m/%Y"];

/// 内置日期时间格式（按顺序尝试）
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y%m%d%H%M%S",
    "%Y/%m/%d %H:%M:%S",
];

pub struct DefaultValueCoercer {
    delimiter: String,
    extra_date_formats: Vec<String>,
}

impl Default for DefaultValueCoercer {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_MULTI_VALUE_DELIMITER.to_string(),
            extra_date_formats: Vec::new(),
        }
    }
}

impl DefaultValueCoercer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按运行选项构造（分隔符 + 额外日期格式）
    pub fn from_options(options: &LoadOptions) -> Self {
        Self {
            delimiter: options.multi_value_delimiter.clone(),
            extra_date_formats: options.date_formats.clone(),
        }
    }

    fn parse_integer(&self, value: &str, field: &str, row: usize) -> ImportResult<Value> {
        if let Ok(i) = value.parse::<i64>() {
            return Ok(Value::Integer(i));
        }
        // Excel 数值单元格会以 "42.0" 形式出现
        match value.parse::<f64>() {
            Ok(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Ok(Value::Integer(f as i64)),
            _ => Err(ImportError::TypeConversionError {
                row,
                field: field.to_string(),
                message: format!("无法解析为整数: {}", value),
            }),
        }
    }

    fn parse_float(&self, value: &str, field: &str, row: usize) -> ImportResult<Value> {
        value
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(Value::Float)
            .ok_or_else(|| ImportError::TypeConversionError {
                row,
                field: field.to_string(),
                message: format!("无法解析为浮点数: {}", value),
            })
    }

    fn parse_boolean(&self, value: &str, field: &str, row: usize) -> ImportResult<Value> {
        match value.to_lowercase().as_str() {
            "true" | "t" | "yes" | "y" | "1" | "是" => Ok(Value::Boolean(true)),
            "false" | "f" | "no" | "n" | "0" | "否" => Ok(Value::Boolean(false)),
            _ => Err(ImportError::TypeConversionError {
                row,
                field: field.to_string(),
                message: format!("无法解析为布尔值: {}", value),
            }),
        }
    }

    fn parse_date(&self, value: &str, field: &str, row: usize) -> ImportResult<Value> {
        let custom = self.extra_date_formats.iter().map(String::as_str);
        for format in custom.chain(DATE_FORMATS.iter().copied()) {
            if let Ok(date) = NaiveDate::parse_from_str(value, format) {
                return Ok(Value::Date(date));
            }
        }
        // 日期列中出现日期时间时取日期部分
        if let Some(datetime) = self.try_datetime(value) {
            return Ok(Value::Date(datetime.date()));
        }
        Err(ImportError::DateFormatError {
            row,
            field: field.to_string(),
            value: value.to_string(),
        })
    }

    fn parse_datetime(&self, value: &str, field: &str, row: usize) -> ImportResult<Value> {
        if let Some(datetime) = self.try_datetime(value) {
            return Ok(Value::DateTime(datetime));
        }
        // 仅日期时补零点
        let custom = self.extra_date_formats.iter().map(String::as_str);
        for format in custom.chain(DATE_FORMATS.iter().copied()) {
            if let Ok(date) = NaiveDate::parse_from_str(value, format) {
                if let Some(datetime) = date.and_hms_opt(0, 0, 0) {
                    return Ok(Value::DateTime(datetime));
                }
            }
        }
        Err(ImportError::DateFormatError {
            row,
            field: field.to_string(),
            value: value.to_string(),
        })
    }

    fn try_datetime(&self, value: &str) -> Option<NaiveDateTime> {
        let custom = self.extra_date_formats.iter().map(String::as_str);
        custom
            .chain(DATETIME_FORMATS.iter().copied())
            .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
    }
}

impl ValueCoercer for DefaultValueCoercer {
    fn coerce(
        &self,
        raw: &str,
        value_type: Option<ValueType>,
        field: &str,
        row: usize,
    ) -> ImportResult<Value> {
        let value = raw.trim();
        if value.is_empty() {
            return Ok(Value::Null);
        }

        match value_type {
            None | Some(ValueType::String) | Some(ValueType::Text) => {
                Ok(Value::String(value.to_string()))
            }
            Some(ValueType::Integer) => self.parse_integer(value, field, row),
            Some(ValueType::Float) => self.parse_float(value, field, row),
            Some(ValueType::Boolean) => self.parse_boolean(value, field, row),
            Some(ValueType::Date) => self.parse_date(value, field, row),
            Some(ValueType::DateTime) => self.parse_datetime(value, field, row),
        }
    }

    fn split_multi(&self, raw: &str) -> Vec<String> {
        // 空分隔符会逐字符拆分，按单值处理
        if self.delimiter.is_empty() {
            let value = raw.trim();
            return if value.is_empty() { Vec::new() } else { vec![value.to_string()] };
        }
        raw.split(self.delimiter.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_is_null() {
        let coercer = DefaultValueCoercer::new();
        assert_eq!(coercer.coerce("   ", Some(ValueType::Integer), "n", 1).unwrap(), Value::Null);
    }

    #[test]
    fn test_string_trimmed() {
        let coercer = DefaultValueCoercer::new();
        assert_eq!(
            coercer.coerce("  Widget ", None, "title", 1).unwrap(),
            Value::String("Widget".to_string())
        );
    }

    #[test]
    fn test_numbers() {
        let coercer = DefaultValueCoercer::new();
        assert_eq!(
            coercer.coerce("42", Some(ValueType::Integer), "n", 1).unwrap(),
            Value::Integer(42)
        );
        assert_eq!(
            coercer.coerce("42.0", Some(ValueType::Integer), "n", 1).unwrap(),
            Value::Integer(42)
        );
        assert_eq!(
            coercer.coerce("1.5", Some(ValueType::Float), "f", 1).unwrap(),
            Value::Float(1.5)
        );

        let err = coercer.coerce("abc", Some(ValueType::Integer), "n", 3).unwrap_err();
        assert!(matches!(err, ImportError::TypeConversionError { row: 3, .. }));
        assert!(coercer.coerce("4.5", Some(ValueType::Integer), "n", 1).is_err());
    }

    #[test]
    fn test_boolean() {
        let coercer = DefaultValueCoercer::new();
        assert_eq!(
            coercer.coerce("Yes", Some(ValueType::Boolean), "b", 1).unwrap(),
            Value::Boolean(true)
        );
        assert_eq!(
            coercer.coerce("0", Some(ValueType::Boolean), "b", 1).unwrap(),
            Value::Boolean(false)
        );
        assert!(coercer.coerce("maybe", Some(ValueType::Boolean), "b", 1).is_err());
    }

    #[test]
    fn test_dates() {
        let coercer = DefaultValueCoercer::new();
        let expected = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        assert_eq!(
            coercer.coerce("20240315", Some(ValueType::Date), "d", 1).unwrap(),
            Value::Date(expected)
        );
        assert_eq!(
            coercer.coerce("2024-03-15", Some(ValueType::Date), "d", 1).unwrap(),
            Value::Date(expected)
        );
        assert_eq!(
            coercer.coerce("2024-03-15 08:30:00", Some(ValueType::DateTime), "dt", 1).unwrap(),
            Value::DateTime(expected.and_hms_opt(8, 30, 0).unwrap())
        );
        assert_eq!(
            coercer.coerce("2024-03-15", Some(ValueType::DateTime), "dt", 1).unwrap(),
            Value::DateTime(expected.and_hms_opt(0, 0, 0).unwrap())
        );

        let err = coercer.coerce("15th March", Some(ValueType::Date), "d", 2).unwrap_err();
        assert!(matches!(err, ImportError::DateFormatError { row: 2, .. }));
    }

    #[test]
    fn test_custom_date_format_and_delimiter() {
        let options = LoadOptions {
            multi_value_delimiter: ";".to_string(),
            date_formats: vec!["%d.%m.%Y".to_string()],
            ..LoadOptions::default()
        };
        let coercer = DefaultValueCoercer::from_options(&options);
        assert_eq!(
            coercer.coerce("15.03.2024", Some(ValueType::Date), "d", 1).unwrap(),
            Value::Date(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap())
        );
        assert_eq!(coercer.split_multi(" a ; b;;c "), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_split_multi_default_delimiter() {
        let coercer = DefaultValueCoercer::new();
        assert_eq!(coercer.split_multi("Alpha | Beta"), vec!["Alpha", "Beta"]);
        assert!(coercer.split_multi("  ").is_empty());
    }

    #[test]
    fn test_split_multi_empty_delimiter_keeps_cell_whole() {
        let options = LoadOptions {
            multi_value_delimiter: String::new(),
            ..LoadOptions::default()
        };
        let coercer = DefaultValueCoercer::from_options(&options);
        assert_eq!(coercer.split_multi(" Build "), vec!["Build"]);
    }
}
