// ==========================================
// 表格数据导入系统 - 领域类型定义
// ==========================================
// 职责: 操作符类型、值类型、单元格值
// 红线: 操作符类型只有四种,关联类型与赋值类型互斥
// ==========================================

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ==========================================
// 操作符类型 (Operator Kind)
// ==========================================
// 序列化格式: snake_case (与配置文件/数据库一致)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatorKind {
    Assignment, // 普通字段赋值
    BelongsTo,  // 多对一（外键在本方）
    HasOne,     // 一对一（外键在对方）
    HasMany,    // 一对多 / 多对多
}

impl OperatorKind {
    /// 全部受支持的操作符类型
    pub const ALL: [OperatorKind; 4] = [
        OperatorKind::Assignment,
        OperatorKind::BelongsTo,
        OperatorKind::HasOne,
        OperatorKind::HasMany,
    ];

    /// 关联类型（BelongsTo / HasOne / HasMany）
    pub const ASSOCIATIONS: [OperatorKind; 3] = [
        OperatorKind::BelongsTo,
        OperatorKind::HasOne,
        OperatorKind::HasMany,
    ];

    pub fn is_association(&self) -> bool {
        !matches!(self, OperatorKind::Assignment)
    }

    /// 关联结果是否为单个对象
    pub fn is_to_one(&self) -> bool {
        matches!(self, OperatorKind::BelongsTo | OperatorKind::HasOne)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OperatorKind::Assignment => "assignment",
            OperatorKind::BelongsTo => "belongs_to",
            OperatorKind::HasOne => "has_one",
            OperatorKind::HasMany => "has_many",
        }
    }
}

impl fmt::Display for OperatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OperatorKind {
    type Err = String;

    /// 解析操作符类型（大小写不敏感，兼容 `:belongs_to` 写法）
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().trim_start_matches(':').to_lowercase();
        match normalized.as_str() {
            "assignment" => Ok(OperatorKind::Assignment),
            "belongs_to" => Ok(OperatorKind::BelongsTo),
            "has_one" => Ok(OperatorKind::HasOne),
            "has_many" => Ok(OperatorKind::HasMany),
            _ => Err(s.to_string()),
        }
    }
}

// ==========================================
// 值类型 (Value Type)
// ==========================================
// 对应存储列的声明类型,用于单元格强制转换
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    String,
    Text,
    Integer,
    Float,
    Boolean,
    Date,
    DateTime,
}

impl ValueType {
    /// 类名形式（首字母大写）
    pub fn classify(&self) -> &'static str {
        match self {
            ValueType::String => "String",
            ValueType::Text => "Text",
            ValueType::Integer => "Integer",
            ValueType::Float => "Float",
            ValueType::Boolean => "Boolean",
            ValueType::Date => "Date",
            ValueType::DateTime => "Datetime",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.classify())
    }
}

// ==========================================
// 单元格值 (Value)
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// NULL 或空白字符串
    pub fn is_blank(&self) -> bool {
        match self {
            Value::Null => true,
            Value::String(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// 规范文本形式（用于按键查找与报表输出）
    pub fn to_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
            Value::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_text())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_kind_from_str() {
        assert_eq!("belongs_to".parse::<OperatorKind>(), Ok(OperatorKind::BelongsTo));
        assert_eq!(":has_many".parse::<OperatorKind>(), Ok(OperatorKind::HasMany));
        assert_eq!("Assignment".parse::<OperatorKind>(), Ok(OperatorKind::Assignment));
        assert!("has_and_belongs_to_many".parse::<OperatorKind>().is_err());
    }

    #[test]
    fn test_operator_kind_association() {
        assert!(!OperatorKind::Assignment.is_association());
        for kind in OperatorKind::ASSOCIATIONS {
            assert!(kind.is_association());
        }
        assert!(OperatorKind::HasOne.is_to_one());
        assert!(!OperatorKind::HasMany.is_to_one());
    }

    #[test]
    fn test_value_blank() {
        assert!(Value::Null.is_blank());
        assert!(Value::from("  ").is_blank());
        assert!(!Value::Integer(0).is_blank());
        assert_eq!(Value::Boolean(true).to_text(), "true");
    }
}
