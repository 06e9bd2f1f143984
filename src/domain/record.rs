// ==========================================
// 表格数据导入系统 - 目标对象实例
// ==========================================
// 职责: 单行导入过程中被填充的对象
// 红线: 每行独占一个实例,处理完即丢弃
// ==========================================

use crate::domain::types::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// 记录主键
pub type RecordId = i64;

// ==========================================
// RecordRef - 已持久化对象的引用
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordRef {
    pub model: String,
    pub id: RecordId,
}

impl fmt::Display for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.model, self.id)
    }
}

// ==========================================
// Record - 对象实例
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub model: String,
    pub id: Option<RecordId>,
    pub fields: BTreeMap<String, Value>,
    pub to_one: BTreeMap<String, RecordRef>,
    pub to_many: BTreeMap<String, Vec<RecordRef>>,
}

impl Record {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            id: None,
            fields: BTreeMap::new(),
            to_one: BTreeMap::new(),
            to_many: BTreeMap::new(),
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        self.fields.insert(field.into(), value);
    }

    /// 设置/替换单值关联
    pub fn set_to_one(&mut self, relation: impl Into<String>, related: RecordRef) {
        self.to_one.insert(relation.into(), related);
    }

    /// 追加多值关联（重复引用忽略）
    pub fn append_to_many(&mut self, relation: impl Into<String>, related: RecordRef) {
        let entries = self.to_many.entry(relation.into()).or_default();
        if !entries.contains(&related) {
            entries.push(related);
        }
    }

    /// 清空多值关联（覆盖值整体替换时使用）
    pub fn clear_to_many(&mut self, relation: &str) {
        self.to_many.remove(relation);
    }

    pub fn related(&self, relation: &str) -> Option<&RecordRef> {
        self.to_one.get(relation)
    }

    pub fn related_many(&self, relation: &str) -> &[RecordRef] {
        self.to_many.get(relation).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    /// 已持久化对象的引用
    pub fn reference(&self) -> Option<RecordRef> {
        self.id.map(|id| RecordRef {
            model: self.model.clone(),
            id,
        })
    }
}
