// ==========================================
// 表格数据导入系统 - 目标模型描述
// ==========================================
// 职责: 描述目标类型可被赋值的字段与关联（能力发现接口）
// 红线: 只描述结构,不含持久化逻辑
// ==========================================

use crate::domain::record::Record;
use crate::domain::types::{OperatorKind, Value, ValueType};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// 命名空间分隔符
pub const NAMESPACE_SEPARATOR: &str = "::";

// ==========================================
// AttributeDef - 可赋值字段
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDef {
    pub name: String,

    /// 存储列类型；None 表示委托字段（无可发现的列类型）
    #[serde(default)]
    pub column_type: Option<ValueType>,

    #[serde(default)]
    pub required: bool,

    /// 新建实例时的默认值
    #[serde(default)]
    pub default: Option<Value>,

    /// 表头别名
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl AttributeDef {
    pub fn new(name: impl Into<String>, column_type: ValueType) -> Self {
        Self {
            name: name.into(),
            column_type: Some(column_type),
            required: false,
            default: None,
            aliases: Vec::new(),
        }
    }

    /// 委托字段（没有存储列）
    pub fn delegated(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column_type: None,
            required: false,
            default: None,
            aliases: Vec::new(),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }
}

// ==========================================
// Cardinality - 关联基数
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    BelongsTo,
    HasOne,
    HasMany,
}

impl Cardinality {
    pub fn operator_kind(&self) -> OperatorKind {
        match self {
            Cardinality::BelongsTo => OperatorKind::BelongsTo,
            Cardinality::HasOne => OperatorKind::HasOne,
            Cardinality::HasMany => OperatorKind::HasMany,
        }
    }
}

// ==========================================
// RelationshipDef - 关联声明
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipDef {
    pub name: String,
    pub cardinality: Cardinality,

    /// 关联目标类型（限定名）；None 时按名称推导
    #[serde(default)]
    pub target: Option<String>,
}

impl RelationshipDef {
    pub fn new(name: impl Into<String>, cardinality: Cardinality) -> Self {
        Self {
            name: name.into(),
            cardinality,
            target: None,
        }
    }

    pub fn targeting(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }
}

// ==========================================
// ModelSchema - 目标类型
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSchema {
    /// 限定名，例如 `Shop::Project`
    pub name: String,

    #[serde(default)]
    pub attributes: Vec<AttributeDef>,

    #[serde(default)]
    pub relationships: Vec<RelationshipDef>,

    /// 关联查找/新建时使用的键字段
    #[serde(default)]
    pub lookup_key: Option<String>,
}

impl ModelSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            relationships: Vec::new(),
            lookup_key: None,
        }
    }

    pub fn attribute(mut self, attribute: AttributeDef) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn relationship(mut self, relationship: RelationshipDef) -> Self {
        self.relationships.push(relationship);
        self
    }

    pub fn with_lookup_key(mut self, key: impl Into<String>) -> Self {
        self.lookup_key = Some(key.into());
        self
    }

    pub fn find_attribute(&self, name: &str) -> Option<&AttributeDef> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn find_relationship(&self, name: &str) -> Option<&RelationshipDef> {
        self.relationships.iter().find(|r| r.name == name)
    }

    /// 类型名最后一段（去掉命名空间）
    pub fn short_name(&self) -> &str {
        self.name
            .rsplit(NAMESPACE_SEPARATOR)
            .next()
            .unwrap_or(&self.name)
    }

    /// 命名空间第一段；无命名空间时即为类型名本身
    pub fn parent_namespace(&self) -> &str {
        self.name
            .split(NAMESPACE_SEPARATOR)
            .next()
            .unwrap_or(&self.name)
    }

    /// 关联查找键: lookup_key > name > 第一个字符串字段
    pub fn resolved_lookup_key(&self) -> Option<&str> {
        if let Some(key) = &self.lookup_key {
            return Some(key.as_str());
        }
        if self.find_attribute("name").is_some() {
            return Some("name");
        }
        self.attributes
            .iter()
            .find(|a| matches!(a.column_type, Some(ValueType::String) | Some(ValueType::Text)))
            .map(|a| a.name.as_str())
    }

    /// 校验记录（必填字段非空）
    ///
    /// # 返回
    /// - 空列表: 校验通过
    /// - 否则: 每条违规一条消息
    pub fn validate(&self, record: &Record) -> Vec<String> {
        self.attributes
            .iter()
            .filter(|a| a.required)
            .filter(|a| record.get(&a.name).map_or(true, Value::is_blank))
            .map(|a| format!("{} 不能为空", a.name))
            .collect()
    }
}

// ==========================================
// TypeResolver - 按名称解析类型
// ==========================================
pub trait TypeResolver: Send + Sync {
    /// 按限定名解析类型，找不到返回 None（不报错）
    fn resolve_by_name(&self, name: &str) -> Option<Arc<ModelSchema>>;
}

// ==========================================
// SchemaRegistry - 类型注册表
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    models: HashMap<String, Arc<ModelSchema>>,
}

#[derive(Debug, Deserialize)]
struct RegistryFile {
    models: Vec<ModelSchema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, schema: ModelSchema) -> Arc<ModelSchema> {
        let schema = Arc::new(schema);
        self.models.insert(schema.name.clone(), Arc::clone(&schema));
        schema
    }

    pub fn get(&self, name: &str) -> Option<Arc<ModelSchema>> {
        self.models.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.models.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// 从 JSON 文本加载 `{"models": [...]}`
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        let file: RegistryFile = serde_json::from_str(json)?;
        let mut registry = Self::new();
        for model in file.models {
            registry.register(model);
        }
        Ok(registry)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::from_json_str(&content)?)
    }
}

impl TypeResolver for SchemaRegistry {
    fn resolve_by_name(&self, name: &str) -> Option<Arc<ModelSchema>> {
        self.get(name)
    }
}
