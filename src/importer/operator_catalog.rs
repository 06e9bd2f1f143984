// ==========================================
// 表格数据导入系统 - 操作符目录
// ==========================================
// 职责: 按目标类型发现可绑定的操作符（字段赋值 / 关联访问器）
// 缓存: 进程级缓存,按类型限定名索引,可并发读
// 红线: 同名时关联优先于字段
// ==========================================

use crate::domain::{ModelSchema, OperatorKind, ValueType};
use crate::importer::inflection::{normalize, pluralize, singularize};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

// ==========================================
// Operator - 目录条目
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct Operator {
    pub name: String,
    pub kind: OperatorKind,
    /// 字段赋值: 存储列类型（委托字段为 None）
    pub value_type: Option<ValueType>,
    /// 关联: 声明的目标类型（未声明为 None，运行时推导）
    pub related_model: Option<String>,
}

impl Operator {
    pub fn is_association(&self) -> bool {
        self.kind.is_association()
    }
}

// ==========================================
// OperatorSet - 单个类型的操作符集合
// ==========================================
#[derive(Debug, Clone)]
pub struct OperatorSet {
    model: String,
    source: ModelSchema,
    operators: Vec<Operator>,
    index: HashMap<String, usize>,
}

impl OperatorSet {
    /// 从模型描述构建
    ///
    /// # 顺序
    /// - 先字段（不含被关联同名覆盖的字段），后关联，各自保持声明顺序
    pub fn build(schema: &ModelSchema) -> Self {
        let mut operators = Vec::new();

        for attribute in &schema.attributes {
            if schema.find_relationship(&attribute.name).is_some() {
                continue;
            }
            operators.push(Operator {
                name: attribute.name.clone(),
                kind: OperatorKind::Assignment,
                value_type: attribute.column_type,
                related_model: None,
            });
        }

        for relationship in &schema.relationships {
            operators.push(Operator {
                name: relationship.name.clone(),
                kind: relationship.cardinality.operator_kind(),
                value_type: None,
                related_model: relationship.target.clone(),
            });
        }

        // 第一轮: 精确名；第二轮: 别名与单复数变体（不覆盖已有键）
        let mut index = HashMap::new();
        for (pos, operator) in operators.iter().enumerate() {
            index.insert(normalize(&operator.name), pos);
        }
        for (pos, operator) in operators.iter().enumerate() {
            let mut variants: Vec<String> = schema
                .find_attribute(&operator.name)
                .map(|a| a.aliases.iter().map(|alias| normalize(alias)).collect())
                .unwrap_or_default();
            if operator.is_association() {
                variants.push(normalize(&pluralize(&operator.name)));
                variants.push(normalize(&singularize(&operator.name)));
            }
            for variant in variants {
                index.entry(variant).or_insert(pos);
            }
        }

        debug!(model = %schema.name, operators = operators.len(), "操作符目录构建完成");

        Self {
            model: schema.name.clone(),
            source: schema.clone(),
            operators,
            index,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// 按表头查找操作符（规范化后匹配名称/别名/单复数变体）
    pub fn find(&self, header: &str) -> Option<&Operator> {
        self.index
            .get(&normalize(header))
            .and_then(|pos| self.operators.get(*pos))
    }

    pub fn get(&self, name: &str) -> Option<&Operator> {
        self.operators.iter().find(|o| o.name == name)
    }

    pub fn by_kind(&self, kind: OperatorKind) -> impl Iterator<Item = &Operator> {
        self.operators.iter().filter(move |o| o.kind == kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Operator> {
        self.operators.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.operators.iter().map(|o| o.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }
}

static CATALOG_CACHE: Lazy<RwLock<HashMap<String, Arc<OperatorSet>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

// ==========================================
// OperatorCatalog - 进程级目录缓存
// ==========================================
pub struct OperatorCatalog;

impl OperatorCatalog {
    /// 获取类型的操作符集合（缓存命中直接返回）
    ///
    /// 同名类型的描述发生变化时重建缓存项
    pub fn operators_for(schema: &ModelSchema) -> Arc<OperatorSet> {
        {
            let cache = CATALOG_CACHE.read().unwrap_or_else(|e| e.into_inner());
            if let Some(set) = cache.get(&schema.name) {
                if set.source == *schema {
                    return Arc::clone(set);
                }
            }
        }

        let set = Arc::new(OperatorSet::build(schema));
        let mut cache = CATALOG_CACHE.write().unwrap_or_else(|e| e.into_inner());
        cache.insert(schema.name.clone(), Arc::clone(&set));
        set
    }

    pub fn is_cached(model: &str) -> bool {
        CATALOG_CACHE
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(model)
    }

    /// 清空缓存（测试隔离用）
    pub fn clear() {
        CATALOG_CACHE
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}
