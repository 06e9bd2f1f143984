// ==========================================
// 表格数据导入系统 - 列绑定明细 (MethodDetail)
// ==========================================
// 职责: 一列表头 ↔ 一个目录操作符的绑定
// 生命周期: 每次运行由表头解析器构建,构建后只读,运行结束丢弃
// 红线: 操作符类型非法时构建失败（配置错误）
// ==========================================

use crate::domain::{ModelSchema, OperatorKind, TypeResolver, ValueType, NAMESPACE_SEPARATOR};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::inflection::classify;
use crate::importer::operator_catalog::Operator;
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error};

// ==========================================
// FindBy - 关联按备用键查找
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindBy {
    /// 关联类型上的查找字段
    pub key: String,
    /// 固定查找值（单元格为空时使用）
    pub value: Option<String>,
}

impl FindBy {
    pub fn key(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: None,
        }
    }

    pub fn with_value(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: Some(value.into()),
        }
    }
}

// ==========================================
// ResolvedType - 推导出的期望类型
// ==========================================
#[derive(Debug, Clone)]
pub enum ResolvedType {
    /// 关联目标类型
    Related(Arc<ModelSchema>),
    /// 字段值类型
    Value(ValueType),
}

impl ResolvedType {
    pub fn name(&self) -> String {
        match self {
            ResolvedType::Related(schema) => schema.name.clone(),
            ResolvedType::Value(value_type) => value_type.classify().to_string(),
        }
    }
}

// ==========================================
// MethodDetail
// ==========================================
#[derive(Debug, Clone)]
pub struct MethodDetail {
    model: Arc<ModelSchema>,
    /// 原始表头文本，例如 `Price`
    name: String,
    /// 目标类型上的操作符，例如 `price`
    operator: String,
    operator_kind: OperatorKind,
    /// 存储列类型（委托字段、关联为 None）
    column_type: Option<ValueType>,
    find_by: Option<FindBy>,
    /// 列位置；None 表示未绑定
    column_index: Option<usize>,
    resolved: OnceCell<Option<ResolvedType>>,
}

impl MethodDetail {
    /// 创建绑定明细
    ///
    /// # 参数
    /// - name: 原始表头文本
    /// - model: 目标类型
    /// - operator: 操作符名
    /// - kind: 操作符类型（assignment / belongs_to / has_one / has_many）
    /// - col_types: 列类型表；为空时从 model 字段声明中查找
    /// - find_by: 关联备用键
    ///
    /// # 返回
    /// - Err(UnsupportedOperatorKind): kind 不受支持
    pub fn new(
        name: impl Into<String>,
        model: Arc<ModelSchema>,
        operator: impl Into<String>,
        kind: &str,
        col_types: Option<&HashMap<String, ValueType>>,
        find_by: Option<FindBy>,
    ) -> ImportResult<Self> {
        let operator_kind: OperatorKind = kind
            .parse()
            .map_err(ImportError::UnsupportedOperatorKind)?;
        let operator = operator.into();

        // 注意: 并非所有字段都有列类型，例如委托字段
        let column_type = match col_types {
            Some(types) if !types.is_empty() => types.get(&operator).copied(),
            _ => model.find_attribute(&operator).and_then(|a| a.column_type),
        };

        Ok(Self {
            model,
            name: name.into(),
            operator,
            operator_kind,
            column_type,
            find_by,
            column_index: None,
            resolved: OnceCell::new(),
        })
    }

    /// 由目录条目创建（类型已校验）
    pub fn from_operator(
        name: impl Into<String>,
        model: Arc<ModelSchema>,
        operator: &Operator,
        find_by: Option<FindBy>,
    ) -> Self {
        Self {
            model,
            name: name.into(),
            operator: operator.name.clone(),
            operator_kind: operator.kind,
            column_type: operator.value_type,
            find_by,
            column_index: None,
            resolved: OnceCell::new(),
        }
    }

    /// 强制纳入的合成赋值绑定（目录中无对应能力）
    pub fn synthetic(
        name: impl Into<String>,
        model: Arc<ModelSchema>,
        operator: impl Into<String>,
    ) -> Self {
        Self {
            model,
            name: name.into(),
            operator: operator.into(),
            operator_kind: OperatorKind::Assignment,
            column_type: None,
            find_by: None,
            column_index: None,
            resolved: OnceCell::new(),
        }
    }

    pub fn with_column_index(mut self, index: usize) -> Self {
        self.column_index = Some(index);
        self
    }

    pub fn model(&self) -> &Arc<ModelSchema> {
        &self.model
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn operator(&self) -> &str {
        &self.operator
    }

    pub fn operator_kind(&self) -> OperatorKind {
        self.operator_kind
    }

    pub fn column_type(&self) -> Option<ValueType> {
        self.column_type
    }

    pub fn find_by(&self) -> Option<&FindBy> {
        self.find_by.as_ref()
    }

    pub fn column_index(&self) -> Option<usize> {
        self.column_index
    }

    pub fn is_association(&self) -> bool {
        self.operator_kind.is_association()
    }

    /// 类型匹配时返回操作符名，否则 None
    pub fn operator_for(&self, kind: OperatorKind) -> Option<&str> {
        (self.operator_kind == kind).then_some(self.operator.as_str())
    }

    /// 操作符名比较（默认大小写不敏感）
    pub fn matches(&self, name: &str, case_sensitive: bool) -> bool {
        if case_sensitive {
            self.operator == name
        } else {
            self.operator.to_lowercase() == name.to_lowercase()
        }
    }

    /// 期望类型（首次调用时推导，之后复用）
    ///
    /// - 关联: 关联目标类型
    /// - 字段: 存储列类型
    /// - 都无法得到: None（视为未知，不是错误）
    pub fn resolved_type(&self, resolver: &dyn TypeResolver) -> Option<&ResolvedType> {
        self.resolved
            .get_or_init(|| {
                if self.is_association() {
                    self.resolve_related(resolver).map(ResolvedType::Related)
                } else {
                    self.column_type.map(ResolvedType::Value)
                }
            })
            .as_ref()
    }

    /// 关联目标类型
    pub fn related_model(&self, resolver: &dyn TypeResolver) -> Option<Arc<ModelSchema>> {
        match self.resolved_type(resolver) {
            Some(ResolvedType::Related(schema)) => Some(Arc::clone(schema)),
            _ => None,
        }
    }

    /// 期望类型名；无法推导时为空串
    pub fn value_type_name(&self, resolver: &dyn TypeResolver) -> String {
        self.resolved_type(resolver)
            .map(ResolvedType::name)
            .unwrap_or_default()
    }

    pub fn describe(&self) -> String {
        format!("{} => {}", self.name, self.operator)
    }

    /// 推导关联目标类型
    ///
    /// 1. 类型自身的关联声明
    /// 2. 全局命名空间按类名查找
    /// 3. 目标类型的顶层命名空间下按类名查找
    fn resolve_related(&self, resolver: &dyn TypeResolver) -> Option<Arc<ModelSchema>> {
        let declared = self
            .model
            .find_relationship(&self.operator)
            .and_then(|r| r.target.clone());

        if let Some(target) = &declared {
            if let Some(schema) = resolver.resolve_by_name(target) {
                return Some(schema);
            }
            debug!(operator = %self.operator, target = %target, "声明的关联类型未注册");
        }

        let class_name = classify(&self.operator);
        let mut candidates = Vec::new();
        candidates.extend(declared.iter().cloned());
        candidates.push(class_name.clone());

        for candidate in &candidates {
            if candidate.contains(NAMESPACE_SEPARATOR) {
                continue;
            }
            if let Some(schema) = resolver.resolve_by_name(candidate) {
                return Some(schema);
            }
        }

        let parent = self.model.parent_namespace();
        for candidate in &candidates {
            if candidate.contains(NAMESPACE_SEPARATOR) {
                continue;
            }
            let namespaced = format!("{}{}{}", parent, NAMESPACE_SEPARATOR, candidate);
            debug!(operator = %self.operator, candidate = %namespaced, "尝试在上级命名空间下查找关联类型");
            if let Some(schema) = resolver.resolve_by_name(&namespaced) {
                return Some(schema);
            }
        }

        error!(
            operator = %self.operator,
            kind = %self.operator_kind,
            model = %self.model.name,
            "无法推导关联类型"
        );
        None
    }
}
