// ==========================================
// 表格数据导入系统 - 表头解析器 (MethodMapper)
// ==========================================
// 职责: 表头列 → 操作符绑定,输出与表头列位置一一对齐
// 策略优先级: 必填检查 → 目录匹配 → include_all → force_inclusion → strict → 跳过
// 红线: 任何行被读取之前完成全部配置/映射校验
// ==========================================

use crate::config::LoadOptions;
use crate::domain::ModelSchema;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::inflection::normalize;
use crate::importer::method_detail::{FindBy, MethodDetail};
use crate::importer::operator_catalog::OperatorCatalog;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// 表头限定符分隔符: `Category:reference` / `Category:reference=R-1`
pub const QUALIFIER_SEPARATOR: char = ':';

// ==========================================
// HeaderCell - 拆分后的表头单元格
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderCell {
    /// 去除限定符后的列名
    pub column: String,
    pub find_by: Option<FindBy>,
}

impl HeaderCell {
    /// 拆分表头限定符
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        let Some((column, qualifier)) = raw.split_once(QUALIFIER_SEPARATOR) else {
            return Self {
                column: raw.to_string(),
                find_by: None,
            };
        };

        let qualifier = qualifier.trim();
        let find_by = match qualifier.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                Some(FindBy::with_value(key.trim(), value.trim()))
            }
            None if !qualifier.is_empty() => Some(FindBy::key(qualifier)),
            _ => None,
        };

        Self {
            column: column.trim().to_string(),
            find_by,
        }
    }
}

// ==========================================
// MethodMapping - 解析结果
// ==========================================
#[derive(Debug, Clone)]
pub struct MethodMapping {
    model: Arc<ModelSchema>,
    headers: Vec<String>,
    /// 与表头列一一对齐；None 为跳过的列
    pub details: Vec<Option<MethodDetail>>,
}

impl MethodMapping {
    pub fn model(&self) -> &Arc<ModelSchema> {
        &self.model
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.details.len()
    }

    pub fn is_empty(&self) -> bool {
        self.details.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&MethodDetail> {
        self.details.get(index).and_then(Option::as_ref)
    }

    /// 已绑定的列（按列位置）
    pub fn bound(&self) -> impl Iterator<Item = &MethodDetail> {
        self.details.iter().flatten()
    }

    /// 未映射的表头原文
    pub fn unmapped(&self) -> Vec<&str> {
        self.headers
            .iter()
            .zip(&self.details)
            .filter(|(_, detail)| detail.is_none())
            .map(|(header, _)| header.as_str())
            .collect()
    }

    pub fn find_by_operator(&self, operator: &str) -> Option<&MethodDetail> {
        self.bound().find(|d| d.matches(operator, false))
    }

    /// 诊断输出: 每列一行 `name => operator`
    pub fn describe(&self) -> Vec<String> {
        self.headers
            .iter()
            .zip(&self.details)
            .map(|(header, detail)| match detail {
                Some(detail) => detail.describe(),
                None => format!("{} => (跳过)", header),
            })
            .collect()
    }
}

// ==========================================
// MethodMapper
// ==========================================
pub struct MethodMapper;

impl MethodMapper {
    /// 解析表头
    ///
    /// # 返回
    /// - Ok(MethodMapping): 每个表头列一个槽位
    /// - Err(MissingMandatoryColumns / MandatoryColumnUnbound): 配置错误
    /// - Err(UnmappedColumn): strict 模式下非必填列无法映射
    #[instrument(skip_all, fields(model = %model.name, columns = headers.len()))]
    pub fn resolve(
        model: Arc<ModelSchema>,
        headers: &[String],
        options: &LoadOptions,
    ) -> ImportResult<MethodMapping> {
        let catalog = OperatorCatalog::operators_for(&model);
        let cells: Vec<HeaderCell> = headers.iter().map(|h| HeaderCell::parse(h)).collect();

        // === 必填检查（在任何绑定之前） ===
        let missing: Vec<String> = options
            .mandatory
            .iter()
            .filter(|mandatory| {
                let wanted = normalize(mandatory);
                !cells.iter().any(|cell| {
                    normalize(&cell.column) == wanted
                        || catalog
                            .find(&cell.column)
                            .map(|op| normalize(&op.name) == wanted)
                            .unwrap_or(false)
                })
            })
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(ImportError::MissingMandatoryColumns(missing));
        }

        let mut details = Vec::with_capacity(cells.len());
        for (index, cell) in cells.into_iter().enumerate() {
            // 空表头没有可推导的操作符名，include_all / strict 均不适用
            if cell.column.is_empty() {
                warn!(index, "空表头列，跳过");
                details.push(None);
                continue;
            }

            if let Some(operator) = catalog.find(&cell.column) {
                let find_by = match cell.find_by {
                    Some(find_by) if !operator.is_association() => {
                        warn!(
                            column = %cell.column,
                            key = %find_by.key,
                            "字段列不支持查找限定符，忽略"
                        );
                        None
                    }
                    other => other,
                };
                let detail =
                    MethodDetail::from_operator(cell.column, Arc::clone(&model), operator, find_by)
                        .with_column_index(index);
                debug!(
                    index,
                    binding = %detail.describe(),
                    kind = %detail.operator_kind(),
                    "列已绑定"
                );
                details.push(Some(detail));
                continue;
            }

            if options.include_all || options.is_forced(&cell.column) {
                let operator = normalize(&cell.column);
                let detail = MethodDetail::synthetic(cell.column, Arc::clone(&model), operator)
                    .with_column_index(index);
                debug!(index, binding = %detail.describe(), "强制映射为字段赋值");
                details.push(Some(detail));
                continue;
            }

            if options.is_mandatory(&cell.column) {
                return Err(ImportError::MandatoryColumnUnbound {
                    model: model.name.clone(),
                    column: cell.column,
                });
            }

            if options.strict {
                return Err(ImportError::UnmappedColumn {
                    model: model.name.clone(),
                    column: cell.column,
                    index,
                });
            }

            warn!(index, column = %cell.column, model = %model.name, "表头无法映射，跳过该列");
            details.push(None);
        }

        let mapping = MethodMapping {
            model,
            headers: headers.to_vec(),
            details,
        };
        info!(
            bound = mapping.bound().count(),
            unmapped = mapping.unmapped().len(),
            "表头解析完成"
        );
        Ok(mapping)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AttributeDef, Cardinality, OperatorKind, RelationshipDef, ValueType};

    fn project() -> Arc<ModelSchema> {
        Arc::new(
            ModelSchema::new("Mapper::Project")
                .attribute(AttributeDef::new("title", ValueType::String).required())
                .attribute(AttributeDef::new("value_as_integer", ValueType::Integer))
                .relationship(RelationshipDef::new("category", Cardinality::BelongsTo))
                .relationship(RelationshipDef::new("milestones", Cardinality::HasMany)),
        )
    }

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_header_cell_qualifiers() {
        assert_eq!(HeaderCell::parse(" Title ").column, "Title");
        assert_eq!(HeaderCell::parse("Title").find_by, None);

        let cell = HeaderCell::parse("Category:reference");
        assert_eq!(cell.column, "Category");
        assert_eq!(cell.find_by, Some(FindBy::key("reference")));

        let cell = HeaderCell::parse("Category: reference = R-1");
        assert_eq!(cell.find_by, Some(FindBy::with_value("reference", "R-1")));

        assert_eq!(HeaderCell::parse("Category:").find_by, None);
    }

    #[test]
    fn test_positions_and_kinds() {
        let mapping = MethodMapper::resolve(
            project(),
            &headers(&["Title", "Category", "Milestones"]),
            &LoadOptions::default(),
        )
        .unwrap();

        let kinds: Vec<_> = mapping
            .bound()
            .map(|d| (d.column_index(), d.operator_kind()))
            .collect();
        assert_eq!(
            kinds,
            vec![
                (Some(0), OperatorKind::Assignment),
                (Some(1), OperatorKind::BelongsTo),
                (Some(2), OperatorKind::HasMany)
            ]
        );
    }

    #[test]
    fn test_unmapped_column_skipped_or_strict() {
        let cols = headers(&["Title", "Bogus"]);

        let mapping = MethodMapper::resolve(project(), &cols, &LoadOptions::default()).unwrap();
        assert_eq!(mapping.len(), 2);
        assert!(mapping.get(1).is_none());
        assert_eq!(mapping.unmapped(), vec!["Bogus"]);

        let err =
            MethodMapper::resolve(project(), &cols, &LoadOptions::default().strict()).unwrap_err();
        assert!(matches!(
            err,
            ImportError::UnmappedColumn { ref column, index: 1, .. } if column == "Bogus"
        ));
    }

    #[test]
    fn test_mandatory_missing_fails_first() {
        let options = LoadOptions::default().strict().with_mandatory(["title"]);
        let err = MethodMapper::resolve(project(), &headers(&["Bogus"]), &options).unwrap_err();
        assert!(matches!(
            err,
            ImportError::MissingMandatoryColumns(ref cols) if cols == &vec!["title".to_string()]
        ));
    }

    #[test]
    fn test_mandatory_present_but_unbound() {
        let options = LoadOptions::default().with_mandatory(["Legacy Code"]);
        let cols = headers(&["Title", "Legacy Code"]);
        let err = MethodMapper::resolve(project(), &cols, &options).unwrap_err();
        assert!(matches!(err, ImportError::MandatoryColumnUnbound { .. }));

        let forced = options.with_force_inclusion(["legacy code"]);
        let mapping = MethodMapper::resolve(project(), &cols, &forced).unwrap();
        assert_eq!(mapping.get(1).unwrap().operator(), "legacy_code");
    }

    #[test]
    fn test_include_all_binds_everything() {
        let mapping = MethodMapper::resolve(
            project(),
            &headers(&["Foo", "Bar Baz"]),
            &LoadOptions::default().include_all().strict(),
        )
        .unwrap();
        assert_eq!(mapping.bound().count(), 2);
        assert!(mapping.unmapped().is_empty());
        assert!(mapping.find_by_operator("bar_baz").is_some());
    }

    #[test]
    fn test_find_by_only_kept_for_associations() {
        let mapping = MethodMapper::resolve(
            project(),
            &headers(&["Title:slug", "Category:reference=R-1"]),
            &LoadOptions::default(),
        )
        .unwrap();
        assert!(mapping.get(0).unwrap().find_by().is_none());
        assert_eq!(
            mapping.get(1).unwrap().find_by(),
            Some(&FindBy::with_value("reference", "R-1"))
        );
    }
}
