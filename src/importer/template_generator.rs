// ==========================================
// 表格数据导入系统 - 导入模板生成
// ==========================================
// 职责: 由目标类型的操作符目录生成表头行
// 约定: 生成的表头可被表头解析器无空槽位地解析
// ==========================================

use crate::domain::{ModelSchema, OperatorKind};
use crate::importer::error::ImportResult;
use crate::importer::operator_catalog::OperatorCatalog;
use csv::Writer;
use std::path::Path;
use tracing::info;

/// 系统维护字段
pub const SYSTEM_FIELDS: &[&str] = &["id", "created_at", "updated_at"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateOptions {
    /// 包含关联列
    pub with_associations: bool,
    /// 排除的关联类型
    pub exclude_kinds: Vec<OperatorKind>,
    /// 排除的操作符名
    pub remove: Vec<String>,
    /// 排除 id / created_at / updated_at
    pub remove_system_fields: bool,
}

impl TemplateOptions {
    pub fn with_associations() -> Self {
        Self {
            with_associations: true,
            ..Self::default()
        }
    }
}

pub struct TemplateGenerator;

impl TemplateGenerator {
    /// 生成表头（目录顺序: 字段在前，关联在后）
    pub fn headers(model: &ModelSchema, options: &TemplateOptions) -> Vec<String> {
        let catalog = OperatorCatalog::operators_for(model);

        catalog
            .iter()
            .filter(|op| options.with_associations || !op.is_association())
            .filter(|op| !options.exclude_kinds.contains(&op.kind))
            .filter(|op| !options.remove.iter().any(|r| r == &op.name))
            .filter(|op| {
                !(options.remove_system_fields && SYSTEM_FIELDS.contains(&op.name.as_str()))
            })
            .map(|op| op.name.clone())
            .collect()
    }

    /// 写出只含表头行的 CSV 模板
    pub fn write_csv(
        path: &Path,
        model: &ModelSchema,
        options: &TemplateOptions,
    ) -> ImportResult<Vec<String>> {
        let headers = Self::headers(model, options);

        let mut writer = Writer::from_path(path)?;
        writer.write_record(&headers)?;
        writer.flush()?;

        info!(model = %model.name, file = %path.display(), columns = headers.len(), "导入模板已生成");
        Ok(headers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AttributeDef, Cardinality, RelationshipDef, ValueType};

    fn project() -> ModelSchema {
        ModelSchema::new("Template::Project")
            .attribute(AttributeDef::new("id", ValueType::Integer))
            .attribute(AttributeDef::new("title", ValueType::String))
            .attribute(AttributeDef::new("created_at", ValueType::DateTime))
            .relationship(RelationshipDef::new("owner", Cardinality::HasOne))
            .relationship(RelationshipDef::new("milestones", Cardinality::HasMany))
    }

    #[test]
    fn test_attributes_only_by_default() {
        let headers = TemplateGenerator::headers(&project(), &TemplateOptions::default());
        assert_eq!(headers, vec!["id", "title", "created_at"]);
    }

    #[test]
    fn test_associations_and_exclusions() {
        let options = TemplateOptions {
            exclude_kinds: vec![OperatorKind::HasMany],
            remove_system_fields: true,
            ..TemplateOptions::with_associations()
        };
        let headers = TemplateGenerator::headers(&project(), &options);
        assert_eq!(headers, vec!["title", "owner"]);

        let options = TemplateOptions {
            remove: vec!["title".to_string()],
            ..TemplateOptions::with_associations()
        };
        let headers = TemplateGenerator::headers(&project(), &options);
        assert_eq!(headers, vec!["id", "created_at", "owner", "milestones"]);
    }
}
