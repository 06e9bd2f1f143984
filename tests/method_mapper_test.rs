// ==========================================
// 表格数据导入系统 - 表头解析集成测试
// ==========================================
// 覆盖: 绑定位置与类型 / 确定性 / 必填与严格模式 / include_all / 关联类型推导
// ==========================================

mod test_helpers;

use rowshift::config::LoadOptions;
use rowshift::domain::{OperatorKind, ValueType};
use rowshift::importer::{
    ImportError, MethodMapper, OperatorCatalog, ParsedFile, ResolvedType, TemplateGenerator,
    TemplateOptions,
};
use std::sync::Arc;
use test_helpers::{registry, strings, CATEGORY, CUSTOMER, LINE_ITEM, ORDER, PROJECT};

#[test]
fn test_title_category_bound_in_order() {
    let registry = registry();
    let project = registry.get(PROJECT).unwrap();
    let options = LoadOptions::default().with_mandatory(["title"]);

    let mapping =
        MethodMapper::resolve(project, &strings(&["Title", "Category"]), &options).unwrap();

    assert_eq!(mapping.len(), 2);
    let first = mapping.get(0).unwrap();
    let second = mapping.get(1).unwrap();
    assert_eq!(
        (first.operator(), first.operator_kind(), first.column_index()),
        ("title", OperatorKind::Assignment, Some(0))
    );
    assert_eq!(
        (second.operator(), second.operator_kind(), second.column_index()),
        ("category", OperatorKind::BelongsTo, Some(1))
    );
    assert_eq!(second.value_type_name(registry.as_ref()), CATEGORY);
}

#[test]
fn test_resolution_is_deterministic() {
    let registry = registry();
    let headers = strings(&["Value As Integer", "Bogus", "Milestones", "owner", "TITLE"]);

    let tuples = || {
        MethodMapper::resolve(registry.get(PROJECT).unwrap(), &headers, &LoadOptions::default())
            .unwrap()
            .details
            .iter()
            .map(|slot| {
                slot.as_ref()
                    .map(|d| (d.operator().to_string(), d.operator_kind(), d.column_index()))
            })
            .collect::<Vec<_>>()
    };

    let first = tuples();
    assert_eq!(first, tuples());
    assert_eq!(first[1], None);
    assert_eq!(first[4].as_ref().map(|t| t.2), Some(Some(4)));
}

#[test]
fn test_every_operator_kind_is_supported() {
    let registry = registry();
    for name in registry.names() {
        let schema = registry.get(name).unwrap();
        let set = OperatorCatalog::operators_for(&schema);
        assert!(set.iter().all(|op| OperatorKind::ALL.contains(&op.kind)), "{}", name);
    }
}

#[test]
fn test_strict_fails_and_lenient_skips() {
    let registry = registry();
    let headers = strings(&["Title", "Not A Field"]);

    let project = registry.get(PROJECT).unwrap();
    let err =
        MethodMapper::resolve(Arc::clone(&project), &headers, &LoadOptions::default().strict())
            .unwrap_err();
    assert!(matches!(
        err,
        ImportError::UnmappedColumn { ref column, .. } if column == "Not A Field"
    ));

    let mapping = MethodMapper::resolve(project, &headers, &LoadOptions::default()).unwrap();
    assert_eq!(mapping.len(), 2);
    assert!(mapping.details[1].is_none());
}

#[test]
fn test_include_all_without_catalog_matches() {
    let registry = registry();
    let headers = strings(&["Alpha", "Beta", "Gamma"]);

    let options = LoadOptions::default().include_all();
    let mapping =
        MethodMapper::resolve(registry.get(PROJECT).unwrap(), &headers, &options).unwrap();

    assert_eq!(mapping.bound().count(), 3);
    assert!(mapping
        .bound()
        .all(|d| d.operator_kind() == OperatorKind::Assignment));
}

#[test]
fn test_include_all_leaves_blank_header_unbound() {
    let registry = registry();
    let headers = strings(&["Alpha", "", "Gamma"]);

    let options = LoadOptions::default().include_all();
    let mapping =
        MethodMapper::resolve(registry.get(PROJECT).unwrap(), &headers, &options).unwrap();

    assert_eq!(mapping.len(), 3);
    assert_eq!(mapping.bound().count(), 2);
    assert!(mapping.details[1].is_none());
}

#[test]
fn test_mandatory_omission_reads_no_rows() {
    let mut loader = test_helpers::memory_loader(PROJECT);
    let parsed = ParsedFile::from_slices(&["Category"], &[&["Gadgets"]]);
    let options = LoadOptions::default().with_mandatory(["title"]);

    let err = loader.load_parsed(&parsed, &options).unwrap_err();

    assert!(matches!(err, ImportError::MissingMandatoryColumns(_)));
    assert_eq!(loader.report().processed, 0);
    assert_eq!(loader.backend().commit_count(), 0);
    assert_eq!(loader.backend().rollback_count(), 0);
    assert!(loader.backend().records_of(CATEGORY).is_empty());
}

#[test]
fn test_related_types_resolved_under_parent_namespace() {
    let registry = registry();
    let order = registry.get(ORDER).unwrap();

    let mapping = MethodMapper::resolve(
        Arc::clone(&order),
        &strings(&["Number", "Customer", "Line Items"]),
        &LoadOptions::default(),
    )
    .unwrap();

    assert_eq!(mapping.get(1).unwrap().value_type_name(registry.as_ref()), CUSTOMER);
    assert_eq!(mapping.get(2).unwrap().value_type_name(registry.as_ref()), LINE_ITEM);
    assert!(matches!(
        mapping.get(0).unwrap().resolved_type(registry.as_ref()),
        Some(ResolvedType::Value(ValueType::String))
    ));
}

#[test]
fn test_delegated_assignment_has_unknown_type() {
    let registry = registry();
    let mapping = MethodMapper::resolve(
        registry.get(PROJECT).unwrap(),
        &strings(&["Owner Name"]),
        &LoadOptions::default(),
    )
    .unwrap();

    let detail = mapping.get(0).unwrap();
    assert_eq!(detail.operator_kind(), OperatorKind::Assignment);
    assert!(detail.resolved_type(registry.as_ref()).is_none());
    assert_eq!(detail.value_type_name(registry.as_ref()), "");
}

#[test]
fn test_template_headers_round_trip() {
    let registry = registry();
    let project = registry.get(PROJECT).unwrap();

    let headers = TemplateGenerator::headers(&project, &TemplateOptions::with_associations());
    let mapping =
        MethodMapper::resolve(Arc::clone(&project), &headers, &LoadOptions::default().strict())
            .unwrap();

    assert!(mapping.unmapped().is_empty());
    assert_eq!(mapping.len(), OperatorCatalog::operators_for(&project).len());
    let operators: Vec<&str> = mapping.bound().map(|d| d.operator()).collect();
    assert_eq!(operators, OperatorCatalog::operators_for(&project).names());
}
