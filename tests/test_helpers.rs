// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 提供测试所需的模型注册表、临时文件、临时数据库
// ==========================================

#![allow(dead_code)]

use rowshift::domain::{
    AttributeDef, Cardinality, ModelSchema, RelationshipDef, SchemaRegistry, ValueType,
};
use rowshift::importer::Loader;
use rowshift::repository::MemoryStore;
use std::error::Error;
use std::io::Write;
use std::sync::Arc;
use tempfile::{Builder, NamedTempFile};

pub const PROJECT: &str = "Project";
pub const CATEGORY: &str = "Category";
pub const OWNER: &str = "Owner";
pub const MILESTONE: &str = "Milestone";
pub const ORDER: &str = "Shop::Order";
pub const LINE_ITEM: &str = "Shop::LineItem";
pub const CUSTOMER: &str = "Shop::Customer";

/// Project 及其关联类型
///
/// - Project: title (必填) + 各类型字段 + 委托字段 owner_name
/// - category (belongs_to) / owner (has_one) / milestones (has_many)
pub fn project_schema() -> ModelSchema {
    ModelSchema::new(PROJECT)
        .attribute(AttributeDef::new("title", ValueType::String).required())
        .attribute(AttributeDef::new("value_as_string", ValueType::String))
        .attribute(AttributeDef::new("value_as_text", ValueType::Text))
        .attribute(AttributeDef::new("value_as_boolean", ValueType::Boolean))
        .attribute(AttributeDef::new("value_as_datetime", ValueType::DateTime))
        .attribute(AttributeDef::new("value_as_integer", ValueType::Integer))
        .attribute(AttributeDef::new("value_as_double", ValueType::Float))
        .attribute(AttributeDef::delegated("owner_name"))
        .relationship(RelationshipDef::new("category", Cardinality::BelongsTo).targeting(CATEGORY))
        .relationship(RelationshipDef::new("owner", Cardinality::HasOne).targeting(OWNER))
        .relationship(RelationshipDef::new("milestones", Cardinality::HasMany).targeting(MILESTONE))
}

/// 命名空间内的类型，关联未声明目标（按上级命名空间推导）
pub fn order_schema() -> ModelSchema {
    ModelSchema::new(ORDER)
        .attribute(AttributeDef::new("number", ValueType::String).required())
        .relationship(RelationshipDef::new("customer", Cardinality::BelongsTo))
        .relationship(RelationshipDef::new("line_items", Cardinality::HasMany))
}

pub fn registry() -> Arc<SchemaRegistry> {
    let mut registry = SchemaRegistry::new();
    registry.register(project_schema());
    registry.register(
        ModelSchema::new(CATEGORY)
            .attribute(AttributeDef::new("name", ValueType::String).required())
            .attribute(AttributeDef::new("reference", ValueType::String)),
    );
    registry.register(
        ModelSchema::new(OWNER)
            .attribute(AttributeDef::new("name", ValueType::String))
            .attribute(AttributeDef::new("budget", ValueType::Float)),
    );
    registry.register(
        ModelSchema::new(MILESTONE)
            .attribute(AttributeDef::new("name", ValueType::String))
            .attribute(AttributeDef::new("cost", ValueType::Float)),
    );
    registry.register(order_schema());
    registry.register(
        ModelSchema::new(LINE_ITEM).attribute(AttributeDef::new("name", ValueType::String)),
    );
    registry.register(
        ModelSchema::new(CUSTOMER)
            .attribute(AttributeDef::new("email", ValueType::String))
            .with_lookup_key("email"),
    );
    Arc::new(registry)
}

pub fn memory_loader(model: &str) -> Loader<MemoryStore> {
    rowshift::logging::init_test();
    let registry = registry();
    Loader::new(MemoryStore::new(Arc::clone(&registry)), registry, model).expect("创建加载器失败")
}

pub fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

/// 写入临时 CSV 文件（需要保持存活）
pub fn write_csv(lines: &[&str]) -> NamedTempFile {
    let mut temp_file = Builder::new().suffix(".csv").tempfile().expect("创建临时文件失败");
    for line in lines {
        writeln!(temp_file, "{}", line).expect("写入临时文件失败");
    }
    temp_file.flush().expect("写入临时文件失败");
    temp_file
}

/// 创建临时测试数据库路径
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = Builder::new().suffix(".db").tempfile()?;
    let db_path = temp_file
        .path()
        .to_str()
        .ok_or("临时路径不是合法 UTF-8")?
        .to_string();
    Ok((temp_file, db_path))
}
