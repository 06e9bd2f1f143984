// ==========================================
// 表格数据导入系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// 作用域: 模型级 (model/<限定名>) 优先于 global
// ==========================================

use crate::config::import_config_trait::ImportConfigReader;
use crate::db::{configure_sqlite_connection, ensure_schema, open_sqlite_connection};
use rusqlite::{params, Connection};
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::error::Error;
use std::sync::{Arc, Mutex};
use tracing::warn;

// ==========================================
// ConfigScope - 配置作用域
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigScope {
    Global,
    Model { model: String },
}

impl ConfigScope {
    pub fn model(model: impl Into<String>) -> Self {
        ConfigScope::Model {
            model: model.into(),
        }
    }

    pub fn scope_id(&self) -> String {
        match self {
            ConfigScope::Global => "global".to_string(),
            ConfigScope::Model { model } => format!("model/{}", model),
        }
    }
}

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;
        ensure_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            configure_sqlite_connection(&conn_guard)?;
            ensure_schema(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取单个作用域的配置值
    fn get_scoped_value(
        &self,
        scope: &ConfigScope,
        key: &str,
    ) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = ?1 AND key = ?2",
            params![scope.scope_id(), key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 读取配置值: 模型级优先，其次 global
    pub fn get_config_value(
        &self,
        model: &str,
        key: &str,
    ) -> Result<Option<String>, Box<dyn Error>> {
        if let Some(value) = self.get_scoped_value(&ConfigScope::model(model), key)? {
            return Ok(Some(value));
        }
        self.get_scoped_value(&ConfigScope::Global, key)
    }

    /// 读取 global scope 的配置值
    pub fn get_global_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        self.get_scoped_value(&ConfigScope::Global, key)
    }

    /// 写入配置值（UPSERT）
    pub fn set_config_value(
        &self,
        scope: &ConfigScope,
        key: &str,
        value: &str,
    ) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES (?1, ?2, ?3)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?3, updated_at = datetime('now')",
            params![scope.scope_id(), key, value],
        )?;
        Ok(())
    }

    /// 删除配置值
    pub fn remove_config_value(
        &self,
        scope: &ConfigScope,
        key: &str,
    ) -> Result<bool, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        let affected = conn.execute(
            "DELETE FROM config_kv WHERE scope_id = ?1 AND key = ?2",
            params![scope.scope_id(), key],
        )?;
        Ok(affected > 0)
    }

    /// 获取某作用域所有配置的快照（JSON格式）
    pub fn get_config_snapshot(&self, scope: &ConfigScope) -> Result<String, Box<dyn Error>> {
        let entries = self.scoped_entries(scope, "")?;
        let config_map: HashMap<String, String> = entries.into_iter().collect();
        Ok(serde_json::to_string(&json!(config_map))?)
    }

    /// 按键前缀列出某作用域的配置（按键排序）
    fn scoped_entries(
        &self,
        scope: &ConfigScope,
        prefix: &str,
    ) -> Result<Vec<(String, String)>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt = conn.prepare(
            "SELECT key, value FROM config_kv
             WHERE scope_id = ?1 AND substr(key, 1, ?2) = ?3 ORDER BY key",
        )?;
        let rows = stmt.query_map(
            params![scope.scope_id(), prefix.chars().count() as i64, prefix],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
        )?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    fn get_bool(&self, model: &str, key: &str) -> Result<Option<bool>, Box<dyn Error>> {
        let Some(value) = self.get_config_value(model, key)? else {
            return Ok(None);
        };
        match value.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(Some(true)),
            "false" | "0" | "no" => Ok(Some(false)),
            _ => {
                warn!(config_key = key, raw_value = %value, "布尔配置格式错误，忽略");
                Ok(None)
            }
        }
    }

    fn get_list(
        &self,
        model: &str,
        key: &str,
        separator: char,
    ) -> Result<Option<Vec<String>>, Box<dyn Error>> {
        Ok(self.get_config_value(model, key)?.map(|value| {
            value
                .split(separator)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        }))
    }
}

// ==========================================
// ImportConfigReader Trait 实现
// ==========================================
impl ImportConfigReader for ConfigManager {
    fn get_dummy_run(&self, model: &str) -> Result<Option<bool>, Box<dyn Error>> {
        self.get_bool(model, config_keys::DUMMY_RUN)
    }

    fn get_strict(&self, model: &str) -> Result<Option<bool>, Box<dyn Error>> {
        self.get_bool(model, config_keys::STRICT)
    }

    fn get_include_all(&self, model: &str) -> Result<Option<bool>, Box<dyn Error>> {
        self.get_bool(model, config_keys::INCLUDE_ALL)
    }

    fn get_mandatory_columns(&self, model: &str) -> Result<Option<Vec<String>>, Box<dyn Error>> {
        self.get_list(model, config_keys::MANDATORY, ',')
    }

    fn get_force_inclusion(&self, model: &str) -> Result<Option<Vec<String>>, Box<dyn Error>> {
        self.get_list(model, config_keys::FORCE_INCLUSION, ',')
    }

    fn get_multi_value_delimiter(&self, model: &str) -> Result<Option<String>, Box<dyn Error>> {
        self.get_config_value(model, config_keys::MULTI_VALUE_DELIMITER)
    }

    fn get_create_missing_associations(&self, model: &str) -> Result<Option<bool>, Box<dyn Error>> {
        self.get_bool(model, config_keys::CREATE_MISSING_ASSOCIATIONS)
    }

    fn get_date_formats(&self, model: &str) -> Result<Option<Vec<String>>, Box<dyn Error>> {
        self.get_list(model, config_keys::DATE_FORMATS, ';')
    }

    fn get_default_values(&self, model: &str) -> Result<BTreeMap<String, String>, Box<dyn Error>> {
        let mut defaults = BTreeMap::new();
        // global 先写，模型级覆盖
        for scope in [ConfigScope::Global, ConfigScope::model(model)] {
            for (key, value) in self.scoped_entries(&scope, config_keys::DEFAULT_PREFIX)? {
                let operator = key[config_keys::DEFAULT_PREFIX.len()..].to_string();
                if !operator.is_empty() {
                    defaults.insert(operator, value);
                }
            }
        }
        Ok(defaults)
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 运行模式
    pub const DUMMY_RUN: &str = "dummy_run";
    pub const STRICT: &str = "strict";
    pub const INCLUDE_ALL: &str = "include_all";

    // 列策略
    pub const MANDATORY: &str = "mandatory";
    pub const FORCE_INCLUSION: &str = "force_inclusion";

    // 绑定行为
    pub const MULTI_VALUE_DELIMITER: &str = "multi_value_delimiter";
    pub const CREATE_MISSING_ASSOCIATIONS: &str = "create_missing_associations";
    pub const DATE_FORMATS: &str = "date_formats";

    // 默认值前缀: default/<operator>
    pub const DEFAULT_PREFIX: &str = "default/";
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> ConfigManager {
        let conn = Connection::open_in_memory().unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    #[test]
    fn test_model_scope_overrides_global() {
        let config = manager();
        config
            .set_config_value(&ConfigScope::Global, config_keys::STRICT, "true")
            .unwrap();
        config
            .set_config_value(&ConfigScope::model("Shop::Project"), config_keys::STRICT, "false")
            .unwrap();

        assert_eq!(config.get_strict("Shop::Project").unwrap(), Some(false));
        assert_eq!(config.get_strict("Shop::Category").unwrap(), Some(true));
    }

    #[test]
    fn test_lists_and_defaults() {
        let config = manager();
        config
            .set_config_value(&ConfigScope::Global, config_keys::MANDATORY, "title, reference,")
            .unwrap();
        config
            .set_config_value(&ConfigScope::Global, "default/value_as_integer", "1")
            .unwrap();
        config
            .set_config_value(&ConfigScope::model("Project"), "default/value_as_integer", "7")
            .unwrap();

        assert_eq!(
            config.get_mandatory_columns("Project").unwrap(),
            Some(vec!["title".to_string(), "reference".to_string()])
        );
        let defaults = config.get_default_values("Project").unwrap();
        assert_eq!(defaults.get("value_as_integer").map(String::as_str), Some("7"));
    }

    #[test]
    fn test_invalid_bool_ignored() {
        let config = manager();
        config
            .set_config_value(&ConfigScope::Global, config_keys::DUMMY_RUN, "maybe")
            .unwrap();
        assert_eq!(config.get_dummy_run("Project").unwrap(), None);
        assert!(config
            .remove_config_value(&ConfigScope::Global, config_keys::DUMMY_RUN)
            .unwrap());
    }
}
