// ==========================================
// 表格数据导入系统 - SQLite 存储实现
// ==========================================
// 职责: 基于 rusqlite 的持久化后端
// 存储: records（实例）/ record_fields（字段）/ record_links（关联）
// 约束: 所有查询使用参数化
// ==========================================

use crate::db::{configure_sqlite_connection, ensure_schema, open_sqlite_connection};
use crate::domain::{Record, RecordId, RecordRef, SchemaRegistry, Value};
use crate::repository::error::{StoreError, StoreResult};
use crate::repository::store_trait::{PersistenceBackend, SaveOutcome};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};
use tracing::debug;

// ==========================================
// SqliteStore
// ==========================================
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    registry: Arc<SchemaRegistry>,
    in_transaction: bool,
    row_savepoint: bool,
}

impl SqliteStore {
    /// 打开数据库文件并建表
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    /// - registry: 模型注册表（用于保存前校验）
    pub fn new(db_path: &str, registry: Arc<SchemaRegistry>) -> StoreResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| StoreError::DatabaseConnectionError(e.to_string()))?;
        ensure_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            registry,
            in_transaction: false,
            row_savepoint: false,
        })
    }

    pub fn open_in_memory(registry: Arc<SchemaRegistry>) -> StoreResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StoreError::DatabaseConnectionError(e.to_string()))?;
        configure_sqlite_connection(&conn)?;
        ensure_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            registry,
            in_transaction: false,
            row_savepoint: false,
        })
    }

    /// 从已有连接创建（会再次应用统一 PRAGMA 并建表，幂等）
    pub fn from_connection(
        conn: Arc<Mutex<Connection>>,
        registry: Arc<SchemaRegistry>,
    ) -> StoreResult<Self> {
        {
            let guard = conn.lock().map_err(|e| StoreError::LockError(e.to_string()))?;
            configure_sqlite_connection(&guard)?;
            ensure_schema(&guard)?;
        }

        Ok(Self {
            conn,
            registry,
            in_transaction: false,
            row_savepoint: false,
        })
    }

    /// 共享连接（供 ConfigManager 复用）
    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    /// 按主键读取记录
    pub fn get(&self, id: RecordId) -> StoreResult<Option<Record>> {
        let conn = self.conn.lock().map_err(|e| StoreError::LockError(e.to_string()))?;
        Self::load_record(&conn, id)
    }

    /// 某模型的全部记录（按主键排序）
    pub fn records_of(&self, model: &str) -> StoreResult<Vec<Record>> {
        let conn = self.conn.lock().map_err(|e| StoreError::LockError(e.to_string()))?;
        let mut stmt = conn.prepare("SELECT id FROM records WHERE model = ?1 ORDER BY id")?;
        let ids = stmt
            .query_map(params![model], |row| row.get::<_, i64>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(record) = Self::load_record(&conn, id)? {
                records.push(record);
            }
        }
        Ok(records)
    }

    fn load_record(conn: &Connection, id: RecordId) -> StoreResult<Option<Record>> {
        let model: Option<String> = conn
            .query_row("SELECT model FROM records WHERE id = ?1", params![id], |row| {
                row.get(0)
            })
            .optional()?;

        let Some(model) = model else {
            return Ok(None);
        };

        let mut record = Record::new(model);
        record.id = Some(id);

        let mut stmt =
            conn.prepare("SELECT name, value_json FROM record_fields WHERE record_id = ?1")?;
        let fields = stmt
            .query_map(params![id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        for (name, json) in fields {
            let value: Value = serde_json::from_str(&json)?;
            record.set(name, value);
        }

        let mut stmt = conn.prepare(
            "SELECT relation, related_model, related_id FROM record_links
             WHERE owner_id = ?1 ORDER BY relation, position",
        )?;
        let links = stmt
            .query_map(params![id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        for (relation, related_model, related_id) in links {
            let related = RecordRef {
                model: related_model,
                id: related_id,
            };
            match relation.strip_suffix(MANY_SUFFIX) {
                Some(name) => record.append_to_many(name, related),
                None => record.set_to_one(relation, related),
            }
        }

        Ok(Some(record))
    }

    fn write_record(conn: &Connection, id: RecordId, record: &Record) -> StoreResult<()> {
        conn.execute("DELETE FROM record_fields WHERE record_id = ?1", params![id])?;
        conn.execute("DELETE FROM record_links WHERE owner_id = ?1", params![id])?;

        let mut stmt = conn.prepare(
            "INSERT INTO record_fields (record_id, name, value_text, value_json)
             VALUES (?1, ?2, ?3, ?4)",
        )?;
        for (name, value) in &record.fields {
            stmt.execute(params![id, name, value.to_text(), serde_json::to_string(value)?])?;
        }

        let mut stmt = conn.prepare(
            "INSERT INTO record_links (owner_id, relation, position, related_model, related_id)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for (relation, related) in &record.to_one {
            stmt.execute(params![id, relation, 0, related.model, related.id])?;
        }
        for (relation, related) in &record.to_many {
            let key = format!("{}{}", relation, MANY_SUFFIX);
            for (position, item) in related.iter().enumerate() {
                stmt.execute(params![id, key, position as i64, item.model, item.id])?;
            }
        }
        Ok(())
    }
}

/// 多值关联在链接表中的后缀（区分单值/多值）
const MANY_SUFFIX: &str = "[]";

/// 行级保存点名称
const ROW_SAVEPOINT: &str = "rowshift_row";

impl PersistenceBackend for SqliteStore {
    fn begin_transaction(&mut self) -> StoreResult<()> {
        let conn = self.conn.lock().map_err(|e| StoreError::LockError(e.to_string()))?;
        conn.execute_batch("BEGIN IMMEDIATE")
            .map_err(|e| StoreError::DatabaseTransactionError(e.to_string()))?;
        self.in_transaction = true;
        Ok(())
    }

    fn begin_row(&mut self) -> StoreResult<()> {
        if self.row_savepoint {
            return Err(StoreError::DatabaseTransactionError("行保存点已存在".to_string()));
        }
        let conn = self.conn.lock().map_err(|e| StoreError::LockError(e.to_string()))?;
        conn.execute_batch(&format!("SAVEPOINT {}", ROW_SAVEPOINT))
            .map_err(|e| StoreError::DatabaseTransactionError(e.to_string()))?;
        self.row_savepoint = true;
        Ok(())
    }

    fn release_row(&mut self) -> StoreResult<()> {
        if !self.row_savepoint {
            return Err(StoreError::DatabaseTransactionError("没有进行中的行保存点".to_string()));
        }
        let conn = self.conn.lock().map_err(|e| StoreError::LockError(e.to_string()))?;
        conn.execute_batch(&format!("RELEASE {}", ROW_SAVEPOINT))
            .map_err(|e| StoreError::DatabaseTransactionError(e.to_string()))?;
        self.row_savepoint = false;
        Ok(())
    }

    fn rollback_row(&mut self) -> StoreResult<()> {
        if !self.row_savepoint {
            return Err(StoreError::DatabaseTransactionError("没有进行中的行保存点".to_string()));
        }
        let conn = self.conn.lock().map_err(|e| StoreError::LockError(e.to_string()))?;
        // ROLLBACK TO 保留保存点本身，需再 RELEASE
        conn.execute_batch(&format!(
            "ROLLBACK TO {sp}; RELEASE {sp}",
            sp = ROW_SAVEPOINT
        ))
        .map_err(|e| StoreError::DatabaseTransactionError(e.to_string()))?;
        self.row_savepoint = false;
        debug!("SQLite 行保存点已回滚");
        Ok(())
    }

    fn commit(&mut self) -> StoreResult<()> {
        if !self.in_transaction {
            return Err(StoreError::DatabaseTransactionError("没有进行中的事务".to_string()));
        }
        let conn = self.conn.lock().map_err(|e| StoreError::LockError(e.to_string()))?;
        conn.execute_batch("COMMIT")
            .map_err(|e| StoreError::DatabaseTransactionError(e.to_string()))?;
        self.in_transaction = false;
        self.row_savepoint = false;
        debug!("SQLite 事务已提交");
        Ok(())
    }

    fn rollback(&mut self) -> StoreResult<()> {
        if !self.in_transaction {
            return Err(StoreError::DatabaseTransactionError("没有进行中的事务".to_string()));
        }
        let conn = self.conn.lock().map_err(|e| StoreError::LockError(e.to_string()))?;
        conn.execute_batch("ROLLBACK")
            .map_err(|e| StoreError::DatabaseTransactionError(e.to_string()))?;
        self.in_transaction = false;
        self.row_savepoint = false;
        debug!("SQLite 事务已回滚");
        Ok(())
    }

    fn save(&mut self, record: &mut Record) -> StoreResult<SaveOutcome> {
        let schema = self
            .registry
            .get(&record.model)
            .ok_or_else(|| StoreError::UnknownModel(record.model.clone()))?;

        let messages = schema.validate(record);
        if !messages.is_empty() {
            return Ok(SaveOutcome::Rejected(messages));
        }

        let mut conn = self.conn.lock().map_err(|e| StoreError::LockError(e.to_string()))?;
        // 单条保存用 SAVEPOINT 包裹，失败时只撤销本条
        let sp = conn.savepoint()?;
        let now = Utc::now().to_rfc3339();

        let id = match record.id {
            Some(id) => {
                let updated = sp.execute(
                    "UPDATE records SET updated_at = ?1 WHERE id = ?2 AND model = ?3",
                    params![now, id, record.model],
                )?;
                if updated == 0 {
                    return Err(StoreError::NotFound {
                        model: record.model.clone(),
                        id,
                    });
                }
                id
            }
            None => {
                sp.execute(
                    "INSERT INTO records (model, created_at, updated_at) VALUES (?1, ?2, ?2)",
                    params![record.model, now],
                )?;
                sp.last_insert_rowid()
            }
        };

        Self::write_record(&sp, id, record)?;
        sp.commit()?;

        record.id = Some(id);
        Ok(SaveOutcome::Saved(id))
    }

    fn find_by(&mut self, model: &str, key: &str, value: &Value) -> StoreResult<Option<Record>> {
        let conn = self.conn.lock().map_err(|e| StoreError::LockError(e.to_string()))?;
        let id: Option<i64> = conn
            .query_row(
                r#"
                SELECT r.id FROM records r
                JOIN record_fields f ON f.record_id = r.id
                WHERE r.model = ?1 AND f.name = ?2 AND f.value_text = ?3
                ORDER BY r.id
                LIMIT 1
                "#,
                params![model, key, value.to_text()],
                |row| row.get(0),
            )
            .optional()?;

        match id {
            Some(id) => Self::load_record(&conn, id),
            None => Ok(None),
        }
    }

    fn count(&mut self, model: &str) -> StoreResult<usize> {
        let conn = self.conn.lock().map_err(|e| StoreError::LockError(e.to_string()))?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM records WHERE model = ?1",
            params![model],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}
