// ==========================================
// 表格数据导入系统 - 内存存储实现
// ==========================================
// 职责: 快照式事务的内存后端（试运行/测试/无库场景）
// 红线: 回滚必须恢复到 begin 时的完整状态
// ==========================================

use crate::domain::{Record, RecordId, SchemaRegistry, Value};
use crate::repository::error::{StoreError, StoreResult};
use crate::repository::store_trait::{PersistenceBackend, SaveOutcome};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Default)]
struct StoreState {
    records: BTreeMap<RecordId, Record>,
    next_id: RecordId,
}

// ==========================================
// MemoryStore
// ==========================================
/// 行级写入日志: 行开始时的 next_id 与被改动记录的原值
#[derive(Debug, Default)]
struct RowJournal {
    next_id: RecordId,
    previous: BTreeMap<RecordId, Option<Record>>,
}

pub struct MemoryStore {
    registry: Arc<SchemaRegistry>,
    state: StoreState,
    snapshot: Option<StoreState>,
    row_journal: Option<RowJournal>,
    commits: usize,
    rollbacks: usize,
}

impl MemoryStore {
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        Self {
            registry,
            state: StoreState {
                records: BTreeMap::new(),
                next_id: 1,
            },
            snapshot: None,
            row_journal: None,
            commits: 0,
            rollbacks: 0,
        }
    }

    pub fn get(&self, id: RecordId) -> Option<&Record> {
        self.state.records.get(&id)
    }

    /// 某模型的全部记录（按主键排序）
    pub fn records_of(&self, model: &str) -> Vec<&Record> {
        self.state
            .records
            .values()
            .filter(|r| r.model == model)
            .collect()
    }

    pub fn commit_count(&self) -> usize {
        self.commits
    }

    pub fn rollback_count(&self) -> usize {
        self.rollbacks
    }

    pub fn in_transaction(&self) -> bool {
        self.snapshot.is_some()
    }
}

impl PersistenceBackend for MemoryStore {
    fn begin_transaction(&mut self) -> StoreResult<()> {
        if self.snapshot.is_some() {
            return Err(StoreError::DatabaseTransactionError(
                "事务已开启，不支持嵌套事务".to_string(),
            ));
        }
        self.snapshot = Some(self.state.clone());
        Ok(())
    }

    fn begin_row(&mut self) -> StoreResult<()> {
        if self.row_journal.is_some() {
            return Err(StoreError::DatabaseTransactionError(
                "行保存点已存在".to_string(),
            ));
        }
        self.row_journal = Some(RowJournal {
            next_id: self.state.next_id,
            previous: BTreeMap::new(),
        });
        Ok(())
    }

    fn release_row(&mut self) -> StoreResult<()> {
        self.row_journal
            .take()
            .map(|_| ())
            .ok_or_else(|| StoreError::DatabaseTransactionError("没有进行中的行保存点".to_string()))
    }

    fn rollback_row(&mut self) -> StoreResult<()> {
        let journal = self
            .row_journal
            .take()
            .ok_or_else(|| StoreError::DatabaseTransactionError("没有进行中的行保存点".to_string()))?;
        let restored = journal.previous.len();
        for (id, previous) in journal.previous {
            match previous {
                Some(record) => self.state.records.insert(id, record),
                None => self.state.records.remove(&id),
            };
        }
        self.state.next_id = journal.next_id;
        debug!(restored, "行保存点已回滚");
        Ok(())
    }

    fn commit(&mut self) -> StoreResult<()> {
        self.snapshot
            .take()
            .ok_or_else(|| StoreError::DatabaseTransactionError("没有进行中的事务".to_string()))?;
        self.row_journal = None;
        self.commits += 1;
        debug!(records = self.state.records.len(), "内存事务已提交");
        Ok(())
    }

    fn rollback(&mut self) -> StoreResult<()> {
        let snapshot = self
            .snapshot
            .take()
            .ok_or_else(|| StoreError::DatabaseTransactionError("没有进行中的事务".to_string()))?;
        self.state = snapshot;
        self.row_journal = None;
        self.rollbacks += 1;
        debug!(records = self.state.records.len(), "内存事务已回滚");
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

        let id = match record.id {
            Some(id) => {
                if !self.state.records.contains_key(&id) {
                    return Err(StoreError::NotFound {
                        model: record.model.clone(),
                        id,
                    });
                }
                id
            }
            None => {
                let id = self.state.next_id;
                self.state.next_id += 1;
                record.id = Some(id);
                id
            }
        };

        let previous = self.state.records.insert(id, record.clone());
        if let Some(journal) = self.row_journal.as_mut() {
            journal.previous.entry(id).or_insert(previous);
        }
        Ok(SaveOutcome::Saved(id))
    }

    fn find_by(&mut self, model: &str, key: &str, value: &Value) -> StoreResult<Option<Record>> {
        let wanted = value.to_text();
        Ok(self
            .state
            .records
            .values()
            .find(|r| {
                r.model == model && r.get(key).map(|v| v.to_text() == wanted).unwrap_or(false)
            })
            .cloned())
    }

    fn count(&mut self, model: &str) -> StoreResult<usize> {
        Ok(self.records_of(model).len())
    }
}
