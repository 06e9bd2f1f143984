// ==========================================
// 表格数据导入系统 - 持久化后端 Trait
// ==========================================
// 职责: 定义导入管道所需的持久化接口（不包含实现）
// 红线: 后端不含映射规则，只做事务/实例/保存/查找
// ==========================================

use crate::domain::{ModelSchema, Record, RecordId, RecordRef, Value};
use crate::repository::error::StoreResult;

// ==========================================
// SaveOutcome - 保存结果
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    /// 保存成功，返回主键
    Saved(RecordId),
    /// 校验拒绝，返回校验消息
    Rejected(Vec<String>),
}

impl SaveOutcome {
    pub fn is_saved(&self) -> bool {
        matches!(self, SaveOutcome::Saved(_))
    }
}

// ==========================================
// TransactionExit - 事务退出策略
// ==========================================
// 试运行与致命错误时回滚,其余提交
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionExit {
    Commit,
    Rollback,
}

// ==========================================
// PersistenceBackend Trait
// ==========================================
// 实现者: MemoryStore, SqliteStore
pub trait PersistenceBackend {
    /// 开启事务（整个文件共用一个事务）
    fn begin_transaction(&mut self) -> StoreResult<()>;

    fn commit(&mut self) -> StoreResult<()>;

    fn rollback(&mut self) -> StoreResult<()>;

    /// 行级保存点: 行开始前设置
    fn begin_row(&mut self) -> StoreResult<()>;

    /// 行成功: 释放保存点，行内写入并入整批事务
    fn release_row(&mut self) -> StoreResult<()>;

    /// 行失败: 撤销该行写入的全部记录（含新建的关联记录）
    fn rollback_row(&mut self) -> StoreResult<()>;

    /// 按退出策略结束事务
    fn exit_transaction(&mut self, exit: TransactionExit) -> StoreResult<()> {
        match exit {
            TransactionExit::Commit => self.commit(),
            TransactionExit::Rollback => self.rollback(),
        }
    }

    /// 创建新实例（带模型默认值）
    fn new_instance(&self, model: &ModelSchema) -> Record {
        let mut record = Record::new(model.name.clone());
        for attribute in &model.attributes {
            if let Some(default) = &attribute.default {
                record.set(attribute.name.clone(), default.clone());
            }
        }
        record
    }

    /// 保存实例
    ///
    /// # 返回
    /// - Ok(Saved): 成功（新建时回填 record.id）
    /// - Ok(Rejected): 校验失败（不写入）
    /// - Err: 后端故障
    fn save(&mut self, record: &mut Record) -> StoreResult<SaveOutcome>;

    fn assign(&mut self, record: &mut Record, field: &str, value: Value) -> StoreResult<()> {
        record.set(field, value);
        Ok(())
    }

    fn set_to_one(
        &mut self,
        record: &mut Record,
        relation: &str,
        related: RecordRef,
    ) -> StoreResult<()> {
        record.set_to_one(relation, related);
        Ok(())
    }

    fn append_to_many(
        &mut self,
        record: &mut Record,
        relation: &str,
        related: RecordRef,
    ) -> StoreResult<()> {
        record.append_to_many(relation, related);
        Ok(())
    }

    /// 按键值查找已存在记录（返回第一条）
    fn find_by(&mut self, model: &str, key: &str, value: &Value) -> StoreResult<Option<Record>>;

    /// 统计某模型的记录数
    fn count(&mut self, model: &str) -> StoreResult<usize>;
}
