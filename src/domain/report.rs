// ==========================================
// 表格数据导入系统 - 导入结果报告
// ==========================================
// 职责: 逐行结果与整批汇总
// 对齐: Reporter 增量写入,运行结束时定稿
// ==========================================

use crate::domain::record::RecordRef;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

// ==========================================
// FailureKind - 行失败类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    Bind, // 绑定/类型转换/关联解析失败
    Save, // 持久化校验拒绝
}

// ==========================================
// RowFailure - 单行失败明细
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowFailure {
    /// 数据行序号（从 0 开始，不含表头）
    pub row_index: usize,
    /// 原始行内容
    pub row: Vec<String>,
    pub kind: FailureKind,
    pub error: String,
    /// 后端返回的校验消息（仅 Save 类型）
    pub messages: Vec<String>,
    /// 修正数据后是否可重试
    pub retryable: bool,
}

// ==========================================
// RowOutcome - 单行处理结果
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    Success(RecordRef),
    Failure(RowFailure),
}

impl RowOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RowOutcome::Success(_))
    }
}

// ==========================================
// LoadReport - 整批汇总
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadReport {
    pub run_id: String,
    pub model: String,
    pub file_name: Option<String>,
    pub processed: usize,
    /// 解析时跳过的完全空白行（不计入 processed）
    #[serde(default)]
    pub skipped_blank: usize,
    pub loaded: Vec<RecordRef>,
    pub failures: Vec<RowFailure>,
    pub dry_run: bool,
    /// 事务是否已提交（试运行与致命错误时为 false）
    pub committed: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub elapsed: Option<Duration>,
}

impl LoadReport {
    pub fn new(run_id: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            model: model.into(),
            file_name: None,
            processed: 0,
            skipped_blank: 0,
            loaded: Vec::new(),
            failures: Vec::new(),
            dry_run: false,
            committed: false,
            started_at: Utc::now(),
            finished_at: None,
            elapsed: None,
        }
    }

    pub fn succeeded(&self) -> usize {
        self.loaded.len()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// 单行汇总文本
    pub fn summary_line(&self) -> String {
        let skipped = if self.skipped_blank > 0 {
            format!(", 跳过空行 {} 行", self.skipped_blank)
        } else {
            String::new()
        };
        format!(
            "模型 {} 处理 {} 行: 成功 {} 行, 失败 {} 行{}{}",
            self.model,
            self.processed,
            self.succeeded(),
            self.failed(),
            skipped,
            if self.dry_run {
                " (试运行, 未写入数据)"
            } else if !self.committed {
                " (已回滚)"
            } else {
                ""
            }
        )
    }
}
