// ==========================================
// 表格数据导入系统 - 导入结果累计器
// ==========================================
// 职责: 逐行累计成功/失败,运行结束定稿并渲染汇总
// ==========================================

use crate::domain::{LoadReport, RecordRef, RowFailure};
use crate::importer::importer_trait::Reporter;
use chrono::Utc;
use std::time::Instant;

pub struct LoadReporter {
    report: LoadReport,
    started: Instant,
}

impl Default for LoadReporter {
    fn default() -> Self {
        Self {
            report: LoadReport::new("", ""),
            started: Instant::now(),
        }
    }
}

impl LoadReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// 取出最终报告
    pub fn into_report(self) -> LoadReport {
        self.report
    }
}

impl Reporter for LoadReporter {
    fn reset(&mut self, run_id: &str, model: &str) {
        self.report = LoadReport::new(run_id, model);
        self.started = Instant::now();
    }

    fn set_file_name(&mut self, file_name: Option<String>) {
        self.report.file_name = file_name;
    }

    fn increment_processed(&mut self) {
        self.report.processed += 1;
    }

    fn record_skipped(&mut self, count: usize) {
        self.report.skipped_blank += count;
    }

    fn record_success(&mut self, reference: RecordRef) {
        self.report.loaded.push(reference);
    }

    fn record_failure(&mut self, failure: RowFailure) {
        self.report.failures.push(failure);
    }

    fn finalize(&mut self, dry_run: bool, committed: bool) {
        self.report.dry_run = dry_run;
        self.report.committed = committed;
        self.report.finished_at = Some(Utc::now());
        self.report.elapsed = Some(self.started.elapsed());
    }

    fn report(&self) -> &LoadReport {
        &self.report
    }

    fn render(&self) -> String {
        let report = &self.report;
        let mut lines = vec![report.summary_line()];

        if let Some(file_name) = &report.file_name {
            lines.push(format!("文件: {}", file_name));
        }
        if let Some(elapsed) = report.elapsed {
            lines.push(format!("耗时: {} ms", elapsed.as_millis()));
        }

        for failure in &report.failures {
            lines.push(format!(
                "  行 {} [{:?}] {}: {}",
                failure.row_index + 1,
                failure.kind,
                failure.error,
                failure.row.join(", ")
            ));
            for message in &failure.messages {
                lines.push(format!("    - {}", message));
            }
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FailureKind;

    fn failure() -> RowFailure {
        RowFailure {
            row_index: 1,
            row: vec!["".to_string(), "Gadgets".to_string()],
            kind: FailureKind::Save,
            error: "保存被拒绝".to_string(),
            messages: vec!["title 不能为空".to_string()],
            retryable: true,
        }
    }

    #[test]
    fn test_accumulate_and_render() {
        let mut reporter = LoadReporter::new();
        reporter.reset("run-1", "Project");

        reporter.increment_processed();
        reporter.record_success(RecordRef {
            model: "Project".to_string(),
            id: 7,
        });
        reporter.increment_processed();
        reporter.record_failure(failure());
        reporter.finalize(false, true);

        let report = reporter.report();
        assert_eq!(report.processed, 2);
        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failed(), 1);
        assert!(report.finished_at.is_some());

        let rendered = reporter.render();
        assert!(rendered.contains("成功 1 行"));
        assert!(rendered.contains("行 2 [Save]"));
        assert!(rendered.contains("title 不能为空"));
    }

    #[test]
    fn test_reset_clears_counts() {
        let mut reporter = LoadReporter::new();
        reporter.reset("run-1", "Project");
        reporter.increment_processed();
        reporter.record_failure(failure());

        reporter.reset("run-2", "Project");
        assert_eq!(reporter.report().processed, 0);
        assert_eq!(reporter.report().failed(), 0);
        assert_eq!(reporter.report().run_id, "run-2");
    }
}
