// ==========================================
// 表格数据导入系统 - 导入管道 (Loader)
// ==========================================
// 流程: 解析文件 → 表头解析 → 开启事务 → 逐行 {默认值 → 逐列绑定 → 覆盖值 → 保存 → 重置} → 结束事务
// 事务: 整个文件一个事务；试运行或致命错误回滚,否则提交
// 隔离: 绑定/保存失败记为行失败并继续下一行；其余错误整批中止
// 保存顺序: 每行在全部绑定完成后保存一次,关联链接随对象一起原子写入
// ==========================================

use crate::config::LoadOptions;
use crate::domain::{
    FailureKind, LoadReport, ModelSchema, OperatorKind, Record, RecordRef, RowFailure,
    RowOutcome, SchemaRegistry,
};
use crate::importer::error::{ErrorCategory, ImportError, ImportResult};
use crate::importer::file_parser::{ParsedFile, UniversalFileParser};
use crate::importer::importer_trait::{FileParser, Reporter, ValueCoercer};
use crate::importer::method_detail::{FindBy, MethodDetail};
use crate::importer::method_mapper::{MethodMapper, MethodMapping};
use crate::importer::operator_catalog::OperatorCatalog;
use crate::importer::reporter::LoadReporter;
use crate::importer::value_coercer::DefaultValueCoercer;
use crate::repository::{PersistenceBackend, SaveOutcome, StoreError, TransactionExit};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

// ==========================================
// Loader
// ==========================================
pub struct Loader<B: PersistenceBackend> {
    backend: B,
    registry: Arc<SchemaRegistry>,
    model: Arc<ModelSchema>,
    reporter: Box<dyn Reporter>,
    parser: Box<dyn FileParser>,
    /// 自定义转换器；None 时每次运行按选项构造默认转换器
    coercer: Option<Box<dyn ValueCoercer>>,
}

impl<B: PersistenceBackend> Loader<B> {
    /// 创建加载器
    ///
    /// # 参数
    /// - backend: 持久化后端
    /// - registry: 类型注册表（同时作为关联类型解析器）
    /// - model: 目标类型限定名
    pub fn new(backend: B, registry: Arc<SchemaRegistry>, model: &str) -> ImportResult<Self> {
        let schema = registry
            .get(model)
            .ok_or_else(|| ImportError::UnknownModel(model.to_string()))?;
        Ok(Self::for_model(backend, registry, schema))
    }

    pub fn for_model(backend: B, registry: Arc<SchemaRegistry>, model: Arc<ModelSchema>) -> Self {
        Self {
            backend,
            registry,
            model,
            reporter: Box::new(LoadReporter::new()),
            parser: Box::new(UniversalFileParser),
            coercer: None,
        }
    }

    pub fn with_reporter(mut self, reporter: Box<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn with_parser(mut self, parser: Box<dyn FileParser>) -> Self {
        self.parser = parser;
        self
    }

    pub fn with_coercer(mut self, coercer: Box<dyn ValueCoercer>) -> Self {
        self.coercer = Some(coercer);
        self
    }

    pub fn model(&self) -> &Arc<ModelSchema> {
        &self.model
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    pub fn reporter(&self) -> &dyn Reporter {
        self.reporter.as_ref()
    }

    /// 最近一次运行的报告
    pub fn report(&self) -> &LoadReport {
        self.reporter.report()
    }

    /// 从文件导入
    #[instrument(skip(self, options), fields(model = %self.model.name))]
    pub fn perform_load(&mut self, path: &Path, options: &LoadOptions) -> ImportResult<LoadReport> {
        info!(file = %path.display(), dry_run = options.dummy_run, "开始导入");

        let parsed = self.parser.parse(path).map_err(|e| {
            error!(error = %e, "文件解析失败");
            e
        })?;
        info!(rows = parsed.row_count(), columns = parsed.headers.len(), "文件解析完成");

        self.load_parsed(&parsed, options)
    }

    /// 导入已解析的表格
    ///
    /// # 返回
    /// - Ok(LoadReport): 运行完成（含逐行失败）
    /// - Err: 配置/映射错误（未触及任何行）或致命错误（已回滚,报告已定稿）
    #[instrument(
        skip_all,
        fields(model = %self.model.name, rows = parsed.row_count(), run_id)
    )]
    pub fn load_parsed(
        &mut self,
        parsed: &ParsedFile,
        options: &LoadOptions,
    ) -> ImportResult<LoadReport> {
        let run_id = Uuid::new_v4().to_string();
        tracing::Span::current().record("run_id", run_id.as_str());
        info!(run_id = %run_id, "开始处理数据行");

        self.reporter.reset(&run_id, &self.model.name);
        self.reporter.set_file_name(parsed.file_name.clone());
        self.reporter.record_skipped(parsed.skipped_blank);

        options.validate()?;

        // === 表头解析（任何行之前） ===
        let mapping = MethodMapper::resolve(Arc::clone(&self.model), &parsed.headers, options)?;
        for line in mapping.describe() {
            debug!(binding = %line, "列绑定");
        }

        // === 整批事务 ===
        self.backend.begin_transaction()?;

        let mut fatal: Option<ImportError> = None;
        for (index, row) in parsed.rows.iter().enumerate() {
            let row_index = parsed.position(index);
            self.reporter.increment_processed();

            if let Err(e) = self.backend.begin_row() {
                error!(row = row_index + 1, error = %e, "行保存点设置失败，整批回滚");
                fatal = Some(e.into());
                break;
            }

            let outcome = self.process_row(&mapping, row_index, row, options);
            // 失败行撤销其写入（含新建的关联记录）；致命错误由整批回滚处理
            let row_exit = match &outcome {
                Ok(RowOutcome::Success(_)) => self.backend.release_row(),
                Ok(RowOutcome::Failure(_)) => self.backend.rollback_row(),
                Err(_) => Ok(()),
            };
            if let Err(e) = row_exit {
                error!(row = row_index + 1, error = %e, "行保存点结束失败，整批回滚");
                fatal = Some(e.into());
                break;
            }

            match outcome {
                Ok(RowOutcome::Success(reference)) => {
                    debug!(row = row_index + 1, record = %reference, "行导入成功");
                    self.reporter.record_success(reference);
                }
                Ok(RowOutcome::Failure(failure)) => {
                    warn!(
                        row = row_index + 1,
                        kind = ?failure.kind,
                        error = %failure.error,
                        content = ?failure.row,
                        "行导入失败，继续下一行"
                    );
                    if options.verbose {
                        eprintln!(
                            "[{}] 行 {} 失败: {} ({})",
                            self.model.name,
                            row_index + 1,
                            failure.error,
                            failure.row.join(", ")
                        );
                        for message in &failure.messages {
                            eprintln!("    - {}", message);
                        }
                    }
                    self.reporter.record_failure(failure);
                }
                Err(e) => {
                    error!(row = row_index + 1, error = %e, "致命错误，整批回滚");
                    fatal = Some(e);
                    break;
                }
            }
        }

        // === 结束事务 ===
        let exit = if fatal.is_some() || options.dummy_run {
            TransactionExit::Rollback
        } else {
            TransactionExit::Commit
        };
        let exit_result = self.backend.exit_transaction(exit);
        if let Err(e) = &exit_result {
            error!(error = %e, exit = ?exit, "事务结束失败");
            if exit == TransactionExit::Commit {
                if let Err(rollback_err) = self.backend.rollback() {
                    error!(error = %rollback_err, "提交失败后回滚失败");
                }
            }
        }
        let committed = exit == TransactionExit::Commit && exit_result.is_ok();

        self.reporter.finalize(options.dummy_run, committed);
        info!(summary = %self.reporter.report().summary_line(), "导入结束");
        debug!("{}", self.reporter.render());

        if let Some(e) = fatal {
            return Err(e);
        }
        exit_result?;

        Ok(self.reporter.report().clone())
    }

    /// 处理单行
    ///
    /// # 返回
    /// - Ok(Success): 已保存
    /// - Ok(Failure): 绑定或保存失败（行级隔离）
    /// - Err: 致命错误
    pub fn process_row(
        &mut self,
        mapping: &MethodMapping,
        row_index: usize,
        row: &[String],
        options: &LoadOptions,
    ) -> ImportResult<RowOutcome> {
        let default_coercer;
        let coercer: &dyn ValueCoercer = match &self.coercer {
            Some(coercer) => coercer.as_ref(),
            None => {
                default_coercer = DefaultValueCoercer::from_options(options);
                &default_coercer
            }
        };

        let mut binder = RowBinder {
            backend: &mut self.backend,
            registry: self.registry.as_ref(),
            model: &self.model,
            coercer,
            options,
            row_index,
        };

        // 每行一个新实例，失败时直接丢弃
        let mut record = binder.backend.new_instance(&self.model);

        if let Err(e) = binder.bind_row(&mut record, mapping, row) {
            return row_failure(e, row_index, row, Vec::new());
        }

        match binder.backend.save(&mut record) {
            Ok(SaveOutcome::Saved(id)) => Ok(RowOutcome::Success(RecordRef {
                model: record.model.clone(),
                id,
            })),
            Ok(SaveOutcome::Rejected(messages)) => {
                let error = ImportError::SaveRejected {
                    row: row_index + 1,
                    messages: messages.clone(),
                };
                row_failure(error, row_index, row, messages)
            }
            Err(e) => row_failure(ImportError::Store(e), row_index, row, Vec::new()),
        }
    }
}

/// 按列位置取单元格；短行缺失的尾部列视为空
fn cell(row: &[String], index: Option<usize>) -> &str {
    index
        .and_then(|i| row.get(i))
        .map(String::as_str)
        .unwrap_or("")
}

/// 可隔离错误转为行失败，其余错误原样返回
fn row_failure(
    error: ImportError,
    row_index: usize,
    row: &[String],
    messages: Vec<String>,
) -> ImportResult<RowOutcome> {
    let (kind, retryable) = match error.category() {
        ErrorCategory::Bind => (FailureKind::Bind, true),
        ErrorCategory::Save => {
            // 唯一/外键约束冲突修正数据也无法直接重试
            let constraint = matches!(&error, ImportError::Store(e) if e.is_constraint());
            (FailureKind::Save, !constraint)
        }
        _ => return Err(error),
    };

    Ok(RowOutcome::Failure(RowFailure {
        row_index,
        row: row.to_vec(),
        kind,
        error: error.to_string(),
        messages,
        retryable,
    }))
}

// ==========================================
// RowBinder - 单行绑定上下文
// ==========================================
struct RowBinder<'a, B: PersistenceBackend> {
    backend: &'a mut B,
    registry: &'a SchemaRegistry,
    model: &'a Arc<ModelSchema>,
    coercer: &'a dyn ValueCoercer,
    options: &'a LoadOptions,
    row_index: usize,
}

impl<'a, B: PersistenceBackend> RowBinder<'a, B> {
    /// 行号（从 1 开始，用于错误信息）
    fn row_number(&self) -> usize {
        self.row_index + 1
    }

    fn bind_row(
        &mut self,
        record: &mut Record,
        mapping: &MethodMapping,
        row: &[String],
    ) -> ImportResult<()> {
        let options = self.options;

        // === 默认值: 行未提供（未绑定或空白）的操作符 ===
        for (operator, raw) in &options.defaults {
            let supplied = mapping.bound().any(|d| {
                d.matches(operator, false) && !cell(row, d.column_index()).trim().is_empty()
            });
            if !supplied {
                let detail = self.detail_for(mapping, operator);
                self.bind(record, &detail, raw)?;
            }
        }

        // === 逐列绑定 ===
        for (index, slot) in mapping.details.iter().enumerate() {
            let raw = cell(row, Some(index));
            match slot {
                Some(detail) => self.bind(record, detail, raw)?,
                None => {
                    let header = mapping.headers().get(index).map(String::as_str).unwrap_or("");
                    warn!(
                        row = self.row_number(),
                        index,
                        header,
                        blank = raw.trim().is_empty(),
                        "列未映射，跳过单元格"
                    );
                }
            }
        }

        // === 覆盖值（多值关联整体替换列中的链接） ===
        for (operator, raw) in &options.overrides {
            let detail = self.detail_for(mapping, operator);
            if detail.operator_kind() == OperatorKind::HasMany && !raw.trim().is_empty() {
                record.clear_to_many(detail.operator());
            }
            self.bind(record, &detail, raw)?;
        }

        Ok(())
    }

    /// 默认值/覆盖值使用的绑定: 优先表头已绑定的列，其次目录，最后按字段赋值
    fn detail_for(&self, mapping: &MethodMapping, operator: &str) -> MethodDetail {
        if let Some(detail) = mapping.find_by_operator(operator) {
            return detail.clone();
        }
        let catalog = OperatorCatalog::operators_for(self.model);
        match catalog.get(operator) {
            Some(op) => MethodDetail::from_operator(operator, Arc::clone(self.model), op, None),
            None => MethodDetail::synthetic(operator, Arc::clone(self.model), operator),
        }
    }

    fn bind(&mut self, record: &mut Record, detail: &MethodDetail, raw: &str) -> ImportResult<()> {
        let fixed = detail.find_by().and_then(|f| f.value.as_deref());
        let raw = match (raw.trim(), fixed) {
            ("", Some(fixed)) if detail.is_association() => fixed,
            ("", _) => return Ok(()),
            (value, _) => value,
        };

        match detail.operator_kind() {
            OperatorKind::Assignment => {
                let value = self.coercer.coerce(
                    raw,
                    detail.column_type(),
                    detail.operator(),
                    self.row_number(),
                )?;
                self.backend.assign(record, detail.operator(), value)?;
            }
            OperatorKind::BelongsTo | OperatorKind::HasOne => {
                let related = self.related_schema(detail)?;
                let reference = self.find_or_create(&related, detail, raw)?;
                self.backend.set_to_one(record, detail.operator(), reference)?;
            }
            OperatorKind::HasMany => {
                let related = self.related_schema(detail)?;
                for part in self.coercer.split_multi(raw) {
                    let reference = self.find_or_create(&related, detail, &part)?;
                    self.backend.append_to_many(record, detail.operator(), reference)?;
                }
            }
        }
        Ok(())
    }

    fn related_schema(&self, detail: &MethodDetail) -> ImportResult<Arc<ModelSchema>> {
        detail
            .related_model(self.registry)
            .ok_or_else(|| ImportError::AssociationError {
                row: self.row_number(),
                field: detail.operator().to_string(),
                message: "无法推导关联类型".to_string(),
            })
    }

    /// 按查找键定位关联记录；不存在时按选项创建
    fn find_or_create(
        &mut self,
        related: &ModelSchema,
        detail: &MethodDetail,
        raw: &str,
    ) -> ImportResult<RecordRef> {
        let row_number = self.row_number();
        let association_error = |message: String| ImportError::AssociationError {
            row: row_number,
            field: detail.operator().to_string(),
            message,
        };

        let key = match detail.find_by() {
            Some(FindBy { key, .. }) => key.as_str(),
            None => related
                .resolved_lookup_key()
                .ok_or_else(|| association_error(format!("关联类型 {} 无查找字段", related.name)))?,
        };

        let key_type = related.find_attribute(key).and_then(|a| a.column_type);
        let value = self
            .coercer
            .coerce(raw, key_type, detail.operator(), row_number)?;

        if let Some(existing) = self.backend.find_by(&related.name, key, &value)? {
            return existing
                .reference()
                .ok_or_else(|| {
                    ImportError::Store(StoreError::InternalError("查找结果缺少主键".to_string()))
                });
        }

        if !self.options.create_missing_associations {
            return Err(association_error(format!(
                "{} 中不存在 {} = {}",
                related.name,
                key,
                value.to_text()
            )));
        }

        let mut created = self.backend.new_instance(related);
        self.backend.assign(&mut created, key, value)?;
        match self.backend.save(&mut created)? {
            SaveOutcome::Saved(id) => {
                debug!(model = %related.name, id, key, "已创建关联记录");
                Ok(RecordRef {
                    model: related.name.clone(),
                    id,
                })
            }
            SaveOutcome::Rejected(messages) => Err(association_error(format!(
                "创建 {} 失败: {}",
                related.name,
                messages.join("; ")
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AttributeDef, Cardinality, RelationshipDef, Value, ValueType};
    use crate::repository::MemoryStore;

    fn registry() -> Arc<SchemaRegistry> {
        let mut registry = SchemaRegistry::new();
        registry.register(
            ModelSchema::new("Loader::Project")
                .attribute(AttributeDef::new("title", ValueType::String).required())
                .attribute(AttributeDef::new("value_as_integer", ValueType::Integer))
                .relationship(RelationshipDef::new("category", Cardinality::BelongsTo))
                .relationship(RelationshipDef::new("labels", Cardinality::HasMany)),
        );
        registry.register(
            ModelSchema::new("Loader::Category")
                .attribute(AttributeDef::new("name", ValueType::String)),
        );
        registry.register(
            ModelSchema::new("Loader::Label")
                .attribute(AttributeDef::new("name", ValueType::String)),
        );
        Arc::new(registry)
    }

    fn loader() -> Loader<MemoryStore> {
        let registry = registry();
        Loader::new(MemoryStore::new(Arc::clone(&registry)), registry, "Loader::Project").unwrap()
    }

    /// 捕获 WARN 级别日志输出
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLogs {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).to_string()
        }
    }

    #[test]
    fn test_unknown_model() {
        let registry = registry();
        let result = Loader::new(MemoryStore::new(Arc::clone(&registry)), registry, "Nope");
        assert!(matches!(result, Err(ImportError::UnknownModel(_))));
    }

    #[test]
    fn test_bind_failure_isolated() {
        let mut loader = loader();
        let parsed = ParsedFile::from_slices(
            &["Title", "Value As Integer", "Category"],
            &[&["A", "abc", "Tools"], &["B", "2", "Tools"]],
        );

        let report = loader.load_parsed(&parsed, &LoadOptions::default()).unwrap();

        assert_eq!(report.processed, 2);
        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failures[0].kind, FailureKind::Bind);
        assert_eq!(report.failures[0].row_index, 0);
        assert!(report.committed);
        assert_eq!(loader.backend().records_of("Loader::Project").len(), 1);
    }

    #[test]
    fn test_defaults_and_overrides() {
        let mut loader = loader();
        let parsed = ParsedFile::from_slices(
            &["Title", "Value As Integer"],
            &[&["A", ""], &["B", "5"]],
        );
        let options = LoadOptions::default()
            .with_default("value_as_integer", "1")
            .with_override("category", "Fixed");

        let report = loader.load_parsed(&parsed, &options).unwrap();
        assert_eq!(report.succeeded(), 2);

        let store = loader.backend();
        let first = store.get(report.loaded[0].id).unwrap();
        let second = store.get(report.loaded[1].id).unwrap();
        assert_eq!(first.get("value_as_integer"), Some(&Value::Integer(1)));
        assert_eq!(second.get("value_as_integer"), Some(&Value::Integer(5)));
        assert_eq!(first.related("category"), second.related("category"));
        assert_eq!(store.records_of("Loader::Category").len(), 1);
    }

    #[test]
    fn test_has_many_override_replaces_cell_links() {
        let mut loader = loader();
        let parsed = ParsedFile::from_slices(&["Title", "Labels"], &[&["A", "Design|Build"]]);
        let options = LoadOptions::default().with_override("labels", "Fixed");

        let report = loader.load_parsed(&parsed, &options).unwrap();
        assert_eq!(report.succeeded(), 1);

        let store = loader.backend();
        let saved = store.get(report.loaded[0].id).unwrap();
        let links = saved.related_many("labels");
        assert_eq!(links.len(), 1);
        assert_eq!(store.get(links[0].id).unwrap().get("name"), Some(&Value::from("Fixed")));
    }

    #[test]
    fn test_failed_row_discards_created_associations() {
        let mut loader = loader();
        let parsed = ParsedFile::from_slices(
            &["Title", "Category", "Value As Integer"],
            &[&["A", "OrphanCat", "abc"], &["", "OrphanCat2", ""], &["C", "Kept", "3"]],
        );

        let report = loader.load_parsed(&parsed, &LoadOptions::default()).unwrap();

        assert_eq!(report.failed(), 2);
        assert!(report.committed);
        let names: Vec<String> = loader
            .backend()
            .records_of("Loader::Category")
            .iter()
            .filter_map(|r| r.get("name").map(Value::to_text))
            .collect();
        assert_eq!(names, vec!["Kept"]);
    }

    #[test]
    fn test_invalid_options_rejected_before_rows() {
        let mut loader = loader();
        let parsed = ParsedFile::from_slices(&["Title", "Labels"], &[&["A", "Build"]]);
        let options: LoadOptions =
            serde_json::from_str(r#"{"multi_value_delimiter": ""}"#).unwrap();

        let err = loader.load_parsed(&parsed, &options).unwrap_err();

        assert!(matches!(err, ImportError::ConfigValueError { .. }));
        assert_eq!(loader.report().processed, 0);
        assert!(loader.backend().records_of("Loader::Label").is_empty());
        assert!(!loader.backend().in_transaction());
    }

    #[test]
    fn test_unmapped_slot_warns_for_every_row() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::WARN)
            .finish();

        let mut loader = loader();
        let parsed = ParsedFile::from_slices(&["Title", "Notes"], &[&["A", "ignored"], &["B", ""]]);
        let report = tracing::subscriber::with_default(subscriber, || {
            loader.load_parsed(&parsed, &LoadOptions::default()).unwrap()
        });

        assert_eq!(report.succeeded(), 2);
        assert_eq!(logs.text().matches("列未映射，跳过单元格").count(), 2);
    }

    #[test]
    fn test_row_index_follows_source_positions() {
        let mut loader = loader();
        let mut parsed = ParsedFile::from_slices(
            &["Title", "Value As Integer"],
            &[&["A", "1"], &["B", "x"]],
        );
        parsed.positions = vec![0, 2];
        parsed.skipped_blank = 1;

        let report = loader.load_parsed(&parsed, &LoadOptions::default()).unwrap();

        assert_eq!(report.processed, 2);
        assert_eq!(report.skipped_blank, 1);
        assert_eq!(report.failures[0].row_index, 2);
    }
}
