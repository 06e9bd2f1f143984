// ==========================================
// 表格数据导入系统 - 运行选项
// ==========================================
// 职责: 单次导入运行的策略开关（全部可选,带默认值）
// 来源: 调用方直接构造 / JSON 反序列化 / config_kv 合并
// ==========================================

use crate::config::import_config_trait::ImportConfigReader;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::inflection::normalize;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// 多值单元格默认分隔符
pub const DEFAULT_MULTI_VALUE_DELIMITER: &str = "|";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    /// 试运行: 正常处理,结束时总是回滚
    pub dummy_run: bool,
    /// 表头中必须存在的列
    pub mandatory: Vec<String>,
    /// 目录无对应能力时仍强制映射的列
    pub force_inclusion: Vec<String>,
    /// 所有表头列强制映射（优先于 force_inclusion）
    pub include_all: bool,
    /// 非必填列无法映射时报错
    pub strict: bool,
    /// 失败行回显到 stderr
    pub verbose: bool,
    /// 行未提供时使用的默认值（操作符名 -> 原始文本）
    pub defaults: BTreeMap<String, String>,
    /// 绑定完成后强制覆盖的值（操作符名 -> 原始文本）
    pub overrides: BTreeMap<String, String>,
    pub multi_value_delimiter: String,
    /// 关联记录不存在时自动创建
    pub create_missing_associations: bool,
    /// 额外日期格式（chrono 格式串,优先于内置格式）
    pub date_formats: Vec<String>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            dummy_run: false,
            mandatory: Vec::new(),
            force_inclusion: Vec::new(),
            include_all: false,
            strict: false,
            verbose: false,
            defaults: BTreeMap::new(),
            overrides: BTreeMap::new(),
            multi_value_delimiter: DEFAULT_MULTI_VALUE_DELIMITER.to_string(),
            create_missing_associations: true,
            date_formats: Vec::new(),
        }
    }
}

impl LoadOptions {
    pub fn dry_run(mut self) -> Self {
        self.dummy_run = true;
        self
    }

    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    pub fn include_all(mut self) -> Self {
        self.include_all = true;
        self
    }

    pub fn with_mandatory<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.mandatory.extend(columns.into_iter().map(Into::into));
        self
    }

    pub fn with_force_inclusion<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.force_inclusion
            .extend(columns.into_iter().map(Into::into));
        self
    }

    pub fn with_default(mut self, operator: impl Into<String>, raw: impl Into<String>) -> Self {
        self.defaults.insert(operator.into(), raw.into());
        self
    }

    pub fn with_override(mut self, operator: impl Into<String>, raw: impl Into<String>) -> Self {
        self.overrides.insert(operator.into(), raw.into());
        self
    }

    /// 是否为必填列（规范化比较）
    pub fn is_mandatory(&self, column: &str) -> bool {
        contains_normalized(&self.mandatory, column)
    }

    /// 是否为强制映射列（规范化比较）
    pub fn is_forced(&self, column: &str) -> bool {
        contains_normalized(&self.force_inclusion, column)
    }

    /// 合并配置源中的值（配置中存在的键覆盖当前值）
    ///
    /// # 参数
    /// - reader: 配置读取器
    /// - model: 目标类型限定名（读取模型级作用域）
    pub fn apply_config(
        &mut self,
        reader: &dyn ImportConfigReader,
        model: &str,
    ) -> ImportResult<()> {
        let read_err = |e: Box<dyn std::error::Error>| ImportError::ConfigReadError(e.to_string());

        if let Some(v) = reader.get_dummy_run(model).map_err(read_err)? {
            self.dummy_run = v;
        }
        if let Some(v) = reader.get_strict(model).map_err(read_err)? {
            self.strict = v;
        }
        if let Some(v) = reader.get_include_all(model).map_err(read_err)? {
            self.include_all = v;
        }
        if let Some(v) = reader.get_mandatory_columns(model).map_err(read_err)? {
            self.mandatory = v;
        }
        if let Some(v) = reader.get_force_inclusion(model).map_err(read_err)? {
            self.force_inclusion = v;
        }
        if let Some(v) = reader.get_multi_value_delimiter(model).map_err(read_err)? {
            self.multi_value_delimiter = v;
        }
        if let Some(v) = reader
            .get_create_missing_associations(model)
            .map_err(read_err)?
        {
            self.create_missing_associations = v;
        }
        if let Some(v) = reader.get_date_formats(model).map_err(read_err)? {
            self.date_formats = v;
        }
        // 默认值按操作符合并，调用方显式给出的优先
        for (operator, raw) in reader.get_default_values(model).map_err(read_err)? {
            self.defaults.entry(operator).or_insert(raw);
        }

        debug!(model = %model, options = ?self, "运行选项已合并配置");
        self.validate()
    }

    /// 校验选项取值（任何来源构造的选项在导入前都经过这里）
    pub fn validate(&self) -> ImportResult<()> {
        if self.multi_value_delimiter.is_empty() {
            return Err(ImportError::ConfigValueError {
                key: "multi_value_delimiter".to_string(),
                value: self.multi_value_delimiter.clone(),
                message: "分隔符不能为空".to_string(),
            });
        }
        if let Some(format) = self.date_formats.iter().find(|f| f.trim().is_empty()) {
            return Err(ImportError::ConfigValueError {
                key: "date_formats".to_string(),
                value: format.clone(),
                message: "日期格式不能为空".to_string(),
            });
        }
        Ok(())
    }
}

fn contains_normalized(columns: &[String], column: &str) -> bool {
    let target = normalize(column);
    columns.iter().any(|c| normalize(c) == target)
}
