// ==========================================
// 表格数据导入系统 - 导入组件 Trait
// ==========================================
// 职责: 定义导入管道各协作组件接口（不包含实现）
// ==========================================

use crate::domain::{LoadReport, RecordRef, RowFailure, Value, ValueType};
use crate::importer::error::ImportResult;
use crate::importer::file_parser::ParsedFile;
use std::path::Path;

// ==========================================
// FileParser Trait
// ==========================================
// 用途: 文件解析接口（阶段 0）
// 实现者: CsvParser, ExcelParser
pub trait FileParser: Send + Sync {
    /// 解析文件为表头 + 按位置对齐的数据行
    ///
    /// # 参数
    /// - file_path: 文件路径
    ///
    /// # 返回
    /// - Ok(ParsedFile): 表头与数据行
    /// - Err: 文件读取错误、格式错误
    fn parse(&self, file_path: &Path) -> ImportResult<ParsedFile>;
}

// ==========================================
// ValueCoercer Trait
// ==========================================
// 用途: 单元格值强制转换（阶段 2）
// 实现者: DefaultValueCoercer
pub trait ValueCoercer: Send + Sync {
    /// 将原始单元格文本转换为目标值类型
    ///
    /// # 参数
    /// - raw: 原始文本（未清洗）
    /// - value_type: 目标类型；None 表示未知类型，按字符串处理
    /// - field: 字段名（用于错误信息）
    /// - row: 行号（用于错误信息）
    ///
    /// # 返回
    /// - Ok(Value::Null): 空白单元格
    /// - Ok(Value): 转换成功
    /// - Err: 类型转换错误（绑定错误，行级隔离）
    fn coerce(
        &self,
        raw: &str,
        value_type: Option<ValueType>,
        field: &str,
        row: usize,
    ) -> ImportResult<Value>;

    /// 拆分多值单元格（has_many 列）
    fn split_multi(&self, raw: &str) -> Vec<String>;
}

// ==========================================
// Reporter Trait
// ==========================================
// 用途: 导入结果累计与渲染
// 实现者: LoadReporter
pub trait Reporter: Send {
    /// 开始新一轮运行，清空计数
    fn reset(&mut self, run_id: &str, model: &str);

    /// 记录来源文件名
    fn set_file_name(&mut self, file_name: Option<String>);

    fn increment_processed(&mut self);

    /// 记录解析阶段跳过的空白行数
    fn record_skipped(&mut self, count: usize);

    fn record_success(&mut self, reference: RecordRef);

    fn record_failure(&mut self, failure: RowFailure);

    /// 定稿（写入结束时间与事务结果）
    fn finalize(&mut self, dry_run: bool, committed: bool);

    fn report(&self) -> &LoadReport;

    /// 渲染汇总文本
    fn render(&self) -> String;
}
