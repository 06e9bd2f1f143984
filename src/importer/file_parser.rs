// ==========================================
// 表格数据导入系统 - 文件解析器实现
// ==========================================
// 阶段 0: 文件读取与解析
// 支持: Excel (.xlsx/.xls) / CSV (.csv)
// 约定: 第一行为表头,数据行按列位置与表头对齐
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use crate::importer::importer_trait::FileParser;
use calamine::{open_workbook_auto, Reader};
use csv::ReaderBuilder;
use std::fs::File;
use std::path::Path;

// ==========================================
// ParsedFile - 解析结果
// ==========================================
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedFile {
    pub file_name: Option<String>,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// 每个数据行在源文件中的序号（从 0 开始，不含表头）；为空时与 rows 下标一致
    pub positions: Vec<usize>,
    /// 解析时跳过的完全空白行数
    pub skipped_blank: usize,
}

impl ParsedFile {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            headers,
            rows,
            ..Self::default()
        }
    }

    /// 便捷构造（测试/内存数据）
    pub fn from_slices(headers: &[&str], rows: &[&[&str]]) -> Self {
        Self::new(
            headers.iter().map(|h| h.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// 第 index 个数据行在源文件中的序号
    pub fn position(&self, index: usize) -> usize {
        self.positions.get(index).copied().unwrap_or(index)
    }

    /// 追加源文件第 position 个数据行；完全空白的行只计数不保留
    fn push_row(&mut self, position: usize, row: Vec<String>) {
        if row.iter().all(|v| v.trim().is_empty()) {
            self.skipped_blank += 1;
            return;
        }
        self.rows.push(row);
        self.positions.push(position);
    }
}

const UTF8_BOM: char = '\u{feff}';

fn file_name_of(path: &Path) -> Option<String> {
    path.file_name().and_then(|n| n.to_str()).map(str::to_string)
}

// ==========================================
// CSV Parser 实现
// ==========================================
pub struct CsvParser;

impl FileParser for CsvParser {
    fn parse(&self, file_path: &Path) -> ImportResult<ParsedFile> {
        let path = file_path;

        // 检查文件存在
        if !path.exists() {
            return Err(ImportError::FileNotFound(path.display().to_string()));
        }

        // 检查扩展名
        if let Some(ext) = path.extension() {
            if !ext.eq_ignore_ascii_case("csv") {
                return Err(ImportError::UnsupportedFormat(
                    ext.to_string_lossy().to_string(),
                ));
            }
        }

        // 打开 CSV 文件
        let file = File::open(path)?;
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true) // 允许行长度不一致
            .from_reader(file);

        // 表头（Excel 导出的 CSV 可能带 BOM）
        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim_start_matches(UTF8_BOM).trim().to_string())
            .collect();

        if headers.iter().all(|h| h.is_empty()) {
            return Err(ImportError::MissingHeader);
        }

        let mut parsed = ParsedFile::new(headers, Vec::new());
        parsed.file_name = file_name_of(path);
        for (position, result) in reader.records().enumerate() {
            let record = result?;
            parsed.push_row(position, record.iter().map(str::to_string).collect());
        }

        Ok(parsed)
    }
}

// ==========================================
// Excel Parser 实现
// ==========================================
pub struct ExcelParser;

impl FileParser for ExcelParser {
    fn parse(&self, file_path: &Path) -> ImportResult<ParsedFile> {
        let path = file_path;

        // 检查文件存在
        if !path.exists() {
            return Err(ImportError::FileNotFound(path.display().to_string()));
        }

        // 检查扩展名
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        if ext != "xlsx" && ext != "xls" {
            return Err(ImportError::UnsupportedFormat(ext));
        }

        // 打开 Excel 文件（xlsx/xls 自动识别）
        let mut workbook = open_workbook_auto(path)?;

        // 读取第一个 sheet
        let sheet_names = workbook.sheet_names();
        let sheet_name = sheet_names
            .first()
            .cloned()
            .ok_or_else(|| ImportError::ExcelParseError("Excel 文件无工作表".to_string()))?;

        let range = workbook.worksheet_range(&sheet_name)?;

        // 提取表头（第一行）
        let mut rows_iter = range.rows();
        let header_row = rows_iter.next().ok_or(ImportError::MissingHeader)?;

        let headers: Vec<String> = header_row
            .iter()
            .map(|cell| cell.to_string().trim().to_string())
            .collect();

        let mut parsed = ParsedFile::new(headers, Vec::new());
        parsed.file_name = file_name_of(path);
        for (position, data_row) in rows_iter.enumerate() {
            parsed.push_row(position, data_row.iter().map(|cell| cell.to_string()).collect());
        }

        Ok(parsed)
    }
}

// ==========================================
// 通用文件解析器（根据扩展名自动选择）
// ==========================================
pub struct UniversalFileParser;

impl FileParser for UniversalFileParser {
    fn parse(&self, file_path: &Path) -> ImportResult<ParsedFile> {
        let ext = file_path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        match ext.as_str() {
            "csv" => CsvParser.parse(file_path),
            "xlsx" | "xls" => ExcelParser.parse(file_path),
            _ => Err(ImportError::UnsupportedFormat(ext)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    fn csv_file(lines: &[&str]) -> tempfile::NamedTempFile {
        let mut temp_file = Builder::new().suffix(".csv").tempfile().unwrap();
        for line in lines {
            writeln!(temp_file, "{}", line).unwrap();
        }
        temp_file
    }

    #[test]
    fn test_csv_parser_valid_file() {
        let temp_file = csv_file(&["Title,Category", "Widget,Gadgets", "Sprocket,Tools"]);

        let parsed = CsvParser.parse(temp_file.path()).unwrap();

        assert_eq!(parsed.headers, vec!["Title", "Category"]);
        assert_eq!(parsed.row_count(), 2);
        assert_eq!(parsed.rows[0], vec!["Widget", "Gadgets"]);
        assert!(parsed.file_name.unwrap().ends_with(".csv"));
    }

    #[test]
    fn test_csv_parser_short_rows_kept() {
        let temp_file = csv_file(&["Title,Category,Owner", "Widget"]);

        let parsed = CsvParser.parse(temp_file.path()).unwrap();

        // 短行保留原长度，缺失的尾部列由加载器视为空值
        assert_eq!(parsed.rows[0], vec!["Widget"]);
    }

    #[test]
    fn test_csv_parser_strips_bom() {
        let temp_file = csv_file(&["\u{feff}Title,Category", "Widget,Gadgets"]);

        let parsed = CsvParser.parse(temp_file.path()).unwrap();

        assert_eq!(parsed.headers[0], "Title");
    }

    #[test]
    fn test_csv_parser_file_not_found() {
        let result = CsvParser.parse(Path::new("non_existent.csv"));
        assert!(matches!(result, Err(ImportError::FileNotFound(_))));
    }

    #[test]
    fn test_csv_parser_skip_empty_rows() {
        let temp_file = csv_file(&["Title,Category", "Widget,Gadgets", ",", "Sprocket,Tools"]);

        let parsed = CsvParser.parse(temp_file.path()).unwrap();

        // 应跳过空行，并保留源文件中的行序号
        assert_eq!(parsed.row_count(), 2);
        assert_eq!(parsed.skipped_blank, 1);
        assert_eq!(parsed.position(0), 0);
        assert_eq!(parsed.position(1), 2);
    }

    #[test]
    fn test_universal_parser_rejects_unknown_extension() {
        let temp_file = Builder::new().suffix(".txt").tempfile().unwrap();
        let result = UniversalFileParser.parse(temp_file.path());
        assert!(matches!(result, Err(ImportError::UnsupportedFormat(ext)) if ext == "txt"));
    }
}
