// ==========================================
// 批量数据导入引擎 - 文件解析器实现
// ==========================================
// 阶段: upload（文件 → 表头 + 原始行）
// 支持: CSV (.csv) / Excel (.xlsx/.xls/.ods)
// 规则: 表头与单元格 TRIM；缺失单元格补空串；完全空白行跳过
// ==========================================

use crate::domain::import::{FileIdentity, ParsedFile};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::import_trait::FileParser;
use calamine::{open_workbook_auto, Reader};
use csv::ReaderBuilder;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::debug;

fn file_identity(path: &Path) -> FileIdentity {
    FileIdentity {
        name: path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string(),
        size_bytes: std::fs::metadata(path).ok().map(|m| m.len()),
    }
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

fn ensure_exists(path: &Path) -> ImportResult<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(ImportError::FileNotFound(path.display().to_string()))
    }
}

/// 按表头组装一行；完全空白返回 None
fn assemble_row<I, S>(headers: &[String], cells: I) -> Option<HashMap<String, String>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut row: HashMap<String, String> = headers
        .iter()
        .filter(|h| !h.is_empty())
        .map(|h| (h.clone(), String::new()))
        .collect();

    for (header, cell) in headers.iter().zip(cells) {
        if !header.is_empty() {
            row.insert(header.clone(), cell.as_ref().trim().to_string());
        }
    }

    if row.values().all(|v| v.is_empty()) {
        None
    } else {
        Some(row)
    }
}

// ==========================================
// CSV Parser 实现
// ==========================================
pub struct CsvParser;

impl CsvParser {
    /// 从任意 Reader 解析（上传字节流等）
    pub fn parse_reader<R: Read>(&self, reader: R, source: FileIdentity) -> ImportResult<ParsedFile> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true) // 允许行长度不一致
            .from_reader(reader);

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().trim_start_matches('\u{feff}').to_string())
            .collect();

        if headers.iter().all(|h| h.is_empty()) {
            return Err(ImportError::ParseError("file has no header row".to_string()));
        }

        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result?;
            if let Some(row) = assemble_row(&headers, record.iter()) {
                rows.push(row);
            }
        }

        debug!(file = %source.name, headers = headers.len(), rows = rows.len(), "CSV 解析完成");
        Ok(ParsedFile {
            source,
            headers,
            rows,
        })
    }
}

impl FileParser for CsvParser {
    fn parse_file(&self, file_path: &Path) -> ImportResult<ParsedFile> {
        ensure_exists(file_path)?;

        let ext = extension(file_path);
        if ext != "csv" {
            return Err(ImportError::UnsupportedFormat(ext));
        }

        let file = File::open(file_path)?;
        self.parse_reader(file, file_identity(file_path))
    }
}

// ==========================================
// Excel Parser 实现
// ==========================================
pub struct ExcelParser;

impl FileParser for ExcelParser {
    fn parse_file(&self, file_path: &Path) -> ImportResult<ParsedFile> {
        ensure_exists(file_path)?;

        let ext = extension(file_path);
        if !matches!(ext.as_str(), "xlsx" | "xls" | "ods") {
            return Err(ImportError::UnsupportedFormat(ext));
        }

        let mut workbook = open_workbook_auto(file_path)?;

        // 读取第一个 sheet
        let sheet_name = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| ImportError::ParseError("workbook has no sheets".to_string()))?;
        let range = workbook.worksheet_range(&sheet_name)?;

        let mut rows_iter = range.rows();
        let header_row = rows_iter
            .next()
            .ok_or_else(|| ImportError::ParseError("sheet is empty".to_string()))?;
        let headers: Vec<String> = header_row
            .iter()
            .map(|cell| cell.to_string().trim().to_string())
            .collect();

        if headers.iter().all(|h| h.is_empty()) {
            return Err(ImportError::ParseError("file has no header row".to_string()));
        }

        let rows: Vec<HashMap<String, String>> = rows_iter
            .filter_map(|data_row| {
                assemble_row(&headers, data_row.iter().map(|cell| cell.to_string()))
            })
            .collect();

        let source = file_identity(file_path);
        debug!(file = %source.name, sheet = %sheet_name, rows = rows.len(), "Excel 解析完成");
        Ok(ParsedFile {
            source,
            headers,
            rows,
        })
    }
}

// ==========================================
// 通用文件解析器（根据扩展名自动选择）
// ==========================================
pub struct UniversalFileParser;

impl FileParser for UniversalFileParser {
    fn parse_file(&self, file_path: &Path) -> ImportResult<ParsedFile> {
        match extension(file_path).as_str() {
            "csv" => CsvParser.parse_file(file_path),
            "xlsx" | "xls" | "ods" => ExcelParser.parse_file(file_path),
            other => Err(ImportError::UnsupportedFormat(other.to_string())),
        }
    }
}
