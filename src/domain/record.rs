// ==========================================
// 批量数据导入引擎 - 行记录领域模型
// ==========================================
// 用途: 导入管道中间产物（解析 → 映射校验 → ParsedRow）
// 生命周期: 仅在单次导入会话内
// ==========================================

use crate::domain::schema::TargetSchema;
use crate::importer::error::{ImportError, ImportResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

// ==========================================
// RawRow - 源文件原始行
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRow {
    /// 行号（1 起始，已计入表头偏移）
    pub ordinal: usize,
    /// 源列名 → 原始值
    pub values: HashMap<String, String>,
}

impl RawRow {
    pub fn new(ordinal: usize, values: HashMap<String, String>) -> Self {
        Self { ordinal, values }
    }

    /// 由解析器输出批量构造
    ///
    /// # 参数
    /// - rows: 数据行（不含表头）
    /// - header_offset: 表头占用行数（通常为 1，首个数据行行号即为 2）
    pub fn from_parsed(rows: Vec<HashMap<String, String>>, header_offset: usize) -> Vec<Self> {
        rows.into_iter()
            .enumerate()
            .map(|(idx, values)| Self::new(idx + 1 + header_offset, values))
            .collect()
    }

    /// 读取源列值（已 TRIM；缺列视为空串）
    pub fn value(&self, header: &str) -> &str {
        self.values.get(header).map(|v| v.trim()).unwrap_or("")
    }
}

// ==========================================
// MappedRecord - 转换后的目标记录
// ==========================================
// 红线: 键集合必须是 Schema 字段 key 的子集
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MappedRecord {
    values: Map<String, Value>,
}

impl MappedRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// 由任意键值构造，拒绝 Schema 之外的键
    pub fn from_values(schema: &TargetSchema, values: Map<String, Value>) -> ImportResult<Self> {
        let mut record = Self::new();
        for (key, value) in values {
            record.insert(schema, &key, value)?;
        }
        Ok(record)
    }

    /// 写入字段值（校验键属于 Schema）
    pub fn insert(&mut self, schema: &TargetSchema, key: &str, value: Value) -> ImportResult<()> {
        if !schema.has_field(key) {
            return Err(ImportError::UnknownField {
                target: schema.name.clone(),
                field: key.to_string(),
            });
        }
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    /// 行校验器内部写入（调用方保证 key 来自 Schema 字段遍历）
    pub(crate) fn put(&mut self, key: &str, value: Value) {
        self.values.insert(key.to_string(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// 字段值的文本形式（字符串原样，其它 JSON 值取其字面量）
    pub fn text(&self, key: &str) -> Option<String> {
        self.values.get(key).map(|value| match value {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.values
    }
}

/// 字段级问题（错误或警告）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldIssue {
    pub field: String,
    pub message: String,
}

impl FieldIssue {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

// ==========================================
// RowStatus - 审阅表行状态
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowStatus {
    Valid,
    Duplicate,
    Error,
}

// ==========================================
// ParsedRow - 校验后的行
// ==========================================
// 红线: errors 为字段局部，一个字段失败不影响同行其它字段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedRow {
    pub ordinal: usize,
    pub source: HashMap<String, String>,
    pub mapped: MappedRecord,
    pub errors: Vec<FieldIssue>,
    pub warnings: Vec<FieldIssue>,
    pub is_duplicate: bool,
}

impl ParsedRow {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// 是否计入 valid（无错误，且非重复或不跳过重复）
    pub fn is_importable(&self, skip_duplicates: bool) -> bool {
        !self.has_errors() && (!self.is_duplicate || !skip_duplicates)
    }

    pub fn status(&self) -> RowStatus {
        if self.has_errors() {
            RowStatus::Error
        } else if self.is_duplicate {
            RowStatus::Duplicate
        } else {
            RowStatus::Valid
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::schema::{FieldSpec, FieldType};
    use serde_json::json;

    fn schema() -> TargetSchema {
        TargetSchema {
            name: "Sample".to_string(),
            description: String::new(),
            fields: vec![
                FieldSpec::new("sku", "SKU", FieldType::String),
                FieldSpec::new("qty", "Quantity", FieldType::Number),
            ],
            unique_key: "sku".to_string(),
        }
    }

    #[test]
    fn test_raw_rows_from_parsed_offset() {
        let rows = vec![HashMap::new(), HashMap::new()];
        let raw = RawRow::from_parsed(rows, 1);

        assert_eq!(raw[0].ordinal, 2);
        assert_eq!(raw[1].ordinal, 3);
    }

    #[test]
    fn test_raw_row_value_trimmed_and_missing() {
        let mut values = HashMap::new();
        values.insert("SKU".to_string(), "  A1 ".to_string());
        let row = RawRow::new(2, values);

        assert_eq!(row.value("SKU"), "A1");
        assert_eq!(row.value("Missing"), "");
    }

    #[test]
    fn test_mapped_record_rejects_unknown_key() {
        let mut values = Map::new();
        values.insert("sku".to_string(), json!("A1"));
        values.insert("colour".to_string(), json!("red"));

        let result = MappedRecord::from_values(&schema(), values);
        assert!(matches!(result, Err(ImportError::UnknownField { .. })));
    }

    #[test]
    fn test_mapped_record_text() {
        let mut record = MappedRecord::new();
        record.insert(&schema(), "qty", json!(12)).unwrap();
        record.insert(&schema(), "sku", json!("A1")).unwrap();

        assert_eq!(record.text("qty"), Some("12".to_string()));
        assert_eq!(record.text("sku"), Some("A1".to_string()));
        assert_eq!(record.text("missing"), None);
    }

    #[test]
    fn test_parsed_row_importable() {
        let mut row = ParsedRow {
            ordinal: 2,
            source: HashMap::new(),
            mapped: MappedRecord::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
            is_duplicate: true,
        };

        assert!(row.is_importable(false));
        assert!(!row.is_importable(true));
        assert_eq!(row.status(), RowStatus::Duplicate);

        row.errors.push(FieldIssue::new("sku", "SKU is required"));
        assert!(!row.is_importable(false));
        assert_eq!(row.status(), RowStatus::Error);
    }
}
