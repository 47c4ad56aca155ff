// ==========================================
// 批量数据导入引擎 - 导入会话领域模型
// ==========================================
// 对象: 阶段 / 结果 / 统计 / 解析文件 / 提交批次 / 审计报告
// ==========================================

use crate::domain::record::{FieldIssue, MappedRecord, RowStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// ==========================================
// ImportStage - 向导阶段
// ==========================================
// 顺序: upload → mapping → validation → import
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportStage {
    Upload,
    Mapping,
    Validation,
    Import,
}

impl ImportStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upload => "upload",
            Self::Mapping => "mapping",
            Self::Validation => "validation",
            Self::Import => "import",
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Self::Upload => 0,
            Self::Mapping => 1,
            Self::Validation => 2,
            Self::Import => 3,
        }
    }
}

impl fmt::Display for ImportStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 导入阶段结果
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ImportOutcome {
    #[default]
    Pending,
    Complete { imported: usize },
    Failed { message: String },
}

// ==========================================
// ImportStats - 汇总统计（派生，不存储）
// ==========================================
// 恒等式: valid + skipped == total
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ImportStats {
    pub total: usize,
    pub valid: usize,
    pub errors: usize,
    pub warnings: usize,
    pub duplicates: usize,
    pub skipped: usize,
    pub imported: usize,
}

/// 源文件标识
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FileIdentity {
    pub name: String,
    pub size_bytes: Option<u64>,
}

impl FileIdentity {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            size_bytes: None,
        }
    }
}

// ==========================================
// ParsedFile - 外部解析器输出
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ParsedFile {
    pub source: FileIdentity,
    pub headers: Vec<String>,
    pub rows: Vec<HashMap<String, String>>,
}

// ==========================================
// CommitBatch - 交给持久化协作方的整批数据
// ==========================================
// 红线: 每个非试运行会话只提交一次，行顺序与 ParsedRow 一致
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitBatch {
    pub batch_id: String,
    pub target: String,
    pub unique_key: String,
    pub file_name: String,
    pub rows: Vec<MappedRecord>,
}

impl CommitBatch {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// 已落库批次（审计）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportBatchRecord {
    pub batch_id: String,
    pub target: String,
    pub file_name: String,
    pub row_count: usize,
    pub imported_at: DateTime<Utc>,
}

/// 审阅表单行
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowReport {
    pub ordinal: usize,
    pub status: RowStatus,
    pub will_import: bool,
    pub errors: Vec<FieldIssue>,
    pub warnings: Vec<FieldIssue>,
}

// ==========================================
// ImportReport - 会话审计报告
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportReport {
    pub session_id: String,
    pub target: String,
    pub file_name: String,
    pub stage: ImportStage,
    pub outcome: ImportOutcome,
    pub dry_run: bool,
    pub skip_duplicates: bool,
    pub stats: ImportStats,
    pub rows: Vec<RowReport>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}
