// ==========================================
// 批量数据导入引擎 - 领域层
// ==========================================
// 职责: 纯数据类型（Schema / 行记录 / 列映射 / 会话）
// ==========================================

pub mod import;
pub mod mapping;
pub mod record;
pub mod schema;

pub use import::{
    CommitBatch, FileIdentity, ImportBatchRecord, ImportOutcome, ImportReport, ImportStage,
    ImportStats, ParsedFile, RowReport,
};
pub use mapping::ColumnMapping;
pub use record::{FieldIssue, MappedRecord, ParsedRow, RawRow, RowStatus};
pub use schema::{
    FieldSpec, FieldType, KeywordRule, OnBlank, TargetSchema, TransformerKind, ValidatorKind,
};
