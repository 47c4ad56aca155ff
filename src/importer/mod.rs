// ==========================================
// 批量数据导入引擎 - 导入层
// ==========================================
// 流程: 解析 → 列映射 → 字段管道 → 行校验(含重复检测) → 统计 → 整批提交
// 支持: CSV, Excel
// ==========================================

// 模块声明
pub mod column_mapper;
pub mod duplicate_detector;
pub mod error;
pub mod field_pipeline;
pub mod file_parser;
pub mod import_session;
pub mod import_trait;
pub mod row_validator;
pub mod schema_registry;
pub mod stats;
pub mod template;

// 重导出核心类型
pub use column_mapper::{AutoMapping, ColumnMapper, ContestedHeader};
pub use duplicate_detector::ExistingKeySet;
pub use error::{ImportError, ImportResult};
pub use field_pipeline::{CustomKinds, FieldOutcome, FieldPipeline};
pub use file_parser::{CsvParser, ExcelParser, UniversalFileParser};
pub use import_session::ImportSession;
pub use row_validator::RowValidator;
pub use schema_registry::SchemaRegistry;
pub use stats::compute_stats;
pub use template::{render_template, template_file_name};

// 重导出 Trait 接口
pub use import_trait::{DuplicateDetector, FileParser, ImportCommitter};
