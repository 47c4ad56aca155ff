// ==========================================
// 批量数据导入引擎 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 定位: 表格文件 → 目标 Schema 的映射、校验、整批导入
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - Schema / 行记录 / 会话对象
pub mod domain;

// 导入层 - 引擎组件与会话编排
pub mod importer;

// 配置层 - 导入默认配置
pub mod config;

// 数据仓储层 - 导入落库
pub mod repository;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// ==========================================
// 重导出核心类型
// ==========================================

pub use domain::{
    ColumnMapping, CommitBatch, FieldSpec, FieldType, ImportOutcome, ImportReport, ImportStage,
    ImportStats, MappedRecord, OnBlank, ParsedFile, ParsedRow, RawRow, RowStatus, TargetSchema,
    TransformerKind, ValidatorKind,
};

pub use importer::{
    ColumnMapper, ExistingKeySet, FieldPipeline, ImportCommitter, ImportError, ImportResult,
    ImportSession, SchemaRegistry, UniversalFileParser,
};

pub use config::{ConfigManager, ImportConfigReader, ImportSettings};
pub use repository::SqliteImportRepository;

// ==========================================
// 常量定义
// ==========================================

// 版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 名称
pub const APP_NAME: &str = "批量数据导入引擎";
