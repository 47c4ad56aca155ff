// ==========================================
// 批量数据导入引擎 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 说明: 行级字段错误/重复警告不走此类型，记录在 ParsedRow 中
// ==========================================

use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== Schema / 注册表错误 =====
    #[error("unknown import target: {0}")]
    UnknownTarget(String),

    #[error("invalid schema {target}: {message}")]
    InvalidSchema { target: String, message: String },

    #[error("unknown field {field} for target {target}")]
    UnknownField { target: String, field: String },

    // ===== 文件相关错误（upload 阶段）=====
    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("unsupported file format: {0} (only .csv/.xlsx/.xls)")]
    UnsupportedFormat(String),

    #[error("failed to parse file: {0}")]
    ParseError(String),

    // ===== 列映射错误（mapping 阶段）=====
    #[error("required fields are not mapped: {}", fields.join(", "))]
    MappingGap { fields: Vec<String> },

    #[error("column not present in file: {0}")]
    UnknownHeader(String),

    #[error("column {header} is already mapped to field {field}")]
    HeaderAlreadyMapped { header: String, field: String },

    // ===== 阶段流转错误 =====
    #[error("cannot move from {from} to {to}")]
    InvalidStageTransition { from: String, to: String },

    #[error("no valid rows to import")]
    NoValidRows,

    #[error("import session is closed")]
    SessionClosed,

    // ===== 持久化错误（import 阶段）=====
    #[error("import failed: {0}")]
    PersistenceError(String),

    #[error("import timed out after {0} ms")]
    CommitTimeout(u64),

    // ===== 配置错误 =====
    #[error("config value error (key: {key}): {message}")]
    ConfigValueError { key: String, message: String },

    // ===== 通用错误 =====
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ImportError {
    /// 是否为 upload 阶段的解析类错误
    pub fn is_parse_error(&self) -> bool {
        matches!(
            self,
            ImportError::FileNotFound(_)
                | ImportError::UnsupportedFormat(_)
                | ImportError::ParseError(_)
        )
    }
}

impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::ParseError(err.to_string())
    }
}

impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::ParseError(err.to_string())
    }
}

impl From<calamine::Error> for ImportError {
    fn from(err: calamine::Error) -> Self {
        ImportError::ParseError(err.to_string())
    }
}

impl From<calamine::XlsxError> for ImportError {
    fn from(err: calamine::XlsxError) -> Self {
        ImportError::ParseError(err.to_string())
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
