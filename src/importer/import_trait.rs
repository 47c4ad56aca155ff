// ==========================================
// 批量数据导入引擎 - 导入协作方 Trait
// ==========================================
// 职责: 定义引擎与外部协作方的接口（不包含实现）
// - FileParser: 文件字节 → 表头 + 原始行
// - DuplicateDetector: 唯一键成员检测
// - ImportCommitter: 整批持久化
// ==========================================

use crate::domain::import::{CommitBatch, ParsedFile};
use crate::importer::error::ImportResult;
use async_trait::async_trait;
use std::path::Path;

// ==========================================
// FileParser Trait
// ==========================================
// 用途: upload 阶段文件解析
// 实现者: CsvParser, ExcelParser
pub trait FileParser: Send + Sync {
    /// 解析文件为表头 + 行记录（HashMap<列名, 值>）
    ///
    /// # 返回
    /// - Ok(ParsedFile): 表头（原顺序）+ 数据行（已 TRIM，已跳过空白行）
    /// - Err: FileNotFound / UnsupportedFormat / ParseError
    fn parse_file(&self, file_path: &Path) -> ImportResult<ParsedFile>;
}

// ==========================================
// DuplicateDetector Trait
// ==========================================
// 用途: 行校验器查询唯一键是否已存在
// 实现者: ExistingKeySet
pub trait DuplicateDetector: Send + Sync {
    /// 纯成员检测
    ///
    /// # 参数
    /// - lowercased_key: 已小写化的唯一键值
    fn is_duplicate(&self, lowercased_key: &str) -> bool;
}

// ==========================================
// ImportCommitter Trait
// ==========================================
// 用途: import 阶段整批落库（每个非试运行会话调用一次）
// 实现者: SqliteImportRepository
// 约束: 返回的 future 在完成前被丢弃（超时）时，不得留下已提交的记录
#[async_trait]
pub trait ImportCommitter: Send + Sync {
    /// 提交整批记录
    ///
    /// # 返回
    /// - Ok(usize): 存储方确认写入的记录数
    /// - Err: 存储失败（整批视为失败）
    async fn commit(&self, batch: CommitBatch) -> anyhow::Result<usize>;
}
