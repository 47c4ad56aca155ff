// ==========================================
// 批量数据导入引擎 - 重复检测器
// ==========================================
// 职责: 唯一键值 ∈ 已存在键集合 的成员检测
// 红线: 调用方负责提供完整且已小写化的键集合
// ==========================================

use crate::importer::import_trait::DuplicateDetector;
use std::collections::HashSet;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExistingKeySet {
    keys: HashSet<String>,
}

impl ExistingKeySet {
    pub fn new(keys: HashSet<String>) -> Self {
        Self { keys }
    }

    /// 由任意大小写的键构造（统一小写化）
    pub fn from_raw<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            keys: keys
                .into_iter()
                .map(|k| k.as_ref().trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl DuplicateDetector for ExistingKeySet {
    fn is_duplicate(&self, lowercased_key: &str) -> bool {
        self.keys.contains(lowercased_key)
    }
}

impl DuplicateDetector for HashSet<String> {
    fn is_duplicate(&self, lowercased_key: &str) -> bool {
        self.contains(lowercased_key)
    }
}
