// ==========================================
// 批量数据导入引擎 - 导入配置读取 Trait
// ==========================================
// 职责: 定义导入会话所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

// ==========================================
// ImportSettings - 会话默认配置快照
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSettings {
    /// 重复行是否默认跳过
    pub skip_duplicates: bool,
    /// 是否默认试运行（不落库）
    pub dry_run: bool,
    /// 提交超时（毫秒，0 = 不限）
    pub commit_timeout_ms: u64,
    /// 行校验线程数（1 = 顺序）
    pub validation_workers: usize,
    /// 表头占用行数（首个数据行行号 = offset + 1）
    pub header_offset: usize,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            skip_duplicates: true,
            dry_run: false,
            commit_timeout_ms: 30_000,
            validation_workers: 1,
            header_offset: 1,
        }
    }
}

impl ImportSettings {
    pub fn commit_timeout(&self) -> Option<Duration> {
        match self.commit_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}

// ==========================================
// ImportConfigReader Trait
// ==========================================
// 用途: 导入会话所需的配置读取接口
// 实现者: ConfigManager（从 config_kv 表读取）, StaticImportConfig
#[async_trait]
pub trait ImportConfigReader: Send + Sync {
    /// 获取重复行默认处理方式
    ///
    /// # 默认值
    /// - true（跳过重复行）
    async fn get_skip_duplicates(&self) -> anyhow::Result<bool>;

    /// 获取默认试运行开关
    ///
    /// # 默认值
    /// - false
    async fn get_dry_run(&self) -> anyhow::Result<bool>;

    /// 获取提交超时（毫秒）
    ///
    /// # 默认值
    /// - 30000（0 表示不限）
    async fn get_commit_timeout_ms(&self) -> anyhow::Result<u64>;

    /// 获取行校验线程数
    ///
    /// # 默认值
    /// - 1（顺序执行）
    async fn get_validation_workers(&self) -> anyhow::Result<usize>;

    /// 获取表头行偏移
    ///
    /// # 默认值
    /// - 1
    async fn get_header_offset(&self) -> anyhow::Result<usize>;

    /// 汇总读取全部导入配置
    async fn load_settings(&self) -> anyhow::Result<ImportSettings> {
        Ok(ImportSettings {
            skip_duplicates: self.get_skip_duplicates().await?,
            dry_run: self.get_dry_run().await?,
            commit_timeout_ms: self.get_commit_timeout_ms().await?,
            validation_workers: self.get_validation_workers().await?,
            header_offset: self.get_header_offset().await?,
        })
    }
}

// ==========================================
// StaticImportConfig - 内存配置
// ==========================================
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticImportConfig {
    pub settings: ImportSettings,
}

impl StaticImportConfig {
    pub fn new(settings: ImportSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl ImportConfigReader for StaticImportConfig {
    async fn get_skip_duplicates(&self) -> anyhow::Result<bool> {
        Ok(self.settings.skip_duplicates)
    }

    async fn get_dry_run(&self) -> anyhow::Result<bool> {
        Ok(self.settings.dry_run)
    }

    async fn get_commit_timeout_ms(&self) -> anyhow::Result<u64> {
        Ok(self.settings.commit_timeout_ms)
    }

    async fn get_validation_workers(&self) -> anyhow::Result<usize> {
        Ok(self.settings.validation_workers)
    }

    async fn get_header_offset(&self) -> anyhow::Result<usize> {
        Ok(self.settings.header_offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = ImportSettings::default();

        assert!(settings.skip_duplicates);
        assert!(!settings.dry_run);
        assert_eq!(settings.commit_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(settings.header_offset, 1);
    }

    #[test]
    fn test_zero_timeout_means_unbounded() {
        let settings = ImportSettings {
            commit_timeout_ms: 0,
            ..ImportSettings::default()
        };
        assert_eq!(settings.commit_timeout(), None);
    }

    #[tokio::test]
    async fn test_static_config_load_settings() {
        let settings = ImportSettings {
            dry_run: true,
            validation_workers: 4,
            ..ImportSettings::default()
        };
        let config = StaticImportConfig::new(settings);

        assert_eq!(config.load_settings().await.unwrap(), settings);
    }
}
