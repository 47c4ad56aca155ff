// ==========================================
// 批量数据导入引擎 - 配置层
// ==========================================
// 职责: 导入会话默认配置 + Schema 定义加载
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod import_config_trait;

pub use config_manager::{config_keys, ConfigManager};
pub use import_config_trait::{ImportConfigReader, ImportSettings, StaticImportConfig};
