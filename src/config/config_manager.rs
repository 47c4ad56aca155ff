// ==========================================
// 批量数据导入引擎 - 配置管理器
// ==========================================
// 职责: 导入配置加载、查询、覆写
// 存储: config_kv 表 (key-value + scope)
// 规则: 键缺失或值非法时回退默认值（非法值记录告警）
// ==========================================

use crate::config::import_config_trait::{ImportConfigReader, ImportSettings};
use crate::db::{bootstrap_schema, configure_sqlite_connection, open_sqlite_connection};
use crate::importer::schema_registry::SchemaRegistry;
use anyhow::{anyhow, Context};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tracing::warn;

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例（必要时建表）
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> anyhow::Result<Self> {
        let conn = open_sqlite_connection(db_path)
            .with_context(|| format!("打开数据库失败: {}", db_path))?;
        bootstrap_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> anyhow::Result<Self> {
        {
            let conn_guard = conn.lock().map_err(|e| anyhow!("锁获取失败: {}", e))?;
            configure_sqlite_connection(&conn_guard)?;
            bootstrap_schema(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_global_config_value(&self, key: &str) -> anyhow::Result<Option<String>> {
        let conn = self.conn.lock().map_err(|e| anyhow!("锁获取失败: {}", e))?;

        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 写入 global scope 配置（UPSERT）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let conn = self.conn.lock().map_err(|e| anyhow!("锁获取失败: {}", e))?;

        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    /// 读取并解析配置值，缺失或非法时返回默认值
    fn get_parsed_or_default<T>(&self, key: &str, default: T) -> anyhow::Result<T>
    where
        T: FromStr + Copy + std::fmt::Debug,
    {
        let Some(raw) = self.get_global_config_value(key)? else {
            return Ok(default);
        };

        match raw.trim().parse::<T>() {
            Ok(value) => Ok(value),
            Err(_) => {
                warn!(key, value = %raw, default = ?default, "配置值非法，使用默认值");
                Ok(default)
            }
        }
    }

    fn get_bool_or_default(&self, key: &str, default: bool) -> anyhow::Result<bool> {
        let Some(raw) = self.get_global_config_value(key)? else {
            return Ok(default);
        };

        match raw.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => {
                warn!(key, value = %raw, default, "配置值非法，使用默认值");
                Ok(default)
            }
        }
    }

    /// 加载目标 Schema 注册表
    ///
    /// # 返回
    /// - config_kv 中存在 import_schemas（JSON）: 以其为准
    /// - 否则: 内置 products / contacts / employees
    pub fn load_schema_registry(&self) -> anyhow::Result<SchemaRegistry> {
        match self.get_global_config_value(config_keys::IMPORT_SCHEMAS)? {
            Some(json) => Ok(SchemaRegistry::from_json(&json)?),
            None => Ok(SchemaRegistry::builtin()),
        }
    }
}

#[async_trait]
impl ImportConfigReader for ConfigManager {
    async fn get_skip_duplicates(&self) -> anyhow::Result<bool> {
        self.get_bool_or_default(
            config_keys::SKIP_DUPLICATES,
            ImportSettings::default().skip_duplicates,
        )
    }

    async fn get_dry_run(&self) -> anyhow::Result<bool> {
        self.get_bool_or_default(config_keys::DRY_RUN, ImportSettings::default().dry_run)
    }

    async fn get_commit_timeout_ms(&self) -> anyhow::Result<u64> {
        self.get_parsed_or_default(
            config_keys::COMMIT_TIMEOUT_MS,
            ImportSettings::default().commit_timeout_ms,
        )
    }

    async fn get_validation_workers(&self) -> anyhow::Result<usize> {
        let workers = self.get_parsed_or_default(
            config_keys::VALIDATION_WORKERS,
            ImportSettings::default().validation_workers,
        )?;
        Ok(workers.max(1))
    }

    async fn get_header_offset(&self) -> anyhow::Result<usize> {
        self.get_parsed_or_default(
            config_keys::HEADER_OFFSET,
            ImportSettings::default().header_offset,
        )
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    pub const SKIP_DUPLICATES: &str = "import_skip_duplicates";
    pub const DRY_RUN: &str = "import_dry_run";
    pub const COMMIT_TIMEOUT_MS: &str = "import_commit_timeout_ms";
    pub const VALIDATION_WORKERS: &str = "import_validation_workers";
    pub const HEADER_OFFSET: &str = "import_header_offset";
    pub const IMPORT_SCHEMAS: &str = "import_schemas";
}
