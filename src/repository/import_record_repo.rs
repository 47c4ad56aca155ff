// ==========================================
// 批量数据导入引擎 - 导入记录 Repository
// ==========================================
// 职责: 导入批次落库、已存在唯一键查询（使用 rusqlite）
// 红线: Repository 不含业务规则，只做数据 CRUD
// 事务: 一次 commit = 一个事务（import_batch + 全部 import_record）
// 取消: 提交 future 被丢弃（超时）时置位取消信号并中断连接，整批回滚
// ==========================================

use crate::db::{bootstrap_schema, configure_sqlite_connection, open_sqlite_connection};
use crate::domain::import::{CommitBatch, ImportBatchRecord};
use crate::domain::record::MappedRecord;
use crate::importer::duplicate_detector::ExistingKeySet;
use crate::importer::import_trait::ImportCommitter;
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, InterruptHandle, Transaction};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// 唯一键存储形式（TRIM + 小写；空值存 NULL，不参与唯一约束）
fn unique_value(record: &MappedRecord, unique_key: &str) -> Option<String> {
    record
        .text(unique_key)
        .map(|v| v.trim().to_lowercase())
        .filter(|v| !v.is_empty())
}

// ==========================================
// SqliteImportRepository
// ==========================================
#[derive(Clone)]
pub struct SqliteImportRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteImportRepository {
    /// 创建新的 Repository 实例（必要时建表）
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        bootstrap_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建（与 ConfigManager 共享连接）
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        {
            let guard = lock(&conn)?;
            configure_sqlite_connection(&guard)?;
            bootstrap_schema(&guard)?;
        }
        Ok(Self { conn })
    }

    /// 目标已存在的唯一键集合（已小写化）
    pub fn existing_keys(&self, target: &str) -> RepositoryResult<HashSet<String>> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn.prepare(
            "SELECT unique_value FROM import_record WHERE target = ?1 AND unique_value IS NOT NULL",
        )?;

        let keys = stmt
            .query_map(params![target], |row| row.get::<_, String>(0))?
            .collect::<Result<HashSet<_>, _>>()?;
        Ok(keys)
    }

    /// 供重复检测使用的键集合
    pub fn existing_key_set(&self, target: &str) -> RepositoryResult<ExistingKeySet> {
        Ok(ExistingKeySet::new(self.existing_keys(target)?))
    }

    /// 目标下的记录数
    pub fn count_records(&self, target: &str) -> RepositoryResult<usize> {
        let conn = lock(&self.conn)?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM import_record WHERE target = ?1",
            params![target],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// 读取目标下的全部记录（按写入顺序）
    pub fn list_records(&self, target: &str) -> RepositoryResult<Vec<serde_json::Value>> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn.prepare(
            "SELECT payload_json FROM import_record WHERE target = ?1 ORDER BY record_id",
        )?;

        let payloads = stmt
            .query_map(params![target], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        payloads
            .iter()
            .map(|raw| serde_json::from_str(raw).map_err(RepositoryError::from))
            .collect()
    }

    /// 目标下的导入批次（新 → 旧）
    pub fn list_batches(&self, target: &str) -> RepositoryResult<Vec<ImportBatchRecord>> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn.prepare(
            r#"
            SELECT batch_id, target, file_name, row_count, imported_at
            FROM import_batch
            WHERE target = ?1
            ORDER BY imported_at DESC, batch_id
            "#,
        )?;

        let batches = stmt
            .query_map(params![target], |row| {
                Ok(ImportBatchRecord {
                    batch_id: row.get(0)?,
                    target: row.get(1)?,
                    file_name: row.get(2)?,
                    row_count: row.get::<_, i64>(3)? as usize,
                    imported_at: row.get::<_, DateTime<Utc>>(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(batches)
    }

    /// 整批写入（单事务；任一行失败则整批回滚）
    ///
    /// # 返回
    /// - Ok(usize): 写入的记录数
    pub fn insert_batch(&self, batch: &CommitBatch) -> RepositoryResult<usize> {
        self.insert_batch_with(batch, &CommitCancel::default())
    }

    /// 可取消的整批写入（每行及提交前检查取消信号）
    ///
    /// # 返回
    /// - Err(Cancelled): 取消信号已置位，事务已回滚
    pub fn insert_batch_with(
        &self,
        batch: &CommitBatch,
        cancel: &CommitCancel,
    ) -> RepositoryResult<usize> {
        let mut conn = lock(&self.conn)?;
        cancel.running.store(true, Ordering::SeqCst);
        let result = Self::write_batch(&mut conn, batch, cancel);
        cancel.running.store(false, Ordering::SeqCst);

        let count = result?;
        info!(batch_id = %batch.batch_id, import_target = %batch.target, rows = count, "导入批次已落库");
        Ok(count)
    }

    fn write_batch(
        conn: &mut Connection,
        batch: &CommitBatch,
        cancel: &CommitCancel,
    ) -> RepositoryResult<usize> {
        cancel.check()?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        let count = Self::insert_batch_tx(&tx, batch, cancel)?;

        // 未提交的事务随 tx 丢弃回滚
        cancel.check()?;
        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(count)
    }

    fn insert_batch_tx(
        tx: &Transaction,
        batch: &CommitBatch,
        cancel: &CommitCancel,
    ) -> RepositoryResult<usize> {
        let now = Utc::now();
        tx.execute(
            r#"
            INSERT INTO import_batch (batch_id, target, file_name, row_count, imported_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                batch.batch_id,
                batch.target,
                batch.file_name,
                batch.len() as i64,
                now
            ],
        )?;

        let mut stmt = tx.prepare(
            r#"
            INSERT INTO import_record (batch_id, target, unique_value, payload_json, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )?;

        let mut count = 0;
        for record in &batch.rows {
            cancel.check()?;
            let payload = serde_json::to_string(record)?;
            stmt.execute(params![
                batch.batch_id,
                batch.target,
                unique_value(record, &batch.unique_key),
                payload,
                now
            ])?;
            count += 1;
        }

        debug!(batch_id = %batch.batch_id, rows = count, "批次记录写入完成");
        Ok(count)
    }

    fn interrupt_handle(&self) -> RepositoryResult<InterruptHandle> {
        Ok(lock(&self.conn)?.get_interrupt_handle())
    }
}

// ==========================================
// CommitCancel - 整批写入取消信号
// ==========================================
#[derive(Debug, Default)]
pub struct CommitCancel {
    cancelled: AtomicBool,
    running: AtomicBool,
}

impl CommitCancel {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn check(&self) -> RepositoryResult<()> {
        if self.is_cancelled() {
            Err(RepositoryError::Cancelled("batch commit abandoned".to_string()))
        } else {
            Ok(())
        }
    }
}

/// 提交 future 未完成即被丢弃时取消写入
struct CancelOnDrop {
    signal: Arc<CommitCancel>,
    interrupt: InterruptHandle,
    armed: bool,
}

impl CancelOnDrop {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        self.signal.cancel();
        // 只中断本批次占用连接期间的语句
        if self.signal.running.load(Ordering::SeqCst) {
            self.interrupt.interrupt();
        }
        warn!("提交被放弃，批次写入回滚");
    }
}

fn lock(conn: &Arc<Mutex<Connection>>) -> RepositoryResult<MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|e| RepositoryError::LockError(e.to_string()))
}

#[async_trait]
impl ImportCommitter for SqliteImportRepository {
    async fn commit(&self, batch: CommitBatch) -> anyhow::Result<usize> {
        let signal = Arc::new(CommitCancel::default());
        let guard = CancelOnDrop {
            signal: Arc::clone(&signal),
            interrupt: self.interrupt_handle()?,
            armed: true,
        };

        let repo = self.clone();
        let result =
            tokio::task::spawn_blocking(move || repo.insert_batch_with(&batch, &signal)).await;
        guard.disarm();

        Ok(result??)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn repo() -> SqliteImportRepository {
        let conn = Connection::open_in_memory().unwrap();
        SqliteImportRepository::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    fn record(sku: &str) -> MappedRecord {
        let mut values = serde_json::Map::new();
        values.insert("sku".to_string(), json!(sku));
        values.insert("name".to_string(), json!("Widget"));
        serde_json::from_value(serde_json::Value::Object(values)).unwrap()
    }

    fn batch(skus: &[&str]) -> CommitBatch {
        CommitBatch {
            batch_id: uuid::Uuid::new_v4().to_string(),
            target: "Products".to_string(),
            unique_key: "sku".to_string(),
            file_name: "products.csv".to_string(),
            rows: skus.iter().map(|s| record(s)).collect(),
        }
    }

    #[test]
    fn test_insert_and_existing_keys_lowercased() {
        let repo = repo();

        assert_eq!(repo.insert_batch(&batch(&["SKU-1", "sku-2", ""])).unwrap(), 3);

        let keys = repo.existing_keys("Products").unwrap();
        assert_eq!(keys.len(), 2);
        assert!(keys.contains("sku-1"));
        assert_eq!(repo.count_records("Products").unwrap(), 3);
        assert_eq!(repo.list_batches("Products").unwrap()[0].row_count, 3);
    }

    #[test]
    fn test_repeated_keys_are_stored() {
        let repo = repo();
        repo.insert_batch(&batch(&["A1"])).unwrap();

        assert_eq!(repo.insert_batch(&batch(&["B1", "a1", "A1"])).unwrap(), 3);

        assert_eq!(repo.count_records("Products").unwrap(), 4);
        assert_eq!(repo.existing_keys("Products").unwrap().len(), 2);
        assert_eq!(repo.list_batches("Products").unwrap().len(), 2);
    }

    #[test]
    fn test_cancelled_signal_writes_nothing() {
        let repo = repo();
        let cancel = CommitCancel::default();
        cancel.cancel();

        let result = repo.insert_batch_with(&batch(&["A1", "A2"]), &cancel);

        assert!(matches!(result, Err(RepositoryError::Cancelled(_))));
        assert_eq!(repo.count_records("Products").unwrap(), 0);
        assert!(repo.list_batches("Products").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_abandoned_commit_rolls_back() {
        let repo = repo();
        let skus: Vec<String> = (0..50_000).map(|i| format!("S{}", i)).collect();
        let refs: Vec<&str> = skus.iter().map(String::as_str).collect();

        let result =
            tokio::time::timeout(Duration::from_millis(1), repo.commit(batch(&refs))).await;
        assert!(result.is_err(), "commit should still be running after 1ms");

        // 后台写入线程持锁期间 count 会等待其退出
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(repo.count_records("Products").unwrap(), 0);
        assert!(repo.list_batches("Products").unwrap().is_empty());

        // 连接仍可用
        assert_eq!(repo.commit(batch(&["X1"])).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_committer_impl() {
        let repo = repo();
        let imported = repo.commit(batch(&["X1", "X2"])).await.unwrap();

        assert_eq!(imported, 2);
        assert_eq!(repo.list_records("Products").unwrap()[1]["sku"], "X2");
    }
}
