//! 缓存存储后端
//!
//! `CacheStore` 是键值存储的最小接口：按键读取、带 TTL 写入。
//! `RedbStore` 提供嵌入式持久化（进程重启后仍然有效），
//! `MemoryStore` 供测试与无持久化部署使用。过期采用惰性策略，
//! 读取时发现过期即删除并按未命中处理。

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use redb::{Database, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};

use crate::translation::error::{TranslationError, TranslationResult};

const TRANSLATIONS_TABLE: TableDefinition<&str, &str> = TableDefinition::new("translations");

/// 键值缓存存储接口
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// 读取键对应的值，不存在或已过期时返回 None
    async fn get(&self, key: &str) -> Option<String>;

    /// 写入键值，`ttl` 为从现在起的存活时间
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> TranslationResult<()>;
}

/// redb 持久化记录：过期时刻 + 负载
#[derive(Serialize, Deserialize)]
struct StoredRecord {
    expires_at: u64,
    payload: String,
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// 基于 redb 的持久化存储
pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    /// 打开（或创建）指定路径的数据库
    pub fn open<P: AsRef<Path>>(path: P) -> TranslationResult<Self> {
        let db = Database::create(path.as_ref())
            .map_err(|e| TranslationError::CacheError(format!("打开缓存数据库失败: {}", e)))?;
        Ok(Self { db: Arc::new(db) })
    }

    fn read_record(db: &Database, key: &str) -> Option<String> {
        let txn = db.begin_read().ok()?;
        let table = match txn.open_table(TRANSLATIONS_TABLE) {
            Ok(table) => table,
            // 首次写入前表不存在
            Err(redb::TableError::TableDoesNotExist(_)) => return None,
            Err(e) => {
                tracing::warn!("读取缓存表失败: {}", e);
                return None;
            }
        };

        let raw = table.get(key).ok()??.value().to_string();
        drop(table);
        drop(txn);

        let record: StoredRecord = match serde_json::from_str(&raw) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!("缓存记录损坏，按未命中处理: {}", e);
                let _ = Self::delete_record(db, key);
                return None;
            }
        };

        if record.expires_at <= unix_now() {
            let _ = Self::delete_record(db, key);
            return None;
        }

        Some(record.payload)
    }

    fn write_record(db: &Database, key: &str, value: &str, ttl: Duration) -> TranslationResult<()> {
        let record = StoredRecord {
            expires_at: unix_now().saturating_add(ttl.as_secs()),
            payload: value.to_string(),
        };
        let raw = serde_json::to_string(&record)
            .map_err(|e| TranslationError::CacheError(format!("序列化缓存记录失败: {}", e)))?;

        let txn = db
            .begin_write()
            .map_err(|e| TranslationError::CacheError(format!("开启写事务失败: {}", e)))?;
        {
            let mut table = txn
                .open_table(TRANSLATIONS_TABLE)
                .map_err(|e| TranslationError::CacheError(format!("打开缓存表失败: {}", e)))?;
            table
                .insert(key, raw.as_str())
                .map_err(|e| TranslationError::CacheError(format!("写入缓存失败: {}", e)))?;
        }
        txn.commit()
            .map_err(|e| TranslationError::CacheError(format!("提交写事务失败: {}", e)))?;
        Ok(())
    }

    fn delete_record(db: &Database, key: &str) -> TranslationResult<()> {
        let txn = db
            .begin_write()
            .map_err(|e| TranslationError::CacheError(format!("开启写事务失败: {}", e)))?;
        {
            let mut table = txn
                .open_table(TRANSLATIONS_TABLE)
                .map_err(|e| TranslationError::CacheError(format!("打开缓存表失败: {}", e)))?;
            table
                .remove(key)
                .map_err(|e| TranslationError::CacheError(format!("删除缓存记录失败: {}", e)))?;
        }
        txn.commit()
            .map_err(|e| TranslationError::CacheError(format!("提交写事务失败: {}", e)))?;
        Ok(())
    }
}

#[async_trait]
impl CacheStore for RedbStore {
    async fn get(&self, key: &str) -> Option<String> {
        let db = Arc::clone(&self.db);
        let key = key.to_string();
        // redb 事务是同步的，移出异步工作线程
        tokio::task::spawn_blocking(move || RedbStore::read_record(&db, &key))
            .await
            .unwrap_or_else(|e| {
                tracing::warn!("缓存读取任务失败: {}", e);
                None
            })
    }

    async fn put(&self, key: &str, value: &str, ttl: Duration) -> TranslationResult<()> {
        let db = Arc::clone(&self.db);
        let key = key.to_string();
        let value = value.to_string();
        tokio::task::spawn_blocking(move || RedbStore::write_record(&db, &key, &value, ttl))
            .await
            .map_err(|e| TranslationError::CacheError(format!("缓存写入任务失败: {}", e)))?
    }
}

/// 存储访问统计
#[derive(Debug, Default)]
pub struct StoreStats {
    pub gets: AtomicU64,
    pub hits: AtomicU64,
    pub puts: AtomicU64,
}

/// 内存存储（测试与无持久化部署）
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, (String, Instant)>>,
    stats: StoreStats,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// (读取次数, 命中次数, 写入次数)
    pub fn stats(&self) -> (u64, u64, u64) {
        (
            self.stats.gets.load(Ordering::Relaxed),
            self.stats.hits.load(Ordering::Relaxed),
            self.stats.puts.load(Ordering::Relaxed),
        )
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Option<String> {
        self.stats.gets.fetch_add(1, Ordering::Relaxed);

        let expired = {
            let entries = match self.entries.read() {
                Ok(entries) => entries,
                Err(_) => return None,
            };
            match entries.get(key) {
                Some((value, expires_at)) => {
                    if Instant::now() < *expires_at {
                        self.stats.hits.fetch_add(1, Ordering::Relaxed);
                        return Some(value.clone());
                    }
                    true
                }
                None => false,
            }
        };

        if expired {
            if let Ok(mut entries) = self.entries.write() {
                entries.remove(key);
            }
        }
        None
    }

    async fn put(&self, key: &str, value: &str, ttl: Duration) -> TranslationResult<()> {
        self.stats.puts.fetch_add(1, Ordering::Relaxed);
        let mut entries = self
            .entries
            .write()
            .map_err(|_| TranslationError::CacheError("内存存储锁中毒".into()))?;
        entries.insert(
            key.to_string(),
            (value.to_string(), Instant::now() + ttl),
        );
        Ok(())
    }
}
