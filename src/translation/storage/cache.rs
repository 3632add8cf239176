//! 翻译缓存层（cache-aside）
//!
//! 去重后的片段先并发查询存储；命中项直接合并进结果，距上次使用
//! 超过刷新间隔的命中项在后台重写 lastUsedAt 并重置 TTL；未命中项
//! 合并为一次批量翻译调用，译文异步回写。后台写入失败只记日志，
//! 不影响本次请求。

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::translation::client::BatchTranslator;
use crate::translation::error::TranslationResult;
use crate::translation::storage::store::CacheStore;

/// 缓存记录（持久化为 camelCase JSON，时间戳为 ISO-8601）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationEntry {
    /// 译文
    pub translated_text: String,
    /// 首次翻译时刻，刷新时保持不变
    pub created_at: DateTime<Utc>,
    /// 最近使用时刻
    pub last_used_at: DateTime<Utc>,
}

/// 缓存键：目标语言 + 原文 blake3 摘要
pub fn cache_key(target_lang: &str, value: &str) -> String {
    format!("{}:{}", target_lang, blake3::hash(value.as_bytes()).to_hex())
}

/// 缓存层统计
#[derive(Debug, Default)]
pub struct CacheStats {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub refreshes: AtomicU64,
}

/// 统计快照
#[derive(Debug, Clone, Copy)]
pub struct CacheStatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub refreshes: u64,
}

/// 缓存层
pub struct CacheLayer {
    store: Arc<dyn CacheStore>,
    client: BatchTranslator,
    ttl: Duration,
    refresh_interval: Duration,
    stats: Arc<CacheStats>,
}

impl CacheLayer {
    pub fn new(
        store: Arc<dyn CacheStore>,
        client: BatchTranslator,
        ttl: Duration,
        refresh_interval: Duration,
    ) -> Self {
        Self {
            store,
            client,
            ttl,
            refresh_interval,
            stats: Arc::new(CacheStats::default()),
        }
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.stats.hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            refreshes: self.stats.refreshes.load(Ordering::Relaxed),
        }
    }

    /// 解析一组原文到译文的映射
    ///
    /// 输入应已去重。返回的映射覆盖所有输入值；翻译失败且回退开启时
    /// 对应值为原文本身。
    pub async fn resolve(
        &self,
        values: Vec<String>,
        target_lang: &str,
    ) -> TranslationResult<HashMap<String, String>> {
        if values.is_empty() {
            return Ok(HashMap::new());
        }

        let mut result: HashMap<String, String> = HashMap::with_capacity(values.len());
        let mut misses: Vec<String> = Vec::new();

        // 并发独立读取
        let lookups = values.iter().map(|value| {
            let key = cache_key(target_lang, value);
            let store = Arc::clone(&self.store);
            async move { store.get(&key).await }
        });
        let cached = futures::future::join_all(lookups).await;

        let now = Utc::now();
        for (value, raw) in values.into_iter().zip(cached) {
            let entry = raw.and_then(|raw| match serde_json::from_str::<TranslationEntry>(&raw) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!("缓存记录格式异常，按未命中处理: {}", e);
                    None
                }
            });

            match entry {
                Some(entry) => {
                    self.stats.hits.fetch_add(1, Ordering::Relaxed);
                    if now.signed_duration_since(entry.last_used_at)
                        >= chrono::Duration::seconds(self.refresh_interval.as_secs() as i64)
                    {
                        self.spawn_refresh(&value, target_lang, &entry);
                    }
                    result.insert(value, entry.translated_text);
                }
                None => {
                    self.stats.misses.fetch_add(1, Ordering::Relaxed);
                    misses.push(value);
                }
            }
        }

        if misses.is_empty() {
            return Ok(result);
        }

        tracing::debug!("缓存未命中 {} 条，进入批量翻译", misses.len());
        let outcome = self.client.translate(misses, target_lang).await?;

        for (value, translation) in &outcome.translations {
            result.insert(value.clone(), translation.clone());
        }

        // 回退结果不落盘：服务恢复后下次请求重新翻译
        let genuine: HashMap<String, String> = outcome
            .translations
            .into_iter()
            .filter(|(value, _)| !outcome.fallbacks.contains(value))
            .collect();
        if !genuine.is_empty() {
            self.spawn_write_back(genuine, target_lang);
        }

        Ok(result)
    }

    /// 后台刷新 lastUsedAt（createdAt 保持不变），同时重置 TTL
    fn spawn_refresh(&self, value: &str, target_lang: &str, entry: &TranslationEntry) {
        let store = Arc::clone(&self.store);
        let stats = Arc::clone(&self.stats);
        let key = cache_key(target_lang, value);
        let ttl = self.ttl;
        let refreshed = TranslationEntry {
            translated_text: entry.translated_text.clone(),
            created_at: entry.created_at,
            last_used_at: Utc::now(),
        };

        tokio::spawn(async move {
            match serde_json::to_string(&refreshed) {
                Ok(raw) => {
                    if let Err(e) = store.put(&key, &raw, ttl).await {
                        tracing::warn!("缓存刷新写入失败: {}", e);
                    } else {
                        stats.refreshes.fetch_add(1, Ordering::Relaxed);
                    }
                }
                Err(e) => tracing::warn!("缓存记录序列化失败: {}", e),
            }
        });
    }

    /// 后台回写新译文
    fn spawn_write_back(&self, translated: HashMap<String, String>, target_lang: &str) {
        let store = Arc::clone(&self.store);
        let target_lang = target_lang.to_string();
        let ttl = self.ttl;

        tokio::spawn(async move {
            let now = Utc::now();
            for (value, translation) in translated {
                let entry = TranslationEntry {
                    translated_text: translation,
                    created_at: now,
                    last_used_at: now,
                };
                let raw = match serde_json::to_string(&entry) {
                    Ok(raw) => raw,
                    Err(e) => {
                        tracing::warn!("缓存记录序列化失败: {}", e);
                        continue;
                    }
                };
                let key = cache_key(&target_lang, &value);
                if let Err(e) = store.put(&key, &raw, ttl).await {
                    tracing::warn!("缓存回写失败: {}", e);
                }
            }
        });
    }
}
