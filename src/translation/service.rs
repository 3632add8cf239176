//! 翻译服务
//!
//! 流水线编排：解析 → 收集 → 缓存解析 → 回写 → 序列化。
//! 无待翻译片段的输入原样返回，不发起任何外部调用。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::parsers::html::{html_to_dom, serialize_document};
use crate::translation::client::{BatchTranslator, ChatApiProvider, TranslationProvider};
use crate::translation::config::TranslationConfig;
use crate::translation::error::TranslationResult;
use crate::translation::pipeline::apply::{Substitutor, SubstitutorConfig};
use crate::translation::pipeline::collector::{CollectorConfig, Fragment, FragmentCollector};
use crate::translation::storage::cache::CacheLayer;
use crate::translation::storage::store::{CacheStore, RedbStore};

/// 流水线统计
#[derive(Debug, Default)]
struct PipelineStats {
    documents: AtomicU64,
    script_payloads: AtomicU64,
    fragments_collected: AtomicU64,
}

/// 统计快照
#[derive(Debug, Clone, Copy)]
pub struct PipelineStatsSnapshot {
    pub documents: u64,
    pub script_payloads: u64,
    pub fragments_collected: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
}

/// 页面翻译服务
pub struct TranslationService {
    config: TranslationConfig,
    collector: FragmentCollector,
    cache: CacheLayer,
    stats: PipelineStats,
}

impl TranslationService {
    /// 以注入的存储与翻译服务构建
    pub fn new(
        config: TranslationConfig,
        store: Arc<dyn CacheStore>,
        provider: Arc<dyn TranslationProvider>,
    ) -> TranslationResult<Self> {
        config.validate()?;

        let client = BatchTranslator::new(provider, &config);
        let cache = CacheLayer::new(
            store,
            client,
            Duration::from_secs(config.cache_ttl_secs),
            Duration::from_secs(config.refresh_interval_secs),
        );
        let collector = FragmentCollector::new(CollectorConfig::from_translation_config(&config));

        Ok(Self {
            config,
            collector,
            cache,
            stats: PipelineStats::default(),
        })
    }

    /// 以默认后端构建：chat API 翻译服务 + redb 持久化缓存
    pub fn with_defaults(config: TranslationConfig) -> TranslationResult<Self> {
        let provider = Arc::new(ChatApiProvider::new(&config)?);
        let store = Arc::new(RedbStore::open(&config.cache_path)?);
        Self::new(config, store, provider)
    }

    /// 翻译 HTML 文档，返回序列化后的译文文档
    pub async fn translate_document(
        &self,
        markup: &str,
        target_lang: &str,
    ) -> TranslationResult<String> {
        self.stats.documents.fetch_add(1, Ordering::Relaxed);

        let dom = html_to_dom(markup.as_bytes(), String::new());
        let fragments = self.collector.collect_document(&dom);

        if fragments.is_empty() {
            tracing::debug!("文档无待翻译片段，原样返回");
            return Ok(markup.to_string());
        }

        tracing::info!("开始页面翻译: {} 条片段, 目标语言 {}", fragments.len(), target_lang);
        self.stats
            .fragments_collected
            .fetch_add(fragments.len() as u64, Ordering::Relaxed);

        let map = self
            .cache
            .resolve(fragment_values(&fragments), target_lang)
            .await?;

        let substitutor_config = SubstitutorConfig {
            skip_elements: self.config.skip_elements.clone(),
            translatable_attrs: self.config.translatable_attrs.clone(),
        };
        Substitutor::new(&map, substitutor_config).apply_document(&dom);

        Ok(serialize_document(&dom))
    }

    /// 翻译独立脚本载荷中的字符串字面量
    pub async fn translate_script_payload(
        &self,
        code: &str,
        target_lang: &str,
    ) -> TranslationResult<String> {
        self.stats.script_payloads.fetch_add(1, Ordering::Relaxed);

        let fragments = self.collector.collect_script_payload(code);
        if fragments.is_empty() {
            return Ok(code.to_string());
        }

        tracing::info!("开始脚本翻译: {} 条字面量", fragments.len());
        self.stats
            .fragments_collected
            .fetch_add(fragments.len() as u64, Ordering::Relaxed);

        let map = self
            .cache
            .resolve(fragment_values(&fragments), target_lang)
            .await?;

        let substitutor_config = SubstitutorConfig {
            skip_elements: self.config.skip_elements.clone(),
            translatable_attrs: self.config.translatable_attrs.clone(),
        };
        Ok(Substitutor::new(&map, substitutor_config).apply_script_payload(code))
    }

    /// 当前统计快照
    pub fn stats(&self) -> PipelineStatsSnapshot {
        let cache = self.cache.stats();
        PipelineStatsSnapshot {
            documents: self.stats.documents.load(Ordering::Relaxed),
            script_payloads: self.stats.script_payloads.load(Ordering::Relaxed),
            fragments_collected: self.stats.fragments_collected.load(Ordering::Relaxed),
            cache_hits: cache.hits,
            cache_misses: cache.misses,
        }
    }
}

/// 片段值列表（文本节点的值去除首尾空白，作为缓存与批次的键）
fn fragment_values(fragments: &[Fragment]) -> Vec<String> {
    fragments
        .iter()
        .map(|f| f.value.trim().to_string())
        .collect()
}
