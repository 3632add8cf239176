//! 页面翻译模块
//!
//! 对外暴露翻译服务、配置与可注入的存储/翻译后端接口。

pub mod client;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod service;
pub mod storage;

pub use client::{BatchOutcome, BatchTranslator, ChatApiProvider, ProviderError, TranslationProvider};
pub use config::TranslationConfig;
pub use error::{TranslationError, TranslationResult};
pub use service::{PipelineStatsSnapshot, TranslationService};
pub use storage::{cache_key, CacheLayer, CacheStore, MemoryStore, RedbStore, TranslationEntry};
