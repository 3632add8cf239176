//! 翻译存储模块

pub mod cache;
pub mod store;

pub use cache::{cache_key, CacheLayer, CacheStatsSnapshot, TranslationEntry};
pub use store::{CacheStore, MemoryStore, RedbStore};
