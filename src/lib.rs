//! honyaku - 网页翻译库
//!
//! 从 HTML 文档与脚本载荷中提取待翻译文本片段，经持久化缓存与
//! 批量翻译服务取得译文，再写回原结构。入口为
//! [`TranslationService`]。
//!
//! ```no_run
//! use std::sync::Arc;
//! use honyaku::{TranslationConfig, TranslationService};
//!
//! # async fn run() -> honyaku::TranslationResult<()> {
//! let service = TranslationService::with_defaults(TranslationConfig::discover())?;
//! let translated = service
//!     .translate_document("<p>こんにちは</p>", "English")
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod parsers;
pub mod translation;

pub use translation::{
    CacheStore, MemoryStore, ProviderError, RedbStore, TranslationConfig, TranslationError,
    TranslationProvider, TranslationResult, TranslationService,
};
