//! 翻译模块错误类型

use thiserror::Error;

/// 翻译过程中可能出现的错误
#[derive(Error, Debug)]
pub enum TranslationError {
    #[error("配置错误: {0}")]
    ConfigError(String),

    #[error("网络请求失败: {0}")]
    NetworkError(String),

    #[error("翻译服务频率限制")]
    RateLimitExceeded,

    #[error("翻译服务错误: {0}")]
    ProviderError(String),

    #[error("请求格式错误: {0}")]
    InvalidRequest(String),

    #[error("认证失败: {0}")]
    AuthError(String),

    #[error("请求超时")]
    TimeoutError,

    #[error("批次翻译失败: {0}")]
    BatchFailed(String),

    #[error("缓存操作失败: {0}")]
    CacheError(String),

    #[error("解析错误: {0}")]
    ParseError(String),
}

/// 翻译结果类型
pub type TranslationResult<T> = Result<T, TranslationError>;
