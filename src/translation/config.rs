//! 翻译配置
//!
//! 所有运行参数集中在 `TranslationConfig`，可从 TOML 文件加载，
//! 缺省值定义在 `constants` 模块。启发式阈值（字面量长度上限、
//! 源文字符比例）同样是配置项而非硬编码。

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::translation::error::{TranslationError, TranslationResult};

/// 配置常量
pub mod constants {
    /// 不参与文本提取的元素
    pub const SKIP_ELEMENTS: &[&str] = &[
        "style", "script", "noscript", "code", "kbd", "samp", "template",
    ];

    /// 参与翻译的属性
    pub const TRANSLATABLE_ATTRS: &[&str] = &[
        "alt",
        "title",
        "placeholder",
        "aria-label",
        "aria-description",
        "content",
    ];

    /// 识别为结构化数据的 script type
    pub const STRUCTURED_DATA_TYPES: &[&str] = &["application/ld+json", "application/json"];

    /// 识别为水合数据的 script id
    pub const HYDRATION_DATA_IDS: &[&str] = &["__NEXT_DATA__", "__NUXT_DATA__"];

    /// 默认 API 地址
    pub const DEFAULT_API_URL: &str = "http://localhost:11434/v1/chat/completions";

    /// 默认模型
    pub const DEFAULT_MODEL: &str = "qwen2.5:7b";

    /// 默认请求超时（秒）
    pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

    /// 每批次的片段数
    pub const DEFAULT_BATCH_SIZE: usize = 20;

    /// 并发批次上限
    pub const DEFAULT_MAX_CONCURRENT_BATCHES: usize = 3;

    /// 单批次失败后的最大重试次数（不含初次尝试）
    pub const DEFAULT_MAX_RETRIES: u32 = 3;

    /// 重试退避基准延迟（毫秒）
    pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 500;

    /// 重试退避延迟上限（毫秒）
    pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 8000;

    /// 提示词上下文样本条数
    pub const DEFAULT_CONTEXT_SAMPLE_SIZE: usize = 10;

    /// 默认缓存文件路径
    pub const DEFAULT_CACHE_PATH: &str = "translation-cache.redb";

    /// 缓存记录存活时间（秒），30 天
    pub const DEFAULT_CACHE_TTL_SECS: u64 = 30 * 24 * 60 * 60;

    /// 命中后重写 lastUsedAt 的最小间隔（秒），24 小时
    pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 24 * 60 * 60;

    /// 脚本字面量参与翻译的长度上限（字符）
    pub const MAX_SCRIPT_LITERAL_CHARS: usize = 200;

    /// 脚本字面量中源文字符的最低比例
    pub const SCRIPT_CHAR_RATIO: f64 = 0.2;

    /// 比例规则生效的最小非空白字符数
    pub const SCRIPT_RATIO_MIN_CHARS: usize = 10;

    /// 配置文件查找路径
    pub const CONFIG_PATHS: &[&str] = &["honyaku.toml", "config/honyaku.toml"];
}

/// 翻译配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationConfig {
    /// 翻译服务地址（chat completions 端点）
    pub api_url: String,
    /// API 密钥
    pub api_key: Option<String>,
    /// 模型名称
    pub model: String,
    /// 单次请求超时（秒）
    pub request_timeout_secs: u64,
    /// 每批次片段数
    pub batch_size: usize,
    /// 并发批次上限
    pub max_concurrent_batches: usize,
    /// 单批次失败后的最大重试次数（不含初次尝试）
    pub max_retries: u32,
    /// 退避基准延迟（毫秒）
    pub retry_base_delay_ms: u64,
    /// 退避延迟上限（毫秒）
    pub retry_max_delay_ms: u64,
    /// 批次重试耗尽后是否以原文回退
    pub fallback_on_failure: bool,
    /// 提示词上下文样本条数
    pub context_sample_size: usize,
    /// 缓存文件路径
    pub cache_path: String,
    /// 缓存记录存活时间（秒）
    pub cache_ttl_secs: u64,
    /// 命中后重写 lastUsedAt 的最小间隔（秒）
    pub refresh_interval_secs: u64,
    /// 脚本字面量长度上限（字符）
    pub max_script_literal_chars: usize,
    /// 脚本字面量源文字符最低比例
    pub script_char_ratio: f64,
    /// 不参与提取的元素
    pub skip_elements: Vec<String>,
    /// 参与翻译的属性
    pub translatable_attrs: Vec<String>,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            api_url: constants::DEFAULT_API_URL.to_string(),
            api_key: None,
            model: constants::DEFAULT_MODEL.to_string(),
            request_timeout_secs: constants::DEFAULT_REQUEST_TIMEOUT_SECS,
            batch_size: constants::DEFAULT_BATCH_SIZE,
            max_concurrent_batches: constants::DEFAULT_MAX_CONCURRENT_BATCHES,
            max_retries: constants::DEFAULT_MAX_RETRIES,
            retry_base_delay_ms: constants::DEFAULT_RETRY_BASE_DELAY_MS,
            retry_max_delay_ms: constants::DEFAULT_RETRY_MAX_DELAY_MS,
            fallback_on_failure: true,
            context_sample_size: constants::DEFAULT_CONTEXT_SAMPLE_SIZE,
            cache_path: constants::DEFAULT_CACHE_PATH.to_string(),
            cache_ttl_secs: constants::DEFAULT_CACHE_TTL_SECS,
            refresh_interval_secs: constants::DEFAULT_REFRESH_INTERVAL_SECS,
            max_script_literal_chars: constants::MAX_SCRIPT_LITERAL_CHARS,
            script_char_ratio: constants::SCRIPT_CHAR_RATIO,
            skip_elements: constants::SKIP_ELEMENTS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            translatable_attrs: constants::TRANSLATABLE_ATTRS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl TranslationConfig {
    /// 从 TOML 文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> TranslationResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| TranslationError::ConfigError(format!("读取配置文件失败: {}", e)))?;
        toml::from_str(&content)
            .map_err(|e| TranslationError::ConfigError(format!("解析配置文件失败: {}", e)))
    }

    /// 按约定路径查找并加载配置，找不到时返回默认配置
    pub fn discover() -> Self {
        for path in constants::CONFIG_PATHS {
            if Path::new(path).exists() {
                match Self::from_file(path) {
                    Ok(config) => {
                        tracing::info!("已加载配置文件: {}", path);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("配置文件 {} 无效: {}", path, e);
                    }
                }
            }
        }
        Self::default()
    }

    /// 基本合法性检查
    pub fn validate(&self) -> TranslationResult<()> {
        if self.api_url.is_empty() {
            return Err(TranslationError::ConfigError("api_url 不能为空".into()));
        }
        if self.batch_size == 0 {
            return Err(TranslationError::ConfigError("batch_size 必须大于 0".into()));
        }
        if self.max_concurrent_batches == 0 {
            return Err(TranslationError::ConfigError(
                "max_concurrent_batches 必须大于 0".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.script_char_ratio) {
            return Err(TranslationError::ConfigError(
                "script_char_ratio 必须在 0 到 1 之间".into(),
            ));
        }
        Ok(())
    }
}
