//! 集成测试公共设施
//!
//! 提供可注入的翻译服务替身与测试用配置。

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use honyaku::translation::client::ProviderError;
use honyaku::translation::config::TranslationConfig;
use honyaku::TranslationProvider;

/// 响应行为
pub enum MockBehavior {
    /// 按字典逐行翻译，字典缺失时返回 `[lang]原文` 形式
    Dictionary,
    /// 每次调用前 `fail_times` 次返回指定错误
    FailThenSucceed { fail_times: u64 },
    /// 永远失败
    AlwaysFail,
    /// 响应丢掉最后一行（行数不符场景）
    DropLastLine,
}

/// 测试用翻译服务替身
pub struct MockProvider {
    dictionary: HashMap<String, String>,
    behavior: MockBehavior,
    calls: AtomicU64,
    failures_injected: AtomicU64,
    retryable_error: bool,
}

impl MockProvider {
    pub fn with_dictionary(pairs: &[(&str, &str)]) -> Arc<Self> {
        Arc::new(Self {
            dictionary: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            behavior: MockBehavior::Dictionary,
            calls: AtomicU64::new(0),
            failures_injected: AtomicU64::new(0),
            retryable_error: true,
        })
    }

    pub fn with_behavior(pairs: &[(&str, &str)], behavior: MockBehavior) -> Arc<Self> {
        Arc::new(Self {
            dictionary: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            behavior,
            calls: AtomicU64::new(0),
            failures_injected: AtomicU64::new(0),
            retryable_error: true,
        })
    }

    /// 使注入的错误不可重试
    pub fn with_non_retryable_failures(pairs: &[(&str, &str)], behavior: MockBehavior) -> Arc<Self> {
        Arc::new(Self {
            dictionary: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            behavior,
            calls: AtomicU64::new(0),
            failures_injected: AtomicU64::new(0),
            retryable_error: false,
        })
    }

    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    fn make_error(&self) -> ProviderError {
        if self.retryable_error {
            ProviderError::Server {
                status: 502,
                message: "injected failure".to_string(),
            }
        } else {
            ProviderError::BadRequest("injected failure".to_string())
        }
    }

    fn translate_line(&self, line: &str) -> String {
        self.dictionary
            .get(line)
            .cloned()
            .unwrap_or_else(|| format!("[en]{}", line))
    }
}

#[async_trait]
impl TranslationProvider for MockProvider {
    async fn chat(&self, _system: &str, user: &str) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        match &self.behavior {
            MockBehavior::Dictionary => {}
            MockBehavior::AlwaysFail => return Err(self.make_error()),
            MockBehavior::FailThenSucceed { fail_times } => {
                if self.failures_injected.fetch_add(1, Ordering::SeqCst) < *fail_times {
                    return Err(self.make_error());
                }
            }
            MockBehavior::DropLastLine => {
                let mut lines: Vec<String> =
                    user.lines().map(|l| self.translate_line(l)).collect();
                lines.pop();
                return Ok(lines.join("\n"));
            }
        }

        Ok(user
            .lines()
            .map(|l| self.translate_line(l))
            .collect::<Vec<String>>()
            .join("\n"))
    }
}

/// 快速测试配置：短退避，小批次可按需覆盖
pub fn test_config() -> TranslationConfig {
    TranslationConfig {
        retry_base_delay_ms: 1,
        retry_max_delay_ms: 5,
        ..Default::default()
    }
}

/// 等待后台写入任务落盘
pub async fn settle() {
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
}

/// 初始化测试日志（重复调用安全）
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}
