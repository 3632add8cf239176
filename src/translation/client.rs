//! 批量翻译客户端
//!
//! 对接 chat completions 风格的翻译服务。请求按固定大小分批，
//! 由固定数量的工作任务并发消费；可重试错误按指数退避加抖动重试；
//! 重试耗尽后按配置以原文回退或使整次请求失败。响应按行号与请求
//! 值一一对应，行数不符时逐值以原文补齐。

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::translation::config::TranslationConfig;
use crate::translation::error::{TranslationError, TranslationResult};

/// 翻译服务调用错误
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("请求超时")]
    Timeout,

    #[error("频率限制")]
    RateLimited,

    #[error("服务端错误 {status}: {message}")]
    Server { status: u16, message: String },

    #[error("请求格式错误: {0}")]
    BadRequest(String),

    #[error("认证失败: {0}")]
    Auth(String),

    #[error("网络错误: {0}")]
    Network(String),

    #[error("响应格式异常: {0}")]
    MalformedResponse(String),
}

impl ProviderError {
    /// 超时、限流、服务端错误和网络错误可重试；
    /// 请求格式错误与认证失败重试也不会成功
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::Timeout
                | ProviderError::RateLimited
                | ProviderError::Server { .. }
                | ProviderError::Network(_)
        )
    }
}

impl From<ProviderError> for TranslationError {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::Timeout => TranslationError::TimeoutError,
            ProviderError::RateLimited => TranslationError::RateLimitExceeded,
            ProviderError::Server { status, message } => {
                TranslationError::ProviderError(format!("{}: {}", status, message))
            }
            ProviderError::BadRequest(msg) => TranslationError::InvalidRequest(msg),
            ProviderError::Auth(msg) => TranslationError::AuthError(msg),
            ProviderError::Network(msg) => TranslationError::NetworkError(msg),
            ProviderError::MalformedResponse(msg) => TranslationError::ParseError(msg),
        }
    }
}

/// 翻译服务接口（可注入，便于测试替身）
#[async_trait]
pub trait TranslationProvider: Send + Sync {
    /// 发送一次对话补全请求，返回助手消息正文
    async fn chat(&self, system: &str, user: &str) -> Result<String, ProviderError>;
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

/// chat completions 风格的 HTTP 翻译服务
pub struct ChatApiProvider {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    model: String,
}

impl ChatApiProvider {
    pub fn new(config: &TranslationConfig) -> TranslationResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| TranslationError::ConfigError(format!("构建 HTTP 客户端失败: {}", e)))?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl TranslationProvider for ChatApiProvider {
    async fn chat(&self, system: &str, user: &str) -> Result<String, ProviderError> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
            temperature: 0.1,
        };

        let mut builder = self.client.post(&self.api_url).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", key));
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout
            } else {
                ProviderError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                408 => ProviderError::Timeout,
                429 => ProviderError::RateLimited,
                400 => ProviderError::BadRequest(message),
                401 | 403 => ProviderError::Auth(message),
                code => ProviderError::Server {
                    status: code,
                    message,
                },
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| ProviderError::MalformedResponse("choices 为空".to_string()))
    }
}

/// 批量翻译结果
///
/// `translations` 覆盖所有输入值；`fallbacks` 记录其中以原文充当
/// 译文的值（重试耗尽或响应行缺失），调用方据此决定是否持久化。
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub translations: HashMap<String, String>,
    pub fallbacks: HashSet<String>,
}

/// 批次重试参数
#[derive(Debug, Clone)]
struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
    max_delay: Duration,
}

/// 计算第 `attempt` 次失败后的退避延迟：
/// `min(base * 2^attempt + rand(0, 0.3 * base * 2^attempt), max)`
fn backoff_delay(policy: &RetryPolicy, attempt: u32) -> Duration {
    let base_ms = policy.base_delay.as_millis() as f64;
    let exp = base_ms * 2f64.powi(attempt as i32);
    let jitter = rand::thread_rng().gen_range(0.0..=0.3) * exp;
    let delay_ms = (exp + jitter).min(policy.max_delay.as_millis() as f64);
    Duration::from_millis(delay_ms as u64)
}

/// 批量翻译器
pub struct BatchTranslator {
    provider: Arc<dyn TranslationProvider>,
    batch_size: usize,
    max_concurrent_batches: usize,
    context_sample_size: usize,
    fallback_on_failure: bool,
    retry: RetryPolicy,
}

impl BatchTranslator {
    pub fn new(provider: Arc<dyn TranslationProvider>, config: &TranslationConfig) -> Self {
        Self {
            provider,
            batch_size: config.batch_size.max(1),
            max_concurrent_batches: config.max_concurrent_batches.max(1),
            context_sample_size: config.context_sample_size,
            fallback_on_failure: config.fallback_on_failure,
            retry: RetryPolicy {
                max_retries: config.max_retries,
                base_delay: Duration::from_millis(config.retry_base_delay_ms),
                max_delay: Duration::from_millis(config.retry_max_delay_ms),
            },
        }
    }

    /// 翻译一组原文
    ///
    /// 返回的映射覆盖所有输入值。某批次重试耗尽时，回退开启则该批
    /// 全部以原文充当译文并计入 `fallbacks`，否则整次调用失败。
    pub async fn translate(
        &self,
        values: Vec<String>,
        target_lang: &str,
    ) -> TranslationResult<BatchOutcome> {
        if values.is_empty() {
            return Ok(BatchOutcome::default());
        }

        let system_prompt = build_system_prompt(target_lang, &values, self.context_sample_size);

        let batches: Vec<Vec<String>> = values
            .chunks(self.batch_size)
            .map(|chunk| chunk.to_vec())
            .collect();
        let batch_count = batches.len();
        tracing::info!("开始批量翻译: {} 条片段, {} 个批次", values.len(), batch_count);

        let batches = Arc::new(batches);
        let system_prompt = Arc::new(system_prompt);
        let next_index = Arc::new(AtomicUsize::new(0));
        let worker_count = self.max_concurrent_batches.min(batch_count);

        let mut handles = Vec::with_capacity(worker_count);
        for _ in 0..worker_count {
            let provider = Arc::clone(&self.provider);
            let batches = Arc::clone(&batches);
            let system_prompt = Arc::clone(&system_prompt);
            let next_index = Arc::clone(&next_index);
            let retry = self.retry.clone();
            let fallback = self.fallback_on_failure;

            handles.push(tokio::spawn(async move {
                let mut results = BatchOutcome::default();

                loop {
                    let index = next_index.fetch_add(1, Ordering::SeqCst);
                    if index >= batches.len() {
                        break;
                    }
                    let batch = &batches[index];

                    match Self::translate_batch(&provider, &system_prompt, batch, &retry, index)
                        .await
                    {
                        Ok(batch_result) => {
                            results.translations.extend(batch_result.translations);
                            results.fallbacks.extend(batch_result.fallbacks);
                        }
                        Err(e) if fallback => {
                            tracing::error!("批次 {} 重试耗尽，以原文回退: {}", index, e);
                            for value in batch {
                                results
                                    .translations
                                    .insert(value.clone(), value.clone());
                                results.fallbacks.insert(value.clone());
                            }
                        }
                        Err(e) => return Err(e),
                    }
                }

                Ok(results)
            }));
        }

        let mut merged = BatchOutcome::default();
        let mut first_err: Option<TranslationError> = None;
        for handle in handles {
            match handle.await {
                Ok(Ok(results)) => {
                    merged.translations.extend(results.translations);
                    merged.fallbacks.extend(results.fallbacks);
                }
                Ok(Err(e)) => {
                    if first_err.is_none() {
                        first_err = Some(e);
                    }
                }
                Err(e) => {
                    if first_err.is_none() {
                        first_err = Some(TranslationError::BatchFailed(format!(
                            "工作任务异常退出: {}",
                            e
                        )));
                    }
                }
            }
        }

        if let Some(e) = first_err {
            return Err(e);
        }

        Ok(merged)
    }

    async fn translate_batch(
        provider: &Arc<dyn TranslationProvider>,
        system_prompt: &str,
        batch: &[String],
        retry: &RetryPolicy,
        index: usize,
    ) -> TranslationResult<BatchOutcome> {
        let payload = build_batch_payload(batch);
        let mut attempt: u32 = 0;

        // 初次尝试之外最多再重试 max_retries 次
        loop {
            match provider.chat(system_prompt, &payload).await {
                Ok(response) => {
                    return Ok(parse_batch_response(&response, batch));
                }
                Err(e) if e.is_retryable() && attempt < retry.max_retries => {
                    let delay = backoff_delay(retry, attempt);
                    tracing::warn!(
                        "批次 {} 第 {} 次尝试失败，{}ms 后重试: {}",
                        index,
                        attempt + 1,
                        delay.as_millis(),
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) if e.is_retryable() => {
                    return Err(TranslationError::BatchFailed(format!(
                        "批次 {} 重试 {} 次后仍失败: {}",
                        index, retry.max_retries, e
                    )));
                }
                Err(e) => {
                    return Err(TranslationError::BatchFailed(format!(
                        "批次 {} 遇到不可重试错误: {}",
                        index, e
                    )));
                }
            }
        }
    }
}

/// 构造系统提示：目标语言 + 整次请求前 N 条作为上下文样本
fn build_system_prompt(target_lang: &str, values: &[String], sample_size: usize) -> String {
    let mut prompt = format!(
        "You are a professional web page translator. Translate each input line into {}. \
         Output exactly one translated line per input line, in the same order, \
         with no numbering, commentary, or extra lines. \
         Preserve placeholders, numbers, and punctuation.",
        target_lang
    );

    if sample_size > 0 {
        let sample: Vec<&str> = values
            .iter()
            .take(sample_size)
            .map(|v| v.trim())
            .collect();
        prompt.push_str("\n\nPage context sample:\n");
        prompt.push_str(&sample.join("\n"));
    }

    prompt
}

/// 构造批次请求体：每行一个值，值内换行压平为空格
fn build_batch_payload(batch: &[String]) -> String {
    batch
        .iter()
        .map(|value| {
            value
                .trim()
                .chars()
                .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
                .collect::<String>()
        })
        .collect::<Vec<String>>()
        .join("\n")
}

/// 按行号对应解析批次响应
///
/// 行数不符属于数据质量问题而非失败：缺失或空行的值以原文充当译文
/// 并计入回退集合。
fn parse_batch_response(response: &str, batch: &[String]) -> BatchOutcome {
    let lines: Vec<&str> = response.lines().collect();
    if lines.len() != batch.len() {
        tracing::warn!(
            "批次响应行数不符: 期望 {} 行，实际 {} 行",
            batch.len(),
            lines.len()
        );
    }

    let mut results = BatchOutcome::default();
    for (i, value) in batch.iter().enumerate() {
        let translated = lines
            .get(i)
            .map(|line| line.trim())
            .filter(|line| !line.is_empty());
        match translated {
            Some(line) => {
                results.translations.insert(value.clone(), line.to_string());
            }
            None => {
                results.translations.insert(value.clone(), value.clone());
                results.fallbacks.insert(value.clone());
            }
        }
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_exponentially_within_bounds() {
        let policy = RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_millis(8000),
        };

        for attempt in 0..4 {
            let exp = 500.0 * 2f64.powi(attempt as i32);
            let delay = backoff_delay(&policy, attempt).as_millis() as f64;
            assert!(delay >= exp.min(8000.0));
            assert!(delay <= (exp * 1.3).min(8000.0));
        }
    }

    #[test]
    fn backoff_is_capped_at_max_delay() {
        let policy = RetryPolicy {
            max_retries: 10,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_millis(8000),
        };
        assert_eq!(backoff_delay(&policy, 20), Duration::from_millis(8000));
    }

    #[test]
    fn payload_flattens_internal_newlines() {
        let batch = vec!["一行目\n二行目".to_string(), "単一".to_string()];
        assert_eq!(build_batch_payload(&batch), "一行目 二行目\n単一");
    }

    #[test]
    fn response_lines_map_positionally() {
        let batch = vec!["こんにちは".to_string(), "さようなら".to_string()];
        let results = parse_batch_response("Hello\nGoodbye", &batch);
        assert_eq!(results.translations["こんにちは"], "Hello");
        assert_eq!(results.translations["さようなら"], "Goodbye");
        assert!(results.fallbacks.is_empty());
    }

    #[test]
    fn short_response_falls_back_per_value() {
        let batch = vec!["一".to_string(), "二".to_string(), "三".to_string()];
        let results = parse_batch_response("One", &batch);
        assert_eq!(results.translations["一"], "One");
        assert_eq!(results.translations["二"], "二");
        assert_eq!(results.translations["三"], "三");
        // 以原文补齐的值被标记为回退
        assert!(!results.fallbacks.contains("一"));
        assert!(results.fallbacks.contains("二"));
        assert!(results.fallbacks.contains("三"));
    }

    #[test]
    fn blank_response_line_falls_back() {
        let batch = vec!["一".to_string(), "二".to_string()];
        let results = parse_batch_response("One\n   ", &batch);
        assert_eq!(results.translations["一"], "One");
        assert_eq!(results.translations["二"], "二");
        assert!(results.fallbacks.contains("二"));
    }

    #[test]
    fn system_prompt_includes_context_sample() {
        let values = vec!["最初".to_string(), "次".to_string(), "三番目".to_string()];
        let prompt = build_system_prompt("English", &values, 2);
        assert!(prompt.contains("English"));
        assert!(prompt.contains("最初"));
        assert!(prompt.contains("次"));
        assert!(!prompt.contains("三番目"));
    }

    #[test]
    fn provider_error_retryability() {
        assert!(ProviderError::Timeout.is_retryable());
        assert!(ProviderError::RateLimited.is_retryable());
        assert!(ProviderError::Network("reset".into()).is_retryable());
        assert!(ProviderError::Server {
            status: 502,
            message: "bad gateway".into()
        }
        .is_retryable());

        assert!(!ProviderError::BadRequest("bad".into()).is_retryable());
        assert!(!ProviderError::Auth("denied".into()).is_retryable());
        assert!(!ProviderError::MalformedResponse("empty".into()).is_retryable());
    }
}
