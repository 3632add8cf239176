//! 翻译流水线集成测试
//!
//! 覆盖端到端翻译、片段提取与去重、批次失败处理。

use std::sync::Arc;

use honyaku::{MemoryStore, TranslationService};

mod common;

use common::{init_tracing, settle, test_config, MockBehavior, MockProvider};

/// 最简端到端：单段文本翻译且恰好一次外部调用
#[tokio::test]
async fn test_simple_page_end_to_end() {
    init_tracing();
    let provider = MockProvider::with_dictionary(&[("こんにちは", "Hello")]);
    let service = TranslationService::new(
        test_config(),
        Arc::new(MemoryStore::new()),
        provider.clone(),
    )
    .unwrap();

    let result = service
        .translate_document("<p>こんにちは</p>", "English")
        .await
        .unwrap();

    assert!(result.contains("<p>Hello</p>"));
    assert_eq!(provider.call_count(), 1);
}

/// 重复片段只翻译一次，替换覆盖全部出现位置
#[tokio::test]
async fn test_duplicate_fragments_translated_once() {
    let provider = MockProvider::with_dictionary(&[("同じ", "Same"), ("別", "Other")]);
    let service = TranslationService::new(
        test_config(),
        Arc::new(MemoryStore::new()),
        provider.clone(),
    )
    .unwrap();

    let result = service
        .translate_document("<p>同じ</p><p> 同じ </p><p>別</p>", "English")
        .await
        .unwrap();

    assert!(result.contains("<p>Same</p>"));
    assert!(result.contains("<p> Same </p>"));
    assert!(result.contains("<p>Other</p>"));
    // 两个相同片段合并为一条，单批次一次调用
    assert_eq!(provider.call_count(), 1);
}

/// 文本节点的首尾空白在替换后保持不变
#[tokio::test]
async fn test_whitespace_preserved_around_translation() {
    let provider = MockProvider::with_dictionary(&[("こんにちは", "Hello")]);
    let service =
        TranslationService::new(test_config(), Arc::new(MemoryStore::new()), provider).unwrap();

    let result = service
        .translate_document("<p>  こんにちは  </p>", "English")
        .await
        .unwrap();

    assert!(result.contains("<p>  Hello  </p>"));
}

/// 排除元素的子树不参与翻译，pre 不在排除之列
#[tokio::test]
async fn test_excluded_elements_untouched() {
    let provider =
        MockProvider::with_dictionary(&[("変数", "variable"), ("整形済み", "preformatted")]);
    let service =
        TranslationService::new(test_config(), Arc::new(MemoryStore::new()), provider).unwrap();

    let html = "<code>変数</code><pre>整形済み</pre><p>変数</p>";
    let result = service.translate_document(html, "English").await.unwrap();

    assert!(result.contains("<code>変数</code>"));
    assert!(result.contains("<pre>preformatted</pre>"));
    assert!(result.contains("<p>variable</p>"));
}

/// 无待翻译片段时原样返回且零外部调用
#[tokio::test]
async fn test_no_fragments_returns_input_unchanged() {
    let provider = MockProvider::with_dictionary(&[]);
    let service = TranslationService::new(
        test_config(),
        Arc::new(MemoryStore::new()),
        provider.clone(),
    )
    .unwrap();

    let html = "<html><body><p>English only</p></body></html>";
    let result = service.translate_document(html, "English").await.unwrap();

    assert_eq!(result, html);
    assert_eq!(provider.call_count(), 0);
}

/// 可翻译属性与隐藏输入框 value 被替换
#[tokio::test]
async fn test_attributes_translated() {
    let provider = MockProvider::with_dictionary(&[
        ("写真", "Photo"),
        ("名前を入力", "Enter your name"),
        ("隠し値", "Hidden value"),
    ]);
    let service =
        TranslationService::new(test_config(), Arc::new(MemoryStore::new()), provider).unwrap();

    let html = concat!(
        r#"<img alt="写真">"#,
        r#"<input placeholder="名前を入力">"#,
        r#"<input type="hidden" value="隠し値">"#,
        r#"<input type="text" value="隠し値">"#,
    );
    let result = service.translate_document(html, "English").await.unwrap();

    assert!(result.contains(r#"alt="Photo""#));
    assert!(result.contains(r#"placeholder="Enter your name""#));
    assert!(result.contains(r#"type="hidden" value="Hidden value""#) || result.contains(r#"value="Hidden value""#));
    // 非 hidden 输入框的 value 不参与翻译
    assert!(result.contains(r#"type="text" value="隠し値""#) || result.contains(r#"value="隠し値""#));
}

/// JSON-LD 结构化数据的字符串叶子被替换，结构保持
#[tokio::test]
async fn test_structured_data_translated() {
    let provider = MockProvider::with_dictionary(&[("商品名", "Product name")]);
    let service =
        TranslationService::new(test_config(), Arc::new(MemoryStore::new()), provider).unwrap();

    let html = r#"<script type="application/ld+json">{"name":"商品名","price":100}</script>"#;
    let result = service.translate_document(html, "English").await.unwrap();

    assert!(result.contains(r#""name":"Product name""#));
    assert!(result.contains(r#""price":100"#));
}

/// 普通脚本既不提取也不改写
#[tokio::test]
async fn test_plain_scripts_ignored() {
    let provider = MockProvider::with_dictionary(&[("文言", "text")]);
    let service = TranslationService::new(
        test_config(),
        Arc::new(MemoryStore::new()),
        provider.clone(),
    )
    .unwrap();

    let html = r#"<script>var x = "文言";</script><p>文言</p>"#;
    let result = service.translate_document(html, "English").await.unwrap();

    assert!(result.contains(r#"var x = "文言";"#));
    assert!(result.contains("<p>text</p>"));
}

/// 批次部分失败（回退开启）：失败批次以原文回退，其余批次正常
#[tokio::test]
async fn test_batch_partial_failure_falls_back() {
    let mut config = test_config();
    config.batch_size = 1;
    config.max_concurrent_batches = 1;
    config.max_retries = 2;

    // 第一批的全部尝试（初次 + 2 次重试）失败，之后恢复
    let provider = MockProvider::with_behavior(
        &[("一", "One"), ("二", "Two")],
        MockBehavior::FailThenSucceed { fail_times: 3 },
    );
    let service = TranslationService::new(
        config,
        Arc::new(MemoryStore::new()),
        provider.clone(),
    )
    .unwrap();

    let result = service
        .translate_document("<p>一</p><p>二</p>", "English")
        .await
        .unwrap();

    // 第一批重试耗尽后以原文回退，第二批成功
    assert!(result.contains("<p>一</p>"));
    assert!(result.contains("<p>Two</p>"));
}

/// 重试预算不含初次尝试：默认 3 次重试意味着最多 4 次调用，
/// 最后一次重试成功时整批照常翻译
#[tokio::test]
async fn test_retry_budget_allows_recovery_on_last_retry() {
    // 默认 max_retries = 3；前 3 次调用失败，第 4 次成功
    let provider = MockProvider::with_behavior(
        &[("こんにちは", "Hello")],
        MockBehavior::FailThenSucceed { fail_times: 3 },
    );
    let service = TranslationService::new(
        test_config(),
        Arc::new(MemoryStore::new()),
        provider.clone(),
    )
    .unwrap();

    let result = service
        .translate_document("<p>こんにちは</p>", "English")
        .await
        .unwrap();

    assert!(result.contains("<p>Hello</p>"));
    assert_eq!(provider.call_count(), 4);
}

/// 回退关闭时批次失败使整次请求失败
#[tokio::test]
async fn test_batch_failure_propagates_when_fallback_disabled() {
    let mut config = test_config();
    config.fallback_on_failure = false;
    config.max_retries = 2;

    let provider = MockProvider::with_behavior(&[], MockBehavior::AlwaysFail);
    let service =
        TranslationService::new(config, Arc::new(MemoryStore::new()), provider).unwrap();

    let result = service.translate_document("<p>こんにちは</p>", "English").await;
    assert!(result.is_err());
}

/// 不可重试错误不消耗重试次数，立即失败
#[tokio::test]
async fn test_non_retryable_error_fails_fast() {
    let mut config = test_config();
    config.fallback_on_failure = false;
    config.max_retries = 3;

    let provider =
        MockProvider::with_non_retryable_failures(&[], MockBehavior::AlwaysFail);
    let service = TranslationService::new(
        config,
        Arc::new(MemoryStore::new()),
        provider.clone(),
    )
    .unwrap();

    let result = service.translate_document("<p>こんにちは</p>", "English").await;
    assert!(result.is_err());
    assert_eq!(provider.call_count(), 1);
}

/// 响应行数不符时缺失值以原文补齐，其余值正常
#[tokio::test]
async fn test_count_mismatch_degrades_per_value() {
    let mut config = test_config();
    config.batch_size = 10;

    let provider = MockProvider::with_behavior(
        &[("一", "One"), ("二", "Two")],
        MockBehavior::DropLastLine,
    );
    let service =
        TranslationService::new(config, Arc::new(MemoryStore::new()), provider).unwrap();

    let result = service
        .translate_document("<p>一</p><p>二</p>", "English")
        .await
        .unwrap();

    assert!(result.contains("<p>One</p>"));
    assert!(result.contains("<p>二</p>"));
}

/// 多批次并发：所有值都被覆盖，调用次数等于批次数
#[tokio::test]
async fn test_multiple_batches_all_covered() {
    let mut config = test_config();
    config.batch_size = 2;
    config.max_concurrent_batches = 3;

    let provider = MockProvider::with_dictionary(&[]);
    let service = TranslationService::new(
        config,
        Arc::new(MemoryStore::new()),
        provider.clone(),
    )
    .unwrap();

    let html: String = (0..5).map(|i| format!("<p>項目{}</p>", i)).collect();
    let result = service.translate_document(&html, "English").await.unwrap();

    for i in 0..5 {
        assert!(result.contains(&format!("<p>[en]項目{}</p>", i)));
    }
    // 5 条片段按批次大小 2 切成 3 批
    assert_eq!(provider.call_count(), 3);

    settle().await;
}

/// 统计计数随处理推进
#[tokio::test]
async fn test_pipeline_stats_track_progress() {
    let provider = MockProvider::with_dictionary(&[("こんにちは", "Hello")]);
    let service =
        TranslationService::new(test_config(), Arc::new(MemoryStore::new()), provider).unwrap();

    service
        .translate_document("<p>こんにちは</p>", "English")
        .await
        .unwrap();

    let stats = service.stats();
    assert_eq!(stats.documents, 1);
    assert_eq!(stats.fragments_collected, 1);
    assert_eq!(stats.cache_misses, 1);
    assert_eq!(stats.cache_hits, 0);
}
