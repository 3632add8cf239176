//! 脚本载荷翻译集成测试
//!
//! 覆盖字面量提取、转义安全替换、最长优先匹配。

use std::sync::Arc;

use honyaku::{MemoryStore, TranslationService};

mod common;

use common::{test_config, MockProvider};

/// 合格的字面量被翻译，代码形态与 URL 不受影响
#[tokio::test]
async fn test_script_literals_translated_selectively() {
    let provider = MockProvider::with_dictionary(&[("ホームへ戻る", "Back to home")]);
    let service = TranslationService::new(
        test_config(),
        Arc::new(MemoryStore::new()),
        provider.clone(),
    )
    .unwrap();

    let code = concat!(
        "var label = \"ホームへ戻る\";\n",
        "var url = \"https://example.jp/ページ\";\n",
        "var handler = \"alert(1);\";\n",
    );
    let result = service
        .translate_script_payload(code, "English")
        .await
        .unwrap();

    assert!(result.contains("Back to home"));
    assert!(result.contains("https://example.jp/ページ"));
    assert!(result.contains("alert(1);"));
}

/// 译文中的引号被转义，替换后的代码语法完整
#[tokio::test]
async fn test_translation_with_quotes_is_escaped() {
    let provider = MockProvider::with_dictionary(&[("挨拶", "Say \"Hi\"")]);
    let service =
        TranslationService::new(test_config(), Arc::new(MemoryStore::new()), provider).unwrap();

    let code = "var a = \"挨拶\";";
    let result = service
        .translate_script_payload(code, "English")
        .await
        .unwrap();

    assert_eq!(result, "var a = \"Say \\\"Hi\\\"\";");
}

/// 最长值优先匹配，避免长值被其子串的译文破坏
#[tokio::test]
async fn test_longest_value_matched_first() {
    let provider = MockProvider::with_dictionary(&[
        ("短距離", "Short distance"),
        ("短距離すべて", "All short distances"),
    ]);
    let service =
        TranslationService::new(test_config(), Arc::new(MemoryStore::new()), provider).unwrap();

    let code = "var a = \"短距離すべて\"; var b = \"短距離\";";
    let result = service
        .translate_script_payload(code, "English")
        .await
        .unwrap();

    assert!(result.contains("\"All short distances\""));
    assert!(result.contains("\"Short distance\""));
}

/// `\uXXXX` 转义形式的字面量同样被提取并替换
#[tokio::test]
async fn test_unicode_escaped_literals_replaced() {
    let provider = MockProvider::with_dictionary(&[("テスト", "Test")]);
    let service =
        TranslationService::new(test_config(), Arc::new(MemoryStore::new()), provider).unwrap();

    // "テスト" 的转义形式
    let code = "var a = \"\\u30c6\\u30b9\\u30c8\";";
    let result = service
        .translate_script_payload(code, "English")
        .await
        .unwrap();

    assert_eq!(result, "var a = \"Test\";");
}

/// 无合格字面量时载荷原样返回且零外部调用
#[tokio::test]
async fn test_payload_without_candidates_unchanged() {
    let provider = MockProvider::with_dictionary(&[]);
    let service = TranslationService::new(
        test_config(),
        Arc::new(MemoryStore::new()),
        provider.clone(),
    )
    .unwrap();

    let code = "function add(a, b) { return a + b; }";
    let result = service
        .translate_script_payload(code, "English")
        .await
        .unwrap();

    assert_eq!(result, code);
    assert_eq!(provider.call_count(), 0);
}

/// 超长字面量不参与翻译
#[tokio::test]
async fn test_long_literals_excluded() {
    let provider = MockProvider::with_dictionary(&[]);
    let service = TranslationService::new(
        test_config(),
        Arc::new(MemoryStore::new()),
        provider.clone(),
    )
    .unwrap();

    let long: String = "あ".repeat(250);
    let code = format!("var a = \"{}\";", long);
    let result = service
        .translate_script_payload(&code, "English")
        .await
        .unwrap();

    assert_eq!(result, code);
    assert_eq!(provider.call_count(), 0);
}
