//! 文本过滤器
//!
//! 判定文本片段是否值得送入翻译：源文字脚本检测（平假名、片假名、
//! CJK 统一表意文字），以及脚本字符串字面量的启发式筛选。

use std::sync::OnceLock;

use regex::Regex;

/// 判断字符是否属于源文字脚本
pub fn is_source_script_char(c: char) -> bool {
    matches!(c,
        '\u{3040}'..='\u{309f}'   // 平假名
        | '\u{30a0}'..='\u{30ff}' // 片假名
        | '\u{4e00}'..='\u{9fff}' // CJK 统一表意文字
    )
}

/// 判断文本是否含有至少一个源文字脚本字符
pub fn contains_source_script(text: &str) -> bool {
    text.chars().any(is_source_script_char)
}

/// 文本片段过滤器
pub struct TextFilter;

impl TextFilter {
    /// 判断文本是否应被翻译：去除首尾空白后非空，且含源文字符
    pub fn should_translate(text: &str) -> bool {
        let trimmed = text.trim();
        !trimmed.is_empty() && contains_source_script(trimmed)
    }

    /// 判断脚本字面量（解码后）是否参与翻译
    ///
    /// 条件：含源文字符；长度低于上限；不呈代码形态；非空白字符超过
    /// `ratio_min_chars` 时源文字符占非空白字符的比例不低于 `ratio`。
    pub fn qualifies_script_literal(
        decoded: &str,
        max_chars: usize,
        ratio: f64,
        ratio_min_chars: usize,
    ) -> bool {
        let trimmed = decoded.trim();
        if trimmed.is_empty() || !contains_source_script(trimmed) {
            return false;
        }
        if decoded.chars().count() >= max_chars {
            return false;
        }
        if looks_like_code(decoded) {
            return false;
        }

        let non_ws: Vec<char> = decoded.chars().filter(|c| !c.is_whitespace()).collect();
        if non_ws.len() > ratio_min_chars {
            let source_count = non_ws.iter().filter(|c| is_source_script_char(**c)).count();
            if (source_count as f64) < (non_ws.len() as f64) * ratio {
                return false;
            }
        }

        true
    }
}

/// 判断文本是否呈代码形态
///
/// 命中任一特征即视为代码：花括号、`);`、方法调用、数组下标、
/// 裸 URL、`function` 关键字或箭头函数。
pub fn looks_like_code(text: &str) -> bool {
    if text.contains('{') || text.contains('}') {
        return true;
    }
    if text.contains("http://") || text.contains("https://") {
        return true;
    }
    if text.contains("function") || text.contains("=>") {
        return true;
    }

    static CLOSE_SEMI: OnceLock<Regex> = OnceLock::new();
    static METHOD_CALL: OnceLock<Regex> = OnceLock::new();
    static ARRAY_INDEX: OnceLock<Regex> = OnceLock::new();

    let close_semi = CLOSE_SEMI.get_or_init(|| Regex::new(r"\)\s*;").unwrap());
    let method_call =
        METHOD_CALL.get_or_init(|| Regex::new(r"\.[A-Za-z_$][A-Za-z0-9_$]*\(").unwrap());
    let array_index = ARRAY_INDEX.get_or_init(|| Regex::new(r"\[\d+\]").unwrap());

    close_semi.is_match(text) || method_call.is_match(text) || array_index.is_match(text)
}
