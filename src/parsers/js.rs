//! 脚本字符串字面量扫描与转义
//!
//! 基于字符状态机的词法扫描：跳过行注释与块注释，跟踪引号与反斜杠
//! 状态，提取单引号/双引号字符串字面量。解码后的字面量供翻译流水线
//! 筛选；回写时提供字面量安全的转义函数。

/// 扫描代码中的字符串字面量，返回解码后的内容
/// （`\uXXXX` 等转义已还原）
///
/// 未闭合的字面量（在换行或文件末尾被截断）被丢弃。模板字符串
/// （反引号）不在提取范围内，其中通常含插值表达式。
pub fn extract_string_literals(code: &str) -> Vec<String> {
    let mut literals = Vec::new();
    let mut chars = code.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '/' => match chars.peek() {
                // 行注释
                Some('/') => {
                    for c in chars.by_ref() {
                        if c == '\n' {
                            break;
                        }
                    }
                }
                // 块注释
                Some('*') => {
                    chars.next();
                    let mut prev = '\0';
                    for c in chars.by_ref() {
                        if prev == '*' && c == '/' {
                            break;
                        }
                        prev = c;
                    }
                }
                _ => {}
            },
            '"' | '\'' => {
                let quote = c;
                let mut raw = String::new();
                let mut terminated = false;

                while let Some(c) = chars.next() {
                    if c == '\\' {
                        raw.push(c);
                        if let Some(escaped) = chars.next() {
                            raw.push(escaped);
                        }
                    } else if c == quote {
                        terminated = true;
                        break;
                    } else if c == '\n' {
                        break;
                    } else {
                        raw.push(c);
                    }
                }

                if terminated {
                    literals.push(unescape_literal(&raw));
                }
            }
            _ => {}
        }
    }

    literals
}

/// 还原字面量中的转义序列
///
/// 支持 `\n` `\t` `\r` `\\` `\'` `\"` `\/` `\xNN` `\uXXXX`，
/// `\uXXXX` 的代理对会合并为单个字符；无法识别的序列原样保留。
pub fn unescape_literal(raw: &str) -> String {
    let mut result = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }

        match chars.next() {
            Some('n') => result.push('\n'),
            Some('t') => result.push('\t'),
            Some('r') => result.push('\r'),
            Some('\\') => result.push('\\'),
            Some('\'') => result.push('\''),
            Some('"') => result.push('"'),
            Some('/') => result.push('/'),
            Some('x') => {
                let hex: String = chars.by_ref().take(2).collect();
                if let Ok(code) = u8::from_str_radix(&hex, 16) {
                    result.push(code as char);
                } else {
                    result.push_str("\\x");
                    result.push_str(&hex);
                }
            }
            Some('u') => match parse_hex4(&mut chars) {
                Some(high) if (0xd800..0xdc00).contains(&high) => {
                    // 高位代理，尝试与后续 \uXXXX 合并
                    let mut lookahead = chars.clone();
                    if lookahead.next() == Some('\\') && lookahead.next() == Some('u') {
                        if let Some(low) = parse_hex4(&mut lookahead) {
                            if (0xdc00..0xe000).contains(&low) {
                                let cp = 0x10000 + ((high - 0xd800) << 10) + (low - 0xdc00);
                                if let Some(c) = char::from_u32(cp) {
                                    result.push(c);
                                    chars = lookahead;
                                    continue;
                                }
                            }
                        }
                    }
                    result.push('\u{fffd}');
                }
                Some(code) => match char::from_u32(code) {
                    Some(c) => result.push(c),
                    None => result.push('\u{fffd}'),
                },
                None => result.push_str("\\u"),
            },
            Some(other) => result.push(other),
            None => result.push('\\'),
        }
    }

    result
}

fn parse_hex4(chars: &mut std::iter::Peekable<std::str::Chars>) -> Option<u32> {
    let hex: String = chars.by_ref().take(4).collect();
    if hex.len() != 4 {
        return None;
    }
    u32::from_str_radix(&hex, 16).ok()
}

/// 将译文转义为可嵌入任一引号字面量的形式
///
/// 输出为纯 ASCII：非 ASCII 字符一律写作 `\uXXXX`，增补平面字符写作
/// 代理对。替换结果中不含源文字脚本，避免后续替换级联。
pub fn escape_for_literal(text: &str) -> String {
    let mut result = String::with_capacity(text.len());

    for c in text.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '"' => result.push_str("\\\""),
            '\'' => result.push_str("\\'"),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            c if c.is_ascii() => result.push(c),
            c => push_unicode_escape(&mut result, c),
        }
    }

    result
}

/// 将文本中的非 ASCII 字符写作 `\uXXXX` 转义形式
///
/// 用于在脚本载荷中匹配以转义形式出现的源文。
pub fn unicode_escape(text: &str) -> String {
    let mut result = String::with_capacity(text.len() * 6);
    for c in text.chars() {
        if c.is_ascii() {
            result.push(c);
        } else {
            push_unicode_escape(&mut result, c);
        }
    }
    result
}

fn push_unicode_escape(out: &mut String, c: char) {
    let cp = c as u32;
    if cp > 0xffff {
        let v = cp - 0x10000;
        let high = 0xd800 + (v >> 10);
        let low = 0xdc00 + (v & 0x3ff);
        out.push_str(&format!("\\u{:04x}\\u{:04x}", high, low));
    } else {
        out.push_str(&format!("\\u{:04x}", cp));
    }
}
