//! 文本片段收集器
//!
//! 深度优先遍历 DOM，收集所有待翻译片段：文本节点、可翻译属性、
//! 结构化数据（JSON-LD、水合状态）中的字符串叶子、以及独立脚本
//! 载荷中的字符串字面量。收集结果按首次出现顺序去重。

use std::collections::HashSet;
use std::sync::OnceLock;

use markup5ever_rcdom::{Handle, NodeData, RcDom};
use regex::Regex;
use serde_json::Value;

use crate::parsers::html::{get_node_attr, get_node_name, get_text_content};
use crate::parsers::js;
use crate::translation::config::{constants, TranslationConfig};
use crate::translation::pipeline::filters::{contains_source_script, TextFilter};

/// 片段的来源位置
#[derive(Debug, Clone)]
pub enum FragmentOrigin {
    /// 文本节点
    TextSpan(Handle),
    /// 元素属性
    AttributeSlot { node: Handle, attr: String },
    /// 结构化数据脚本中的字符串叶子
    StructuredDataLeaf(Handle),
    /// 脚本字符串字面量
    ScriptLiteral,
}

/// 待翻译片段
#[derive(Debug, Clone)]
pub struct Fragment {
    /// 片段内容（文本节点保留原始空白，其余为原值）
    pub value: String,
    /// 来源
    pub origin: FragmentOrigin,
}

/// 收集器参数，取自 [`TranslationConfig`]
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub skip_elements: Vec<String>,
    pub translatable_attrs: Vec<String>,
    pub max_script_literal_chars: usize,
    pub script_char_ratio: f64,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self::from_translation_config(&TranslationConfig::default())
    }
}

impl CollectorConfig {
    pub fn from_translation_config(config: &TranslationConfig) -> Self {
        Self {
            skip_elements: config.skip_elements.clone(),
            translatable_attrs: config.translatable_attrs.clone(),
            max_script_literal_chars: config.max_script_literal_chars,
            script_char_ratio: config.script_char_ratio,
        }
    }
}

/// 文本片段收集器
pub struct FragmentCollector {
    config: CollectorConfig,
}

impl FragmentCollector {
    pub fn new(config: CollectorConfig) -> Self {
        Self { config }
    }

    /// 收集文档中的全部待翻译片段
    ///
    /// 结果按首次出现顺序排列，按去除首尾空白后的内容去重。
    pub fn collect_document(&self, dom: &RcDom) -> Vec<Fragment> {
        let mut fragments = Vec::new();
        self.walk_node(&dom.document, &mut fragments);
        dedup_fragments(fragments)
    }

    /// 收集独立脚本载荷中的待翻译字面量
    pub fn collect_script_payload(&self, code: &str) -> Vec<Fragment> {
        let mut fragments = Vec::new();
        self.collect_literals(code, &mut fragments);
        dedup_fragments(fragments)
    }

    fn walk_node(&self, node: &Handle, fragments: &mut Vec<Fragment>) {
        match &node.data {
            NodeData::Text { contents } => {
                let text = contents.borrow().to_string();
                if TextFilter::should_translate(&text) {
                    fragments.push(Fragment {
                        value: text,
                        origin: FragmentOrigin::TextSpan(node.clone()),
                    });
                }
            }
            NodeData::Element { .. } => {
                let name = get_node_name(node).unwrap_or_default().to_lowercase();

                // script 不提取文本，但结构化数据块单独处理
                if name == "script" {
                    if is_structured_data_script(node) {
                        self.collect_structured_data(node, fragments);
                    }
                    return;
                }

                self.collect_element_attributes(node, &name, fragments);

                if self.config.skip_elements.iter().any(|e| e == &name) {
                    return;
                }

                for child in node.children.borrow().iter() {
                    self.walk_node(child, fragments);
                }
            }
            _ => {
                for child in node.children.borrow().iter() {
                    self.walk_node(child, fragments);
                }
            }
        }
    }

    fn collect_element_attributes(
        &self,
        node: &Handle,
        name: &str,
        fragments: &mut Vec<Fragment>,
    ) {
        for attr in &self.config.translatable_attrs {
            if let Some(value) = get_node_attr(node, attr) {
                if TextFilter::should_translate(&value) {
                    fragments.push(Fragment {
                        value,
                        origin: FragmentOrigin::AttributeSlot {
                            node: node.clone(),
                            attr: attr.clone(),
                        },
                    });
                }
            }
        }

        // 隐藏输入框的 value 常携带服务端注入的文案
        if name == "input" {
            let is_hidden = get_node_attr(node, "type")
                .map(|t| t.eq_ignore_ascii_case("hidden"))
                .unwrap_or(false);
            if is_hidden {
                if let Some(value) = get_node_attr(node, "value") {
                    if TextFilter::should_translate(&value) {
                        fragments.push(Fragment {
                            value,
                            origin: FragmentOrigin::AttributeSlot {
                                node: node.clone(),
                                attr: "value".to_string(),
                            },
                        });
                    }
                }
            }
        }
    }

    fn collect_structured_data(&self, node: &Handle, fragments: &mut Vec<Fragment>) {
        let content = get_text_content(node);
        if content.trim().is_empty() {
            return;
        }

        match serde_json::from_str::<Value>(&content) {
            Ok(value) => {
                walk_json(&value, &mut |s| {
                    if TextFilter::should_translate(s) {
                        fragments.push(Fragment {
                            value: s.to_string(),
                            origin: FragmentOrigin::StructuredDataLeaf(node.clone()),
                        });
                    }
                });
            }
            Err(e) => {
                tracing::debug!("结构化数据解析失败，回退到正则扫描: {}", e);
                for captured in scan_quoted_strings(&content) {
                    let decoded = js::unescape_literal(&captured);
                    if TextFilter::should_translate(&decoded) {
                        fragments.push(Fragment {
                            value: decoded,
                            origin: FragmentOrigin::StructuredDataLeaf(node.clone()),
                        });
                    }
                }
            }
        }
    }

    fn collect_literals(&self, code: &str, fragments: &mut Vec<Fragment>) {
        for decoded in js::extract_string_literals(code) {
            if TextFilter::qualifies_script_literal(
                &decoded,
                self.config.max_script_literal_chars,
                self.config.script_char_ratio,
                constants::SCRIPT_RATIO_MIN_CHARS,
            ) {
                fragments.push(Fragment {
                    value: decoded,
                    origin: FragmentOrigin::ScriptLiteral,
                });
            }
        }
    }
}

/// 判断 script 元素是否为结构化数据块
pub fn is_structured_data_script(node: &Handle) -> bool {
    if let Some(script_type) = get_node_attr(node, "type") {
        let script_type = script_type.trim().to_lowercase();
        if constants::STRUCTURED_DATA_TYPES
            .iter()
            .any(|t| *t == script_type)
        {
            return true;
        }
    }
    if let Some(id) = get_node_attr(node, "id") {
        if constants::HYDRATION_DATA_IDS.iter().any(|h| *h == id) {
            return true;
        }
    }
    false
}

/// 穷举遍历 JSON 值的全部字符串叶子
pub fn walk_json(value: &Value, visit: &mut dyn FnMut(&str)) {
    match value {
        Value::String(s) => visit(s),
        Value::Array(items) => {
            for item in items {
                walk_json(item, visit);
            }
        }
        Value::Object(map) => {
            for item in map.values() {
                walk_json(item, visit);
            }
        }
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}

/// 正则扫描双引号字符串（JSON 解析失败时的降级路径）
fn scan_quoted_strings(content: &str) -> Vec<String> {
    static QUOTED: OnceLock<Regex> = OnceLock::new();
    let quoted = QUOTED.get_or_init(|| Regex::new(r#""((?:[^"\\]|\\.)*)""#).unwrap());

    quoted
        .captures_iter(content)
        .filter_map(|cap| cap.get(1).map(|m| m.as_str().to_string()))
        .filter(|s| contains_source_script(s) || s.contains("\\u"))
        .collect()
}

/// 按去除首尾空白后的内容去重，保留首次出现
fn dedup_fragments(fragments: Vec<Fragment>) -> Vec<Fragment> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut result = Vec::with_capacity(fragments.len());

    for fragment in fragments {
        let key = fragment.value.trim().to_string();
        if seen.insert(key) {
            result.push(fragment);
        }
    }

    result
}
