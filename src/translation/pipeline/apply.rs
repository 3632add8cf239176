//! 译文回写
//!
//! 按收集阶段相同的遍历规则把译文写回文档：文本节点保留首尾空白，
//! 属性原地改写，结构化数据重新解析后替换字符串叶子再序列化，
//! 脚本载荷按最长优先做字面量替换（同时覆盖 `\uXXXX` 转义形式）。

use std::collections::HashMap;

use markup5ever_rcdom::{Handle, NodeData, RcDom};
use regex::{NoExpand, Regex};
use serde_json::Value;

use crate::parsers::html::{get_node_attr, get_node_name, get_text_content, set_node_attr, set_text_content};
use crate::parsers::js;
use crate::translation::pipeline::collector::is_structured_data_script;

/// 回写参数
#[derive(Debug, Clone)]
pub struct SubstitutorConfig {
    pub skip_elements: Vec<String>,
    pub translatable_attrs: Vec<String>,
}

/// 译文回写器
pub struct Substitutor<'a> {
    map: &'a HashMap<String, String>,
    config: SubstitutorConfig,
}

impl<'a> Substitutor<'a> {
    pub fn new(map: &'a HashMap<String, String>, config: SubstitutorConfig) -> Self {
        Self { map, config }
    }

    /// 把译文写回文档树
    pub fn apply_document(&self, dom: &RcDom) {
        self.apply_node(&dom.document);
    }

    fn apply_node(&self, node: &Handle) {
        match &node.data {
            NodeData::Text { contents } => {
                let original = contents.borrow().to_string();
                if let Some(replaced) = self.replace_text_preserving_whitespace(&original) {
                    let mut tendril = contents.borrow_mut();
                    tendril.clear();
                    tendril.push_slice(&replaced);
                }
            }
            NodeData::Element { .. } => {
                let name = get_node_name(node).unwrap_or_default().to_lowercase();

                if name == "script" {
                    if is_structured_data_script(node) {
                        self.apply_structured_data(node);
                    }
                    return;
                }

                self.apply_attributes(node, &name);

                if self.config.skip_elements.iter().any(|e| e == &name) {
                    return;
                }

                for child in node.children.borrow().iter() {
                    self.apply_node(child);
                }
            }
            _ => {
                for child in node.children.borrow().iter() {
                    self.apply_node(child);
                }
            }
        }
    }

    /// 替换文本核心，保留原始首尾空白
    fn replace_text_preserving_whitespace(&self, original: &str) -> Option<String> {
        let trimmed = original.trim();
        if trimmed.is_empty() {
            return None;
        }
        let translated = self.map.get(trimmed)?;

        let leading_len = original.len() - original.trim_start().len();
        let trailing_len = original.len() - original.trim_end().len();
        let leading = &original[..leading_len];
        let trailing = &original[original.len() - trailing_len..];

        Some(format!("{}{}{}", leading, translated, trailing))
    }

    fn apply_attributes(&self, node: &Handle, name: &str) {
        for attr in &self.config.translatable_attrs {
            self.apply_one_attribute(node, attr);
        }
        if name == "input" {
            let is_hidden = get_node_attr(node, "type")
                .map(|t| t.eq_ignore_ascii_case("hidden"))
                .unwrap_or(false);
            if is_hidden {
                self.apply_one_attribute(node, "value");
            }
        }
    }

    fn apply_one_attribute(&self, node: &Handle, attr: &str) {
        if let Some(value) = get_node_attr(node, attr) {
            if let Some(translated) = self.map.get(value.trim()) {
                set_node_attr(node, attr, translated);
            }
        }
    }

    /// 结构化数据块：重新解析，替换字符串叶子，再序列化
    fn apply_structured_data(&self, node: &Handle) {
        let content = get_text_content(node);
        if content.trim().is_empty() {
            return;
        }

        match serde_json::from_str::<Value>(&content) {
            Ok(mut value) => {
                let mut changed = false;
                replace_json_leaves(&mut value, self.map, &mut changed);
                if changed {
                    match serde_json::to_string(&value) {
                        Ok(serialized) => set_text_content(node, &serialized),
                        Err(e) => tracing::warn!("结构化数据序列化失败: {}", e),
                    }
                }
            }
            Err(_) => {
                // 解析失败时做字面子串替换
                let replaced = self.replace_literal_substrings(&content);
                if replaced != content {
                    set_text_content(node, &replaced);
                }
            }
        }
    }

    /// 字面子串替换（正则转义 + NoExpand，译文不参与展开）
    fn replace_literal_substrings(&self, content: &str) -> String {
        let mut keys: Vec<&String> = self.map.keys().collect();
        keys.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()).then(a.cmp(b)));

        let mut result = content.to_string();
        for key in keys {
            let translated = &self.map[key];
            if key == translated || !result.contains(key.as_str()) {
                continue;
            }
            match Regex::new(&regex::escape(key)) {
                Ok(pattern) => {
                    result = pattern
                        .replace_all(&result, NoExpand(translated))
                        .into_owned();
                }
                Err(e) => tracing::warn!("替换模式构建失败: {}", e),
            }
        }
        result
    }

    /// 脚本载荷：按最长优先替换字面量内容
    ///
    /// 同时替换 UTF-8 形式与 `\uXXXX` 转义形式；替换文本经过字面量
    /// 安全转义（纯 ASCII），不会被后续替换再次命中。
    pub fn apply_script_payload(&self, code: &str) -> String {
        let mut keys: Vec<&String> = self.map.keys().collect();
        keys.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()).then(a.cmp(b)));

        let mut result = code.to_string();
        for key in keys {
            let translated = &self.map[key];
            if key == translated {
                continue;
            }
            let escaped = js::escape_for_literal(translated);

            if result.contains(key.as_str()) {
                result = result.replace(key.as_str(), &escaped);
            }

            let unicode_form = js::unicode_escape(key);
            if unicode_form != *key && result.contains(&unicode_form) {
                result = result.replace(&unicode_form, &escaped);
            }
        }
        result
    }
}

/// 替换 JSON 中匹配映射的字符串叶子
fn replace_json_leaves(value: &mut Value, map: &HashMap<String, String>, changed: &mut bool) {
    match value {
        Value::String(s) => {
            if let Some(translated) = map.get(s.trim()) {
                if translated != s {
                    *s = translated.clone();
                    *changed = true;
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                replace_json_leaves(item, map, changed);
            }
        }
        Value::Object(obj) => {
            for item in obj.values_mut() {
                replace_json_leaves(item, map, changed);
            }
        }
        _ => {}
    }
}
