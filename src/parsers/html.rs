//! HTML 文档树适配器
//!
//! 封装 html5ever/rcdom 的解析与序列化，并提供节点属性和文本内容的
//! 读写辅助函数。解析器对畸形标记是容错的，永远不会因输入损坏而失败。

use encoding_rs::Encoding;
use html5ever::parse_document;
use html5ever::serialize::{serialize, SerializeOpts};
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::{Handle, NodeData, RcDom, SerializableHandle};

/// 将 HTML 字节转换为 DOM
///
/// `document_encoding` 为空或无法识别时按 UTF-8（有损）解码。
pub fn html_to_dom(data: &[u8], document_encoding: String) -> RcDom {
    let s: String;

    if let Some(encoding) = Encoding::for_label(document_encoding.as_bytes()) {
        let (string, _, _) = encoding.decode(data);
        s = string.to_string();
    } else {
        s = String::from_utf8_lossy(data).to_string();
    }

    parse_document(RcDom::default(), Default::default())
        .from_utf8()
        .read_from(&mut s.as_bytes())
        .unwrap()
}

/// 序列化文档为 UTF-8 字符串
pub fn serialize_document(dom: &RcDom) -> String {
    let mut buf: Vec<u8> = Vec::new();

    let serializable: SerializableHandle = dom.document.clone().into();
    serialize(&mut buf, &serializable, SerializeOpts::default())
        .expect("Unable to serialize DOM into buffer");

    String::from_utf8_lossy(&buf).to_string()
}

/// 获取节点属性值
pub fn get_node_attr(node: &Handle, attr_name: &str) -> Option<String> {
    match &node.data {
        NodeData::Element { attrs, .. } => {
            for attr in attrs.borrow().iter() {
                if &*attr.name.local == attr_name {
                    return Some(attr.value.to_string());
                }
            }
            None
        }
        _ => None,
    }
}

/// 获取节点名称
pub fn get_node_name(node: &Handle) -> Option<&'_ str> {
    match &node.data {
        NodeData::Element { name, .. } => Some(name.local.as_ref()),
        _ => None,
    }
}

/// 设置节点属性（属性不存在时不新增，翻译替换只改写既有属性）
pub fn set_node_attr(node: &Handle, attr_name: &str, attr_value: &str) {
    if let NodeData::Element { attrs, .. } = &node.data {
        for attr in attrs.borrow_mut().iter_mut() {
            if &*attr.name.local == attr_name {
                attr.value.clear();
                attr.value.push_slice(attr_value);
                return;
            }
        }
    }
}

/// 拼接元素的直接文本子节点内容
///
/// 用于读取 `<script>` 等元素承载的原始文本载荷。
pub fn get_text_content(node: &Handle) -> String {
    let mut content = String::new();

    for child in node.children.borrow().iter() {
        if let NodeData::Text { ref contents } = child.data {
            content.push_str(&contents.borrow());
        }
    }

    content
}

/// 重写元素的文本内容
///
/// 第一个文本子节点被改写为新内容，其余文本子节点清空；
/// 没有文本子节点的元素保持不变。
pub fn set_text_content(node: &Handle, new_content: &str) {
    let mut first = true;

    for child in node.children.borrow().iter() {
        if let NodeData::Text { ref contents } = child.data {
            let mut tendril = contents.borrow_mut();
            tendril.clear();
            if first {
                tendril.push_slice(new_content);
                first = false;
            }
        }
    }
}
