//! 文档解析模块

pub mod html;
pub mod js;
