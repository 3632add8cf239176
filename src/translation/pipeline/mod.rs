//! 翻译流水线：收集、过滤、回写

pub mod apply;
pub mod collector;
pub mod filters;

pub use apply::{Substitutor, SubstitutorConfig};
pub use collector::{CollectorConfig, Fragment, FragmentCollector, FragmentOrigin};
pub use filters::TextFilter;
