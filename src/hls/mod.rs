//! HLS playlist handling: reference rewriting and resource classification.

pub mod proxy_path;
pub mod resource;
pub mod rewrite;

pub use proxy_path::{ROUTING_PREFIX, ref_to_proxy_path};
pub use resource::ResourceKind;
pub use rewrite::rewrite_manifest;
