//! HLS reverse proxy.
//!
//! Playlists fetched from the origin are rewritten so that every reference
//! (variants, segments, keys, renditions) routes back through `/hls/...` on
//! the proxy; segments and keys are streamed through unmodified.

pub mod config;
pub mod error;
pub mod hls;
pub mod metrics;
pub mod server;
pub mod upstream;
