//! Configuration for the rewriting proxy
//!
//! This module provides the per-container `RewriteFeatureConfig` (which tags and
//! URLs are rewritten) with its builder, the server-wide `RewriterConfig`, and
//! the `FeatureConfigSource` seam through which the rewriters look features up.

// Sub-modules
pub mod builder;
pub mod getters;
pub mod methods;
pub mod source;
pub mod types;

// Re-exports for public API
pub use builder::RewriteFeatureConfigBuilder;
pub use source::{FeatureConfigSource, StaticFeatureConfigSource};
pub use types::{ConfigError, RewriteFeatureConfig, RewriterConfig};
