//! Shared types, error model, and configuration for jobdigest.
//!
//! This crate is the foundation depended on by all other jobdigest crates.
//! It provides:
//! - [`JobDigestError`]: the unified error type
//! - Domain types ([`Posting`], [`PostingKey`])
//! - Configuration ([`AppConfig`], [`HarvestConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, HarvestConfig, MAX_WINDOW_DAYS, SourceConfig, SourceKind,
    config_dir, config_file_path, expand_home, init_config, load_config, load_config_from,
};
pub use error::{JobDigestError, Result};
pub use types::{Posting, PostingKey};
