//! Core types for launchdex
//!
//! This crate defines the foundational types used throughout the system:
//! - ItemId, ProviderId, ItemKind: item identity and classification
//! - SearchItem: the canonical record for a launchable unit
//! - Timestamp, ChangeStamp, Clock: time and scan-generation markers
//! - Tokenizer: title → normalized token set
//! - EngineConfig: `launchdex.toml` model and validation
//! - RootSet: normalized discovery/exclusion root matching
//! - Error: error type hierarchy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod clock;
pub mod config;
pub mod error;
pub mod roots;
pub mod tokenizer;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    validate_hotkey, ConfigValidationError, EngineConfig, IndexerConfig, QueryConfig, UiConfig,
    CONFIG_FILE_NAME,
};
pub use error::{Error, Result};
pub use roots::{normalize_for_compare, RootSet};
pub use tokenizer::{analyze, tokenize, Analysis, TokenSet};
pub use types::{
    ChangeStamp, FailureCode, ItemId, ItemKind, PruneReason, ProviderId, QueryHit, SearchItem,
    Timestamp,
};
