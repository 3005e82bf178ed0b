//! Engine configuration via `launchdex.toml`
//!
//! The engine only ever consumes validated values: [`EngineConfig::validate`]
//! is the single gate, and everything that loads a config (file, string,
//! hot reload) goes through it. Ranking and indexing fields apply live;
//! fields under `[ui]` only take effect after a restart.

use crate::error::{Error, Result};
use crate::roots::RootSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Config file name placed in the launcher data directory.
pub const CONFIG_FILE_NAME: &str = "launchdex.toml";

/// Inclusive bounds for `max_results`.
pub const MAX_RESULTS_RANGE: (u16, u16) = (5, 100);

/// Largest accepted `typo_tolerance`.
pub const MAX_TYPO_TOLERANCE: u8 = 3;

/// Smallest accepted reconciliation interval.
pub const MIN_RECONCILE_INTERVAL_MS: u64 = 10;

/// A configuration value outside its accepted range.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ConfigValidationError {
    /// Dotted field path, e.g. `query.fuzzy_budget_us`
    pub field: &'static str,
    /// What is wrong with it
    pub message: String,
}

impl ConfigValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        ConfigValidationError {
            field,
            message: message.into(),
        }
    }
}

/// Indexer tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    /// Interval between reconciliation passes
    pub reconcile_interval_ms: u64,
    /// Items applied between reconciliation yields
    pub reconcile_batch_size: usize,
    /// Pause inserted at each reconciliation yield point
    pub reconcile_pause_us: u64,
    /// Longest a reconciliation yield waits for in-flight queries to drain
    pub max_query_backoff_ms: u64,
    /// Hold explicit deletions as stale until reconciliation confirms them
    pub confirm_deletions: bool,
    /// Journal records accumulated before the store compacts
    pub compaction_threshold: usize,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        IndexerConfig {
            reconcile_interval_ms: 300_000,
            reconcile_batch_size: 512,
            reconcile_pause_us: 200,
            max_query_backoff_ms: 50,
            confirm_deletions: true,
            compaction_threshold: 4096,
        }
    }
}

impl IndexerConfig {
    /// Reconciliation interval as a `Duration`
    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_millis(self.reconcile_interval_ms)
    }

    /// Yield pause as a `Duration`
    pub fn reconcile_pause(&self) -> Duration {
        Duration::from_micros(self.reconcile_pause_us)
    }

    /// Query backoff cap as a `Duration`
    pub fn max_query_backoff(&self) -> Duration {
        Duration::from_millis(self.max_query_backoff_ms)
    }
}

/// Query pipeline tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// High-quality candidates at or above which fuzzy expansion is skipped
    pub fuzzy_confidence_threshold: usize,
    /// Parse/normalize stage budget
    pub parse_budget_us: u64,
    /// Candidate generation stage budget
    pub candidate_budget_us: u64,
    /// Fuzzy expansion stage budget
    pub fuzzy_budget_us: u64,
    /// Rank & project stage budget
    pub rank_budget_us: u64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        QueryConfig {
            fuzzy_confidence_threshold: 3,
            parse_budget_us: 1_000,
            candidate_budget_us: 5_000,
            fuzzy_budget_us: 7_000,
            rank_budget_us: 2_000,
        }
    }
}

impl QueryConfig {
    /// Sum of all stage budgets
    pub fn total_budget(&self) -> Duration {
        Duration::from_micros(
            self.parse_budget_us
                + self.candidate_budget_us
                + self.fuzzy_budget_us
                + self.rank_budget_us,
        )
    }
}

/// Settings owned by the hotkey/overlay layer. Restart-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Global activation hotkey, e.g. `Ctrl+Shift+Space`
    pub hotkey: String,
}

impl Default for UiConfig {
    fn default() -> Self {
        UiConfig {
            hotkey: "Ctrl+Shift+Space".to_string(),
        }
    }
}

/// Engine configuration loaded from `launchdex.toml`.
///
/// # Example
///
/// ```toml
/// max_results = 20
/// typo_tolerance = 2
/// usage_weight = 0.6
/// recency_weight = 0.4
/// discovery_roots = ["C:/Users/me/Documents"]
/// discovery_exclude_roots = ["C:/Users/me/Documents/node_modules"]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Results returned per query, in [5, 100]
    pub max_results: u16,
    /// Maximum edit distance for fuzzy matches, in [0, 3]
    pub typo_tolerance: u8,
    /// Weight of `ln(1 + use_count)`, in [0.0, 1.0]
    pub usage_weight: f64,
    /// Weight of recency decay, in [0.0, 1.0]
    pub recency_weight: f64,
    /// Roots handed to discovery providers
    pub discovery_roots: Vec<PathBuf>,
    /// Roots whose contents are never indexed
    pub discovery_exclude_roots: Vec<PathBuf>,
    /// Indexer tuning
    pub indexer: IndexerConfig,
    /// Query pipeline tuning
    pub query: QueryConfig,
    /// Restart-only UI settings
    pub ui: UiConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            max_results: 20,
            typo_tolerance: 2,
            usage_weight: 0.6,
            recency_weight: 0.4,
            discovery_roots: Vec::new(),
            discovery_exclude_roots: Vec::new(),
            indexer: IndexerConfig::default(),
            query: QueryConfig::default(),
            ui: UiConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Check every field against its accepted range.
    ///
    /// # Errors
    ///
    /// Returns the first offending field.
    pub fn validate(&self) -> std::result::Result<(), ConfigValidationError> {
        let (lo, hi) = MAX_RESULTS_RANGE;
        if !(lo..=hi).contains(&self.max_results) {
            return Err(ConfigValidationError::new(
                "max_results",
                format!("{} is outside [{}, {}]", self.max_results, lo, hi),
            ));
        }
        if self.typo_tolerance > MAX_TYPO_TOLERANCE {
            return Err(ConfigValidationError::new(
                "typo_tolerance",
                format!(
                    "{} is outside [0, {}]",
                    self.typo_tolerance, MAX_TYPO_TOLERANCE
                ),
            ));
        }
        check_weight("usage_weight", self.usage_weight)?;
        check_weight("recency_weight", self.recency_weight)?;

        if self.indexer.reconcile_interval_ms < MIN_RECONCILE_INTERVAL_MS {
            return Err(ConfigValidationError::new(
                "indexer.reconcile_interval_ms",
                format!("must be at least {}", MIN_RECONCILE_INTERVAL_MS),
            ));
        }
        if self.indexer.reconcile_batch_size == 0 {
            return Err(ConfigValidationError::new(
                "indexer.reconcile_batch_size",
                "must be at least 1",
            ));
        }
        if self.indexer.compaction_threshold < 16 {
            return Err(ConfigValidationError::new(
                "indexer.compaction_threshold",
                "must be at least 16",
            ));
        }

        let budgets = [
            ("query.parse_budget_us", self.query.parse_budget_us),
            ("query.candidate_budget_us", self.query.candidate_budget_us),
            ("query.fuzzy_budget_us", self.query.fuzzy_budget_us),
            ("query.rank_budget_us", self.query.rank_budget_us),
        ];
        for (field, value) in budgets {
            if value == 0 {
                return Err(ConfigValidationError::new(field, "must be positive"));
            }
        }

        validate_hotkey(&self.ui.hotkey).map_err(|msg| ConfigValidationError::new("ui.hotkey", msg))?;
        Ok(())
    }

    /// Parse and validate TOML text.
    ///
    /// # Errors
    ///
    /// `Error::ConfigParse` for malformed TOML, `Error::ConfigValidation`
    /// for out-of-range values.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: EngineConfig =
            toml::from_str(content).map_err(|e| Error::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::ConfigParse(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// Write the default config file if it does not already exist.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml())?;
            info!(target: "launchdex::config", path = %path.display(), "Wrote default config");
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Serialization(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# launchdex configuration
#
# Ranking and indexing values apply live when this file changes.
# Values under [ui] take effect after a restart.

# Results returned per query (5-100)
max_results = 20

# Maximum edit distance tolerated by fuzzy matching (0-3)
typo_tolerance = 2

# Ranking weights (0.0-1.0)
usage_weight = 0.6
recency_weight = 0.4

# Roots handed to discovery, and roots that are never indexed.
# Comparison is case-insensitive; / and \ are equivalent.
discovery_roots = []
discovery_exclude_roots = []

[indexer]
reconcile_interval_ms = 300000
reconcile_batch_size = 512
confirm_deletions = true
compaction_threshold = 4096

[query]
# High-quality matches needed before fuzzy expansion is skipped
fuzzy_confidence_threshold = 3
parse_budget_us = 1000
candidate_budget_us = 5000
fuzzy_budget_us = 7000
rank_budget_us = 2000

[ui]
hotkey = "Ctrl+Shift+Space"
"#
    }

    /// Names of restart-only fields that differ between `self` and `next`.
    pub fn restart_required_changes(&self, next: &EngineConfig) -> Vec<&'static str> {
        let mut changed = Vec::new();
        if self.ui != next.ui {
            changed.push("ui.hotkey");
        }
        changed
    }

    /// Copy restart-only fields from the running config.
    pub fn with_restart_fields_from(mut self, running: &EngineConfig) -> Self {
        self.ui = running.ui.clone();
        self
    }

    /// Discovery roots as a normalized set
    pub fn root_set(&self) -> RootSet {
        RootSet::new(&self.discovery_roots)
    }

    /// Exclusion roots as a normalized set
    pub fn exclude_set(&self) -> RootSet {
        RootSet::new(&self.discovery_exclude_roots)
    }
}

fn check_weight(field: &'static str, value: f64) -> std::result::Result<(), ConfigValidationError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigValidationError::new(
            field,
            format!("{} is outside [0.0, 1.0]", value),
        ))
    }
}

// ============================================================================
// Hotkey validation
// ============================================================================

/// Validate a hotkey chord and return its canonical form.
///
/// Chords need at least one of Ctrl/Alt/Shift plus a key from A-Z, 0-9,
/// Space or F1-F24. Combinations the OS reserves are rejected.
pub fn validate_hotkey(input: &str) -> std::result::Result<String, String> {
    let parts: Vec<&str> = input
        .split('+')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    let Some((key, modifiers)) = parts.split_last() else {
        return Err("hotkey is empty".to_string());
    };
    if modifiers.is_empty() {
        return Err("hotkey needs at least one modifier".to_string());
    }

    let mut mods: BTreeSet<u8> = BTreeSet::new();
    for m in modifiers {
        let rank = match m.to_ascii_lowercase().as_str() {
            "ctrl" | "control" => 0,
            "alt" => 1,
            "shift" => 2,
            "win" | "windows" | "meta" | "super" => {
                return Err("Win/Meta modifiers are not supported".to_string())
            }
            _ => return Err(format!("unsupported modifier '{}'", m)),
        };
        mods.insert(rank);
    }

    let key = normalize_key(key)?;
    let mut canonical: Vec<&str> = mods
        .iter()
        .map(|rank| ["Ctrl", "Alt", "Shift"][*rank as usize])
        .collect();
    canonical.push(&key);
    let canonical = canonical.join("+");

    const RESERVED: &[&str] = &[
        "Alt+Tab",
        "Alt+F4",
        "Alt+Space",
        "Ctrl+Esc",
        "Alt+Esc",
        "Ctrl+Shift+Esc",
    ];
    if RESERVED.contains(&canonical.as_str()) {
        return Err(format!("{} is reserved by the operating system", canonical));
    }
    Ok(canonical)
}

fn normalize_key(raw: &str) -> std::result::Result<String, String> {
    let upper = raw.to_ascii_uppercase();
    if upper == "SPACE" {
        return Ok("Space".to_string());
    }
    if let Some(number) = upper.strip_prefix('F') {
        if let Ok(n) = number.parse::<u8>() {
            return if (1..=24).contains(&n) {
                Ok(format!("F{}", n))
            } else {
                Err("function key must be F1-F24".to_string())
            };
        }
    }
    let mut chars = upper.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_alphanumeric() => Ok(c.to_string()),
        _ => Err(format!("unsupported key '{}'", raw)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_is_valid() {
        EngineConfig::default().validate().unwrap();
    }

    #[test]
    fn default_toml_matches_default_struct() {
        let parsed = EngineConfig::from_toml_str(EngineConfig::default_toml()).unwrap();
        assert_eq!(parsed, EngineConfig::default());
    }

    #[test]
    fn empty_file_uses_defaults() {
        let parsed = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(parsed, EngineConfig::default());
    }

    #[test]
    fn max_results_bounds() {
        for (value, ok) in [(4u16, false), (5, true), (100, true), (101, false)] {
            let config = EngineConfig {
                max_results: value,
                ..EngineConfig::default()
            };
            assert_eq!(config.validate().is_ok(), ok, "max_results = {}", value);
        }
    }

    #[test]
    fn typo_tolerance_bounds() {
        for (value, ok) in [(0u8, true), (3, true), (4, false)] {
            let config = EngineConfig {
                typo_tolerance: value,
                ..EngineConfig::default()
            };
            assert_eq!(config.validate().is_ok(), ok, "typo_tolerance = {}", value);
        }
    }

    #[test]
    fn weight_bounds() {
        let config = EngineConfig {
            usage_weight: 1.5,
            ..EngineConfig::default()
        };
        assert_eq!(config.validate().unwrap_err().field, "usage_weight");

        let config = EngineConfig {
            recency_weight: f64::NAN,
            ..EngineConfig::default()
        };
        assert_eq!(config.validate().unwrap_err().field, "recency_weight");
    }

    #[test]
    fn out_of_range_toml_is_rejected() {
        let err = EngineConfig::from_toml_str("max_results = 500").unwrap_err();
        assert!(matches!(err, Error::ConfigValidation(ref e) if e.field == "max_results"));

        let err = EngineConfig::from_toml_str("typo_tolerance = 9").unwrap_err();
        assert!(matches!(err, Error::ConfigValidation(ref e) if e.field == "typo_tolerance"));
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        let err = EngineConfig::from_toml_str("max_results = \"many\"").unwrap_err();
        assert!(matches!(err, Error::ConfigParse(_)));
    }

    #[test]
    fn zero_budget_rejected() {
        let err = EngineConfig::from_toml_str("[query]\nfuzzy_budget_us = 0").unwrap_err();
        assert!(matches!(err, Error::ConfigValidation(ref e) if e.field == "query.fuzzy_budget_us"));
    }

    #[test]
    fn hotkey_canonicalization() {
        assert_eq!(validate_hotkey("shift+ctrl+space").unwrap(), "Ctrl+Shift+Space");
        assert_eq!(validate_hotkey("Alt + f12").unwrap(), "Alt+F12");
        assert!(validate_hotkey("Space").is_err());
        assert!(validate_hotkey("Win+R").is_err());
        assert!(validate_hotkey("Alt+Tab").is_err());
        assert!(validate_hotkey("Ctrl+F25").is_err());
        assert!(validate_hotkey("Ctrl+Enter").is_err());
    }

    #[test]
    fn restart_fields_are_detected_and_preserved() {
        let running = EngineConfig::default();
        let mut next = EngineConfig::default();
        next.ui.hotkey = "Ctrl+Alt+P".to_string();
        next.max_results = 40;

        assert_eq!(running.restart_required_changes(&next), vec!["ui.hotkey"]);
        let applied = next.with_restart_fields_from(&running);
        assert_eq!(applied.ui.hotkey, "Ctrl+Shift+Space");
        assert_eq!(applied.max_results, 40);
    }

    #[test]
    fn write_default_creates_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        EngineConfig::write_default_if_missing(&path).unwrap();
        assert!(path.exists());
        assert_eq!(EngineConfig::from_file(&path).unwrap(), EngineConfig::default());
    }

    #[test]
    fn write_default_does_not_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "max_results = 50\n").unwrap();
        EngineConfig::write_default_if_missing(&path).unwrap();
        assert_eq!(EngineConfig::from_file(&path).unwrap().max_results, 50);
    }

    #[test]
    fn write_to_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        let config = EngineConfig {
            max_results: 30,
            typo_tolerance: 1,
            discovery_roots: vec![PathBuf::from("/home/me")],
            discovery_exclude_roots: vec![PathBuf::from("/home/me/.cache")],
            ..EngineConfig::default()
        };
        config.write_to_file(&path).unwrap();
        assert_eq!(EngineConfig::from_file(&path).unwrap(), config);
    }

    #[test]
    fn exclude_set_normalizes() {
        let config = EngineConfig {
            discovery_exclude_roots: vec![PathBuf::from(r"C:\Temp\")],
            ..EngineConfig::default()
        };
        assert!(config.exclude_set().covers("c:/temp/file.txt"));
    }
}
