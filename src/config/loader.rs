//! YAML configuration loading.
//!
//! The file is optional; every field has a default so an empty mapping is
//! valid. Loading runs in three stages: read (with a size limit and BOM
//! stripping), parse, then validate and normalise the target list.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;

/// Largest configuration file accepted (1 MB).
const MAX_CONFIG_SIZE: u64 = 1024 * 1024;

/// Deployment settings read from a YAML file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct FogConfig {
    /// Initial targets, in order.
    pub targets: Vec<String>,
    /// Record sends instead of transmitting.
    pub dry_run: bool,
    /// Dashboard bind address (`host:port`, `:port` or `port`).
    pub dashboard: Option<String>,
    /// Directory for the event log and fingerprint.
    pub output_dir: Option<PathBuf>,
    /// Addresses added to the built-in protected list.
    pub protected: Vec<String>,
}

/// A non-fatal issue noticed while loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadWarning {
    /// Where in the file the issue was found (e.g. `targets[2]`).
    pub location: String,
    /// What was wrong.
    pub message: String,
}

/// Result of a successful load.
#[derive(Debug, Clone)]
pub struct LoadResult {
    /// The validated configuration.
    pub config: FogConfig,
    /// Warnings collected along the way.
    pub warnings: Vec<LoadWarning>,
}

/// Loads and validates a configuration file.
///
/// # Errors
///
/// Returns [`ConfigError::MissingFile`] if the file cannot be read,
/// [`ConfigError::ParseError`] for malformed YAML or unknown fields, and
/// [`ConfigError::InvalidValue`] for an oversized file or an unusable
/// target or protected address.
pub fn load_config(path: &Path) -> Result<LoadResult, ConfigError> {
    let metadata = std::fs::metadata(path).map_err(|_| ConfigError::MissingFile {
        path: path.to_path_buf(),
    })?;
    if metadata.len() > MAX_CONFIG_SIZE {
        return Err(ConfigError::InvalidValue {
            field: "file_size".to_string(),
            value: format!("{} bytes", metadata.len()),
            expected: format!("at most {MAX_CONFIG_SIZE} bytes"),
        });
    }

    let raw = std::fs::read_to_string(path).map_err(|_| ConfigError::MissingFile {
        path: path.to_path_buf(),
    })?;
    parse_config(&raw, path)
}

/// Parses and validates configuration text; `path` is used for messages.
///
/// # Errors
///
/// See [`load_config`].
pub fn parse_config(raw: &str, path: &Path) -> Result<LoadResult, ConfigError> {
    let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);

    // An empty document means "all defaults".
    let mut config: FogConfig = if raw.trim().is_empty() {
        FogConfig::default()
    } else {
        serde_yaml::from_str(raw).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            line: e.location().map(|l| l.line()),
            message: e.to_string(),
        })?
    };

    let mut warnings = Vec::new();
    config.targets = normalize_addresses("targets", config.targets, &mut warnings)?;
    config.protected = normalize_addresses("protected", config.protected, &mut warnings)?;

    Ok(LoadResult { config, warnings })
}

/// Trims, rejects blank or whitespace-bearing entries, and drops duplicates
/// (keeping the first occurrence).
///
/// # Errors
///
/// Returns [`ConfigError::InvalidValue`] for an unusable entry.
pub fn normalize_addresses(
    field: &str,
    entries: Vec<String>,
    warnings: &mut Vec<LoadWarning>,
) -> Result<Vec<String>, ConfigError> {
    let mut out: Vec<String> = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        let trimmed = entry.trim();
        validate_address(trimmed).map_err(|expected| ConfigError::InvalidValue {
            field: format!("{field}[{index}]"),
            value: entry.clone(),
            expected: expected.to_string(),
        })?;
        if out.iter().any(|seen| seen == trimmed) {
            warnings.push(LoadWarning {
                location: format!("{field}[{index}]"),
                message: format!("duplicate entry '{trimmed}' ignored"),
            });
            continue;
        }
        out.push(trimmed.to_string());
    }
    Ok(out)
}

/// Checks that a target identifier is usable as a destination.
///
/// # Errors
///
/// Returns a description of what was expected.
pub fn validate_address(address: &str) -> Result<(), &'static str> {
    if address.is_empty() {
        return Err("a non-empty host name or IP address");
    }
    if address.chars().any(char::is_whitespace) {
        return Err("a host name or IP address without whitespace");
    }
    Ok(())
}
