//! Error types for `PhantomFog`
//!
//! Startup failures (configuration, socket binding, dashboard binding) are
//! fatal and map to process exit codes. Nothing raised inside a running
//! worker or the rate controller ever reaches this hierarchy: those
//! failures are logged as events and the task carries on.

use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// Exit Codes
// ============================================================================

/// Exit codes for `PhantomFog` CLI operations.
///
/// These codes follow Unix conventions.
pub struct ExitCode;

impl ExitCode {
    /// Successful execution
    pub const SUCCESS: i32 = 0;

    /// General error
    pub const ERROR: i32 = 1;

    /// Configuration error (invalid YAML, validation failure)
    pub const CONFIG_ERROR: i32 = 2;

    /// I/O error (file not found, permission denied)
    pub const IO_ERROR: i32 = 3;

    /// Network error (sender socket or dashboard listener unavailable)
    pub const NETWORK_ERROR: i32 = 4;

    /// Usage error (invalid arguments, missing required options)
    pub const USAGE_ERROR: i32 = 64;

    /// Interrupted by SIGINT (Ctrl+C)
    pub const INTERRUPTED: i32 = 130;

    /// Terminated by SIGTERM
    pub const TERMINATED: i32 = 143;
}

// ============================================================================
// Top-Level Error
// ============================================================================

/// Top-level error type for `PhantomFog` operations.
#[derive(Debug, Error)]
pub enum FogError {
    /// Configuration loading or validation error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Packet sender could not be brought up
    #[error(transparent)]
    Send(#[from] SendError),

    /// Dashboard listener error
    #[error(transparent)]
    Dashboard(#[from] DashboardError),

    /// Invalid command-line usage
    #[error("usage error: {0}")]
    Usage(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FogError {
    /// Returns the appropriate exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => ExitCode::CONFIG_ERROR,
            Self::Send(_) | Self::Dashboard(_) => ExitCode::NETWORK_ERROR,
            Self::Usage(_) => ExitCode::USAGE_ERROR,
            Self::Io(_) => ExitCode::IO_ERROR,
            Self::Json(_) => ExitCode::ERROR,
        }
    }
}

// ============================================================================
// Configuration Errors
// ============================================================================

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// YAML parsing failed
    #[error("parse error in {path}: {message}")]
    ParseError {
        /// Path to the configuration file
        path: PathBuf,
        /// Line number where the error occurred (if available)
        line: Option<usize>,
        /// Error message from the parser
        message: String,
    },

    /// Referenced configuration file not found
    #[error("file not found: {path}")]
    MissingFile {
        /// Path to the missing file
        path: PathBuf,
    },

    /// Field has an invalid value
    #[error("invalid value for '{field}': got '{value}', expected {expected}")]
    InvalidValue {
        /// Name of the field with invalid value
        field: String,
        /// The actual value provided
        value: String,
        /// Description of what was expected
        expected: String,
    },
}

// ============================================================================
// Packet Sender Errors
// ============================================================================

/// Failures raised by a [`PacketSender`](crate::sender::PacketSender).
///
/// Per-send failures are reported by workers as `noise_error` events; only
/// [`SendError::Bind`] is ever surfaced to the caller of `run`.
#[derive(Debug, Error)]
pub enum SendError {
    /// The local socket could not be created
    #[error("failed to bind sender socket: {0}")]
    Bind(#[source] std::io::Error),

    /// The destination could not be resolved to an address
    #[error("cannot resolve {target}: {reason}")]
    Resolve {
        /// Destination as configured
        target: String,
        /// Resolver message
        reason: String,
    },

    /// The datagram was not handed to the network stack
    #[error("transmit to {target}:{port} failed: {source}")]
    Transmit {
        /// Destination as configured
        target: String,
        /// Destination port
        port: u16,
        /// Underlying socket error
        #[source]
        source: std::io::Error,
    },

    /// The destination resolved to an address on the deny list
    #[error("{target} resolves to protected address {addr}")]
    Protected {
        /// Destination as configured
        target: String,
        /// Resolved address that matched
        addr: std::net::IpAddr,
    },
}

// ============================================================================
// Dashboard Errors
// ============================================================================

/// Dashboard listener errors.
#[derive(Debug, Error)]
pub enum DashboardError {
    /// The bind address could not be parsed
    #[error("invalid bind address \"{input}\": {reason}")]
    InvalidAddress {
        /// Address as given on the command line or in config
        input: String,
        /// Parser message
        reason: String,
    },

    /// The TCP listener could not be bound
    #[error("dashboard bind failed: {0}")]
    Bind(#[source] std::io::Error),
}

// ============================================================================
// Result Type Alias
// ============================================================================

/// Result type alias for `PhantomFog` operations.
pub type Result<T> = std::result::Result<T, FogError>;

// ============================================================================
// Tests
// ============================================================================
