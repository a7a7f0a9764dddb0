//! Error types for the storage fleet control plane
//!
//! Provides structured error types for all control-plane components including
//! the fleet client, the RPC transport, and per-node superblock management.

use std::path::PathBuf;
use thiserror::Error;

/// Unified error type for the control plane
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // =========================================================================
    // Connection Errors (per host, never fatal to a fleet operation)
    // =========================================================================
    #[error("Connection to {addr} is not usable (state: {state})")]
    ConnectionUnavailable { addr: String, state: String },

    #[error("Failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Request to {addr} timed out after {secs}s")]
    Timeout { addr: String, secs: u64 },

    // =========================================================================
    // RPC Errors (remote-side failure reported in-band)
    // =========================================================================
    #[error("RPC failure from {addr}: {reason}")]
    Rpc { addr: String, reason: String },

    #[error("Malformed RPC payload from {addr}: {reason}")]
    Payload { addr: String, reason: String },

    // =========================================================================
    // Superblock Errors
    // =========================================================================
    #[error("No superblock found at {path}")]
    SuperblockNotFound { path: PathBuf },

    #[error("Failed to encode superblock: {0}")]
    SuperblockEncode(#[source] serde_yaml::Error),

    #[error("Failed to decode superblock: {0}")]
    SuperblockDecode(#[source] serde_yaml::Error),

    #[error("Storage is formatted but the superblock is unreadable: {source}")]
    SuperblockCorrupt {
        #[source]
        source: Box<Error>,
    },

    #[error("Instance holds no superblock")]
    NoSuperblock,

    // =========================================================================
    // Instance Storage Errors
    // =========================================================================
    #[error("Cannot read superblock from unformatted storage at {mount}")]
    UnformattedStorage { mount: PathBuf },

    #[error("Failed to mount storage at {mount}: {reason}")]
    Mount { mount: PathBuf, reason: String },

    // =========================================================================
    // Placement Errors
    // =========================================================================
    #[error("Invalid management-service placement: {0}")]
    InvalidMsInfo(String),

    // =========================================================================
    // Parse Errors
    // =========================================================================
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    // =========================================================================
    // IO Errors
    // =========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Check whether this error is the expected "superblock file absent" signal,
    /// as opposed to some other read failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::SuperblockNotFound { .. })
    }
}

/// Result type alias for the control plane
pub type Result<T> = std::result::Result<T, Error>;
