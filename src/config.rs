//! Configuration types for the control plane
//!
//! Server-side configuration describes the local storage-server instance
//! (system name, rank hint, SCM mount point). Client-side configuration
//! describes the fleet (host list) and the transport security settings shared
//! by every connection.

use crate::error::{Error, Result};
use crate::server::Rank;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// =============================================================================
// Server Configuration
// =============================================================================

/// Configuration for one local storage-server instance
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Cluster/system name the instance belongs to
    pub system_name: Option<String>,
    /// Statically configured rank hint (authoritative when present)
    pub rank: Option<Rank>,
    /// SCM mount point backing the instance's metadata
    pub scm_mount_point: Option<PathBuf>,
}

// =============================================================================
// Transport Configuration
// =============================================================================

/// Security and timing settings shared by every fleet connection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Skip certificate-based security and use plain TCP
    pub allow_insecure: bool,
    /// CA certificate path
    pub ca_cert: Option<PathBuf>,
    /// Client certificate path
    pub cert: Option<PathBuf>,
    /// Client key path
    pub key: Option<PathBuf>,
    /// Dial timeout in seconds
    pub connect_timeout_secs: u64,
    /// Per-RPC deadline in seconds
    pub request_timeout_secs: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            allow_insecure: false,
            ca_cert: None,
            cert: None,
            key: None,
            connect_timeout_secs: 10,
            request_timeout_secs: 30,
        }
    }
}

impl TransportConfig {
    /// An explicitly-insecure configuration, for tests and lab clusters.
    pub fn insecure() -> Self {
        Self {
            allow_insecure: true,
            ..Default::default()
        }
    }

    /// Validate that the configuration is internally consistent: secure mode
    /// requires complete certificate material.
    pub fn validate(&self) -> Result<()> {
        if self.allow_insecure {
            return Ok(());
        }
        if self.ca_cert.is_none() || self.cert.is_none() || self.key.is_none() {
            return Err(Error::Configuration(
                "allow_insecure is false but certificate material is incomplete \
                 (ca_cert, cert and key are all required)"
                    .into(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Client Configuration
// =============================================================================

/// Configuration for the fleet management client
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Management endpoints of every storage server in the fleet
    pub hosts: Vec<String>,
    /// Transport settings applied uniformly to every connection
    pub transport: TransportConfig,
}

impl ClientConfig {
    /// Load a client configuration from a YAML file.
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&raw).map_err(|e| {
            Error::Configuration(format!("failed to parse {}: {}", path.display(), e))
        })
    }
}
