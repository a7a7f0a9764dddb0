//! Per-instance superblock: the durable identity record of one storage server
//!
//! The superblock remembers the instance's cluster role (rank,
//! management-service membership, bootstrap status) across restarts. It is
//! created once, immediately persisted, and reloaded at every subsequent
//! process start. The on-disk form is versioned, human-auditable YAML.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;
use tracing::debug;

/// Current superblock format version
pub const SUPERBLOCK_VERSION: u8 = 0;

/// File name of the superblock under the SCM mount point
pub const SUPERBLOCK_FILE: &str = "superblock";

/// Default SCM mount point when the instance has none configured
pub const DEFAULT_STORAGE_PATH: &str = "/mnt/storage";

/// Default system/group name when the instance has none configured
pub const DEFAULT_GROUP_NAME: &str = "storage_server";

// =============================================================================
// Rank
// =============================================================================

/// Cluster-wide unique numeric identifier for a storage-server instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rank(pub u32);

impl Rank {
    /// The rank the bootstrap instance self-assigns, by convention of the
    /// external rank authority.
    pub const FIRST: Rank = Rank(0);
}

impl std::fmt::Display for Rank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for Rank {
    fn from(r: u32) -> Self {
        Rank(r)
    }
}

// =============================================================================
// Superblock
// =============================================================================

/// The per-instance superblock
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Superblock {
    /// Format version
    pub version: u8,
    /// Globally unique instance identity, generated once at creation time
    pub uuid: String,
    /// Cluster/system name the instance belongs to
    pub system: String,
    /// Cluster rank; absent until assigned
    pub rank: Option<Rank>,
    /// Whether `rank` is authoritative
    pub valid_rank: bool,
    /// Whether this instance is a management-service replica candidate
    pub ms: bool,
    /// Whether this instance should create a management-service replica locally
    pub create_ms: bool,
    /// Whether this instance bootstraps the management-service group
    pub bootstrap_ms: bool,
}

impl Superblock {
    /// Serialize the superblock into its storable YAML representation.
    pub fn marshal(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(Error::SuperblockEncode)
    }

    /// Reconstitute a superblock from a marshaled representation.
    pub fn unmarshal(raw: &str) -> Result<Superblock> {
        serde_yaml::from_str(raw).map_err(Error::SuperblockDecode)
    }
}

// =============================================================================
// Superblock Store
// =============================================================================

/// Persist a superblock atomically: serialize, write to a temporary file in
/// the target's directory, then rename over the target. A partial write is
/// never observable; either the new content is fully visible or the prior
/// file (or no file) is untouched.
pub fn write_superblock(path: &Path, sb: &Superblock) -> Result<()> {
    let data = sb.marshal()?;

    let dir = path.parent().ok_or_else(|| {
        Error::Internal(format!("superblock path {} has no parent", path.display()))
    })?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(data.as_bytes())?;
    tmp.as_file().sync_all()?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o600))?;
    }

    tmp.persist(path).map_err(|e| Error::Io(e.error))?;
    debug!("superblock written to {}", path.display());

    Ok(())
}

/// Read a superblock from storage.
///
/// A missing file is reported as [`Error::SuperblockNotFound`]; callers use
/// this to distinguish the expected "not yet formatted" signal from other I/O
/// failures.
pub fn read_superblock(path: &Path) -> Result<Superblock> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::SuperblockNotFound {
                path: path.to_path_buf(),
            }
        } else {
            Error::Io(e)
        }
    })?;

    Superblock::unmarshal(&raw)
}
