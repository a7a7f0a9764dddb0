//! SCM storage capability consumed by the superblock orchestration
//!
//! The actual device mechanics (namespace preparation, DAX mounts and so on)
//! live outside this crate; the instance only needs to ask whether the local
//! storage is formatted and to ensure it is mounted. Adapters implement
//! [`ScmStorage`] to provide concrete behavior.

use crate::error::{Error, Result};
use std::path::PathBuf;
use tracing::debug;

/// Port for local SCM mount/format-state queries
pub trait ScmStorage: Send + Sync {
    /// Whether the backing storage still needs formatting.
    fn needs_format(&self) -> Result<bool>;

    /// Mount the backing storage. Idempotent: mounting an already-mounted
    /// device is a no-op.
    fn mount(&self) -> Result<()>;
}

// =============================================================================
// Directory-backed adapter
// =============================================================================

/// An [`ScmStorage`] adapter backed by a plain directory.
///
/// Used for development and single-node deployments without SCM hardware:
/// "formatted" means the mount directory exists, and mounting creates it.
pub struct DirScmStorage {
    mount: PathBuf,
}

impl DirScmStorage {
    pub fn new(mount: impl Into<PathBuf>) -> Self {
        Self {
            mount: mount.into(),
        }
    }
}

impl ScmStorage for DirScmStorage {
    fn needs_format(&self) -> Result<bool> {
        Ok(!self.mount.is_dir())
    }

    fn mount(&self) -> Result<()> {
        if self.mount.is_dir() {
            return Ok(());
        }
        debug!("creating storage directory {}", self.mount.display());
        std::fs::create_dir_all(&self.mount).map_err(|e| Error::Mount {
            mount: self.mount.clone(),
            reason: e.to_string(),
        })
    }
}

// =============================================================================
// Test double
// =============================================================================

/// Mock storage capability with settable format/mount behavior.
#[cfg(test)]
pub(crate) struct MockScmStorage {
    mount: PathBuf,
    needs_format: bool,
    fail_mount: bool,
    mount_calls: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl MockScmStorage {
    pub fn formatted(mount: impl Into<PathBuf>) -> Self {
        Self {
            mount: mount.into(),
            needs_format: false,
            fail_mount: false,
            mount_calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn unformatted(mount: impl Into<PathBuf>) -> Self {
        Self {
            needs_format: true,
            ..Self::formatted(mount)
        }
    }

    pub fn with_failing_mount(mut self) -> Self {
        self.fail_mount = true;
        self
    }

    pub fn mount_calls(&self) -> usize {
        self.mount_calls.load(std::sync::atomic::Ordering::Relaxed)
    }
}

#[cfg(test)]
impl ScmStorage for MockScmStorage {
    fn needs_format(&self) -> Result<bool> {
        Ok(self.needs_format)
    }

    fn mount(&self) -> Result<()> {
        self.mount_calls
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        if self.fail_mount {
            return Err(Error::Mount {
                mount: self.mount.clone(),
                reason: "injected mount failure".into(),
            });
        }
        Ok(())
    }
}
