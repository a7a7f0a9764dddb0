//! Server instance superblock orchestration
//!
//! A [`ServerInstance`] decides at startup whether its local storage needs
//! formatting, creates a fresh identity record when it does, and otherwise
//! reloads the persisted identity so rank and management-service role survive
//! restarts.

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::server::storage::ScmStorage;
use crate::server::superblock::{
    self, Rank, Superblock, DEFAULT_GROUP_NAME, DEFAULT_STORAGE_PATH, SUPERBLOCK_FILE,
    SUPERBLOCK_VERSION,
};
use parking_lot::RwLock;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

// =============================================================================
// Management-Service Placement
// =============================================================================

/// Management-service placement facts for one instance, supplied by the
/// external placement authority. This is the only input from which membership
/// role is decided.
#[derive(Debug, Clone, Copy, Default)]
pub struct MsInfo {
    /// Whether this instance is a management-service replica candidate
    pub is_replica: bool,
    /// Whether this instance bootstraps the management-service group
    pub should_bootstrap: bool,
}

impl MsInfo {
    /// Reject placement combinations that can never be valid: an instance
    /// cannot bootstrap the management service without being a replica.
    pub fn validate(&self) -> Result<()> {
        if self.should_bootstrap && !self.is_replica {
            return Err(Error::InvalidMsInfo(
                "should_bootstrap requires is_replica".into(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Server Instance
// =============================================================================

/// Runtime representation of one local storage-server process.
///
/// The superblock pointer is guarded by a read/write lock: concurrent readers
/// (health/status queries) are permitted, but creation and reload exclude all
/// readers for the duration of the mutation.
pub struct ServerInstance {
    config: ServerConfig,
    storage: Arc<dyn ScmStorage>,
    superblock: RwLock<Option<Superblock>>,
    /// Root path prefix, used in test/alternate-root scenarios
    fs_root: PathBuf,
}

impl ServerInstance {
    /// Create an instance with an injected storage capability.
    pub fn new(config: ServerConfig, storage: Arc<dyn ScmStorage>) -> Self {
        Self {
            config,
            storage,
            superblock: RwLock::new(None),
            fs_root: PathBuf::from("/"),
        }
    }

    /// Override the filesystem root (tests, chroot-style deployments).
    pub fn with_fs_root(mut self, fs_root: impl Into<PathBuf>) -> Self {
        self.fs_root = fs_root.into();
        self
    }

    /// The SCM mount point, falling back to the default storage path.
    fn scm_mount_point(&self) -> PathBuf {
        self.config
            .scm_mount_point
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STORAGE_PATH))
    }

    /// Absolute path of this instance's superblock file.
    fn superblock_path(&self) -> PathBuf {
        let mount = self.scm_mount_point();
        let relative = mount.strip_prefix("/").unwrap_or(&mount).to_path_buf();
        self.fs_root.join(relative).join(SUPERBLOCK_FILE)
    }

    fn set_superblock(&self, sb: Superblock) {
        *self.superblock.write() = Some(sb);
    }

    /// A copy of the currently-held superblock, if any.
    pub fn superblock(&self) -> Option<Superblock> {
        self.superblock.read().clone()
    }

    pub fn has_superblock(&self) -> bool {
        self.superblock.read().is_some()
    }

    /// Whether the instance appears to need a superblock to be created in
    /// order to start.
    ///
    /// Returns `Ok(true)` on the expected bootstrap path (storage not yet
    /// formatted). Storage that is formatted but holds no readable superblock
    /// is corruption and is surfaced as an error, never silently reformatted.
    pub fn needs_superblock(&self) -> Result<bool> {
        if self.has_superblock() {
            return Ok(false);
        }

        let mount = self.scm_mount_point();
        debug!("{}: checking superblock", mount.display());

        match self.read_superblock() {
            Ok(()) => Ok(false),
            Err(Error::UnformattedStorage { .. }) => {
                debug!("{}: needs superblock (storage unformatted)", mount.display());
                Ok(true)
            }
            Err(e) => Err(Error::SuperblockCorrupt {
                source: Box::new(e),
            }),
        }
    }

    /// Create the superblock for this instance.
    ///
    /// Generates a fresh identity, records the membership role supplied by the
    /// placement authority, and persists immediately. A persistence failure is
    /// fatal: the instance must not serve with an unpersisted identity.
    pub fn create_superblock(&self, ms_info: &MsInfo) -> Result<()> {
        ms_info.validate()?;
        self.storage.mount()?;

        let system = self
            .config
            .system_name
            .clone()
            .unwrap_or_else(|| DEFAULT_GROUP_NAME.to_string());

        // The configured rank is authoritative when present; otherwise the
        // bootstrap instance self-assigns the first rank.
        let rank = self.config.rank.or_else(|| {
            (ms_info.is_replica && ms_info.should_bootstrap).then_some(Rank::FIRST)
        });

        let sb = Superblock {
            version: SUPERBLOCK_VERSION,
            uuid: uuid::Uuid::new_v4().to_string(),
            system,
            rank,
            valid_rank: rank.is_some(),
            ms: ms_info.is_replica,
            create_ms: ms_info.is_replica,
            bootstrap_ms: ms_info.should_bootstrap,
        };

        info!(
            uuid = %sb.uuid,
            system = %sb.system,
            ms = sb.ms,
            bootstrap = sb.bootstrap_ms,
            "created superblock"
        );

        self.set_superblock(sb);
        self.write_superblock()
    }

    /// Load the persisted superblock into memory, replacing any prior value.
    ///
    /// Fails with [`Error::UnformattedStorage`] when the backing storage has
    /// not been formatted; that condition is distinct from generic I/O errors.
    pub fn read_superblock(&self) -> Result<()> {
        if self.storage.needs_format()? {
            return Err(Error::UnformattedStorage {
                mount: self.scm_mount_point(),
            });
        }

        self.storage.mount()?;

        let sb = superblock::read_superblock(&self.superblock_path())?;
        self.set_superblock(sb);

        Ok(())
    }

    /// Persist the currently-held superblock.
    pub fn write_superblock(&self) -> Result<()> {
        let sb = self.superblock().ok_or(Error::NoSuperblock)?;
        superblock::write_superblock(&self.superblock_path(), &sb)
    }
}
