//! Node-side components: per-instance identity and its durable superblock
//!
//! Each storage-server process owns one [`ServerInstance`], which runs the
//! superblock lifecycle at startup: detect "needs formatting", create and
//! persist a fresh identity, or reload the existing one.

pub mod instance;
pub mod storage;
pub mod superblock;

pub use instance::{MsInfo, ServerInstance};
pub use storage::{DirScmStorage, ScmStorage};
pub use superblock::{
    read_superblock, write_superblock, Rank, Superblock, DEFAULT_GROUP_NAME,
    DEFAULT_STORAGE_PATH, SUPERBLOCK_FILE, SUPERBLOCK_VERSION,
};
