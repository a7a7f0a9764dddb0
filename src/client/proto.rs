//! RPC payload types for the management endpoints
//!
//! These are opaque request/response records relayed between the fleet client
//! and the storage servers; the control plane aggregates them but never
//! computes storage results itself.

use serde::{Deserialize, Serialize};

// =============================================================================
// Response State
// =============================================================================

/// Outcome classification for one remote storage operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    #[default]
    Success,
    ErrNvme,
    ErrScm,
    ErrApp,
    ErrUnknown,
}

/// Per-operation state reported in-band by a storage server
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseState {
    pub status: ResponseStatus,
    /// Error detail when status is not success
    #[serde(default)]
    pub error: String,
    /// Informational detail (e.g. "already formatted")
    #[serde(default)]
    pub info: String,
}

impl ResponseState {
    pub fn is_success(&self) -> bool {
        self.status == ResponseStatus::Success
    }
}

// =============================================================================
// Device Inventory
// =============================================================================

/// One NVMe namespace belonging to a controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NvmeNamespace {
    pub id: u32,
    pub capacity_bytes: u64,
}

/// One NVMe SSD controller attached to a storage server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NvmeController {
    /// PCI address (e.g. 0000:81:00.0)
    pub pci_addr: String,
    pub model: String,
    pub serial: String,
    pub firmware: String,
    pub socket_id: u32,
    #[serde(default)]
    pub namespaces: Vec<NvmeNamespace>,
}

/// Result of one operation against an NVMe controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NvmeControllerResult {
    pub pci_addr: String,
    pub state: ResponseState,
}

/// One SCM (storage-class memory) module attached to a storage server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScmModule {
    pub physical_id: u32,
    pub channel: u32,
    pub socket: u32,
    pub capacity_bytes: u64,
}

/// Result of one operation against an SCM module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScmModuleResult {
    pub physical_id: u32,
    pub state: ResponseState,
}

/// One SCM mount on a storage server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScmMountResult {
    pub mount_point: String,
    pub state: ResponseState,
}

// =============================================================================
// Storage Operations
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageScanRequest {}

/// Per-host device inventory
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageScanResponse {
    pub controllers: Vec<NvmeController>,
    pub modules: Vec<ScmModule>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrepareNvmeRequest {
    pub pci_allow_list: String,
    pub hugepage_count: i32,
    pub target_user: String,
    pub reset: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrepareScmRequest {
    pub reset: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoragePrepareRequest {
    pub nvme: Option<PrepareNvmeRequest>,
    pub scm: Option<PrepareScmRequest>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoragePrepareResponse {
    pub nvme_state: ResponseState,
    pub scm_state: ResponseState,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageFormatRequest {
    pub reformat: bool,
}

/// One message of a streamed format response; a host may send several before
/// the end-of-stream marker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageFormatResponse {
    pub controller_results: Vec<NvmeControllerResult>,
    pub mount_results: Vec<ScmMountResult>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateNvmeRequest {
    /// Only update controllers with this model name
    pub model: String,
    /// Only update controllers currently running this firmware revision
    pub start_rev: String,
    /// Firmware image path, accessible on every storage server
    pub path: String,
    pub slot: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageUpdateRequest {
    pub nvme: Option<UpdateNvmeRequest>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageUpdateResponse {
    pub controller_results: Vec<NvmeControllerResult>,
    pub module_results: Vec<ScmModuleResult>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageBurnInRequest {
    /// Workload configuration path, accessible on every storage server
    pub config_path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageBurnInResponse {
    pub controller_results: Vec<NvmeControllerResult>,
    pub mount_results: Vec<ScmMountResult>,
}

// =============================================================================
// Features
// =============================================================================

/// One capability advertised by a storage server
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    pub name: String,
    pub category: String,
    pub description: String,
}

// =============================================================================
// Cluster Service Operations
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PoolCreateRequest {
    pub uuid: String,
    pub scm_bytes: u64,
    pub nvme_bytes: u64,
    /// Target ranks; empty means all
    pub ranks: Vec<u32>,
    pub num_svc_replicas: u32,
    pub system: String,
    pub user: String,
    pub group: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolCreateResponse {
    pub state: ResponseState,
    /// Ranks hosting the pool service replicas
    pub svc_replicas: Vec<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PoolDestroyRequest {
    pub uuid: String,
    pub force: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolDestroyResponse {
    pub state: ResponseState,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KillRankRequest {
    pub pool_uuid: String,
    pub rank: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KillRankResponse {
    pub state: ResponseState,
}
