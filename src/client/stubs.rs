//! RPC stubs for the two management services
//!
//! Each storage server exposes a control-plane administrative service
//! (storage scan/prepare/format/update/burn-in, feature list) and a cluster
//! service (pool lifecycle, rank termination). The stubs are capability
//! traits so tests can substitute them at construction time.

use crate::client::proto::*;
use crate::client::transport::{ResponseStream, RpcChannel};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

// =============================================================================
// Stub Traits
// =============================================================================

/// Control-plane administrative service of one storage server
#[async_trait]
pub trait MgmtCtlClient: Send + Sync {
    /// List the capabilities the server advertises (streamed).
    async fn list_features(&self) -> Result<ResponseStream<Feature>>;

    async fn storage_scan(&self, req: &StorageScanRequest) -> Result<StorageScanResponse>;

    async fn storage_prepare(
        &self,
        req: &StoragePrepareRequest,
    ) -> Result<StoragePrepareResponse>;

    /// Format storage; per-device results arrive as a stream.
    async fn storage_format(
        &self,
        req: &StorageFormatRequest,
    ) -> Result<ResponseStream<StorageFormatResponse>>;

    /// Update device firmware; per-device results arrive as a stream.
    async fn storage_update(
        &self,
        req: &StorageUpdateRequest,
    ) -> Result<ResponseStream<StorageUpdateResponse>>;

    /// Run burn-in validation; per-device results arrive as a stream.
    async fn storage_burnin(
        &self,
        req: &StorageBurnInRequest,
    ) -> Result<ResponseStream<StorageBurnInResponse>>;
}

/// Cluster service of one storage server
#[async_trait]
pub trait MgmtSvcClient: Send + Sync {
    async fn pool_create(&self, req: &PoolCreateRequest) -> Result<PoolCreateResponse>;

    async fn pool_destroy(&self, req: &PoolDestroyRequest) -> Result<PoolDestroyResponse>;

    async fn kill_rank(&self, req: &KillRankRequest) -> Result<KillRankResponse>;
}

pub type MgmtCtlClientRef = Arc<dyn MgmtCtlClient>;
pub type MgmtSvcClientRef = Arc<dyn MgmtSvcClient>;

// =============================================================================
// Production Stubs
// =============================================================================

/// Administrative stub speaking the crate's RPC framing
pub struct RpcCtlClient {
    channel: RpcChannel,
}

impl RpcCtlClient {
    pub fn new(channel: RpcChannel) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl MgmtCtlClient for RpcCtlClient {
    async fn list_features(&self) -> Result<ResponseStream<Feature>> {
        self.channel
            .streaming("ListFeatures", &serde_json::json!({}))
            .await
    }

    async fn storage_scan(&self, req: &StorageScanRequest) -> Result<StorageScanResponse> {
        self.channel.unary("StorageScan", req).await
    }

    async fn storage_prepare(
        &self,
        req: &StoragePrepareRequest,
    ) -> Result<StoragePrepareResponse> {
        self.channel.unary("StoragePrepare", req).await
    }

    async fn storage_format(
        &self,
        req: &StorageFormatRequest,
    ) -> Result<ResponseStream<StorageFormatResponse>> {
        self.channel.streaming("StorageFormat", req).await
    }

    async fn storage_update(
        &self,
        req: &StorageUpdateRequest,
    ) -> Result<ResponseStream<StorageUpdateResponse>> {
        self.channel.streaming("StorageUpdate", req).await
    }

    async fn storage_burnin(
        &self,
        req: &StorageBurnInRequest,
    ) -> Result<ResponseStream<StorageBurnInResponse>> {
        self.channel.streaming("StorageBurnIn", req).await
    }
}

/// Cluster-service stub speaking the crate's RPC framing
pub struct RpcSvcClient {
    channel: RpcChannel,
}

impl RpcSvcClient {
    pub fn new(channel: RpcChannel) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl MgmtSvcClient for RpcSvcClient {
    async fn pool_create(&self, req: &PoolCreateRequest) -> Result<PoolCreateResponse> {
        self.channel.unary("PoolCreate", req).await
    }

    async fn pool_destroy(&self, req: &PoolDestroyRequest) -> Result<PoolDestroyResponse> {
        self.channel.unary("PoolDestroy", req).await
    }

    async fn kill_rank(&self, req: &KillRankRequest) -> Result<KillRankResponse> {
        self.channel.unary("KillRank", req).await
    }
}
