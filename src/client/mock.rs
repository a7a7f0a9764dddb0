//! Test doubles for the fleet layer
//!
//! Mock stubs, controls and a mock controller factory, substituted through
//! the same constructor-injection seams production uses.

use crate::client::control::{ConnState, Control, ControllerFactory};
use crate::client::proto::*;
use crate::client::stubs::{MgmtCtlClient, MgmtCtlClientRef, MgmtSvcClient, MgmtSvcClientRef};
use crate::client::transport::ResponseStream;
use crate::config::TransportConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

pub(crate) fn mock_controller(serial: &str) -> NvmeController {
    NvmeController {
        pci_addr: "0000:81:00.0".into(),
        model: "ACME-X1".into(),
        serial: serial.into(),
        firmware: "1.0.2".into(),
        socket_id: 0,
        namespaces: vec![NvmeNamespace {
            id: 1,
            capacity_bytes: 2_000_000_000_000,
        }],
    }
}

pub(crate) fn mock_feature() -> Feature {
    Feature {
        name: "burn-name".into(),
        category: "nvme".into(),
        description: "burn-in validation".into(),
    }
}

fn failed_state(reason: &str) -> ResponseState {
    ResponseState {
        status: ResponseStatus::ErrApp,
        error: reason.into(),
        info: String::new(),
    }
}

pub(crate) fn mock_format_response() -> StorageFormatResponse {
    StorageFormatResponse {
        controller_results: vec![NvmeControllerResult {
            pci_addr: "0000:81:00.0".into(),
            state: failed_state("example application error"),
        }],
        mount_results: vec![ScmMountResult {
            mount_point: "/mnt/storage".into(),
            state: ResponseState::default(),
        }],
    }
}

// =============================================================================
// Mock Stubs
// =============================================================================

/// Configurable administrative stub
#[derive(Clone, Default)]
pub(crate) struct MockCtlClient {
    pub controllers: Vec<NvmeController>,
    pub modules: Vec<ScmModule>,
    pub features: Vec<Feature>,
    pub format_items: Vec<StorageFormatResponse>,
    pub update_items: Vec<StorageUpdateResponse>,
    pub burnin_items: Vec<StorageBurnInResponse>,
    /// Every operation fails in-band with this reason
    pub fail: Option<String>,
    /// Simulated per-host latency
    pub delay: Option<Duration>,
    pub addr: String,
}

impl MockCtlClient {
    async fn latency(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn maybe_fail(&self) -> Result<()> {
        match &self.fail {
            Some(reason) => Err(Error::Rpc {
                addr: self.addr.clone(),
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }

    fn stream_of<T: Send + 'static>(items: Vec<T>) -> ResponseStream<T> {
        Box::pin(futures::stream::iter(items.into_iter().map(Ok)))
    }
}

#[async_trait]
impl MgmtCtlClient for MockCtlClient {
    async fn list_features(&self) -> Result<ResponseStream<Feature>> {
        self.latency().await;
        self.maybe_fail()?;
        Ok(Self::stream_of(self.features.clone()))
    }

    async fn storage_scan(&self, _req: &StorageScanRequest) -> Result<StorageScanResponse> {
        self.latency().await;
        self.maybe_fail()?;
        Ok(StorageScanResponse {
            controllers: self.controllers.clone(),
            modules: self.modules.clone(),
        })
    }

    async fn storage_prepare(
        &self,
        _req: &StoragePrepareRequest,
    ) -> Result<StoragePrepareResponse> {
        self.latency().await;
        self.maybe_fail()?;
        Ok(StoragePrepareResponse::default())
    }

    async fn storage_format(
        &self,
        _req: &StorageFormatRequest,
    ) -> Result<ResponseStream<StorageFormatResponse>> {
        self.latency().await;
        self.maybe_fail()?;
        Ok(Self::stream_of(self.format_items.clone()))
    }

    async fn storage_update(
        &self,
        _req: &StorageUpdateRequest,
    ) -> Result<ResponseStream<StorageUpdateResponse>> {
        self.latency().await;
        self.maybe_fail()?;
        Ok(Self::stream_of(self.update_items.clone()))
    }

    async fn storage_burnin(
        &self,
        _req: &StorageBurnInRequest,
    ) -> Result<ResponseStream<StorageBurnInResponse>> {
        self.latency().await;
        self.maybe_fail()?;
        Ok(Self::stream_of(self.burnin_items.clone()))
    }
}

/// Configurable cluster-service stub
#[derive(Clone, Default)]
pub(crate) struct MockSvcClient {
    pub fail: Option<String>,
    pub svc_replicas: Vec<u32>,
    pub addr: String,
}

impl MockSvcClient {
    fn maybe_fail(&self) -> Result<()> {
        match &self.fail {
            Some(reason) => Err(Error::Rpc {
                addr: self.addr.clone(),
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl MgmtSvcClient for MockSvcClient {
    async fn pool_create(&self, _req: &PoolCreateRequest) -> Result<PoolCreateResponse> {
        self.maybe_fail()?;
        Ok(PoolCreateResponse {
            state: ResponseState::default(),
            svc_replicas: self.svc_replicas.clone(),
        })
    }

    async fn pool_destroy(&self, _req: &PoolDestroyRequest) -> Result<PoolDestroyResponse> {
        self.maybe_fail()?;
        Ok(PoolDestroyResponse::default())
    }

    async fn kill_rank(&self, _req: &KillRankRequest) -> Result<KillRankResponse> {
        self.maybe_fail()?;
        Ok(KillRankResponse::default())
    }
}

// =============================================================================
// Mock Control
// =============================================================================

pub(crate) struct MockControl {
    address: String,
    state: ConnState,
    connect_fail: bool,
    disconnect_fail: bool,
    ctl: MgmtCtlClientRef,
    svc: MgmtSvcClientRef,
}

#[async_trait]
impl Control for MockControl {
    async fn connect(&mut self, addr: &str, _cfg: &TransportConfig) -> Result<()> {
        if self.connect_fail {
            return Err(Error::Connect {
                addr: addr.to_string(),
                source: std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "connection refused",
                ),
            });
        }
        self.address = addr.to_string();
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        if self.disconnect_fail {
            return Err(Error::Internal(format!(
                "{}: release of connection resources failed",
                self.address
            )));
        }
        self.state = ConnState::Shutdown;
        Ok(())
    }

    fn connected(&self) -> (ConnState, bool) {
        (self.state, self.state.usable())
    }

    fn address(&self) -> &str {
        &self.address
    }

    fn ctl_client(&self) -> Option<MgmtCtlClientRef> {
        Some(self.ctl.clone())
    }

    fn svc_client(&self) -> Option<MgmtSvcClientRef> {
        Some(self.svc.clone())
    }
}

// =============================================================================
// Mock Controller Factory
// =============================================================================

/// Factory producing mock controls from stub templates, with per-address
/// overrides for unreachable hosts and bespoke stub behavior.
#[derive(Clone, Default)]
pub(crate) struct MockControllerFactory {
    pub ctl: MockCtlClient,
    pub svc: MockSvcClient,
    pub ctl_overrides: BTreeMap<String, MockCtlClient>,
    pub unreachable: BTreeSet<String>,
    pub failing_disconnects: BTreeSet<String>,
}

impl MockControllerFactory {
    pub fn healthy(ctl: MockCtlClient) -> Self {
        Self {
            ctl,
            ..Default::default()
        }
    }

    pub fn with_unreachable(mut self, addr: &str) -> Self {
        self.unreachable.insert(addr.to_string());
        self
    }

    pub fn with_ctl_for(mut self, addr: &str, ctl: MockCtlClient) -> Self {
        self.ctl_overrides.insert(addr.to_string(), ctl);
        self
    }

    pub fn with_svc(mut self, svc: MockSvcClient) -> Self {
        self.svc = svc;
        self
    }

    pub fn with_failing_disconnect(mut self, addr: &str) -> Self {
        self.failing_disconnects.insert(addr.to_string());
        self
    }
}

#[async_trait]
impl ControllerFactory for MockControllerFactory {
    async fn create(
        &self,
        addr: &str,
        cfg: &TransportConfig,
    ) -> (Box<dyn Control>, Option<Error>) {
        let mut ctl = self
            .ctl_overrides
            .get(addr)
            .cloned()
            .unwrap_or_else(|| self.ctl.clone());
        ctl.addr = addr.to_string();

        let mut svc = self.svc.clone();
        svc.addr = addr.to_string();

        let connect_fail = self.unreachable.contains(addr);
        let mut control = MockControl {
            address: addr.to_string(),
            state: if connect_fail {
                ConnState::TransientFailure
            } else {
                ConnState::Ready
            },
            connect_fail,
            disconnect_fail: self.failing_disconnects.contains(addr),
            ctl: Arc::new(ctl),
            svc: Arc::new(svc),
        };

        let err = control.connect(addr, cfg).await.err();
        (Box::new(control), err)
    }
}
