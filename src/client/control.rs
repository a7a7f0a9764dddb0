//! Single-connection abstraction over one storage server's management endpoint
//!
//! A [`Control`] owns the connection-state bookkeeping for one host and hands
//! out the two RPC stubs; no business logic lives here. The
//! [`ControllerFactory`] is the construction seam the fleet layer (and tests)
//! inject controls through.

use crate::client::stubs::{MgmtCtlClientRef, MgmtSvcClientRef, RpcCtlClient, RpcSvcClient};
use crate::client::transport::RpcChannel;
use crate::config::TransportConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

// =============================================================================
// Connection State
// =============================================================================

/// Connectivity state of one management-endpoint connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    Idle,
    Connecting,
    Ready,
    TransientFailure,
    Shutdown,
}

impl ConnState {
    /// Only a ready connection is usable for RPCs.
    pub fn usable(&self) -> bool {
        matches!(self, ConnState::Ready)
    }
}

impl std::fmt::Display for ConnState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnState::Idle => write!(f, "idle"),
            ConnState::Connecting => write!(f, "connecting"),
            ConnState::Ready => write!(f, "ready"),
            ConnState::TransientFailure => write!(f, "transient-failure"),
            ConnState::Shutdown => write!(f, "shutdown"),
        }
    }
}

// =============================================================================
// Control
// =============================================================================

/// One live connection to a remote storage server's management endpoint
#[async_trait]
pub trait Control: Send + Sync {
    /// Establish or re-establish the connection. The stored address is
    /// updated only on success.
    async fn connect(&mut self, addr: &str, cfg: &TransportConfig) -> Result<()>;

    /// Release the underlying connection. Safe to call multiple times.
    async fn disconnect(&mut self) -> Result<()>;

    /// The raw connectivity state and the derived "usable" flag.
    fn connected(&self) -> (ConnState, bool);

    fn address(&self) -> &str;

    /// Administrative stub; `None` until a connection has been established.
    fn ctl_client(&self) -> Option<MgmtCtlClientRef>;

    /// Cluster-service stub; `None` until a connection has been established.
    fn svc_client(&self) -> Option<MgmtSvcClientRef>;
}

/// Production [`Control`] over the crate's RPC channel
pub struct RpcControl {
    address: String,
    state: ConnState,
    ctl: Option<MgmtCtlClientRef>,
    svc: Option<MgmtSvcClientRef>,
}

impl RpcControl {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            address: addr.into(),
            state: ConnState::Idle,
            ctl: None,
            svc: None,
        }
    }
}

#[async_trait]
impl Control for RpcControl {
    async fn connect(&mut self, addr: &str, cfg: &TransportConfig) -> Result<()> {
        self.state = ConnState::Connecting;

        match RpcChannel::connect(addr, cfg).await {
            Ok(channel) => {
                self.ctl = Some(Arc::new(RpcCtlClient::new(channel.clone())));
                self.svc = Some(Arc::new(RpcSvcClient::new(channel)));
                self.address = addr.to_string();
                self.state = ConnState::Ready;
                debug!(addr, "control connected");
                Ok(())
            }
            Err(e) => {
                self.state = ConnState::TransientFailure;
                Err(e)
            }
        }
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.ctl = None;
        self.svc = None;
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
        self.ctl.clone()
    }

    fn svc_client(&self) -> Option<MgmtSvcClientRef> {
        self.svc.clone()
    }
}

// =============================================================================
// Controller Factory
// =============================================================================

/// Construction seam for [`Control`] instances.
///
/// `create` returns the constructed control even when the connection attempt
/// failed, paired with the connection error, so the fleet layer records a
/// per-host failure instead of losing the host entirely.
#[async_trait]
pub trait ControllerFactory: Send + Sync {
    async fn create(
        &self,
        addr: &str,
        cfg: &TransportConfig,
    ) -> (Box<dyn Control>, Option<Error>);
}

/// Factory producing [`RpcControl`] instances
#[derive(Debug, Default)]
pub struct RpcControllerFactory;

#[async_trait]
impl ControllerFactory for RpcControllerFactory {
    async fn create(
        &self,
        addr: &str,
        cfg: &TransportConfig,
    ) -> (Box<dyn Control>, Option<Error>) {
        let mut control = RpcControl::new(addr);
        let err = control.connect(addr, cfg).await.err();
        (Box::new(control), err)
    }
}
