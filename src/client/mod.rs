//! Fleet management client
//!
//! Layering, bottom up: `transport` frames requests and responses on the
//! wire, `stubs` expose the two per-host services as capability traits,
//! `control` tracks one host's connection, and `connect` fans operations out
//! across the registered fleet.

pub mod connect;
pub mod control;
pub mod proto;
pub mod stubs;
pub mod transport;

#[cfg(test)]
pub(crate) mod mock;

pub use connect::{
    BurnInResults, Connect, ConnectResults, FeatureResults, FormatResults, HostResults,
    KillRankResults, PoolCreateResults, PoolDestroyResults, PrepareResults, ScanResults,
    UpdateResults,
};
pub use control::{ConnState, Control, ControllerFactory, RpcControl, RpcControllerFactory};
pub use stubs::{MgmtCtlClient, MgmtCtlClientRef, MgmtSvcClient, MgmtSvcClientRef};
pub use transport::{ResponseStream, RpcChannel};
