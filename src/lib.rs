//! Storage Fleet Control - Management Plane for Distributed Storage Servers
//!
//! A fleet management client and per-server identity layer for clusters of
//! storage servers. The client fans administrative and cluster-service
//! operations out over every registered host and reports results per host;
//! the server side owns each node's on-disk superblock identity.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Fleet Client                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌───────────────────────────────────────────────────────┐  │
//! │  │           Connect (fleet registry, fan-out)           │  │
//! │  └───────┬───────────────────┬───────────────────┬───────┘  │
//! │          │                   │                   │          │
//! │  ┌───────┴───────┐   ┌───────┴───────┐   ┌───────┴───────┐  │
//! │  │ Control host1 │   │ Control host2 │   │ Control hostN │  │
//! │  │  ctl + svc    │   │  ctl + svc    │   │  ctl + svc    │  │
//! │  └───────┬───────┘   └───────┬───────┘   └───────┬───────┘  │
//! ├──────────┼───────────────────┼───────────────────┼──────────┤
//! │          │   newline-delimited JSON over TCP     │          │
//! └──────────┼───────────────────┼───────────────────┼──────────┘
//!            │                   │                   │
//! ┌──────────┴────────┐ ┌────────┴──────────┐ ┌──────┴──────────┐
//! │  Storage Server   │ │  Storage Server   │ │  Storage Server │
//! │ ┌───────────────┐ │ │ ┌───────────────┐ │ │ ┌─────────────┐ │
//! │ │ ServerInstance│ │ │ │ ServerInstance│ │ │ │ServerInstance│ │
//! │ │  superblock   │ │ │ │  superblock   │ │ │ │ superblock  │ │
//! │ └───────────────┘ │ │ └───────────────┘ │ │ └─────────────┘ │
//! └───────────────────┘ └───────────────────┘ └─────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`client`]: Fleet registry, per-host controls, RPC stubs and transport
//! - [`server`]: Per-node identity (superblock, server instance, SCM storage)
//! - [`config`]: Client and server configuration
//! - [`error`]: Error types and handling

pub mod client;
pub mod config;
pub mod error;
pub mod server;

// Re-export commonly used types
pub use client::{
    ConnState, Connect, Control, ControllerFactory, HostResults,
    MgmtCtlClient, MgmtSvcClient, RpcControllerFactory,
};

pub use config::{ClientConfig, ServerConfig, TransportConfig};

pub use error::{Error, Result};

pub use server::{
    DirScmStorage, MsInfo, Rank, ScmStorage, ServerInstance, Superblock,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
