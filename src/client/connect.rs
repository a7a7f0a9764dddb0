//! Fleet registry and fan-out of management operations
//!
//! [`Connect`] owns one [`Control`] per registered host and issues each
//! operation to every registered host concurrently. Results come back as a
//! per-host map keyed by address; a host that is unreachable or mid-failure
//! contributes an error entry instead of being dropped, so the caller always
//! sees exactly one entry per registered host.

use crate::client::control::{Control, ControllerFactory, RpcControllerFactory};
use crate::client::proto::*;
use crate::client::stubs::{MgmtCtlClientRef, MgmtSvcClientRef};
use crate::config::TransportConfig;
use crate::error::{Error, Result};
use futures::future::join_all;
use futures::StreamExt;
use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use tracing::{debug, info, warn};

// =============================================================================
// Result Maps
// =============================================================================

/// Per-host outcome of a fleet operation, keyed by host address
pub type HostResults<T> = BTreeMap<String, Result<T>>;

pub type ConnectResults = HostResults<()>;
pub type FeatureResults = HostResults<Vec<Feature>>;
pub type ScanResults = HostResults<StorageScanResponse>;
pub type PrepareResults = HostResults<StoragePrepareResponse>;
pub type FormatResults = HostResults<StorageFormatResponse>;
pub type UpdateResults = HostResults<StorageUpdateResponse>;
pub type BurnInResults = HostResults<StorageBurnInResponse>;
pub type PoolCreateResults = HostResults<PoolCreateResponse>;
pub type PoolDestroyResults = HostResults<PoolDestroyResponse>;
pub type KillRankResults = HostResults<KillRankResponse>;

// =============================================================================
// Connect
// =============================================================================

/// Fleet of management connections, one [`Control`] per host
pub struct Connect {
    factory: Box<dyn ControllerFactory>,
    transport: TransportConfig,
    controls: BTreeMap<String, Box<dyn Control>>,
}

impl Connect {
    pub fn new(factory: Box<dyn ControllerFactory>, transport: TransportConfig) -> Self {
        Self {
            factory,
            transport,
            controls: BTreeMap::new(),
        }
    }

    /// Fleet over the crate's RPC transport.
    pub fn rpc(transport: TransportConfig) -> Self {
        Self::new(Box::new(RpcControllerFactory), transport)
    }

    /// Replace the registered fleet with `hosts` and connect to each.
    ///
    /// Controls from a previous registration are disconnected and dropped
    /// first. Duplicate addresses collapse to one entry. A host whose
    /// connection attempt fails is still registered, with its error recorded
    /// in the returned map; a later [`Connect::connect_hosts`] call may reach
    /// it.
    pub async fn connect_hosts(&mut self, hosts: &[String]) -> ConnectResults {
        if let Err(e) = self.clear().await {
            warn!(error = %e, "disconnect of previous fleet failed");
        }

        let unique: BTreeSet<&String> = hosts.iter().collect();
        info!(hosts = unique.len(), "connecting fleet");

        let factory = &self.factory;
        let transport = &self.transport;
        let created = join_all(unique.into_iter().map(|addr| {
            let addr = addr.clone();
            async move {
                let (control, err) = factory.create(&addr, transport).await;
                (addr, control, err)
            }
        }))
        .await;

        let mut results = ConnectResults::new();
        for (addr, control, err) in created {
            match err {
                None => {
                    debug!(addr = %addr, "host connected");
                    results.insert(addr.clone(), Ok(()));
                }
                Some(e) => {
                    warn!(addr = %addr, error = %e, "host connection failed");
                    results.insert(addr.clone(), Err(e));
                }
            }
            self.controls.insert(addr, control);
        }
        results
    }

    /// Disconnect and drop every registered control.
    ///
    /// Best-effort: every control gets a disconnect attempt and the registry
    /// is always emptied, even when some disconnects fail. The first
    /// disconnect error is returned after the registry is empty.
    pub async fn clear(&mut self) -> Result<()> {
        let mut first_err = None;
        for (addr, control) in self.controls.iter_mut() {
            if let Err(e) = control.disconnect().await {
                warn!(addr = %addr, error = %e, "disconnect failed");
                if first_err.is_none() {
                    first_err = Some(e);
                }
            }
        }
        self.controls.clear();

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Addresses of every registered host, reachable or not.
    pub fn hosts(&self) -> Vec<String> {
        self.controls.keys().cloned().collect()
    }

    /// Addresses of hosts with a usable connection.
    pub fn active_hosts(&self) -> Vec<String> {
        self.controls
            .iter()
            .filter(|(_, control)| control.connected().1)
            .map(|(addr, _)| addr.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.controls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controls.is_empty()
    }

    // =========================================================================
    // Fan-Out Core
    // =========================================================================

    /// Run one operation against every registered host concurrently.
    ///
    /// `build` prepares the per-host future from a usable control; hosts
    /// whose connection is not usable contribute a `ConnectionUnavailable`
    /// entry without being dialed. One slow or failing host never affects
    /// another host's entry.
    async fn fan_out<T, F, Fut>(&self, build: F) -> HostResults<T>
    where
        T: Send,
        F: Fn(&dyn Control) -> Result<Fut>,
        Fut: Future<Output = Result<T>> + Send,
    {
        let tasks = self.controls.iter().map(|(addr, control)| {
            let addr = addr.clone();
            let (state, usable) = control.connected();
            let prepared = if usable {
                build(control.as_ref())
            } else {
                Err(Error::ConnectionUnavailable {
                    addr: addr.clone(),
                    state: state.to_string(),
                })
            };
            async move {
                let outcome = match prepared {
                    Ok(fut) => fut.await,
                    Err(e) => Err(e),
                };
                (addr, outcome)
            }
        });

        join_all(tasks).await.into_iter().collect()
    }

    fn ctl_of(control: &dyn Control) -> Result<MgmtCtlClientRef> {
        control.ctl_client().ok_or_else(|| {
            Error::Internal(format!(
                "{}: usable connection without administrative stub",
                control.address()
            ))
        })
    }

    fn svc_of(control: &dyn Control) -> Result<MgmtSvcClientRef> {
        control.svc_client().ok_or_else(|| {
            Error::Internal(format!(
                "{}: usable connection without cluster-service stub",
                control.address()
            ))
        })
    }

    // =========================================================================
    // Administrative Operations
    // =========================================================================

    /// List the capabilities advertised by each host.
    pub async fn list_features(&self) -> FeatureResults {
        info!("fan-out: list features");
        self.fan_out(|control| {
            let client = Self::ctl_of(control)?;
            Ok(async move {
                let mut stream = client.list_features().await?;
                let mut features = Vec::new();
                while let Some(item) = stream.next().await {
                    features.push(item?);
                }
                Ok(features)
            })
        })
        .await
    }

    /// Scan each host's locally-attached NVMe and SCM devices.
    pub async fn storage_scan(&self) -> ScanResults {
        info!("fan-out: storage scan");
        self.fan_out(|control| {
            let client = Self::ctl_of(control)?;
            Ok(async move { client.storage_scan(&StorageScanRequest::default()).await })
        })
        .await
    }

    /// Prepare NVMe and/or SCM devices on each host.
    pub async fn storage_prepare(&self, req: &StoragePrepareRequest) -> PrepareResults {
        info!("fan-out: storage prepare");
        self.fan_out(|control| {
            let client = Self::ctl_of(control)?;
            let req = req.clone();
            Ok(async move { client.storage_prepare(&req).await })
        })
        .await
    }

    /// Format storage on each host, draining the per-device result stream
    /// into one merged response per host.
    pub async fn storage_format(&self, reformat: bool) -> FormatResults {
        info!(reformat, "fan-out: storage format");
        let req = StorageFormatRequest { reformat };
        self.fan_out(|control| {
            let client = Self::ctl_of(control)?;
            let req = req.clone();
            Ok(async move {
                let mut stream = client.storage_format(&req).await?;
                let mut merged = StorageFormatResponse::default();
                while let Some(item) = stream.next().await {
                    let resp = item?;
                    merged.controller_results.extend(resp.controller_results);
                    merged.mount_results.extend(resp.mount_results);
                }
                Ok(merged)
            })
        })
        .await
    }

    /// Update device firmware on each host, draining the per-device result
    /// stream into one merged response per host.
    pub async fn storage_update(&self, req: &StorageUpdateRequest) -> UpdateResults {
        info!("fan-out: storage update");
        self.fan_out(|control| {
            let client = Self::ctl_of(control)?;
            let req = req.clone();
            Ok(async move {
                let mut stream = client.storage_update(&req).await?;
                let mut merged = StorageUpdateResponse::default();
                while let Some(item) = stream.next().await {
                    let resp = item?;
                    merged.controller_results.extend(resp.controller_results);
                    merged.module_results.extend(resp.module_results);
                }
                Ok(merged)
            })
        })
        .await
    }

    /// Run burn-in validation on each host, draining the result stream into
    /// one merged response per host.
    pub async fn storage_burnin(&self, req: &StorageBurnInRequest) -> BurnInResults {
        info!("fan-out: storage burn-in");
        self.fan_out(|control| {
            let client = Self::ctl_of(control)?;
            let req = req.clone();
            Ok(async move {
                let mut stream = client.storage_burnin(&req).await?;
                let mut merged = StorageBurnInResponse::default();
                while let Some(item) = stream.next().await {
                    let resp = item?;
                    merged.controller_results.extend(resp.controller_results);
                    merged.mount_results.extend(resp.mount_results);
                }
                Ok(merged)
            })
        })
        .await
    }

    // =========================================================================
    // Cluster Service Operations
    // =========================================================================

    pub async fn pool_create(&self, req: &PoolCreateRequest) -> PoolCreateResults {
        info!(uuid = %req.uuid, "fan-out: pool create");
        self.fan_out(|control| {
            let client = Self::svc_of(control)?;
            let req = req.clone();
            Ok(async move { client.pool_create(&req).await })
        })
        .await
    }

    pub async fn pool_destroy(&self, req: &PoolDestroyRequest) -> PoolDestroyResults {
        info!(uuid = %req.uuid, "fan-out: pool destroy");
        self.fan_out(|control| {
            let client = Self::svc_of(control)?;
            let req = req.clone();
            Ok(async move { client.pool_destroy(&req).await })
        })
        .await
    }

    /// Terminate the server process serving `rank` in the given pool.
    pub async fn kill_rank(&self, pool_uuid: &str, rank: u32) -> KillRankResults {
        info!(pool_uuid, rank, "fan-out: kill rank");
        let req = KillRankRequest {
            pool_uuid: pool_uuid.to_string(),
            rank,
        };
        self.fan_out(|control| {
            let client = Self::svc_of(control)?;
            let req = req.clone();
            Ok(async move { client.kill_rank(&req).await })
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::{
        mock_controller, mock_feature, mock_format_response, MockControllerFactory,
        MockCtlClient, MockSvcClient,
    };
    use assert_matches::assert_matches;
    use std::time::{Duration, Instant};

    fn addrs(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    async fn fleet(factory: MockControllerFactory, hosts: &[&str]) -> (Connect, ConnectResults) {
        let mut conn = Connect::new(Box::new(factory), TransportConfig::insecure());
        let results = conn.connect_hosts(&addrs(hosts)).await;
        (conn, results)
    }

    #[tokio::test]
    async fn test_connect_hosts_records_per_host_outcome() {
        let factory = MockControllerFactory::default().with_unreachable("10.0.0.2:10001");
        let (conn, results) =
            fleet(factory, &["10.0.0.1:10001", "10.0.0.2:10001", "10.0.0.3:10001"]).await;

        assert_eq!(results.len(), 3);
        assert!(results["10.0.0.1:10001"].is_ok());
        assert_matches!(results["10.0.0.2:10001"], Err(Error::Connect { .. }));
        assert!(results["10.0.0.3:10001"].is_ok());

        // The failed host stays registered but is not active.
        assert_eq!(conn.len(), 3);
        assert_eq!(
            conn.active_hosts(),
            addrs(&["10.0.0.1:10001", "10.0.0.3:10001"])
        );
    }

    #[tokio::test]
    async fn test_connect_hosts_dedupes() {
        let (conn, results) = fleet(
            MockControllerFactory::default(),
            &["10.0.0.1:10001", "10.0.0.1:10001", "10.0.0.2:10001"],
        )
        .await;

        assert_eq!(results.len(), 2);
        assert_eq!(conn.len(), 2);
    }

    #[tokio::test]
    async fn test_connect_hosts_replaces_previous_fleet() {
        let mut conn = Connect::new(
            Box::new(MockControllerFactory::default()),
            TransportConfig::insecure(),
        );

        conn.connect_hosts(&addrs(&["10.0.0.1:10001", "10.0.0.2:10001"]))
            .await;
        conn.connect_hosts(&addrs(&["10.0.0.2:10001", "10.0.0.3:10001"]))
            .await;

        assert_eq!(conn.hosts(), addrs(&["10.0.0.2:10001", "10.0.0.3:10001"]));
    }

    #[tokio::test]
    async fn test_clear_empties_fleet() {
        let (mut conn, _) =
            fleet(MockControllerFactory::default(), &["10.0.0.1:10001"]).await;
        conn.clear().await.unwrap();
        assert!(conn.is_empty());
        assert!(conn.active_hosts().is_empty());
    }

    #[tokio::test]
    async fn test_clear_empties_fleet_despite_disconnect_failure() {
        let factory =
            MockControllerFactory::default().with_failing_disconnect("10.0.0.1:10001");
        let (mut conn, _) = fleet(factory, &["10.0.0.1:10001", "10.0.0.2:10001"]).await;

        // The failure is reported, but the registry still ends up empty.
        let err = conn.clear().await.unwrap_err();
        assert_matches!(err, Error::Internal(_));
        assert!(conn.is_empty());
    }

    #[tokio::test]
    async fn test_reconnect_drops_stale_host_despite_disconnect_failure() {
        // A control whose disconnect errors must not survive a fleet rebuild.
        let factory =
            MockControllerFactory::default().with_failing_disconnect("stale:10001");
        let mut conn = Connect::new(Box::new(factory), TransportConfig::insecure());

        conn.connect_hosts(&addrs(&["stale:10001"])).await;
        let results = conn.connect_hosts(&addrs(&["fresh:10001"])).await;

        assert_eq!(results.len(), 1);
        assert_eq!(conn.hosts(), addrs(&["fresh:10001"]));
    }

    #[tokio::test]
    async fn test_scan_one_entry_per_host_with_unreachable() {
        // Two usable hosts and one unreachable: the scan map still carries
        // all three addresses, the unreachable one as an error entry.
        let ctl = MockCtlClient {
            controllers: vec![mock_controller("E2010413")],
            ..Default::default()
        };
        let factory = MockControllerFactory::healthy(ctl).with_unreachable("10.0.0.2:10001");
        let (conn, _) =
            fleet(factory, &["10.0.0.1:10001", "10.0.0.2:10001", "10.0.0.3:10001"]).await;

        let results = conn.storage_scan().await;
        assert_eq!(results.len(), 3);

        let resp = results["10.0.0.1:10001"].as_ref().unwrap();
        assert_eq!(resp.controllers.len(), 1);
        assert_eq!(resp.controllers[0].serial, "E2010413");

        assert_matches!(
            results["10.0.0.2:10001"],
            Err(Error::ConnectionUnavailable { .. })
        );
    }

    #[tokio::test]
    async fn test_scan_two_hosts_one_unreachable() {
        let ctl = MockCtlClient {
            controllers: vec![mock_controller("S1")],
            ..Default::default()
        };
        let factory = MockControllerFactory::healthy(ctl).with_unreachable("10.0.0.2:10001");
        let (conn, _) = fleet(factory, &["10.0.0.1:10001", "10.0.0.2:10001"]).await;

        let results = conn.storage_scan().await;
        assert_eq!(results.len(), 2);
        assert!(results["10.0.0.1:10001"].is_ok());
        assert!(results["10.0.0.2:10001"].is_err());
    }

    #[tokio::test]
    async fn test_rpc_failure_isolated_to_its_host() {
        // One host fails its RPC in-band; its neighbor's result is untouched.
        let good = MockCtlClient {
            controllers: vec![mock_controller("OK-1")],
            ..Default::default()
        };
        let bad = MockCtlClient {
            fail: Some("spdk binding failure".into()),
            ..Default::default()
        };
        let factory =
            MockControllerFactory::healthy(good).with_ctl_for("10.0.0.2:10001", bad);
        let (conn, _) = fleet(factory, &["10.0.0.1:10001", "10.0.0.2:10001"]).await;

        let results = conn.storage_scan().await;
        assert!(results["10.0.0.1:10001"].is_ok());
        assert_matches!(&results["10.0.0.2:10001"], Err(Error::Rpc { reason, .. }) => {
            assert_eq!(reason, "spdk binding failure");
        });
    }

    #[tokio::test]
    async fn test_hosts_run_concurrently() {
        // Four hosts each sleeping 50ms; a serial fan-out would take 200ms.
        let ctl = MockCtlClient {
            delay: Some(Duration::from_millis(50)),
            ..Default::default()
        };
        let factory = MockControllerFactory::healthy(ctl);
        let (conn, _) = fleet(
            factory,
            &["h1:10001", "h2:10001", "h3:10001", "h4:10001"],
        )
        .await;

        let start = Instant::now();
        let results = conn.storage_scan().await;
        assert_eq!(results.len(), 4);
        assert!(results.values().all(|r| r.is_ok()));
        assert!(start.elapsed() < Duration::from_millis(150));
    }

    #[tokio::test]
    async fn test_list_features_drains_stream() {
        let ctl = MockCtlClient {
            features: vec![mock_feature(), mock_feature()],
            ..Default::default()
        };
        let (conn, _) = fleet(MockControllerFactory::healthy(ctl), &["10.0.0.1:10001"]).await;

        let results = conn.list_features().await;
        let features = results["10.0.0.1:10001"].as_ref().unwrap();
        assert_eq!(features.len(), 2);
        assert_eq!(features[0].category, "nvme");
    }

    #[tokio::test]
    async fn test_format_merges_streamed_results() {
        // Two streamed messages merge into one response per host.
        let ctl = MockCtlClient {
            format_items: vec![mock_format_response(), mock_format_response()],
            ..Default::default()
        };
        let (conn, _) = fleet(MockControllerFactory::healthy(ctl), &["10.0.0.1:10001"]).await;

        let results = conn.storage_format(false).await;
        let resp = results["10.0.0.1:10001"].as_ref().unwrap();
        assert_eq!(resp.controller_results.len(), 2);
        assert_eq!(resp.mount_results.len(), 2);
        assert!(!resp.controller_results[0].state.is_success());
        assert!(resp.mount_results[0].state.is_success());
    }

    #[tokio::test]
    async fn test_prepare_fans_out() {
        let (conn, _) = fleet(
            MockControllerFactory::default(),
            &["10.0.0.1:10001", "10.0.0.2:10001"],
        )
        .await;

        let req = StoragePrepareRequest {
            nvme: Some(PrepareNvmeRequest::default()),
            scm: None,
        };
        let results = conn.storage_prepare(&req).await;
        assert_eq!(results.len(), 2);
        assert!(results.values().all(|r| r.is_ok()));
    }

    #[tokio::test]
    async fn test_kill_rank() {
        let (conn, _) = fleet(MockControllerFactory::default(), &["10.0.0.1:10001"]).await;

        let results = conn
            .kill_rank("31416542-3c3d-4590-bf9d-1db6d013f29d", 2)
            .await;
        let resp = results["10.0.0.1:10001"].as_ref().unwrap();
        assert!(resp.state.is_success());
    }

    #[tokio::test]
    async fn test_kill_rank_reports_service_error() {
        let factory = MockControllerFactory::default().with_svc(MockSvcClient {
            fail: Some("rank not found".into()),
            ..Default::default()
        });
        let (conn, _) = fleet(factory, &["10.0.0.1:10001"]).await;

        let results = conn.kill_rank("31416542-3c3d-4590-bf9d-1db6d013f29d", 9).await;
        assert_matches!(&results["10.0.0.1:10001"], Err(Error::Rpc { reason, .. }) => {
            assert_eq!(reason, "rank not found");
        });
    }

    #[tokio::test]
    async fn test_pool_create_reports_replicas() {
        let factory = MockControllerFactory::default().with_svc(MockSvcClient {
            svc_replicas: vec![0, 1, 2],
            ..Default::default()
        });
        let (conn, _) = fleet(factory, &["10.0.0.1:10001"]).await;

        let req = PoolCreateRequest {
            uuid: "31416542-3c3d-4590-bf9d-1db6d013f29d".into(),
            scm_bytes: 256 * 1024 * 1024,
            num_svc_replicas: 3,
            ..Default::default()
        };
        let results = conn.pool_create(&req).await;
        let resp = results["10.0.0.1:10001"].as_ref().unwrap();
        assert_eq!(resp.svc_replicas, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_ops_on_empty_fleet_return_empty_map() {
        let conn = Connect::new(
            Box::new(MockControllerFactory::default()),
            TransportConfig::insecure(),
        );
        assert!(conn.storage_scan().await.is_empty());
        assert!(conn.list_features().await.is_empty());
    }
}
