//! sfctl - Storage Fleet Control CLI
//!
//! Issues management operations across a fleet of storage servers and prints
//! one result per host.

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use storage_fleet_control::client::{Connect, HostResults};
use storage_fleet_control::client::proto::{
    PoolCreateRequest, PoolDestroyRequest, PrepareNvmeRequest, PrepareScmRequest,
    StorageBurnInRequest, StoragePrepareRequest, StorageUpdateRequest, UpdateNvmeRequest,
};
use storage_fleet_control::{ClientConfig, Error, Result, TransportConfig};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Storage Fleet Control - management client for storage server fleets
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Comma-separated list of host addresses (host:port)
    #[arg(short = 'l', long, env = "SFCTL_HOSTS", value_delimiter = ',')]
    hosts: Vec<String>,

    /// Client configuration file (YAML)
    #[arg(short, long, env = "SFCTL_CONFIG")]
    config: Option<std::path::PathBuf>,

    /// Allow unencrypted connections
    #[arg(short, long, env = "SFCTL_INSECURE")]
    insecure: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan locally-attached NVMe and SCM devices on each host
    Scan,

    /// Prepare NVMe and SCM devices on each host
    Prepare {
        /// Prepare NVMe devices only
        #[arg(long, conflicts_with = "scm_only")]
        nvme_only: bool,

        /// Prepare SCM modules only
        #[arg(long)]
        scm_only: bool,

        /// Reset devices instead of setting them up
        #[arg(long)]
        reset: bool,

        /// Number of hugepages to allocate for NVMe setup
        #[arg(long, default_value = "1024")]
        hugepages: i32,
    },

    /// Format storage on each host
    Format {
        /// Reformat hosts that already carry formatted storage
        #[arg(long)]
        reformat: bool,
    },

    /// Update NVMe controller firmware on each host
    Update {
        /// Only update controllers with this model name
        #[arg(long)]
        model: String,

        /// Only update controllers running this firmware revision
        #[arg(long)]
        start_rev: String,

        /// Firmware image path, accessible on every host
        #[arg(long)]
        path: String,

        /// Firmware slot
        #[arg(long, default_value = "0")]
        slot: i32,
    },

    /// Run burn-in validation on each host
    Burnin {
        /// Workload configuration path, accessible on every host
        #[arg(long)]
        config_path: String,
    },

    /// List the capabilities advertised by each host
    Features,

    /// Terminate the server process serving a rank in a pool
    KillRank {
        /// Pool UUID
        #[arg(long)]
        pool: String,

        /// Rank to terminate
        #[arg(long)]
        rank: u32,
    },

    /// Create a storage pool
    PoolCreate {
        /// Pool UUID
        #[arg(long)]
        pool: String,

        /// SCM capacity in bytes
        #[arg(long)]
        scm_bytes: u64,

        /// NVMe capacity in bytes
        #[arg(long, default_value = "0")]
        nvme_bytes: u64,

        /// Number of pool service replicas
        #[arg(long, default_value = "1")]
        svc_replicas: u32,
    },

    /// Destroy a storage pool
    PoolDestroy {
        /// Pool UUID
        #[arg(long)]
        pool: String,

        /// Destroy even while the pool is in use
        #[arg(long)]
        force: bool,
    },
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args);

    let (hosts, transport) = resolve_config(&args)?;
    if hosts.is_empty() {
        return Err(Error::Configuration(
            "no hosts given; use --hosts or a configuration file".into(),
        ));
    }

    let mut conn = Connect::rpc(transport);
    let connect_results = conn.connect_hosts(&hosts).await;
    info!(
        active = conn.active_hosts().len(),
        total = conn.len(),
        "fleet connected"
    );

    match &args.command {
        Command::Scan => print_results(&conn.storage_scan().await)?,
        Command::Prepare {
            nvme_only,
            scm_only,
            reset,
            hugepages,
        } => {
            let req = StoragePrepareRequest {
                nvme: (!scm_only).then(|| PrepareNvmeRequest {
                    hugepage_count: *hugepages,
                    reset: *reset,
                    ..Default::default()
                }),
                scm: (!nvme_only).then(|| PrepareScmRequest { reset: *reset }),
            };
            print_results(&conn.storage_prepare(&req).await)?;
        }
        Command::Format { reformat } => {
            print_results(&conn.storage_format(*reformat).await)?
        }
        Command::Update {
            model,
            start_rev,
            path,
            slot,
        } => {
            let req = StorageUpdateRequest {
                nvme: Some(UpdateNvmeRequest {
                    model: model.clone(),
                    start_rev: start_rev.clone(),
                    path: path.clone(),
                    slot: *slot,
                }),
            };
            print_results(&conn.storage_update(&req).await)?;
        }
        Command::Burnin { config_path } => {
            let req = StorageBurnInRequest {
                config_path: config_path.clone(),
            };
            print_results(&conn.storage_burnin(&req).await)?;
        }
        Command::Features => print_results(&conn.list_features().await)?,
        Command::KillRank { pool, rank } => {
            print_results(&conn.kill_rank(pool, *rank).await)?
        }
        Command::PoolCreate {
            pool,
            scm_bytes,
            nvme_bytes,
            svc_replicas,
        } => {
            let req = PoolCreateRequest {
                uuid: pool.clone(),
                scm_bytes: *scm_bytes,
                nvme_bytes: *nvme_bytes,
                num_svc_replicas: *svc_replicas,
                ..Default::default()
            };
            print_results(&conn.pool_create(&req).await)?;
        }
        Command::PoolDestroy { pool, force } => {
            let req = PoolDestroyRequest {
                uuid: pool.clone(),
                force: *force,
            };
            print_results(&conn.pool_destroy(&req).await)?;
        }
    }

    conn.clear().await?;

    // Unreachable hosts already appear in the per-host output; the exit code
    // reflects them as well.
    if connect_results.values().any(|r| r.is_err()) {
        std::process::exit(1);
    }
    Ok(())
}

// =============================================================================
// Configuration
// =============================================================================

fn resolve_config(args: &Args) -> Result<(Vec<String>, TransportConfig)> {
    let mut cfg = match &args.config {
        Some(path) => ClientConfig::from_yaml_file(path)?,
        None => ClientConfig::default(),
    };

    // Command-line hosts override the configuration file.
    if !args.hosts.is_empty() {
        cfg.hosts = args.hosts.clone();
    }
    if args.insecure {
        cfg.transport.allow_insecure = true;
    }

    cfg.transport.validate()?;
    Ok((cfg.hosts, cfg.transport))
}

// =============================================================================
// Output
// =============================================================================

#[derive(Serialize)]
#[serde(untagged)]
enum HostOutcome<'a, T> {
    Ok(&'a T),
    Err { error: String },
}

/// Render a per-host result map as pretty JSON keyed by address.
fn print_results<T: Serialize>(results: &HostResults<T>) -> Result<()> {
    let rendered: std::collections::BTreeMap<&str, HostOutcome<'_, T>> = results
        .iter()
        .map(|(addr, outcome)| {
            let value = match outcome {
                Ok(body) => HostOutcome::Ok(body),
                Err(e) => HostOutcome::Err {
                    error: e.to_string(),
                },
            };
            (addr.as_str(), value)
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&rendered)?);
    Ok(())
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false))
            .init();
    }
}
