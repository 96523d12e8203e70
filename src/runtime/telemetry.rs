use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio::{select, time};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Default interval used by the metrics reporter task.
pub const DEFAULT_METRICS_INTERVAL: Duration = Duration::from_secs(30);

static TRACING_INIT: OnceLock<()> = OnceLock::new();

/// Installs a basic tracing subscriber (if one is not already active).
///
/// The subscriber honours `RUST_LOG` if it is present, otherwise it falls back to `info`.
/// Calling this function multiple times is harmless.
pub fn init_tracing() {
    if TRACING_INIT.get().is_some() {
        return;
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .try_init();

    let _ = TRACING_INIT.set(());
}

/// Pipeline stage identifiers used for per-stage commit counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Descriptors,
    ParsedStates,
    HydratedViews,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Descriptors => "descriptors",
            Stage::ParsedStates => "parsed_states",
            Stage::HydratedViews => "hydrated_views",
        }
    }
}

/// Lightweight rolling counters used to derive runtime metrics.
#[derive(Default, Debug)]
pub struct Telemetry {
    catalog_refreshes: AtomicU64,
    catalog_failures: AtomicU64,
    parse_runs: AtomicU64,
    parse_item_drops: AtomicU64,
    parse_failures: AtomicU64,
    hydrate_runs: AtomicU64,
    hydrate_item_drops: AtomicU64,
    stale_discards: AtomicU64,
    descriptor_commits: AtomicU64,
    parse_commits: AtomicU64,
    hydrate_commits: AtomicU64,
    rpc_errors: AtomicU64,
    rpc_timeouts: AtomicU64,
    last_hydrated_count: AtomicU64,
}

impl Telemetry {
    pub fn record_catalog_refresh(&self) {
        self.catalog_refreshes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_catalog_failure(&self) {
        self.catalog_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_parse_run(&self) {
        self.parse_runs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_parse_item_drop(&self) {
        self.parse_item_drops.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_parse_failure(&self) {
        self.parse_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_hydrate_run(&self) {
        self.hydrate_runs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_hydrate_item_drop(&self) {
        self.hydrate_item_drops.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stale_discard(&self) {
        self.stale_discards.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stage_commit(&self, stage: Stage) {
        let counter = match stage {
            Stage::Descriptors => &self.descriptor_commits,
            Stage::ParsedStates => &self.parse_commits,
            Stage::HydratedViews => &self.hydrate_commits,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rpc_error(&self) {
        self.rpc_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rpc_timeout(&self) {
        self.rpc_timeouts.fetch_add(1, Ordering::Relaxed);
        self.rpc_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_hydrated_count(&self, count: u64) {
        self.last_hydrated_count.store(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            catalog_refreshes: self.catalog_refreshes.load(Ordering::Relaxed),
            catalog_failures: self.catalog_failures.load(Ordering::Relaxed),
            parse_runs: self.parse_runs.load(Ordering::Relaxed),
            parse_item_drops: self.parse_item_drops.load(Ordering::Relaxed),
            parse_failures: self.parse_failures.load(Ordering::Relaxed),
            hydrate_runs: self.hydrate_runs.load(Ordering::Relaxed),
            hydrate_item_drops: self.hydrate_item_drops.load(Ordering::Relaxed),
            stale_discards: self.stale_discards.load(Ordering::Relaxed),
            descriptor_commits: self.descriptor_commits.load(Ordering::Relaxed),
            parse_commits: self.parse_commits.load(Ordering::Relaxed),
            hydrate_commits: self.hydrate_commits.load(Ordering::Relaxed),
            rpc_errors: self.rpc_errors.load(Ordering::Relaxed),
            rpc_timeouts: self.rpc_timeouts.load(Ordering::Relaxed),
            last_hydrated_count: self.last_hydrated_count.load(Ordering::Relaxed),
        }
    }

    pub fn catalog_refreshes(&self) -> u64 {
        self.catalog_refreshes.load(Ordering::Relaxed)
    }

    pub fn catalog_failures(&self) -> u64 {
        self.catalog_failures.load(Ordering::Relaxed)
    }

    pub fn parse_runs(&self) -> u64 {
        self.parse_runs.load(Ordering::Relaxed)
    }

    pub fn parse_item_drops(&self) -> u64 {
        self.parse_item_drops.load(Ordering::Relaxed)
    }

    pub fn parse_failures(&self) -> u64 {
        self.parse_failures.load(Ordering::Relaxed)
    }

    pub fn hydrate_runs(&self) -> u64 {
        self.hydrate_runs.load(Ordering::Relaxed)
    }

    pub fn hydrate_item_drops(&self) -> u64 {
        self.hydrate_item_drops.load(Ordering::Relaxed)
    }

    pub fn stale_discards(&self) -> u64 {
        self.stale_discards.load(Ordering::Relaxed)
    }

    pub fn stage_commits(&self, stage: Stage) -> u64 {
        match stage {
            Stage::Descriptors => self.descriptor_commits.load(Ordering::Relaxed),
            Stage::ParsedStates => self.parse_commits.load(Ordering::Relaxed),
            Stage::HydratedViews => self.hydrate_commits.load(Ordering::Relaxed),
        }
    }

    pub fn rpc_errors(&self) -> u64 {
        self.rpc_errors.load(Ordering::Relaxed)
    }

    pub fn rpc_timeouts(&self) -> u64 {
        self.rpc_timeouts.load(Ordering::Relaxed)
    }

    pub fn last_hydrated_count(&self) -> u64 {
        self.last_hydrated_count.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Copy, Clone)]
pub struct TelemetrySnapshot {
    pub catalog_refreshes: u64,
    pub catalog_failures: u64,
    pub parse_runs: u64,
    pub parse_item_drops: u64,
    pub parse_failures: u64,
    pub hydrate_runs: u64,
    pub hydrate_item_drops: u64,
    pub stale_discards: u64,
    pub descriptor_commits: u64,
    pub parse_commits: u64,
    pub hydrate_commits: u64,
    pub rpc_errors: u64,
    pub rpc_timeouts: u64,
    pub last_hydrated_count: u64,
}

/// Spawns a background task that periodically logs stage commits, item drops, and RPC errors.
pub fn spawn_metrics_reporter(
    telemetry: Arc<Telemetry>,
    shutdown: CancellationToken,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            select! {
                _ = shutdown.cancelled() => {
                    tracing::info!(target: "farmhand::metrics", "metrics reporter shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    let snapshot = telemetry.snapshot();

                    tracing::info!(
                        target: "farmhand::metrics",
                        catalog_refreshes = snapshot.catalog_refreshes,
                        catalog_failures = snapshot.catalog_failures,
                        parse_runs = snapshot.parse_runs,
                        parse_item_drops = snapshot.parse_item_drops,
                        parse_failures = snapshot.parse_failures,
                        hydrate_runs = snapshot.hydrate_runs,
                        hydrate_item_drops = snapshot.hydrate_item_drops,
                        stale_discards = snapshot.stale_discards,
                        descriptor_commits = snapshot.descriptor_commits,
                        parse_commits = snapshot.parse_commits,
                        hydrate_commits = snapshot.hydrate_commits,
                        rpc_errors = snapshot.rpc_errors,
                        rpc_timeouts = snapshot.rpc_timeouts,
                        hydrated_farms = snapshot.last_hydrated_count,
                        "runtime metrics snapshot"
                    );
                }
            }
        }
    })
}
