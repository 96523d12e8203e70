//! Reactive pipeline orchestration.
//!
//! `FarmPipeline` wires the three stage slots to their inputs:
//! - the descriptor slot follows the refresh input (catalog fetch),
//! - the parse slot follows the descriptor slot, the connection, and the
//!   identity (chain account fetch + decode),
//! - the hydrate slot follows the parse slot and every market-context input
//!   (prices, liquidity, APRs, resolvers, clock offset).
//!
//! Dependency edges fire stage runs as detached tasks. A run snapshots its
//! dependencies at start, is stamped with a slot generation, and commits only
//! if no newer run has committed since; losers are discarded, never awaited.
//! Stage failures keep the previous committed output. Task panics are routed
//! through [`FatalErrorHandler`] and stop the whole pipeline.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use futures::FutureExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::catalog::models::FarmDescriptor;
use crate::catalog::source::DescriptorSource;
use crate::clock::chain_clock::ChainClock;
use crate::clock::slot_duration::SlotDurationEstimator;
use crate::hydrate::context::HydrationContext;
use crate::hydrate::hydrator::Hydrator;
use crate::hydrate::view::HydratedFarmView;
use crate::parser::parse::{ChainStateParser, ParsedFarmState};
use crate::pipeline::inputs::{InputReceivers, PipelineInputs};
use crate::pipeline::slot::{StageOutput, StageSlot};
use crate::rpc::accounts::AccountQueryConfig;
use crate::runtime::config::PipelineConfig;
use crate::runtime::fatal::FatalErrorHandler;
use crate::runtime::telemetry::{spawn_metrics_reporter, Stage, Telemetry};

pub struct FarmPipeline {
    config: PipelineConfig,
    inputs: PipelineInputs,
    receivers: InputReceivers,
    telemetry: Arc<Telemetry>,
    source: Arc<DescriptorSource>,
    parser: Arc<ChainStateParser>,
    hydrator: Arc<Hydrator>,
    estimator: Arc<SlotDurationEstimator>,
    descriptors: Arc<StageSlot<FarmDescriptor>>,
    parsed: Arc<StageSlot<ParsedFarmState>>,
    hydrated: Arc<StageSlot<HydratedFarmView>>,
    shutdown_root: CancellationToken,
    lifecycle: Option<LifecycleHandles>,
    running: bool,
}

struct LifecycleHandles {
    run_token: CancellationToken,
    fatal: Arc<FatalErrorHandler>,
    loop_handle: JoinHandle<()>,
    metrics_handle: JoinHandle<()>,
}

/// Everything a spawned stage run needs, snapshot-friendly and cheap to clone.
#[derive(Clone)]
struct StageDeps {
    inputs: PipelineInputs,
    source: Arc<DescriptorSource>,
    parser: Arc<ChainStateParser>,
    hydrator: Arc<Hydrator>,
    estimator: Arc<SlotDurationEstimator>,
    descriptors: Arc<StageSlot<FarmDescriptor>>,
    parsed: Arc<StageSlot<ParsedFarmState>>,
    hydrated: Arc<StageSlot<HydratedFarmView>>,
    telemetry: Arc<Telemetry>,
    fatal: Arc<FatalErrorHandler>,
}

impl FarmPipeline {
    /// Creates a pipeline with its own root cancellation token. Use
    /// [`Self::with_cancellation_token`] to integrate with an existing
    /// shutdown mechanism.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        Self::with_cancellation_token(config, CancellationToken::new())
    }

    pub fn with_cancellation_token(
        config: PipelineConfig,
        shutdown_token: CancellationToken,
    ) -> Result<Self> {
        let telemetry = Arc::new(Telemetry::default());
        let (inputs, receivers) = PipelineInputs::channels();

        let source = Arc::new(DescriptorSource::new(
            config.catalog_url(),
            config.catalog_timeout(),
            telemetry.clone(),
        )?);
        let parser = Arc::new(ChainStateParser::new(
            AccountQueryConfig::default(),
            telemetry.clone(),
        ));
        let hydrator = Arc::new(Hydrator::new(
            config.hydrate_concurrency(),
            telemetry.clone(),
        ));
        let estimator = Arc::new(SlotDurationEstimator::new(
            config.slot_duration_fallback(),
            config.slot_estimate_freshness(),
        ));

        Ok(Self {
            descriptors: Arc::new(StageSlot::new(Stage::Descriptors, telemetry.clone())),
            parsed: Arc::new(StageSlot::new(Stage::ParsedStates, telemetry.clone())),
            hydrated: Arc::new(StageSlot::new(Stage::HydratedViews, telemetry.clone())),
            config,
            inputs,
            receivers,
            telemetry,
            source,
            parser,
            hydrator,
            estimator,
            shutdown_root: shutdown_token,
            lifecycle: None,
            running: false,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Cloneable handle for feeding the pipeline's inputs.
    pub fn inputs(&self) -> PipelineInputs {
        self.inputs.clone()
    }

    pub fn telemetry(&self) -> Arc<Telemetry> {
        self.telemetry.clone()
    }

    /// Last committed descriptor set (empty before the first commit).
    pub fn descriptors(&self) -> Arc<Vec<FarmDescriptor>> {
        self.descriptors.current()
    }

    /// Last committed parse output.
    pub fn parsed_states(&self) -> Arc<Vec<ParsedFarmState>> {
        self.parsed.current()
    }

    /// Last committed hydrated views, in descriptor order.
    pub fn hydrated_views(&self) -> Arc<Vec<HydratedFarmView>> {
        self.hydrated.current()
    }

    /// True until the hydrate stage has committed a non-empty output.
    pub fn is_loading(&self) -> bool {
        !self.hydrated.has_committed() || self.hydrated.current().is_empty()
    }

    /// True when any committed descriptor is flagged as not yet opened.
    pub fn have_upcoming_farms(&self) -> bool {
        self.descriptors
            .current()
            .iter()
            .any(|descriptor| descriptor.upcoming)
    }

    /// Watch receiver over the hydrated slot; wakes on commits only.
    pub fn subscribe_hydrated(&self) -> watch::Receiver<StageOutput<HydratedFarmView>> {
        self.hydrated.subscribe()
    }

    /// Replaces the root shutdown token used to derive per-run tokens. Must
    /// only be called while the pipeline is idle.
    pub fn replace_shutdown_root(&mut self, shutdown: CancellationToken) {
        debug_assert!(
            !self.running,
            "shutdown token should not change while the pipeline is running"
        );
        self.shutdown_root = shutdown;
    }

    /// Starts the reactive loop and the metrics reporter, then schedules the
    /// initial catalog fetch.
    pub async fn start(&mut self) -> Result<()> {
        if self.running {
            bail!("pipeline already running");
        }

        let run_token = self.shutdown_root.child_token();
        let fatal = Arc::new(FatalErrorHandler::new(
            self.shutdown_root.clone(),
            run_token.clone(),
        ));

        tracing::info!(
            catalog = self.config.catalog_url(),
            concurrency = self.config.hydrate_concurrency(),
            "starting farm pipeline"
        );

        let metrics_handle = spawn_metrics_reporter(
            self.telemetry.clone(),
            run_token.clone(),
            self.config.metrics_interval(),
        );

        let deps = StageDeps {
            inputs: self.inputs.clone(),
            source: self.source.clone(),
            parser: self.parser.clone(),
            hydrator: self.hydrator.clone(),
            estimator: self.estimator.clone(),
            descriptors: self.descriptors.clone(),
            parsed: self.parsed.clone(),
            hydrated: self.hydrated.clone(),
            telemetry: self.telemetry.clone(),
            fatal: fatal.clone(),
        };
        let loop_handle = tokio::spawn(reactive_loop(
            deps,
            self.receivers.clone(),
            run_token.clone(),
        ));

        self.lifecycle = Some(LifecycleHandles {
            run_token,
            fatal,
            loop_handle,
            metrics_handle,
        });
        self.running = true;
        Ok(())
    }

    /// Stops the reactive loop. In-flight stage runs are not awaited; their
    /// commits will lose against the cancelled loop and are simply dropped.
    /// Returns the captured fatal error if a task panicked while running.
    pub async fn stop(&mut self) -> Result<()> {
        let Some(lifecycle) = self.lifecycle.take() else {
            return Ok(());
        };

        lifecycle.run_token.cancel();
        lifecycle
            .loop_handle
            .await
            .context("pipeline loop task failed")?;
        lifecycle
            .metrics_handle
            .await
            .context("metrics reporter task failed")?;
        self.running = false;

        if let Some(error) = lifecycle.fatal.error() {
            return Err(error.context("pipeline stopped after a fatal error"));
        }

        tracing::info!("farm pipeline stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running
    }
}

/// Maps input edges to stage runs until the run token is cancelled. Each arm
/// spawns the run detached so a slow stage never blocks edge intake; the
/// generation check in the slot sorts out overlapping runs.
async fn reactive_loop(deps: StageDeps, mut rx: InputReceivers, run_token: CancellationToken) {
    // Inputs set before the loop came up are folded into the initial runs
    // below; mark them seen so they are not replayed as separate edges.
    rx.refresh.mark_unchanged();
    rx.connection.mark_unchanged();
    rx.identity.mark_unchanged();
    rx.prices.mark_unchanged();
    rx.liquidity.mark_unchanged();
    rx.aprs.mark_unchanged();
    rx.tokens.mark_unchanged();
    rx.lp_tokens.mark_unchanged();
    rx.time_offset_ms.mark_unchanged();

    let mut descriptor_commits = deps.descriptors.subscribe();
    let mut parse_commits = deps.parsed.subscribe();
    descriptor_commits.mark_unchanged();
    parse_commits.mark_unchanged();

    // Initial catalog fetch; parse and hydrate runs follow from its commit.
    spawn_descriptor_run(&deps);

    loop {
        tokio::select! {
            _ = run_token.cancelled() => {
                tracing::debug!("pipeline loop cancelled");
                break;
            }
            changed = rx.refresh.changed() => {
                if changed.is_err() { break; }
                spawn_descriptor_run(&deps);
            }
            changed = descriptor_commits.changed() => {
                if changed.is_err() { break; }
                spawn_parse_run(&deps);
            }
            changed = rx.connection.changed() => {
                if changed.is_err() { break; }
                spawn_parse_run(&deps);
            }
            changed = rx.identity.changed() => {
                if changed.is_err() { break; }
                spawn_parse_run(&deps);
            }
            changed = parse_commits.changed() => {
                if changed.is_err() { break; }
                spawn_hydrate_run(&deps);
            }
            changed = rx.prices.changed() => {
                if changed.is_err() { break; }
                spawn_hydrate_run(&deps);
            }
            changed = rx.liquidity.changed() => {
                if changed.is_err() { break; }
                spawn_hydrate_run(&deps);
            }
            changed = rx.aprs.changed() => {
                if changed.is_err() { break; }
                spawn_hydrate_run(&deps);
            }
            changed = rx.tokens.changed() => {
                if changed.is_err() { break; }
                spawn_hydrate_run(&deps);
            }
            changed = rx.lp_tokens.changed() => {
                if changed.is_err() { break; }
                spawn_hydrate_run(&deps);
            }
            changed = rx.time_offset_ms.changed() => {
                if changed.is_err() { break; }
                spawn_hydrate_run(&deps);
            }
        }
    }
}

fn spawn_descriptor_run(deps: &StageDeps) {
    let deps = deps.clone();
    spawn_stage("descriptor run", deps.fatal.clone(), async move {
        run_descriptor_stage(&deps).await;
    });
}

fn spawn_parse_run(deps: &StageDeps) {
    let deps = deps.clone();
    spawn_stage("parse run", deps.fatal.clone(), async move {
        run_parse_stage(&deps).await;
    });
}

fn spawn_hydrate_run(deps: &StageDeps) {
    let deps = deps.clone();
    spawn_stage("hydrate run", deps.fatal.clone(), async move {
        run_hydrate_stage(&deps).await;
    });
}

/// Spawns a detached stage run, translating panics into a fatal shutdown.
fn spawn_stage<F>(name: &'static str, fatal: Arc<FatalErrorHandler>, run: F)
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(panic) = AssertUnwindSafe(run).catch_unwind().await {
            let message = panic_message(panic);
            let _ = fatal.trigger(name, anyhow!("stage task panicked: {message}"));
        }
    });
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

async fn run_descriptor_stage(deps: &StageDeps) {
    let generation = deps.descriptors.begin_run();
    match deps.source.refresh().await {
        Ok(descriptors) => {
            deps.descriptors.commit(generation, descriptors);
        }
        Err(err) => {
            deps.telemetry.record_catalog_failure();
            tracing::warn!(
                error = %err,
                "catalog refresh failed; keeping previous descriptor set"
            );
        }
    }
}

async fn run_parse_stage(deps: &StageDeps) {
    // Guards are checked before stamping a generation so a skipped run
    // leaves the slot untouched.
    if deps.descriptors.current().is_empty() {
        tracing::debug!("parse run skipped: no descriptors committed yet");
        return;
    }
    let Some(connection) = deps.inputs.connection() else {
        tracing::debug!("parse run skipped: no RPC connection");
        return;
    };

    let generation = deps.parsed.begin_run();
    let descriptors = deps.descriptors.current();
    let identity = deps.inputs.identity();
    let result = deps
        .parser
        .parse(
            &descriptors,
            connection.as_account_fetcher(),
            identity.as_ref(),
        )
        .await;
    match result {
        Ok(states) => {
            deps.parsed.commit(generation, states);
        }
        Err(err) => {
            deps.telemetry.record_parse_failure();
            tracing::warn!(
                error = %err,
                farms = descriptors.len(),
                "parse run failed; keeping previous chain state"
            );
        }
    }
}

async fn run_hydrate_stage(deps: &StageDeps) {
    // Stamp before snapshotting: a run that reads a dependency may never
    // carry a generation newer than a run that read a later value of it.
    let generation = deps.hydrated.begin_run();
    let parsed = deps.parsed.current().as_ref().clone();

    let connection = deps.inputs.connection();
    let sample_source = connection
        .as_deref()
        .map(|connection| connection.as_sample_source());
    let seconds_per_slot = deps.estimator.estimate(sample_source).await;

    let clock = ChainClock::new(deps.inputs.time_offset_ms());
    let context = Arc::new(HydrationContext {
        tokens: deps.inputs.token_resolver(),
        lp_tokens: deps.inputs.lp_token_resolver(),
        prices: deps.inputs.prices(),
        liquidity: deps.inputs.liquidity(),
        aprs: deps.inputs.aprs(),
        seconds_per_slot,
        chain_now: clock.now(),
        time_offset_ms: clock.offset_ms(),
    });

    let views = deps.hydrator.hydrate(parsed, context).await;
    let hydrated_count = views.len() as u64;
    // An empty input still commits: consumers distinguish "no farms" from
    // "not hydrated yet" through the slot's generation.
    if deps.hydrated.commit(generation, views) {
        deps.telemetry.record_hydrated_count(hydrated_count);
    }
}
