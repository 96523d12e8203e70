use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use crate::runtime::telemetry::{Stage, Telemetry};

/// Last committed output of a stage. `generation` is `None` until the
/// stage has committed at least once.
#[derive(Debug, Clone)]
pub struct StageOutput<T> {
    pub generation: Option<u64>,
    pub value: Arc<Vec<T>>,
}

impl<T> Default for StageOutput<T> {
    fn default() -> Self {
        Self {
            generation: None,
            value: Arc::new(Vec::new()),
        }
    }
}

/// Single-writer slot holding the latest committed output of one stage.
///
/// Runs are stamped with a monotonically increasing generation at start.
/// A run may only commit if its generation is newer than the last
/// committed one; anything else lost the race to a newer run and its
/// result is discarded. Subscribers are woken on commits only.
pub struct StageSlot<T> {
    stage: Stage,
    next_generation: AtomicU64,
    output: watch::Sender<StageOutput<T>>,
    telemetry: Arc<Telemetry>,
}

impl<T> StageSlot<T> {
    pub fn new(stage: Stage, telemetry: Arc<Telemetry>) -> Self {
        let (output, _) = watch::channel(StageOutput::default());
        Self {
            stage,
            next_generation: AtomicU64::new(1),
            output,
            telemetry,
        }
    }

    /// Stamps a new run. Call once at run start, before any await.
    pub fn begin_run(&self) -> u64 {
        self.next_generation.fetch_add(1, Ordering::SeqCst)
    }

    /// Commits `value` if `generation` is still the newest seen. Returns
    /// whether the commit landed; a `false` means a newer run already
    /// committed and this result was dropped.
    pub fn commit(&self, generation: u64, value: Vec<T>) -> bool {
        let committed = self.output.send_if_modified(|current| {
            if current.generation.is_some_and(|last| generation <= last) {
                return false;
            }
            current.generation = Some(generation);
            current.value = Arc::new(value);
            true
        });
        if committed {
            self.telemetry.record_stage_commit(self.stage);
        } else {
            self.telemetry.record_stale_discard();
            debug!(
                stage = self.stage.as_str(),
                generation, "discarded stale stage run after newer commit"
            );
        }
        committed
    }

    /// Snapshot of the committed value. Cheap, shares the inner vec.
    pub fn current(&self) -> Arc<Vec<T>> {
        self.output.borrow().value.clone()
    }

    pub fn generation(&self) -> Option<u64> {
        self.output.borrow().generation
    }

    /// True once the slot has committed at least one run.
    pub fn has_committed(&self) -> bool {
        self.generation().is_some()
    }

    pub fn subscribe(&self) -> watch::Receiver<StageOutput<T>> {
        self.output.subscribe()
    }
}
