//! Fan-out coordinator: dispatches every descriptor of a run at once and folds
//! outcomes into the observable run state as they resolve.
//!
//! Every run is tagged with a [`RunId`]. Starting a run (or resetting) makes the
//! previous run stale; outcomes still in flight for a stale run are discarded on
//! arrival and never touch the current state.

use crate::error::StudioError;
use crate::generation::descriptor::ItemDescriptor;
use crate::generation::outcome::GenerationOutcome;
use crate::generation::runner::{ItemTask, TaskRunner};
use crate::generation::state::{RunState, StatusCounts};
use crate::types::RunId;
use chrono::{SecondsFormat, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Permission to execute one run, returned by [`FanOutCoordinator::begin_run`].
#[derive(Debug)]
pub struct RunTicket {
    run_id: RunId,
    descriptors: Vec<ItemDescriptor>,
}

impl RunTicket {
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn descriptors(&self) -> &[ItemDescriptor] {
        &self.descriptors
    }
}

/// Effect of applying one outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyResult {
    Applied,
    /// The outcome belongs to a superseded run
    Stale,
    /// Unknown id or already settled entry
    Ignored,
}

/// Summary of one executed run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub stage: &'static str,
    /// RFC 3339 wall-clock time the fan-out started
    pub started_at: String,
    pub total: usize,
    pub loaded: usize,
    pub failed: usize,
    /// Outcomes discarded because a newer run started first
    pub stale: usize,
    pub superseded: bool,
    #[serde(serialize_with = "serialize_millis")]
    pub duration: Duration,
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

/// Single writer of [`RunState`]. Observers read snapshots through [`subscribe`].
///
/// [`subscribe`]: FanOutCoordinator::subscribe
pub struct FanOutCoordinator {
    current: Mutex<Arc<RunState>>,
    state_tx: watch::Sender<Arc<RunState>>,
}

impl Default for FanOutCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl FanOutCoordinator {
    pub fn new() -> Self {
        let initial = Arc::new(RunState::empty(RunId::INITIAL));
        let (state_tx, _) = watch::channel(Arc::clone(&initial));
        Self {
            current: Mutex::new(initial),
            state_tx,
        }
    }

    /// Receive a snapshot after every state change.
    pub fn subscribe(&self) -> watch::Receiver<Arc<RunState>> {
        self.state_tx.subscribe()
    }

    pub fn snapshot(&self) -> Arc<RunState> {
        Arc::clone(&self.current.lock())
    }

    pub fn current_run(&self) -> RunId {
        self.current.lock().run_id()
    }

    /// Supersede the current run and clear all items.
    ///
    /// Used when a new request starts but its descriptors are not known yet
    /// (e.g. while a plan is being generated).
    pub fn reset(&self) -> RunId {
        let mut current = self.current.lock();
        let run_id = current.run_id().next();
        let state = Arc::new(RunState::empty(run_id));
        *current = Arc::clone(&state);
        self.state_tx.send_replace(state);
        debug!(%run_id, "Run state reset");
        run_id
    }

    /// Start a new run: every descriptor becomes Pending and the previous run is
    /// superseded. Fails before touching state when the descriptor set is empty
    /// or ids repeat.
    pub fn begin_run(&self, descriptors: Vec<ItemDescriptor>) -> Result<RunTicket, StudioError> {
        self.start_run(None, descriptors)
    }

    /// Like [`begin_run`], but only while `expected` is still the current run.
    ///
    /// A request that reset the coordinator and then spent time preparing its
    /// descriptors passes the id `reset` returned; if another request reset or
    /// started a run in the meantime this fails with `Superseded` and leaves the
    /// newer run untouched.
    ///
    /// [`begin_run`]: FanOutCoordinator::begin_run
    pub fn begin_run_if_current(
        &self,
        expected: RunId,
        descriptors: Vec<ItemDescriptor>,
    ) -> Result<RunTicket, StudioError> {
        self.start_run(Some(expected), descriptors)
    }

    fn start_run(
        &self,
        expected: Option<RunId>,
        descriptors: Vec<ItemDescriptor>,
    ) -> Result<RunTicket, StudioError> {
        if descriptors.is_empty() {
            return Err(StudioError::Preflight(
                "run has no items to generate".to_string(),
            ));
        }
        let mut seen = HashSet::with_capacity(descriptors.len());
        for descriptor in &descriptors {
            if !seen.insert(descriptor.id) {
                return Err(StudioError::Preflight(format!(
                    "duplicate item id {} in run",
                    descriptor.id
                )));
            }
        }

        let mut current = self.current.lock();
        if let Some(expected) = expected {
            if current.run_id() != expected {
                let newer = current.run_id();
                drop(current);
                debug!(%expected, %newer, "Not starting run for superseded request");
                return Err(StudioError::Superseded(newer));
            }
        }
        let run_id = current.run_id().next();
        let state = Arc::new(RunState::pending(run_id, &descriptors));
        *current = Arc::clone(&state);
        self.state_tx.send_replace(state);
        drop(current);

        info!(%run_id, items = descriptors.len(), "Run started");
        Ok(RunTicket {
            run_id,
            descriptors,
        })
    }

    /// Reconcile one outcome into the current state if its run is still current.
    pub fn apply(&self, run_id: RunId, outcome: &GenerationOutcome) -> ApplyResult {
        let mut current = self.current.lock();
        if current.run_id() != run_id {
            return ApplyResult::Stale;
        }
        match current.apply(outcome) {
            Some(next) => {
                let next = Arc::new(next);
                *current = Arc::clone(&next);
                self.state_tx.send_replace(next);
                ApplyResult::Applied
            }
            None => ApplyResult::Ignored,
        }
    }

    /// Dispatch every descriptor of the ticket concurrently and apply outcomes
    /// in completion order. A failing item never affects its siblings.
    pub async fn execute<T: ItemTask>(&self, ticket: RunTicket, runner: &TaskRunner<T>) -> RunReport {
        let RunTicket {
            run_id,
            descriptors,
        } = ticket;
        let started = Instant::now();
        let stage = runner.stage();
        let mut report = RunReport {
            run_id,
            stage,
            started_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            total: descriptors.len(),
            loaded: 0,
            failed: 0,
            stale: 0,
            superseded: false,
            duration: Duration::ZERO,
        };

        let mut in_flight: FuturesUnordered<_> = descriptors
            .iter()
            .map(|descriptor| runner.run(descriptor))
            .collect();

        while let Some(outcome) = in_flight.next().await {
            match self.apply(run_id, &outcome) {
                ApplyResult::Applied => match &outcome {
                    GenerationOutcome::Success { id, .. } => {
                        report.loaded += 1;
                        debug!(%run_id, stage, item_id = %id, "Item loaded");
                    }
                    GenerationOutcome::Failure { id, reason } => {
                        report.failed += 1;
                        warn!(%run_id, stage, item_id = %id, %reason, "Item failed");
                    }
                },
                ApplyResult::Stale => {
                    report.stale += 1;
                    report.superseded = true;
                    debug!(%run_id, stage, item_id = %outcome.id(), "Discarding outcome from superseded run");
                }
                ApplyResult::Ignored => {
                    debug!(%run_id, stage, item_id = %outcome.id(), "Outcome did not change state");
                }
            }
        }

        report.duration = started.elapsed();
        info!(
            %run_id,
            stage,
            total = report.total,
            loaded = report.loaded,
            failed = report.failed,
            superseded = report.superseded,
            duration_ms = report.duration.as_millis() as u64,
            "Run finished"
        );
        report
    }

    /// `begin_run` followed by `execute`.
    pub async fn run<T: ItemTask>(
        &self,
        descriptors: Vec<ItemDescriptor>,
        runner: &TaskRunner<T>,
    ) -> Result<RunReport, StudioError> {
        let ticket = self.begin_run(descriptors)?;
        Ok(self.execute(ticket, runner).await)
    }

    /// `begin_run_if_current` followed by `execute`.
    pub async fn run_if_current<T: ItemTask>(
        &self,
        expected: RunId,
        descriptors: Vec<ItemDescriptor>,
        runner: &TaskRunner<T>,
    ) -> Result<RunReport, StudioError> {
        let ticket = self.begin_run_if_current(expected, descriptors)?;
        Ok(self.execute(ticket, runner).await)
    }

    pub fn counts(&self) -> StatusCounts {
        self.current.lock().counts()
    }
}
