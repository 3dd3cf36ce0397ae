//! Pure run-state transitions.
//!
//! `RunState` owns the Result Set and the Pending Set of the current run. It
//! performs no I/O; the pipeline calls one transition per resolved remote call.
//! Transitions that do not fit the current phase are ignored (and logged), which
//! keeps the base entry immutable for the life of a run.

use crate::error::GenerationError;
use crate::model::{ImageData, OutputKind, RunPhase, RunSnapshot};

/// Result Set, Pending Set and phase of the current run.
#[derive(Debug, Clone, Default)]
pub struct RunState {
    snap: RunSnapshot,
    /// Set once a driver has taken ownership of the current run.
    driven: bool,
}

impl RunState {
    /// Empty, idle state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current view of the run.
    pub fn snapshot(&self) -> &RunSnapshot {
        &self.snap
    }

    /// Current phase.
    pub fn phase(&self) -> RunPhase {
        self.snap.phase
    }

    /// True while a remote call may still be outstanding.
    pub fn is_active(&self) -> bool {
        self.snap.phase.is_active()
    }

    /// Hand the active run `run_id` to exactly one driver.
    ///
    /// Returns false if the run is not current, not active, or already claimed.
    pub fn claim_driver(&mut self, run_id: &str) -> bool {
        if self.driven
            || !self.is_active()
            || self.snap.run_id.as_deref() != Some(run_id)
        {
            return false;
        }
        self.driven = true;
        true
    }

    /// Start a fresh run: previous results are discarded, base becomes pending.
    pub fn begin(&mut self, run_id: String, prompt: String, now_ms: i64) {
        self.snap = RunSnapshot {
            run_id: Some(run_id),
            prompt: Some(prompt),
            phase: RunPhase::BaseInFlight,
            started_at_ms: Some(now_ms),
            ..RunSnapshot::default()
        };
        self.snap.pending.insert(OutputKind::Albedo);
        self.driven = false;
    }

    /// Store the base image and queue every derived kind.
    pub fn base_succeeded(&mut self, image: ImageData) -> bool {
        if self.snap.phase != RunPhase::BaseInFlight
            || self.snap.results.contains_key(&OutputKind::Albedo)
        {
            tracing::warn!(phase = ?self.snap.phase, "ignoring base result outside base phase");
            return false;
        }
        self.snap.results.insert(OutputKind::Albedo, image);
        self.snap.pending.remove(&OutputKind::Albedo);
        self.snap.pending.extend(OutputKind::DERIVED);
        self.snap.phase = RunPhase::DerivedInFlight;
        true
    }

    /// Base failure ends the run with a run-level error.
    pub fn base_failed(&mut self, err: &GenerationError, now_ms: i64) -> bool {
        if self.snap.phase != RunPhase::BaseInFlight {
            tracing::warn!(phase = ?self.snap.phase, "ignoring base failure outside base phase");
            return false;
        }
        self.snap.error = Some(err.to_string());
        self.snap.pending.clear();
        self.snap.phase = RunPhase::Idle;
        self.snap.finished_at_ms = Some(now_ms);
        true
    }

    /// Store a derived map and clear it from the Pending Set.
    pub fn derived_succeeded(&mut self, kind: OutputKind, image: ImageData) -> bool {
        if !self.accepts_derived(kind) {
            return false;
        }
        self.snap.results.insert(kind, image);
        self.snap.pending.remove(&kind);
        true
    }

    /// A derived failure only affects its own kind.
    pub fn derived_failed(&mut self, kind: OutputKind, err: &GenerationError) -> bool {
        if !self.accepts_derived(kind) {
            return false;
        }
        self.snap.failures.insert(kind, err.to_string());
        self.snap.pending.remove(&kind);
        true
    }

    /// Close the run once every derived kind was attempted.
    pub fn finish(&mut self, now_ms: i64) -> bool {
        if self.snap.phase != RunPhase::DerivedInFlight {
            tracing::warn!(phase = ?self.snap.phase, "ignoring finish outside derived phase");
            return false;
        }
        if !self.snap.pending.is_empty() {
            tracing::warn!(pending = ?self.snap.pending, "finishing run with unresolved kinds");
            self.snap.pending.clear();
        }
        self.snap.phase = RunPhase::Done;
        self.snap.finished_at_ms = Some(now_ms);
        true
    }

    fn accepts_derived(&self, kind: OutputKind) -> bool {
        let ok = self.snap.phase == RunPhase::DerivedInFlight
            && kind.is_derived()
            && self.snap.pending.contains(&kind);
        if !ok {
            tracing::warn!(%kind, phase = ?self.snap.phase, "ignoring derived result");
        }
        ok
    }
}
