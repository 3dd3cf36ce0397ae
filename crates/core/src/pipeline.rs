//! Pipeline controller: one run at a time, base first, then derived maps.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::SubmitError;
use crate::generator::Generator;
use crate::model::{OutputKind, RunSnapshot};
use crate::state::RunState;
use crate::{new_ulid, now_ms};

/// Proof that a submission was accepted; required to drive the run.
///
/// Not `Clone`: a ticket is consumed by the one [`Pipeline::drive`] call that
/// executes its run.
#[derive(Debug, PartialEq, Eq)]
pub struct RunTicket {
    run_id: String,
    prompt: String,
}

impl RunTicket {
    /// ULID of the accepted run.
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Trimmed prompt the run was submitted with.
    pub fn prompt(&self) -> &str {
        &self.prompt
    }
}

/// Drives base → derived generation and exposes live progress.
///
/// At most one run executes at a time. Remote calls are issued one after
/// another and the state lock is only taken between calls, so readers of
/// [`Pipeline::snapshot`] never wait on the network.
pub struct Pipeline {
    generator: Arc<dyn Generator>,
    state: Mutex<RunState>,
}

impl Pipeline {
    /// Idle pipeline over `generator`.
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self {
            generator,
            state: Mutex::new(RunState::new()),
        }
    }

    /// Accept a prompt and reset run state.
    ///
    /// Blank prompts and submissions during an active run are rejected without
    /// touching the current state.
    pub async fn submit(&self, prompt: &str) -> Result<RunTicket, SubmitError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(SubmitError::BlankPrompt);
        }

        let mut st = self.state.lock().await;
        if st.is_active() {
            tracing::info!(run_id = ?st.snapshot().run_id, "submission rejected: run active");
            return Err(SubmitError::RunActive);
        }

        let run_id = new_ulid().to_string();
        st.begin(run_id.clone(), prompt.to_string(), now_ms());
        tracing::info!(%run_id, prompt, "run started");

        Ok(RunTicket {
            run_id,
            prompt: prompt.to_string(),
        })
    }

    /// Execute an accepted run to its terminal state and return the final view.
    ///
    /// A run is driven once. Tickets for a run that is no longer current, no
    /// longer active or already claimed by another driver return the current
    /// snapshot without issuing any call.
    pub async fn drive(&self, ticket: RunTicket) -> RunSnapshot {
        let run_id = ticket.run_id();

        {
            let mut st = self.state.lock().await;
            if !st.claim_driver(run_id) {
                tracing::warn!(run_id, "run not claimable, not driving");
                return st.snapshot().clone();
            }
        }

        let base = match self.generator.generate_base(ticket.prompt()).await {
            Ok(image) => {
                tracing::info!(run_id, "base image ready");
                self.state.lock().await.base_succeeded(image.clone());
                image
            }
            Err(e) => {
                tracing::error!(run_id, error = %e, "base image failed, run aborted");
                let mut st = self.state.lock().await;
                st.base_failed(&e, now_ms());
                return st.snapshot().clone();
            }
        };

        // One call at a time, in DERIVED order.
        for kind in OutputKind::DERIVED {
            let res = self.generator.generate_derived(&base, kind).await;
            let mut st = self.state.lock().await;
            match res {
                Ok(image) => {
                    tracing::info!(run_id, %kind, "derived map ready");
                    st.derived_succeeded(kind, image);
                }
                Err(e) => {
                    tracing::warn!(run_id, %kind, error = %e, "derived map failed");
                    st.derived_failed(kind, &e);
                }
            }
        }

        let mut st = self.state.lock().await;
        st.finish(now_ms());
        let snap = st.snapshot().clone();
        tracing::info!(
            run_id,
            produced = snap.results.len(),
            failed = snap.failures.len(),
            "run finished"
        );
        snap
    }

    /// Submit and drive in one call.
    pub async fn run(&self, prompt: &str) -> Result<RunSnapshot, SubmitError> {
        let ticket = self.submit(prompt).await?;
        Ok(self.drive(ticket).await)
    }

    /// Clone of the current (or last) run state.
    pub async fn snapshot(&self) -> RunSnapshot {
        self.state.lock().await.snapshot().clone()
    }

    /// True while a run is in flight.
    pub async fn is_active(&self) -> bool {
        self.state.lock().await.is_active()
    }
}
