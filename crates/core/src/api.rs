//! Request and response bodies of the daemon's JSON API.

use serde::{Deserialize, Serialize};

use crate::model::{OutputKind, OutputStatus, RunSnapshot};

/// Submit a prompt for a new run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRequest {
    /// Free-text texture description.
    pub prompt: String,
}

/// Accepted submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitResponse {
    /// ULID of the started run.
    pub run_id: String,
}

/// One entry of the output listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutputEntry {
    /// Which output.
    pub kind: OutputKind,
    /// Human title.
    pub label: String,
    /// Current status in this run.
    pub status: OutputStatus,
    /// Suggested download file name, present once the image exists.
    pub file_name: Option<String>,
}

/// Listing of all five outputs for the current run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputsResponse {
    /// Run the listing belongs to.
    pub run_id: Option<String>,
    /// All five outputs in display order.
    pub outputs: Vec<OutputEntry>,
}

impl OutputsResponse {
    /// Build the listing for a snapshot.
    pub fn from_snapshot(snap: &RunSnapshot) -> Self {
        let outputs = OutputKind::ALL
            .into_iter()
            .map(|kind| OutputEntry {
                kind,
                label: kind.label().to_string(),
                status: snap.status(kind),
                file_name: snap
                    .results
                    .get(&kind)
                    .map(|img| crate::export::output_file_name(kind, img)),
            })
            .collect();
        Self {
            run_id: snap.run_id.clone(),
            outputs,
        }
    }
}

/// Error body returned by the daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable reason.
    pub error: String,
}
