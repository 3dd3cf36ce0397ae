//! Output kinds, image payloads and run snapshots.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::error::ImageDataError;

/// One of the five images produced by a run.
///
/// The set is closed. Ordering follows [`OutputKind::ALL`], which is also the
/// key order of [`RunSnapshot::results`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    /// Base texture generated straight from the prompt.
    Albedo,
    /// Tangent-space normal map.
    Normal,
    /// Grayscale height map.
    Height,
    /// Grayscale metalness map.
    Metallic,
    /// Ambient occlusion map.
    Ao,
}

impl OutputKind {
    /// Every kind, base first.
    pub const ALL: [OutputKind; 5] = [
        OutputKind::Albedo,
        OutputKind::Normal,
        OutputKind::Height,
        OutputKind::Metallic,
        OutputKind::Ao,
    ];

    /// Derived kinds in the order a run processes them.
    pub const DERIVED: [OutputKind; 4] = [
        OutputKind::Normal,
        OutputKind::Height,
        OutputKind::Metallic,
        OutputKind::Ao,
    ];

    /// Stable lowercase name, used in URLs and file names.
    pub fn as_str(self) -> &'static str {
        match self {
            OutputKind::Albedo => "albedo",
            OutputKind::Normal => "normal",
            OutputKind::Height => "height",
            OutputKind::Metallic => "metallic",
            OutputKind::Ao => "ao",
        }
    }

    /// Human title for UI surfaces.
    pub fn label(self) -> &'static str {
        match self {
            OutputKind::Albedo => "Albedo",
            OutputKind::Normal => "Normal",
            OutputKind::Height => "Height",
            OutputKind::Metallic => "Metallic",
            OutputKind::Ao => "Ambient Occlusion",
        }
    }

    /// True for every kind except the base.
    pub fn is_derived(self) -> bool {
        self != OutputKind::Albedo
    }
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown output name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown output kind: {0}")]
pub struct UnknownOutputKind(
    /// The rejected input.
    pub String,
);

impl FromStr for OutputKind {
    type Err = UnknownOutputKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OutputKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| UnknownOutputKind(s.to_string()))
    }
}

/// Encoded image as returned by the generation service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageData {
    /// MIME type, e.g. `image/png`.
    pub mime_type: String,
    /// Base64 payload (standard alphabet, padded).
    pub data: String,
}

impl ImageData {
    /// Wraps an already base64-encoded payload.
    pub fn new(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    /// Wraps raw bytes.
    pub fn from_bytes(mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self::new(mime_type, STANDARD.encode(bytes))
    }

    /// `data:<mime>;base64,<payload>`
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }

    /// Parses a base64 data URI. Only the `;base64` form is accepted.
    pub fn from_data_uri(uri: &str) -> Result<Self, ImageDataError> {
        let rest = uri
            .strip_prefix("data:")
            .ok_or(ImageDataError::NotDataUri)?;
        let (meta, data) = rest.split_once(',').ok_or(ImageDataError::NotDataUri)?;
        let mime_type = meta
            .strip_suffix(";base64")
            .ok_or(ImageDataError::NotBase64)?;
        if mime_type.is_empty() {
            return Err(ImageDataError::NotDataUri);
        }
        Ok(Self::new(mime_type, data))
    }

    /// Raw image bytes.
    pub fn decode(&self) -> Result<Vec<u8>, ImageDataError> {
        STANDARD
            .decode(self.data.as_bytes())
            .map_err(|e| ImageDataError::Decode(e.to_string()))
    }

    /// File extension matching the MIME type.
    pub fn extension(&self) -> &'static str {
        match self.mime_type.as_str() {
            "image/png" => "png",
            "image/jpeg" | "image/jpg" => "jpg",
            "image/webp" => "webp",
            "image/gif" => "gif",
            _ => "bin",
        }
    }
}

/// Lifecycle phase of the pipeline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    /// No run yet, or the last run ended on a base failure.
    #[default]
    Idle,
    /// Waiting on the base image.
    BaseInFlight,
    /// Working through the derived maps.
    DerivedInFlight,
    /// Every derived map was attempted.
    Done,
}

impl RunPhase {
    /// A run is active while any remote call may still be outstanding.
    pub fn is_active(self) -> bool {
        matches!(self, RunPhase::BaseInFlight | RunPhase::DerivedInFlight)
    }
}

/// Per-output status shown next to each selectable output.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutputStatus {
    /// Not requested in this run (or no run yet).
    Empty,
    /// Generation call in flight.
    Pending,
    /// Image available.
    Ready,
    /// Generation failed for this run.
    Failed,
}

/// Read-only view of the current (or last) run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct RunSnapshot {
    /// ULID of the run. `None` before the first submission.
    pub run_id: Option<String>,
    /// Trimmed prompt of the run.
    pub prompt: Option<String>,
    /// Where the run is in its lifecycle.
    pub phase: RunPhase,

    /// Kinds whose generation call is in flight.
    pub pending: BTreeSet<OutputKind>,
    /// Produced images.
    pub results: BTreeMap<OutputKind, ImageData>,
    /// Diagnostics for derived maps that failed in this run.
    #[serde(default)]
    pub failures: BTreeMap<OutputKind, String>,
    /// Terminal run-level error (base image failure).
    #[serde(default)]
    pub error: Option<String>,

    /// Submission time, epoch milliseconds.
    pub started_at_ms: Option<i64>,
    /// Time the run reached `Done` or failed, epoch milliseconds.
    pub finished_at_ms: Option<i64>,
}

impl RunSnapshot {
    /// Status of one output, pending taking precedence.
    pub fn status(&self, kind: OutputKind) -> OutputStatus {
        if self.pending.contains(&kind) {
            OutputStatus::Pending
        } else if self.results.contains_key(&kind) {
            OutputStatus::Ready
        } else if self.failures.contains_key(&kind) {
            OutputStatus::Failed
        } else {
            OutputStatus::Empty
        }
    }

    /// Populated kinds in display order.
    pub fn populated(&self) -> Vec<OutputKind> {
        OutputKind::ALL
            .into_iter()
            .filter(|k| self.results.contains_key(k))
            .collect()
    }
}
