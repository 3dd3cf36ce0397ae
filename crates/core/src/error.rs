//! Error types shared by the pipeline and its clients.

use thiserror::Error;

use crate::model::OutputKind;

/// Failure of a single generation call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    /// Transport or service fault.
    #[error("generation failed: {0}")]
    GenerationFailed(String),

    /// The call succeeded but carried no image part.
    #[error("no image produced for {kind}")]
    NoImageProduced {
        /// Output the call was meant to produce.
        kind: OutputKind,
    },
}

/// Why a prompt submission was rejected. Rejections never touch run state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    /// Empty or whitespace-only prompt.
    #[error("prompt is blank")]
    BlankPrompt,

    /// Another run is still in flight.
    #[error("a run is already active")]
    RunActive,
}

/// Errors handling encoded image values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageDataError {
    /// Missing `data:` prefix, separator or MIME type.
    #[error("not a data URI")]
    NotDataUri,

    /// Data URI without the `;base64` marker.
    #[error("data URI is not base64 encoded")]
    NotBase64,

    /// Payload is not valid base64.
    #[error("invalid base64 payload: {0}")]
    Decode(String),
}
