//! Seam between the pipeline and the remote generation service.

use async_trait::async_trait;

use crate::error::GenerationError;
use crate::model::{ImageData, OutputKind};

/// Remote image generation, as seen by the pipeline.
///
/// Implementations hold no per-run state; every call is independent.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Produce the base texture for a prompt.
    async fn generate_base(&self, prompt: &str) -> Result<ImageData, GenerationError>;

    /// Transform the base texture into the map described by `kind`.
    async fn generate_derived(
        &self,
        base: &ImageData,
        kind: OutputKind,
    ) -> Result<ImageData, GenerationError>;
}
