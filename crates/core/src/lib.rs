#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Core model and generation pipeline for texforge.

pub mod api;
pub mod error;
pub mod export;
pub mod generator;
pub mod model;
pub mod pipeline;
pub mod prompts;
pub mod state;

mod util;

pub use error::{GenerationError, ImageDataError, SubmitError};
pub use generator::Generator;
pub use model::{ImageData, OutputKind, OutputStatus, RunPhase, RunSnapshot};
pub use pipeline::{Pipeline, RunTicket};
pub use util::{new_ulid, now_ms};
