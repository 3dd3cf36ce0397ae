#![forbid(unsafe_code)]

//! Generation client for the Gemini `generateContent` API.

pub mod client;
pub mod config;
pub mod wire;

pub use client::GeminiClient;
pub use config::GeminiConfig;
