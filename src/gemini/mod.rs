//! Gemini API client and types.
//!
//! [`ModelBackend`] is the seam the agent talks through; [`GeminiClient`]
//! implements it over the `generateContent` REST endpoint.

mod client;
mod types;


pub use client::GeminiClient;
pub use types::*;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::GeminiResult;

/// Which configured model a call goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelRole {
    /// Image plus text prompting (scene analysis).
    Vision,
    /// Text-only prompting (strategy and recovery).
    Reasoning,
}

/// A hosted model that turns prompt parts into free-form text.
///
/// The returned text *may* contain a JSON object; nothing about its shape
/// is guaranteed.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Run one generation and return the reply text.
    async fn generate(&self, role: ModelRole, parts: Vec<Part>) -> GeminiResult<String>;
}
