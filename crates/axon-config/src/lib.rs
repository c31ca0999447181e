#![allow(clippy::must_use_candidate)]

mod duration;
pub mod llm;
mod loader;

use serde::Deserialize;

pub use llm::*;

/// Top-level Axon configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// LLM gateway configuration
    #[serde(default)]
    pub llm: LlmConfig,
}
