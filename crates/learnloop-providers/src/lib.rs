//! learnloop-providers — LLM provider integrations.
//!
//! Implements the `LlmProvider` trait for Gemini, OpenAI-compatible APIs,
//! and Ollama, plus a scripted mock, and loads provider configuration.

pub mod config;
mod http;
pub mod gemini;
pub mod mock;
pub mod ollama;
pub mod openai;

pub use config::{create_provider, load_config, load_config_from, LearnloopConfig, ProviderConfig};
pub use learnloop_core::error::ProviderError;
