//! Core trait definitions for LLM providers, video search, and the
//! collaborator agents the learning state machine drives.
//!
//! `LlmProvider` is implemented by the `learnloop-providers` crate.
//! `LearningAgents` is implemented by [`crate::agents::AgentTeam`] and by
//! test doubles.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::model::{Answers, EvaluationResult, Quiz, StudyContent, Video};

// ---------------------------------------------------------------------------
// LLM Provider trait
// ---------------------------------------------------------------------------

/// Trait for LLM backends that produce text from prompts.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Human-readable provider name (e.g. "gemini").
    fn name(&self) -> &str;

    /// Generate a completion for a prompt.
    async fn generate(&self, request: &GenerateRequest) -> anyhow::Result<GenerateResponse>;

    /// List available models for this provider.
    fn available_models(&self) -> Vec<ModelInfo>;
}

/// Shape the caller expects the reply in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    #[default]
    Text,
    Json,
}

/// Request to generate a completion from an LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    /// Model identifier (e.g. "gemini-2.5-flash").
    pub model: String,
    /// The main prompt.
    pub prompt: String,
    /// Optional system prompt.
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f64,
    /// Requested reply format.
    #[serde(default)]
    pub response_format: ResponseFormat,
}

/// Response from an LLM generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    /// The raw response content.
    pub content: String,
    /// Model that actually generated the response.
    pub model: String,
    /// Token usage.
    pub token_usage: TokenUsage,
    /// Latency in milliseconds.
    pub latency_ms: u64,
}

/// Token accounting for one request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Information about an available model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Model identifier.
    pub id: String,
    /// Human-readable model name.
    pub name: String,
    /// Provider name.
    pub provider: String,
    /// Maximum context window size in tokens.
    pub max_context: u32,
}

// ---------------------------------------------------------------------------
// Video search trait
// ---------------------------------------------------------------------------

/// Finds videos about a topic.
#[async_trait]
pub trait VideoSearch: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> anyhow::Result<Vec<Video>>;
}

/// A video source that never finds anything.
pub struct NoVideoSearch;

#[async_trait]
impl VideoSearch for NoVideoSearch {
    async fn search(&self, _: &str, _: usize) -> anyhow::Result<Vec<Video>> {
        Ok(Vec::new())
    }
}

// ---------------------------------------------------------------------------
// Collaborator agents
// ---------------------------------------------------------------------------

/// Instruction to bias a quiz toward topics the learner missed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeakAreaFocus {
    /// Weak-area labels from the previous evaluation.
    pub areas: Vec<String>,
    /// Minimum share of questions (0..=1) that must target `areas`.
    pub min_share: f64,
}

/// Parameters for producing a quiz.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizRequest {
    pub topic: String,
    pub documentation: String,
    /// Present only when the learner has weak areas.
    #[serde(default)]
    pub focus: Option<WeakAreaFocus>,
}

/// The external capabilities the learning state machine consumes.
///
/// Every method may fail; the machine reports the failure and stays put.
#[async_trait]
pub trait LearningAgents: Send + Sync {
    /// Refine free text into a canonical topic.
    async fn select_topic(&self, user_input: &str) -> anyhow::Result<String>;

    /// Retrieve videos and documentation for a topic.
    async fn fetch_content(&self, topic: &str) -> anyhow::Result<StudyContent>;

    /// Produce a five-question multiple-choice quiz.
    async fn generate_quiz(&self, request: &QuizRequest) -> anyhow::Result<Quiz>;

    /// Score a submission against the quiz's answer key.
    async fn evaluate(
        &self,
        quiz: &Quiz,
        answers: &Answers,
        documentation: &str,
    ) -> anyhow::Result<EvaluationResult>;

    /// Answer a learner's question from the study material.
    async fn answer_question(&self, documentation: &str, question: &str)
        -> anyhow::Result<String>;

    /// Suggest up to five topics to study after mastering `topic`.
    async fn suggest_related_topics(
        &self,
        topic: &str,
        documentation: &str,
    ) -> anyhow::Result<Vec<String>>;
}
