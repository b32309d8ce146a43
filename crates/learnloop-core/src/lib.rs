//! learnloop-core — Adaptive learning loop: state machine, mastery rules,
//! and the LLM-backed agents that feed it.
//!
//! The crate defines the session data model, the collaborator traits, and
//! the state machine that moves a learner from topic selection through
//! study, quizzes and evaluation until the topic is mastered.

pub mod agents;
pub mod error;
pub mod machine;
pub mod mastery;
pub mod model;
pub mod parser;
pub mod session;
pub mod traits;
