//! Learning session record with JSON transcript persistence.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::mastery::is_mastery;
use crate::model::{
    Answers, ChatExchange, EvaluationResult, LearningState, Quiz, StudyContent, Video,
};

/// Everything known about one learner working on one topic.
///
/// Fields are read-only outside this crate; only the state machine mutates
/// a session, so the mastery invariants cannot be bypassed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningSession {
    id: Uuid,
    started_at: DateTime<Utc>,
    topic: String,
    state: LearningState,
    attempts: u32,
    last_score: f64,
    weak_areas: Vec<String>,
    mastery: bool,
    #[serde(default)]
    content: Option<StudyContent>,
    #[serde(default)]
    current_video: usize,
    #[serde(default)]
    quiz: Option<Quiz>,
    #[serde(default)]
    answers: Option<Answers>,
    #[serde(default)]
    last_evaluation: Option<EvaluationResult>,
    #[serde(default)]
    chat_history: Vec<ChatExchange>,
    #[serde(default)]
    related_topics: Vec<String>,
    #[serde(default)]
    ended: bool,
}

impl Default for LearningSession {
    fn default() -> Self {
        Self::new()
    }
}

impl LearningSession {
    /// A fresh session waiting for a topic.
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            topic: String::new(),
            state: LearningState::TopicInput,
            attempts: 0,
            last_score: 0.0,
            weak_areas: Vec::new(),
            mastery: false,
            content: None,
            current_video: 0,
            quiz: None,
            answers: None,
            last_evaluation: None,
            chat_history: Vec::new(),
            related_topics: Vec::new(),
            ended: false,
        }
    }

    /// A fresh session on `topic` that begins in `state`.
    pub(crate) fn starting_at(state: LearningState, topic: String) -> Self {
        Self {
            topic,
            state,
            ..Self::new()
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn state(&self) -> LearningState {
        self.state
    }

    /// Number of quizzes generated so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn last_score(&self) -> f64 {
        self.last_score
    }

    pub fn weak_areas(&self) -> &[String] {
        &self.weak_areas
    }

    pub fn mastery(&self) -> bool {
        self.mastery
    }

    pub fn content(&self) -> Option<&StudyContent> {
        self.content.as_ref()
    }

    pub fn documentation(&self) -> &str {
        self.content
            .as_ref()
            .map(|c| c.documentation.as_str())
            .unwrap_or_default()
    }

    pub fn current_video(&self) -> Option<&Video> {
        self.content
            .as_ref()
            .and_then(|c| c.videos.get(self.current_video))
    }

    pub fn current_video_index(&self) -> usize {
        self.current_video
    }

    pub fn quiz(&self) -> Option<&Quiz> {
        self.quiz.as_ref()
    }

    pub fn answers(&self) -> Option<&Answers> {
        self.answers.as_ref()
    }

    pub fn last_evaluation(&self) -> Option<&EvaluationResult> {
        self.last_evaluation.as_ref()
    }

    pub fn chat_history(&self) -> &[ChatExchange] {
        &self.chat_history
    }

    pub fn related_topics(&self) -> &[String] {
        &self.related_topics
    }

    /// Whether the learner quit this session.
    pub fn is_ended(&self) -> bool {
        self.ended
    }

    pub(crate) fn set_state(&mut self, state: LearningState) {
        self.state = state;
    }

    pub(crate) fn set_topic(&mut self, topic: String) {
        self.topic = topic;
    }

    pub(crate) fn set_content(&mut self, content: StudyContent) {
        self.content = Some(content);
        self.current_video = 0;
    }

    pub(crate) fn begin_attempt(&mut self) {
        self.attempts += 1;
        self.quiz = None;
        self.answers = None;
    }

    pub(crate) fn set_quiz(&mut self, quiz: Quiz) {
        self.quiz = Some(quiz);
    }

    /// Store a reconciled evaluation; score, mastery and weak areas move together.
    pub(crate) fn record_evaluation(&mut self, answers: Answers, result: EvaluationResult) {
        self.last_score = result.score_percentage;
        self.mastery = is_mastery(result.score_percentage);
        self.weak_areas = if self.mastery {
            Vec::new()
        } else {
            result.weak_areas.clone()
        };
        self.related_topics.clear();
        self.answers = Some(answers);
        self.last_evaluation = Some(result);
    }

    pub(crate) fn set_related_topics(&mut self, topics: Vec<String>) {
        self.related_topics = topics;
    }

    pub(crate) fn push_chat(&mut self, exchange: ChatExchange) {
        self.chat_history.push(exchange);
    }

    /// Move the video cursor one place, wrapping around. Returns the new index.
    pub(crate) fn step_video(&mut self, forward: bool) -> Option<usize> {
        let count = self.content.as_ref().map(|c| c.videos.len()).unwrap_or(0);
        if count == 0 {
            return None;
        }
        self.current_video = if forward {
            (self.current_video + 1) % count
        } else {
            (self.current_video + count - 1) % count
        };
        Some(self.current_video)
    }

    pub(crate) fn end(&mut self) {
        self.ended = true;
    }

    /// Save the session as a JSON transcript.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize session")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write transcript to {}", path.display()))?;
        Ok(())
    }

    /// Load a session from a JSON transcript.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read transcript from {}", path.display()))?;
        let session: LearningSession =
            serde_json::from_str(&content).context("failed to parse transcript JSON")?;
        Ok(session)
    }
}
