//! Core data model types for learnloop.
//!
//! These are the types the state machine, the agent team, and the CLI share
//! to represent quizzes, submissions, evaluations, and study material.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Number of questions in every quiz.
pub const QUIZ_LENGTH: usize = 5;

/// Number of candidate answers per question.
pub const OPTIONS_PER_QUESTION: usize = 4;

/// The six states of a learning session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LearningState {
    /// Waiting for the learner to name a topic.
    TopicInput,
    /// Retrieving videos and documentation for the topic.
    FetchContent,
    /// Studying the material; questions may be asked.
    Learning,
    /// Producing a fresh quiz.
    GenerateQuiz,
    /// Waiting for the learner's answers.
    TakeQuiz,
    /// Showing results and waiting for the learner's next choice.
    Evaluate,
}

impl LearningState {
    /// States whose work runs as soon as they are entered.
    pub fn is_transient(self) -> bool {
        matches!(self, LearningState::FetchContent | LearningState::GenerateQuiz)
    }
}

impl fmt::Display for LearningState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LearningState::TopicInput => write!(f, "topic_input"),
            LearningState::FetchContent => write!(f, "fetch_content"),
            LearningState::Learning => write!(f, "learning"),
            LearningState::GenerateQuiz => write!(f, "generate_quiz"),
            LearningState::TakeQuiz => write!(f, "take_quiz"),
            LearningState::Evaluate => write!(f, "evaluate"),
        }
    }
}

impl FromStr for LearningState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "topic_input" => Ok(LearningState::TopicInput),
            "fetch_content" => Ok(LearningState::FetchContent),
            "learning" => Ok(LearningState::Learning),
            "generate_quiz" => Ok(LearningState::GenerateQuiz),
            "take_quiz" => Ok(LearningState::TakeQuiz),
            "evaluate" => Ok(LearningState::Evaluate),
            other => Err(format!("unknown learning state: {other}")),
        }
    }
}

/// Reasons a quiz is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuizError {
    #[error("quiz must have 5 questions, got {0}")]
    WrongLength(usize),

    #[error("question {index} must have 4 options, got {found}")]
    WrongOptionCount { index: usize, found: usize },

    #[error("question {index} marks option {correct} as correct, which does not exist")]
    CorrectOutOfRange { index: usize, correct: usize },

    #[error("question {0} has an empty prompt")]
    EmptyPrompt(usize),
}

/// A single multiple-choice question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizItem {
    /// The question text.
    pub prompt: String,
    /// Candidate answers.
    pub options: Vec<String>,
    /// Index of the correct option.
    pub correct: usize,
    /// Why the correct option is right.
    #[serde(default)]
    pub explanation: Option<String>,
    /// Short topic label this question exercises.
    #[serde(default)]
    pub area: Option<String>,
}

impl QuizItem {
    /// Label used when this question is missed.
    ///
    /// Falls back to the question text when no area label was supplied.
    pub fn weak_area_label(&self) -> &str {
        match self.area.as_deref().map(str::trim) {
            Some(area) if !area.is_empty() => area,
            _ => self.prompt.trim(),
        }
    }
}

/// An ordered five-question quiz. Always well-formed once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<QuizItem>", into = "Vec<QuizItem>")]
pub struct Quiz {
    items: Vec<QuizItem>,
}

impl Quiz {
    pub fn new(items: Vec<QuizItem>) -> Result<Self, QuizError> {
        if items.len() != QUIZ_LENGTH {
            return Err(QuizError::WrongLength(items.len()));
        }
        for (index, item) in items.iter().enumerate() {
            if item.prompt.trim().is_empty() {
                return Err(QuizError::EmptyPrompt(index));
            }
            if item.options.len() != OPTIONS_PER_QUESTION {
                return Err(QuizError::WrongOptionCount {
                    index,
                    found: item.options.len(),
                });
            }
            if item.correct >= OPTIONS_PER_QUESTION {
                return Err(QuizError::CorrectOutOfRange {
                    index,
                    correct: item.correct,
                });
            }
        }
        Ok(Self { items })
    }

    pub fn items(&self) -> &[QuizItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The index of the correct option for each question, in order.
    pub fn answer_key(&self) -> Vec<usize> {
        self.items.iter().map(|i| i.correct).collect()
    }
}

impl TryFrom<Vec<QuizItem>> for Quiz {
    type Error = QuizError;

    fn try_from(items: Vec<QuizItem>) -> Result<Self, Self::Error> {
        Quiz::new(items)
    }
}

impl From<Quiz> for Vec<QuizItem> {
    fn from(quiz: Quiz) -> Self {
        quiz.items
    }
}

/// Reasons a submission does not fit its quiz.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnswerError {
    #[error("expected {expected} answers, got {found}")]
    WrongCount { expected: usize, found: usize },

    #[error("answer {choice} for question {index} is not one of the options")]
    ChoiceOutOfRange { index: usize, choice: usize },

    #[error("invalid answer '{0}': use an option number or '-' to skip")]
    Unparseable(String),
}

/// The learner's choices, one per question. `None` means unanswered.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Answers(Vec<Option<usize>>);

impl Answers {
    pub fn new(choices: Vec<Option<usize>>) -> Self {
        Self(choices)
    }

    /// Parse a comma-separated list of zero-based choices; `-` skips a question.
    pub fn parse(s: &str) -> Result<Self, AnswerError> {
        s.split(',')
            .map(|part| {
                let part = part.trim();
                if part == "-" || part.is_empty() {
                    Ok(None)
                } else {
                    part.parse::<usize>()
                        .map(Some)
                        .map_err(|_| AnswerError::Unparseable(part.to_string()))
                }
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }

    pub fn choices(&self) -> &[Option<usize>] {
        &self.0
    }

    pub fn get(&self, index: usize) -> Option<usize> {
        self.0.get(index).copied().flatten()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Check that this submission has one in-range choice slot per question.
    pub fn validate_for(&self, quiz: &Quiz) -> Result<(), AnswerError> {
        if self.0.len() != quiz.len() {
            return Err(AnswerError::WrongCount {
                expected: quiz.len(),
                found: self.0.len(),
            });
        }
        for (index, (choice, item)) in self.0.iter().zip(quiz.items()).enumerate() {
            if let Some(choice) = *choice {
                if choice >= item.options.len() {
                    return Err(AnswerError::ChoiceOutOfRange { index, choice });
                }
            }
        }
        Ok(())
    }
}

/// Outcome of scoring one quiz submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// Score as a percentage in 0..=100.
    pub score_percentage: f64,
    /// Number of correct answers.
    pub correct: usize,
    /// Number of questions.
    pub total: usize,
    /// Zero-based indices of missed questions.
    pub missed: Vec<usize>,
    /// Topic labels drawn from missed questions.
    pub weak_areas: Vec<String>,
    /// Whether the score reached the mastery threshold.
    pub mastery: bool,
    /// Narrative feedback for the learner.
    #[serde(default)]
    pub feedback: String,
}

/// A video suggested as study material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Video {
    pub title: String,
    pub link: String,
    pub video_id: String,
    #[serde(default = "unknown")]
    pub channel: String,
    #[serde(default = "not_available")]
    pub duration: String,
    #[serde(default = "not_available")]
    pub views: String,
}

fn unknown() -> String {
    "Unknown".to_string()
}

fn not_available() -> String {
    "N/A".to_string()
}

/// Everything fetched for a topic before studying starts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudyContent {
    #[serde(default)]
    pub videos: Vec<Video>,
    pub documentation: String,
}

/// One question asked while studying, with its answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatExchange {
    pub question: String,
    pub answer: String,
}
