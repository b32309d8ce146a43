//! Mastery rule and deterministic grading.
//!
//! Mastery is a single comparison: a score of at least [`MASTERY_THRESHOLD`]
//! percent. Everything else here derives the data that rule needs.

use thiserror::Error;

use crate::model::{Answers, EvaluationResult, Quiz};

/// Minimum percentage that counts as mastery.
pub const MASTERY_THRESHOLD: f64 = 80.0;

/// Minimum share of a retake quiz that must target weak areas.
pub const WEAK_AREA_MIN_SHARE: f64 = 0.6;

/// Whether a score reaches mastery.
pub fn is_mastery(score_percentage: f64) -> bool {
    score_percentage >= MASTERY_THRESHOLD
}

/// Percentage of correct answers; 0 for an empty quiz.
pub fn score_percentage(correct: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    correct as f64 / total as f64 * 100.0
}

/// Weak-area labels for the given missed questions, deduplicated, in quiz order.
pub fn weak_areas_for(quiz: &Quiz, missed: &[usize]) -> Vec<String> {
    let mut areas: Vec<String> = Vec::new();
    for &index in missed {
        if let Some(item) = quiz.items().get(index) {
            let label = item.weak_area_label();
            if !areas.iter().any(|a| a == label) {
                areas.push(label.to_string());
            }
        }
    }
    areas
}

/// Grade a submission against the quiz's answer key.
///
/// Unanswered questions count as missed. The returned result has empty
/// feedback.
pub fn grade(quiz: &Quiz, answers: &Answers) -> EvaluationResult {
    let missed: Vec<usize> = quiz
        .items()
        .iter()
        .enumerate()
        .filter(|(i, item)| answers.get(*i) != Some(item.correct))
        .map(|(i, _)| i)
        .collect();

    let total = quiz.len();
    let correct = total - missed.len();
    let score = score_percentage(correct, total);
    let mastery = is_mastery(score);
    let weak_areas = if mastery {
        Vec::new()
    } else {
        weak_areas_for(quiz, &missed)
    };

    EvaluationResult {
        score_percentage: score,
        correct,
        total,
        missed,
        weak_areas,
        mastery,
        feedback: String::new(),
    }
}

/// Reasons an evaluation cannot be accepted.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvaluationError {
    #[error("score {0} is outside 0-100")]
    ScoreOutOfRange(f64),

    #[error("missed question {index} does not exist in a {total}-question quiz")]
    MissedOutOfRange { index: usize, total: usize },

    #[error("score {0:.1}% is below mastery but no questions were missed")]
    NoWeakAreas(f64),

    #[error("{correct} correct and {missed} missed do not add up to {total} questions")]
    CountMismatch {
        correct: usize,
        missed: usize,
        total: usize,
    },
}

/// Bring a collaborator's evaluation in line with the mastery invariants.
///
/// Mastery is recomputed from the score. Weak areas are re-derived from the
/// missed indices when below mastery, and cleared at or above it. Every
/// question must be counted exactly once as correct or missed; the reported
/// score is kept as is.
pub fn reconcile(
    mut result: EvaluationResult,
    quiz: &Quiz,
) -> Result<EvaluationResult, EvaluationError> {
    let score = result.score_percentage;
    if !(0.0..=100.0).contains(&score) {
        return Err(EvaluationError::ScoreOutOfRange(score));
    }
    if let Some(&index) = result.missed.iter().find(|&&i| i >= quiz.len()) {
        return Err(EvaluationError::MissedOutOfRange {
            index,
            total: quiz.len(),
        });
    }

    result.total = quiz.len();
    result.mastery = is_mastery(score);
    if result.mastery {
        result.weak_areas.clear();
    } else {
        let areas = weak_areas_for(quiz, &result.missed);
        if areas.is_empty() {
            return Err(EvaluationError::NoWeakAreas(score));
        }
        result.weak_areas = areas;
    }
    if result.correct + result.missed.len() != quiz.len() {
        return Err(EvaluationError::CountMismatch {
            correct: result.correct,
            missed: result.missed.len(),
            total: quiz.len(),
        });
    }
    Ok(result)
}
