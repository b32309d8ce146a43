//! Parsers for LLM replies.
//!
//! Turns quiz JSON (possibly wrapped in markdown fences) into a validated
//! [`Quiz`], and numbered topic lists into plain strings.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::model::{Quiz, QuizItem};

/// Maximum number of related topics kept from a reply.
pub const MAX_RELATED_TOPICS: usize = 5;

/// Quiz item as LLMs tend to write it.
#[derive(Debug, Deserialize)]
struct RawQuizItem {
    #[serde(alias = "prompt")]
    question: String,
    options: Vec<String>,
    #[serde(alias = "answer", alias = "correct_index")]
    correct: usize,
    #[serde(default)]
    explanation: Option<String>,
    #[serde(default, alias = "topic")]
    area: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawQuiz {
    Items(Vec<RawQuizItem>),
    Wrapped { questions: Vec<RawQuizItem> },
}

/// Extract the JSON payload from a possibly markdown-formatted reply.
///
/// Handles:
/// - ```json``` fenced blocks (preferred)
/// - Generic ``` blocks
/// - Truncated (unclosed) fences
/// - Raw JSON surrounded by prose (outermost `[...]` or `{...}`)
pub fn extract_json_payload(response: &str) -> String {
    let mut json_blocks = Vec::new();
    let mut generic_blocks = Vec::new();
    let mut in_block = false;
    let mut is_json_block = false;
    let mut current_block = String::new();

    for line in response.lines() {
        let trimmed = line.trim();

        if !in_block && trimmed.starts_with("```") {
            in_block = true;
            let lang = trimmed.trim_start_matches('`').trim().to_lowercase();
            is_json_block = lang == "json";
            current_block.clear();
            continue;
        }

        if in_block && trimmed == "```" {
            in_block = false;
            if is_json_block {
                json_blocks.push(current_block.clone());
            } else {
                generic_blocks.push(current_block.clone());
            }
            current_block.clear();
            continue;
        }

        if in_block {
            if !current_block.is_empty() {
                current_block.push('\n');
            }
            current_block.push_str(line);
        }
    }

    if in_block && !current_block.is_empty() {
        if is_json_block {
            json_blocks.push(current_block);
        } else {
            generic_blocks.push(current_block);
        }
    }

    if let Some(block) = json_blocks.into_iter().next() {
        return block.trim().to_string();
    }
    if let Some(block) = generic_blocks.into_iter().next() {
        return block.trim().to_string();
    }

    outermost_json(response)
        .unwrap_or(response)
        .trim()
        .to_string()
}

/// The span from the first opening bracket to the matching last closing one.
fn outermost_json(s: &str) -> Option<&str> {
    let start = s.find(['[', '{'])?;
    let close = if s[start..].starts_with('[') { ']' } else { '}' };
    let end = s.rfind(close)?;
    (end > start).then(|| &s[start..=end])
}

/// Parse an LLM reply into a validated quiz.
pub fn parse_quiz(response: &str) -> Result<Quiz> {
    let payload = extract_json_payload(response);
    let raw: RawQuiz = serde_json::from_str(&payload).context("quiz reply is not valid JSON")?;
    let raw_items = match raw {
        RawQuiz::Items(items) => items,
        RawQuiz::Wrapped { questions } => questions,
    };

    let items = raw_items
        .into_iter()
        .map(|r| QuizItem {
            prompt: r.question.trim().to_string(),
            options: r.options,
            correct: r.correct,
            explanation: r.explanation,
            area: r.area,
        })
        .collect();

    Quiz::new(items).context("quiz reply has the wrong shape")
}

/// Load a quiz from a JSON file in the same format LLMs are asked for.
pub fn load_quiz(path: &Path) -> Result<Quiz> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read quiz file: {}", path.display()))?;
    parse_quiz(&content).with_context(|| format!("failed to parse quiz: {}", path.display()))
}

/// Parse a numbered or bulleted list of topics.
///
/// Only lines starting with a list marker (`1.`, `1)`, `-` or `*` followed by
/// whitespace) count. Exactly one marker is stripped and at most
/// [`MAX_RELATED_TOPICS`] topics are kept.
pub fn parse_topic_list(response: &str) -> Vec<String> {
    response
        .lines()
        .filter_map(|line| strip_list_marker(line.trim()))
        .map(|topic| topic.trim_matches('*').trim().to_string())
        .filter(|topic| !topic.is_empty())
        .take(MAX_RELATED_TOPICS)
        .collect()
}

/// The text after a single leading list marker, if the line has one.
fn strip_list_marker(line: &str) -> Option<&str> {
    let rest = match line.strip_prefix(['-', '*']) {
        Some(rest) => rest,
        None => {
            let number = line.trim_start_matches(|c: char| c.is_ascii_digit());
            if number.len() == line.len() {
                return None;
            }
            number.strip_prefix(['.', ')'])?
        }
    };
    rest.starts_with(char::is_whitespace)
        .then(|| rest.trim_start())
}

/// Reduce an LLM topic reply to a single clean line.
pub fn clean_topic(response: &str) -> Option<String> {
    let line = response.lines().map(str::trim).find(|l| !l.is_empty())?;
    let cleaned = line
        .trim_start_matches('#')
        .trim()
        .trim_matches(|c| matches!(c, '*' | '"' | '\'' | '`'))
        .trim();
    (!cleaned.is_empty()).then(|| cleaned.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUIZ_JSON: &str = r#"[
  {"question": "What does ownership prevent?", "options": ["Leaks", "Data races", "Typos", "Nothing"], "correct": 1, "explanation": "Aliasing XOR mutation."},
  {"question": "Which keyword borrows mutably?", "options": ["mut", "&mut", "ref", "let"], "correct": 1, "area": "borrowing"},
  {"question": "What is a lifetime?", "options": ["A scope", "A region", "A type", "A trait"], "correct": 1},
  {"question": "Box allocates where?", "options": ["Stack", "Heap", "Static", "Register"], "correct": 1},
  {"question": "Rc is for?", "options": ["Threads", "Shared ownership", "IO", "Macros"], "correct": 1}
]"#;

    #[test]
    fn parse_plain_array() {
        let quiz = parse_quiz(QUIZ_JSON).unwrap();
        assert_eq!(quiz.len(), 5);
        assert_eq!(quiz.items()[1].area.as_deref(), Some("borrowing"));
        assert_eq!(
            quiz.items()[0].explanation.as_deref(),
            Some("Aliasing XOR mutation.")
        );
    }

    #[test]
    fn parse_fenced_json() {
        let reply = format!("Here is your quiz:\n\n```json\n{QUIZ_JSON}\n```\nGood luck!");
        let quiz = parse_quiz(&reply).unwrap();
        assert_eq!(quiz.answer_key(), vec![1, 1, 1, 1, 1]);
    }

    #[test]
    fn parse_prose_wrapped_json() {
        let reply = format!("Sure! {QUIZ_JSON} Let me know if you want more.");
        assert!(parse_quiz(&reply).is_ok());
    }

    #[test]
    fn parse_wrapped_object() {
        let reply = format!("{{\"questions\": {QUIZ_JSON}}}");
        assert_eq!(parse_quiz(&reply).unwrap().len(), 5);
    }

    #[test]
    fn parse_rejects_short_quiz() {
        let reply = r#"[{"question": "Only?", "options": ["a","b","c","d"], "correct": 0}]"#;
        let err = parse_quiz(reply).unwrap_err();
        assert!(format!("{err:#}").contains("5 questions"), "got: {err:#}");
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(parse_quiz("I cannot make a quiz about that.").is_err());
    }

    #[test]
    fn extract_truncated_fence() {
        let reply = "```json\n[1, 2, 3]";
        assert_eq!(extract_json_payload(reply), "[1, 2, 3]");
    }

    #[test]
    fn extract_prefers_json_fence() {
        let reply = "```\nnot this\n```\n\n```json\n{\"a\": 1}\n```";
        assert_eq!(extract_json_payload(reply), "{\"a\": 1}");
    }

    #[test]
    fn topic_list_markers_are_stripped() {
        let reply = "Great job! Next steps:\n\
                     1. Traits and generics\n\
                     2) Error handling\n\
                     - **Async Rust**\n\
                     * Macros\n\
                     Not a list line\n\
                     5. Unsafe Rust\n\
                     6. One too many";
        assert_eq!(
            parse_topic_list(reply),
            vec![
                "Traits and generics",
                "Error handling",
                "Async Rust",
                "Macros",
                "Unsafe Rust"
            ]
        );
    }

    #[test]
    fn topic_list_keeps_leading_digits_and_dots() {
        let reply = "1. 3D graphics with wgpu\n2. .NET interop\n3. 2-phase commit\n- 10x engineering";
        assert_eq!(
            parse_topic_list(reply),
            vec![
                "3D graphics with wgpu",
                ".NET interop",
                "2-phase commit",
                "10x engineering"
            ]
        );
    }

    #[test]
    fn topic_list_ignores_unmarked_numbers() {
        assert!(parse_topic_list("2024 was a good year\n**Bold heading**").is_empty());
    }

    #[test]
    fn topic_list_empty_reply() {
        assert!(parse_topic_list("").is_empty());
        assert!(parse_topic_list("1.\n-\n").is_empty());
    }

    #[test]
    fn clean_topic_strips_decoration() {
        assert_eq!(
            clean_topic("\n**Python List Comprehensions**\nextra"),
            Some("Python List Comprehensions".into())
        );
        assert_eq!(clean_topic("## \"Photosynthesis\""), Some("Photosynthesis".into()));
        assert_eq!(clean_topic("   \n  "), None);
    }

    #[test]
    fn load_quiz_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quiz.json");
        std::fs::write(&path, QUIZ_JSON).unwrap();
        assert_eq!(load_quiz(&path).unwrap().len(), 5);
        assert!(load_quiz(&dir.path().join("missing.json")).is_err());
    }
}
