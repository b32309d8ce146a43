//! LLM-backed implementation of the collaborator agents.
//!
//! [`AgentTeam`] turns each [`LearningAgents`] operation into one prompt for an
//! [`LlmProvider`] and parses the reply. Grading never depends on the LLM;
//! the model only writes the feedback text.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tracing::instrument;

use crate::error::ProviderError;
use crate::mastery::grade;
use crate::model::{
    Answers, EvaluationResult, Quiz, StudyContent, OPTIONS_PER_QUESTION, QUIZ_LENGTH,
};
use crate::parser::{clean_topic, parse_quiz, parse_topic_list, MAX_RELATED_TOPICS};
use crate::traits::{
    GenerateRequest, LearningAgents, LlmProvider, NoVideoSearch, QuizRequest, ResponseFormat,
    VideoSearch,
};

/// Topic used when the model returns nothing usable.
pub const FALLBACK_TOPIC: &str = "General Topic";

const FEEDBACK_FALLBACK: &str = "Feedback not available.";

/// Upper bound for the retry backoff.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);

/// Settings for the agent team.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Model id passed to the provider.
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    /// Retries on transient provider errors.
    pub max_retries: u32,
    /// Initial delay between retries; doubles each time.
    pub retry_delay: Duration,
    /// Videos requested per topic.
    pub video_limit: usize,
    /// Weak areas named in a focused quiz prompt.
    pub max_focus_areas: usize,
    /// Characters of documentation quoted in feedback and suggestion prompts.
    pub excerpt_chars: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash".into(),
            temperature: 0.7,
            max_tokens: 4096,
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
            video_limit: 10,
            max_focus_areas: 3,
            excerpt_chars: 500,
        }
    }
}

/// The collaborators, backed by one LLM provider and a video source.
pub struct AgentTeam {
    provider: Arc<dyn LlmProvider>,
    videos: Arc<dyn VideoSearch>,
    config: AgentConfig,
}

impl AgentTeam {
    pub fn new(provider: Arc<dyn LlmProvider>, config: AgentConfig) -> Self {
        Self {
            provider,
            videos: Arc::new(NoVideoSearch),
            config,
        }
    }

    pub fn with_video_search(mut self, videos: Arc<dyn VideoSearch>) -> Self {
        self.videos = videos;
        self
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Send one prompt, retrying transient provider errors with exponential
    /// backoff. Authentication and unknown-model errors fail immediately.
    async fn complete(
        &self,
        system_prompt: &str,
        prompt: String,
        response_format: ResponseFormat,
    ) -> Result<String> {
        let request = GenerateRequest {
            model: self.config.model.clone(),
            prompt,
            system_prompt: Some(system_prompt.to_string()),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            response_format,
        };

        let mut last_error = None;
        let mut retry_delay = self.config.retry_delay;
        for retry in 0..=self.config.max_retries {
            if retry > 0 {
                tokio::time::sleep(retry_delay).await;
                retry_delay = (retry_delay * 2).min(MAX_RETRY_DELAY);
            }
            match self.provider.generate(&request).await {
                Ok(response) => {
                    tracing::debug!(
                        provider = self.provider.name(),
                        model = %response.model,
                        tokens = response.token_usage.total_tokens,
                        latency_ms = response.latency_ms,
                        "generation complete"
                    );
                    return Ok(response.content);
                }
                Err(e) => {
                    let provider_error = e.downcast_ref::<ProviderError>();
                    if provider_error.is_some_and(ProviderError::is_permanent) {
                        return Err(e);
                    }
                    if let Some(ms) = provider_error.and_then(ProviderError::retry_after_ms) {
                        retry_delay = Duration::from_millis(ms);
                    }
                    tracing::warn!(
                        provider = self.provider.name(),
                        retry,
                        max_retries = self.config.max_retries,
                        "generation failed: {e:#}"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("no generation attempts were made")))
    }

    fn excerpt<'a>(&self, documentation: &'a str) -> &'a str {
        match documentation.char_indices().nth(self.config.excerpt_chars) {
            Some((end, _)) => &documentation[..end],
            None => documentation,
        }
    }

    fn quiz_prompt(&self, request: &QuizRequest) -> String {
        let mut prompt = format!(
            "Study material on \"{topic}\":\n\n{docs}\n\n\
             Write {QUIZ_LENGTH} multiple-choice questions about this material, \
             each with exactly {OPTIONS_PER_QUESTION} options and one correct answer. \
             Vary the difficulty.",
            topic = request.topic,
            docs = request.documentation,
        );

        if let Some(focus) = &request.focus {
            let areas: Vec<&str> = focus
                .areas
                .iter()
                .take(self.config.max_focus_areas)
                .map(String::as_str)
                .collect();
            if !areas.is_empty() {
                let targeted = (focus.min_share * QUIZ_LENGTH as f64).ceil() as usize;
                prompt.push_str(&format!(
                    "\n\nThe learner struggled with: {}. At least {targeted} of the \
                     {QUIZ_LENGTH} questions must target these areas.",
                    areas.join("; ")
                ));
            }
        }

        prompt.push_str(
            "\n\nReply with ONLY a JSON array in this format:\n\
             [{\"question\": \"...\", \"options\": [\"A\", \"B\", \"C\", \"D\"], \
             \"correct\": 0, \"explanation\": \"...\", \"area\": \"short concept name\"}]\n\
             \"correct\" is the 0-based index of the right option.",
        );
        prompt
    }
}

fn non_empty(reply: String, what: &str) -> Result<String> {
    let reply = reply.trim();
    if reply.is_empty() {
        bail!("model returned an empty {what}");
    }
    Ok(reply.to_string())
}

#[async_trait]
impl LearningAgents for AgentTeam {
    #[instrument(skip(self))]
    async fn select_topic(&self, user_input: &str) -> Result<String> {
        let reply = self
            .complete(
                "You turn vague learning wishes into clear, specific study topics.",
                format!(
                    "Extract a clear, specific learning topic from: '{user_input}'. \
                     Reply with the topic name only."
                ),
                ResponseFormat::Text,
            )
            .await
            .context("topic selection failed")?;

        Ok(clean_topic(&reply).unwrap_or_else(|| FALLBACK_TOPIC.to_string()))
    }

    #[instrument(skip(self))]
    async fn fetch_content(&self, topic: &str) -> Result<StudyContent> {
        let docs = self.complete(
            "You write structured, beginner-friendly study notes with headings and examples.",
            format!(
                "Write study documentation about '{topic}' with these sections: \
                 Introduction, Core Concepts (with definitions), Practical Examples, \
                 Key Takeaways."
            ),
            ResponseFormat::Text,
        );
        let videos = self.videos.search(topic, self.config.video_limit);
        let (videos, docs) = futures::join!(videos, docs);

        let videos = videos.unwrap_or_else(|e| {
            tracing::warn!(topic, "video search failed: {e:#}");
            Vec::new()
        });
        let documentation = non_empty(
            docs.context("documentation generation failed")?,
            "documentation",
        )?;

        Ok(StudyContent {
            videos,
            documentation,
        })
    }

    #[instrument(skip_all, fields(topic = %request.topic, focused = request.focus.is_some()))]
    async fn generate_quiz(&self, request: &QuizRequest) -> Result<Quiz> {
        let reply = self
            .complete(
                "You write fair multiple-choice assessments and answer in strict JSON.",
                self.quiz_prompt(request),
                ResponseFormat::Json,
            )
            .await
            .context("quiz generation failed")?;

        parse_quiz(&reply)
    }

    #[instrument(skip_all)]
    async fn evaluate(
        &self,
        quiz: &Quiz,
        answers: &Answers,
        documentation: &str,
    ) -> Result<EvaluationResult> {
        let mut result = grade(quiz, answers);

        let missed = if result.missed.is_empty() {
            "none".to_string()
        } else {
            result
                .missed
                .iter()
                .map(|&i| format!("\"{}\"", quiz.items()[i].prompt))
                .collect::<Vec<_>>()
                .join(", ")
        };
        let prompt = format!(
            "A learner scored {correct}/{total} ({score:.1}%) on a quiz. \
             Questions missed: {missed}.\n\
             Material excerpt: {excerpt}...\n\n\
             Give encouraging feedback, name the specific areas to review, and say \
             whether they reached mastery (80% or more).",
            correct = result.correct,
            total = result.total,
            score = result.score_percentage,
            excerpt = self.excerpt(documentation),
        );

        result.feedback = match self
            .complete(
                "You are an honest, encouraging learning coach.",
                prompt,
                ResponseFormat::Text,
            )
            .await
        {
            Ok(reply) if !reply.trim().is_empty() => reply.trim().to_string(),
            Ok(_) => FEEDBACK_FALLBACK.to_string(),
            Err(e) => {
                tracing::warn!("feedback generation failed: {e:#}");
                FEEDBACK_FALLBACK.to_string()
            }
        };
        Ok(result)
    }

    #[instrument(skip(self, documentation))]
    async fn answer_question(&self, documentation: &str, question: &str) -> Result<String> {
        let reply = self
            .complete(
                "You answer study questions clearly, using the given material and examples. \
                 If a question goes beyond the material, say so but still help.",
                format!(
                    "Study material:\n\n{documentation}\n\n\
                     Question: {question}\n\nGive a clear, educational answer."
                ),
                ResponseFormat::Text,
            )
            .await
            .context("question answering failed")?;

        non_empty(reply, "answer")
    }

    #[instrument(skip(self, documentation))]
    async fn suggest_related_topics(
        &self,
        topic: &str,
        documentation: &str,
    ) -> Result<Vec<String>> {
        let reply = self
            .complete(
                "You plan learning paths and suggest what to study next.",
                format!(
                    "The learner has mastered '{topic}'. Material excerpt:\n\n{excerpt}...\n\n\
                     Suggest {MAX_RELATED_TOPICS} related topics to learn next. \
                     Reply with ONLY a numbered list, one topic per line.",
                    excerpt = self.excerpt(documentation),
                ),
                ResponseFormat::Text,
            )
            .await
            .context("related topic suggestion failed")?;

        Ok(parse_topic_list(&reply))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;
    use crate::model::fixtures::quiz;
    use crate::model::Video;
    use crate::traits::{GenerateResponse, ModelInfo, TokenUsage, WeakAreaFocus};

    /// Provider that replays queued replies and records every request.
    #[derive(Default)]
    struct ScriptedProvider {
        replies: Mutex<VecDeque<Result<String>>>,
        requests: Mutex<Vec<GenerateRequest>>,
    }

    impl ScriptedProvider {
        fn with(replies: Vec<Result<String>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::default(),
            })
        }

        fn requests(&self) -> Vec<GenerateRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse> {
            self.requests.lock().unwrap().push(request.clone());
            let content = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(String::new()))?;
            Ok(GenerateResponse {
                content,
                model: request.model.clone(),
                token_usage: TokenUsage::default(),
                latency_ms: 1,
            })
        }

        fn available_models(&self) -> Vec<ModelInfo> {
            vec![]
        }
    }

    struct FixedVideos(Result<Vec<Video>, String>);

    #[async_trait]
    impl VideoSearch for FixedVideos {
        async fn search(&self, query: &str, limit: usize) -> Result<Vec<Video>> {
            match &self.0 {
                Ok(videos) => Ok(videos
                    .iter()
                    .take(limit)
                    .map(|v| Video {
                        title: format!("{query}: {}", v.title),
                        ..v.clone()
                    })
                    .collect()),
                Err(msg) => bail!("{msg}"),
            }
        }
    }

    fn video(id: &str) -> Video {
        Video {
            title: format!("video {id}"),
            link: format!("https://www.youtube.com/watch?v={id}"),
            video_id: id.into(),
            channel: "Unknown".into(),
            duration: "N/A".into(),
            views: "N/A".into(),
        }
    }

    fn team(provider: Arc<ScriptedProvider>) -> AgentTeam {
        AgentTeam::new(
            provider,
            AgentConfig {
                model: "test-model".into(),
                max_retries: 2,
                retry_delay: Duration::from_millis(10),
                ..AgentConfig::default()
            },
        )
    }

    const QUIZ_REPLY: &str = r#"```json
[
  {"question": "Q1?", "options": ["a","b","c","d"], "correct": 0, "area": "basics"},
  {"question": "Q2?", "options": ["a","b","c","d"], "correct": 1},
  {"question": "Q3?", "options": ["a","b","c","d"], "correct": 2},
  {"question": "Q4?", "options": ["a","b","c","d"], "correct": 3},
  {"question": "Q5?", "options": ["a","b","c","d"], "correct": 0}
]
```"#;

    #[tokio::test]
    async fn select_topic_cleans_reply() {
        let provider = ScriptedProvider::with(vec![Ok("**Rust Ownership**\n".into())]);
        let topic = team(provider.clone()).select_topic("rust memory stuff").await.unwrap();
        assert_eq!(topic, "Rust Ownership");

        let request = &provider.requests()[0];
        assert!(request.prompt.contains("rust memory stuff"));
        assert_eq!(request.model, "test-model");
        assert!(request.system_prompt.is_some());
    }

    #[tokio::test]
    async fn select_topic_falls_back_on_blank_reply() {
        let provider = ScriptedProvider::with(vec![Ok("   \n".into())]);
        let topic = team(provider).select_topic("???").await.unwrap();
        assert_eq!(topic, FALLBACK_TOPIC);
    }

    #[tokio::test]
    async fn fetch_content_combines_videos_and_docs() {
        let provider = ScriptedProvider::with(vec![Ok("# Intro\nTraits...".into())]);
        let videos = Arc::new(FixedVideos(Ok(vec![video("a"), video("b"), video("c")])));
        let team = AgentTeam::new(
            provider,
            AgentConfig {
                video_limit: 2,
                ..AgentConfig::default()
            },
        )
        .with_video_search(videos);

        let content = team.fetch_content("Traits").await.unwrap();
        assert_eq!(content.documentation, "# Intro\nTraits...");
        assert_eq!(content.videos.len(), 2);
        assert_eq!(content.videos[0].title, "Traits: video a");
    }

    #[tokio::test]
    async fn fetch_content_survives_video_failure() {
        let provider = ScriptedProvider::with(vec![Ok("docs".into())]);
        let team = team(provider).with_video_search(Arc::new(FixedVideos(Err("blocked".into()))));

        let content = team.fetch_content("Traits").await.unwrap();
        assert!(content.videos.is_empty());
        assert_eq!(content.documentation, "docs");
    }

    #[tokio::test]
    async fn fetch_content_fails_without_docs() {
        let provider = ScriptedProvider::with(vec![Ok("  ".into())]);
        assert!(team(provider).fetch_content("Traits").await.is_err());
    }

    #[tokio::test]
    async fn generate_quiz_parses_fenced_reply() {
        let provider = ScriptedProvider::with(vec![Ok(QUIZ_REPLY.into())]);
        let request = QuizRequest {
            topic: "Rust".into(),
            documentation: "docs".into(),
            focus: None,
        };
        let quiz = team(provider.clone()).generate_quiz(&request).await.unwrap();
        assert_eq!(quiz.answer_key(), vec![0, 1, 2, 3, 0]);

        let sent = &provider.requests()[0];
        assert_eq!(sent.response_format, ResponseFormat::Json);
        assert!(!sent.prompt.contains("struggled"));
    }

    #[tokio::test]
    async fn focused_quiz_prompt_names_capped_areas() {
        let provider = ScriptedProvider::with(vec![Ok(QUIZ_REPLY.into())]);
        let request = QuizRequest {
            topic: "Rust".into(),
            documentation: "docs".into(),
            focus: Some(WeakAreaFocus {
                areas: vec!["lifetimes".into(), "traits".into(), "macros".into(), "async".into()],
                min_share: 0.6,
            }),
        };
        team(provider.clone()).generate_quiz(&request).await.unwrap();

        let prompt = &provider.requests()[0].prompt;
        assert!(prompt.contains("lifetimes; traits; macros"));
        assert!(!prompt.contains("async"));
        assert!(prompt.contains("At least 3 of the 5 questions"));
    }

    #[tokio::test]
    async fn generate_quiz_rejects_bad_shape() {
        let provider = ScriptedProvider::with(vec![Ok("[]".into())]);
        let request = QuizRequest {
            topic: "Rust".into(),
            documentation: "docs".into(),
            focus: None,
        };
        assert!(team(provider).generate_quiz(&request).await.is_err());
    }

    #[tokio::test]
    async fn evaluate_grades_locally_and_adds_feedback() {
        let provider = ScriptedProvider::with(vec![Ok("Nice work!".into())]);
        let docs = "x".repeat(2_000);
        let result = team(provider.clone())
            .evaluate(&quiz(), &Answers::parse("0,1,2,0,0").unwrap(), &docs)
            .await
            .unwrap();

        assert_eq!(result.score_percentage, 80.0);
        assert!(result.mastery);
        assert_eq!(result.missed, vec![3]);
        assert_eq!(result.feedback, "Nice work!");

        let prompt = &provider.requests()[0].prompt;
        assert!(prompt.contains("4/5 (80.0%)"));
        assert!(prompt.contains("\"Question 3?\""));
        assert!(prompt.contains(&"x".repeat(500)));
        assert!(!prompt.contains(&"x".repeat(501)));
    }

    #[tokio::test(start_paused = true)]
    async fn evaluate_keeps_score_when_feedback_fails() {
        let provider = ScriptedProvider::with(vec![
            Err(ProviderError::NetworkError("down".into()).into()),
            Err(ProviderError::NetworkError("down".into()).into()),
            Err(ProviderError::NetworkError("down".into()).into()),
        ]);
        let result = team(provider)
            .evaluate(&quiz(), &Answers::parse("-,-,-,-,-").unwrap(), "docs")
            .await
            .unwrap();
        assert_eq!(result.score_percentage, 0.0);
        assert_eq!(result.weak_areas.len(), 5);
        assert_eq!(result.feedback, FEEDBACK_FALLBACK);
    }

    #[tokio::test]
    async fn answer_question_uses_documentation() {
        let provider = ScriptedProvider::with(vec![Ok(" A borrow is a reference. ".into())]);
        let answer = team(provider.clone())
            .answer_question("Borrowing notes", "What is a borrow?")
            .await
            .unwrap();
        assert_eq!(answer, "A borrow is a reference.");
        let prompt = &provider.requests()[0].prompt;
        assert!(prompt.contains("Borrowing notes"));
        assert!(prompt.contains("What is a borrow?"));
    }

    #[tokio::test]
    async fn related_topics_are_parsed() {
        let reply = "1. Lifetimes\n2. Smart pointers\n3. Concurrency\n4. Unsafe\n5. FFI\n6. Extra";
        let provider = ScriptedProvider::with(vec![Ok(reply.into())]);
        let topics = team(provider)
            .suggest_related_topics("Ownership", "docs")
            .await
            .unwrap();
        assert_eq!(topics.len(), 5);
        assert_eq!(topics[1], "Smart pointers");
    }

    #[tokio::test(start_paused = true)]
    async fn transient_errors_are_retried() {
        let provider = ScriptedProvider::with(vec![
            Err(ProviderError::Timeout(120).into()),
            Err(ProviderError::RateLimited { retry_after_ms: 5 }.into()),
            Ok("Rust".into()),
        ]);
        let topic = team(provider.clone()).select_topic("rust").await.unwrap();
        assert_eq!(topic, "Rust");
        assert_eq!(provider.requests().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_errors_are_not_retried() {
        let provider = ScriptedProvider::with(vec![
            Err(ProviderError::AuthenticationFailed("bad key".into()).into()),
            Ok("never reached".into()),
        ]);
        let err = team(provider.clone()).select_topic("rust").await.unwrap_err();
        assert_eq!(provider.requests().len(), 1);
        assert!(err
            .chain()
            .any(|c| c.downcast_ref::<ProviderError>().is_some()));
    }

    #[tokio::test(start_paused = true)]
    async fn retries_give_up_after_limit() {
        let provider = ScriptedProvider::with(
            (0..5)
                .map(|_| Err(ProviderError::NetworkError("reset".into()).into()))
                .collect(),
        );
        let err = team(provider.clone())
            .answer_question("docs", "why?")
            .await
            .unwrap_err();
        assert_eq!(provider.requests().len(), 3);
        assert!(format!("{err:#}").contains("reset"));
    }
}
