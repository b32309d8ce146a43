//! The learning state machine.
//!
//! The transition table lives in the pure [`plan`] function; [`LearningMachine`]
//! executes a planned transition, calling the collaborator agents and updating
//! the session. A collaborator failure never moves the machine: the session
//! keeps its state and the error is returned to the caller.
//!
//! `FetchContent` and `GenerateQuiz` run their work as soon as they are
//! entered. If that work fails the machine rests in the transient state and
//! [`LearningMachine::resume`] retries it.

use std::sync::Arc;

use thiserror::Error;

use crate::mastery::{reconcile, EvaluationError, WEAK_AREA_MIN_SHARE};
use crate::model::{AnswerError, Answers, ChatExchange, LearningState};
use crate::session::LearningSession;
use crate::traits::{LearningAgents, QuizRequest, WeakAreaFocus};

/// Something the learner does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Name a topic to study.
    SubmitTopic(String),
    /// Done studying; take a quiz.
    Proceed,
    /// Ask about the study material.
    AskQuestion(String),
    NextVideo,
    PreviousVideo,
    /// Hand in the quiz.
    SubmitAnswers(Answers),
    /// Below mastery: new quiz focused on weak areas.
    Retake,
    /// Below mastery: go back to the material.
    Review,
    /// After mastery: start over with a new topic.
    NewTopic,
    /// After mastery: study one of the suggested topics (by index).
    RelatedTopic(usize),
    Quit,
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::SubmitTopic(_) => "submit topic",
            Action::Proceed => "proceed",
            Action::AskQuestion(_) => "ask question",
            Action::NextVideo => "next video",
            Action::PreviousVideo => "previous video",
            Action::SubmitAnswers(_) => "submit answers",
            Action::Retake => "retake",
            Action::Review => "review",
            Action::NewTopic => "new topic",
            Action::RelatedTopic(_) => "related topic",
            Action::Quit => "quit",
        }
    }
}

/// Where a planned action leads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Self-loop: the state does not change.
    Stay,
    /// Move to another state within the same session.
    Enter(LearningState),
    /// Discard the session and start a new one in the given state.
    Restart(LearningState),
    /// End the session.
    End,
}

/// What a successful action produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The machine now rests in this state.
    Entered(LearningState),
    /// Answer to a learner question.
    Answered(String),
    /// Index of the video now shown.
    VideoChanged(usize),
    /// The learner quit.
    Ended,
}

/// Errors from driving the machine. None of them change the session.
#[derive(Debug, Error)]
pub enum MachineError {
    #[error("'{action}' is not available in state {state}")]
    InvalidAction {
        state: LearningState,
        action: &'static str,
    },

    #[error("the session has ended")]
    SessionEnded,

    #[error("nothing to resume in state {0}")]
    NothingToResume(LearningState),

    #[error("topic must not be empty")]
    EmptyTopic,

    #[error("question must not be empty")]
    EmptyQuestion,

    #[error("there are no videos for this topic")]
    NoVideos,

    #[error("there is no quiz to answer")]
    NoQuiz,

    #[error("there is no related topic #{0}")]
    UnknownRelatedTopic(usize),

    #[error("invalid answers: {0}")]
    InvalidAnswers(#[from] AnswerError),

    #[error("evaluation rejected: {0}")]
    InconsistentEvaluation(#[from] EvaluationError),

    #[error("{operation} failed in state {state}")]
    Collaborator {
        state: LearningState,
        operation: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

/// The transition table.
///
/// `mastery` is the session's current mastery flag; it decides which of the
/// evaluation exits are open.
pub fn plan(
    state: LearningState,
    action: &Action,
    mastery: bool,
) -> Result<Transition, MachineError> {
    use LearningState::*;

    let transition = match (state, action) {
        (TopicInput, Action::SubmitTopic(_)) => Transition::Enter(FetchContent),
        (Learning, Action::Proceed) => Transition::Enter(GenerateQuiz),
        (Learning, Action::AskQuestion(_) | Action::NextVideo | Action::PreviousVideo) => {
            Transition::Stay
        }
        (TakeQuiz, Action::SubmitAnswers(_)) => Transition::Enter(Evaluate),
        (Evaluate, Action::Retake) if !mastery => Transition::Enter(GenerateQuiz),
        (Evaluate, Action::Review) if !mastery => Transition::Enter(Learning),
        (Evaluate, Action::NewTopic) if mastery => Transition::Restart(TopicInput),
        (Evaluate, Action::RelatedTopic(_)) if mastery => Transition::Restart(FetchContent),
        (Evaluate, Action::Quit) => Transition::End,
        _ => {
            return Err(MachineError::InvalidAction {
                state,
                action: action.name(),
            })
        }
    };
    Ok(transition)
}

/// Observer for session progress.
pub trait SessionObserver: Send + Sync {
    fn on_state_change(&self, from: LearningState, to: LearningState, session: &LearningSession);
    fn on_collaborator_start(&self, state: LearningState, operation: &str);
    fn on_collaborator_error(&self, state: LearningState, operation: &str, error: &str);
}

/// No-op observer.
pub struct NoopObserver;

impl SessionObserver for NoopObserver {
    fn on_state_change(&self, _: LearningState, _: LearningState, _: &LearningSession) {}
    fn on_collaborator_start(&self, _: LearningState, _: &str) {}
    fn on_collaborator_error(&self, _: LearningState, _: &str, _: &str) {}
}

/// Drives one learner through the study loop.
pub struct LearningMachine {
    agents: Arc<dyn LearningAgents>,
    observer: Arc<dyn SessionObserver>,
    session: LearningSession,
}

impl LearningMachine {
    pub fn new(agents: Arc<dyn LearningAgents>) -> Self {
        Self {
            agents,
            observer: Arc::new(NoopObserver),
            session: LearningSession::new(),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn session(&self) -> &LearningSession {
        &self.session
    }

    pub fn state(&self) -> LearningState {
        self.session.state()
    }

    /// Apply a learner action.
    ///
    /// The action does its own work first (naming the topic, grading the
    /// answers, answering a question). The transition from [`plan`] is
    /// applied only once that work has succeeded.
    pub async fn dispatch(&mut self, action: Action) -> Result<Outcome, MachineError> {
        if self.session.is_ended() {
            return Err(MachineError::SessionEnded);
        }
        let transition = plan(self.session.state(), &action, self.session.mastery())?;
        tracing::debug!(action = action.name(), ?transition, "dispatching");

        let mut next_topic = String::new();
        let mut self_loop = None;
        match action {
            Action::SubmitTopic(input) => self.select_topic(input).await?,
            Action::AskQuestion(question) => self_loop = Some(self.ask(question).await?),
            Action::NextVideo => self_loop = Some(self.step_video(true)?),
            Action::PreviousVideo => self_loop = Some(self.step_video(false)?),
            Action::SubmitAnswers(answers) => self.grade_answers(answers).await?,
            Action::RelatedTopic(index) => {
                next_topic = self
                    .session
                    .related_topics()
                    .get(index)
                    .cloned()
                    .ok_or(MachineError::UnknownRelatedTopic(index))?;
            }
            Action::Proceed
            | Action::Retake
            | Action::Review
            | Action::NewTopic
            | Action::Quit => {}
        }

        match transition {
            Transition::Stay => Ok(self_loop.unwrap_or(Outcome::Entered(self.session.state()))),
            Transition::Enter(to) => {
                self.move_to(to);
                self.run_pending().await
            }
            Transition::Restart(to) => {
                self.restart(LearningSession::starting_at(to, next_topic));
                self.run_pending().await
            }
            Transition::End => {
                self.session.end();
                tracing::info!(session = %self.session.id(), "session ended");
                Ok(Outcome::Ended)
            }
        }
    }

    /// Retry the work of a transient state after a collaborator failure.
    pub async fn resume(&mut self) -> Result<Outcome, MachineError> {
        if self.session.is_ended() {
            return Err(MachineError::SessionEnded);
        }
        let state = self.session.state();
        if !state.is_transient() {
            return Err(MachineError::NothingToResume(state));
        }
        self.run_pending().await
    }

    async fn select_topic(&mut self, input: String) -> Result<(), MachineError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(MachineError::EmptyTopic);
        }
        let agents = Arc::clone(&self.agents);
        let topic = self
            .call("select topic", agents.select_topic(input))
            .await?;
        self.session.set_topic(topic);
        Ok(())
    }

    async fn ask(&mut self, question: String) -> Result<Outcome, MachineError> {
        let question = question.trim().to_string();
        if question.is_empty() {
            return Err(MachineError::EmptyQuestion);
        }
        let agents = Arc::clone(&self.agents);
        let documentation = self.session.documentation().to_string();
        let answer = self
            .call(
                "answer question",
                agents.answer_question(&documentation, &question),
            )
            .await?;
        self.session.push_chat(ChatExchange {
            question,
            answer: answer.clone(),
        });
        Ok(Outcome::Answered(answer))
    }

    fn step_video(&mut self, forward: bool) -> Result<Outcome, MachineError> {
        self.session
            .step_video(forward)
            .map(Outcome::VideoChanged)
            .ok_or(MachineError::NoVideos)
    }

    async fn grade_answers(&mut self, answers: Answers) -> Result<(), MachineError> {
        let quiz = self.session.quiz().cloned().ok_or(MachineError::NoQuiz)?;
        answers.validate_for(&quiz)?;

        let agents = Arc::clone(&self.agents);
        let documentation = self.session.documentation().to_string();
        let result = self
            .call(
                "evaluate",
                agents.evaluate(&quiz, &answers, &documentation),
            )
            .await?;
        let result = reconcile(result, &quiz).inspect_err(|e| {
            tracing::warn!(session = %self.session.id(), "rejecting evaluation: {e}");
        })?;

        tracing::info!(
            session = %self.session.id(),
            score = result.score_percentage,
            mastery = result.mastery,
            weak_areas = result.weak_areas.len(),
            "quiz evaluated"
        );
        self.session.record_evaluation(answers, result);
        Ok(())
    }

    /// Suggestions are a convenience; failing to get them leaves the list empty.
    async fn suggest_related_topics(&mut self) {
        let agents = Arc::clone(&self.agents);
        let topic = self.session.topic().to_string();
        let documentation = self.session.documentation().to_string();
        match self
            .call(
                "suggest related topics",
                agents.suggest_related_topics(&topic, &documentation),
            )
            .await
        {
            Ok(topics) => self.session.set_related_topics(topics),
            Err(e) => tracing::warn!(session = %self.session.id(), "no related topics: {e}"),
        }
    }

    /// Run the work of the state just entered. Transient states move past
    /// themselves on success.
    async fn run_pending(&mut self) -> Result<Outcome, MachineError> {
        let agents = Arc::clone(&self.agents);
        match self.session.state() {
            LearningState::FetchContent => {
                let topic = self.session.topic().to_string();
                let content = self
                    .call("fetch content", agents.fetch_content(&topic))
                    .await?;
                tracing::info!(
                    session = %self.session.id(),
                    videos = content.videos.len(),
                    doc_chars = content.documentation.len(),
                    "content retrieved"
                );
                self.session.set_content(content);
                self.move_to(LearningState::Learning);
                Ok(Outcome::Entered(LearningState::Learning))
            }
            LearningState::GenerateQuiz => {
                let request = self.quiz_request();
                let quiz = self
                    .call("generate quiz", agents.generate_quiz(&request))
                    .await?;
                self.session.set_quiz(quiz);
                self.move_to(LearningState::TakeQuiz);
                Ok(Outcome::Entered(LearningState::TakeQuiz))
            }
            LearningState::Evaluate => {
                if self.session.mastery() {
                    self.suggest_related_topics().await;
                }
                Ok(Outcome::Entered(LearningState::Evaluate))
            }
            state => Ok(Outcome::Entered(state)),
        }
    }

    fn quiz_request(&self) -> QuizRequest {
        let weak_areas = self.session.weak_areas();
        QuizRequest {
            topic: self.session.topic().to_string(),
            documentation: self.session.documentation().to_string(),
            focus: (!weak_areas.is_empty()).then(|| WeakAreaFocus {
                areas: weak_areas.to_vec(),
                min_share: WEAK_AREA_MIN_SHARE,
            }),
        }
    }

    /// Await a collaborator, reporting it to the observer; failures become
    /// [`MachineError::Collaborator`] tagged with the current state.
    async fn call<T, F>(&self, operation: &'static str, fut: F) -> Result<T, MachineError>
    where
        F: std::future::Future<Output = anyhow::Result<T>>,
    {
        let state = self.session.state();
        self.observer.on_collaborator_start(state, operation);
        fut.await.map_err(|source| {
            tracing::warn!(
                session = %self.session.id(),
                %state,
                operation,
                "collaborator failed: {source:#}"
            );
            self.observer
                .on_collaborator_error(state, operation, &format!("{source:#}"));
            MachineError::Collaborator {
                state,
                operation,
                source,
            }
        })
    }

    fn move_to(&mut self, to: LearningState) {
        let from = self.session.state();
        if to == LearningState::GenerateQuiz {
            self.session.begin_attempt();
        }
        self.session.set_state(to);
        tracing::info!(session = %self.session.id(), %from, %to, "state transition");
        self.observer.on_state_change(from, to, &self.session);
    }

    fn restart(&mut self, session: LearningSession) {
        let from = self.session.state();
        tracing::info!(
            old = %self.session.id(),
            new = %session.id(),
            topic = session.topic(),
            "starting new session"
        );
        self.session = session;
        self.observer
            .on_state_change(from, self.session.state(), &self.session);
    }
}
