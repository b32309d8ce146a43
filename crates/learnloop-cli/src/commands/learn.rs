//! The `learnloop learn` command: an interactive study session on stdin.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};

use learnloop_core::agents::AgentTeam;
use learnloop_core::machine::{Action, LearningMachine, Outcome, SessionObserver};
use learnloop_core::model::{Answers, LearningState, Quiz};
use learnloop_core::session::LearningSession;
use learnloop_providers::config::load_config_from;
use learnloop_providers::create_provider;

use super::grade::{print_verdict, results_table};

const LEARNING_MENU: &str =
    "[q]uiz me  [a] <question>  [n]ext video  [p]revious video  [d]ocs  e[x]it > ";

/// Console observer: shows collaborator progress on stderr.
struct ConsoleObserver;

impl SessionObserver for ConsoleObserver {
    fn on_state_change(&self, _from: LearningState, to: LearningState, session: &LearningSession) {
        if to == LearningState::GenerateQuiz {
            eprintln!("  Preparing quiz (attempt {})", session.attempts());
        }
    }

    fn on_collaborator_start(&self, _state: LearningState, operation: &str) {
        eprintln!("  ... {operation}");
    }

    fn on_collaborator_error(&self, _state: LearningState, operation: &str, error: &str) {
        eprintln!("  ! {operation}: {error}");
    }
}

/// Line-oriented prompt over any async reader.
struct Console<R> {
    lines: Lines<R>,
}

impl<R: AsyncBufRead + Unpin> Console<R> {
    fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
        }
    }

    /// Print `prompt` and read one trimmed line; `None` at end of input.
    async fn ask(&mut self, prompt: &str) -> Result<Option<String>> {
        print!("{prompt}");
        std::io::stdout().flush()?;
        let line = self.lines.next_line().await?;
        if line.is_none() {
            println!();
        }
        Ok(line.map(|l| l.trim().to_string()))
    }
}

pub async fn execute(
    topic: Option<String>,
    provider: Option<String>,
    model: Option<String>,
    config_path: Option<PathBuf>,
    transcript_dir: Option<PathBuf>,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;

    let provider_name = provider.unwrap_or_else(|| config.default_provider.clone());
    let provider_config = config.providers.get(&provider_name).with_context(|| {
        let mut available: Vec<&String> = config.providers.keys().collect();
        available.sort();
        format!(
            "provider '{provider_name}' not found in config. Available: {available:?}. \
             Run `learnloop init` or set GEMINI_API_KEY."
        )
    })?;
    let model = model.unwrap_or_else(|| config.default_model.clone());
    tracing::info!(provider = %provider_name, %model, "starting learning session");

    let agents = AgentTeam::new(create_provider(provider_config), config.agent_config(&model));
    let mut machine =
        LearningMachine::new(Arc::new(agents)).with_observer(Arc::new(ConsoleObserver));

    println!(
        "learnloop v{} — {provider_name}/{model}",
        env!("CARGO_PKG_VERSION")
    );

    let mut console = Console::new(BufReader::new(tokio::io::stdin()));
    drive(&mut machine, &mut console, topic).await?;

    if let Some(dir) = transcript_dir {
        let session = machine.session();
        let path = dir.join(format!(
            "session-{}-{}.json",
            session.started_at().format("%Y-%m-%dT%H%M%S"),
            session.id()
        ));
        session.save_json(&path)?;
        tracing::info!(
            session = %session.id(),
            path = %path.display(),
            "transcript saved"
        );
    }

    Ok(())
}

/// Run the session until the learner quits or input ends.
async fn drive<R: AsyncBufRead + Unpin>(
    machine: &mut LearningMachine,
    console: &mut Console<R>,
    mut initial_topic: Option<String>,
) -> Result<()> {
    while !machine.session().is_ended() {
        let step = match machine.state() {
            LearningState::TopicInput => {
                let topic = match initial_topic.take() {
                    Some(topic) => topic,
                    None => match console.ask("What do you want to learn? ").await? {
                        Some(topic) => topic,
                        None => break,
                    },
                };
                machine.dispatch(Action::SubmitTopic(topic)).await
            }
            LearningState::FetchContent | LearningState::GenerateQuiz => {
                match console.ask("[r]etry or e[x]it > ").await?.as_deref() {
                    Some("r") => machine.resume().await,
                    Some("x") | None => break,
                    Some(_) => continue,
                }
            }
            LearningState::Learning => {
                let Some(line) = console.ask(LEARNING_MENU).await? else {
                    break;
                };
                match learning_command(&line) {
                    LearningCommand::Act(action) => machine.dispatch(action).await,
                    LearningCommand::ShowDocs => {
                        println!("\n{}\n", machine.session().documentation());
                        continue;
                    }
                    LearningCommand::Exit => break,
                    LearningCommand::Unknown => {
                        println!("Unknown command: {line}");
                        continue;
                    }
                }
            }
            LearningState::TakeQuiz => {
                let Some(quiz) = machine.session().quiz().cloned() else {
                    break;
                };
                let Some(answers) = take_quiz(console, &quiz).await? else {
                    break;
                };
                machine.dispatch(Action::SubmitAnswers(answers)).await
            }
            LearningState::Evaluate => {
                let menu = if machine.session().mastery() {
                    "[n]ew topic  [1-5] related topic  [q]uit > "
                } else {
                    "[r]etake quiz  [s]tudy again  [q]uit > "
                };
                let Some(line) = console.ask(menu).await? else {
                    break;
                };
                match evaluate_command(&line) {
                    Some(action) => machine.dispatch(action).await,
                    None => {
                        println!("Unknown command: {line}");
                        continue;
                    }
                }
            }
        };

        match step {
            Ok(outcome) => show_outcome(machine.session(), &outcome),
            Err(e) => eprintln!("  ! {e}"),
        }
    }
    Ok(())
}

#[derive(Debug, PartialEq)]
enum LearningCommand {
    Act(Action),
    ShowDocs,
    Exit,
    Unknown,
}

fn learning_command(line: &str) -> LearningCommand {
    let (head, rest) = line.split_once(' ').unwrap_or((line, ""));
    match head {
        "q" | "quiz" => LearningCommand::Act(Action::Proceed),
        "a" | "ask" => LearningCommand::Act(Action::AskQuestion(rest.trim().to_string())),
        "n" | "next" => LearningCommand::Act(Action::NextVideo),
        "p" | "prev" => LearningCommand::Act(Action::PreviousVideo),
        "d" | "docs" => LearningCommand::ShowDocs,
        "x" | "exit" => LearningCommand::Exit,
        _ => LearningCommand::Unknown,
    }
}

fn evaluate_command(line: &str) -> Option<Action> {
    match line {
        "r" | "retake" => Some(Action::Retake),
        "s" | "study" => Some(Action::Review),
        "n" | "new" => Some(Action::NewTopic),
        "q" | "quit" => Some(Action::Quit),
        other => other
            .parse::<usize>()
            .ok()
            .filter(|&n| n >= 1)
            .map(|n| Action::RelatedTopic(n - 1)),
    }
}

/// `a`-`d` picks an option, blank or `-` skips.
fn parse_choice(input: &str, option_count: usize) -> Option<Option<usize>> {
    let input = input.trim().to_ascii_lowercase();
    if input.is_empty() || input == "-" {
        return Some(None);
    }
    let mut chars = input.chars();
    let (Some(c), None) = (chars.next(), chars.next()) else {
        return None;
    };
    let index = (c as usize).checked_sub('a' as usize)?;
    (index < option_count).then_some(Some(index))
}

async fn take_quiz<R: AsyncBufRead + Unpin>(
    console: &mut Console<R>,
    quiz: &Quiz,
) -> Result<Option<Answers>> {
    let mut choices = Vec::with_capacity(quiz.len());
    for (i, item) in quiz.items().iter().enumerate() {
        println!("\nQ{}. {}", i + 1, item.prompt);
        for (o, option) in item.options.iter().enumerate() {
            println!("   {}) {option}", (b'a' + o as u8) as char);
        }
        loop {
            let Some(line) = console.ask("Answer (blank to skip) > ").await? else {
                return Ok(None);
            };
            match parse_choice(&line, item.options.len()) {
                Some(choice) => {
                    choices.push(choice);
                    break;
                }
                None => println!("Pick one of the listed letters."),
            }
        }
    }
    Ok(Some(Answers::new(choices)))
}

fn show_outcome(session: &LearningSession, outcome: &Outcome) {
    match outcome {
        Outcome::Entered(LearningState::Learning) => {
            println!("\n== {} ==", session.topic());
            if let Some(content) = session.content() {
                if content.videos.is_empty() {
                    println!("No videos found.");
                }
                for (i, video) in content.videos.iter().enumerate() {
                    let marker = if i == session.current_video_index() {
                        ">"
                    } else {
                        " "
                    };
                    println!(
                        "{marker} {}. {} ({}, {}) {}",
                        i + 1,
                        video.title,
                        video.channel,
                        video.duration,
                        video.link
                    );
                }
                println!("\n{}\n", content.documentation);
            }
        }
        Outcome::Entered(LearningState::TakeQuiz) => {
            println!("\nQuiz time! Attempt {}.", session.attempts());
        }
        Outcome::Entered(LearningState::Evaluate) => {
            if let (Some(quiz), Some(answers), Some(result)) = (
                session.quiz(),
                session.answers(),
                session.last_evaluation(),
            ) {
                println!("\n{}", results_table(quiz, answers, result));
                print_verdict(result);
                println!("\n{}\n", result.feedback);
            }
            if !session.related_topics().is_empty() {
                println!("Related topics:");
                for (i, topic) in session.related_topics().iter().enumerate() {
                    println!("  {}. {topic}", i + 1);
                }
            }
        }
        Outcome::Entered(LearningState::TopicInput) => println!("\nStarting a new topic."),
        Outcome::Entered(state) => println!("Now in {state}."),
        Outcome::Answered(answer) => println!("\n{answer}\n"),
        Outcome::VideoChanged(_) => {
            if let Some(video) = session.current_video() {
                println!("Now playing: {} {}", video.title, video.link);
            }
        }
        Outcome::Ended => println!(
            "Session ended after {} attempt(s). Last score: {:.1}%.",
            session.attempts(),
            session.last_score()
        ),
    }
}
