//! learnloop CLI — interactive study sessions in the terminal.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "learnloop",
    version,
    about = "Adaptive study loop: learn a topic, take quizzes, repeat until mastered"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive learning session
    Learn {
        /// Topic to start with (prompted for if omitted)
        #[arg(long)]
        topic: Option<String>,

        /// Provider name from the config (default: config's default_provider)
        #[arg(long)]
        provider: Option<String>,

        /// Model id (default: config's default_model)
        #[arg(long)]
        model: Option<String>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,

        /// Directory to save a JSON transcript of the session into
        #[arg(long)]
        transcript: Option<PathBuf>,
    },

    /// Grade answers against a quiz JSON file
    Grade {
        /// Quiz JSON file (array of questions)
        #[arg(long)]
        quiz: PathBuf,

        /// Chosen option per question, 0-based, "-" to skip (e.g. "0,1,-,3,2")
        #[arg(long)]
        answers: String,
    },

    /// List available models
    ListModels {
        /// Filter to specific provider
        #[arg(long)]
        provider: Option<String>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Create a starter config and an example quiz
    Init,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("learnloop=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Learn {
            topic,
            provider,
            model,
            config,
            transcript,
        } => commands::learn::execute(topic, provider, model, config, transcript).await,
        Commands::Grade { quiz, answers } => commands::grade::execute(quiz, answers),
        Commands::ListModels { provider, config } => {
            commands::list_models::execute(provider, config).await
        }
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
