//! The `learnloop init` command.

use std::path::Path;

use anyhow::Result;

use learnloop_providers::config::LOCAL_CONFIG_FILE;

const EXAMPLE_QUIZ_PATH: &str = "quizzes/example.json";

pub fn execute() -> Result<()> {
    if Path::new(LOCAL_CONFIG_FILE).exists() {
        println!("{LOCAL_CONFIG_FILE} already exists, skipping.");
    } else {
        std::fs::write(LOCAL_CONFIG_FILE, SAMPLE_CONFIG)?;
        println!("Created {LOCAL_CONFIG_FILE}");
    }

    std::fs::create_dir_all("quizzes")?;
    let example_path = Path::new(EXAMPLE_QUIZ_PATH);
    if example_path.exists() {
        println!("{EXAMPLE_QUIZ_PATH} already exists, skipping.");
    } else {
        std::fs::write(example_path, EXAMPLE_QUIZ)?;
        println!("Created {EXAMPLE_QUIZ_PATH}");
    }

    println!("\nNext steps:");
    println!("  1. Export GEMINI_API_KEY (or edit {LOCAL_CONFIG_FILE})");
    println!("  2. Try grading: learnloop grade --quiz {EXAMPLE_QUIZ_PATH} --answers 1,0,2,1,3");
    println!("  3. Start learning: learnloop learn --topic \"rust ownership\"");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# learnloop configuration

default_provider = "gemini"
default_model = "gemini-2.5-flash"
temperature = 0.7
max_tokens = 4096
max_retries = 3
retry_delay_ms = 1000
video_limit = 10

[providers.gemini]
type = "gemini"
api_key = "${GEMINI_API_KEY}"

[providers.openai]
type = "openai"
api_key = "${OPENAI_API_KEY}"

[providers.ollama]
type = "ollama"
base_url = "http://localhost:11434"
"#;

const EXAMPLE_QUIZ: &str = r#"[
  {
    "question": "What happens to a String when it is assigned to another variable?",
    "options": ["It is copied", "Ownership moves to the new variable", "Both variables share it", "It is dropped"],
    "correct": 1,
    "explanation": "String does not implement Copy, so assignment moves ownership.",
    "area": "moves"
  },
  {
    "question": "How many mutable references to a value may exist at once?",
    "options": ["One", "Two", "Unlimited", "None"],
    "correct": 0,
    "explanation": "The borrow checker allows exactly one active mutable borrow.",
    "area": "borrowing"
  },
  {
    "question": "When is a value dropped?",
    "options": ["At program exit", "When garbage collected", "When its owner goes out of scope", "Never"],
    "correct": 2,
    "area": "scopes"
  },
  {
    "question": "Which type can be duplicated implicitly?",
    "options": ["Vec<u8>", "i32", "String", "Box<i32>"],
    "correct": 1,
    "area": "copy types"
  },
  {
    "question": "What does &T denote?",
    "options": ["A mutable borrow", "An owned T", "A raw pointer", "A shared borrow"],
    "correct": 3,
    "area": "borrowing"
  }
]
"#;
