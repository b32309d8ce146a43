//! The `learnloop grade` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};

use learnloop_core::mastery::{grade, MASTERY_THRESHOLD};
use learnloop_core::model::{Answers, EvaluationResult, Quiz};
use learnloop_core::parser::load_quiz;

pub fn execute(quiz_path: PathBuf, answers: String) -> Result<()> {
    let quiz = load_quiz(&quiz_path)?;
    let answers = Answers::parse(&answers)?;
    answers.validate_for(&quiz)?;

    let result = grade(&quiz, &answers);
    println!("{}", results_table(&quiz, &answers, &result));
    print_verdict(&result);
    Ok(())
}

/// One row per question: what was chosen, what was right.
pub fn results_table(quiz: &Quiz, answers: &Answers, result: &EvaluationResult) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["#", "Question", "Your answer", "Correct answer", "Result"]);

    for (i, item) in quiz.items().iter().enumerate() {
        let chosen = answers
            .get(i)
            .and_then(|c| item.options.get(c))
            .map(String::as_str)
            .unwrap_or("(skipped)");
        let verdict = if result.missed.contains(&i) {
            "missed"
        } else {
            "correct"
        };
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(&item.prompt),
            Cell::new(chosen),
            Cell::new(&item.options[item.correct]),
            Cell::new(verdict),
        ]);
    }
    table
}

pub fn print_verdict(result: &EvaluationResult) {
    println!(
        "Score: {:.1}% ({}/{})",
        result.score_percentage, result.correct, result.total
    );
    if result.mastery {
        println!("Mastery reached (>= {MASTERY_THRESHOLD}%).");
    } else {
        println!("Not mastered yet (need {MASTERY_THRESHOLD}%).");
        println!("Weak areas: {}", result.weak_areas.join("; "));
    }
}
