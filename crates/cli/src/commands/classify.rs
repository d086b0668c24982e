//! `vicagent classify` — Route recorded fragments through a turn accumulator.
//!
//! Input is JSON Lines: each line is one fragment object or an array of
//! them. Lines that are not JSON are logged and skipped.

use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;
use tracing::warn;
use vicagent_agent::TurnAccumulator;
use vicagent_config::AppConfig;

pub fn run(file: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let policy = AppConfig::load()
        .map(|c| c.agent.reasoning_policy)
        .unwrap_or_default();

    let input: Box<dyn Read> = match file {
        Some(path) => Box::new(
            std::fs::File::open(&path)
                .map_err(|e| format!("Failed to open {}: {e}", path.display()))?,
        ),
        None => Box::new(std::io::stdin()),
    };

    let mut accumulator = TurnAccumulator::new(policy);
    classify(BufReader::new(input), &mut accumulator)?;

    println!("answer:");
    println!("{}", accumulator.answer_text());
    println!();
    println!("thinking:");
    println!("{}", accumulator.thinking_text());
    Ok(())
}

/// Feed every line of `reader` into `accumulator`. Returns the number of
/// lines that parsed as JSON.
pub fn classify(reader: impl BufRead, accumulator: &mut TurnAccumulator) -> std::io::Result<usize> {
    let mut parsed = 0;
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<serde_json::Value>(&line) {
            Ok(value) => {
                accumulator.process_raw(&value);
                parsed += 1;
            }
            Err(e) => warn!(line = index + 1, error = %e, "Skipping line that is not JSON"),
        }
    }
    Ok(parsed)
}
