//! `vicagent chat` — Interactive or single-message chat mode.

use std::io::Write;
use tokio::io::{self, AsyncBufReadExt, BufReader};
use vicagent_agent::{AgentStreamEvent, Session, TurnOutcome};
use vicagent_config::AppConfig;
use vicagent_core::fragment::{Fragment, ReasoningDelta};

const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";
const EXIT_WORDS: [&str; 3] = ["exit", "quit", "bye"];

pub async fn run(
    message: Option<String>,
    model: Option<String>,
    no_thinking: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    if let Some(model) = model {
        config.model = model;
    }
    if no_thinking {
        config.thinking.enabled = false;
    }
    config.validate()?;

    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    VICAGENT_API_KEY   = 'sk-ant-...'");
        eprintln!("    ANTHROPIC_API_KEY  = 'sk-ant-...'");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let session = Session::from_config(config).await?;

    if let Some(msg) = message {
        let outcome = session.ask(&msg).await?;
        println!("{}", outcome.answer);
        return Ok(());
    }

    println!();
    println!("  === VIC-20 Human Assistant ===");
    println!("  Model: {}", session.model());
    println!("  Type 'exit', 'quit', or 'bye' to end the conversation.");
    println!();

    let mut lines = BufReader::new(io::stdin()).lines();
    loop {
        print!("You: ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if is_exit(input) {
            break;
        }

        println!();
        print!("Assistant: ");
        let mut rx = session.send(input).await?;
        let mut renderer = ConsoleRenderer::new(std::io::stdout(), std::io::stderr());
        while let Some(event) = rx.recv().await {
            renderer.render(&event)?;
            if let Some(outcome) = TurnOutcome::from_event(&event) {
                session.complete_turn(input, &outcome).await?;
            }
        }
        println!();
    }

    println!("Goodbye!");
    Ok(())
}

fn is_exit(input: &str) -> bool {
    EXIT_WORDS.iter().any(|w| input.eq_ignore_ascii_case(w))
}

/// Prints a streamed turn: answer deltas to `out`, thinking dimmed to `err`.
pub struct ConsoleRenderer<O: Write, E: Write> {
    out: O,
    err: E,
    printed: usize,
}

impl<O: Write, E: Write> ConsoleRenderer<O, E> {
    pub fn new(out: O, err: E) -> Self {
        Self {
            out,
            err,
            printed: 0,
        }
    }

    pub fn render(&mut self, event: &AgentStreamEvent) -> std::io::Result<()> {
        match event {
            AgentStreamEvent::Fragment {
                answer_text,
                fragment,
                ..
            } => {
                if let Fragment::Reasoning(ReasoningDelta::Text(text)) = fragment {
                    write!(self.err, "{DIM}{text}{RESET}")?;
                    self.err.flush()?;
                }
                if let Some(delta) = answer_text.get(self.printed..)
                    && !delta.is_empty()
                {
                    write!(self.out, "{delta}")?;
                    self.printed = answer_text.len();
                }
            }
            AgentStreamEvent::ToolCall { name, input, .. } => {
                writeln!(self.out)?;
                writeln!(self.out, "• Using tool: {name} with input: {input}")?;
            }
            AgentStreamEvent::ToolResult {
                output, success, ..
            } => {
                if *success {
                    writeln!(self.out, "Tool output: {output}")?;
                } else {
                    writeln!(self.out, "Tool error: {output}")?;
                }
            }
            AgentStreamEvent::Done { .. } => writeln!(self.out)?,
            AgentStreamEvent::Error { message } => {
                writeln!(self.out)?;
                writeln!(self.err, "Error: {message}")?;
            }
        }
        self.out.flush()
    }

    pub fn into_inner(self) -> (O, E) {
        (self.out, self.err)
    }
}
