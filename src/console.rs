//! Interactive operator console.
//!
//! Reads one command per line and answers on the writer. The console is
//! the only place where targets change at runtime. `exit`, `stop` and end
//! of input all stop the engine.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::config::loader::validate_address;
use crate::engine::Engine;

/// Prompt printed before each command.
pub const PROMPT: &str = "fog> ";

/// One-line command reference, shown for unrecognized input.
pub const HELP: &str = "Commands: status, targets, add <ip>, remove <ip>, failures, exit";

const VERBS: [&str; 7] = ["status", "targets", "add", "remove", "failures", "exit", "stop"];

/// A parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Show rate and attack score.
    Status,
    /// List targets.
    Targets,
    /// Add a target.
    Add(String),
    /// Remove a target.
    Remove(String),
    /// Show failure counters.
    Failures,
    /// Stop the engine and leave.
    Exit,
    /// Blank line.
    Empty,
    /// Anything else, with the closest verb if one is near.
    Unknown {
        /// The verb as typed.
        verb: String,
        /// Closest known verb, if any.
        suggestion: Option<&'static str>,
    },
}

impl Command {
    /// Parses one input line. Verbs are case-insensitive; arguments are
    /// kept as typed.
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Empty;
        }
        let (verb, arg) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, Some(rest.trim())),
            None => (line, None),
        };

        match (verb.to_ascii_lowercase().as_str(), arg) {
            ("status", None) => Self::Status,
            ("targets", None) => Self::Targets,
            ("failures", None) => Self::Failures,
            ("exit" | "stop", None) => Self::Exit,
            ("add", Some(arg)) => Self::Add(arg.to_string()),
            ("remove", Some(arg)) => Self::Remove(arg.to_string()),
            (verb, _) => Self::Unknown {
                verb: verb.to_string(),
                suggestion: suggest_verb(verb),
            },
        }
    }
}

/// Closest known verb to `input`, if it is a plausible typo.
#[must_use]
pub fn suggest_verb(input: &str) -> Option<&'static str> {
    VERBS
        .iter()
        .map(|v| (*v, strsim::damerau_levenshtein(input, v)))
        .filter(|(v, dist)| *dist > 0 && *dist <= 2 && *dist < v.len())
        .min_by_key(|(_, dist)| *dist)
        .map(|(v, _)| v)
}

/// Runs the console until `exit`/`stop` or end of input.
///
/// # Errors
///
/// Returns an error if reading input or writing output fails. The engine
/// is stopped in that case too.
pub async fn run_console<R, W>(engine: &Engine, reader: R, mut writer: W) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    let reason = loop {
        writer.write_all(PROMPT.as_bytes()).await?;
        writer.flush().await?;

        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break "console closed",
            Err(e) => {
                engine.stop("console error");
                return Err(e);
            }
        };

        let command = Command::parse(&line);
        debug!(?command, "console command");
        if command == Command::Exit {
            break "operator exit";
        }
        let reply = execute(engine, command);
        if !reply.is_empty() {
            writer.write_all(reply.as_bytes()).await?;
            writer.write_all(b"\n").await?;
        }
    };

    engine.stop(reason);
    writer.write_all(b"stopping\n").await?;
    writer.flush().await
}

/// Applies a command to the engine and returns the text to print.
#[must_use]
pub fn execute(engine: &Engine, command: Command) -> String {
    let state = engine.state();
    match command {
        Command::Status => {
            let status = state.status();
            format!(
                "rate_per_min: {:.2}, attack_score: {:.2}, dry_run: {}",
                status.rate_per_min, status.attack_score, status.dry_run
            )
        }
        Command::Targets => {
            let targets = state.targets();
            if targets.is_empty() {
                "targets: (none)".to_string()
            } else {
                format!("targets: {}", targets.join(", "))
            }
        }
        Command::Add(target) => {
            if let Err(reason) = validate_address(&target) {
                return format!("cannot add '{target}': {reason}");
            }
            if engine.add_target(&target) {
                format!("added {target}")
            } else {
                format!("{target} is already a target")
            }
        }
        Command::Remove(target) => {
            if engine.remove_target(&target) {
                format!("removed {target}")
            } else {
                format!("{target} is not a target")
            }
        }
        Command::Failures => {
            let failures = state.failures();
            if failures.is_empty() {
                return "no failures recorded".to_string();
            }
            failures
                .iter()
                .map(|(t, n)| format!("{t}: {n}"))
                .collect::<Vec<_>>()
                .join("\n")
        }
        Command::Empty | Command::Exit => String::new(),
        Command::Unknown { suggestion, .. } => match suggestion {
            Some(verb) => format!("{HELP}\ndid you mean '{verb}'?"),
            None => HELP.to_string(),
        },
    }
}
