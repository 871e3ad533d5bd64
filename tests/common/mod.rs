//! Shared integration-test harness for running the `phantomfog` binary as a
//! child process.

#![allow(dead_code)]

use std::path::PathBuf;
use std::process::{Output, Stdio};
use std::time::Duration;

use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Upper bound for any single invocation.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// Path of a file under `tests/fixtures`.
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

/// Runs the binary with `args`, feeds `stdin`, closes it, and waits.
///
/// The child is killed if it outlives [`DEFAULT_TIMEOUT`].
#[allow(clippy::missing_panics_doc)]
pub async fn run_phantomfog(args: &[&str], stdin: &str) -> Output {
    let bin = env!("CARGO_BIN_EXE_phantomfog");
    let mut child = Command::new(bin)
        .args(args)
        .env_remove("PHANTOMFOG_LOG_LEVEL")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .expect("failed to spawn phantomfog");

    let mut pipe = child.stdin.take().expect("stdin not captured");
    pipe.write_all(stdin.as_bytes())
        .await
        .expect("failed to write stdin");
    drop(pipe);

    tokio::time::timeout(DEFAULT_TIMEOUT, child.wait_with_output())
        .await
        .expect("phantomfog did not exit in time")
        .expect("failed to collect output")
}

/// Parses every JSON line in `text`, skipping anything else (prompts,
/// console replies).
pub fn json_lines(text: &str) -> Vec<Value> {
    text.lines()
        .filter_map(|line| {
            let start = line.find('{')?;
            serde_json::from_str::<Value>(&line[start..]).ok()
        })
        .collect()
}

/// Events of a given `type`.
pub fn events_of<'a>(events: &'a [Value], kind: &str) -> Vec<&'a Value> {
    events.iter().filter(|e| e["type"] == kind).collect()
}
