//! Generic child-process worker: spawn, send one JSON request line, await
//! one JSON response line, with a per-call timeout and SIGTERM-then-SIGKILL
//! escalation on timeout or cancellation. Every call goes through the same
//! finalizer so a cancelled call and a timed-out call leave the process in
//! the same state.

use std::process::Stdio;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::error::{EngineError, Result, WorkerError};

/// Bound on how much stderr is retained for a failure report.
const STDERR_RING_BYTES: usize = 10 * 1024;

pub const EMBEDDER_TIMEOUT: Duration = Duration::from_secs(300);
pub const RERANKER_TIMEOUT: Duration = Duration::from_secs(30);
pub const CLUSTERER_TIMEOUT: Duration = Duration::from_secs(300);
pub const TERMINATION_GRACE: Duration = Duration::from_secs(5);

/// Configuration for one worker invocation.
pub struct WorkerSpec {
    pub name: String,
    pub command: Vec<String>,
    pub call_timeout: Duration,
    pub grace: Duration,
}

/// Send one request to a freshly spawned worker process and parse its
/// response. The worker is expected to write exactly one line of JSON to
/// stdout and exit; if it writes other lines too (stray diagnostics before
/// or after the real response), scan backward from the last line and parse
/// the first one that is valid JSON.
pub async fn call<Req: Serialize, Resp: DeserializeOwned>(
    spec: &WorkerSpec,
    request: &Req,
) -> Result<Resp> {
    let program = spec
        .command
        .first()
        .ok_or_else(|| WorkerError::Unavailable(format!("{}: empty command", spec.name)))?;

    let mut cmd = Command::new(program);
    cmd.args(&spec.command[1..]);
    cmd.stdin(Stdio::piped());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    let mut child = cmd.spawn().map_err(|e| {
        WorkerError::Unavailable(format!("{}: failed to spawn: {e}", spec.name))
    })?;

    let payload = serde_json::to_vec(request).map_err(EngineError::Serialization)?;
    if let Some(mut stdin) = child.stdin.take() {
        if let Err(e) = stdin.write_all(&payload).await {
            finalize(&mut child, spec.grace).await;
            return Err(WorkerError::Failed { worker: spec.name.clone(), reason: e.to_string() }.into());
        }
        if let Err(e) = stdin.write_all(b"\n").await {
            finalize(&mut child, spec.grace).await;
            return Err(WorkerError::Failed { worker: spec.name.clone(), reason: e.to_string() }.into());
        }
        drop(stdin);
    }

    let run = run_and_read(&mut child);
    match timeout(spec.call_timeout, run).await {
        Ok(Ok(lines)) => {
            finalize(&mut child, spec.grace).await;
            parse_last_valid_json(&lines).map_err(|reason| {
                WorkerError::ParseError { worker: spec.name.clone(), reason }.into()
            })
        }
        Ok(Err(stderr_tail)) => {
            finalize(&mut child, spec.grace).await;
            Err(WorkerError::Failed { worker: spec.name.clone(), reason: stderr_tail }.into())
        }
        Err(_) => {
            warn!(worker = %spec.name, "call timed out, escalating to SIGTERM");
            terminate(&mut child, spec.grace).await;
            Err(WorkerError::Timeout { worker: spec.name.clone(), elapsed_ms: spec.call_timeout.as_millis() as u64 }.into())
        }
    }
}

/// Reads stdout to completion, returning every non-empty line in order.
/// On empty stdout, returns the captured stderr tail as an error so the
/// caller can surface a meaningful failure reason.
async fn run_and_read(child: &mut Child) -> std::result::Result<Vec<String>, String> {
    let stdout = child.stdout.take().expect("stdout piped");
    let stderr = child.stderr.take().expect("stderr piped");

    let mut stdout_lines = BufReader::new(stdout).lines();
    let mut lines = Vec::new();
    while let Ok(Some(line)) = stdout_lines.next_line().await {
        if !line.trim().is_empty() {
            lines.push(line);
        }
    }

    if lines.is_empty() {
        Err(read_stderr_tail(stderr).await)
    } else {
        Ok(lines)
    }
}

/// Scan `lines` from the end and return the first one that parses as
/// `Resp`, so a trailing diagnostic line after the real JSON response
/// doesn't shadow it. Errs with the last parse failure seen if no line
/// parses.
fn parse_last_valid_json<Resp: DeserializeOwned>(lines: &[String]) -> std::result::Result<Resp, String> {
    let mut last_err = None;
    for line in lines.iter().rev() {
        match serde_json::from_str::<Resp>(line) {
            Ok(resp) => return Ok(resp),
            Err(e) => last_err = Some(e.to_string()),
        }
    }
    Err(last_err.unwrap_or_else(|| "worker produced no stdout lines to parse".to_string()))
}

async fn read_stderr_tail(stderr: tokio::process::ChildStderr) -> String {
    let mut lines = BufReader::new(stderr).lines();
    let mut tail = String::new();
    while let Ok(Some(line)) = lines.next_line().await {
        tail.push_str(&line);
        tail.push('\n');
        if tail.len() > STDERR_RING_BYTES {
            let excess = tail.len() - STDERR_RING_BYTES;
            tail.drain(0..excess);
        }
    }
    if tail.is_empty() {
        "worker produced no output on stdout or stderr".to_string()
    } else {
        tail
    }
}

/// Wait briefly for a natural exit, otherwise escalate.
async fn finalize(child: &mut Child, grace: Duration) {
    match timeout(grace, child.wait()).await {
        Ok(_) => {}
        Err(_) => terminate(child, grace).await,
    }
}

/// SIGTERM, wait up to `grace`, then SIGKILL. Settles exactly once: if the
/// process already exited, `kill`/`wait` are no-ops.
async fn terminate(child: &mut Child, grace: Duration) {
    if let Some(pid) = child.id() {
        send_sigterm(pid);
    }
    if timeout(grace, child.wait()).await.is_err() {
        debug!("worker did not exit after SIGTERM, sending SIGKILL");
        let _ = child.start_kill();
        let _ = child.wait().await;
    }
}

#[cfg(unix)]
fn send_sigterm(pid: u32) {
    unsafe {
        libc::kill(pid as libc::pid_t, libc::SIGTERM);
    }
}

#[cfg(not(unix))]
fn send_sigterm(_pid: u32) {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Serialize)]
    struct Echo {
        value: i32,
    }

    #[derive(Deserialize, Debug, PartialEq)]
    struct EchoResponse {
        value: i32,
    }

    fn spec(command: Vec<String>) -> WorkerSpec {
        WorkerSpec {
            name: "test-worker".to_string(),
            command,
            call_timeout: Duration::from_secs(2),
            grace: Duration::from_millis(200),
        }
    }

    #[tokio::test]
    async fn test_call_parses_response_preceded_by_stray_line() {
        let s = spec(vec![
            "sh".to_string(),
            "-c".to_string(),
            "echo not-json; echo '{\"value\":7}'".to_string(),
        ]);
        let resp: EchoResponse = call(&s, &Echo { value: 1 }).await.unwrap();
        assert_eq!(resp, EchoResponse { value: 7 });
    }

    #[tokio::test]
    async fn test_call_parses_response_followed_by_trailing_diagnostic() {
        let s = spec(vec![
            "sh".to_string(),
            "-c".to_string(),
            "echo '{\"value\":7}'; echo done".to_string(),
        ]);
        let resp: EchoResponse = call(&s, &Echo { value: 1 }).await.unwrap();
        assert_eq!(resp, EchoResponse { value: 7 });
    }

    #[tokio::test]
    async fn test_missing_binary_is_unavailable_error() {
        let s = spec(vec!["docprov-engine-nonexistent-worker-binary".to_string()]);
        let result: Result<EchoResponse> = call(&s, &Echo { value: 1 }).await;
        assert!(matches!(result, Err(EngineError::Worker(WorkerError::Unavailable(_)))));
    }

    #[tokio::test]
    async fn test_timeout_is_reported_as_worker_timeout() {
        let s = WorkerSpec {
            name: "slow-worker".to_string(),
            command: vec!["sleep".to_string(), "5".to_string()],
            call_timeout: Duration::from_millis(100),
            grace: Duration::from_millis(100),
        };
        let result: Result<EchoResponse> = call(&s, &Echo { value: 1 }).await;
        assert!(matches!(result, Err(EngineError::Worker(WorkerError::Timeout { .. }))));
    }

    #[tokio::test]
    async fn test_empty_output_surfaces_stderr_tail() {
        let s = spec(vec!["sh".to_string(), "-c".to_string(), "echo oops 1>&2".to_string()]);
        let result: Result<EchoResponse> = call(&s, &Echo { value: 1 }).await;
        match result {
            Err(EngineError::Worker(WorkerError::Failed { reason, .. })) => {
                assert!(reason.contains("oops"));
            }
            other => panic!("expected Failed, got {other:?}"),
        }
    }
}
