//! Generator subprocess invocation.
//!
//! A generator is an opaque external program that produces a media file
//! or fails. [`GeneratorInvocation`] captures everything the dispatch
//! path needs (program, args, cwd, env, timeout) as a value, so no
//! shared process state is mutated to run one. [`run`] spawns the
//! child, captures its output, and enforces the timeout; artifact
//! discovery and publication live here too since every generator shares
//! the "newest media file in the output directory" convention.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

/// Maximum stdout or stderr size captured per stream (10 MiB).
const MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

/// File extensions recognized as generator artifacts.
const MEDIA_EXTENSIONS: [&str; 6] = ["mp4", "webm", "gif", "png", "jpg", "jpeg"];

/// Everything needed to run one generator process.
#[derive(Debug, Clone)]
pub struct GeneratorInvocation {
    /// Program to execute (e.g. `python3`).
    pub program: String,
    /// Arguments, typically the generator entry script.
    pub args: Vec<String>,
    /// Working directory for the child (the generator's own directory).
    pub working_directory: Option<PathBuf>,
    /// Environment overrides (prompt, character, generation parameters).
    pub env_vars: Vec<(String, String)>,
    /// Maximum wall-clock time before the child is killed.
    pub timeout: Duration,
}

/// Captured output of a finished generator process.
#[derive(Debug, Clone)]
pub struct GeneratorOutput {
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

/// Errors surfaced by [`run`].
#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    #[error("Generator timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    #[error("Generator failed with exit code {exit_code}: {stderr}")]
    ExecutionFailed { exit_code: i32, stderr: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Spawn the generator, capture stdout/stderr, and enforce the timeout.
///
/// A non-zero exit code is an error carrying the captured stderr so the
/// caller can record it verbatim on the run.
pub async fn run(invocation: &GeneratorInvocation) -> Result<GeneratorOutput, GeneratorError> {
    let mut cmd = Command::new(&invocation.program);
    cmd.args(&invocation.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    for (key, value) in &invocation.env_vars {
        cmd.env(key, value);
    }
    if let Some(dir) = &invocation.working_directory {
        cmd.current_dir(dir);
    }

    let start = Instant::now();
    let mut child = cmd.spawn()?;

    // Read both streams in spawned tasks so `child.wait()` can borrow
    // `&mut child` concurrently.
    let stdout_handle = child.stdout.take();
    let stderr_handle = child.stderr.take();
    let stdout_task = tokio::spawn(async move { read_stream(stdout_handle).await });
    let stderr_task = tokio::spawn(async move { read_stream(stderr_handle).await });

    let wait_result = tokio::time::timeout(invocation.timeout, child.wait()).await;

    match wait_result {
        Ok(Ok(status)) => {
            let duration_ms = start.elapsed().as_millis() as u64;
            let stdout_bytes = stdout_task.await.unwrap_or_default();
            let stderr_bytes = stderr_task.await.unwrap_or_default();
            let stdout = String::from_utf8_lossy(&stdout_bytes).into_owned();
            let stderr = String::from_utf8_lossy(&stderr_bytes).into_owned();
            let exit_code = status.code().unwrap_or(-1);

            if exit_code != 0 {
                return Err(GeneratorError::ExecutionFailed { exit_code, stderr });
            }
            Ok(GeneratorOutput {
                stdout,
                stderr,
                duration_ms,
            })
        }
        Ok(Err(e)) => Err(GeneratorError::Io(e)),
        // Timeout expired; dropping `child` kills the process because of
        // `kill_on_drop(true)`.
        Err(_elapsed) => Err(GeneratorError::Timeout {
            elapsed_ms: start.elapsed().as_millis() as u64,
        }),
    }
}

/// Read an entire output stream, capped at [`MAX_OUTPUT_BYTES`].
async fn read_stream<R: AsyncRead + Unpin>(handle: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut h) = handle {
        let _ = (&mut h)
            .take(MAX_OUTPUT_BYTES as u64)
            .read_to_end(&mut buf)
            .await;
    }
    buf
}

/// Find the most-recently-modified media file in `dir`.
///
/// Generators drop their artifact into a known output directory rather
/// than reporting a path, so "newest media file" is the discovery
/// contract. Returns `Ok(None)` when the directory is missing or holds
/// no media.
pub fn newest_media_file(dir: &Path) -> std::io::Result<Option<PathBuf>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };

    let mut newest: Option<(std::time::SystemTime, PathBuf)> = None;
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if !is_media_file(&path) {
            continue;
        }
        let modified = entry.metadata()?.modified()?;
        match &newest {
            Some((best, _)) if *best >= modified => {}
            _ => newest = Some((modified, path)),
        }
    }
    Ok(newest.map(|(_, path)| path))
}

/// Copy `artifact` into `media_root` under a stable, timestamped name.
///
/// Returns the destination path. The media root is created if missing.
pub fn publish_artifact(
    artifact: &Path,
    media_root: &Path,
    task_name: &str,
) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(media_root)?;

    let ext = artifact
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("bin");
    let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
    let dest = media_root.join(format!("{task_name}_{timestamp}.{ext}"));
    std::fs::copy(artifact, &dest)?;
    Ok(dest)
}

fn is_media_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            MEDIA_EXTENSIONS
                .iter()
                .any(|m| m.eq_ignore_ascii_case(e))
        })
        .unwrap_or(false)
}
