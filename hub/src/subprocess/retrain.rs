use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use super::tail_lines;

/// Lines of output kept for the response and the logs.
const TAIL_LINES: usize = 20;

/// Env var through which the training job finds the uploaded file.
pub const DATASET_ENV: &str = "UPLOADED_DATASET";

#[derive(Debug)]
pub enum RetrainError {
    /// No command configured.
    Empty,
    Spawn(String),
    Exit { code: Option<i32>, stderr_tail: String },
}

impl std::fmt::Display for RetrainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "no retrain command configured"),
            Self::Spawn(msg) => write!(f, "could not start retrain command: {msg}"),
            Self::Exit { code, stderr_tail } => match code {
                Some(c) => write!(f, "exit code {c}: {stderr_tail}"),
                None => write!(f, "terminated by signal: {stderr_tail}"),
            },
        }
    }
}

impl std::error::Error for RetrainError {}

/// Run the training command to completion.
///
/// `cmd[0]` is the program, the rest its arguments. Returns the stdout tail
/// on a zero exit.
pub async fn run_retrain(
    cmd: &[String],
    workdir: &Path,
    dataset: &Path,
) -> Result<String, RetrainError> {
    let (program, args) = cmd.split_first().ok_or(RetrainError::Empty)?;
    tracing::info!(program = %program, dataset = %dataset.display(), "Starting retrain");

    let output = Command::new(program)
        .args(args)
        .current_dir(workdir)
        .env(DATASET_ENV, dataset)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| RetrainError::Spawn(e.to_string()))?;

    let stdout_tail = tail_lines(&output.stdout, TAIL_LINES);
    if !output.status.success() {
        let stderr_tail = tail_lines(&output.stderr, TAIL_LINES);
        tracing::error!(code = ?output.status.code(), "Retrain failed: {stderr_tail}");
        return Err(RetrainError::Exit {
            code: output.status.code(),
            stderr_tail,
        });
    }

    tracing::info!("Retrain finished");
    Ok(stdout_tail)
}
