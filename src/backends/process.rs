/*!
 * Child-process backend.
 *
 * Each call spawns the configured program, writes one JSON request to its
 * stdin, closes stdin, and reads one JSON response from stdout. A non-zero
 * exit status is a failure and stderr is kept as the diagnostic.
 * On unix each child runs in its own process group.
 */

use async_trait::async_trait;
use log::{debug, error};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::{
    check_version, ClassicalRequest, ClassicalResponse, ClassicalScorer, NeuralRequest,
    NeuralResponse, NeuralScorer, TranslateRequest, TranslateResponse, TranslationBackend,
};
use crate::app_config::BackendCommand;
use crate::errors::BackendError;

/// Longest stderr excerpt kept in an error
const MAX_STDERR_CHARS: usize = 2000;

/// External program invoked once per call
#[derive(Debug, Clone)]
pub struct ProcessBackend {
    program: String,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
}

impl ProcessBackend {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            working_dir: None,
        }
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn from_config(command: &BackendCommand) -> Self {
        Self {
            program: command.program.clone(),
            args: command.args.clone(),
            working_dir: command.working_dir.clone(),
        }
    }

    /// Children run in their own process group; a terminal Ctrl-C only reaches the pipeline
    fn base_command(&self) -> std::process::Command {
        #[allow(unused_mut)]
        let mut command = std::process::Command::new(&self.program);
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }
        command
    }

    /// Run the program with one JSON request and decode its JSON answer
    pub async fn invoke<Req, Resp>(&self, request: &Req) -> Result<Resp, BackendError>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let payload = serde_json::to_vec(request)
            .map_err(|e| BackendError::MalformedResponse(format!("cannot encode request: {}", e)))?;

        let mut command = Command::from(self.base_command());
        command
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        debug!("Spawning backend '{}' ({} byte request)", self.program, payload.len());

        let mut child = command
            .spawn()
            .map_err(|e| BackendError::Spawn(format!("{}: {}", self.program, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            if let Err(e) = stdin.write_all(&payload).await {
                // Programs may exit without reading stdin
                if e.kind() != std::io::ErrorKind::BrokenPipe {
                    return Err(BackendError::Spawn(format!(
                        "failed to write request to '{}': {}",
                        self.program, e
                    )));
                }
            }
            drop(stdin);
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| BackendError::Spawn(format!("failed to wait for '{}': {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = truncate(String::from_utf8_lossy(&output.stderr).trim());
            error!(
                "Backend '{}' exited with {:?}: {}",
                self.program,
                output.status.code(),
                stderr
            );
            return Err(BackendError::NonZeroExit {
                code: output.status.code(),
                stderr,
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        decode_response(&stdout)
    }
}

/// Decode the whole stdout, or failing that its last non-empty line
fn decode_response<Resp: DeserializeOwned>(stdout: &str) -> Result<Resp, BackendError> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Err(BackendError::MalformedResponse("empty output".to_string()));
    }

    match serde_json::from_str(trimmed) {
        Ok(response) => Ok(response),
        Err(first_error) => trimmed
            .lines()
            .rev()
            .find(|line| !line.trim().is_empty())
            .and_then(|line| serde_json::from_str(line.trim()).ok())
            .ok_or_else(|| BackendError::MalformedResponse(first_error.to_string())),
    }
}

fn truncate(text: &str) -> String {
    if text.chars().count() <= MAX_STDERR_CHARS {
        text.to_string()
    } else {
        let head: String = text.chars().take(MAX_STDERR_CHARS).collect();
        format!("{}...", head)
    }
}

#[async_trait]
impl TranslationBackend for ProcessBackend {
    async fn translate(&self, request: TranslateRequest) -> Result<TranslateResponse, BackendError> {
        let response: TranslateResponse = self.invoke(&request).await?;
        check_version(response.version)?;
        Ok(response)
    }
}

#[async_trait]
impl ClassicalScorer for ProcessBackend {
    async fn score(&self, request: ClassicalRequest) -> Result<ClassicalResponse, BackendError> {
        let response: ClassicalResponse = self.invoke(&request).await?;
        check_version(response.version)?;
        Ok(response)
    }
}

#[async_trait]
impl NeuralScorer for ProcessBackend {
    async fn score(&self, request: NeuralRequest) -> Result<NeuralResponse, BackendError> {
        let response: NeuralResponse = self.invoke(&request).await?;
        check_version(response.version)?;
        Ok(response)
    }
}
