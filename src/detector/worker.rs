//! # Detector Worker Module
//!
//! The model lives in a separate long-lived process so its weights are loaded
//! exactly once. This module spawns that process, waits for its handshake and
//! exchanges one JSON line per inference over its stdin/stdout.

use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::config::DetectorConfig;
use super::errors::DetectorError;
use super::protocol::{InferenceRequest, WorkerHandshake, WorkerResponse};

/// A running detector worker
///
/// The child is killed when the handle is dropped, so discarding a worker
/// after a timeout or a broken pipe never leaves an orphan behind.
#[derive(Debug)]
pub struct WorkerProcess {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    names: Vec<String>,
}

impl WorkerProcess {
    /// Spawn the worker and wait for its handshake line
    ///
    /// # Errors
    ///
    /// Returns [`DetectorError::Initialization`] if the command cannot be
    /// started, the worker reports it is not ready, or the handshake does not
    /// arrive within the load timeout.
    pub async fn spawn(config: &DetectorConfig) -> Result<Self, DetectorError> {
        info!(
            command = %config.command,
            args = ?config.args,
            weights = %config.weights_path.display(),
            "Starting detector worker"
        );

        let mut child = Command::new(&config.command)
            .args(&config.args)
            .env("MODEL_PATH", &config.weights_path)
            .env("IMAGE_SIZE", config.image_size.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                DetectorError::Initialization(format!(
                    "failed to start detector worker `{}`: {e}",
                    config.command
                ))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| DetectorError::Initialization("worker stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DetectorError::Initialization("worker stdout unavailable".to_string()))?;
        let mut stdout = BufReader::new(stdout).lines();

        let load_timeout = config.recovery.load_timeout();
        let line = match timeout(load_timeout, stdout.next_line()).await {
            Ok(Ok(Some(line))) => line,
            Ok(Ok(None)) => {
                return Err(DetectorError::Initialization(
                    "worker exited before completing its handshake".to_string(),
                ))
            }
            Ok(Err(e)) => {
                return Err(DetectorError::Initialization(format!(
                    "failed to read worker handshake: {e}"
                )))
            }
            Err(_) => {
                return Err(DetectorError::Initialization(format!(
                    "worker did not load the model within {}s",
                    load_timeout.as_secs()
                )))
            }
        };

        let handshake: WorkerHandshake = serde_json::from_str(&line).map_err(|e| {
            DetectorError::Initialization(format!("invalid worker handshake `{line}`: {e}"))
        })?;
        let names = handshake.into_names()?;

        info!(
            pid = child.id().unwrap_or_default(),
            classes = names.len(),
            "Detector worker ready"
        );

        Ok(Self {
            child,
            stdin,
            stdout,
            names,
        })
    }

    /// Class names announced in the handshake
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Send one inference request and read its response line
    ///
    /// Not cancel-safe: if the future is dropped midway the worker's pipe is
    /// out of step and the process must be discarded.
    pub async fn infer(
        &mut self,
        image: &Path,
        output_dir: &Path,
        image_size: u32,
    ) -> Result<WorkerResponse, DetectorError> {
        let request = InferenceRequest {
            image,
            output_dir,
            image_size,
        };
        let mut line = serde_json::to_string(&request)?;
        line.push('\n');

        self.stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| DetectorError::WorkerCorruption(format!("failed to write request: {e}")))?;
        self.stdin
            .flush()
            .await
            .map_err(|e| DetectorError::WorkerCorruption(format!("failed to flush request: {e}")))?;

        let response = self
            .stdout
            .next_line()
            .await
            .map_err(|e| DetectorError::WorkerCorruption(format!("failed to read response: {e}")))?
            .ok_or_else(|| DetectorError::WorkerCorruption("worker closed its output".to_string()))?;

        debug!(response = %response, "Detector worker responded");
        Ok(serde_json::from_str(&response)?)
    }

    /// Whether the worker process has already exited
    pub fn has_exited(&mut self) -> bool {
        match self.child.try_wait() {
            Ok(Some(status)) => {
                warn!(%status, "Detector worker exited");
                true
            }
            Ok(None) => false,
            Err(e) => {
                warn!(error = %e, "Failed to poll detector worker status");
                true
            }
        }
    }
}
