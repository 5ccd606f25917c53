use async_trait::async_trait;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tokio::task;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use super::annotate::{render_annotations, rendered_path_for};
use super::circuit_breaker::CircuitBreaker;
use super::config::DetectorConfig;
use super::errors::DetectorError;
use super::protocol::WorkerResponse;
use super::worker::WorkerProcess;
use super::{Detection, DetectionResult, Detector};

/// Detector backed by a single long-lived YOLO worker process
///
/// The worker is started by [`YoloDetector::load`] so that a bad weights path
/// or a broken worker command stops the bot at startup. Requests are queued
/// on one mutex because the worker handles one line at a time; each request
/// holds the queue for at most the inference timeout.
pub struct YoloDetector {
    config: DetectorConfig,
    worker: Mutex<Option<WorkerProcess>>,
    circuit_breaker: CircuitBreaker,
}

impl YoloDetector {
    /// Check the weights, prepare the output directory and start the worker
    pub async fn load(config: DetectorConfig) -> Result<Self, DetectorError> {
        if !config.weights_path.is_file() {
            return Err(DetectorError::Initialization(format!(
                "model weights not found at {}",
                config.weights_path.display()
            )));
        }

        std::fs::create_dir_all(&config.output_dir).map_err(|e| {
            DetectorError::Initialization(format!(
                "cannot create output directory {}: {e}",
                config.output_dir.display()
            ))
        })?;

        let worker = WorkerProcess::spawn(&config).await?;
        info!(weights = %config.weights_path.display(), "Detector model loaded");

        Ok(Self {
            circuit_breaker: CircuitBreaker::new(config.recovery.clone()),
            config,
            worker: Mutex::new(Some(worker)),
        })
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    async fn run_worker(
        &self,
        image_path: &Path,
    ) -> Result<(WorkerResponse, Vec<String>), DetectorError> {
        let mut slot = self.worker.lock().await;

        // The worker stays out of the slot while a request is in flight, so a
        // cancelled request leaves an empty slot instead of a half-read pipe.
        let alive = slot.take().and_then(|mut worker| {
            if worker.has_exited() {
                None
            } else {
                Some(worker)
            }
        });
        let mut worker = match alive {
            Some(worker) => worker,
            None => {
                warn!("Detector worker unavailable, starting a new one");
                WorkerProcess::spawn(&self.config).await?
            }
        };

        let operation_timeout = self.config.recovery.operation_timeout();
        let outcome = match timeout(
            operation_timeout,
            worker.infer(image_path, &self.config.output_dir, self.config.image_size),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(DetectorError::Timeout(format!(
                "inference exceeded {}s",
                operation_timeout.as_secs()
            ))),
        };

        match outcome {
            Ok(response) => {
                let names = worker.names().to_vec();
                *slot = Some(worker);
                Ok((response, names))
            }
            Err(e) if e.poisons_worker() => {
                // Dropping the handle kills the process; the next request respawns it
                error!(error = %e, "Discarding detector worker");
                Err(e)
            }
            Err(e) => {
                *slot = Some(worker);
                Err(e)
            }
        }
    }

    /// Pick the annotated copy of `image_path`, rendering one if the worker did not
    async fn resolve_annotated_image(
        &self,
        image_path: &Path,
        reported: Option<PathBuf>,
        detections: &[Detection],
    ) -> Result<PathBuf, DetectorError> {
        if let Some(path) = reported {
            if path.is_file() {
                return Ok(path);
            }
            warn!(path = %path.display(), "Worker reported a missing annotated image");
        }

        // YOLO's save=True convention: same file name inside the output directory
        if let Some(name) = image_path.file_name() {
            let conventional = self.config.output_dir.join(name);
            if conventional.is_file() {
                return Ok(conventional);
            }
        }

        let rendered = rendered_path_for(&self.config.output_dir, image_path);
        let source = image_path.to_path_buf();
        let destination = rendered.clone();
        let detections = detections.to_vec();
        task::spawn_blocking(move || render_annotations(&source, &detections, &destination))
            .await
            .map_err(|e| DetectorError::ImageLoad(format!("rendering task failed: {e}")))??;
        Ok(rendered)
    }
}

#[async_trait]
impl Detector for YoloDetector {
    async fn infer(&self, image_path: &Path) -> Result<DetectionResult, DetectorError> {
        if self.circuit_breaker.is_open() {
            warn!(
                failures = self.circuit_breaker.failure_count(),
                "Detector circuit open, rejecting request"
            );
            return Err(DetectorError::CircuitOpen(
                "too many recent detector failures".to_string(),
            ));
        }

        let path = image_path.to_path_buf();
        let config = self.config.clone();
        task::spawn_blocking(move || validate_image(&path, &config))
            .await
            .map_err(|e| DetectorError::Validation(format!("validation task failed: {e}")))??;

        let result: Result<DetectionResult, DetectorError> = async {
            let (response, names) = self.run_worker(image_path).await?;
            let annotated_image = response.annotated_image.clone();
            let detections = response.into_detections(&names)?;
            let annotated_image = self
                .resolve_annotated_image(image_path, annotated_image, &detections)
                .await?;
            Ok(DetectionResult {
                detections,
                annotated_image,
            })
        }
        .await;

        match &result {
            Ok(found) => {
                self.circuit_breaker.record_success();
                info!(
                    detections = found.detections.len(),
                    annotated = %found.annotated_image.display(),
                    "Inference completed"
                );
            }
            Err(e) => {
                if e.trips_breaker() {
                    self.circuit_breaker.record_failure();
                }
                error!(error = %e, image = %image_path.display(), "Inference failed");
            }
        }

        result
    }
}

/// Check that `image_path` is an image the worker can read before sending it over
///
/// Verifies existence, the general size limit, the sniffed format and the
/// per-format size limit.
pub fn validate_image(image_path: &Path, config: &DetectorConfig) -> Result<(), DetectorError> {
    let metadata = std::fs::metadata(image_path).map_err(|e| {
        DetectorError::Validation(format!("cannot read {}: {e}", image_path.display()))
    })?;
    if !metadata.is_file() {
        return Err(DetectorError::Validation(format!(
            "{} is not a file",
            image_path.display()
        )));
    }

    let size = metadata.len();
    if size > config.max_file_size {
        return Err(DetectorError::Validation(format!(
            "file is {size} bytes, limit is {}",
            config.max_file_size
        )));
    }

    let mut buffer = vec![0; config.buffer_size];
    let bytes_read = File::open(image_path)
        .and_then(|mut file| file.read(&mut buffer))
        .map_err(|e| DetectorError::Validation(format!("cannot read image header: {e}")))?;
    if bytes_read < config.min_format_bytes {
        return Err(DetectorError::Validation(format!(
            "only {bytes_read} bytes available, need at least {} to detect the format",
            config.min_format_bytes
        )));
    }
    buffer.truncate(bytes_read);

    let format = image::guess_format(&buffer)
        .map_err(|e| DetectorError::Validation(format!("unrecognized image format: {e}")))?;
    let limit = config
        .format_limits
        .limit_for(format)
        .ok_or_else(|| DetectorError::Validation(format!("unsupported image format {format:?}")))?;
    if size > limit {
        return Err(DetectorError::Validation(format!(
            "{format:?} file is {size} bytes, limit is {limit}"
        )));
    }

    debug!(?format, size, path = %image_path.display(), "Image accepted for inference");
    Ok(())
}
