//! # Detector Error Types Module
//!
//! Every failure the detector adapter can hit is folded into [`DetectorError`]
//! so the request handler deals with a single error kind, whatever went wrong
//! underneath (bad input file, worker start-up, inference, timeouts).

/// Custom error types for detector operations
#[derive(Debug, Clone, PartialEq)]
pub enum DetectorError {
    /// Input file validation errors (missing, too large, unsupported format)
    Validation(String),
    /// Worker start-up or model load errors
    Initialization(String),
    /// Image decoding or annotated image rendering errors
    ImageLoad(String),
    /// The worker reported an error for this image
    Inference(String),
    /// The worker did not answer in time
    Timeout(String),
    /// The worker pipe broke or produced something that is not a protocol line
    WorkerCorruption(String),
    /// Too many recent failures, requests are rejected until the reset window passes
    CircuitOpen(String),
}

impl std::fmt::Display for DetectorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DetectorError::Validation(msg) => write!(f, "Validation error: {msg}"),
            DetectorError::Initialization(msg) => write!(f, "Initialization error: {msg}"),
            DetectorError::ImageLoad(msg) => write!(f, "Image load error: {msg}"),
            DetectorError::Inference(msg) => write!(f, "Inference error: {msg}"),
            DetectorError::Timeout(msg) => write!(f, "Timeout error: {msg}"),
            DetectorError::WorkerCorruption(msg) => write!(f, "Worker corruption error: {msg}"),
            DetectorError::CircuitOpen(msg) => write!(f, "Circuit open: {msg}"),
        }
    }
}

impl std::error::Error for DetectorError {}

impl DetectorError {
    /// Whether the failure leaves the worker process in an unknown state.
    ///
    /// The adapter discards the worker after such errors and spawns a fresh
    /// one on the next request.
    pub fn poisons_worker(&self) -> bool {
        matches!(
            self,
            DetectorError::Timeout(_) | DetectorError::WorkerCorruption(_)
        )
    }

    /// Whether the failure is about the worker rather than the submitted image.
    ///
    /// Only these count toward the circuit breaker.
    pub fn trips_breaker(&self) -> bool {
        self.poisons_worker() || matches!(self, DetectorError::Initialization(_))
    }
}

impl From<image::ImageError> for DetectorError {
    fn from(err: image::ImageError) -> Self {
        DetectorError::ImageLoad(err.to_string())
    }
}

impl From<serde_json::Error> for DetectorError {
    fn from(err: serde_json::Error) -> Self {
        DetectorError::WorkerCorruption(format!("malformed worker message: {err}"))
    }
}
