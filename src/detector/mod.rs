//! Detector module: the contract the request handler expects from the
//! skin-condition model, and the adapter that drives the external worker.
//!
//! - `errors`: the single error kind surfaced to callers
//! - `config`: worker command line, input limits and recovery settings
//! - `protocol`: JSON-lines messages exchanged with the worker
//! - `worker`: spawning and talking to the worker process
//! - `annotate`: drawing boxes when the worker does not save an annotated copy
//! - `circuit_breaker`: fail-fast after repeated worker failures
//! - `yolo`: the [`Detector`] implementation tying it all together

use async_trait::async_trait;
use std::path::{Path, PathBuf};

pub mod annotate;
pub mod circuit_breaker;
pub mod config;
pub mod errors;
pub mod protocol;
pub mod worker;
pub mod yolo;

pub use config::DetectorConfig;
pub use errors::DetectorError;
pub use yolo::YoloDetector;

/// Axis-aligned box in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    /// Build a box from `[x1, y1, x2, y2]`, normalizing swapped corners
    pub fn from_corners(corners: [f32; 4]) -> Self {
        let [a, b, c, d] = corners;
        Self {
            x1: a.min(c),
            y1: b.min(d),
            x2: a.max(c),
            y2: b.max(d),
        }
    }
}

/// A single (label, confidence) pair found on one image
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub label: String,
    /// Always within `[0, 1]`
    pub confidence: f64,
    pub bbox: Option<BoundingBox>,
}

impl Detection {
    pub fn new(label: impl Into<String>, confidence: f64) -> Self {
        Self {
            label: label.into(),
            confidence: protocol::normalize_confidence(confidence),
            bbox: None,
        }
    }
}

/// Output of one inference: detections in model order and the annotated copy of the image
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionResult {
    pub detections: Vec<Detection>,
    pub annotated_image: PathBuf,
}

/// The capability the request handler relies on.
///
/// Implementations must not modify the file at `image_path`, and must report
/// every failure as a [`DetectorError`].
#[async_trait]
pub trait Detector: Send + Sync {
    async fn infer(&self, image_path: &Path) -> Result<DetectionResult, DetectorError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_confidence_is_clamped() {
        assert_eq!(Detection::new("eczema", 1.3).confidence, 1.0);
        assert_eq!(Detection::new("eczema", -1.0).confidence, 0.0);
        assert_eq!(Detection::new("eczema", 0.55).confidence, 0.55);
    }

    #[test]
    fn test_bounding_box_corners_are_ordered() {
        let bbox = BoundingBox::from_corners([10.0, 20.0, 2.0, 4.0]);
        assert_eq!(bbox.x1, 2.0);
        assert_eq!(bbox.y1, 4.0);
        assert_eq!(bbox.x2, 10.0);
        assert_eq!(bbox.y2, 20.0);
    }
}
