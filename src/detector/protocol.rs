//! Line-delimited JSON protocol spoken with the detector worker process.
//!
//! The worker announces itself with one handshake line, then answers every
//! request line with exactly one response line.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::errors::DetectorError;
use super::{BoundingBox, Detection};

/// First line written by the worker once its model is loaded
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkerHandshake {
    #[serde(default)]
    pub ready: bool,
    /// Class names indexed by class id
    #[serde(default)]
    pub names: Vec<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl WorkerHandshake {
    /// Turn a handshake line into the class-name table, or the reason the worker refused to start
    pub fn into_names(self) -> Result<Vec<String>, DetectorError> {
        if self.ready {
            Ok(self.names)
        } else {
            Err(DetectorError::Initialization(
                self.error
                    .unwrap_or_else(|| "worker reported not ready".to_string()),
            ))
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InferenceRequest<'a> {
    pub image: &'a Path,
    pub output_dir: &'a Path,
    pub image_size: u32,
}

/// One raw detection record as reported by the worker
#[derive(Debug, Clone, Deserialize)]
pub struct RawDetection {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub class_id: Option<usize>,
    pub confidence: f64,
    /// `[x1, y1, x2, y2]` in pixels
    #[serde(default)]
    pub bbox: Option<[f32; 4]>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkerResponse {
    #[serde(default)]
    pub detections: Vec<RawDetection>,
    #[serde(default)]
    pub annotated_image: Option<PathBuf>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Clamp a raw model score into `[0, 1]` and round it to four decimals.
///
/// Non-finite scores are reported as zero.
pub fn normalize_confidence(raw: f64) -> f64 {
    if !raw.is_finite() {
        return 0.0;
    }
    (raw.clamp(0.0, 1.0) * 10_000.0).round() / 10_000.0
}

impl RawDetection {
    /// Resolve the record's label, falling back to the handshake class-name table
    pub fn resolve_label(&self, names: &[String]) -> Result<String, DetectorError> {
        if let Some(label) = self.label.as_deref().map(str::trim).filter(|l| !l.is_empty()) {
            return Ok(label.to_string());
        }

        match self.class_id {
            Some(id) => names.get(id).cloned().ok_or_else(|| {
                DetectorError::WorkerCorruption(format!(
                    "class id {id} outside of the {} known classes",
                    names.len()
                ))
            }),
            None => Err(DetectorError::WorkerCorruption(
                "detection has neither label nor class id".to_string(),
            )),
        }
    }

    pub fn into_detection(self, names: &[String]) -> Result<Detection, DetectorError> {
        let label = self.resolve_label(names)?;
        Ok(Detection {
            label,
            confidence: normalize_confidence(self.confidence),
            bbox: self.bbox.map(BoundingBox::from_corners),
        })
    }
}

impl WorkerResponse {
    /// Convert the response into detections in worker order.
    ///
    /// A response carrying `error` becomes a [`DetectorError::Inference`].
    pub fn into_detections(self, names: &[String]) -> Result<Vec<Detection>, DetectorError> {
        if let Some(error) = self.error {
            return Err(DetectorError::Inference(error));
        }

        self.detections
            .into_iter()
            .map(|raw| raw.into_detection(names))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names() -> Vec<String> {
        vec!["eczema".to_string(), "psoriasis".to_string()]
    }

    #[test]
    fn test_confidence_normalization() {
        assert_eq!(normalize_confidence(0.82341), 0.8234);
        assert_eq!(normalize_confidence(1.7), 1.0);
        assert_eq!(normalize_confidence(-0.2), 0.0);
        assert_eq!(normalize_confidence(f64::NAN), 0.0);
        assert_eq!(normalize_confidence(f64::INFINITY), 0.0);
    }

    #[test]
    fn test_response_with_class_ids_and_labels() {
        let line = r#"{"detections":[
            {"class_id":1,"confidence":0.1,"bbox":[1,2,3,4]},
            {"label":"melanoma","confidence":0.8234}
        ]}"#;
        let response: WorkerResponse = serde_json::from_str(line).unwrap();
        let detections = response.into_detections(&names()).unwrap();

        assert_eq!(detections.len(), 2);
        assert_eq!(detections[0].label, "psoriasis");
        assert_eq!(detections[0].bbox, Some(BoundingBox::from_corners([1.0, 2.0, 3.0, 4.0])));
        assert_eq!(detections[1].label, "melanoma");
        assert_eq!(detections[1].confidence, 0.8234);
    }

    #[test]
    fn test_unknown_class_id_is_rejected() {
        let response: WorkerResponse =
            serde_json::from_str(r#"{"detections":[{"class_id":7,"confidence":0.5}]}"#).unwrap();
        let err = response.into_detections(&names()).unwrap_err();
        assert!(matches!(err, DetectorError::WorkerCorruption(_)));
    }

    #[test]
    fn test_worker_error_response() {
        let response: WorkerResponse =
            serde_json::from_str(r#"{"error":"cannot identify image file"}"#).unwrap();
        let err = response.into_detections(&names()).unwrap_err();
        assert_eq!(
            err,
            DetectorError::Inference("cannot identify image file".to_string())
        );
    }

    #[test]
    fn test_handshake() {
        let ok: WorkerHandshake =
            serde_json::from_str(r#"{"ready":true,"names":["eczema"]}"#).unwrap();
        assert_eq!(ok.into_names().unwrap(), vec!["eczema".to_string()]);

        let failed: WorkerHandshake =
            serde_json::from_str(r#"{"ready":false,"error":"weights not found"}"#).unwrap();
        assert_eq!(
            failed.into_names().unwrap_err(),
            DetectorError::Initialization("weights not found".to_string())
        );
    }

    #[test]
    fn test_request_serialization() {
        let request = InferenceRequest {
            image: Path::new("/tmp/skinbot/photo-abc.jpg"),
            output_dir: Path::new("predictions"),
            image_size: 640,
        };
        let line = serde_json::to_string(&request).unwrap();
        assert_eq!(
            line,
            r#"{"image":"/tmp/skinbot/photo-abc.jpg","output_dir":"predictions","image_size":640}"#
        );
    }
}
