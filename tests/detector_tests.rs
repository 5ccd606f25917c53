//! # Detector Tests
//!
//! Run the YOLO adapter against small shell workers that speak the same
//! line protocol as the real model process.

#![cfg(unix)]

use skinbot::detector::config::RecoveryConfig;
use skinbot::detector::{Detector, DetectorConfig, DetectorError, YoloDetector};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

#[cfg(test)]
mod tests {
    use super::*;

    const HANDSHAKE: &str = r#"echo '{"ready":true,"names":["eczema","psoriasis"]}'"#;

    struct Workspace {
        dir: TempDir,
    }

    impl Workspace {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            std::fs::write(dir.path().join("best.pt"), b"weights").unwrap();
            Self { dir }
        }

        fn path(&self, name: &str) -> PathBuf {
            self.dir.path().join(name)
        }

        fn spawn_log(&self) -> PathBuf {
            self.path("spawns.log")
        }

        fn spawn_count(&self) -> usize {
            std::fs::read_to_string(self.spawn_log())
                .map(|log| log.lines().count())
                .unwrap_or(0)
        }

        /// Write a worker script that logs every start and runs `body` after the prelude
        fn config(&self, body: &str) -> DetectorConfig {
            let script = self.path("worker.sh");
            let source = format!(
                "echo started >> '{}'\n{body}\n",
                self.spawn_log().display()
            );
            std::fs::write(&script, source).unwrap();

            DetectorConfig {
                command: "sh".to_string(),
                args: vec![script.to_string_lossy().to_string()],
                weights_path: self.path("best.pt"),
                output_dir: self.path("predictions"),
                recovery: RecoveryConfig {
                    operation_timeout_secs: 1,
                    load_timeout_secs: 5,
                    circuit_breaker_threshold: 3,
                    circuit_breaker_reset_secs: 60,
                },
                ..Default::default()
            }
        }

        fn photo(&self) -> PathBuf {
            self.photo_named("photo.png")
        }

        fn photo_named(&self, name: &str) -> PathBuf {
            let path = self.path(name);
            image::RgbImage::from_pixel(32, 32, image::Rgb([200, 170, 150]))
                .save(&path)
                .unwrap();
            path
        }
    }

    fn answering(response: &str) -> String {
        format!("{HANDSHAKE}\nwhile IFS= read -r line; do\n  echo '{response}'\ndone")
    }

    fn bytes_of(path: &Path) -> Vec<u8> {
        std::fs::read(path).unwrap()
    }

    #[tokio::test]
    async fn test_infer_resolves_labels_and_renders_boxes() {
        let ws = Workspace::new();
        let config = ws.config(&answering(
            r#"{"detections":[{"class_id":0,"confidence":0.55,"bbox":[2,2,20,20]},{"label":"psoriasis","confidence":0.1}]}"#,
        ));
        let detector = YoloDetector::load(config).await.unwrap();
        let photo = ws.photo();
        let original = bytes_of(&photo);

        let result = detector.infer(&photo).await.unwrap();

        let found: Vec<(&str, f64)> = result
            .detections
            .iter()
            .map(|d| (d.label.as_str(), d.confidence))
            .collect();
        assert_eq!(found, vec![("eczema", 0.55), ("psoriasis", 0.1)]);
        assert!(result.annotated_image.starts_with(ws.path("predictions")));
        assert!(result.annotated_image.is_file());
        assert_eq!(bytes_of(&photo), original, "input image must not change");
    }

    #[tokio::test]
    async fn test_infer_uses_worker_reported_image() {
        let ws = Workspace::new();
        let reported = ws.path("reported.jpg");
        std::fs::write(&reported, b"annotated by the worker").unwrap();
        let response = format!(
            r#"{{"detections":[],"annotated_image":"{}"}}"#,
            reported.display()
        );
        let detector = YoloDetector::load(ws.config(&answering(&response)))
            .await
            .unwrap();

        let result = detector.infer(&ws.photo()).await.unwrap();

        assert!(result.detections.is_empty());
        assert_eq!(result.annotated_image, reported);
    }

    #[tokio::test]
    async fn test_clamps_out_of_range_confidence() {
        let ws = Workspace::new();
        let detector = YoloDetector::load(ws.config(&answering(
            r#"{"detections":[{"label":"eczema","confidence":1.7}]}"#,
        )))
        .await
        .unwrap();

        let result = detector.infer(&ws.photo()).await.unwrap();
        assert_eq!(result.detections[0].confidence, 1.0);
    }

    #[tokio::test]
    async fn test_worker_error_keeps_worker_alive() {
        let ws = Workspace::new();
        let detector = YoloDetector::load(ws.config(&answering(r#"{"error":"bad image"}"#)))
            .await
            .unwrap();
        let photo = ws.photo();

        for _ in 0..2 {
            let err = detector.infer(&photo).await.unwrap_err();
            assert_eq!(err, DetectorError::Inference("bad image".to_string()));
        }
        assert_eq!(ws.spawn_count(), 1);
    }

    #[tokio::test]
    async fn test_timeout_discards_and_respawns_worker() {
        let ws = Workspace::new();
        let body = format!("{HANDSHAKE}\nwhile IFS= read -r line; do\n  sleep 30\ndone");
        let detector = YoloDetector::load(ws.config(&body)).await.unwrap();
        let photo = ws.photo();

        let err = detector.infer(&photo).await.unwrap_err();
        assert!(matches!(err, DetectorError::Timeout(_)));
        assert_eq!(ws.spawn_count(), 1);

        let err = detector.infer(&photo).await.unwrap_err();
        assert!(matches!(err, DetectorError::Timeout(_)));
        assert_eq!(ws.spawn_count(), 2);
    }

    #[tokio::test]
    async fn test_garbage_response_is_worker_corruption() {
        let ws = Workspace::new();
        let detector = YoloDetector::load(ws.config(&answering("not json")))
            .await
            .unwrap();

        let err = detector.infer(&ws.photo()).await.unwrap_err();
        assert!(matches!(err, DetectorError::WorkerCorruption(_)));
    }

    #[tokio::test]
    async fn test_circuit_opens_after_repeated_worker_failures() {
        let ws = Workspace::new();
        let detector = YoloDetector::load(ws.config(&answering("not json")))
            .await
            .unwrap();
        let photo = ws.photo();

        for _ in 0..3 {
            assert!(matches!(
                detector.infer(&photo).await,
                Err(DetectorError::WorkerCorruption(_))
            ));
        }
        assert!(matches!(
            detector.infer(&photo).await,
            Err(DetectorError::CircuitOpen(_))
        ));
    }

    #[tokio::test]
    async fn test_rejected_images_do_not_block_other_senders() {
        let ws = Workspace::new();
        let body = format!(
            "{HANDSHAKE}\nwhile IFS= read -r line; do\n  case \"$line\" in\n    */bad.png*) echo '{{\"error\":\"cannot identify image file\"}}' ;;\n    *) echo '{{\"detections\":[{{\"label\":\"eczema\",\"confidence\":0.55}}]}}' ;;\n  esac\ndone"
        );
        let detector = YoloDetector::load(ws.config(&body)).await.unwrap();
        let bad = ws.photo_named("bad.png");
        let good = ws.photo_named("good.png");

        for _ in 0..5 {
            let err = detector.infer(&bad).await.unwrap_err();
            assert_eq!(
                err,
                DetectorError::Inference("cannot identify image file".to_string())
            );
        }

        let result = detector.infer(&good).await.unwrap();
        assert_eq!(result.detections.len(), 1);
        assert_eq!(result.detections[0].label, "eczema");
    }

    #[tokio::test]
    async fn test_rejects_non_image_input() {
        let ws = Workspace::new();
        let detector = YoloDetector::load(ws.config(&answering(r#"{"detections":[]}"#)))
            .await
            .unwrap();
        let text = ws.path("notes.txt");
        std::fs::write(&text, "this is not a picture of anything").unwrap();

        let err = detector.infer(&text).await.unwrap_err();
        assert!(matches!(err, DetectorError::Validation(_)));
    }

    #[tokio::test]
    async fn test_load_reports_worker_refusal() {
        let ws = Workspace::new();
        let config = ws.config(r#"echo '{"ready":false,"error":"weights are corrupt"}'"#);

        let err = YoloDetector::load(config).await.err().unwrap();
        assert_eq!(
            err,
            DetectorError::Initialization("weights are corrupt".to_string())
        );
    }

    #[tokio::test]
    async fn test_load_reports_silent_exit() {
        let ws = Workspace::new();

        let err = YoloDetector::load(ws.config("exit 0")).await.err().unwrap();
        assert!(matches!(err, DetectorError::Initialization(_)));
    }

    #[tokio::test]
    async fn test_load_reports_missing_command() {
        let ws = Workspace::new();
        let config = DetectorConfig {
            command: "/non/existent/detector".to_string(),
            ..ws.config("")
        };

        let err = YoloDetector::load(config).await.err().unwrap();
        assert!(err.to_string().contains("failed to start detector worker"));
    }
}
