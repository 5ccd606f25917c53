//! # Detector Configuration Module
//!
//! This module defines configuration structures for the detector adapter,
//! including the worker command line, input limits and recovery settings.

use std::path::PathBuf;
use std::time::Duration;

// Constants for detector configuration
pub const DEFAULT_WORKER_COMMAND: &str = "python3";
pub const DEFAULT_WORKER_SCRIPT: &str = "yolo_worker.py";
pub const DEFAULT_WEIGHTS_PATH: &str = "weights/best.pt";
pub const DEFAULT_PREDICTIONS_DIR: &str = "predictions";
pub const DEFAULT_IMAGE_SIZE: u32 = 640;
pub const FORMAT_DETECTION_BUFFER_SIZE: usize = 32;
pub const MIN_FORMAT_BYTES: usize = 8;
pub const MAX_FILE_SIZE: u64 = 20 * 1024 * 1024; // Telegram bots cannot download more than 20MB

/// Recovery configuration for error handling
#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    /// Timeout for a single inference request in seconds
    pub operation_timeout_secs: u64,
    /// Timeout for the worker handshake (model load) in seconds
    pub load_timeout_secs: u64,
    /// Circuit breaker failure threshold
    pub circuit_breaker_threshold: u32,
    /// Circuit breaker reset timeout in seconds
    pub circuit_breaker_reset_secs: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            operation_timeout_secs: 60,
            load_timeout_secs: 120,
            circuit_breaker_threshold: 5,
            circuit_breaker_reset_secs: 60, // 1 minute
        }
    }
}

impl RecoveryConfig {
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_secs(self.load_timeout_secs)
    }
}

/// Format-specific file size limits for different image formats
#[derive(Debug, Clone)]
pub struct FormatSizeLimits {
    /// PNG format limit
    pub png_max: u64,
    /// JPEG format limit (Telegram photos are always JPEG)
    pub jpeg_max: u64,
    /// WebP format limit
    pub webp_max: u64,
    /// BMP format limit (lower due to uncompressed nature)
    pub bmp_max: u64,
    /// TIFF format limit
    pub tiff_max: u64,
}

impl Default for FormatSizeLimits {
    fn default() -> Self {
        Self {
            png_max: 15 * 1024 * 1024,  // 15MB for PNG
            jpeg_max: 10 * 1024 * 1024, // 10MB for JPEG
            webp_max: 10 * 1024 * 1024, // 10MB for WebP
            bmp_max: 5 * 1024 * 1024,   // 5MB for BMP
            tiff_max: 20 * 1024 * 1024, // 20MB for TIFF
        }
    }
}

impl FormatSizeLimits {
    /// Size limit for a sniffed format, `None` when the format is not accepted
    pub fn limit_for(&self, format: image::ImageFormat) -> Option<u64> {
        match format {
            image::ImageFormat::Png => Some(self.png_max),
            image::ImageFormat::Jpeg => Some(self.jpeg_max),
            image::ImageFormat::WebP => Some(self.webp_max),
            image::ImageFormat::Bmp => Some(self.bmp_max),
            image::ImageFormat::Tiff => Some(self.tiff_max),
            _ => None,
        }
    }
}

/// Configuration structure for the detector adapter
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Worker executable
    pub command: String,
    /// Arguments passed to the worker executable
    pub args: Vec<String>,
    /// Model weights, handed to the worker as `MODEL_PATH`
    pub weights_path: PathBuf,
    /// Directory where annotated images are written
    pub output_dir: PathBuf,
    /// Inference image size, handed to the worker as `IMAGE_SIZE`
    pub image_size: u32,
    /// Buffer size for format detection in bytes
    pub buffer_size: usize,
    /// Minimum bytes required for format detection
    pub min_format_bytes: usize,
    /// Maximum allowed file size in bytes (general limit)
    pub max_file_size: u64,
    /// Format-specific size limits
    pub format_limits: FormatSizeLimits,
    /// Recovery and error handling configuration
    pub recovery: RecoveryConfig,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            command: DEFAULT_WORKER_COMMAND.to_string(),
            args: vec![DEFAULT_WORKER_SCRIPT.to_string()],
            weights_path: PathBuf::from(DEFAULT_WEIGHTS_PATH),
            output_dir: PathBuf::from(DEFAULT_PREDICTIONS_DIR),
            image_size: DEFAULT_IMAGE_SIZE,
            buffer_size: FORMAT_DETECTION_BUFFER_SIZE,
            min_format_bytes: MIN_FORMAT_BYTES,
            max_file_size: MAX_FILE_SIZE,
            format_limits: FormatSizeLimits::default(),
            recovery: RecoveryConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detector_config_defaults() {
        let config = DetectorConfig::default();

        assert_eq!(config.command, "python3");
        assert_eq!(config.args, vec!["yolo_worker.py".to_string()]);
        assert_eq!(config.image_size, 640);
        assert_eq!(config.buffer_size, 32);
        assert_eq!(config.min_format_bytes, 8);
        assert_eq!(config.max_file_size, 20 * 1024 * 1024);
    }

    #[test]
    fn test_format_size_limits() {
        let limits = FormatSizeLimits::default();

        assert!(limits.bmp_max <= limits.jpeg_max);
        assert!(limits.jpeg_max <= limits.png_max);
        assert!(limits.png_max <= limits.tiff_max);
        assert_eq!(limits.limit_for(image::ImageFormat::Jpeg), Some(limits.jpeg_max));
        assert_eq!(limits.limit_for(image::ImageFormat::Gif), None);
    }

    #[test]
    fn test_recovery_durations() {
        let recovery = RecoveryConfig::default();
        assert_eq!(recovery.operation_timeout(), Duration::from_secs(60));
        assert_eq!(recovery.load_timeout(), Duration::from_secs(120));
    }
}
