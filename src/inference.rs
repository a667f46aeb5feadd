// yolo-detect 🚀 AGPL-3.0 License

//! Detector configuration.
//!
//! This module defines the [`DetectorConfig`] struct, which controls the
//! letterbox input size, how the raw model output is interpreted, the
//! confidence and Non-Maximum Suppression (NMS) thresholds, and engine threading.

use crate::error::{DetectError, Result};
use crate::format::BoxFormat;

/// Default square input size, matching the model's training resolution.
pub const DEFAULT_TARGET_SIZE: u32 = 512;

/// Default number of classes predicted by the model.
pub const DEFAULT_NUM_CLASSES: usize = 5;

/// Configuration for the detection pipeline.
///
/// It uses a builder pattern for convenient construction.
///
/// # Example
///
/// ```rust
/// use yolo_detect::{BoxFormat, DetectorConfig};
///
/// let config = DetectorConfig::new()
///     .with_target_size(640)
///     .with_num_classes(80)
///     .with_box_format(BoxFormat::CenterSize)
///     .with_confidence(0.5)
///     .with_iou(0.45);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorConfig {
    /// Side length of the square model input.
    pub target_size: u32,
    /// Number of class logit rows following the objectness row.
    pub num_classes: usize,
    /// Encoding of the four box rows.
    pub box_format: BoxFormat,
    /// Minimum `objectness * class probability` for a candidate to survive decoding.
    pub confidence_threshold: f32,
    /// Same-class boxes overlapping a kept box with `IoU >=` this value are suppressed.
    pub iou_threshold: f32,
    /// Maximum number of detections returned per image.
    pub max_detections: usize,
    /// Number of intra-op threads for the engine. `0` lets the engine decide.
    pub num_threads: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            target_size: DEFAULT_TARGET_SIZE,
            num_classes: DEFAULT_NUM_CLASSES,
            box_format: BoxFormat::Xyxy,
            confidence_threshold: 0.25,
            iou_threshold: 0.45,
            max_detections: 300,
            num_threads: 0,
        }
    }
}

impl DetectorConfig {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the square model input size.
    #[must_use]
    pub const fn with_target_size(mut self, size: u32) -> Self {
        self.target_size = size;
        self
    }

    /// Set the number of classes.
    #[must_use]
    pub const fn with_num_classes(mut self, num_classes: usize) -> Self {
        self.num_classes = num_classes;
        self
    }

    /// Set the box encoding of the raw output.
    #[must_use]
    pub const fn with_box_format(mut self, format: BoxFormat) -> Self {
        self.box_format = format;
        self
    }

    /// Set the confidence threshold.
    ///
    /// # Arguments
    ///
    /// * `threshold` - The minimum confidence score (0.0 to 1.0).
    #[must_use]
    pub const fn with_confidence(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    /// Set the IoU threshold for Non-Maximum Suppression (NMS).
    ///
    /// # Arguments
    ///
    /// * `threshold` - The IoU threshold (0.0 to 1.0).
    #[must_use]
    pub const fn with_iou(mut self, threshold: f32) -> Self {
        self.iou_threshold = threshold;
        self
    }

    /// Set the maximum number of detections to return.
    #[must_use]
    pub const fn with_max_detections(mut self, max: usize) -> Self {
        self.max_detections = max;
        self
    }

    /// Set the number of threads for inference.
    #[must_use]
    pub const fn with_threads(mut self, threads: usize) -> Self {
        self.num_threads = threads;
        self
    }

    /// Number of rows the raw output must at least have: 4 box rows,
    /// one objectness row and one row per class.
    #[must_use]
    pub const fn required_channels(&self) -> usize {
        5 + self.num_classes
    }

    /// Check that every option is usable.
    ///
    /// # Errors
    ///
    /// Returns [`DetectError::Config`] describing the first invalid option.
    pub fn validate(&self) -> Result<()> {
        if self.target_size == 0 {
            return Err(DetectError::Config("target_size must be at least 1".to_string()));
        }
        if self.num_classes == 0 {
            return Err(DetectError::Config("num_classes must be at least 1".to_string()));
        }
        check_unit_interval("confidence_threshold", self.confidence_threshold)?;
        check_unit_interval("iou_threshold", self.iou_threshold)?;
        if self.max_detections == 0 {
            return Err(DetectError::Config("max_detections must be at least 1".to_string()));
        }
        Ok(())
    }
}

fn check_unit_interval(name: &str, value: f32) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(DetectError::Config(format!(
            "{name} must be within [0, 1], got {value}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = DetectorConfig::default();
        assert_eq!(config.target_size, 512);
        assert_eq!(config.num_classes, 5);
        assert_eq!(config.box_format, BoxFormat::Xyxy);
        assert!((config.confidence_threshold - 0.25).abs() < f32::EPSILON);
        assert!((config.iou_threshold - 0.45).abs() < f32::EPSILON);
        assert_eq!(config.max_detections, 300);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = DetectorConfig::new()
            .with_target_size(640)
            .with_num_classes(80)
            .with_box_format(BoxFormat::CenterSize)
            .with_confidence(0.5)
            .with_iou(0.6)
            .with_max_detections(100)
            .with_threads(8);

        assert_eq!(config.target_size, 640);
        assert_eq!(config.required_channels(), 85);
        assert_eq!(config.box_format, BoxFormat::CenterSize);
        assert!((config.confidence_threshold - 0.5).abs() < f32::EPSILON);
        assert!((config.iou_threshold - 0.6).abs() < f32::EPSILON);
        assert_eq!(config.max_detections, 100);
        assert_eq!(config.num_threads, 8);
    }

    #[test]
    fn test_config_validation() {
        assert!(DetectorConfig::new().with_target_size(0).validate().is_err());
        assert!(DetectorConfig::new().with_num_classes(0).validate().is_err());
        assert!(DetectorConfig::new().with_confidence(1.5).validate().is_err());
        assert!(DetectorConfig::new().with_iou(f32::NAN).validate().is_err());
        assert!(DetectorConfig::new().with_max_detections(0).validate().is_err());

        let err = DetectorConfig::new().with_confidence(-0.1).validate().unwrap_err();
        assert!(matches!(err, DetectError::Config(_)));
    }
}
