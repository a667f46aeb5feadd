// yolo-detect 🚀 AGPL-3.0 License

//! Detection results and timing records.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::geometry::Rect;

/// Timing information for one detection call (in milliseconds).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Speed {
    /// Time spent on letterboxing and tensor encoding.
    pub preprocess: Option<f64>,
    /// Time spent in the engine's forward pass.
    pub inference: Option<f64>,
    /// Time spent on decoding, unmapping and suppression.
    pub postprocess: Option<f64>,
}

impl Speed {
    /// Create a new Speed instance with all timings.
    ///
    /// # Arguments
    ///
    /// * `preprocess` - Time in milliseconds.
    /// * `inference` - Time in milliseconds.
    /// * `postprocess` - Time in milliseconds.
    #[must_use]
    pub const fn new(preprocess: f64, inference: f64, postprocess: f64) -> Self {
        Self {
            preprocess: Some(preprocess),
            inference: Some(inference),
            postprocess: Some(postprocess),
        }
    }

    /// Sum of the recorded stage timings in milliseconds.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.preprocess.unwrap_or(0.0)
            + self.inference.unwrap_or(0.0)
            + self.postprocess.unwrap_or(0.0)
    }
}

/// One detected object.
///
/// The bounding box is in source-image pixels once it leaves the pipeline.
/// Serializes as `{"classIndex": 2, "confidence": 0.91, "bbox": [l, t, r, b]}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
    /// Index of the predicted class, `< num_classes`.
    pub class_index: usize,
    /// `objectness * class probability`, in `[0, 1]`.
    pub confidence: f32,
    /// Box edges.
    #[serde(rename = "bbox")]
    pub bounding_box: Rect,
}

impl Detection {
    /// Create a detection.
    #[must_use]
    pub const fn new(class_index: usize, confidence: f32, bounding_box: Rect) -> Self {
        Self {
            class_index,
            confidence,
            bounding_box,
        }
    }
}

/// Per-class counts rendered like `"2 class0, 1 class3"`.
///
/// Classes are listed in ascending index order.
#[must_use]
pub fn summarize(detections: &[Detection]) -> String {
    if detections.is_empty() {
        return "(no detections)".to_string();
    }

    let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
    for d in detections {
        *counts.entry(d.class_index).or_insert(0) += 1;
    }

    counts
        .iter()
        .map(|(class_index, count)| format!("{count} class{class_index}"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speed() {
        let speed = Speed::new(1.0, 2.0, 3.0);
        assert!((speed.total() - 6.0).abs() < 1e-9);
        assert!((Speed::default().total()).abs() < 1e-9);
    }

    #[test]
    fn test_detection_json_shape() {
        let d = Detection::new(2, 0.5, Rect::new(10.0, 20.0, 30.0, 40.0));
        let json = serde_json::to_value(d).unwrap();
        assert_eq!(json["classIndex"], 2);
        assert_eq!(json["confidence"], 0.5);
        assert_eq!(json["bbox"], serde_json::json!([10.0, 20.0, 30.0, 40.0]));
    }

    #[test]
    fn test_summarize() {
        let r = Rect::new(0.0, 0.0, 1.0, 1.0);
        let detections = vec![
            Detection::new(3, 0.9, r),
            Detection::new(0, 0.8, r),
            Detection::new(0, 0.7, r),
        ];
        assert_eq!(summarize(&detections), "2 class0, 1 class3");
        assert_eq!(summarize(&[]), "(no detections)");
    }
}
