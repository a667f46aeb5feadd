// yolo-detect 🚀 AGPL-3.0 License

//! Per-class greedy Non-Maximum Suppression.

use crate::results::Detection;

/// Per-class Non-Maximum Suppression (NMS).
///
/// Detections are visited in descending confidence order. Each visited,
/// not yet suppressed detection is kept and suppresses every later detection
/// of the same class whose `IoU` with it is `>= iou_threshold`. Detections of
/// different classes never suppress each other.
///
/// The sort is stable, so equal confidences keep their input order. The
/// pairwise scan is O(K²) in the number of candidates, which stays small
/// after confidence filtering.
///
/// # Arguments
///
/// * `detections` - Candidates in any order.
/// * `iou_threshold` - Overlap at or above which a same-class box is dropped.
///
/// # Returns
///
/// Surviving detections, highest confidence first.
#[must_use]
pub fn suppress(mut detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    if detections.is_empty() {
        return detections;
    }

    // Sort by confidence (descending)
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut suppressed = vec![false; detections.len()];
    let mut keep = Vec::with_capacity(detections.len());

    for i in 0..detections.len() {
        if suppressed[i] {
            continue;
        }
        let kept = detections[i];
        keep.push(kept);

        for j in (i + 1)..detections.len() {
            if suppressed[j] || detections[j].class_index != kept.class_index {
                continue;
            }
            if kept.bounding_box.iou(&detections[j].bounding_box) >= iou_threshold {
                suppressed[j] = true;
            }
        }
    }

    keep
}
