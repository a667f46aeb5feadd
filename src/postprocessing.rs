// yolo-detect 🚀 AGPL-3.0 License

//! Post-processing for YOLO model outputs.
//!
//! This module turns the raw engine output into final detections: the
//! output is validated into a typed [`OutputView`], decoded into
//! canvas-space candidates, projected back to source-image space and
//! deduplicated with per-class NMS.

#![allow(clippy::cast_precision_loss)]

use crate::engine::RawOutput;
use crate::error::{DetectError, Result};
use crate::geometry::Rect;
use crate::inference::DetectorConfig;
use crate::nms::suppress;
use crate::preprocessing::LetterboxParams;
use crate::results::Detection;

/// Box rows (4) plus the objectness row.
const CLASS_ROW_OFFSET: usize = 5;

/// Row index of the objectness logit.
const OBJECTNESS_ROW: usize = 4;

/// Logistic sigmoid, `1 / (1 + e^-x)`.
///
/// Saturates cleanly: `exp` overflowing to `+inf` yields `0.0`, underflowing
/// to `0.0` yields `1.0`.
#[inline]
#[must_use]
pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Validated, channel-major view of a raw detection output.
///
/// Row `r` holds channel `r` for all `anchors` columns: rows 0..4 are box
/// parameters, row 4 the objectness logit, rows 5.. the class logits.
#[derive(Debug, Clone, Copy)]
pub struct OutputView<'a> {
    data: &'a [f32],
    channels: usize,
    anchors: usize,
}

impl<'a> OutputView<'a> {
    /// Validate `output` as `[1, C, N]` or `[C, N]` with `C >= 5 + num_classes`.
    ///
    /// # Errors
    ///
    /// Returns [`DetectError::MalformedOutput`] for any other rank, a batch
    /// other than 1, too few channels, or data whose length disagrees with
    /// the shape.
    pub fn new(output: &'a RawOutput, num_classes: usize) -> Result<Self> {
        let (channels, anchors) = match output.shape.as_slice() {
            [1, c, n] | [c, n] => (*c, *n),
            [batch, _, _] => {
                return Err(DetectError::MalformedOutput(format!(
                    "expected batch size 1, got {batch}"
                )));
            }
            shape => {
                return Err(DetectError::MalformedOutput(format!(
                    "expected shape [1, C, N], got {shape:?}"
                )));
            }
        };

        let required = CLASS_ROW_OFFSET + num_classes;
        if channels < required {
            return Err(DetectError::MalformedOutput(format!(
                "expected at least {required} channels for {num_classes} classes, got {channels}"
            )));
        }

        let expected_len = channels.checked_mul(anchors).ok_or_else(|| {
            DetectError::MalformedOutput(format!("shape {:?} overflows", output.shape))
        })?;
        if output.data.len() != expected_len {
            return Err(DetectError::MalformedOutput(format!(
                "shape {:?} needs {expected_len} values, got {}",
                output.shape,
                output.data.len()
            )));
        }

        Ok(Self {
            data: &output.data,
            channels,
            anchors,
        })
    }

    /// Number of channels (rows).
    #[must_use]
    pub const fn channels(&self) -> usize {
        self.channels
    }

    /// Number of anchors (columns).
    #[must_use]
    pub const fn anchors(&self) -> usize {
        self.anchors
    }

    /// All anchor values of channel `r`.
    ///
    /// # Panics
    ///
    /// Panics if `r >= self.channels()`.
    #[must_use]
    pub fn row(&self, r: usize) -> &'a [f32] {
        &self.data[r * self.anchors..(r + 1) * self.anchors]
    }
}

/// A decoded candidate in canvas coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    /// Box clamped to `[0, target_size]`.
    pub rect: Rect,
    /// `sigmoid(objectness) * max_c sigmoid(class_c)`.
    pub score: f32,
    /// Class with the highest probability, lowest index on ties. Class 0
    /// when no class probability is positive.
    pub class_index: usize,
}

/// Decode raw output into thresholded canvas-space candidates.
///
/// Uses `num_classes`, `box_format`, `target_size` and
/// `confidence_threshold` from `config`. Candidates whose score is below the
/// threshold (or not a number) or whose clamped box is degenerate are
/// dropped. Class probabilities that are not a number never win the class
/// scan.
///
/// # Errors
///
/// Returns [`DetectError::MalformedOutput`] if the output shape is invalid.
pub fn decode(output: &RawOutput, config: &DetectorConfig) -> Result<Vec<Candidate>> {
    let view = OutputView::new(output, config.num_classes)?;
    let limit = config.target_size as f32;

    let (p0, p1, p2, p3) = (view.row(0), view.row(1), view.row(2), view.row(3));
    let objectness = view.row(OBJECTNESS_ROW);
    let class_rows: Vec<&[f32]> = (0..config.num_classes)
        .map(|c| view.row(CLASS_ROW_OFFSET + c))
        .collect();

    let mut candidates = Vec::new();
    let mut max_score = f32::NEG_INFINITY;

    for i in 0..view.anchors() {
        let obj = sigmoid(objectness[i]);

        let mut best_class = 0;
        let mut best_prob = 0.0;
        for (c, row) in class_rows.iter().enumerate() {
            let prob = sigmoid(row[i]);
            if prob > best_prob {
                best_prob = prob;
                best_class = c;
            }
        }

        let score = obj * best_prob;
        max_score = max_score.max(score);
        if !(score >= config.confidence_threshold) {
            continue;
        }

        let rect = config
            .box_format
            .to_rect(p0[i], p1[i], p2[i], p3[i])
            .clamp(0.0, limit, 0.0, limit);
        if !rect.is_valid() {
            continue;
        }

        candidates.push(Candidate {
            rect,
            score,
            class_index: best_class,
        });
    }

    tracing::debug!(
        channels = view.channels(),
        anchors = view.anchors(),
        max_score,
        kept = candidates.len(),
        "decoded raw output"
    );

    Ok(candidates)
}

/// Project a canvas-space box back to source-image coordinates.
///
/// Inverts the letterbox (`(v - pad) / scale` on every edge), clamps x to
/// `[0, source_width - 1]` and y to `[0, source_height - 1]`, and returns
/// `None` if the result is degenerate.
#[must_use]
pub fn unmap(rect: &Rect, params: &LetterboxParams) -> Option<Rect> {
    let max_x = params.source_width.saturating_sub(1) as f32;
    let max_y = params.source_height.saturating_sub(1) as f32;

    let mapped = Rect::new(
        (rect.left - params.pad_x) / params.scale,
        (rect.top - params.pad_y) / params.scale,
        (rect.right - params.pad_x) / params.scale,
        (rect.bottom - params.pad_y) / params.scale,
    )
    .clamp(0.0, max_x, 0.0, max_y);

    mapped.is_valid().then_some(mapped)
}

/// Decode, unmap, suppress and truncate in one pass.
///
/// # Errors
///
/// Returns [`DetectError::MalformedOutput`] if the output shape is invalid.
pub fn postprocess(
    output: &RawOutput,
    params: &LetterboxParams,
    config: &DetectorConfig,
) -> Result<Vec<Detection>> {
    let detections: Vec<Detection> = decode(output, config)?
        .into_iter()
        .filter_map(|c| {
            unmap(&c.rect, params).map(|rect| Detection::new(c.class_index, c.score, rect))
        })
        .collect();

    let mut kept = suppress(detections, config.iou_threshold);
    kept.truncate(config.max_detections);
    Ok(kept)
}
