// yolo-detect 🚀 AGPL-3.0 License

#![allow(clippy::multiple_crate_versions)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! # YOLO Detection Post-Processing
//!
//! On-device object detection around a single-stage, anchor-free YOLO model
//! with a fixed square input. Given an arbitrary-resolution RGB image and an
//! inference engine, the pipeline produces deduplicated, class-labelled boxes
//! in the *source image's* coordinate space.
//!
//! ```text
//! image -> letterbox -> encode -> [engine] -> decode -> unmap -> suppress -> detections
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use yolo_detect::{Detector, DetectorConfig, OnnxEngine};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = DetectorConfig::default();
//!     let engine = OnnxEngine::load("best.onnx", &config)?;
//!     let detector = Detector::new(engine, config)?;
//!
//!     let image = image::open("image.jpg")?.to_rgb8();
//!     let outcome = detector.detect(&image);
//!     for d in &outcome.detections {
//!         println!("class {} {:.2} {:?}", d.class_index, d.confidence, d.bounding_box);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Raw output layout
//!
//! The engine output is read as `C x N` (optionally with a leading batch of
//! 1), `C >= 5 + num_classes`: rows 0..4 are box parameters in canvas pixels
//! ([`BoxFormat::Xyxy`] or [`BoxFormat::CenterSize`]), row 4 is the
//! objectness logit and rows `5..5 + num_classes` are class logits.
//! Confidence is `sigmoid(objectness) * max_c sigmoid(class_c)`.
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`geometry`] | [`Rect`] and `IoU` |
//! | [`preprocessing`] | Letterbox transform and planar tensor encoding |
//! | [`postprocessing`] | Output validation, decoding and coordinate unmapping |
//! | [`nms`] | Per-class Non-Maximum Suppression |
//! | [`engine`] | [`InferenceEngine`] trait and the [`LazyEngine`] handle |
//! | [`model`] | ONNX Runtime backend ([`OnnxEngine`]) |
//! | [`pipeline`] | [`Detector`] orchestrator |
//! | [`sink`] | Result reporting ([`ResultSink`], [`HttpSink`]) |
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `async` | `tokio`-based [`detect_async`] / [`detect_cancellable`] (default) |
//! | `coreml` | Apple `CoreML` execution provider |
//! | `nnapi` | Android NNAPI execution provider |

// Modules
pub mod cli;
pub mod engine;
pub mod error;
pub mod format;
pub mod geometry;
pub mod inference;
pub mod model;
pub mod nms;
pub mod pipeline;
pub mod postprocessing;
pub mod preprocessing;
pub mod results;
pub mod sink;
pub mod source;

// Re-export main types for convenience
pub use engine::{EngineStatus, InferenceEngine, LazyEngine, RawOutput};
pub use error::{DetectError, Result};
pub use format::BoxFormat;
pub use geometry::Rect;
pub use inference::DetectorConfig;
pub use model::OnnxEngine;
pub use pipeline::{DetectOutcome, DetectStatus, Detector};
#[cfg(feature = "async")]
pub use pipeline::{detect_async, detect_cancellable};
pub use results::{Detection, Speed};
pub use sink::{HttpSink, ResultSink, UploadPayload};

// Re-export stage functions for callers composing their own pipeline
pub use nms::suppress;
pub use postprocessing::{decode, unmap};
pub use preprocessing::{LetterboxParams, LetterboxResult, encode, letterbox};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
