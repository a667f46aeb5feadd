// yolo-detect 🚀 AGPL-3.0 License

//! Detection pipeline orchestrator.
//!
//! [`Detector`] composes letterbox, tensor encoding, the engine's forward
//! pass, decoding, unmapping and suppression into one call.
//!
//! Two entry points are provided:
//!
//! - [`Detector::try_detect`] propagates the first stage error.
//! - [`Detector::detect`] never fails: errors are logged and reported in a
//!   [`DetectOutcome`] alongside an empty detection list, so a bad frame does
//!   not abort a session while callers can still tell "nothing found" from
//!   "pipeline failed".

use std::time::Instant;

use image::RgbImage;

use crate::engine::{EngineStatus, InferenceEngine, LazyEngine};
use crate::error::{DetectError, Result};
use crate::inference::DetectorConfig;
use crate::postprocessing::postprocess;
use crate::preprocessing::{encode, letterbox};
use crate::results::{Detection, Speed};
use crate::sink::ResultSink;

/// Whether a fail-soft detection call ran to completion.
#[derive(Debug)]
pub enum DetectStatus {
    /// Every stage succeeded; an empty list means nothing was found.
    Completed,
    /// A stage failed; the detection list is empty.
    Failed(DetectError),
}

/// Result of [`Detector::detect`].
#[derive(Debug)]
pub struct DetectOutcome {
    /// Final detections in source-image coordinates, highest confidence first.
    pub detections: Vec<Detection>,
    /// Per-stage timings. Stages that did not run are `None`.
    pub speed: Speed,
    /// Completion status.
    pub status: DetectStatus,
}

impl DetectOutcome {
    fn completed(detections: Vec<Detection>, speed: Speed) -> Self {
        Self {
            detections,
            speed,
            status: DetectStatus::Completed,
        }
    }

    fn failed(error: DetectError) -> Self {
        Self {
            detections: Vec::new(),
            speed: Speed::default(),
            status: DetectStatus::Failed(error),
        }
    }

    /// `true` if every stage succeeded.
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(self.status, DetectStatus::Completed)
    }

    /// The failure, if any.
    #[must_use]
    pub const fn error(&self) -> Option<&DetectError> {
        match &self.status {
            DetectStatus::Completed => None,
            DetectStatus::Failed(e) => Some(e),
        }
    }

    /// Convert back into the strict form.
    ///
    /// # Errors
    ///
    /// Returns the stage error if the call failed.
    pub fn into_result(self) -> Result<Vec<Detection>> {
        match self.status {
            DetectStatus::Completed => Ok(self.detections),
            DetectStatus::Failed(e) => Err(e),
        }
    }
}

/// YOLO detector bound to one engine handle.
///
/// Stateless across calls except for the engine, which is constructed once
/// and used exclusively by one forward pass at a time. `Detector<E>` is
/// `Send + Sync` and can be shared behind an `Arc`.
///
/// # Example
///
/// ```no_run
/// use yolo_detect::{Detector, DetectorConfig, OnnxEngine};
///
/// let config = DetectorConfig::default();
/// let engine_config = config.clone();
/// let detector = Detector::lazy(move || OnnxEngine::load("best.onnx", &engine_config), config)?;
/// detector.initialize()?;
///
/// let image = image::open("frame.jpg").map_err(yolo_detect::DetectError::from)?.to_rgb8();
/// let outcome = detector.detect(&image);
/// println!("{} detections", outcome.detections.len());
/// # Ok::<(), yolo_detect::DetectError>(())
/// ```
pub struct Detector<E> {
    engine: LazyEngine<E>,
    config: DetectorConfig,
}

impl<E> std::fmt::Debug for Detector<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Detector")
            .field("engine", &self.engine)
            .field("config", &self.config)
            .finish()
    }
}

impl<E: InferenceEngine> Detector<E> {
    /// Create a detector around an already constructed engine.
    ///
    /// # Errors
    ///
    /// Returns [`DetectError::Config`] if `config` is invalid.
    pub fn new(engine: E, config: DetectorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            engine: LazyEngine::ready(engine),
            config,
        })
    }

    /// Create a detector whose engine is built by `factory` on first use.
    ///
    /// # Errors
    ///
    /// Returns [`DetectError::Config`] if `config` is invalid.
    pub fn lazy<F>(factory: F, config: DetectorConfig) -> Result<Self>
    where
        F: FnOnce() -> Result<E> + Send + 'static,
    {
        config.validate()?;
        Ok(Self {
            engine: LazyEngine::new(factory),
            config,
        })
    }

    /// Build the engine now instead of on the first frame.
    ///
    /// # Errors
    ///
    /// Returns [`DetectError::ModelLoad`] if the engine cannot be constructed.
    pub fn initialize(&self) -> Result<()> {
        self.engine.initialize()
    }

    /// Detector configuration.
    #[must_use]
    pub const fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// State of the engine handle.
    pub fn engine_status(&self) -> EngineStatus {
        self.engine.status()
    }

    /// Run the full pipeline with the configured thresholds.
    ///
    /// # Errors
    ///
    /// Returns the first stage error: [`DetectError::InvalidImage`],
    /// [`DetectError::ModelLoad`], [`DetectError::EngineExecution`] or
    /// [`DetectError::MalformedOutput`].
    pub fn try_detect(&self, image: &RgbImage) -> Result<(Vec<Detection>, Speed)> {
        self.run_pipeline(image, &self.config)
    }

    /// Run the full pipeline with per-call thresholds.
    ///
    /// # Errors
    ///
    /// Returns [`DetectError::Config`] if a threshold is out of range, otherwise
    /// as [`Detector::try_detect`].
    pub fn try_detect_with_thresholds(
        &self,
        image: &RgbImage,
        confidence: f32,
        iou: f32,
    ) -> Result<(Vec<Detection>, Speed)> {
        let config = self.config.clone().with_confidence(confidence).with_iou(iou);
        config.validate()?;
        self.run_pipeline(image, &config)
    }

    /// Fail-soft detection with the configured thresholds.
    pub fn detect(&self, image: &RgbImage) -> DetectOutcome {
        soften(self.try_detect(image))
    }

    /// Fail-soft detection with per-call thresholds.
    pub fn detect_with_thresholds(
        &self,
        image: &RgbImage,
        confidence: f32,
        iou: f32,
    ) -> DetectOutcome {
        soften(self.try_detect_with_thresholds(image, confidence, iou))
    }

    /// Detect, then hand completed results to `sink`.
    ///
    /// The sink result is `None` when detection failed (nothing is reported).
    /// A sink failure is logged and returned but leaves the detections intact.
    pub fn detect_and_report<S>(
        &self,
        image: &RgbImage,
        sink: &S,
    ) -> (DetectOutcome, Option<Result<()>>)
    where
        S: ResultSink + ?Sized,
    {
        let outcome = self.detect(image);
        if !outcome.is_completed() {
            return (outcome, None);
        }

        let delivery = sink.accept(image, &outcome.detections);
        if let Err(e) = &delivery {
            tracing::warn!("failed to report detections: {e}");
        }
        (outcome, Some(delivery))
    }

    fn run_pipeline(
        &self,
        image: &RgbImage,
        config: &DetectorConfig,
    ) -> Result<(Vec<Detection>, Speed)> {
        let start = Instant::now();
        let letterboxed = letterbox(image, config.target_size)?;
        let tensor = encode(&letterboxed.canvas)?;
        let preprocess_time = elapsed_ms(start);

        let start = Instant::now();
        let output = self.engine.run(tensor.view())?;
        let inference_time = elapsed_ms(start);

        let start = Instant::now();
        let detections = postprocess(&output, &letterboxed.params, config)?;
        let postprocess_time = elapsed_ms(start);

        Ok((
            detections,
            Speed::new(preprocess_time, inference_time, postprocess_time),
        ))
    }
}

fn soften(result: Result<(Vec<Detection>, Speed)>) -> DetectOutcome {
    match result {
        Ok((detections, speed)) => DetectOutcome::completed(detections, speed),
        Err(e) => {
            if e.is_per_frame() {
                tracing::warn!("detection failed, returning no detections: {e}");
            } else {
                tracing::error!("detection failed, returning no detections: {e}");
            }
            DetectOutcome::failed(e)
        }
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

#[cfg(feature = "async")]
mod task {
    use std::future::Future;
    use std::sync::Arc;

    use image::RgbImage;

    use super::{DetectOutcome, Detector};
    use crate::engine::InferenceEngine;
    use crate::error::DetectError;

    /// Run [`Detector::detect`] on the blocking thread pool.
    pub async fn detect_async<E>(detector: Arc<Detector<E>>, image: RgbImage) -> DetectOutcome
    where
        E: InferenceEngine + 'static,
    {
        let handle = tokio::task::spawn_blocking(move || detector.detect(&image));
        match handle.await {
            Ok(outcome) => outcome,
            Err(e) => DetectOutcome::failed(DetectError::EngineExecution(format!(
                "detection task failed: {e}"
            ))),
        }
    }

    /// Race detection against `cancel`.
    ///
    /// Returns `None` if `cancel` resolves first, or is already resolved when
    /// the race starts. The in-flight call still runs to completion on the
    /// blocking pool; its result is dropped.
    pub async fn detect_cancellable<E, C>(
        detector: Arc<Detector<E>>,
        image: RgbImage,
        cancel: C,
    ) -> Option<DetectOutcome>
    where
        E: InferenceEngine + 'static,
        C: Future<Output = ()>,
    {
        tokio::select! {
            biased;
            () = cancel => {
                tracing::debug!("detection abandoned by caller");
                None
            }
            outcome = detect_async(detector, image) => Some(outcome),
        }
    }
}

#[cfg(feature = "async")]
pub use task::{detect_async, detect_cancellable};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::RawOutput;
    use crate::geometry::Rect;
    use ndarray::ArrayView4;
    use std::sync::Mutex;

    /// Engine that returns one fixed output, recording the input shape.
    struct MockEngine {
        output: RawOutput,
        seen: Vec<Vec<usize>>,
    }

    impl MockEngine {
        fn with_boxes(boxes: &[([f32; 4], usize, f32)]) -> Self {
            let channels = 10;
            let anchors = boxes.len();
            let mut data = vec![-10.0; channels * anchors];
            for (i, (rect, class, obj)) in boxes.iter().enumerate() {
                for (r, v) in rect.iter().enumerate() {
                    data[r * anchors + i] = *v;
                }
                data[4 * anchors + i] = *obj;
                data[(5 + class) * anchors + i] = 10.0;
            }
            Self {
                output: RawOutput::new(data, vec![1, channels, anchors]),
                seen: Vec::new(),
            }
        }
    }

    impl InferenceEngine for MockEngine {
        fn run(&mut self, input: ArrayView4<'_, f32>) -> Result<RawOutput> {
            self.seen.push(input.shape().to_vec());
            Ok(self.output.clone())
        }
    }

    struct FailingEngine;

    impl InferenceEngine for FailingEngine {
        fn run(&mut self, _input: ArrayView4<'_, f32>) -> Result<RawOutput> {
            Err(DetectError::EngineExecution("device lost".to_string()))
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        fail: bool,
        received: Mutex<Vec<usize>>,
    }

    impl ResultSink for RecordingSink {
        fn accept(&self, _image: &RgbImage, detections: &[Detection]) -> Result<()> {
            self.received.lock().unwrap().push(detections.len());
            if self.fail {
                Err(DetectError::Upload("HTTP 503".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn image(w: u32, h: u32) -> RgbImage {
        RgbImage::from_pixel(w, h, image::Rgb([40, 80, 120]))
    }

    #[test]
    fn test_detect_maps_to_source_space() {
        // 1024x512 source: scale 0.5, pad_y 128
        let engine = MockEngine::with_boxes(&[([100.0, 178.0, 200.0, 278.0], 2, 10.0)]);
        let detector = Detector::new(engine, DetectorConfig::default()).unwrap();

        let (detections, speed) = detector.try_detect(&image(1024, 512)).unwrap();
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].class_index, 2);
        let expected = Rect::new(200.0, 100.0, 400.0, 300.0);
        for (a, b) in detections[0].bounding_box.to_array().iter().zip(expected.to_array()) {
            assert!((a - b).abs() < 1e-3);
        }
        assert!(speed.inference.is_some());
    }

    #[test]
    fn test_engine_sees_square_input() {
        let engine = MockEngine::with_boxes(&[]);
        let config = DetectorConfig::default().with_target_size(64);
        let detector = Detector::new(engine, config).unwrap();
        assert!(detector.detect(&image(30, 90)).is_completed());
        let seen = detector
            .engine
            .with_engine(|e| Ok(e.seen.clone()))
            .unwrap();
        assert_eq!(seen, vec![vec![1, 3, 64, 64]]);
    }

    #[test]
    fn test_detect_zero_detections_is_completed() {
        let engine = MockEngine::with_boxes(&[]);
        let detector = Detector::new(engine, DetectorConfig::default()).unwrap();
        let outcome = detector.detect(&image(100, 100));
        assert!(outcome.is_completed());
        assert!(outcome.detections.is_empty());
        assert!(outcome.error().is_none());
    }

    #[test]
    fn test_detect_fails_soft() {
        let detector = Detector::new(FailingEngine, DetectorConfig::default()).unwrap();
        let outcome = detector.detect(&image(100, 100));
        assert!(outcome.detections.is_empty());
        assert!(matches!(outcome.error(), Some(DetectError::EngineExecution(_))));
        assert!(detector.try_detect(&image(100, 100)).is_err());
    }

    #[test]
    fn test_detect_invalid_image_fails_soft() {
        let engine = MockEngine::with_boxes(&[]);
        let detector = Detector::new(engine, DetectorConfig::default()).unwrap();
        let outcome = detector.detect(&RgbImage::new(0, 10));
        assert!(matches!(outcome.error(), Some(DetectError::InvalidImage(_))));
    }

    #[test]
    fn test_detect_malformed_output_fails_soft() {
        let mut engine = MockEngine::with_boxes(&[]);
        engine.output = RawOutput::new(vec![0.0; 8], vec![1, 8, 1]);
        let detector = Detector::new(engine, DetectorConfig::default()).unwrap();
        let outcome = detector.detect(&image(50, 50));
        assert!(matches!(outcome.into_result(), Err(DetectError::MalformedOutput(_))));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = DetectorConfig::default().with_confidence(2.0);
        assert!(matches!(
            Detector::new(FailingEngine, config),
            Err(DetectError::Config(_))
        ));
    }

    #[test]
    fn test_lazy_factory_failure_reports_model_load() {
        let detector: Detector<MockEngine> = Detector::lazy(
            || Err(DetectError::ModelLoad("best.onnx missing".to_string())),
            DetectorConfig::default(),
        )
        .unwrap();
        assert_eq!(detector.engine_status(), EngineStatus::Uninitialized);
        assert!(matches!(detector.initialize(), Err(DetectError::ModelLoad(_))));

        let outcome = detector.detect(&image(10, 10));
        assert!(matches!(outcome.error(), Some(DetectError::ModelLoad(_))));
        assert!(matches!(detector.engine_status(), EngineStatus::Failed(_)));
    }

    #[test]
    fn test_thresholds_per_call() {
        // obj logit 0 -> score ~0.5
        let engine = MockEngine::with_boxes(&[([10.0, 10.0, 100.0, 100.0], 0, 0.0)]);
        let config = DetectorConfig::default().with_target_size(512);
        let detector = Detector::new(engine, config).unwrap();
        let img = image(512, 512);

        assert_eq!(detector.detect_with_thresholds(&img, 0.4, 0.45).detections.len(), 1);
        assert_eq!(detector.detect_with_thresholds(&img, 0.6, 0.45).detections.len(), 0);
        assert!(matches!(
            detector.detect_with_thresholds(&img, 0.4, -1.0).error(),
            Some(DetectError::Config(_))
        ));
    }

    #[test]
    fn test_detect_and_report() {
        let engine = MockEngine::with_boxes(&[([10.0, 10.0, 100.0, 100.0], 1, 10.0)]);
        let detector = Detector::new(engine, DetectorConfig::default()).unwrap();

        let sink = RecordingSink::default();
        let (outcome, delivery) = detector.detect_and_report(&image(512, 512), &sink);
        assert_eq!(outcome.detections.len(), 1);
        assert!(matches!(delivery, Some(Ok(()))));
        assert_eq!(*sink.received.lock().unwrap(), vec![1]);

        let failing = RecordingSink {
            fail: true,
            ..RecordingSink::default()
        };
        let (outcome, delivery) = detector.detect_and_report(&image(512, 512), &failing);
        assert_eq!(outcome.detections.len(), 1);
        assert!(matches!(delivery, Some(Err(DetectError::Upload(_)))));
    }

    #[test]
    fn test_failed_detection_not_reported() {
        let detector = Detector::new(FailingEngine, DetectorConfig::default()).unwrap();
        let sink = RecordingSink::default();
        let (outcome, delivery) = detector.detect_and_report(&image(64, 64), &sink);
        assert!(!outcome.is_completed());
        assert!(delivery.is_none());
        assert!(sink.received.lock().unwrap().is_empty());
    }

    #[cfg(feature = "async")]
    #[tokio::test]
    async fn test_detect_async() {
        use std::sync::Arc;

        let engine = MockEngine::with_boxes(&[([10.0, 10.0, 100.0, 100.0], 4, 10.0)]);
        let detector = Arc::new(Detector::new(engine, DetectorConfig::default()).unwrap());

        let outcome = detect_async(Arc::clone(&detector), image(512, 512)).await;
        assert_eq!(outcome.detections.len(), 1);
        assert_eq!(outcome.detections[0].class_index, 4);
    }

    /// Engine that holds the forward pass for a fixed time.
    #[cfg(feature = "async")]
    struct SlowEngine(std::time::Duration);

    #[cfg(feature = "async")]
    impl InferenceEngine for SlowEngine {
        fn run(&mut self, _input: ArrayView4<'_, f32>) -> Result<RawOutput> {
            std::thread::sleep(self.0);
            Ok(RawOutput::new(Vec::new(), vec![1, 10, 0]))
        }
    }

    #[cfg(feature = "async")]
    #[tokio::test]
    async fn test_detect_cancelled() {
        use std::sync::Arc;
        use std::time::Duration;

        let detector = Arc::new(
            Detector::new(SlowEngine(Duration::from_millis(200)), DetectorConfig::default())
                .unwrap(),
        );

        let outcome =
            detect_cancellable(Arc::clone(&detector), image(512, 512), std::future::ready(()))
                .await;
        assert!(outcome.is_none());

        let cancel = tokio::time::sleep(Duration::from_millis(10));
        let outcome = detect_cancellable(Arc::clone(&detector), image(512, 512), cancel).await;
        assert!(outcome.is_none());
    }

    #[cfg(feature = "async")]
    #[tokio::test]
    async fn test_detect_not_cancelled() {
        use std::sync::Arc;
        use std::time::Duration;

        let detector = Arc::new(
            Detector::new(SlowEngine(Duration::from_millis(20)), DetectorConfig::default())
                .unwrap(),
        );
        let outcome = detect_cancellable(detector, image(512, 512), std::future::pending()).await;
        assert!(outcome.is_some_and(|o| o.is_completed()));
    }
}
