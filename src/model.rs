// yolo-detect 🚀 AGPL-3.0 License

//! ONNX Runtime inference backend.
//!
//! [`OnnxEngine`] wraps an `ort` session and implements
//! [`InferenceEngine`]. A returned engine has already completed a warm-up
//! pass, so there is no externally observable half-initialized state.

use std::path::Path;

#[cfg(feature = "coreml")]
use ort::execution_providers::CoreMLExecutionProvider;
#[cfg(feature = "nnapi")]
use ort::execution_providers::NNAPIExecutionProvider;
use ort::session::Session;
use ort::session::builder::{GraphOptimizationLevel, SessionBuilder};
use ort::value::TensorRef;

use ndarray::{Array4, ArrayView4};

use crate::engine::{InferenceEngine, RawOutput};
use crate::error::{DetectError, Result};
use crate::inference::DetectorConfig;

/// ONNX Runtime session producing raw detection output.
///
/// # Example
///
/// ```no_run
/// use yolo_detect::{DetectorConfig, OnnxEngine};
///
/// let config = DetectorConfig::default();
/// let engine = OnnxEngine::load("best.onnx", &config)?;
/// # Ok::<(), yolo_detect::DetectError>(())
/// ```
pub struct OnnxEngine {
    /// ONNX Runtime session.
    session: Session,
    /// Input tensor name.
    input_name: String,
    /// Name of the first output, the only one decoded.
    output_name: String,
}

impl OnnxEngine {
    /// Load a model from an ONNX file and warm it up.
    ///
    /// # Errors
    ///
    /// Returns [`DetectError::ModelLoad`] if the file doesn't exist, can't be
    /// loaded, or the warm-up pass fails.
    pub fn load<P: AsRef<Path>>(path: P, config: &DetectorConfig) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(DetectError::ModelLoad(format!(
                "Model file not found: {}",
                path.display()
            )));
        }

        let session = session_builder(config)?
            .commit_from_file(path)
            .map_err(|e| DetectError::ModelLoad(format!("Failed to load model: {e}")))?;

        tracing::info!(model = %path.display(), "loaded ONNX model");
        Self::from_session(session, config)
    }

    /// Load a model from in-memory bytes (e.g. a bundled asset) and warm it up.
    ///
    /// # Errors
    ///
    /// Returns [`DetectError::ModelLoad`] if the bytes are not a loadable model
    /// or the warm-up pass fails.
    pub fn from_bytes(bytes: &[u8], config: &DetectorConfig) -> Result<Self> {
        if bytes.is_empty() {
            return Err(DetectError::ModelLoad("model asset is empty".to_string()));
        }

        let session = session_builder(config)?
            .commit_from_memory(bytes)
            .map_err(|e| DetectError::ModelLoad(format!("Failed to load model: {e}")))?;

        tracing::info!(bytes = bytes.len(), "loaded ONNX model from memory");
        Self::from_session(session, config)
    }

    fn from_session(session: Session, config: &DetectorConfig) -> Result<Self> {
        let input_name = session
            .inputs
            .first()
            .map_or_else(|| "images".to_string(), |i| i.name.clone());

        let output_name = session
            .outputs
            .first()
            .map(|o| o.name.clone())
            .ok_or_else(|| DetectError::ModelLoad("model has no outputs".to_string()))?;

        let mut engine = Self {
            session,
            input_name,
            output_name,
        };
        engine.warmup(config.target_size)?;
        Ok(engine)
    }

    /// Run one forward pass on a zero tensor.
    ///
    /// This pre-allocates memory and optimizes the execution graph for faster
    /// subsequent inferences.
    fn warmup(&mut self, target_size: u32) -> Result<()> {
        let side = target_size as usize;
        let dummy_input = Array4::<f32>::zeros((1, 3, side, side));

        let output = self
            .run(dummy_input.view())
            .map_err(|e| DetectError::ModelLoad(format!("Warm-up failed: {e}")))?;

        tracing::debug!(shape = ?output.shape, "warm-up complete");
        Ok(())
    }

    /// Input tensor name.
    #[must_use]
    pub fn input_name(&self) -> &str {
        &self.input_name
    }

    /// Output tensor name.
    #[must_use]
    pub fn output_name(&self) -> &str {
        &self.output_name
    }
}

/// Create a session builder with optimizations and execution providers.
fn session_builder(config: &DetectorConfig) -> Result<SessionBuilder> {
    #[allow(unused_mut)]
    let mut builder = Session::builder().map_err(|e| {
        DetectError::ModelLoad(format!("Failed to create session builder: {e}"))
    })?;

    #[cfg(feature = "coreml")]
    {
        builder = builder
            .with_execution_providers([CoreMLExecutionProvider::default()
                .with_subgraphs(true)
                .build()])
            .map_err(|e| DetectError::ModelLoad(format!("Failed to register CoreML EP: {e}")))?;
    }

    #[cfg(feature = "nnapi")]
    {
        builder = builder
            .with_execution_providers([NNAPIExecutionProvider::default().build()])
            .map_err(|e| DetectError::ModelLoad(format!("Failed to register NNAPI EP: {e}")))?;
    }

    builder
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| DetectError::ModelLoad(format!("Failed to set optimization level: {e}")))?
        .with_intra_threads(config.num_threads)
        .map_err(|e| DetectError::ModelLoad(format!("Failed to set intra-thread count: {e}")))
}

impl InferenceEngine for OnnxEngine {
    fn run(&mut self, input: ArrayView4<'_, f32>) -> Result<RawOutput> {
        // Ensure input is contiguous in memory (CowArray)
        let input_contiguous = input.as_standard_layout();

        let input_tensor = TensorRef::from_array_view(&input_contiguous).map_err(|e| {
            DetectError::EngineExecution(format!("Failed to create input tensor: {e}"))
        })?;

        let inputs = ort::inputs![&self.input_name => input_tensor];

        let outputs = self
            .session
            .run(inputs)
            .map_err(|e| DetectError::EngineExecution(format!("Inference failed: {e}")))?;

        let output = outputs.get(self.output_name.as_str()).ok_or_else(|| {
            DetectError::EngineExecution(format!("Output '{}' not found", self.output_name))
        })?;

        // (shape, data)
        let (shape, data) = output.try_extract_tensor::<f32>().map_err(|e| {
            DetectError::EngineExecution(format!("Failed to extract output: {e}"))
        })?;

        let shape = shape
            .iter()
            .map(|&d| usize::try_from(d))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|_| {
                DetectError::EngineExecution("Output has a negative dimension".to_string())
            })?;

        Ok(RawOutput::new(data.to_vec(), shape))
    }

    fn name(&self) -> &str {
        "onnxruntime"
    }
}

impl std::fmt::Debug for OnnxEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxEngine")
            .field("input_name", &self.input_name)
            .field("output_name", &self.output_name)
            .finish_non_exhaustive()
    }
}
