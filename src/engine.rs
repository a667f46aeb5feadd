// yolo-detect 🚀 AGPL-3.0 License

//! Inference engine boundary.
//!
//! The pipeline only needs a forward pass that turns a `(1, 3, S, S)` input
//! into a flat `f32` output with a known shape. [`InferenceEngine`] is that
//! seam; [`LazyEngine`] owns an engine handle, constructs it at most once and
//! serializes forward passes against it.

use std::fmt;
use std::sync::Mutex;

use ndarray::ArrayView4;

use crate::error::{DetectError, Result};

/// Raw output tensor as produced by an engine: flat data plus its shape.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawOutput {
    /// Row-major tensor values.
    pub data: Vec<f32>,
    /// Tensor dimensions.
    pub shape: Vec<usize>,
}

impl RawOutput {
    /// Create a raw output from data and shape.
    #[must_use]
    pub const fn new(data: Vec<f32>, shape: Vec<usize>) -> Self {
        Self { data, shape }
    }
}

/// A loaded model able to execute forward passes.
///
/// Implementations need not be reentrant: callers hold exclusive access for
/// the duration of [`InferenceEngine::run`].
pub trait InferenceEngine: Send {
    /// Execute one forward pass.
    ///
    /// # Errors
    ///
    /// Returns [`DetectError::EngineExecution`] if the pass fails.
    fn run(&mut self, input: ArrayView4<'_, f32>) -> Result<RawOutput>;

    /// Short backend name for diagnostics.
    fn name(&self) -> &str {
        "engine"
    }
}

impl<E: InferenceEngine + ?Sized> InferenceEngine for Box<E> {
    fn run(&mut self, input: ArrayView4<'_, f32>) -> Result<RawOutput> {
        (**self).run(input)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

type Factory<E> = Box<dyn FnOnce() -> Result<E> + Send>;

enum EngineState<E> {
    Uninitialized(Factory<E>),
    Ready(E),
    Failed(String),
}

/// Observable state of a [`LazyEngine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineStatus {
    /// Factory not run yet.
    Uninitialized,
    /// Engine constructed and usable.
    Ready,
    /// Construction failed; the reason is kept for every later call.
    Failed(String),
}

/// Initialize-once, exclusive-use holder for an engine handle.
///
/// `Uninitialized -> Ready | Failed`. The factory runs on first use, under
/// the same lock that serializes forward passes, so no caller ever sees a
/// half-constructed engine and the factory never runs twice. `Failed` is
/// terminal.
pub struct LazyEngine<E> {
    state: Mutex<EngineState<E>>,
}

impl<E: InferenceEngine> LazyEngine<E> {
    /// Wrap a factory that will build the engine on first use.
    pub fn new<F>(factory: F) -> Self
    where
        F: FnOnce() -> Result<E> + Send + 'static,
    {
        Self {
            state: Mutex::new(EngineState::Uninitialized(Box::new(factory))),
        }
    }

    /// Wrap an engine that is already constructed.
    pub fn ready(engine: E) -> Self {
        Self {
            state: Mutex::new(EngineState::Ready(engine)),
        }
    }

    /// Current state.
    pub fn status(&self) -> EngineStatus {
        match self.state.lock() {
            Ok(guard) => match &*guard {
                EngineState::Uninitialized(_) => EngineStatus::Uninitialized,
                EngineState::Ready(_) => EngineStatus::Ready,
                EngineState::Failed(reason) => EngineStatus::Failed(reason.clone()),
            },
            Err(_) => EngineStatus::Failed("engine lock poisoned".to_string()),
        }
    }

    /// Construct the engine now if it has not been yet.
    ///
    /// # Errors
    ///
    /// Returns [`DetectError::ModelLoad`] if construction fails or failed before.
    pub fn initialize(&self) -> Result<()> {
        self.with_engine(|_| Ok(()))
    }

    /// Run `f` with exclusive access to the engine, constructing it first if needed.
    ///
    /// # Errors
    ///
    /// Returns [`DetectError::ModelLoad`] if the engine cannot be constructed,
    /// [`DetectError::EngineExecution`] if the lock is poisoned, or whatever `f` returns.
    pub fn with_engine<R>(&self, f: impl FnOnce(&mut E) -> Result<R>) -> Result<R> {
        let mut guard = self
            .state
            .lock()
            .map_err(|_| DetectError::EngineExecution("engine lock poisoned".to_string()))?;

        if matches!(&*guard, EngineState::Uninitialized(_)) {
            let pending = std::mem::replace(
                &mut *guard,
                EngineState::Failed("initialization interrupted".to_string()),
            );
            if let EngineState::Uninitialized(factory) = pending {
                *guard = match factory() {
                    Ok(engine) => {
                        tracing::info!(engine = engine.name(), "inference engine ready");
                        EngineState::Ready(engine)
                    }
                    Err(e) => {
                        tracing::error!("inference engine initialization failed: {e}");
                        EngineState::Failed(e.to_string())
                    }
                };
            }
        }

        match &mut *guard {
            EngineState::Ready(engine) => f(engine),
            EngineState::Failed(reason) => Err(DetectError::ModelLoad(reason.clone())),
            EngineState::Uninitialized(_) => Err(DetectError::ModelLoad(
                "engine not initialized".to_string(),
            )),
        }
    }

    /// Execute one forward pass.
    ///
    /// # Errors
    ///
    /// See [`LazyEngine::with_engine`] and [`InferenceEngine::run`].
    pub fn run(&self, input: ArrayView4<'_, f32>) -> Result<RawOutput> {
        self.with_engine(|engine| engine.run(input))
    }
}

impl<E> fmt::Debug for LazyEngine<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state.lock() {
            Ok(guard) => match &*guard {
                EngineState::Uninitialized(_) => "uninitialized",
                EngineState::Ready(_) => "ready",
                EngineState::Failed(_) => "failed",
            },
            Err(_) => "poisoned",
        };
        f.debug_struct("LazyEngine").field("state", &state).finish()
    }
}
