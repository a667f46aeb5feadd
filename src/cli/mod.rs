// yolo-detect 🚀 AGPL-3.0 License

//! CLI module for running detection.
//!
//! This module contains the command-line interface logic, including argument parsing,
//! console logging and the `predict` command implementation.

// Modules
/// CLI arguments.
pub mod args;

/// Console output macros and verbosity.
pub mod logging;

/// Prediction logic.
pub mod predict;
