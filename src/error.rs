// yolo-detect 🚀 AGPL-3.0 License

//! Error types for the detection pipeline.

use std::fmt;

/// Result type alias for detection operations.
pub type Result<T> = std::result::Result<T, DetectError>;

/// Main error type for the detection pipeline.
#[derive(Debug)]
pub enum DetectError {
    /// Source image has a zero width or height.
    InvalidImage(String),
    /// Engine output does not have the expected `1 x C x N` layout.
    MalformedOutput(String),
    /// The forward pass itself failed.
    EngineExecution(String),
    /// Model asset could not be loaded. Raised at initialization time.
    ModelLoad(String),
    /// Invalid configuration provided.
    Config(String),
    /// Error resampling or encoding images.
    Image(String),
    /// Wrapped `std::io::Error`
    Io(std::io::Error),
    /// Result sink rejected or failed to deliver a report.
    Upload(String),
}

impl fmt::Display for DetectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidImage(msg) => write!(f, "Invalid image: {msg}"),
            Self::MalformedOutput(msg) => write!(f, "Malformed output: {msg}"),
            Self::EngineExecution(msg) => write!(f, "Engine execution error: {msg}"),
            Self::ModelLoad(msg) => write!(f, "Model load error: {msg}"),
            Self::Config(msg) => write!(f, "Config error: {msg}"),
            Self::Image(msg) => write!(f, "Image error: {msg}"),
            Self::Io(err) => write!(f, "IO error: {err}"),
            Self::Upload(msg) => write!(f, "Upload error: {msg}"),
        }
    }
}

impl std::error::Error for DetectError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for DetectError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<image::ImageError> for DetectError {
    fn from(err: image::ImageError) -> Self {
        Self::Image(err.to_string())
    }
}

impl DetectError {
    /// Whether this error is a per-frame anomaly rather than a setup problem.
    ///
    /// Setup problems (missing model asset, bad configuration) should fail
    /// loudly; everything else is downgraded to an empty result by the
    /// detector's fail-soft path.
    #[must_use]
    pub const fn is_per_frame(&self) -> bool {
        matches!(
            self,
            Self::InvalidImage(_)
                | Self::MalformedOutput(_)
                | Self::EngineExecution(_)
                | Self::Image(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DetectError::InvalidImage("0x10".to_string());
        assert_eq!(err.to_string(), "Invalid image: 0x10");

        let err = DetectError::MalformedOutput("rank 2".to_string());
        assert_eq!(err.to_string(), "Malformed output: rank 2");

        let err = DetectError::EngineExecution("test".to_string());
        assert_eq!(err.to_string(), "Engine execution error: test");
    }

    #[test]
    fn test_per_frame_classification() {
        assert!(DetectError::MalformedOutput(String::new()).is_per_frame());
        assert!(DetectError::EngineExecution(String::new()).is_per_frame());
        assert!(!DetectError::ModelLoad(String::new()).is_per_frame());
        assert!(!DetectError::Config(String::new()).is_per_frame());
    }

    #[test]
    fn test_io_error_source() {
        let err: DetectError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(std::error::Error::source(&err).is_some());
    }
}
