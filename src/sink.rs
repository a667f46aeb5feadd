// yolo-detect 🚀 AGPL-3.0 License

//! Downstream reporting of detection results.
//!
//! A [`ResultSink`] receives the source image together with its detections.
//! The provided [`HttpSink`] posts an [`UploadPayload`] as JSON: the image as a
//! base64 JPEG and each detection as `{classIndex, confidence, bbox}`.

use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use image::RgbImage;
use image::codecs::jpeg::JpegEncoder;
use serde::Serialize;

use crate::error::{DetectError, Result};
use crate::results::Detection;

/// JPEG quality used for uploaded images.
pub const JPEG_QUALITY: u8 = 90;

/// Connection timeout in seconds.
const CONNECT_TIMEOUT: u64 = 15;

/// Response timeout in seconds.
const READ_TIMEOUT: u64 = 30;

/// Receiver for finished detections.
///
/// Failures are reported to the caller but never invalidate the detections
/// that were already computed.
pub trait ResultSink {
    /// Deliver `detections` computed for `image`.
    ///
    /// # Errors
    ///
    /// Returns [`DetectError::Upload`] (or an encoding error) if delivery fails.
    fn accept(&self, image: &RgbImage, detections: &[Detection]) -> Result<()>;
}

/// JSON body sent to the remote service.
#[derive(Debug, Clone, Serialize)]
pub struct UploadPayload<'a> {
    /// Base64 (standard alphabet, padded) JPEG of the source image.
    pub image: String,
    /// Detections in source-image coordinates.
    pub detections: &'a [Detection],
}

impl<'a> UploadPayload<'a> {
    /// Encode `image` and borrow `detections` into a payload.
    ///
    /// # Errors
    ///
    /// Returns [`DetectError::Image`] if JPEG encoding fails.
    pub fn new(image: &RgbImage, detections: &'a [Detection]) -> Result<Self> {
        let jpeg = encode_jpeg(image, JPEG_QUALITY)?;
        Ok(Self {
            image: STANDARD.encode(jpeg),
            detections,
        })
    }

    /// Serialize to a JSON string.
    ///
    /// # Errors
    ///
    /// Returns [`DetectError::Upload`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| DetectError::Upload(format!("Failed to serialize payload: {e}")))
    }
}

/// Compress `image` as JPEG.
///
/// # Errors
///
/// Returns [`DetectError::Image`] if encoding fails.
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, quality).encode_image(image)?;
    Ok(buffer)
}

/// Sink that POSTs an [`UploadPayload`] to an HTTP endpoint.
#[derive(Debug, Clone)]
pub struct HttpSink {
    url: String,
    agent: ureq::Agent,
}

impl HttpSink {
    /// Create a sink posting to `url`.
    pub fn new(url: impl Into<String>) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_connect(Some(Duration::from_secs(CONNECT_TIMEOUT)))
            .timeout_recv_body(Some(Duration::from_secs(READ_TIMEOUT)))
            .build();

        Self {
            url: url.into(),
            agent: ureq::Agent::new_with_config(config),
        }
    }

    /// Target endpoint.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl ResultSink for HttpSink {
    fn accept(&self, image: &RgbImage, detections: &[Detection]) -> Result<()> {
        let body = UploadPayload::new(image, detections)?.to_json()?;
        let url = &self.url;

        let response = self
            .agent
            .post(url)
            .header("Content-Type", "application/json")
            .send(body)
            .map_err(|e| {
                let msg = match &e {
                    ureq::Error::StatusCode(code) => format!("{url} responded with HTTP {code}"),
                    ureq::Error::Timeout(_) => {
                        format!("Connection timed out while posting to {url}")
                    }
                    ureq::Error::Io(io_err) => format!("Network error posting to {url}: {io_err}"),
                    _ => format!("Failed to post to {url}: {e}"),
                };
                DetectError::Upload(msg)
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DetectError::Upload(format!("{url} responded with HTTP {status}")));
        }

        tracing::debug!(url = %url, count = detections.len(), "uploaded detections");
        Ok(())
    }
}
