//! Error types for the rizzline library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`RizzError`] — **Fatal** for the request: OCR could not run, the
//!   language model failed, a temporary file could not be written, or the
//!   configuration is invalid. Every variant names its cause so logs can tell
//!   an OCR crash from a bad provider key.
//!
//! * [`CropError`] — **Recovered**: the screenshot could not be cropped. The
//!   cropper logs it and falls back to a copy of the original upload, so it
//!   never reaches a caller.
//!
//! Callers that face the outside world (the HTTP layer) collapse every
//! [`RizzError`] into one generic message; the variant detail stays in logs.

use std::path::PathBuf;
use thiserror::Error;

/// All request-fatal errors returned by the rizzline library.
#[derive(Debug, Error)]
pub enum RizzError {
    // ── Workspace errors ──────────────────────────────────────────────────
    /// A per-request temporary file or directory could not be created or written.
    #[error("Temporary workspace error at '{path}': {source}")]
    Workspace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── OCR errors ────────────────────────────────────────────────────────
    /// The OCR engine could not be started or exited unsuccessfully.
    #[error("OCR failed: {detail}")]
    Ocr { detail: String },

    /// The OCR engine did not finish within the configured timeout.
    #[error("OCR timed out after {secs}s")]
    OcrTimeout { secs: u64 },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The request never produced an HTTP response (DNS, TLS, connection reset).
    #[error("LLM transport error: {detail}")]
    LlmTransport { detail: String },

    /// The provider did not answer within the configured timeout.
    #[error("LLM call timed out after {secs}s")]
    LlmTimeout { secs: u64 },

    /// The provider rejected the API key (401/403).
    #[error("LLM authentication failed with HTTP {status}")]
    LlmAuth { status: u16 },

    /// The provider returned any other non-success status.
    #[error("LLM API error: HTTP {status}: {body}")]
    LlmApi { status: u16, body: String },

    /// The provider answered 2xx but no choice carried usable content.
    #[error("LLM response contained no usable completion")]
    EmptyCompletion,

    /// The provider answered 2xx with a body that is not a chat completion.
    #[error("LLM response could not be parsed: {detail}")]
    MalformedResponse { detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl RizzError {
    /// Short, stable label for the failing stage. Used as a structured log field.
    pub fn stage(&self) -> &'static str {
        match self {
            RizzError::Workspace { .. } => "workspace",
            RizzError::Ocr { .. } | RizzError::OcrTimeout { .. } => "ocr",
            RizzError::LlmTransport { .. }
            | RizzError::LlmTimeout { .. }
            | RizzError::LlmAuth { .. }
            | RizzError::LlmApi { .. }
            | RizzError::EmptyCompletion
            | RizzError::MalformedResponse { .. } => "llm",
            RizzError::InvalidConfig(_) => "config",
        }
    }
}

/// Why a screenshot could not be cropped. Never surfaced past the cropper.
#[derive(Debug, Error)]
pub enum CropError {
    /// Decoding, resizing or re-encoding the image failed.
    #[error("image processing failed: {0}")]
    Image(#[from] image::ImageError),

    /// The requested region does not fit inside the downscaled image.
    #[error(
        "crop region {width}x{height}+{left}+{top} exceeds downscaled image {image_width}x{image_height}"
    )]
    OutOfBounds {
        left: u32,
        top: u32,
        width: u32,
        height: u32,
        image_width: u32,
        image_height: u32,
    },

    /// The region is degenerate (zero width or height).
    #[error("crop region is empty ({width}x{height})")]
    EmptyRegion { width: u32, height: u32 },

    /// Reading the source or writing the cropped file failed.
    #[error("crop I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The blocking crop task panicked or was cancelled.
    #[error("crop task failed: {0}")]
    Join(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_error_display_has_status_only() {
        let e = RizzError::LlmAuth { status: 401 };
        let msg = e.to_string();
        assert!(msg.contains("401"), "got: {msg}");
        assert_eq!(e.stage(), "llm");
    }

    #[test]
    fn ocr_timeout_display() {
        let e = RizzError::OcrTimeout { secs: 30 };
        assert!(e.to_string().contains("30s"));
        assert_eq!(e.stage(), "ocr");
    }

    #[test]
    fn workspace_error_keeps_source() {
        use std::error::Error as _;
        let e = RizzError::Workspace {
            path: PathBuf::from("uploads/x"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope"),
        };
        assert!(e.source().is_some());
        assert!(e.to_string().contains("uploads/x"));
        assert_eq!(e.stage(), "workspace");
    }

    #[test]
    fn out_of_bounds_display() {
        let e = CropError::OutOfBounds {
            left: 300,
            top: 200,
            width: 600,
            height: 400,
            image_width: 800,
            image_height: 450,
        };
        let msg = e.to_string();
        assert!(msg.contains("600x400+300+200"), "got: {msg}");
        assert!(msg.contains("800x450"), "got: {msg}");
    }
}
