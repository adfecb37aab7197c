//! Configuration types for the rizzline server.
//!
//! All process-wide settings live in one immutable [`ServerConfig`], built
//! once at startup via [`ServerConfigBuilder`] and then shared read-only
//! (behind an `Arc`) by every request. Nothing in the request path reads the
//! environment directly.

use crate::error::RizzError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

/// Origins accepted cross-origin when none are configured.
pub const DEFAULT_ALLOWED_ORIGINS: [&str; 3] = [
    "http://localhost:5173",
    "http://localhost:3000",
    "https://rizzing-frontend.netlify.app",
];

/// Request header carrying a caller-supplied API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Configuration for the rizzline HTTP server.
///
/// # Example
/// ```rust
/// use rizzline::ServerConfig;
///
/// let config = ServerConfig::builder()
///     .port(8080)
///     .default_api_key("sk-test")
///     .build()
///     .unwrap();
/// assert_eq!(config.port, 8080);
/// ```
#[derive(Clone)]
pub struct ServerConfig {
    /// Listening port. Default: 3000.
    pub port: u16,

    /// Listening address. Default: `0.0.0.0`.
    pub bind_addr: IpAddr,

    /// Key used when a request carries no `x-api-key` header.
    ///
    /// When `None`, every request must supply its own key.
    pub default_api_key: Option<ApiKey>,

    /// Exact origins allowed to call the API from a browser.
    /// Requests without an `Origin` header are always accepted.
    pub allowed_origins: Vec<String>,

    /// Base URL of the OpenAI-compatible provider. Default: `https://api.deepseek.com`.
    pub llm_base_url: String,

    /// Chat model identifier. Default: `deepseek-chat`.
    pub model: String,

    /// Output-token budget per completion. Default: 50.
    ///
    /// A pickup line is one sentence; 50 tokens is enough and keeps replies short.
    pub max_tokens: u32,

    /// Per-completion timeout in seconds. Default: 30.
    pub api_timeout_secs: u64,

    /// OCR timeout in seconds. Default: 30.
    pub ocr_timeout_secs: u64,

    /// Tesseract language code. Default: `eng`.
    pub ocr_language: String,

    /// Tesseract executable name or path. Default: `tesseract`.
    pub tesseract_cmd: String,

    /// Directory that holds per-request temporary files. Default: `uploads`.
    pub upload_dir: PathBuf,

    /// Largest accepted request body in bytes. Default: 10 MiB.
    pub max_upload_bytes: usize,

    /// Longest OCR text (in characters) interpolated into a prompt. Default: 4000.
    pub max_subject_chars: usize,

    /// Screenshot crop geometry.
    pub crop: CropSettings,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            default_api_key: None,
            allowed_origins: DEFAULT_ALLOWED_ORIGINS
                .iter()
                .map(|o| o.to_string())
                .collect(),
            llm_base_url: "https://api.deepseek.com".to_string(),
            model: "deepseek-chat".to_string(),
            max_tokens: 50,
            api_timeout_secs: 30,
            ocr_timeout_secs: 30,
            ocr_language: "eng".to_string(),
            tesseract_cmd: "tesseract".to_string(),
            upload_dir: PathBuf::from("uploads"),
            max_upload_bytes: 10 * 1024 * 1024,
            max_subject_chars: 4000,
            crop: CropSettings::default(),
        }
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("port", &self.port)
            .field("bind_addr", &self.bind_addr)
            .field("default_api_key", &self.default_api_key)
            .field("allowed_origins", &self.allowed_origins)
            .field("llm_base_url", &self.llm_base_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("ocr_timeout_secs", &self.ocr_timeout_secs)
            .field("ocr_language", &self.ocr_language)
            .field("tesseract_cmd", &self.tesseract_cmd)
            .field("upload_dir", &self.upload_dir)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("max_subject_chars", &self.max_subject_chars)
            .field("crop", &self.crop)
            .finish()
    }
}

impl ServerConfig {
    /// Create a new builder for `ServerConfig`.
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder {
            config: Self::default(),
        }
    }

    /// Socket address the server binds to.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }

    /// Pick the caller's key when present and non-blank, else the configured default.
    pub fn resolve_api_key(&self, header_value: Option<&str>) -> Option<ApiKey> {
        header_value
            .and_then(ApiKey::new)
            .or_else(|| self.default_api_key.clone())
    }

    /// Whether a browser `Origin` is on the allow-list.
    pub fn is_origin_allowed(&self, origin: &str) -> bool {
        self.allowed_origins.iter().any(|o| o == origin)
    }
}

/// Builder for [`ServerConfig`].
#[derive(Debug)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn bind_addr(mut self, addr: IpAddr) -> Self {
        self.config.bind_addr = addr;
        self
    }

    /// Set the fallback API key. Blank keys are ignored.
    pub fn default_api_key(mut self, key: impl AsRef<str>) -> Self {
        self.config.default_api_key = ApiKey::new(key.as_ref());
        self
    }

    /// Replace the origin allow-list. Blank entries are dropped and
    /// trailing slashes removed, since browsers never send them.
    pub fn allowed_origins<I, S>(mut self, origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.config.allowed_origins = origins
            .into_iter()
            .map(|o| o.as_ref().trim().trim_end_matches('/').to_string())
            .filter(|o| !o.is_empty())
            .collect();
        self
    }

    pub fn llm_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.llm_base_url = url.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn max_tokens(mut self, n: u32) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn ocr_timeout_secs(mut self, secs: u64) -> Self {
        self.config.ocr_timeout_secs = secs;
        self
    }

    pub fn ocr_language(mut self, lang: impl Into<String>) -> Self {
        self.config.ocr_language = lang.into();
        self
    }

    pub fn tesseract_cmd(mut self, cmd: impl Into<String>) -> Self {
        self.config.tesseract_cmd = cmd.into();
        self
    }

    pub fn upload_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.upload_dir = dir.into();
        self
    }

    pub fn max_upload_bytes(mut self, n: usize) -> Self {
        self.config.max_upload_bytes = n;
        self
    }

    pub fn max_subject_chars(mut self, n: usize) -> Self {
        self.config.max_subject_chars = n;
        self
    }

    pub fn crop(mut self, crop: CropSettings) -> Self {
        self.config.crop = crop;
        self
    }

    pub fn crop_height_mode(mut self, mode: CropHeightMode) -> Self {
        self.config.crop.height_mode = mode;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ServerConfig, RizzError> {
        let c = &self.config;
        if c.port == 0 {
            return Err(RizzError::InvalidConfig("Port must be non-zero".into()));
        }
        if c.model.trim().is_empty() {
            return Err(RizzError::InvalidConfig("Model must not be empty".into()));
        }
        if !(c.llm_base_url.starts_with("http://") || c.llm_base_url.starts_with("https://")) {
            return Err(RizzError::InvalidConfig(format!(
                "LLM base URL must be http(s), got '{}'",
                c.llm_base_url
            )));
        }
        if c.max_tokens == 0 {
            return Err(RizzError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        if c.api_timeout_secs == 0 || c.ocr_timeout_secs == 0 {
            return Err(RizzError::InvalidConfig("Timeouts must be ≥ 1s".into()));
        }
        if c.ocr_language.trim().is_empty() {
            return Err(RizzError::InvalidConfig(
                "OCR language must not be empty".into(),
            ));
        }
        if c.max_subject_chars == 0 {
            return Err(RizzError::InvalidConfig(
                "max_subject_chars must be ≥ 1".into(),
            ));
        }
        c.crop.validate()?;
        Ok(self.config)
    }
}

// ── API key ──────────────────────────────────────────────────────────────

/// A provider API key. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Wrap a key, rejecting blank input.
    pub fn new(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

// ── Crop settings ────────────────────────────────────────────────────────

/// Geometry knobs for the centred screenshot crop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropSettings {
    /// Upper bound on the crop width in pixels. Default: 600.
    pub max_width: u32,
    /// Upper bound on the crop height in pixels. Default: 400.
    pub max_height: u32,
    /// Fraction of each source dimension to keep. Default: 0.5.
    pub ratio: f64,
    /// The source is shrunk to fit this square box before extraction. Default: 800.
    pub bounding_box: u32,
    /// Which height is used for the extracted region.
    pub height_mode: CropHeightMode,
}

impl Default for CropSettings {
    fn default() -> Self {
        Self {
            max_width: 600,
            max_height: 400,
            ratio: 0.5,
            bounding_box: 800,
            height_mode: CropHeightMode::default(),
        }
    }
}

impl CropSettings {
    fn validate(&self) -> Result<(), RizzError> {
        if !(self.ratio > 0.0 && self.ratio <= 1.0) {
            return Err(RizzError::InvalidConfig(format!(
                "Crop ratio must be in (0, 1], got {}",
                self.ratio
            )));
        }
        if self.max_width == 0 || self.max_height == 0 || self.bounding_box == 0 {
            return Err(RizzError::InvalidConfig(
                "Crop dimensions must be ≥ 1".into(),
            ));
        }
        Ok(())
    }
}

/// Height of the region extracted from the downscaled screenshot.
///
/// | Mode | Extracted region |
/// |------|------------------|
/// | `Independent` | `crop_width × crop_height` (default) |
/// | `MirrorWidth` | `crop_width × crop_width`, the legacy square crop |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CropHeightMode {
    #[default]
    Independent,
    MirrorWidth,
}
