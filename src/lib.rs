//! # rizzline
//!
//! A small HTTP backend that reads a dating-profile screenshot and suggests
//! an opening line, or suggests a reply to a pasted message.
//!
//! ## Pipeline Overview
//!
//! ```text
//! POST /rizzing (multipart "image")
//!  │
//!  ├─ 1. Upload   bytes written to a per-request temp directory
//!  ├─ 2. Crop     centred crop (spawn_blocking); falls back to the original
//!  ├─ 3. OCR      tesseract child process, fixed language
//!  ├─ 4. Clean    normalise + length-cap the OCR text
//!  ├─ 5. LLM      one chat completion, 50 output tokens, trimmed
//!  └─ 6. Cleanup  temp directory removed on every exit path
//!
//! POST /reply (JSON {"text"})
//!  └─ text as sent ─▶ LLM ─▶ trimmed reply
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rizzline::{serve, RizzPipeline, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::builder()
//!         .port(3000)
//!         .default_api_key(std::env::var("DEEPSEEK_API_KEY").unwrap_or_default())
//!         .build()?;
//!     serve(RizzPipeline::from_config(config)?).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `rizzline` binary (clap + anyhow + dotenvy + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod generate;
pub mod pipeline;
pub mod prompts;
pub mod rizz;
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ApiKey, CropHeightMode, CropSettings, ServerConfig, ServerConfigBuilder};
pub use error::{CropError, RizzError};
pub use generate::LineGenerator;
pub use pipeline::llm::{ChatCompletionsClient, CompletionClient};
pub use pipeline::ocr::{TesseractCli, TextExtractor};
pub use rizz::RizzPipeline;
pub use server::{build_router, serve, ApiError};
