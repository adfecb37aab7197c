//! Pipeline stages for turning a screenshot into an opening line.
//!
//! Each submodule implements exactly one step, so each can be tested alone
//! and the two external engines (OCR, language model) can be replaced
//! through their traits.
//!
//! ## Data Flow
//!
//! ```text
//! upload ──▶ crop ──▶ ocr ──▶ postprocess ──▶ llm
//! (tempdir)  (image)  (tesseract) (cleanup)   (chat completion)
//! ```
//!
//! 1. [`upload`] — store the uploaded bytes in a per-request directory that is
//!    removed when the request ends, whatever the outcome
//! 2. [`crop`]   — centred crop of the screenshot; runs in `spawn_blocking`
//!    and falls back to a copy of the upload on any failure
//! 3. [`ocr`]    — extract plain text through a [`ocr::TextExtractor`]
//! 4. [`postprocess`] — normalise and length-cap the OCR text
//! 5. [`llm`]    — one chat completion through a [`llm::CompletionClient`];
//!    the only stage with network I/O

pub mod crop;
pub mod llm;
pub mod ocr;
pub mod postprocess;
pub mod upload;
