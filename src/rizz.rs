//! The two request flows, independent of HTTP.
//!
//! ```text
//! opening line:  bytes ─▶ workspace ─▶ crop ─▶ ocr ─▶ clean ─▶ generate ─▶ line
//! reply:         text ─▶ generate ─▶ reply
//! ```
//!
//! Both return [`RizzError`] with the failing cause intact; deciding what a
//! caller may see is the HTTP layer's job.

use crate::config::{ApiKey, ServerConfig};
use crate::error::RizzError;
use crate::generate::LineGenerator;
use crate::pipeline::crop::crop_image;
use crate::pipeline::llm::{ChatCompletionsClient, CompletionClient};
use crate::pipeline::ocr::{TesseractCli, TextExtractor};
use crate::pipeline::postprocess::clean_ocr_text;
use crate::pipeline::upload::RequestWorkspace;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Everything a request needs, shared across requests.
#[derive(Clone)]
pub struct RizzPipeline {
    config: Arc<ServerConfig>,
    extractor: Arc<dyn TextExtractor>,
    generator: LineGenerator,
}

impl RizzPipeline {
    pub fn new(
        config: Arc<ServerConfig>,
        extractor: Arc<dyn TextExtractor>,
        completions: Arc<dyn CompletionClient>,
    ) -> Self {
        Self {
            config,
            extractor,
            generator: LineGenerator::new(completions),
        }
    }

    /// Production wiring: Tesseract for OCR, the configured chat-completions endpoint for the LLM.
    pub fn from_config(config: ServerConfig) -> Result<Self, RizzError> {
        let extractor = Arc::new(TesseractCli::from_config(&config));
        let completions = Arc::new(ChatCompletionsClient::from_config(&config)?);
        Ok(Self::new(Arc::new(config), extractor, completions))
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Screenshot → opening line.
    ///
    /// The workspace holding the upload and the cropped copy is removed before
    /// this returns, on success and on every error path.
    pub async fn opening_line_from_screenshot(
        &self,
        image: &[u8],
        api_key: &ApiKey,
    ) -> Result<String, RizzError> {
        let start = Instant::now();
        let workspace = RequestWorkspace::create(&self.config.upload_dir, image).await?;
        let result = self.screenshot_to_line(&workspace, api_key).await;
        workspace.close().await;
        info!(
            "Opening-line flow finished in {:?} (ok = {})",
            start.elapsed(),
            result.is_ok()
        );
        result
    }

    async fn screenshot_to_line(
        &self,
        workspace: &RequestWorkspace,
        api_key: &ApiKey,
    ) -> Result<String, RizzError> {
        let outcome = crop_image(
            workspace.upload_path(),
            workspace.cropped_path(),
            &self.config.crop,
        )
        .await?;
        debug!("Crop outcome: {:?}", outcome);

        let raw = self
            .extractor
            .extract_text(workspace.cropped_path())
            .await?;
        let text = clean_ocr_text(&raw, self.config.max_subject_chars);
        info!("OCR text: {} chars", text.chars().count());
        debug!("OCR text: {:?}", text);

        self.generator.generate_opening_line(&text, api_key).await
    }

    /// Conversation text → reply. The text reaches the prompt verbatim.
    pub async fn reply_to_conversation(
        &self,
        conversation_text: &str,
        api_key: &ApiKey,
    ) -> Result<String, RizzError> {
        self.generator
            .generate_reply(conversation_text, api_key)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::Mutex;

    /// Reports whether the OCR input existed and echoes fixed text.
    struct StubOcr {
        seen: Mutex<Vec<(std::path::PathBuf, bool)>>,
        fail: bool,
    }

    #[async_trait]
    impl TextExtractor for StubOcr {
        async fn extract_text(&self, image: &Path) -> Result<String, RizzError> {
            self.seen
                .lock()
                .unwrap()
                .push((image.to_path_buf(), image.exists()));
            if self.fail {
                Err(RizzError::Ocr {
                    detail: "engine crashed".into(),
                })
            } else {
                Ok("Sam, 29\r\n\r\n\r\nDog person".into())
            }
        }
    }

    struct EchoLlm;

    #[async_trait]
    impl CompletionClient for EchoLlm {
        async fn complete(&self, prompt: &str, _api_key: &ApiKey) -> Result<String, RizzError> {
            Ok(format!("  {prompt}  "))
        }
    }

    fn pipeline(upload_dir: &Path, ocr: Arc<StubOcr>, max_subject_chars: usize) -> RizzPipeline {
        let config = ServerConfig::builder()
            .upload_dir(upload_dir)
            .max_subject_chars(max_subject_chars)
            .build()
            .unwrap();
        RizzPipeline::new(Arc::new(config), ocr, Arc::new(EchoLlm))
    }

    fn key() -> ApiKey {
        ApiKey::new("k").unwrap()
    }

    #[tokio::test]
    async fn corrupt_image_still_reaches_ocr_and_workspace_is_removed() {
        let root = tempfile::tempdir().unwrap();
        let ocr = Arc::new(StubOcr {
            seen: Mutex::new(Vec::new()),
            fail: false,
        });
        let p = pipeline(root.path(), ocr.clone(), 4000);

        let line = p
            .opening_line_from_screenshot(b"definitely not an image", &key())
            .await
            .unwrap();

        assert!(line.contains("\"Sam, 29\n\nDog person\""), "got: {line}");
        let seen = ocr.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].1, "OCR input must exist when OCR runs");
        assert!(!seen[0].0.exists());
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn ocr_failure_propagates_and_workspace_is_removed() {
        let root = tempfile::tempdir().unwrap();
        let ocr = Arc::new(StubOcr {
            seen: Mutex::new(Vec::new()),
            fail: true,
        });
        let p = pipeline(root.path(), ocr, 4000);

        let err = p
            .opening_line_from_screenshot(b"bytes", &key())
            .await
            .unwrap_err();
        assert_eq!(err.stage(), "ocr");
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn reply_text_reaches_prompt_verbatim() {
        let root = tempfile::tempdir().unwrap();
        let ocr = Arc::new(StubOcr {
            seen: Mutex::new(Vec::new()),
            fail: false,
        });
        // The OCR cap must not apply to conversation text.
        let p = pipeline(root.path(), ocr.clone(), 5);
        let text = "  abcdefghij \"quoted\"\r\n\r\n\r\nend  ";

        let reply = p.reply_to_conversation(text, &key()).await.unwrap();
        assert!(
            reply.starts_with(&format!("She said: \"{text}\".")),
            "got: {reply}"
        );
        assert!(ocr.seen.lock().unwrap().is_empty());
    }
}
