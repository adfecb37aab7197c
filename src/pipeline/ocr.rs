//! Text extraction: run OCR over the (possibly cropped) screenshot.
//!
//! The engine sits behind the [`TextExtractor`] trait so the HTTP layer and
//! tests can swap it out. The production engine, [`TesseractCli`], shells out
//! to the `tesseract` binary (`tesseract <image> stdout -l <lang>`) instead of
//! linking libtesseract, so the crate builds without native OCR headers.
//!
//! Whatever text the engine produces, including an empty string, is accepted
//! as-is. There is no retry.

use crate::config::ServerConfig;
use crate::error::RizzError;
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Turns an image file into plain text.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract_text(&self, image: &Path) -> Result<String, RizzError>;
}

/// Tesseract invoked as a child process, one process per image.
#[derive(Debug, Clone)]
pub struct TesseractCli {
    command: String,
    language: String,
    timeout: Duration,
}

impl TesseractCli {
    pub fn new(command: impl Into<String>, language: impl Into<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            language: language.into(),
            timeout,
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(
            config.tesseract_cmd.clone(),
            config.ocr_language.clone(),
            Duration::from_secs(config.ocr_timeout_secs),
        )
    }
}

#[async_trait]
impl TextExtractor for TesseractCli {
    async fn extract_text(&self, image: &Path) -> Result<String, RizzError> {
        let mut cmd = Command::new(&self.command);
        cmd.arg(image)
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| RizzError::OcrTimeout {
                secs: self.timeout.as_secs(),
            })?
            .map_err(|e| RizzError::Ocr {
                detail: format!("failed to run '{}': {}", self.command, e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RizzError::Ocr {
                detail: format!("'{}' exited with {}: {}", self.command, output.status, stderr.trim()),
            });
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!("OCR produced {} chars", text.chars().count());
        Ok(text)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;

    fn fake_engine(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("fake-tesseract");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[tokio::test]
    async fn passes_image_stdout_and_language() {
        let dir = tempfile::tempdir().unwrap();
        let engine = fake_engine(dir.path(), r#"echo "$1|$2|$3|$4""#);
        let ocr = TesseractCli::new(engine.to_string_lossy(), "eng", Duration::from_secs(5));

        let text = ocr.extract_text(Path::new("/tmp/shot.png")).await.unwrap();
        assert_eq!(text.trim(), "/tmp/shot.png|stdout|-l|eng");
    }

    #[tokio::test]
    async fn empty_output_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let engine = fake_engine(dir.path(), "exit 0");
        let ocr = TesseractCli::new(engine.to_string_lossy(), "eng", Duration::from_secs(5));
        assert_eq!(ocr.extract_text(Path::new("x.png")).await.unwrap(), "");
    }

    #[tokio::test]
    async fn non_zero_exit_is_an_ocr_error() {
        let dir = tempfile::tempdir().unwrap();
        let engine = fake_engine(dir.path(), "echo 'Error opening data file' >&2; exit 1");
        let ocr = TesseractCli::new(engine.to_string_lossy(), "eng", Duration::from_secs(5));

        let err = ocr.extract_text(Path::new("x.png")).await.unwrap_err();
        assert!(matches!(err, RizzError::Ocr { .. }));
        assert!(err.to_string().contains("Error opening data file"));
    }

    #[tokio::test]
    async fn missing_binary_is_an_ocr_error() {
        let ocr = TesseractCli::new(
            "/definitely/not/tesseract",
            "eng",
            Duration::from_secs(5),
        );
        let err = ocr.extract_text(Path::new("x.png")).await.unwrap_err();
        assert!(matches!(err, RizzError::Ocr { .. }));
    }

    #[tokio::test]
    async fn slow_engine_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let engine = fake_engine(dir.path(), "sleep 5");
        let ocr = TesseractCli::new(engine.to_string_lossy(), "eng", Duration::from_millis(200));

        let err = ocr.extract_text(Path::new("x.png")).await.unwrap_err();
        assert!(matches!(err, RizzError::OcrTimeout { .. }));
    }
}
