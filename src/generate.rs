//! Line generation: render a prompt and ask the language model for one line.
//!
//! Both flows share the mechanism; only the instruction template differs.
//! All prompt wording lives in [`crate::prompts`].

use crate::config::ApiKey;
use crate::error::RizzError;
use crate::pipeline::llm::CompletionClient;
use crate::prompts::PromptRequest;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Turns subject text into a single generated line.
#[derive(Clone)]
pub struct LineGenerator {
    client: Arc<dyn CompletionClient>,
}

impl LineGenerator {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self { client }
    }

    /// A flirty opening line for the text found on a dating profile.
    #[instrument(skip_all, fields(subject_chars = profile_text.chars().count()))]
    pub async fn generate_opening_line(
        &self,
        profile_text: &str,
        api_key: &ApiKey,
    ) -> Result<String, RizzError> {
        self.generate(PromptRequest::opening_line(profile_text), api_key)
            .await
    }

    /// A witty reply to a message from an ongoing conversation.
    #[instrument(skip_all, fields(subject_chars = conversation_text.chars().count()))]
    pub async fn generate_reply(
        &self,
        conversation_text: &str,
        api_key: &ApiKey,
    ) -> Result<String, RizzError> {
        self.generate(PromptRequest::reply(conversation_text), api_key)
            .await
    }

    async fn generate(
        &self,
        request: PromptRequest<'_>,
        api_key: &ApiKey,
    ) -> Result<String, RizzError> {
        let prompt = request.render();
        debug!("Prompt is {} chars", prompt.chars().count());
        let line = self.client.complete(&prompt, api_key).await?;
        // Returned lines are always trimmed, whatever the client does.
        Ok(line.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records prompts and answers with a fixed completion.
    struct Recording {
        answer: &'static str,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CompletionClient for Recording {
        async fn complete(&self, prompt: &str, _api_key: &ApiKey) -> Result<String, RizzError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.answer.to_string())
        }
    }

    struct Failing;

    #[async_trait]
    impl CompletionClient for Failing {
        async fn complete(&self, _prompt: &str, _api_key: &ApiKey) -> Result<String, RizzError> {
            Err(RizzError::LlmAuth { status: 401 })
        }
    }

    fn key() -> ApiKey {
        ApiKey::new("k").unwrap()
    }

    #[tokio::test]
    async fn opening_line_uses_profile_template() {
        let client = Arc::new(Recording {
            answer: "  Are you a campfire? \n",
            prompts: Mutex::new(Vec::new()),
        });
        let generator = LineGenerator::new(client.clone());

        let line = generator
            .generate_opening_line("Loves camping", &key())
            .await
            .unwrap();

        assert_eq!(line, "Are you a campfire?");
        let prompts = client.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("dating profile: \"Loves camping\""));
    }

    #[tokio::test]
    async fn reply_uses_conversation_template() {
        let client = Arc::new(Recording {
            answer: "Define 'up' 😏",
            prompts: Mutex::new(Vec::new()),
        });
        let generator = LineGenerator::new(client.clone());

        generator.generate_reply("hey you up?", &key()).await.unwrap();
        assert!(client.prompts.lock().unwrap()[0].starts_with("She said: \"hey you up?\""));
    }

    #[tokio::test]
    async fn client_errors_propagate_unchanged() {
        let generator = LineGenerator::new(Arc::new(Failing));
        let err = generator.generate_reply("hi", &key()).await.unwrap_err();
        assert!(matches!(err, RizzError::LlmAuth { status: 401 }));
    }
}
