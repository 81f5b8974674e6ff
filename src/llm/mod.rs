//! Text-generation client.
//!
//! Thin wrapper over an OpenAI-compatible or Ollama completion endpoint. The
//! call is bounded by a configured timeout; any failure surfaces as
//! `GenerationUnavailable` so the answer pipeline can fall back to its
//! extractive summary instead of erroring out to the end user.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use crate::errors::CivicRagError;
use crate::errors::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LlmProvider {
    OpenAI,
    Ollama,
}

/// Client for the opaque text-completion capability.
pub struct LlmService {
    provider: LlmProvider,
    endpoint: String,
    api_key: String,
    model: String,
    timeout: Duration,
    client: Client,
}

impl LlmService {
    pub fn new(config: &crate::config::AppConfig) -> Result<Self> {
        Self::from_parts(
            config.llm_endpoint(),
            config.llm_key(),
            config.llm_model(),
            Duration::from_secs(config.llm_timeout_secs()),
        )
    }

    pub fn from_parts(
        endpoint: &str,
        api_key: &str,
        model: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let provider = if api_key == "ollama" || !endpoint.contains("openai") {
            LlmProvider::Ollama
        } else {
            LlmProvider::OpenAI
        };

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CivicRagError::Http(e.to_string()))?;

        Ok(Self {
            provider,
            endpoint: endpoint.to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            timeout,
            client,
        })
    }

    /// Complete a prompt with default sampling parameters.
    pub async fn complete(&self, prompt: &str) -> Result<String> {
        self.complete_with_params(prompt, 0.0, 512).await
    }

    /// Complete a prompt.
    ///
    /// # Errors
    /// `GenerationUnavailable` on transport failure, non-success status,
    /// malformed payload, or timeout. Callers recover via the extractive
    /// fallback; this error never reaches the end user directly.
    pub async fn complete_with_params(
        &self,
        prompt: &str,
        temperature: f32,
        max_tokens: usize,
    ) -> Result<String> {
        let request: std::pin::Pin<Box<dyn std::future::Future<Output = Result<String>>>> =
            match self.provider {
                LlmProvider::Ollama => {
                    Box::pin(self.complete_ollama(prompt, temperature, max_tokens))
                }
                LlmProvider::OpenAI => {
                    Box::pin(self.complete_openai(prompt, temperature, max_tokens))
                }
            };

        match tokio::time::timeout(self.timeout, request).await {
            Ok(result) => result,
            Err(_) => Err(CivicRagError::GenerationUnavailable(format!(
                "generation timed out after {:?}",
                self.timeout
            ))),
        }
    }

    async fn complete_ollama(
        &self,
        prompt: &str,
        temperature: f32,
        max_tokens: usize,
    ) -> Result<String> {
        #[derive(Serialize)]
        struct Options {
            temperature: f32,
            num_predict: usize,
        }

        #[derive(Serialize)]
        struct OllamaRequest<'a> {
            model: &'a str,
            prompt: &'a str,
            stream: bool,
            options: Options,
        }

        #[derive(Deserialize)]
        struct OllamaResponse {
            response: String,
        }

        let url = format!("{}/api/generate", self.endpoint);
        debug!("Calling Ollama generate API: {url}");

        let response = self
            .client
            .post(&url)
            .json(&OllamaRequest {
                model: &self.model,
                prompt,
                stream: false,
                options: Options {
                    temperature,
                    num_predict: max_tokens,
                },
            })
            .send()
            .await
            .map_err(|e| CivicRagError::GenerationUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CivicRagError::GenerationUnavailable(format!(
                "Ollama API error: {}",
                response.status()
            )));
        }

        let result: OllamaResponse = response
            .json()
            .await
            .map_err(|e| CivicRagError::GenerationUnavailable(e.to_string()))?;
        Ok(result.response)
    }

    async fn complete_openai(
        &self,
        prompt: &str,
        temperature: f32,
        max_tokens: usize,
    ) -> Result<String> {
        #[derive(Serialize)]
        struct Message<'a> {
            role: &'a str,
            content: &'a str,
        }

        #[derive(Serialize)]
        struct ChatRequest<'a> {
            model: &'a str,
            messages: Vec<Message<'a>>,
            temperature: f32,
            max_tokens: usize,
        }

        #[derive(Deserialize)]
        struct Choice {
            message: MessageOut,
        }

        #[derive(Deserialize)]
        struct MessageOut {
            content: String,
        }

        #[derive(Deserialize)]
        struct ChatResponse {
            choices: Vec<Choice>,
        }

        let url = format!("{}/chat/completions", self.endpoint);
        debug!("Calling OpenAI chat API: {url}");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&ChatRequest {
                model: &self.model,
                messages: vec![Message {
                    role: "user",
                    content: prompt,
                }],
                temperature,
                max_tokens,
            })
            .send()
            .await
            .map_err(|e| CivicRagError::GenerationUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CivicRagError::GenerationUnavailable(format!(
                "OpenAI API error: {}",
                response.status()
            )));
        }

        let result: ChatResponse = response
            .json()
            .await
            .map_err(|e| CivicRagError::GenerationUnavailable(e.to_string()))?;

        result
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| {
                CivicRagError::GenerationUnavailable("no choices in response".to_string())
            })
    }
}
