//! Agent client for communicating with the Anthropic API.

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::env;

use super::types::{ContentBlock, Message};

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "claude-haiku-4-5-20251001";

/// Single-turn client for the external text-generation collaborator.
#[derive(Clone)]
pub struct Agent {
    api_key: String,
    model: String,
    system_prompt: String,
    max_tokens: u32,
}

// Anthropic API request/response types
#[derive(Debug, Serialize)]
struct GenerationApiRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
}

#[allow(dead_code)]
#[derive(Debug, Deserialize)]
struct GenerationApiResponse {
    content: Vec<ContentBlock>,
    stop_reason: Option<String>,
}

impl Agent {
    pub fn builder() -> AgentBuilder {
        AgentBuilder::default()
    }

    /// Send one prompt and return the model's text response.
    pub async fn complete_text(&self, prompt: String) -> Result<String> {
        // smolhttp is synchronous; run inference off the async executor
        let agent = self.clone();
        let response = smol::unblock(move || agent.run_inference(prompt)).await?;

        for block in response.content {
            let ContentBlock::Text { text } = block;
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                return Ok(trimmed.to_string());
            }
        }

        Err(anyhow!("No text in model response"))
    }

    fn run_inference(&self, prompt: String) -> Result<GenerationApiResponse> {
        let request = GenerationApiRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            messages: vec![Message::user(prompt)],
            system: Some(self.system_prompt.clone()),
        };

        let body = serde_json::to_string(&request)
            .map_err(|e| anyhow!("Failed to serialize request: {}", e))?;

        let response = smolhttp::Client::new(API_URL)
            .map_err(|e| anyhow!("Failed to create HTTP client: {}", e))?
            .post()
            .headers(vec![
                ("x-api-key".to_string(), self.api_key.clone()),
                ("anthropic-version".to_string(), API_VERSION.to_string()),
                ("content-type".to_string(), "application/json".to_string()),
            ])
            .body(body.into())
            .send()
            .map_err(|e| anyhow!("API request failed: {}", e))?;

        let response_text = response.text();

        if response_text.contains("\"error\"") && response_text.contains("\"type\"") {
            return Err(anyhow!("API error: {}", response_text));
        }

        let api_response: GenerationApiResponse = serde_json::from_str(&response_text)
            .map_err(|e| {
                anyhow!(
                    "Failed to parse response: {}. Response: {}",
                    e,
                    response_text
                )
            })?;

        Ok(api_response)
    }
}

/// Builder for creating agents with custom configuration
pub struct AgentBuilder {
    api_key: Option<String>,
    model: String,
    system_prompt: String,
    max_tokens: u32,
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            system_prompt: String::new(),
            max_tokens: 1024,
        }
    }
}

impl AgentBuilder {
    pub fn api_key(mut self, api_key: String) -> Self {
        self.api_key = Some(api_key);
        self
    }

    pub fn model(mut self, model: String) -> Self {
        self.model = model;
        self
    }

    pub fn system_prompt(mut self, prompt: String) -> Self {
        self.system_prompt = prompt;
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn build(self) -> Result<Agent> {
        let api_key = match self.api_key {
            Some(key) => key,
            None => env::var("ANTHROPIC_API_KEY")
                .map_err(|_| anyhow!("ANTHROPIC_API_KEY environment variable not set"))?,
        };

        Ok(Agent {
            api_key,
            model: self.model,
            system_prompt: self.system_prompt,
            max_tokens: self.max_tokens,
        })
    }
}
