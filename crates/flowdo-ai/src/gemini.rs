//! Google Gemini `generateContent` client.
//!
//! Plain text calls pass an optional system instruction. Flashcard, quiz and
//! concept-map calls ask for `application/json` output constrained by a response schema
//! and decode the returned text into drafts.

use crate::config::AiConfig;
use async_trait::async_trait;
use flowdo_editor::ai::{
    self, AiClient, AiError, FlashcardDraft, MindMapDraft, QuizDraft, parse_list, parse_mind_map,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct GeminiClient {
    config: AiConfig,
    client: Client,
}

// ─── Wire format ─────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    response_schema: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: Option<u32>,
    #[serde(default)]
    candidates_token_count: Option<u32>,
}

impl GeminiRequest {
    pub(crate) fn text(prompt: &str, system_instruction: Option<&str>) -> Self {
        Self {
            contents: vec![GeminiContent::new(prompt)],
            system_instruction: system_instruction.map(GeminiContent::new),
            generation_config: None,
        }
    }

    pub(crate) fn structured(prompt: &str, schema: Value) -> Self {
        Self {
            contents: vec![GeminiContent::new(prompt)],
            system_instruction: None,
            generation_config: Some(GenerationConfig {
                response_mime_type: "application/json",
                response_schema: schema,
            }),
        }
    }
}

impl GeminiContent {
    fn new(text: &str) -> Self {
        Self {
            parts: vec![GeminiPart {
                text: text.to_string(),
            }],
        }
    }
}

impl GeminiResponse {
    /// Concatenated text of the first candidate. Empty output is valid.
    pub(crate) fn text(self) -> Result<String, AiError> {
        let candidate = self
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| AiError::InvalidResponse("no candidates in response".to_string()))?;
        if let Some(reason) = &candidate.finish_reason
            && reason != "STOP"
        {
            log::warn!("Gemini finished with reason {reason}");
        }
        Ok(candidate
            .content
            .map(|c| c.parts.into_iter().map(|p| p.text).collect::<String>())
            .unwrap_or_default())
    }
}

pub(crate) fn flashcard_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "front": { "type": "STRING" },
                "back": { "type": "STRING" }
            },
            "required": ["front", "back"]
        }
    })
}

pub(crate) fn quiz_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "question": { "type": "STRING" },
                "options": { "type": "ARRAY", "items": { "type": "STRING" } },
                "answer": { "type": "STRING", "description": "The correct option text" }
            },
            "required": ["question", "options", "answer"]
        }
    })
}

pub(crate) fn mind_map_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "nodes": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "id": { "type": "STRING" },
                        "label": { "type": "STRING" },
                        "type": { "type": "STRING" },
                        "summary": { "type": "STRING" }
                    }
                }
            },
            "edges": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "source": { "type": "STRING" },
                        "target": { "type": "STRING" },
                        "label": { "type": "STRING" }
                    }
                }
            }
        },
        "required": ["nodes", "edges"]
    })
}

// ─── Client ──────────────────────────────────────────────────────────────

impl GeminiClient {
    pub fn new(config: AiConfig) -> Result<Self, AiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| AiError::Http(e.to_string()))?;
        Ok(Self { config, client })
    }

    pub fn from_env() -> Result<Self, AiError> {
        Self::new(AiConfig::from_env())
    }

    pub fn config(&self) -> &AiConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/{}:generateContent?key={}",
            self.config.base_url.trim_end_matches('/'),
            self.config.model,
            self.config.api_key
        )
    }

    async fn send(&self, request: &GeminiRequest) -> Result<String, AiError> {
        if !self.config.has_api_key() {
            return Err(AiError::MissingApiKey);
        }

        let url = self.endpoint();
        log::debug!(
            "POST {}",
            url.replace(&self.config.api_key, "***")
        );

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| AiError::Http(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AiError::Http(e.to_string()))?;

        if !status.is_success() {
            log::error!("Gemini API error: {status} - {body}");
            return Err(AiError::Api {
                status: status.as_u16(),
                message: api_error_message(&body),
            });
        }

        let parsed: GeminiResponse =
            serde_json::from_str(&body).map_err(|e| AiError::InvalidResponse(e.to_string()))?;
        if let Some(usage) = &parsed.usage_metadata {
            log::info!(
                "Gemini usage: prompt {:?} tokens, response {:?} tokens",
                usage.prompt_token_count,
                usage.candidates_token_count
            );
        }
        parsed.text()
    }
}

/// Pull `error.message` out of an API error body, else return it whole.
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

#[async_trait]
impl AiClient for GeminiClient {
    async fn generate_text(
        &self,
        prompt: &str,
        system_instruction: Option<&str>,
    ) -> Result<String, AiError> {
        self.send(&GeminiRequest::text(prompt, system_instruction))
            .await
    }

    async fn generate_flashcards(&self, context: &str) -> Result<Vec<FlashcardDraft>, AiError> {
        let request = GeminiRequest::structured(&ai::flashcards_prompt(context), flashcard_schema());
        let raw = self.send(&request).await?;
        parse_list(&raw)
    }

    async fn generate_quiz(&self, context: &str) -> Result<Vec<QuizDraft>, AiError> {
        let request = GeminiRequest::structured(&ai::quiz_prompt(context), quiz_schema());
        let raw = self.send(&request).await?;
        parse_list(&raw)
    }

    async fn generate_mind_map(&self, topic: &str) -> Result<MindMapDraft, AiError> {
        let request = GeminiRequest::structured(&ai::mind_map_prompt(topic), mind_map_schema());
        let raw = self.send(&request).await?;
        parse_mind_map(&raw)
    }
}
