use std::fs;
use std::time::Duration;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::http::{DEFAULT_TIMEOUT_SECS, build_client, execute_with_retry, send_json};
use super::{ModelRunner, RetryPolicy, RunnerError, param_str, param_u64};
use crate::model::Page;

pub const GOOGLE_API_KEY_ENV: &str = "GOOGLE_API_KEY";
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_API_MODEL: &str = "gemini-2.5-flash";

const BENCHMARK_PROMPT: &str = "Perform OCR on this document image. Extract all text content accurately, preserving the original line breaks and structure as much as possible.";

pub const GROUND_TRUTH_PROMPT: &str = "Your task is to perform a perfect, high-fidelity OCR transcription of this document image.
Transcribe the text exactly as it appears.
Preserve all original line breaks, spacing, and formatting.
Do not add any commentary, summarization, or explanation. Output only the transcribed text.";

#[derive(Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum RequestPart<'a> {
    Text { text: &'a str },
    InlineData { inline_data: InlineData },
}

#[derive(Serialize)]
struct InlineData {
    mime_type: &'static str,
    data: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default, rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

pub(super) fn response_text(response: GenerateContentResponse) -> Result<String, RunnerError> {
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| RunnerError::MissingOutput("response has no candidates".to_string()))?;

    let parts: Vec<String> = candidate
        .content
        .map(|content| content.parts.into_iter().filter_map(|part| part.text).collect())
        .unwrap_or_default();

    // Blocked or truncated candidates carry no text parts at all.
    if parts.is_empty() {
        let reason = candidate.finish_reason.as_deref().unwrap_or("UNKNOWN");
        return Err(RunnerError::MissingOutput(format!(
            "candidate has no text (finishReason: {reason})"
        )));
    }

    Ok(parts.concat().trim().to_string())
}

/// Blocking client for the Gemini `generateContent` endpoint.
pub struct GeminiClient {
    http: Client,
    endpoint: String,
    api_key: String,
    model: String,
    retry: RetryPolicy,
}

impl GeminiClient {
    pub fn new(
        endpoint: &str,
        api_key: &str,
        model: &str,
        timeout: Duration,
    ) -> Result<Self, RunnerError> {
        Ok(Self {
            http: build_client(timeout)?,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            retry: RetryPolicy::default(),
        })
    }

    pub fn transcribe_png(&self, png: &[u8], prompt: &str) -> Result<String, RunnerError> {
        let url = format!("{}/models/{}:generateContent", self.endpoint, self.model);
        let body = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![
                    RequestPart::Text { text: prompt },
                    RequestPart::InlineData {
                        inline_data: InlineData {
                            mime_type: "image/png",
                            data: STANDARD.encode(png),
                        },
                    },
                ],
            }],
        };

        let response: GenerateContentResponse = execute_with_retry(&self.retry, || {
            send_json(
                self.http
                    .post(&url)
                    .header("x-goog-api-key", &self.api_key)
                    .json(&body),
            )
        })?;

        response_text(response)
    }
}

pub struct GeminiRunner {
    name: String,
    api_model_name: String,
    endpoint: String,
    prompt: String,
    timeout: Duration,
    api_key: Option<String>,
    client: Option<GeminiClient>,
}

impl GeminiRunner {
    pub fn from_params(
        name: &str,
        params: &Map<String, Value>,
        api_key: Option<String>,
    ) -> Result<Self, RunnerError> {
        Ok(Self {
            name: param_str(params, "display_name")?.unwrap_or_else(|| name.to_string()),
            api_model_name: param_str(params, "api_model_name")?
                .unwrap_or_else(|| DEFAULT_API_MODEL.to_string()),
            endpoint: param_str(params, "endpoint")?.unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            prompt: param_str(params, "prompt")?.unwrap_or_else(|| BENCHMARK_PROMPT.to_string()),
            timeout: Duration::from_secs(
                param_u64(params, "timeout_secs")?.unwrap_or(DEFAULT_TIMEOUT_SECS),
            ),
            api_key,
            client: None,
        })
    }
}

impl ModelRunner for GeminiRunner {
    fn name(&self) -> &str {
        &self.name
    }

    fn load(&mut self) -> Result<(), RunnerError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            RunnerError::Init(format!("{GOOGLE_API_KEY_ENV} environment variable not set"))
        })?;
        self.client = Some(GeminiClient::new(
            &self.endpoint,
            api_key,
            &self.api_model_name,
            self.timeout,
        )?);
        Ok(())
    }

    fn transcribe(&mut self, page: &Page) -> Result<String, RunnerError> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| RunnerError::Init("runner used before load".to_string()))?;
        let png = fs::read(&page.image_path)?;
        client.transcribe_png(&png, &self.prompt)
    }

    fn release(&mut self) {
        self.client = None;
    }
}
