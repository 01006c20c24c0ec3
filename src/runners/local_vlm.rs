use std::fs;
use std::time::Duration;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::{info, warn};

use super::http::{DEFAULT_TIMEOUT_SECS, build_client, execute_with_retry, send_json};
use super::{ModelRunner, RetryPolicy, RunnerError, param_str, param_u64};
use crate::model::Page;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434";
const DEFAULT_PROMPT: &str = "Extract all text from this document page. Output only the transcribed text.";
const DEFAULT_KEEP_ALIVE: &str = "10m";

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

/// Vision-language model served by a local Ollama-compatible server.
///
/// `load` asks the server to pull the weights into memory and `release`
/// evicts them again, so only one model is resident at a time.
pub struct LocalVlmRunner {
    name: String,
    endpoint: String,
    model: String,
    prompt: String,
    keep_alive: String,
    timeout: Duration,
    retry: RetryPolicy,
    client: Option<Client>,
}

impl LocalVlmRunner {
    pub fn from_params(name: &str, params: &Map<String, Value>) -> Result<Self, RunnerError> {
        let model = param_str(params, "model")?.ok_or_else(|| {
            RunnerError::Init(format!("local model '{name}' requires params.model"))
        })?;

        Ok(Self {
            name: param_str(params, "display_name")?.unwrap_or_else(|| name.to_string()),
            endpoint: param_str(params, "endpoint")?
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string())
                .trim_end_matches('/')
                .to_string(),
            model,
            prompt: param_str(params, "prompt")?.unwrap_or_else(|| DEFAULT_PROMPT.to_string()),
            keep_alive: param_str(params, "keep_alive")?
                .unwrap_or_else(|| DEFAULT_KEEP_ALIVE.to_string()),
            timeout: Duration::from_secs(
                param_u64(params, "timeout_secs")?.unwrap_or(DEFAULT_TIMEOUT_SECS),
            ),
            retry: RetryPolicy::default(),
            client: None,
        })
    }

    fn generate_url(&self) -> String {
        format!("{}/api/generate", self.endpoint)
    }
}

impl ModelRunner for LocalVlmRunner {
    fn name(&self) -> &str {
        &self.name
    }

    fn load(&mut self) -> Result<(), RunnerError> {
        let client = build_client(self.timeout)?;
        let body = json!({ "model": self.model, "keep_alive": self.keep_alive });

        // A generate call without a prompt only loads the weights.
        let _: GenerateResponse = send_json(client.post(self.generate_url()).json(&body))
            .map_err(|err| RunnerError::Init(format!("failed to load '{}': {err}", self.model)))?;

        info!(model = %self.model, endpoint = %self.endpoint, "local model loaded");
        self.client = Some(client);
        Ok(())
    }

    fn transcribe(&mut self, page: &Page) -> Result<String, RunnerError> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| RunnerError::Init("runner used before load".to_string()))?;
        let image = STANDARD.encode(fs::read(&page.image_path)?);
        let body = json!({
            "model": self.model,
            "prompt": self.prompt,
            "images": [image],
            "stream": false,
            "keep_alive": self.keep_alive,
        });
        let url = self.generate_url();

        let response: GenerateResponse =
            execute_with_retry(&self.retry, || send_json(client.post(&url).json(&body)))?;
        Ok(response.response.trim().to_string())
    }

    fn release(&mut self) {
        let Some(client) = self.client.take() else {
            return;
        };

        let body = json!({ "model": self.model, "keep_alive": 0 });
        match send_json::<GenerateResponse>(client.post(self.generate_url()).json(&body)) {
            Ok(_) => info!(model = %self.model, "local model unloaded"),
            Err(err) => warn!(model = %self.model, error = %err, "failed to unload local model"),
        }
    }
}
