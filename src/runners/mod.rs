//! Model runners: one transcription capability behind a load/transcribe/release lifecycle.

mod command;
mod gemini;
mod http;
mod local_vlm;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::config::ModelSpec;
use crate::model::Page;

pub use command::{CommandRunner, CommandSpec};
pub use gemini::{
    DEFAULT_ENDPOINT as GEMINI_ENDPOINT, GOOGLE_API_KEY_ENV, GROUND_TRUTH_PROMPT, GeminiClient,
    GeminiRunner,
};
pub use http::{DEFAULT_TIMEOUT_SECS, RetryPolicy};
pub use local_vlm::LocalVlmRunner;

pub const KNOWN_RUNNERS: [&str; 6] = [
    "tesseract",
    "easyocr",
    "paddle_ppstructure",
    "gemini_api",
    "florence2_base",
    "granite_docling",
];

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("initialization failed: {0}")]
    Init(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("api error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("{program} failed: {message}")]
    Command { program: String, message: String },
    #[error("missing output: {0}")]
    MissingOutput(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub trait ModelRunner {
    /// Name used for the output folder and the summary rows.
    fn name(&self) -> &str;

    /// Acquires engine state. Nothing heavy happens before this call.
    fn load(&mut self) -> Result<(), RunnerError>;

    fn transcribe(&mut self, page: &Page) -> Result<String, RunnerError>;

    /// Drops everything `load` acquired. Must be safe to call more than once.
    fn release(&mut self);
}

/// A loaded runner; `release` runs when the guard is dropped.
pub struct RunnerGuard {
    runner: Box<dyn ModelRunner>,
}

impl RunnerGuard {
    pub fn acquire(mut runner: Box<dyn ModelRunner>) -> Result<Self, RunnerError> {
        if let Err(err) = runner.load() {
            runner.release();
            return Err(err);
        }
        Ok(Self { runner })
    }

    pub fn name(&self) -> &str {
        self.runner.name()
    }

    pub fn transcribe(&mut self, page: &Page) -> Result<String, RunnerError> {
        self.runner.transcribe(page)
    }
}

impl Drop for RunnerGuard {
    fn drop(&mut self) {
        self.runner.release();
    }
}

#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub google_api_key: Option<String>,
}

impl Credentials {
    pub fn from_env() -> Self {
        Self {
            google_api_key: std::env::var(GOOGLE_API_KEY_ENV)
                .ok()
                .filter(|value| !value.trim().is_empty()),
        }
    }
}

pub trait RunnerFactory {
    fn build(&self, spec: &ModelSpec) -> Result<Box<dyn ModelRunner>, RunnerError>;
}

#[derive(Debug, Clone, Default)]
pub struct DefaultRunnerFactory {
    pub credentials: Credentials,
}

impl DefaultRunnerFactory {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }
}

impl RunnerFactory for DefaultRunnerFactory {
    fn build(&self, spec: &ModelSpec) -> Result<Box<dyn ModelRunner>, RunnerError> {
        let runner: Box<dyn ModelRunner> = match spec.runner.as_str() {
            "tesseract" => Box::new(CommandRunner::new(
                &spec.name,
                CommandSpec::tesseract().with_params(&spec.params)?,
            )),
            "easyocr" => Box::new(CommandRunner::new(
                &spec.name,
                CommandSpec::easyocr().with_params(&spec.params)?,
            )),
            "paddle_ppstructure" => Box::new(CommandRunner::new(
                &spec.name,
                CommandSpec::paddle_ppstructure().with_params(&spec.params)?,
            )),
            "gemini_api" => Box::new(GeminiRunner::from_params(
                &spec.name,
                &spec.params,
                self.credentials.google_api_key.clone(),
            )?),
            "florence2_base" | "granite_docling" => {
                Box::new(LocalVlmRunner::from_params(&spec.name, &spec.params)?)
            }
            other => {
                return Err(RunnerError::Init(format!(
                    "unknown runner '{other}', expected one of: {}",
                    KNOWN_RUNNERS.join(", ")
                )));
            }
        };
        Ok(runner)
    }
}

fn param_str(params: &Map<String, Value>, key: &str) -> Result<Option<String>, RunnerError> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.clone())),
        Some(other) => Err(RunnerError::Init(format!(
            "parameter '{key}' must be a string, got {other}"
        ))),
    }
}

fn param_u64(params: &Map<String, Value>, key: &str) -> Result<Option<u64>, RunnerError> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value.as_u64().map(Some).ok_or_else(|| {
            RunnerError::Init(format!(
                "parameter '{key}' must be a non-negative integer, got {value}"
            ))
        }),
    }
}

fn param_str_list(params: &Map<String, Value>, key: &str) -> Result<Option<Vec<String>>, RunnerError> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str().map(str::to_string).ok_or_else(|| {
                    RunnerError::Init(format!("parameter '{key}' must only contain strings"))
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some),
        Some(other) => Err(RunnerError::Init(format!(
            "parameter '{key}' must be an array of strings, got {other}"
        ))),
    }
}
