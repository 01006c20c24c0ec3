use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::cli::{BenchmarkArgs, GroundTruthArgs};

pub const DEFAULT_CONFIG_PATH: &str = "config.json";
pub const DEFAULT_GROUND_TRUTH_DPI: u32 = 300;
pub const DEFAULT_BENCHMARK_DPI: u32 = 150;
pub const DEFAULT_OUT_DIR: &str = "results";
pub const DEFAULT_GROUND_TRUTH_MODEL: &str = "gemini-1.5-pro-latest";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub ground_truth_generation: GroundTruthSettings,
    pub benchmark_run: BenchmarkSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GroundTruthSettings {
    pub default_pdf: Option<PathBuf>,
    pub default_output_json: Option<PathBuf>,
    pub model_name: Option<String>,
    pub dpi: Option<u32>,
    pub poppler_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BenchmarkSettings {
    pub default_pdf: Option<PathBuf>,
    #[serde(alias = "default_gemini_gt")]
    pub default_ground_truth: Option<PathBuf>,
    pub default_out_dir: Option<PathBuf>,
    pub dpi: Option<u32>,
    pub poppler_path: Option<PathBuf>,
    pub models: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ModelEntry {
    Flag(bool),
    Detailed(ModelSettings),
}

#[derive(Debug, Deserialize)]
struct ModelSettings {
    #[serde(default)]
    enabled: bool,
    #[serde(default)]
    runner: Option<String>,
    #[serde(default)]
    params: Map<String, Value>,
}

/// One enabled model as declared in the configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSpec {
    pub name: String,
    pub runner: String,
    pub params: Map<String, Value>,
}

impl ModelSpec {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            runner: name.to_string(),
            params: Map::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GroundTruthPlan {
    pub pdf: PathBuf,
    pub output_json: PathBuf,
    pub model_name: String,
    pub dpi: u32,
    pub poppler_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct BenchmarkPlan {
    pub pdf: PathBuf,
    pub ground_truth: PathBuf,
    pub out_dir: PathBuf,
    pub dpi: u32,
    pub poppler_path: Option<PathBuf>,
    pub models: Vec<ModelSpec>,
}

pub fn load(path: Option<&Path>) -> Result<Config> {
    let (path, explicit) = match path {
        Some(path) => (path.to_path_buf(), true),
        None => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
    };

    if !path.exists() {
        if explicit {
            bail!("configuration file not found: {}", path.display());
        }
        warn!(path = %path.display(), "configuration file not found, using defaults");
        return Ok(Config::default());
    }

    let raw = fs::read(&path).with_context(|| format!("failed to read {}", path.display()))?;
    let config = parse(&raw).with_context(|| format!("failed to parse {}", path.display()))?;
    info!(path = %path.display(), "loaded configuration");
    Ok(config)
}

pub fn parse(raw: &[u8]) -> Result<Config> {
    let config: Config = serde_json::from_slice(raw).context("malformed configuration json")?;
    // Surface malformed model entries before any work starts.
    config.benchmark_run.enabled_models()?;
    Ok(config)
}

impl BenchmarkSettings {
    /// Enabled models in the order they appear in the configuration file.
    pub fn enabled_models(&self) -> Result<Vec<ModelSpec>> {
        let mut enabled = Vec::new();
        for (name, value) in &self.models {
            let entry: ModelEntry = serde_json::from_value(value.clone())
                .with_context(|| format!("invalid entry for model '{name}'"))?;
            match entry {
                ModelEntry::Flag(true) => enabled.push(ModelSpec::new(name)),
                ModelEntry::Flag(false) => {}
                ModelEntry::Detailed(settings) if settings.enabled => enabled.push(ModelSpec {
                    name: name.clone(),
                    runner: settings.runner.unwrap_or_else(|| name.clone()),
                    params: settings.params,
                }),
                ModelEntry::Detailed(_) => {}
            }
        }
        Ok(enabled)
    }

    pub fn resolve(&self, args: &BenchmarkArgs) -> Result<BenchmarkPlan> {
        let pdf = args
            .pdf
            .clone()
            .or_else(|| self.default_pdf.clone())
            .context("an input PDF must be given via --pdf or benchmark_run.default_pdf")?;
        let ground_truth = args
            .ground_truth
            .clone()
            .or_else(|| self.default_ground_truth.clone())
            .context(
                "a ground-truth file must be given via --ground-truth or benchmark_run.default_ground_truth",
            )?;
        let out_dir = args
            .out_dir
            .clone()
            .or_else(|| self.default_out_dir.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUT_DIR));
        let dpi = validate_dpi(args.dpi.or(self.dpi).unwrap_or(DEFAULT_BENCHMARK_DPI))?;

        Ok(BenchmarkPlan {
            pdf,
            ground_truth,
            out_dir,
            dpi,
            poppler_path: args.poppler_path.clone().or_else(|| self.poppler_path.clone()),
            models: self.enabled_models()?,
        })
    }
}

impl GroundTruthSettings {
    pub fn resolve(&self, args: &GroundTruthArgs) -> Result<GroundTruthPlan> {
        let pdf = args
            .pdf
            .clone()
            .or_else(|| self.default_pdf.clone())
            .context("an input PDF must be given via --pdf or ground_truth_generation.default_pdf")?;
        let output_json = args
            .output_json
            .clone()
            .or_else(|| self.default_output_json.clone())
            .context(
                "an output path must be given via --output-json or ground_truth_generation.default_output_json",
            )?;
        let model_name = args
            .model_name
            .clone()
            .or_else(|| self.model_name.clone())
            .unwrap_or_else(|| DEFAULT_GROUND_TRUTH_MODEL.to_string());
        let dpi = validate_dpi(args.dpi.or(self.dpi).unwrap_or(DEFAULT_GROUND_TRUTH_DPI))?;

        Ok(GroundTruthPlan {
            pdf,
            output_json,
            model_name,
            dpi,
            poppler_path: args.poppler_path.clone().or_else(|| self.poppler_path.clone()),
        })
    }
}

fn validate_dpi(dpi: u32) -> Result<u32> {
    if dpi == 0 {
        bail!("dpi must be greater than zero");
    }
    Ok(dpi)
}
