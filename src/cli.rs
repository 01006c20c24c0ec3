use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "ocr-bench",
    version,
    about = "Sequential OCR and LLM transcription benchmark driven by config.json"
)]
pub struct Cli {
    /// Configuration file; when omitted `config.json` is used if present.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Transcribe every page of a PDF with the cloud LLM and save it as ground truth.
    GroundTruth(GroundTruthArgs),
    /// Run every enabled model over the PDF and score it against the ground truth.
    Benchmark(BenchmarkArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct GroundTruthArgs {
    #[arg(long)]
    pub pdf: Option<PathBuf>,

    #[arg(long)]
    pub output_json: Option<PathBuf>,

    #[arg(long)]
    pub model_name: Option<String>,

    #[arg(long)]
    pub dpi: Option<u32>,

    #[arg(long)]
    pub poppler_path: Option<PathBuf>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct BenchmarkArgs {
    #[arg(long)]
    pub pdf: Option<PathBuf>,

    #[arg(long)]
    pub ground_truth: Option<PathBuf>,

    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    #[arg(long)]
    pub dpi: Option<u32>,

    #[arg(long)]
    pub poppler_path: Option<PathBuf>,
}
