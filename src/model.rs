use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// One rendered page image, 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub index: u32,
    pub image_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunResult {
    pub model: String,
    pub page: u32,
    pub text: String,
    pub error: Option<String>,
}

impl RunResult {
    pub fn succeeded(model: &str, page: u32, text: String) -> Self {
        Self {
            model: model.to_string(),
            page,
            text,
            error: None,
        }
    }

    pub fn failed(model: &str, page: u32, error: String) -> Self {
        Self {
            model: model.to_string(),
            page,
            text: String::new(),
            error: Some(error),
        }
    }

    /// Text written to the per-page output file.
    pub fn persisted_text(&self) -> String {
        match &self.error {
            Some(error) => format!("[OCR_ERROR: {error}]"),
            None => self.text.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRow {
    pub model: String,
    pub page: u32,
    pub gt_len_chars: usize,
    pub hyp_len_chars: usize,
    pub cer: f64,
    pub wer: f64,
    pub char_acc: f64,
    pub word_acc: f64,
    pub levenshtein_dist: usize,
    pub fuzz_ratio: f64,
    pub bleu: f64,
    #[serde(rename = "rougeL_f1")]
    pub rouge_l_f1: f64,
    pub substitutions: usize,
    pub deletions: usize,
    pub insertions: usize,
    pub error: Option<String>,
}

impl MetricRow {
    pub const COLUMNS: [&'static str; 16] = [
        "model",
        "page",
        "gt_len_chars",
        "hyp_len_chars",
        "cer",
        "wer",
        "char_acc",
        "word_acc",
        "levenshtein_dist",
        "fuzz_ratio",
        "bleu",
        "rougeL_f1",
        "substitutions",
        "deletions",
        "insertions",
        "error",
    ];
}
