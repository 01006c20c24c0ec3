//! Text-similarity metrics for one hypothesis against one reference.
//!
//! CER and WER divide an edit distance by the reference length in characters
//! or whitespace-separated words. When the reference has no units the rate is
//! 0.0 if the hypothesis has none either and 1.0 otherwise. Accuracies are
//! `1 - rate` and go negative once the hypothesis outgrows the reference.
//! Character distances count Unicode scalar values.

mod edit;
mod overlap;

use anyhow::{Result, bail};

use crate::model::MetricRow;

pub use edit::align_words;
pub use overlap::{bleu, fuzz_ratio, rouge_l_f1};

#[derive(Debug, Clone, PartialEq)]
pub struct PageMetrics {
    pub gt_len_chars: usize,
    pub hyp_len_chars: usize,
    pub cer: f64,
    pub wer: f64,
    pub char_acc: f64,
    pub word_acc: f64,
    pub levenshtein_dist: usize,
    pub fuzz_ratio: f64,
    pub bleu: f64,
    pub rouge_l_f1: f64,
    pub substitutions: usize,
    pub deletions: usize,
    pub insertions: usize,
}

pub fn error_rate(distance: usize, reference_units: usize) -> f64 {
    if reference_units == 0 {
        return if distance == 0 { 0.0 } else { 1.0 };
    }
    distance as f64 / reference_units as f64
}

pub fn compute_all(reference: &str, hypothesis: &str) -> PageMetrics {
    let reference_chars: Vec<char> = reference.chars().collect();
    let hypothesis_chars: Vec<char> = hypothesis.chars().collect();
    let reference_words: Vec<&str> = reference.split_whitespace().collect();
    let hypothesis_words: Vec<&str> = hypothesis.split_whitespace().collect();

    let levenshtein_dist = strsim::generic_levenshtein(&reference_chars, &hypothesis_chars);
    let cer = error_rate(levenshtein_dist, reference_chars.len());

    let alignment = align_words(&reference_words, &hypothesis_words);
    let wer = error_rate(alignment.distance(), reference_words.len());

    PageMetrics {
        gt_len_chars: reference_chars.len(),
        hyp_len_chars: hypothesis_chars.len(),
        cer,
        wer,
        char_acc: 1.0 - cer,
        word_acc: 1.0 - wer,
        levenshtein_dist,
        fuzz_ratio: fuzz_ratio(&reference_chars, &hypothesis_chars),
        bleu: bleu(&reference_words, &hypothesis_words),
        rouge_l_f1: rouge_l_f1(reference, hypothesis),
        substitutions: alignment.substitutions,
        deletions: alignment.deletions,
        insertions: alignment.insertions,
    }
}

/// Computes the metrics and rejects any non-finite score.
pub fn score(reference: &str, hypothesis: &str) -> Result<PageMetrics> {
    let metrics = compute_all(reference, hypothesis);
    metrics.ensure_finite()?;
    Ok(metrics)
}

impl PageMetrics {
    fn ensure_finite(&self) -> Result<()> {
        let scores = [
            ("cer", self.cer),
            ("wer", self.wer),
            ("char_acc", self.char_acc),
            ("word_acc", self.word_acc),
            ("fuzz_ratio", self.fuzz_ratio),
            ("bleu", self.bleu),
            ("rougeL_f1", self.rouge_l_f1),
        ];
        for (name, value) in scores {
            if !value.is_finite() {
                bail!("metric {name} is not finite: {value}");
            }
        }
        Ok(())
    }

    pub fn into_row(self, model: &str, page: u32, error: Option<String>) -> MetricRow {
        MetricRow {
            model: model.to_string(),
            page,
            gt_len_chars: self.gt_len_chars,
            hyp_len_chars: self.hyp_len_chars,
            cer: self.cer,
            wer: self.wer,
            char_acc: self.char_acc,
            word_acc: self.word_acc,
            levenshtein_dist: self.levenshtein_dist,
            fuzz_ratio: self.fuzz_ratio,
            bleu: self.bleu,
            rouge_l_f1: self.rouge_l_f1,
            substitutions: self.substitutions,
            deletions: self.deletions,
            insertions: self.insertions,
            error,
        }
    }
}
