use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use crate::model::MetricRow;
use crate::util::{ensure_directory, now_utc_string, write_json_pretty};

pub const SUMMARY_CSV: &str = "summary.csv";
pub const SUMMARY_JSON: &str = "summary.json";
pub const RUN_LOG: &str = "benchmark.log";

/// Writes the same rows to `summary.csv` and `summary.json` under `out_dir`.
pub fn write_summary(out_dir: &Path, rows: &[MetricRow]) -> Result<()> {
    ensure_directory(out_dir)?;
    write_csv(&out_dir.join(SUMMARY_CSV), rows)?;
    write_json_pretty(&out_dir.join(SUMMARY_JSON), &rows)?;
    info!(
        rows = rows.len(),
        out_dir = %out_dir.display(),
        "wrote {SUMMARY_CSV} and {SUMMARY_JSON}"
    );
    Ok(())
}

fn write_csv(path: &Path, rows: &[MetricRow]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;

    if rows.is_empty() {
        writer
            .write_record(MetricRow::COLUMNS)
            .with_context(|| format!("failed to write header to {}", path.display()))?;
    }
    for row in rows {
        writer
            .serialize(row)
            .with_context(|| format!("failed to write row to {}", path.display()))?;
    }

    writer
        .flush()
        .with_context(|| format!("failed to flush {}", path.display()))?;
    Ok(())
}

/// Human-readable record of one benchmark run, written to `benchmark.log`.
///
/// Every entry is also emitted as a tracing event.
#[derive(Debug, Default)]
pub struct RunLog {
    entries: Vec<String>,
}

impl RunLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, level: &str, message: String) {
        self.entries
            .push(format!("{} [{level:<5}] {message}", now_utc_string()));
    }

    #[cfg(test)]
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn run_started(&mut self, pdf: &Path, pdf_sha256: &str, ground_truth: &Path, pages: usize) {
        info!(
            pdf = %pdf.display(),
            sha256 = %pdf_sha256,
            ground_truth = %ground_truth.display(),
            pages,
            "benchmark started"
        );
        self.push(
            "INFO",
            format!(
                "benchmark started: pdf={} sha256={} ground_truth={} pages={pages}",
                pdf.display(),
                pdf_sha256,
                ground_truth.display()
            ),
        );
    }

    pub fn no_models_enabled(&mut self) {
        warn!("no models enabled in configuration");
        self.push("WARN", "no models enabled in configuration".to_string());
    }

    pub fn models_enabled(&mut self, names: &[&str]) {
        info!(models = %names.join(", "), "models enabled");
        self.push("INFO", format!("models enabled: {}", names.join(", ")));
    }

    pub fn model_started(&mut self, model: &str) {
        info!(model = %model, "running model");
        self.push("INFO", format!("model {model}: started"));
    }

    pub fn model_skipped(&mut self, model: &str, reason: &str) {
        error!(model = %model, reason = %reason, "model skipped");
        self.push("ERROR", format!("model {model}: skipped: {reason}"));
    }

    pub fn page_failed(&mut self, model: &str, page: u32, reason: &str) {
        error!(model = %model, page, reason = %reason, "page failed");
        self.push("ERROR", format!("model {model}: page {page} failed: {reason}"));
    }

    pub fn output_write_failed(&mut self, model: &str, page: u32, reason: &str) {
        warn!(model = %model, page, reason = %reason, "failed to persist page output");
        self.push(
            "WARN",
            format!("model {model}: page {page} output not saved: {reason}"),
        );
    }

    pub fn row_dropped(&mut self, model: &str, page: u32, reason: &str) {
        error!(model = %model, page, reason = %reason, "metrics row dropped");
        self.push(
            "ERROR",
            format!("model {model}: page {page} row dropped: {reason}"),
        );
    }

    pub fn model_completed(&mut self, model: &str, pages: usize, failures: usize, elapsed: Duration) {
        info!(
            model = %model,
            pages,
            failures,
            elapsed_ms = elapsed.as_millis() as u64,
            "model finished, resources released"
        );
        self.push(
            "INFO",
            format!(
                "model {model}: finished {pages} pages ({failures} failed) in {:.2}s",
                elapsed.as_secs_f64()
            ),
        );
    }

    pub fn run_finished(&mut self, rows: usize, elapsed: Duration) {
        info!(rows, elapsed_ms = elapsed.as_millis() as u64, "benchmark finished");
        self.push(
            "INFO",
            format!(
                "benchmark finished: {rows} rows in {:.2}s",
                elapsed.as_secs_f64()
            ),
        );
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            ensure_directory(parent)?;
        }
        let mut contents = self.entries.join("\n");
        contents.push('\n');
        fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))?;
        info!(path = %path.display(), "wrote run log");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(model: &str, page: u32, cer: f64, error: Option<&str>) -> MetricRow {
        MetricRow {
            model: model.to_string(),
            page,
            gt_len_chars: 120,
            hyp_len_chars: 131,
            cer,
            wer: 0.1875,
            char_acc: 1.0 - cer,
            word_acc: 1.0 - 0.1875,
            levenshtein_dist: 40,
            fuzz_ratio: 0.8761904761904762,
            bleu: 0.41113361690051975,
            rouge_l_f1: 0.7999999999999999,
            substitutions: 2,
            deletions: 1,
            insertions: 0,
            error: error.map(str::to_string),
        }
    }

    fn read_csv(path: &Path) -> Vec<MetricRow> {
        let mut reader = csv::Reader::from_path(path).expect("open csv");
        reader
            .deserialize()
            .collect::<Result<Vec<MetricRow>, _>>()
            .expect("csv rows should deserialize")
    }

    fn read_json(path: &Path) -> Vec<MetricRow> {
        let raw = fs::read(path).expect("read json");
        serde_json::from_slice(&raw).expect("json rows should deserialize")
    }

    #[test]
    fn csv_and_json_hold_identical_rows() {
        let dir = tempfile::tempdir().expect("tempdir");
        let rows = vec![
            row("tesseract", 1, 1.0 / 3.0, None),
            row("tesseract", 2, 2.5, None),
            row("gemini-2.5-flash", 1, 0.0, Some("network error: timed out")),
        ];

        write_summary(dir.path(), &rows).expect("write summary");

        let from_csv = read_csv(&dir.path().join(SUMMARY_CSV));
        let from_json = read_json(&dir.path().join(SUMMARY_JSON));
        assert_eq!(from_csv, rows);
        assert_eq!(from_json, rows);
    }

    #[test]
    fn csv_header_uses_summary_column_names() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_summary(dir.path(), &[row("easyocr", 1, 0.5, None)]).expect("write summary");

        let raw = fs::read_to_string(dir.path().join(SUMMARY_CSV)).expect("read csv");
        let header = raw.lines().next().expect("header line");
        assert_eq!(header, MetricRow::COLUMNS.join(","));
    }

    #[test]
    fn empty_summary_still_writes_both_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_summary(dir.path(), &[]).expect("write summary");

        let raw = fs::read_to_string(dir.path().join(SUMMARY_CSV)).expect("read csv");
        assert_eq!(raw.trim_end(), MetricRow::COLUMNS.join(","));
        assert!(read_csv(&dir.path().join(SUMMARY_CSV)).is_empty());
        assert!(read_json(&dir.path().join(SUMMARY_JSON)).is_empty());
    }

    #[test]
    fn run_log_records_skips_and_timings() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut log = RunLog::new();
        log.models_enabled(&["tesseract", "gemini_api"]);
        log.model_skipped("gemini_api", "GOOGLE_API_KEY environment variable not set");
        log.model_completed("tesseract", 3, 1, Duration::from_millis(1500));

        let path = dir.path().join(RUN_LOG);
        log.write(&path).expect("write log");
        let raw = fs::read_to_string(&path).expect("read log");

        assert_eq!(raw.lines().count(), 3);
        assert!(raw.contains("models enabled: tesseract, gemini_api"));
        assert!(raw.contains("model gemini_api: skipped: GOOGLE_API_KEY"));
        assert!(raw.contains("model tesseract: finished 3 pages (1 failed) in 1.50s"));
    }
}
