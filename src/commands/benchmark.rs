use std::path::Path;
use std::time::Instant;

use anyhow::Result;
use tracing::warn;

use crate::cli::BenchmarkArgs;
use crate::config::{BenchmarkPlan, Config};
use crate::ground_truth::{self, GroundTruth};
use crate::pages::render_pdf;
use crate::pipeline;
use crate::report::{self, RUN_LOG, RunLog};
use crate::runners::{Credentials, DefaultRunnerFactory, RunnerFactory};
use crate::util::{SAMPLE_DATA_DIR, ensure_directory, resolve_input_path, sha256_file};

pub fn run(args: BenchmarkArgs, config: &Config) -> Result<()> {
    let plan = config.benchmark_run.resolve(&args)?;
    let factory = DefaultRunnerFactory::new(Credentials::from_env());
    execute(&plan, &factory)
}

/// Runs the benchmark described by `plan` and writes the summary and run log into `plan.out_dir`.
fn execute(plan: &BenchmarkPlan, factory: &dyn RunnerFactory) -> Result<()> {
    let started = Instant::now();
    ensure_directory(&plan.out_dir)?;
    let mut log = RunLog::new();

    let rows = if plan.models.is_empty() {
        pipeline::run(&[], &[], &GroundTruth::new(), &plan.out_dir, factory, &mut log)
    } else {
        let sample_dir = Path::new(SAMPLE_DATA_DIR);
        let pdf = resolve_input_path(&plan.pdf, sample_dir)?;
        let ground_truth_path = resolve_input_path(&plan.ground_truth, sample_dir)?;
        let ground_truth = ground_truth::load(&ground_truth_path)?;
        let pdf_sha256 = sha256_file(&pdf)?;

        let rendered = render_pdf(&pdf, plan.dpi, plan.poppler_path.as_deref())?;
        log.run_started(&pdf, &pdf_sha256, &ground_truth_path, rendered.pages().len());
        if ground_truth.is_empty() {
            warn!(
                path = %ground_truth_path.display(),
                "ground truth has no pages, every page scores against empty text"
            );
        } else if ground_truth.len() != rendered.pages().len() {
            warn!(
                ground_truth_pages = ground_truth.len(),
                rendered_pages = rendered.pages().len(),
                "ground truth and pdf page counts differ, missing pages score against empty text"
            );
        }

        pipeline::run(
            &plan.models,
            rendered.pages(),
            &ground_truth,
            &plan.out_dir,
            factory,
            &mut log,
        )
    };

    report::write_summary(&plan.out_dir, &rows)?;
    log.run_finished(rows.len(), started.elapsed());
    log.write(&plan.out_dir.join(RUN_LOG))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use super::*;
    use crate::model::MetricRow;
    use crate::report::{SUMMARY_CSV, SUMMARY_JSON};

    fn plan(out_dir: PathBuf) -> BenchmarkPlan {
        BenchmarkPlan {
            pdf: PathBuf::from("does/not/exist.pdf"),
            ground_truth: PathBuf::from("does/not/exist.json"),
            out_dir,
            dpi: 150,
            poppler_path: None,
            models: Vec::new(),
        }
    }

    #[test]
    fn zero_models_writes_empty_summary_and_log() {
        let dir = tempfile::tempdir().expect("tempdir");
        let out_dir = dir.path().join("results");

        execute(&plan(out_dir.clone()), &DefaultRunnerFactory::default())
            .expect("a run without models should succeed");

        let raw = fs::read(out_dir.join(SUMMARY_JSON)).expect("summary json");
        let rows: Vec<MetricRow> = serde_json::from_slice(&raw).expect("parse summary");
        assert!(rows.is_empty());

        let csv = fs::read_to_string(out_dir.join(SUMMARY_CSV)).expect("summary csv");
        assert_eq!(csv.trim_end(), MetricRow::COLUMNS.join(","));

        let log = fs::read_to_string(out_dir.join(RUN_LOG)).expect("run log");
        assert!(log.contains("no models enabled"));
        assert!(log.contains("benchmark finished: 0 rows"));
    }

    #[test]
    fn missing_inputs_abort_before_any_output() {
        let dir = tempfile::tempdir().expect("tempdir");
        let out_dir = dir.path().join("results");
        let mut plan = plan(out_dir.clone());
        plan.models.push(crate::config::ModelSpec::new("tesseract"));

        let error = execute(&plan, &DefaultRunnerFactory::default())
            .expect_err("missing pdf should be fatal");
        assert!(error.to_string().contains("exist.pdf"));
        assert!(!out_dir.join(SUMMARY_CSV).exists());
    }
}
