//! Sequential benchmark loop: one model at a time, every page in order.

#[cfg(test)]
mod tests;

use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::info;

use crate::config::ModelSpec;
use crate::ground_truth::GroundTruth;
use crate::metrics;
use crate::model::{MetricRow, Page, RunResult};
use crate::report::RunLog;
use crate::runners::{RunnerFactory, RunnerGuard};
use crate::util::{ensure_directory, write_text};

/// Runs every enabled model over every page and returns the scored rows.
///
/// Failures stay local: a model that cannot be built or loaded is skipped,
/// a page that cannot be transcribed is recorded with an error and scored
/// against an empty hypothesis. Each runner is released before the next
/// one is built.
pub fn run(
    models: &[ModelSpec],
    pages: &[Page],
    ground_truth: &GroundTruth,
    out_dir: &Path,
    factory: &dyn RunnerFactory,
    log: &mut RunLog,
) -> Vec<MetricRow> {
    if models.is_empty() {
        log.no_models_enabled();
        return Vec::new();
    }
    let names: Vec<&str> = models.iter().map(|spec| spec.name.as_str()).collect();
    log.models_enabled(&names);

    let mut ordered: Vec<&Page> = pages.iter().collect();
    ordered.sort_by_key(|page| page.index);

    let mut rows = Vec::with_capacity(models.len() * ordered.len());
    for spec in models {
        run_model(spec, &ordered, ground_truth, out_dir, factory, log, &mut rows);
    }
    rows
}

fn run_model(
    spec: &ModelSpec,
    pages: &[&Page],
    ground_truth: &GroundTruth,
    out_dir: &Path,
    factory: &dyn RunnerFactory,
    log: &mut RunLog,
    rows: &mut Vec<MetricRow>,
) {
    let started = Instant::now();
    log.model_started(&spec.name);

    let runner = match factory.build(spec) {
        Ok(runner) => runner,
        Err(err) => {
            log.model_skipped(&spec.name, &err.to_string());
            return;
        }
    };
    let mut guard = match RunnerGuard::acquire(runner) {
        Ok(guard) => guard,
        Err(err) => {
            log.model_skipped(&spec.name, &err.to_string());
            return;
        }
    };

    let name = guard.name().to_string();
    let model_dir = model_output_dir(out_dir, &name);
    if let Err(err) = ensure_directory(&model_dir) {
        log.model_skipped(&name, &format!("{err:#}"));
        return;
    }

    let total = pages.len();
    let mut failures = 0;
    for (position, page) in pages.iter().enumerate() {
        info!(model = %name, page = page.index, "processing page {}/{total}", position + 1);

        let result = match guard.transcribe(page) {
            Ok(text) => RunResult::succeeded(&name, page.index, text),
            Err(err) => {
                failures += 1;
                let reason = err.to_string();
                log.page_failed(&name, page.index, &reason);
                RunResult::failed(&name, page.index, reason)
            }
        };

        let output_path = model_dir.join(format!("page_{}.txt", page.index));
        if let Err(err) = write_text(&output_path, &result.persisted_text()) {
            log.output_write_failed(&name, page.index, &format!("{err:#}"));
        }

        match metrics::score(ground_truth.text_for(result.page), &result.text) {
            Ok(scores) => rows.push(scores.into_row(&result.model, result.page, result.error)),
            Err(err) => log.row_dropped(&name, result.page, &format!("{err:#}")),
        }
    }

    drop(guard);
    log.model_completed(&name, total, failures, started.elapsed());
}

/// Folder for one model's page outputs; path separators in the name are flattened.
fn model_output_dir(out_dir: &Path, name: &str) -> PathBuf {
    let safe: String = name
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.') {
                ch
            } else {
                '_'
            }
        })
        .collect();
    let safe = match safe.trim_matches('.') {
        "" => "model".to_string(),
        trimmed => trimmed.to_string(),
    };
    out_dir.join(safe)
}
