use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cli::GroundTruthArgs;
use crate::config::Config;
use crate::ground_truth::GroundTruth;
use crate::model::Page;
use crate::pages::render_pdf;
use crate::runners::{
    Credentials, DEFAULT_TIMEOUT_SECS, GEMINI_ENDPOINT, GOOGLE_API_KEY_ENV, GROUND_TRUTH_PROMPT,
    GeminiClient, RunnerError,
};
use crate::util::{SAMPLE_DATA_DIR, resolve_input_path};

pub fn run(args: GroundTruthArgs, config: &Config) -> Result<()> {
    let plan = config.ground_truth_generation.resolve(&args)?;
    let api_key = Credentials::from_env()
        .google_api_key
        .with_context(|| format!("{GOOGLE_API_KEY_ENV} environment variable not set"))?;
    let pdf = resolve_input_path(&plan.pdf, Path::new(SAMPLE_DATA_DIR))?;

    info!(
        pdf = %pdf.display(),
        model = %plan.model_name,
        dpi = plan.dpi,
        output = %plan.output_json.display(),
        "generating ground truth"
    );

    let client = GeminiClient::new(
        GEMINI_ENDPOINT,
        &api_key,
        &plan.model_name,
        Duration::from_secs(DEFAULT_TIMEOUT_SECS),
    )
    .context("failed to create api client")?;
    let rendered = render_pdf(&pdf, plan.dpi, plan.poppler_path.as_deref())?;

    let ground_truth = transcribe_pages(rendered.pages(), |page| {
        let png = fs::read(&page.image_path)?;
        client.transcribe_png(&png, GROUND_TRUTH_PROMPT)
    });

    ground_truth.save(&plan.output_json)?;
    info!(
        pages = ground_truth.len(),
        path = %plan.output_json.display(),
        "ground truth saved"
    );
    Ok(())
}

/// Placeholder stored for a page the model could not transcribe.
pub fn failed_page_placeholder(page: u32) -> String {
    format!("[ERROR: Could not transcribe page {page}]")
}

/// Transcribes pages in order; a failed page gets a placeholder instead of aborting the run.
fn transcribe_pages<F>(pages: &[Page], mut transcribe: F) -> GroundTruth
where
    F: FnMut(&Page) -> Result<String, RunnerError>,
{
    let mut ground_truth = GroundTruth::new();
    let total = pages.len();
    for (position, page) in pages.iter().enumerate() {
        info!(page = page.index, "transcribing page {}/{total}", position + 1);
        match transcribe(page) {
            Ok(text) => ground_truth.insert(page.index, text),
            Err(err) => {
                warn!(page = page.index, error = %err, "page transcription failed");
                ground_truth.insert(page.index, failed_page_placeholder(page.index));
            }
        }
    }
    ground_truth
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn page(index: u32) -> Page {
        Page {
            index,
            image_path: PathBuf::from(format!("page-{index}.png")),
        }
    }

    #[test]
    fn failed_pages_get_placeholders_and_others_are_kept() {
        let pages = vec![page(1), page(2), page(3)];
        let ground_truth = transcribe_pages(&pages, |page| {
            if page.index == 2 {
                Err(RunnerError::Api {
                    status: 500,
                    message: "internal".to_string(),
                })
            } else {
                Ok(format!("text of page {}", page.index))
            }
        });

        assert_eq!(ground_truth.len(), 3);
        assert_eq!(ground_truth.text_for(1), "text of page 1");
        assert_eq!(
            ground_truth.text_for(2),
            "[ERROR: Could not transcribe page 2]"
        );
        assert_eq!(ground_truth.text_for(3), "text of page 3");
    }

    #[test]
    fn saved_ground_truth_loads_back_by_page() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("gt").join("ground_truth.json");
        let ground_truth = transcribe_pages(&[page(1), page(2)], |page| {
            Ok(format!("line {}\nsecond line", page.index))
        });

        ground_truth.save(&path).expect("save");
        let loaded = crate::ground_truth::load(&path).expect("load");
        assert_eq!(loaded, ground_truth);
    }
}
