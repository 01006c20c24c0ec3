use std::fs;
use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result, bail};
use regex::Regex;
use tempfile::TempDir;
use tracing::info;

use crate::model::Page;
use crate::util::tool_path;

const PAGE_PREFIX: &str = "page";

/// Page images rendered into a temporary directory that lives as long as this value.
#[derive(Debug)]
pub struct RenderedPages {
    _dir: TempDir,
    pages: Vec<Page>,
}

impl RenderedPages {
    pub fn pages(&self) -> &[Page] {
        &self.pages
    }
}

pub fn render_pdf(pdf_path: &Path, dpi: u32, poppler_path: Option<&Path>) -> Result<RenderedPages> {
    let dir = tempfile::Builder::new()
        .prefix("ocr_bench_pages_")
        .tempdir()
        .context("failed to create page image directory")?;
    let output_root = dir.path().join(PAGE_PREFIX);
    let program = tool_path(poppler_path, "pdftoppm");

    info!(pdf = %pdf_path.display(), dpi, "rendering pdf pages");

    let output = Command::new(&program)
        .arg("-r")
        .arg(dpi.to_string())
        .arg("-png")
        .arg(pdf_path)
        .arg(&output_root)
        .output()
        .with_context(|| format!("failed to execute {}", program.display()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!(
            "pdftoppm returned non-zero exit status for {}: {}",
            pdf_path.display(),
            stderr.trim()
        );
    }

    let pages = collect_pages(dir.path())?;
    if pages.is_empty() {
        bail!("pdftoppm produced no page images for {}", pdf_path.display());
    }

    info!(pages = pages.len(), "rendered pdf pages");
    Ok(RenderedPages { _dir: dir, pages })
}

/// Finds `page-<n>.png` files (pdftoppm zero-pads `n`) and orders them by page.
fn collect_pages(dir: &Path) -> Result<Vec<Page>> {
    let pattern = Regex::new(&format!(r"^{PAGE_PREFIX}-(\d+)\.png$"))
        .context("failed to compile page image regex")?;

    let mut pages = Vec::new();
    let entries = fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("failed to read entry in {}", dir.display()))?;
        let path = entry.path();

        let index = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| pattern.captures(name))
            .and_then(|captures| captures.get(1))
            .and_then(|value| value.as_str().parse::<u32>().ok());

        if let Some(index) = index {
            pages.push(Page {
                index,
                image_path: path,
            });
        }
    }

    pages.sort_by_key(|page| page.index);
    Ok(pages)
}
