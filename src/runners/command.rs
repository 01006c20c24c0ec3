use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde_json::{Map, Value};
use tempfile::TempDir;
use tracing::debug;

use super::{ModelRunner, RunnerError, param_str, param_str_list};
use crate::model::Page;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputSource {
    Stdout,
    /// First file with this extension written under `{output_dir}`.
    File { extension: String },
}

/// An OCR engine driven through its command-line interface.
///
/// `args` may contain the placeholders `{image}`, `{output_dir}` and `{lang}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub lang: String,
    pub output: OutputSource,
}

fn owned(args: &[&str]) -> Vec<String> {
    args.iter().map(|arg| arg.to_string()).collect()
}

impl CommandSpec {
    pub fn tesseract() -> Self {
        Self {
            program: PathBuf::from("tesseract"),
            args: owned(&["{image}", "stdout", "-l", "{lang}"]),
            lang: "eng".to_string(),
            output: OutputSource::Stdout,
        }
    }

    pub fn easyocr() -> Self {
        Self {
            program: PathBuf::from("easyocr"),
            args: owned(&["-l", "{lang}", "-f", "{image}", "--detail", "0", "--gpu", "False"]),
            lang: "en".to_string(),
            output: OutputSource::Stdout,
        }
    }

    pub fn paddle_ppstructure() -> Self {
        Self {
            program: PathBuf::from("paddleocr"),
            args: owned(&[
                "pp_structurev3",
                "-i",
                "{image}",
                "--use_doc_orientation_classify",
                "True",
                "--use_doc_unwarping",
                "False",
                "--save_path",
                "{output_dir}",
            ]),
            lang: "en".to_string(),
            output: OutputSource::File {
                extension: "md".to_string(),
            },
        }
    }

    pub fn with_params(mut self, params: &Map<String, Value>) -> Result<Self, RunnerError> {
        if let Some(program) = param_str(params, "program")? {
            self.program = PathBuf::from(program);
        }
        if let Some(args) = param_str_list(params, "args")? {
            self.args = args;
        }
        if let Some(lang) = param_str(params, "lang")? {
            self.lang = lang;
        }
        if let Some(extension) = param_str(params, "output_extension")? {
            self.output = if extension.is_empty() || extension == "stdout" {
                OutputSource::Stdout
            } else {
                OutputSource::File {
                    extension: extension.trim_start_matches('.').to_string(),
                }
            };
        }
        Ok(self)
    }

    pub fn expand_args(&self, image: &Path, output_dir: &Path) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| {
                arg.replace("{image}", &image.display().to_string())
                    .replace("{output_dir}", &output_dir.display().to_string())
                    .replace("{lang}", &self.lang)
            })
            .collect()
    }
}

/// Runs a [`CommandSpec`] once per page.
///
/// `load` only proves the program can be spawned and prepares scratch space.
/// Each page starts a fresh process, so engines that load weights at startup
/// (EasyOCR, PaddleOCR) pay that cost on every page; in exchange nothing stays
/// resident between pages or after `release`.
pub struct CommandRunner {
    name: String,
    spec: CommandSpec,
    scratch: Option<TempDir>,
}

impl CommandRunner {
    pub fn new(name: &str, spec: CommandSpec) -> Self {
        Self {
            name: name.to_string(),
            spec,
            scratch: None,
        }
    }

    fn program_label(&self) -> String {
        self.spec.program.display().to_string()
    }
}

impl ModelRunner for CommandRunner {
    fn name(&self) -> &str {
        &self.name
    }

    fn load(&mut self) -> Result<(), RunnerError> {
        // Spawning is enough to prove the program exists; its exit status is not checked.
        Command::new(&self.spec.program)
            .arg("--version")
            .output()
            .map_err(|err| {
                RunnerError::Init(format!("{} is not available: {err}", self.program_label()))
            })?;

        let scratch = tempfile::Builder::new()
            .prefix("ocr_bench_runner_")
            .tempdir()?;
        self.scratch = Some(scratch);
        Ok(())
    }

    fn transcribe(&mut self, page: &Page) -> Result<String, RunnerError> {
        let scratch = self
            .scratch
            .as_ref()
            .ok_or_else(|| RunnerError::Init("runner used before load".to_string()))?;
        let output_dir = scratch.path().join(format!("page_{}", page.index));
        if output_dir.exists() {
            fs::remove_dir_all(&output_dir)?;
        }
        fs::create_dir_all(&output_dir)?;

        let args = self.spec.expand_args(&page.image_path, &output_dir);
        debug!(program = %self.program_label(), args = ?args, "running ocr command");

        let output = Command::new(&self.spec.program)
            .args(&args)
            .output()
            .map_err(|err| RunnerError::Command {
                program: self.program_label(),
                message: err.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RunnerError::Command {
                program: self.program_label(),
                message: format!("exit status {}: {}", output.status, stderr.trim()),
            });
        }

        let raw = match &self.spec.output {
            OutputSource::Stdout => String::from_utf8_lossy(&output.stdout).into_owned(),
            OutputSource::File { extension } => {
                let path = find_output_file(&output_dir, extension)?.ok_or_else(|| {
                    RunnerError::MissingOutput(format!(
                        "no .{extension} file written to {}",
                        output_dir.display()
                    ))
                })?;
                fs::read_to_string(&path)?
            }
        };

        Ok(raw.replace('\u{0000}', "").trim().to_string())
    }

    fn release(&mut self) {
        self.scratch = None;
    }
}

/// Searches `dir` and its direct subdirectories, in name order.
fn find_output_file(dir: &Path, extension: &str) -> Result<Option<PathBuf>, RunnerError> {
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)?
        .map(|entry| entry.map(|entry| entry.path()))
        .collect::<Result<_, _>>()?;
    entries.sort();

    let has_extension = |path: &Path| {
        path.is_file()
            && path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.eq_ignore_ascii_case(extension))
                .unwrap_or(false)
    };

    if let Some(found) = entries.iter().find(|path| has_extension(path.as_path())) {
        return Ok(Some(found.clone()));
    }

    for subdir in entries.iter().filter(|path| path.is_dir()) {
        let mut nested: Vec<PathBuf> = fs::read_dir(subdir)?
            .map(|entry| entry.map(|entry| entry.path()))
            .collect::<Result<_, _>>()?;
        nested.sort();
        if let Some(found) = nested.into_iter().find(|path| has_extension(path.as_path())) {
            return Ok(Some(found));
        }
    }

    Ok(None)
}
