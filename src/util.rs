use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

pub const SAMPLE_DATA_DIR: &str = "sample_data";
pub const ENV_FILE: &str = ".env";

pub fn now_utc_string() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn ensure_directory(path: &Path) -> Result<()> {
    fs::create_dir_all(path)
        .with_context(|| format!("failed to create directory: {}", path.display()))
}

pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)
        .with_context(|| format!("failed to open file for hashing: {}", path.display()))?;

    let mut hasher = Sha256::new();
    let mut buf = [0_u8; 8192];

    loop {
        let count = file
            .read(&mut buf)
            .with_context(|| format!("failed to read file for hashing: {}", path.display()))?;
        if count == 0 {
            break;
        }
        hasher.update(&buf[..count]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

pub fn write_text(path: &Path, text: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_directory(parent)?;
    }
    fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))
}

pub fn write_json_pretty<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_directory(parent)?;
    }

    let data = serde_json::to_vec_pretty(value)
        .with_context(|| format!("failed to serialize json: {}", path.display()))?;

    let mut file = File::create(path)
        .with_context(|| format!("failed to create json file: {}", path.display()))?;
    file.write_all(&data)
        .with_context(|| format!("failed to write json file: {}", path.display()))?;
    file.write_all(b"\n")
        .with_context(|| format!("failed to finalize json file: {}", path.display()))?;

    Ok(())
}

/// Returns `path` when it exists, otherwise the same file name under `fallback_dir`.
pub fn resolve_input_path(path: &Path, fallback_dir: &Path) -> Result<PathBuf> {
    if path.exists() {
        return Ok(path.to_path_buf());
    }

    if let Some(name) = path.file_name() {
        let fallback = fallback_dir.join(name);
        if fallback.exists() {
            info!(
                requested = %path.display(),
                fallback = %fallback.display(),
                "input not found, using fallback"
            );
            return Ok(fallback);
        }
    }

    bail!(
        "input file not found at '{}' or in '{}'",
        path.display(),
        fallback_dir.display()
    );
}

/// Loads `KEY=value` lines from `path` into the process environment.
///
/// Variables already set in the environment win. Returns `false` when the file does not exist.
pub fn load_env_file(path: &Path) -> Result<bool> {
    match dotenvy::from_path(path) {
        Ok(()) => {
            info!(path = %path.display(), "loaded environment file");
            Ok(true)
        }
        Err(err) if err.not_found() => {
            debug!(path = %path.display(), "no environment file");
            Ok(false)
        }
        Err(err) => Err(err).with_context(|| format!("failed to load {}", path.display())),
    }
}

/// Resolves a poppler-style tool name against an optional binary directory.
pub fn tool_path(tool_dir: Option<&Path>, program: &str) -> PathBuf {
    match tool_dir {
        Some(dir) => dir.join(program),
        None => PathBuf::from(program),
    }
}
