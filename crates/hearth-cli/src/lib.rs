use anyhow::{Context, Result};
use hearth_core::models::NewMediaFile;
use image::ImageFormat;
use std::path::{Path, PathBuf};

/// Field label used when a file argument carries none.
pub const DEFAULT_FIELD_LABEL: &str = "image";

/// Initialize tracing for the CLI.
///
/// `HEARTH_LOG_FORMAT=json` switches to one JSON object per event.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = std::env::var("HEARTH_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

/// A file argument: `label=path` or a bare path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileArg {
    pub field_label: String,
    pub path: PathBuf,
}

impl std::str::FromStr for FileArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (label, path) = match s.split_once('=') {
            Some((label, path)) if !label.is_empty() && !label.contains(['/', '\\']) => (label, path),
            _ => (DEFAULT_FIELD_LABEL, s),
        };

        if path.is_empty() {
            return Err(format!("missing path in '{}'", s));
        }

        Ok(FileArg {
            field_label: label.to_string(),
            path: PathBuf::from(path),
        })
    }
}

/// Content type inferred from the file extension.
pub fn content_type_for_path(path: &Path) -> String {
    ImageFormat::from_path(path)
        .map(|format| format.to_mime_type().to_string())
        .unwrap_or_else(|_| "application/octet-stream".to_string())
}

pub fn load_file(arg: &FileArg) -> Result<NewMediaFile> {
    let data = std::fs::read(&arg.path)
        .with_context(|| format!("Failed to read {}", arg.path.display()))?;
    let original_name = arg
        .path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| arg.field_label.clone());

    Ok(NewMediaFile::new(
        arg.field_label.clone(),
        original_name,
        content_type_for_path(&arg.path),
        data,
    ))
}
