use hearth_core::models::NewMediaFile;
use hearth_core::{AppError, MediaConfig};

/// Intake validation errors for uploaded media
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("File too large: {size} bytes (max: {max} bytes)")]
    FileTooLarge { size: usize, max: usize },

    #[error("Invalid content type: {content_type} (expected image/*)")]
    NotAnImage { content_type: String },

    #[error("Too many files: {count} (max: {max})")]
    TooManyFiles { count: usize, max: usize },

    #[error("Empty file: {0}")]
    EmptyFile(String),
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err.to_string())
    }
}

/// Per-file and per-request limits applied before any bytes are processed.
#[derive(Debug, Clone, Copy)]
pub struct IntakePolicy {
    max_file_size: usize,
    max_files: usize,
}

impl IntakePolicy {
    pub fn new(max_file_size: usize, max_files: usize) -> Self {
        Self {
            max_file_size,
            max_files,
        }
    }

    pub fn from_config(config: &MediaConfig) -> Self {
        Self::new(config.max_file_size_bytes, config.max_files_per_request)
    }

    pub fn validate_content_type(&self, content_type: &str) -> Result<(), ValidationError> {
        let normalized = content_type.trim().to_ascii_lowercase();
        match normalized.split_once('/') {
            Some(("image", subtype)) if !subtype.is_empty() => Ok(()),
            _ => Err(ValidationError::NotAnImage {
                content_type: content_type.to_string(),
            }),
        }
    }

    pub fn validate_file(&self, file: &NewMediaFile) -> Result<(), ValidationError> {
        self.validate_content_type(&file.content_type)?;

        if file.is_empty() {
            return Err(ValidationError::EmptyFile(file.original_name.clone()));
        }

        if file.len() > self.max_file_size {
            return Err(ValidationError::FileTooLarge {
                size: file.len(),
                max: self.max_file_size,
            });
        }

        Ok(())
    }

    /// Validate a whole request. The first offending file decides the error.
    ///
    /// An empty batch is valid: a parent may be created without media.
    pub fn validate_batch(&self, files: &[NewMediaFile]) -> Result<(), ValidationError> {
        if files.len() > self.max_files {
            return Err(ValidationError::TooManyFiles {
                count: files.len(),
                max: self.max_files,
            });
        }

        files.iter().try_for_each(|file| self.validate_file(file))
    }
}

impl Default for IntakePolicy {
    fn default() -> Self {
        Self::from_config(&MediaConfig::default())
    }
}
