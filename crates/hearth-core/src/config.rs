//! Configuration module
//!
//! Pipeline settings are read from `HEARTH_*` environment variables (a `.env`
//! file is honoured when present). Every knob has a default, so an empty
//! environment yields a usable in-memory configuration.

use serde::Deserialize;

use crate::constants::{
    DEFAULT_BUCKET, DEFAULT_CACHE_CONTROL, DEFAULT_COMPRESSION_BUDGET_BYTES,
    DEFAULT_COMPRESSION_MAX_WIDTH, DEFAULT_MAX_CONCURRENT_ENCODES, DEFAULT_MAX_FILES_PER_REQUEST,
    DEFAULT_MAX_FILE_SIZE_BYTES,
};
use crate::storage_types::StorageBackend;

const ENV_PREFIX: &str = "HEARTH_";

/// What happens to a freshly created parent row when its media batch fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParentFailurePolicy {
    /// Keep the parent row; it simply has no media.
    #[default]
    Retain,
    /// Delete the parent row again. Objects already written stay orphaned.
    Remove,
}

/// Media pipeline configuration
#[derive(Clone, Debug, Deserialize)]
pub struct MediaConfig {
    #[serde(default)]
    pub database_url: Option<String>,
    #[serde(default = "default_storage_backend")]
    pub storage_backend: StorageBackend,
    #[serde(default)]
    pub s3_region: Option<String>,
    /// Custom endpoint for S3-compatible providers (MinIO, Supabase, ...)
    #[serde(default)]
    pub s3_endpoint: Option<String>,
    /// Overrides the URL prefix handed back to callers: `{public_base_url}/{bucket}/{key}`
    #[serde(default)]
    pub public_base_url: Option<String>,
    #[serde(default)]
    pub local_storage_path: Option<String>,
    #[serde(default)]
    pub local_storage_base_url: Option<String>,
    #[serde(default = "default_bucket")]
    pub default_bucket: String,
    #[serde(default = "default_compression_budget_bytes")]
    pub compression_budget_bytes: usize,
    #[serde(default = "default_compression_max_width")]
    pub compression_max_width: u32,
    #[serde(default = "default_max_file_size_bytes")]
    pub max_file_size_bytes: usize,
    #[serde(default = "default_max_files_per_request")]
    pub max_files_per_request: usize,
    #[serde(default = "default_max_concurrent_encodes")]
    pub max_concurrent_encodes: usize,
    /// Extra upload attempts per file; every attempt uses a fresh key.
    #[serde(default)]
    pub upload_retries: u32,
    #[serde(default = "default_cache_control")]
    pub cache_control: String,
    #[serde(default)]
    pub parent_failure_policy: ParentFailurePolicy,
    #[serde(default = "default_environment")]
    pub environment: String,
}

fn default_storage_backend() -> StorageBackend {
    StorageBackend::Memory
}

fn default_bucket() -> String {
    DEFAULT_BUCKET.to_string()
}

fn default_compression_budget_bytes() -> usize {
    DEFAULT_COMPRESSION_BUDGET_BYTES
}

fn default_compression_max_width() -> u32 {
    DEFAULT_COMPRESSION_MAX_WIDTH
}

fn default_max_file_size_bytes() -> usize {
    DEFAULT_MAX_FILE_SIZE_BYTES
}

fn default_max_files_per_request() -> usize {
    DEFAULT_MAX_FILES_PER_REQUEST
}

fn default_max_concurrent_encodes() -> usize {
    DEFAULT_MAX_CONCURRENT_ENCODES
}

fn default_cache_control() -> String {
    DEFAULT_CACHE_CONTROL.to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            storage_backend: default_storage_backend(),
            s3_region: None,
            s3_endpoint: None,
            public_base_url: None,
            local_storage_path: None,
            local_storage_base_url: None,
            default_bucket: default_bucket(),
            compression_budget_bytes: default_compression_budget_bytes(),
            compression_max_width: default_compression_max_width(),
            max_file_size_bytes: default_max_file_size_bytes(),
            max_files_per_request: default_max_files_per_request(),
            max_concurrent_encodes: default_max_concurrent_encodes(),
            upload_retries: 0,
            cache_control: default_cache_control(),
            parent_failure_policy: ParentFailurePolicy::default(),
            environment: default_environment(),
        }
    }
}

impl MediaConfig {
    /// Load from the process environment, reading `.env` first if present.
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_vars(std::env::vars())
    }

    /// Load from an explicit list of variables (used by tests).
    pub fn from_vars<I>(vars: I) -> Result<Self, anyhow::Error>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let config: MediaConfig = envy::prefixed(ENV_PREFIX)
            .from_iter(vars)
            .map_err(|e| anyhow::anyhow!("Invalid {}* configuration: {}", ENV_PREFIX, e))?;
        config.validate()?;
        Ok(config)
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.compression_budget_bytes == 0 {
            anyhow::bail!("HEARTH_COMPRESSION_BUDGET_BYTES must be greater than zero");
        }
        if self.compression_max_width == 0 {
            anyhow::bail!("HEARTH_COMPRESSION_MAX_WIDTH must be greater than zero");
        }
        if self.max_files_per_request == 0 {
            anyhow::bail!("HEARTH_MAX_FILES_PER_REQUEST must be greater than zero");
        }
        if self.max_concurrent_encodes == 0 {
            anyhow::bail!("HEARTH_MAX_CONCURRENT_ENCODES must be greater than zero");
        }
        if self.default_bucket.trim().is_empty() {
            anyhow::bail!("HEARTH_DEFAULT_BUCKET must not be empty");
        }

        match self.storage_backend {
            StorageBackend::S3 => {
                if self.s3_region.is_none() && self.s3_endpoint.is_none() {
                    anyhow::bail!("HEARTH_S3_REGION or HEARTH_S3_ENDPOINT is required for s3 storage");
                }
            }
            StorageBackend::Local => {
                if self.local_storage_path.is_none() || self.local_storage_base_url.is_none() {
                    anyhow::bail!(
                        "HEARTH_LOCAL_STORAGE_PATH and HEARTH_LOCAL_STORAGE_BASE_URL are required for local storage"
                    );
                }
            }
            StorageBackend::Memory => {
                if self.is_production() {
                    anyhow::bail!("memory storage cannot be used in production");
                }
            }
        }

        Ok(())
    }
}
