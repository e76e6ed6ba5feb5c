//! Pipeline-wide defaults.

/// Target byte size for compressed images (200 KiB).
pub const DEFAULT_COMPRESSION_BUDGET_BYTES: usize = 200 * 1024;

/// Widest image the compressor emits.
pub const DEFAULT_COMPRESSION_MAX_WIDTH: u32 = 1920;

/// Per-file ceiling enforced at intake, before compression (20 MiB).
pub const DEFAULT_MAX_FILE_SIZE_BYTES: usize = 20 * 1024 * 1024;

/// Per-request file count ceiling enforced at intake.
pub const DEFAULT_MAX_FILES_PER_REQUEST: usize = 20;

/// Concurrent CPU-bound encodes allowed across all requests.
pub const DEFAULT_MAX_CONCURRENT_ENCODES: usize = 4;

pub const DEFAULT_CACHE_CONTROL: &str = "max-age=3600";

pub const DEFAULT_BUCKET: &str = "event-media";
