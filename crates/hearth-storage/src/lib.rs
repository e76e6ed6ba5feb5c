//! Hearth Storage Library
//!
//! Object store abstraction for the media pipeline, its backends (S3-compatible,
//! local filesystem, in-memory) and the two operations the pipeline performs
//! against it: uploading a processed image and deleting a stored one.
//!
//! # Object key format
//!
//! Keys are flat and bucket-relative: `{field_label}-{unix_millis}-{random}.{ext}`.
//! Public URLs always end in `/{key}`, so the key can be recovered from a stored
//! URL by taking its final path segment. Key handling lives in the `keys` module
//! so uploader and deleter agree on it.

pub mod deleter;
pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
pub mod memory;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;
pub mod uploader;

// Re-export commonly used types
pub use deleter::{DeletionOutcome, DeletionTarget, StorageDeleter};
pub use factory::create_storage;
pub use hearth_core::StorageBackend;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
pub use memory::MemoryStorage;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{PutResult, Storage, StorageError, StorageResult};
pub use uploader::{StorageUploader, UploadedObject};
