//! Object key construction and URL-to-key derivation.
//!
//! Key format: `{field_label}-{unix_millis}-{random}{.ext}`. The random suffix
//! makes two uploads of the same field in the same millisecond land on
//! different keys without looking at what is already stored.

use crate::traits::{StorageError, StorageResult};
use rand::Rng;
use std::path::Path;

/// Extension of everything the compressor emits.
pub const COMPRESSED_EXTENSION: &str = "jpg";

const RANDOM_SUFFIX_BOUND: u32 = 1_000_000_000;
const MAX_LABEL_LEN: usize = 64;

/// Generate a fresh object key for an upload.
pub fn generate_object_key(field_label: &str, extension: &str) -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let suffix = rand::rng().random_range(0..RANDOM_SUFFIX_BOUND);
    compose_object_key(field_label, millis, suffix, extension)
}

/// Assemble a key from its parts.
pub fn compose_object_key(field_label: &str, millis: i64, suffix: u32, extension: &str) -> String {
    let label = sanitize_label(field_label);
    if extension.is_empty() {
        format!("{}-{}-{}", label, millis, suffix)
    } else {
        format!("{}-{}-{}.{}", label, millis, suffix, extension)
    }
}

/// Pick the key extension for an upload.
///
/// Compressed output is always JPEG. Otherwise the original file name decides,
/// falling back to the MIME subtype when the name carries no extension.
pub fn extension_for(original_name: &str, content_type: &str, compressed: bool) -> String {
    if compressed {
        return COMPRESSED_EXTENSION.to_string();
    }

    let from_name = Path::new(original_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()));

    from_name.unwrap_or_else(|| {
        content_type
            .split(';')
            .next()
            .and_then(|mime| mime.trim().split('/').nth(1))
            .map(|subtype| subtype.split('+').next().unwrap_or(subtype).to_lowercase())
            .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
            .unwrap_or_default()
    })
}

/// Derive the object key from a public URL (its final `/` segment) or accept a bare key.
///
/// This relies on every backend's `url_for` ending in `/{key}`; the pipeline has
/// no way to verify that for URLs written by other systems.
pub fn key_from_url(url_or_key: &str) -> StorageResult<String> {
    let without_fragment = url_or_key.split('#').next().unwrap_or("");
    let without_query = without_fragment.split('?').next().unwrap_or("");
    let key = without_query
        .rsplit('/')
        .next()
        .unwrap_or("")
        .trim();

    if key.is_empty() {
        return Err(StorageError::InvalidKey(format!(
            "cannot derive an object key from '{}'",
            url_or_key
        )));
    }

    Ok(key.to_string())
}

fn sanitize_label(label: &str) -> String {
    let cleaned: String = label
        .trim()
        .chars()
        .take(MAX_LABEL_LEN)
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compose_uses_label_millis_suffix_and_extension() {
        assert_eq!(
            compose_object_key("image", 1_700_000_000_123, 42, "jpg"),
            "image-1700000000123-42.jpg"
        );
        assert_eq!(compose_object_key("image", 5, 7, ""), "image-5-7");
    }

    #[test]
    fn labels_are_sanitized() {
        assert_eq!(compose_object_key("cover photo/1", 1, 2, "png"), "cover_photo_1-1-2.png");
        assert_eq!(compose_object_key("   ", 1, 2, "png"), "file-1-2.png");
    }

    #[test]
    fn generated_keys_differ_for_identical_inputs() {
        let keys: std::collections::HashSet<String> =
            (0..200).map(|_| generate_object_key("image", "jpg")).collect();
        assert_eq!(keys.len(), 200);
    }

    #[test]
    fn compressed_output_always_gets_jpg() {
        assert_eq!(extension_for("scan.PNG", "image/png", true), "jpg");
        assert_eq!(extension_for("scan.PNG", "image/png", false), "png");
    }

    #[test]
    fn extension_falls_back_to_mime_subtype() {
        assert_eq!(extension_for("blob", "image/webp", false), "webp");
        assert_eq!(extension_for("vector", "image/svg+xml", false), "svg");
        assert_eq!(extension_for("blob", "", false), "");
    }

    #[test]
    fn key_from_url_takes_final_segment() {
        assert_eq!(
            key_from_url("https://cdn.example.org/storage/v1/object/public/event-media/image-1-2.jpg")
                .unwrap(),
            "image-1-2.jpg"
        );
        assert_eq!(
            key_from_url("https://cdn.example.org/event-media/image-1-2.jpg?v=3#top").unwrap(),
            "image-1-2.jpg"
        );
        assert_eq!(key_from_url("image-1-2.jpg").unwrap(), "image-1-2.jpg");
    }

    #[test]
    fn key_from_url_rejects_empty_segments() {
        assert!(key_from_url("").is_err());
        assert!(key_from_url("https://cdn.example.org/event-media/").is_err());
        assert!(key_from_url("?only=query").is_err());
    }
}
