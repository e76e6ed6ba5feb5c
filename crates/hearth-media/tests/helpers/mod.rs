//! Shared fixtures for lifecycle integration tests.
#![allow(dead_code)]

use bytes::Bytes;
use hearth_core::models::NewMediaFile;
use hearth_core::{MediaConfig, ParentFailurePolicy};
use hearth_db::MemoryEntityStore;
use hearth_media::MediaLifecycleCoordinator;
use hearth_storage::{MemoryStorage, Storage};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::io::Cursor;
use std::sync::Arc;

pub const BUCKET: &str = "event-media";

pub struct TestHarness {
    pub coordinator: MediaLifecycleCoordinator,
    pub storage: MemoryStorage,
    pub store: MemoryEntityStore,
}

pub fn test_config() -> MediaConfig {
    MediaConfig {
        default_bucket: BUCKET.to_string(),
        ..MediaConfig::default()
    }
}

pub fn setup() -> TestHarness {
    setup_with(test_config())
}

pub fn setup_with(config: MediaConfig) -> TestHarness {
    let storage = MemoryStorage::new("https://cdn.example.test/storage/v1/object/public");
    let store = MemoryEntityStore::new();
    let storage_handle: Arc<dyn Storage> = Arc::new(storage.clone());
    let coordinator = MediaLifecycleCoordinator::new(&config, storage_handle, Arc::new(store.clone()));

    TestHarness {
        coordinator,
        storage,
        store,
    }
}

pub fn setup_with_policy(policy: ParentFailurePolicy) -> TestHarness {
    setup_with(MediaConfig {
        parent_failure_policy: policy,
        ..test_config()
    })
}

/// A tiny PNG, well under any budget.
pub fn small_png() -> Bytes {
    let img = RgbImage::from_pixel(32, 32, Rgb([200, 120, 40]));
    encode(DynamicImage::ImageRgb8(img), ImageFormat::Png)
}

/// A noisy PNG that is far over the default budget.
pub fn noisy_png(width: u32, height: u32, seed: u64) -> Bytes {
    let mut rng = StdRng::seed_from_u64(seed);
    let img = RgbImage::from_fn(width, height, |_, _| Rgb([rng.random(), rng.random(), rng.random()]));
    encode(DynamicImage::ImageRgb8(img), ImageFormat::Png)
}

fn encode(img: DynamicImage, format: ImageFormat) -> Bytes {
    let mut buffer = Vec::new();
    img.write_to(&mut Cursor::new(&mut buffer), format)
        .expect("Failed to encode fixture image");
    Bytes::from(buffer)
}

pub fn png_file(field_label: &str, data: Bytes) -> NewMediaFile {
    NewMediaFile::new(field_label, format!("{}.png", field_label), "image/png", data)
}

pub fn fields() -> serde_json::Value {
    serde_json::json!({ "title": "Harvest fair", "venue": "Town hall" })
}
