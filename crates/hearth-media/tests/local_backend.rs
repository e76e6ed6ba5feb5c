mod helpers;

use hearth_core::{MediaConfig, StorageBackend};
use hearth_db::{EntityStore, MemoryEntityStore};
use hearth_media::MediaLifecycleCoordinator;
use hearth_storage::create_storage;
use hearth_storage::keys::key_from_url;
use helpers::{fields, noisy_png, png_file, small_png, BUCKET};
use std::sync::Arc;

#[tokio::test]
async fn create_and_delete_against_local_filesystem() {
    let dir = tempfile::tempdir().unwrap();
    let config = MediaConfig {
        storage_backend: StorageBackend::Local,
        local_storage_path: Some(dir.path().to_string_lossy().into_owned()),
        local_storage_base_url: Some("http://localhost:3000/media".to_string()),
        default_bucket: BUCKET.to_string(),
        ..MediaConfig::default()
    };
    config.validate().unwrap();

    let storage = create_storage(&config).await.unwrap();
    let store = MemoryEntityStore::new();
    let coordinator = MediaLifecycleCoordinator::new(&config, storage, Arc::new(store.clone()));

    let created = coordinator
        .create_with_media(
            fields(),
            vec![png_file("cover", small_png()), png_file("poster", noisy_png(700, 500, 2))],
        )
        .await
        .unwrap();

    let paths: Vec<_> = created
        .media
        .iter()
        .map(|m| dir.path().join(BUCKET).join(key_from_url(&m.storage_path).unwrap()))
        .collect();
    for (asset, path) in created.media.iter().zip(&paths) {
        assert!(asset.storage_path.starts_with("http://localhost:3000/media/event-media/"));
        assert!(path.exists(), "{} missing", path.display());
    }
    assert_eq!(paths[1].extension().unwrap(), "jpg");
    assert!(std::fs::metadata(&paths[1]).unwrap().len() > 0);

    let report = coordinator.delete_parent(created.parent_id).await.unwrap();
    assert!(report.is_clean());
    assert!(paths.iter().all(|p| !p.exists()));
    assert!(store.find_parent(created.parent_id).await.unwrap().is_none());
}
