//! Comprehensive test to verify the metadata storage abstraction

#[cfg(test)]
mod integration_tests {
    use crate::error::ErrorKind;
    use crate::metadata::config::{MetadataBackend, MetadataConfig};
    use crate::metadata::{MetadataStore, NewFileRecord};
    use chrono::Utc;
    use std::sync::Arc;
    use std::thread;
    use tempfile::TempDir;

    fn stores(dir: &TempDir) -> Vec<(MetadataBackend, Arc<dyn MetadataStore>)> {
        [MetadataBackend::Sqlite, MetadataBackend::Mock]
            .into_iter()
            .map(|backend| {
                let config = MetadataConfig {
                    backend,
                    db_path: dir.path().join("metadata.db").to_string_lossy().into_owned(),
                    wal_mode: true,
                };
                (backend, config.create_store().expect("Failed to create store"))
            })
            .collect()
    }

    fn new_record(storage_identifier: &str) -> NewFileRecord {
        NewFileRecord {
            original_filename: "photo.jpg".into(),
            content_type: "image/jpeg".into(),
            size: 2048,
            checksum: "ef".repeat(32),
            storage_identifier: storage_identifier.into(),
            upload_time: Utc::now(),
        }
    }

    #[test]
    fn test_metadata_abstraction_end_to_end() {
        let dir = TempDir::new().unwrap();
        for (backend, store) in stores(&dir) {
            println!("Testing with backend: {:?}", backend);

            let created = store.create(new_record("e2e-blob")).expect("Create failed");
            assert_eq!(created.download_count, 0);

            assert_eq!(store.get(created.id).expect("Get failed"), created);
            assert_eq!(
                store.get_by_storage_identifier("e2e-blob").expect("Lookup failed"),
                Some(created.clone())
            );

            let first_list = store.list_all().expect("List failed");
            assert_eq!(first_list, store.list_all().expect("Second list failed"));
            assert_eq!(first_list, vec![created.clone()]);

            let bumped = store.increment_download_count(created.id).expect("Increment failed");
            assert_eq!(bumped.download_count, 1);
            assert_eq!(bumped.checksum, created.checksum);
            assert_eq!(bumped.size, created.size);

            store.delete(created.id).expect("Delete failed");
            assert_eq!(store.get(created.id).unwrap_err().kind(), ErrorKind::NotFound);
            assert_eq!(store.get_by_storage_identifier("e2e-blob").unwrap(), None);
        }
    }

    #[test]
    fn test_concurrent_increments_are_not_lost() {
        let dir = TempDir::new().unwrap();
        for (backend, store) in stores(&dir) {
            let record = store.create(new_record(&format!("hot-{:?}", backend))).unwrap();

            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let store = store.clone();
                    thread::spawn(move || {
                        for _ in 0..25 {
                            store.increment_download_count(record.id).unwrap();
                        }
                    })
                })
                .collect();
            for handle in handles {
                handle.join().unwrap();
            }

            assert_eq!(store.get(record.id).unwrap().download_count, 200, "backend {:?}", backend);
        }
    }
}
