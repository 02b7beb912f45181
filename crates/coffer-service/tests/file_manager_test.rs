//! File manager scenarios: round-trips, quota enforcement, cache
//! coherence, moves, and integrity verification.

mod support;

use bytes::Bytes;
use coffer_core::error::ErrorKind;
use coffer_core::traits::ObjectStore;
use coffer_core::types::pagination::PageRequest;
use coffer_database::repositories::EntityRepository;
use coffer_entity::file::{FileFilter, FileKind};
use support::{create_entity, harness, upload, upload_params};

const MB: i64 = 1024 * 1024;

#[tokio::test]
async fn test_upload_download_roundtrip() {
    let h = harness().await;
    let entity = create_entity(&h, "acme", 100 * MB).await;

    let content = b"the quick brown fox";
    let file = upload(&h, entity.id, "docs/fox.txt", content).await;
    assert_eq!(file.size_bytes, content.len() as i64);
    assert_eq!(file.version_count, 1);
    assert_eq!(file.kind, FileKind::Document);
    assert_eq!(file.content_type.as_deref(), Some("text/plain"));

    // The presigned link points at the blob; no bytes flow through the
    // engine. The local provider issues file:// URLs.
    let link = h.files.download(entity.id, "docs/fox.txt").await.unwrap();
    let path = link
        .url
        .strip_prefix("file://")
        .and_then(|rest| rest.split('?').next())
        .unwrap();
    let on_disk = std::fs::read(path).unwrap();
    assert_eq!(on_disk, content);
}

#[tokio::test]
async fn test_verify_true_then_false_after_corruption() {
    let h = harness().await;
    let entity = create_entity(&h, "acme", 100 * MB).await;

    let file = upload(&h, entity.id, "ledger.csv", b"a,b,c\n1,2,3\n").await;
    assert!(h.files.verify(entity.id, "ledger.csv").await.unwrap());

    // Corrupt the blob behind the engine's back.
    h.store
        .put(
            &h.storage_config.bucket,
            &file.storage_key,
            Bytes::from_static(b"tampered"),
            None,
            None,
        )
        .await
        .unwrap();
    assert!(!h.files.verify(entity.id, "ledger.csv").await.unwrap());
}

#[tokio::test]
async fn test_quota_scenario() {
    let h = harness().await;
    let entity = create_entity(&h, "bounded", 10 * MB).await;

    upload(&h, entity.id, "a.txt", &vec![b'a'; (6 * MB) as usize]).await;

    let err = h
        .files
        .upload(
            entity.id,
            upload_params("b.txt", &vec![b'b'; (5 * MB) as usize]),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::LimitExceeded);

    // Only a.txt survives, with a single version.
    let page = h
        .files
        .list(entity.id, &FileFilter::default(), &PageRequest::default())
        .await
        .unwrap();
    assert_eq!(page.total_items, 1);
    assert_eq!(page.items[0].path, "a.txt");
    assert_eq!(page.items[0].version_count, 1);

    // The refused upload left no orphan blob behind.
    let blobs = h
        .store
        .list(&h.storage_config.bucket, "files/", true)
        .await
        .unwrap();
    assert_eq!(blobs.len(), 1);

    // Usage still reflects a.txt only, so a fitting upload succeeds.
    let refreshed = h.entities.find_by_id(entity.id).await.unwrap().unwrap();
    assert_eq!(refreshed.total_size_bytes, 6 * MB);
    upload(&h, entity.id, "c.txt", &vec![b'c'; (3 * MB) as usize]).await;
}

#[tokio::test]
async fn test_cache_coherence_after_writes() {
    let h = harness().await;
    let entity = create_entity(&h, "acme", 100 * MB).await;

    let v1 = upload(&h, entity.id, "note.md", b"first").await;
    // Populate the cache.
    let cached = h.files.get_file(entity.id, "note.md").await.unwrap();
    assert_eq!(cached.checksum_sha256, v1.checksum_sha256);

    // Overwrite invalidates rather than updating in place; the next read
    // must see the new content's metadata, not a stale value.
    let v2 = upload(&h, entity.id, "note.md", b"second").await;
    let after = h.files.get_file(entity.id, "note.md").await.unwrap();
    assert_eq!(after.checksum_sha256, v2.checksum_sha256);
    assert_ne!(after.checksum_sha256, v1.checksum_sha256);

    // Delete sweeps the entry; a subsequent get misses.
    h.files.delete(entity.id, "note.md").await.unwrap();
    let err = h.files.get_file(entity.id, "note.md").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
}

#[tokio::test]
async fn test_delete_removes_blobs_and_usage() {
    let h = harness().await;
    let entity = create_entity(&h, "acme", 100 * MB).await;

    upload(&h, entity.id, "doomed.bin", &[0u8; 2048]).await;
    upload(&h, entity.id, "doomed.bin", &[1u8; 4096]).await;
    h.files.delete(entity.id, "doomed.bin").await.unwrap();

    let refreshed = h.entities.find_by_id(entity.id).await.unwrap().unwrap();
    assert_eq!(refreshed.total_size_bytes, 0);
    assert_eq!(refreshed.file_count, 0);

    // Current blob and both version blobs are gone.
    let current = h
        .store
        .list(&h.storage_config.bucket, "files/", true)
        .await
        .unwrap();
    assert!(current.is_empty());
    let versions = h
        .store
        .list(&h.storage_config.bucket, "versions/", true)
        .await
        .unwrap();
    assert!(versions.is_empty());

    let err = h.files.delete(entity.id, "doomed.bin").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
}

#[tokio::test]
async fn test_move_copy_then_delete() {
    let h = harness().await;
    let entity = create_entity(&h, "acme", 100 * MB).await;

    upload(&h, entity.id, "old/report.pdf", b"%PDF-1.7").await;
    upload(&h, entity.id, "occupied.txt", b"here first").await;

    let moved = h
        .files
        .move_file(entity.id, "old/report.pdf", "new/report.pdf")
        .await
        .unwrap();
    assert_eq!(moved.path, "new/report.pdf");

    let err = h
        .files
        .get_file(entity.id, "old/report.pdf")
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);

    let content = h
        .store
        .get_bytes(&h.storage_config.bucket, &moved.storage_key)
        .await
        .unwrap();
    assert_eq!(&content[..], b"%PDF-1.7");

    // Destination occupied -> refused.
    let err = h
        .files
        .move_file(entity.id, "new/report.pdf", "occupied.txt")
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Conflict);
}

#[tokio::test]
async fn test_list_filters_and_ordering() {
    let h = harness().await;
    let entity = create_entity(&h, "acme", 100 * MB).await;

    upload(&h, entity.id, "docs/a.md", b"a").await;
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    upload(&h, entity.id, "img/logo.png", b"\x89PNG").await;
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    upload(&h, entity.id, "docs/b.md", b"b").await;

    // Newest-first.
    let page = h
        .files
        .list(entity.id, &FileFilter::default(), &PageRequest::default())
        .await
        .unwrap();
    let paths: Vec<&str> = page.items.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(paths, vec!["docs/b.md", "img/logo.png", "docs/a.md"]);

    // Prefix filter.
    let docs = h
        .files
        .list(
            entity.id,
            &FileFilter {
                prefix: Some("docs/".to_string()),
                ..Default::default()
            },
            &PageRequest::default(),
        )
        .await
        .unwrap();
    assert_eq!(docs.total_items, 2);

    // Kind filter.
    let images = h
        .files
        .list(
            entity.id,
            &FileFilter {
                kind: Some(FileKind::Image),
                ..Default::default()
            },
            &PageRequest::default(),
        )
        .await
        .unwrap();
    assert_eq!(images.total_items, 1);
    assert_eq!(images.items[0].path, "img/logo.png");

    // Pagination.
    let first = h
        .files
        .list(entity.id, &FileFilter::default(), &PageRequest::new(1, 2))
        .await
        .unwrap();
    assert_eq!(first.items.len(), 2);
    assert!(first.has_next);
}

#[tokio::test]
async fn test_upload_rejects_bad_paths() {
    let h = harness().await;
    let entity = create_entity(&h, "acme", 100 * MB).await;

    for path in ["/abs.txt", "../up.txt", "a//b.txt", "dir/../c.txt", ""] {
        let err = h
            .files
            .upload(entity.id, upload_params(path, b"x"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation, "accepted {path:?}");
    }

    let err = h
        .files
        .upload(uuid::Uuid::new_v4(), upload_params("ok.txt", b"x"))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
}
