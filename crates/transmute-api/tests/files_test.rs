//! File API tests: upload, listing, download round-trips, deletion
//! idempotence, batch archive, and the TTL sweep.

mod helpers;

use chrono::{Duration, Utc};
use helpers::{fixtures, setup_test_app, upload};
use serde_json::Value;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use transmute_core::models::{FileKind, FileRecord};
use transmute_storage::Storage;

#[tokio::test]
async fn upload_returns_metadata_with_compatible_formats() {
    let app = setup_test_app().await;
    let png = fixtures::png_fixture(8, 8);

    let metadata = upload(&app, "forest.png", "image/png", png.clone()).await;

    assert_eq!(metadata["original_filename"], "forest.png");
    assert_eq!(metadata["media_type"], "png");
    assert_eq!(metadata["extension"], ".png");
    assert_eq!(metadata["size_bytes"], png.len() as i64);
    assert_eq!(
        metadata["checksum"],
        hex::encode(Sha256::digest(&png))
    );

    let compatible: Vec<String> = metadata["compatible_formats"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect();
    assert!(compatible.contains(&"jpeg".to_string()));
    assert!(compatible.contains(&"webp".to_string()));
    assert!(!compatible.contains(&"png".to_string()));
}

#[tokio::test]
async fn media_type_is_detected_from_bytes_not_extension() {
    let app = setup_test_app().await;
    // PNG bytes uploaded under a lying .jpg name
    let png = fixtures::png_fixture(4, 4);
    let metadata = upload(&app, "liar.jpg", "image/jpeg", png).await;
    assert_eq!(metadata["media_type"], "png");
}

#[tokio::test]
async fn upload_download_roundtrip_is_byte_identical() {
    let app = setup_test_app().await;
    let csv = fixtures::csv_fixture();

    let metadata = upload(&app, "forests.csv", "text/csv", csv.clone()).await;
    let id = metadata["id"].as_str().unwrap();

    let response = app.server.get(&format!("/files/{}", id)).await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(response.as_bytes().to_vec(), csv);
    assert_eq!(
        metadata["checksum"],
        hex::encode(Sha256::digest(&csv))
    );
}

#[tokio::test]
async fn list_files_shows_uploads() {
    let app = setup_test_app().await;
    upload(&app, "a.csv", "text/csv", fixtures::csv_fixture()).await;
    upload(&app, "b.png", "image/png", fixtures::png_fixture(4, 4)).await;

    let response = app.server.get("/files").await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["files"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn download_missing_file_is_404() {
    let app = setup_test_app().await;
    let response = app.server.get(&format!("/files/{}", Uuid::new_v4())).await;
    assert_eq!(response.status_code(), 404);
    let body: Value = response.json();
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn delete_twice_is_idempotent_404_not_inconsistency() {
    let app = setup_test_app().await;
    let metadata = upload(&app, "gone.csv", "text/csv", fixtures::csv_fixture()).await;
    let id = metadata["id"].as_str().unwrap().to_string();

    let first = app.server.delete(&format!("/files/{}", id)).await;
    assert_eq!(first.status_code(), 200);

    let second = app.server.delete(&format!("/files/{}", id)).await;
    assert_eq!(second.status_code(), 404);

    // Storage stayed consistent: listing works and is empty
    let listing = app.server.get("/files").await;
    assert_eq!(listing.status_code(), 200);
    assert!(listing.json::<Value>()["files"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn delete_all_reports_per_item_outcomes() {
    let app = setup_test_app().await;
    upload(&app, "a.csv", "text/csv", fixtures::csv_fixture()).await;
    upload(&app, "b.csv", "text/csv", fixtures::csv_fixture()).await;

    let response = app.server.delete("/files/all").await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["deleted"], 2);
    assert!(body["failed"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn batch_download_returns_archive_and_reports_missing() {
    let app = setup_test_app().await;
    let a = upload(&app, "a.csv", "text/csv", fixtures::csv_fixture()).await;
    let b = upload(&app, "b.png", "image/png", fixtures::png_fixture(4, 4)).await;
    let missing = Uuid::new_v4();

    let response = app
        .server
        .post("/files/batch")
        .json(&serde_json::json!({
            "file_ids": [a["id"], b["id"], missing.to_string()]
        }))
        .await;

    assert_eq!(response.status_code(), 200);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "application/zip"
    );
    assert_eq!(
        response.headers().get("x-missing-files").unwrap(),
        &missing.to_string()
    );

    let bytes = response.as_bytes().to_vec();
    let archive = zip_file_names(&bytes);
    assert_eq!(archive.len(), 2);
    assert!(archive.contains(&"a.csv".to_string()));
    assert!(archive.contains(&"b.png".to_string()));
}

fn zip_file_names(data: &[u8]) -> Vec<String> {
    // Parse zip central directory names out of the archive by re-reading it
    // with the same crate the service uses.
    let reader = std::io::Cursor::new(data.to_vec());
    let archive = zip::ZipArchive::new(reader).unwrap();
    archive.file_names().map(|n| n.to_string()).collect()
}

#[tokio::test]
async fn batch_download_all_missing_is_404() {
    let app = setup_test_app().await;
    let response = app
        .server
        .post("/files/batch")
        .json(&serde_json::json!({ "file_ids": [Uuid::new_v4().to_string()] }))
        .await;
    assert_eq!(response.status_code(), 404);
}

#[tokio::test]
async fn ttl_sweep_removes_old_records_and_payloads() {
    let app = setup_test_app().await;

    // A fresh upload through the API, plus one record backdated past the
    // 60-minute default TTL.
    let fresh = upload(&app, "fresh.csv", "text/csv", fixtures::csv_fixture()).await;

    let old_id = Uuid::new_v4();
    let old_key = format!("uploads/{}.csv", old_id);
    app.state
        .storage
        .put(&old_key, fixtures::csv_fixture())
        .await
        .unwrap();
    app.state
        .files
        .create(&FileRecord {
            id: old_id,
            kind: FileKind::Upload,
            storage_key: old_key.clone(),
            original_filename: "ancient.csv".to_string(),
            media_type: "csv".to_string(),
            extension: ".csv".to_string(),
            size_bytes: fixtures::csv_fixture().len() as i64,
            checksum: "old".to_string(),
            created_at: Utc::now() - Duration::minutes(61),
        })
        .await
        .unwrap();

    let outcome = app.cleanup.run_sweep_once().await.unwrap();
    assert_eq!(outcome.files_deleted, 1);

    // Old record absent from listings, payload reclaimed
    let listing = app.server.get("/files").await.json::<Value>();
    let names: Vec<&str> = listing["files"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["original_filename"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["fresh.csv"]);
    assert!(!app.state.storage.exists(&old_key).await.unwrap());

    // Fresh upload untouched
    let response = app
        .server
        .get(&format!("/files/{}", fresh["id"].as_str().unwrap()))
        .await;
    assert_eq!(response.status_code(), 200);
}
