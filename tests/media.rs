use std::io::Cursor;
use std::sync::Arc;

use asfalto::config::MediaConfig;
use asfalto::imaging::MediaError;
use asfalto::models::{MediaAsset, MediaUpload};
use asfalto::repo::{local::LocalRepo, MediaRepo};
use asfalto::storage::{MemoryStore, StorageKeys, StorageManager};
use base64::{engine::general_purpose::STANDARD, Engine as _};

fn repo_with(cfg: MediaConfig) -> (LocalRepo, StorageManager) {
    let storage = StorageManager::new(Arc::new(MemoryStore::new()));
    (LocalRepo::new(storage.clone(), cfg), storage)
}

fn png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba([180, 20, 20, 255]));
    let mut out = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut out, image::ImageOutputFormat::Png)
        .unwrap();
    out.into_inner()
}

/// Decodes a stored data URI back into its pixel dimensions.
fn data_uri_dimensions(uri: &str) -> (u32, u32) {
    let payload = uri.strip_prefix("data:image/jpeg;base64,").expect("jpeg data uri");
    let bytes = STANDARD.decode(payload).unwrap();
    let img = image::load_from_memory(&bytes).unwrap();
    (img.width(), img.height())
}

fn upload(name: &str, mime: &str, bytes: Vec<u8>) -> MediaUpload {
    MediaUpload { name: name.into(), mime: mime.into(), bytes }
}

#[tokio::test]
async fn wide_image_is_scaled_to_max_width() {
    let (r, storage) = repo_with(MediaConfig::default());
    let bytes = png(1600, 1000);
    let original_size = bytes.len() as u64;

    let asset = r.add_media(upload("moto.png", "image/png", bytes)).await.unwrap();
    assert_eq!(data_uri_dimensions(&asset.data), (800, 500));
    assert_eq!(asset.name, "moto.png");
    assert_eq!(asset.mime, "image/png");
    assert_eq!(asset.size, original_size, "size is the pre-resize upload size");

    let stored: Vec<MediaAsset> = storage.load(StorageKeys::MEDIA).unwrap();
    assert_eq!(stored, vec![asset]);
}

#[tokio::test]
async fn tall_image_is_scaled_to_max_height() {
    let (r, _) = repo_with(MediaConfig::default());
    let asset = r.add_media(upload("tall.png", "image/png", png(300, 1200))).await.unwrap();
    assert_eq!(data_uri_dimensions(&asset.data), (150, 600));
}

#[tokio::test]
async fn small_image_keeps_its_size() {
    let (r, _) = repo_with(MediaConfig::default());
    let asset = r.add_media(upload("icon.png", "image/png", png(64, 48))).await.unwrap();
    assert_eq!(data_uri_dimensions(&asset.data), (64, 48));
}

#[tokio::test]
async fn newest_upload_comes_first() {
    let (r, _) = repo_with(MediaConfig::default());
    let a = r.add_media(upload("a.png", "image/png", png(10, 10))).await.unwrap();
    let b = r.add_media(upload("b.png", "image/png", png(10, 10))).await.unwrap();
    let ids: Vec<_> = r.list_media().await.into_iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![b.id, a.id]);
}

#[tokio::test]
async fn unsupported_type_fails_before_any_work() {
    let (r, storage) = repo_with(MediaConfig::default());
    let err = r.add_media(upload("doc.pdf", "application/pdf", b"%PDF-1.4".to_vec())).await.unwrap_err();
    assert_eq!(err, MediaError::UnsupportedFormat("application/pdf".into()));
    assert!(err.to_string().contains("JPG, PNG, GIF or WebP"));
    assert!(r.list_media().await.is_empty());
    assert!(storage.load::<Vec<MediaAsset>>(StorageKeys::MEDIA).is_none());
}

#[tokio::test]
async fn oversize_fails_before_decoding() {
    let cfg = MediaConfig { max_bytes: 1024, ..MediaConfig::default() };
    let (r, _) = repo_with(cfg);
    // not a real image: a decode attempt would surface as Decode instead
    let err = r.add_media(upload("huge.jpg", "image/jpeg", vec![0u8; 2048])).await.unwrap_err();
    assert_eq!(err, MediaError::TooLarge { size: 2048, max: 1024 });
    assert!(r.list_media().await.is_empty());
}

#[tokio::test]
async fn undecodable_bytes_are_reported() {
    let (r, _) = repo_with(MediaConfig::default());
    let err = r.add_media(upload("fake.png", "image/png", b"definitely not a png".to_vec())).await.unwrap_err();
    assert!(matches!(err, MediaError::Decode(_)));
    assert!(r.list_media().await.is_empty());
}
