use actix_web::{test, web, App};
use std::io::Cursor;
use std::sync::Arc;

use asfalto::config::{AppConfig, MediaConfig};
use asfalto::storage::MemoryStore;
use asfalto::{build_state_with_store, config, AppState, SecurityHeaders};
use serde_json::{json, Value};

const SECRET: &str = "bodesdoasfalto2025parasempre";

fn app_config() -> AppConfig {
    AppConfig {
        admin_token: SECRET.into(),
        data_dir: std::env::temp_dir(),
        storage_quota: None,
        bind_addr: "127.0.0.1:0".into(),
        frontend_url: "http://localhost:5173".into(),
        enable_hsts: false,
        media: MediaConfig::default(),
    }
}

fn state() -> AppState {
    build_state_with_store(&app_config(), Arc::new(MemoryStore::new()))
}

fn bearer() -> (&'static str, String) {
    ("Authorization", format!("Bearer {SECRET}"))
}

// Helper to build a multipart body with one `file` part per entry
fn build_multipart(files: &[(&str, &str, &[u8])], boundary: &str) -> (String, Vec<u8>) {
    let mut body: Vec<u8> = Vec::new();
    for (file_name, content_type, bytes) in files {
        let disp = format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
        );
        body.extend_from_slice(disp.as_bytes());
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    (format!("multipart/form-data; boundary={boundary}"), body)
}

fn png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([10, 10, 10]));
    let mut out = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut out, image::ImageOutputFormat::Png)
        .unwrap();
    out.into_inner()
}

#[actix_web::test]
async fn admin_routes_require_login() {
    let app = test::init_service(App::new().app_data(web::Data::new(state())).configure(config)).await;

    // no header at all
    let req = test::TestRequest::get().uri("/api/v1/news").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 401);

    // right secret but no session yet
    let req = test::TestRequest::get().uri("/api/v1/news").insert_header(bearer()).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 401);

    // wrong login
    let req = test::TestRequest::post()
        .uri("/api/v1/auth/login")
        .set_json(&json!({"token": "nope"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 401);

    let req = test::TestRequest::post()
        .uri("/api/v1/auth/login")
        .set_json(&json!({"token": SECRET}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let v: Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    assert_eq!(v["authenticated"], true);
    assert!(v.get("token").is_none(), "secret is never echoed back");

    // session alone is not enough without the bearer secret
    let req = test::TestRequest::get()
        .uri("/api/v1/news")
        .insert_header(("Authorization", "Bearer guess"))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 401);

    let req = test::TestRequest::get().uri("/api/v1/news").insert_header(bearer()).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);

    // logout closes the gate again
    let req = test::TestRequest::post().uri("/api/v1/auth/logout").insert_header(bearer()).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 204);
    let req = test::TestRequest::get().uri("/api/v1/auth/status").to_request();
    let v: Value = serde_json::from_slice(&test::read_body(test::call_service(&app, req).await).await).unwrap();
    assert_eq!(v["authenticated"], false);
}

#[actix_web::test]
async fn news_crud_over_http() {
    let st = state();
    st.auth.login(SECRET).unwrap();
    let app = test::init_service(App::new().app_data(web::Data::new(st)).configure(config)).await;

    // missing field -> 400 with message
    let req = test::TestRequest::post()
        .uri("/api/v1/news")
        .insert_header(bearer())
        .set_json(&json!({"title": "X", "excerpt": "", "content": "Z"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let v: Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    assert_eq!(v["error"], "excerpt is required");

    let req = test::TestRequest::post()
        .uri("/api/v1/news")
        .insert_header(bearer())
        .set_json(&json!({"title": "X", "excerpt": "Y", "content": "Z"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let created: Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    assert_eq!(created["status"], "draft");
    let id = created["id"].as_str().unwrap().to_string();

    let req = test::TestRequest::patch()
        .uri(&format!("/api/v1/news/{id}"))
        .insert_header(bearer())
        .set_json(&json!({"status": "published"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let updated: Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    assert_eq!(updated["status"], "published");
    assert!(updated["updatedAt"].as_i64().unwrap() > updated["createdAt"].as_i64().unwrap());

    // filtered listing
    let req = test::TestRequest::get()
        .uri("/api/v1/news?search=x&status=draft")
        .insert_header(bearer())
        .to_request();
    let v: Value = serde_json::from_slice(&test::read_body(test::call_service(&app, req).await).await).unwrap();
    assert_eq!(v.as_array().unwrap().len(), 0);
    let req = test::TestRequest::get()
        .uri("/api/v1/news?status=published")
        .insert_header(bearer())
        .to_request();
    let v: Value = serde_json::from_slice(&test::read_body(test::call_service(&app, req).await).await).unwrap();
    assert_eq!(v.as_array().unwrap().len(), 1);

    let req = test::TestRequest::get()
        .uri("/api/v1/news?status=archived")
        .insert_header(bearer())
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 400);

    let req = test::TestRequest::get().uri("/api/v1/news/stats").insert_header(bearer()).to_request();
    let v: Value = serde_json::from_slice(&test::read_body(test::call_service(&app, req).await).await).unwrap();
    assert_eq!(v, json!({"total": 1, "published": 1, "draft": 0}));

    let req = test::TestRequest::get().uri("/api/v1/news/export").insert_header(bearer()).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let v: Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    assert_eq!(v["news"][0]["id"], id.as_str());
    assert!(v["lastUpdated"].is_string());

    let req = test::TestRequest::delete()
        .uri(&format!("/api/v1/news/{id}"))
        .insert_header(bearer())
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 204);

    for req in [
        test::TestRequest::get().uri(&format!("/api/v1/news/{id}")),
        test::TestRequest::delete().uri(&format!("/api/v1/news/{id}")),
    ] {
        let resp = test::call_service(&app, req.insert_header(bearer()).to_request()).await;
        assert_eq!(resp.status(), 404);
    }

    let req = test::TestRequest::get().uri("/api/v1/news").insert_header(bearer()).to_request();
    let v: Value = serde_json::from_slice(&test::read_body(test::call_service(&app, req).await).await).unwrap();
    assert!(v.as_array().unwrap().is_empty());
}

#[actix_web::test]
async fn export_is_404_before_first_save() {
    let st = state();
    st.auth.login(SECRET).unwrap();
    let app = test::init_service(App::new().app_data(web::Data::new(st)).configure(config)).await;
    let req = test::TestRequest::get().uri("/api/v1/news/export").insert_header(bearer()).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);
}

#[actix_web::test]
async fn media_upload_reports_each_file() {
    let st = state();
    st.auth.login(SECRET).unwrap();
    let app = test::init_service(
        App::new()
            .wrap(SecurityHeaders::default())
            .app_data(web::Data::new(st))
            .configure(config),
    )
    .await;

    let image = png(1200, 400);
    let (ct, body) = build_multipart(
        &[
            ("estrada.png", "image/png", image.as_slice()),
            ("notas.txt", "text/plain", b"hello".as_slice()),
            // generic type: sniffed as png
            ("sem-tipo.png", "application/octet-stream", image.as_slice()),
        ],
        "BOUNDARY123",
    );
    let req = test::TestRequest::post()
        .uri("/api/v1/media")
        .insert_header(bearer())
        .insert_header(("Content-Type", ct))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let v: Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    let uploaded = v["uploaded"].as_array().unwrap();
    assert_eq!(uploaded.len(), 2);
    assert_eq!(uploaded[0]["name"], "estrada.png");
    assert_eq!(uploaded[0]["type"], "image/png");
    assert_eq!(uploaded[0]["size"], image.len() as u64);
    assert!(uploaded[0]["data"].as_str().unwrap().starts_with("data:image/jpeg;base64,"));
    assert_eq!(uploaded[1]["type"], "image/png");
    assert_eq!(v["errors"][0]["name"], "notas.txt");

    let req = test::TestRequest::get().uri("/api/v1/media").insert_header(bearer()).to_request();
    let v: Value = serde_json::from_slice(&test::read_body(test::call_service(&app, req).await).await).unwrap();
    let list = v.as_array().unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0]["name"], "sem-tipo.png", "newest first");
}

fn upload_request(files: &[(&str, &str, &[u8])]) -> test::TestRequest {
    let (ct, body) = build_multipart(files, "B1");
    test::TestRequest::post()
        .uri("/api/v1/media")
        .insert_header(bearer())
        .insert_header(("Content-Type", ct))
        .set_payload(body)
}

#[actix_web::test]
async fn media_upload_all_rejected_or_empty() {
    let st = state();
    st.auth.login(SECRET).unwrap();
    let app = test::init_service(App::new().app_data(web::Data::new(st)).configure(config)).await;

    let req = upload_request(&[("a.bmp", "image/bmp", b"BM....".as_slice()), ("b.txt", "text/plain", b"hi".as_slice())]);
    let resp = test::call_service(&app, req.to_request()).await;
    assert_eq!(resp.status(), 422);
    let v: Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    assert!(v["uploaded"].as_array().unwrap().is_empty());
    assert!(v["errors"][0]["error"].as_str().unwrap().contains("unsupported"));
    assert_eq!(v["errors"][1]["name"], "b.txt");

    let resp = test::call_service(&app, upload_request(&[]).to_request()).await;
    assert_eq!(resp.status(), 400);
}

#[actix_web::test]
async fn lone_rejected_file_maps_to_its_own_status() {
    let mut cfg = app_config();
    cfg.media.max_bytes = 1024;
    let st = build_state_with_store(&cfg, Arc::new(MemoryStore::new()));
    st.auth.login(SECRET).unwrap();
    let app = test::init_service(App::new().app_data(web::Data::new(st)).configure(config)).await;

    let req = upload_request(&[("a.bmp", "image/bmp", b"BM....".as_slice())]);
    let resp = test::call_service(&app, req.to_request()).await;
    assert_eq!(resp.status(), 415);
    let v: Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    assert!(v["error"].as_str().unwrap().contains("unsupported"));

    let big = vec![0u8; 4096];
    let req = upload_request(&[("big.jpg", "image/jpeg", big.as_slice())]);
    let resp = test::call_service(&app, req.to_request()).await;
    assert_eq!(resp.status(), 413);
    let v: Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    assert!(v["error"].as_str().unwrap().contains("too large"));

    let req = upload_request(&[("fake.png", "image/png", b"not a png".as_slice())]);
    let resp = test::call_service(&app, req.to_request()).await;
    assert_eq!(resp.status(), 422);
    let v: Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    assert!(v["error"].as_str().unwrap().starts_with("could not process image"));
}
