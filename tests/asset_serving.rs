//! Serving of local object store payloads over `/upload/{*path}`.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use tower::ServiceExt;

use gallery_server::routes;
use gallery_server::services::local_store::LocalObjectStore;
use gallery_server::services::object_store::{Asset, ObjectStore};

const BASE_URL: &str = "http://localhost:3000";

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn stored_path(store: &LocalObjectStore, asset: Asset) -> String {
    let stored = store.upload("gallery/user_1", asset).await.unwrap();
    stored
        .reference
        .strip_prefix(BASE_URL)
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn test_serves_stored_image_with_hardening_headers() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(LocalObjectStore::new(dir.path(), BASE_URL));
    let path = stored_path(
        &store,
        Asset::new(b"png bytes".to_vec()).with_content_type("image/png"),
    )
    .await;
    assert!(path.ends_with(".png"));

    let app = routes::asset_routes(store);
    let response = app.oneshot(get(&path)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers[header::CONTENT_TYPE], "image/png");
    assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
    assert!(
        headers[header::CONTENT_SECURITY_POLICY]
            .to_str()
            .unwrap()
            .starts_with("sandbox")
    );
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"png bytes");
}

#[tokio::test]
async fn test_markup_payload_is_never_served_as_svg() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(LocalObjectStore::new(dir.path(), BASE_URL));
    let markup = br#"<svg xmlns="http://www.w3.org/2000/svg"><script>alert(1)</script></svg>"#;
    let path = stored_path(
        &store,
        Asset::new(markup.to_vec())
            .with_content_type("image/svg+xml")
            .with_file_name("drawing.svg"),
    )
    .await;
    assert!(path.ends_with(".png"));

    let (stem, _) = path.rsplit_once('.').unwrap();
    let app = routes::asset_routes(store);

    for ext in ["svg", "html", "xml"] {
        let response = app
            .clone()
            .oneshot(get(&format!("{}.{}", stem, ext)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "extension {}", ext);
    }

    let response = app.oneshot(get(&path)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    assert_eq!(response.headers()[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
}

#[tokio::test]
async fn test_unknown_object_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(LocalObjectStore::new(dir.path(), BASE_URL));
    let app = routes::asset_routes(store);

    let response = app
        .oneshot(get("/upload/v1/gallery/user_1/missing.png"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
