//! Common test utilities and helpers for integration tests

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, header};
use bytes::Bytes;
use chrono::{Duration, Utc};

use gallery_server::routes::{self, HttpOptions};
use gallery_server::services::object_store::{
    Asset, ObjectStore, ObjectStoreError, StoredObject, UPLOAD_MARKER,
};
use gallery_server::{AppState, ClaimSet, GalleryService, TokenVerifier, db};

pub const TEST_SECRET: &str = "integration-test-secret";
pub const BOUNDARY: &str = "gallery-test-boundary";

/// In-memory object store with failure injection.
///
/// Uploads whose client file name is listed in `fail_uploads_named` fail;
/// all deletes fail while `fail_deletes` is set.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<String, Bytes>>,
    fail_uploads_named: Mutex<HashSet<String>>,
    fail_deletes: AtomicBool,
    delete_calls: Mutex<Vec<String>>,
    counter: Mutex<u64>,
}

impl MemoryObjectStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_uploads_named(&self, file_name: &str) {
        self.fail_uploads_named
            .lock()
            .unwrap()
            .insert(file_name.to_string());
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn contains(&self, public_id: &str) -> bool {
        self.objects.lock().unwrap().contains_key(public_id)
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn delete_calls(&self) -> Vec<String> {
        self.delete_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn upload(
        &self,
        namespace: &str,
        asset: Asset,
    ) -> Result<StoredObject, ObjectStoreError> {
        if let Some(name) = &asset.file_name {
            if self.fail_uploads_named.lock().unwrap().contains(name) {
                return Err(ObjectStoreError::Unavailable(format!(
                    "injected failure for {}",
                    name
                )));
            }
        }

        let seq = {
            let mut counter = self.counter.lock().unwrap();
            *counter += 1;
            *counter
        };
        let public_id = format!("{}/obj{}", namespace, seq);
        let reference = format!(
            "https://assets.test{}v1700000000/{}.{}",
            UPLOAD_MARKER,
            public_id,
            asset.extension()
        );
        self.objects
            .lock()
            .unwrap()
            .insert(public_id.clone(), asset.bytes);

        Ok(StoredObject {
            reference,
            public_id,
        })
    }

    async fn delete(&self, public_id: &str) -> Result<(), ObjectStoreError> {
        self.delete_calls
            .lock()
            .unwrap()
            .push(public_id.to_string());

        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(ObjectStoreError::Unavailable("injected delete failure".into()));
        }
        match self.objects.lock().unwrap().remove(public_id) {
            Some(_) => Ok(()),
            None => Err(ObjectStoreError::NotFound(public_id.to_string())),
        }
    }
}

/// Gallery service over a fresh in-memory database.
pub async fn create_test_service(store: Arc<MemoryObjectStore>) -> GalleryService {
    let pool = db::connect("sqlite::memory:")
        .await
        .expect("Failed to create test database");
    db::run_migrations(&pool)
        .await
        .expect("Failed to migrate test database");
    GalleryService::new(Arc::new(pool), store)
}

/// Router with the bearer gate keyed on [`TEST_SECRET`].
pub async fn create_test_router(store: Arc<MemoryObjectStore>) -> (Router, GalleryService) {
    let service = create_test_service(store).await;
    let state = AppState::new(service.clone(), Arc::new(TokenVerifier::new(TEST_SECRET)));
    (routes::routes(state, &HttpOptions::default()), service)
}

/// Make every INSERT into `gallery_items` fail from now on.
pub async fn reject_inserts(service: &GalleryService) {
    sqlx::query(
        "CREATE TRIGGER reject_gallery_inserts BEFORE INSERT ON gallery_items
         BEGIN SELECT RAISE(ABORT, 'inserts disabled'); END",
    )
    .execute(&*service.db)
    .await
    .unwrap();
}

/// Make any UPDATE that touches row `item_id` fail from now on.
pub async fn reject_updates_of(service: &GalleryService, item_id: i64) {
    sqlx::query(&format!(
        "CREATE TRIGGER reject_gallery_update_{id} BEFORE UPDATE ON gallery_items
         WHEN OLD.id = {id}
         BEGIN SELECT RAISE(ABORT, 'updates disabled'); END",
        id = item_id
    ))
    .execute(&*service.db)
    .await
    .unwrap();
}

/// A token for `subject_id` valid for an hour.
pub fn token_for(subject_id: i64) -> String {
    TokenVerifier::new(TEST_SECRET)
        .issue_for(subject_id, &format!("user{}@example.com", subject_id), Duration::hours(1))
        .unwrap()
}

/// A token with arbitrary claims, signed with [`TEST_SECRET`].
pub fn token_with(claims: ClaimSet) -> String {
    TokenVerifier::new(TEST_SECRET).issue(&claims).unwrap()
}

pub fn expired_token_for(subject_id: i64) -> String {
    token_with(ClaimSet::new(
        Some(subject_id),
        "late@example.com",
        Utc::now().timestamp() - 1,
    ))
}

pub fn png(name: &str) -> Asset {
    Asset::new(format!("fake png payload for {}", name).into_bytes())
        .with_content_type("image/png")
        .with_file_name(name)
}

/// One multipart part: (field name, optional file name, payload).
pub type Part<'a> = (&'a str, Option<&'a str>, &'a [u8]);

pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for (field, file_name, data) in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match file_name {
            Some(file_name) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                        field, file_name
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(b"Content-Type: image/png\r\n\r\n");
            }
            None => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", field)
                        .as_bytes(),
                );
            }
        }
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn upload_request(token: &str, parts: &[Part<'_>]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/gallery/upload")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

pub fn authed(
    method: &str,
    uri: &str,
    token: &str,
    json: Option<serde_json::Value>,
) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token));

    match json {
        Some(value) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(value.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}
