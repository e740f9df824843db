//! Shared helpers for the router-level tests.

#![allow(dead_code)]

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

use itemboard_api::{ApiConfig, AppState, AppStateInner, auth, router};
use itemboard_db::{Database, NewUser};
use itemboard_gateway::Dispatcher;
use itemboard_types::models::Role;

pub const PASSWORD: &str = "Password123!";

/// A full application on a private in-memory database.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    /// Holds the upload directory for the lifetime of the test.
    pub upload_dir: TempDir,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    pub fn with_config(adjust: impl FnOnce(&mut ApiConfig)) -> Self {
        let upload_dir = tempfile::tempdir().expect("Failed to create upload dir");
        let mut config = ApiConfig {
            jwt_secret: "test-access-secret".into(),
            refresh_secret: "test-refresh-secret".into(),
            upload_dir: upload_dir.path().to_path_buf(),
            simulate_latency: false,
            ..ApiConfig::default()
        };
        adjust(&mut config);

        let db = Database::open_in_memory().expect("Failed to open database");
        let state = AppStateInner::new(db, config, Dispatcher::new());

        Self {
            router: router(state.clone()),
            state,
            upload_dir,
        }
    }

    /// Insert an account directly, bypassing signup (which only makes users).
    pub fn create_user(&self, email: &str, role: Role) -> Uuid {
        let id = Uuid::new_v4();
        let created = self
            .state
            .db
            .create_user(&NewUser {
                id: id.to_string(),
                email: email.to_string(),
                password_hash: auth::hash_password(PASSWORD).expect("Failed to hash password"),
                name: format!("{} account", role),
                role,
            })
            .expect("Failed to create user");
        assert!(created, "{} already exists", email);
        id
    }

    /// Log in and return (access token, refresh token).
    pub async fn login(&self, email: &str) -> (String, String) {
        let response = self
            .request(
                "POST",
                "/api/auth/login",
                Some(serde_json::json!({ "email": email, "password": PASSWORD })),
                None,
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "Login failed: {:?}", response.body);

        let access = response.body["accessToken"].as_str().expect("No accessToken").to_string();
        let refresh = response.body["refreshToken"].as_str().expect("No refreshToken").to_string();
        (access, refresh)
    }

    /// Create an account with `role` and return its access token.
    pub async fn token_for(&self, email: &str, role: Role) -> String {
        self.create_user(email, role);
        self.login(email).await.0
    }

    pub async fn request(
        &self,
        method: &str,
        path: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> TestResponse {
        let body = body
            .map(|b| serde_json::to_vec(&b).expect("Failed to serialize body"))
            .unwrap_or_default();

        let mut req = Request::builder()
            .method(method)
            .uri(path)
            .header("Content-Type", "application/json");
        if let Some(token) = token {
            req = req.header("Authorization", format!("Bearer {}", token));
        }

        self.send(req.body(Body::from(body)).expect("Failed to build request")).await
    }

    /// Multipart upload of a single `file` field.
    pub async fn upload(&self, path: &str, file_name: &str, data: &[u8], token: &str) -> TestResponse {
        let boundary = "itemboard-test-boundary";
        let mut body = Vec::new();
        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
                file_name
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

        let req = Request::builder()
            .method("POST")
            .uri(path)
            .header(
                "Content-Type",
                format!("multipart/form-data; boundary={}", boundary),
            )
            .header("Authorization", format!("Bearer {}", token))
            .body(Body::from(body))
            .expect("Failed to build request");

        self.send(req).await
    }

    pub async fn send(&self, req: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(req)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read body")
            .to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        TestResponse { status, body }
    }

    /// Create an item through the API and return its id.
    pub async fn create_item(&self, token: &str, title: &str, description: &str) -> String {
        let response = self
            .request(
                "POST",
                "/api/items",
                Some(serde_json::json!({ "title": title, "description": description })),
                Some(token),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "Create failed: {:?}", response.body);
        response.body["data"]["id"].as_str().expect("No item id").to_string()
    }
}
