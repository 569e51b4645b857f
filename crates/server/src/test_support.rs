// Shared fixtures for unit and router tests.

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tower::util::ServiceExt;
use uuid::Uuid;

use crate::{build_router, config::Config, db::Database, AppState};

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

pub struct TestUser {
    pub id: String,
    pub token: String,
}

impl TestApp {
    pub async fn new() -> Self {
        let upload_path = std::env::temp_dir()
            .join(format!("creatorlink-test-{}", Uuid::new_v4()))
            .display()
            .to_string();

        let state = AppState {
            db: Database::in_memory().await,
            config: Config::for_tests(upload_path),
        };

        Self {
            router: build_router(state.clone()),
            state,
        }
    }

    pub async fn signup(&self, name: &str) -> TestUser {
        let (status, body) = send(
            &self.router,
            "POST",
            "/api/auth/signup",
            None,
            Some(json!({
                "username": name,
                "email": format!("{name}@example.com"),
                "password": "password123",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "signup {name}: {body}");

        TestUser {
            id: body["user"]["id"].as_str().unwrap().to_string(),
            token: body["token"].as_str().unwrap().to_string(),
        }
    }

    pub async fn create_project(&self, owner: &TestUser, name: &str) -> String {
        let (status, body) = send(
            &self.router,
            "POST",
            "/api/projects",
            Some(&owner.token),
            Some(json!({
                "name": name,
                "description": format!("{name} description"),
                "project_type": "creative_work",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "create project {name}: {body}");

        body["id"].as_str().unwrap().to_string()
    }

    /// POSTs without a body and expects success.
    pub async fn post(&self, user: &TestUser, uri: &str) -> Value {
        let (status, body) = send(&self.router, "POST", uri, Some(&user.token), None).await;
        assert_eq!(status, StatusCode::OK, "POST {uri}: {body}");
        body
    }
}

async fn read_response(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();

    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };

    (status, body)
}

pub async fn send(
    router: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }

    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    read_response(router, request).await
}

pub async fn send_multipart(
    router: &Router,
    uri: &str,
    token: &str,
    field: &str,
    file_name: &str,
    content_type: &str,
    data: &[u8],
) -> (StatusCode, Value) {
    let boundary = "creatorlink-test-boundary";

    let mut body = Vec::new();
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap();

    read_response(router, request).await
}

/// Inserts a creator directly, bypassing signup. Returns the id.
pub async fn insert_user(pool: &SqlitePool, username: &str) -> String {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO users (id, username, email, password_hash, created_at, updated_at)
         VALUES (?, ?, ?, 'not-a-hash', ?, ?)",
    )
    .bind(&id)
    .bind(username)
    .bind(format!("{username}@example.com"))
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await
    .unwrap();

    id
}

/// Inserts a creative work owned by `owner_id`. Returns the id.
pub async fn insert_project(pool: &SqlitePool, owner_id: &str, name: &str) -> String {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO projects (id, user_id, name, description, project_type, created_at, updated_at)
         VALUES (?, ?, ?, ?, 'creative_work', ?, ?)",
    )
    .bind(&id)
    .bind(owner_id)
    .bind(name)
    .bind(format!("{name} description"))
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await
    .unwrap();

    id
}
