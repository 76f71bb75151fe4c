#![allow(dead_code)]

use std::net::SocketAddr;

use axum::{
    Router,
    body::Body,
    extract::ConnectInfo,
    http::{Request, StatusCode, header},
};
use quillpost::{ServerConfig, create_app, db::ADMIN_ROLE, db::Database, password::PasswordHasher};
use serde_json::{Value, json};
use tower::ServiceExt;

pub const JWT_SECRET: &[u8] = b"test-jwt-secret-that-is-long-enough-0123";

/// Socket address every helper request appears to come from.
pub fn client_addr() -> ConnectInfo<SocketAddr> {
    ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 40000)))
}

/// An app on a fresh in-memory database, without auth rate limiting.
pub struct TestApp {
    pub app: Router,
    pub db: Database,
}

pub async fn test_app() -> TestApp {
    test_app_with(|_| {}).await
}

/// Like [`test_app`] but lets the caller adjust the config first.
pub async fn test_app_with(configure: impl FnOnce(&mut ServerConfig)) -> TestApp {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");
    let mut config = ServerConfig::new(db.clone(), JWT_SECRET.to_vec());
    config.password_hasher = PasswordHasher::new(64, 1, 1).expect("Invalid argon2 params");
    config.auth_rate_limit = None;
    configure(&mut config);
    TestApp {
        app: create_app(&config),
        db,
    }
}

impl TestApp {
    /// Send a request and return the status and the JSON body (`Null` when
    /// the body is empty or not JSON).
    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .extension(client_addr());
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

        self.send(request).await
    }

    /// Send a prepared request and return the status and JSON body.
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.request("GET", uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request("POST", uri, token, Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request("PUT", uri, token, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.request("DELETE", uri, token, None).await
    }

    /// Register a user and return its id.
    pub async fn register(&self, username: &str, email: &str, password: &str) -> i64 {
        let (status, json) = self
            .post(
                "/api/auth/register",
                None,
                json!({"username": username, "email": email, "password": password}),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {json}");
        json["id"].as_i64().unwrap()
    }

    /// Log in and return the full login response.
    pub async fn login(&self, username: &str, password: &str) -> Value {
        let (status, json) = self
            .post(
                "/api/auth/login",
                None,
                json!({"username": username, "password": password}),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {json}");
        json
    }

    /// Register `username` with password "secret1" and return (id, access token).
    pub async fn user(&self, username: &str) -> (i64, String) {
        let id = self
            .register(username, &format!("{username}@example.com"), "secret1")
            .await;
        let login = self.login(username, "secret1").await;
        (id, login["token"].as_str().unwrap().to_string())
    }

    /// Like [`user`](Self::user) but the account also holds ADMIN.
    pub async fn admin(&self, username: &str) -> (i64, String) {
        let (id, token) = self.user(username).await;
        let role = self
            .db
            .roles()
            .find_by_name(ADMIN_ROLE)
            .await
            .unwrap()
            .unwrap();
        self.db.roles().assign(id, role.id).await.unwrap();
        (id, token)
    }

    /// Create an article through the API and return its id.
    pub async fn article(&self, token: &str, title: &str, published: bool) -> i64 {
        let (status, json) = self
            .post(
                "/api/articles",
                Some(token),
                json!({"title": title, "content": "Some content", "published": published}),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create article failed: {json}");
        json["id"].as_i64().unwrap()
    }

    /// Create a comment through the API and return its id.
    pub async fn comment(&self, token: &str, article_id: i64, parent_id: Option<i64>) -> i64 {
        let (status, json) = self
            .post(
                "/api/comments",
                Some(token),
                json!({"content": "Nice post", "article_id": article_id, "parent_id": parent_id}),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create comment failed: {json}");
        json["id"].as_i64().unwrap()
    }
}
