#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

use genstudio_api::config::{
    EngineConfig, LogFormat, ProviderConfig, ProviderKind, ServerConfig, StorageConfig,
};
use genstudio_api::engine::Engine;
use genstudio_api::router::build_app_router;
use genstudio_api::state::AppState;
use genstudio_provider::scripted::ScriptedProvider;
use genstudio_store::HistoryStore;

/// Build a test `ServerConfig` with safe defaults and a scripted provider.
pub fn test_config(history_file: PathBuf) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        log_format: LogFormat::Text,
        engine: EngineConfig {
            watch_interval: Duration::from_millis(20),
            ..EngineConfig::default()
        },
        storage: StorageConfig {
            history_file,
            history_max_items: 100,
        },
        provider: ProviderConfig {
            kind: ProviderKind::Scripted,
            base_url: "http://127.0.0.1:0".to_string(),
            api_key: None,
            poll_interval: Duration::from_millis(10),
            scripted_step: Duration::from_millis(5),
        },
    }
}

/// Everything a test needs to drive and inspect the engine.
pub struct TestEnv {
    pub config: ServerConfig,
    pub engine: Arc<Engine>,
    pub provider: Arc<ScriptedProvider>,
    pub history: Arc<HistoryStore>,
    _dir: TempDir,
}

impl TestEnv {
    /// Build the full application router over this environment.
    ///
    /// Uses the same builder as `main.rs`, so tests exercise the production
    /// middleware stack.
    pub fn app(&self) -> Router {
        let state = AppState {
            config: Arc::new(self.config.clone()),
            engine: Arc::clone(&self.engine),
            history: Arc::clone(&self.history),
        };
        build_app_router(state, &self.config)
    }
}

pub async fn test_env() -> TestEnv {
    test_env_with(|_| {}).await
}

/// Like [`test_env`], letting the caller adjust the engine settings first.
pub async fn test_env_with(adjust: impl FnOnce(&mut EngineConfig)) -> TestEnv {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path().join("history.json"));
    adjust(&mut config.engine);

    let history = Arc::new(
        HistoryStore::open(
            &config.storage.history_file,
            config.storage.history_max_items,
        )
        .await
        .unwrap(),
    );
    let provider = Arc::new(ScriptedProvider::new(config.provider.scripted_step));
    let engine = Arc::new(Engine::new(
        &config.engine,
        provider.clone(),
        Arc::clone(&history),
    ));

    TestEnv {
        config,
        engine,
        provider,
        history,
        _dir: dir,
    }
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, None).await
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    send(app, Method::POST, uri, Some(body)).await
}

pub async fn delete(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::DELETE, uri, None).await
}

async fn send(
    app: Router,
    method: Method,
    uri: &str,
    body: Option<serde_json::Value>,
) -> Response<Body> {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}
