//! HTTP front for the cache gateway.
//!
//! Browsers point at this server instead of the origin. Every `GET` is
//! answered through [`CacheGateway::fetch`], so chunk files and core assets
//! are served from the versioned cache when present and from the origin
//! otherwise.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version and store name) |
//! | `GET`  | any other path | Cache-or-fetch through the gateway |
//!
//! Each gateway response carries an `x-musannaf-source` header with
//! `cache`, `network`, or `fallback`.
//!
//! # Error Contract
//!
//! A static asset that cannot be fetched from the origin and is not cached
//! yields `502`:
//!
//! ```json
//! { "error": { "code": "bad_gateway", "message": "network error fetching /app.js: ..." } }
//! ```

use axum::{
    extract::State,
    http::{header, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::gateway::CacheGateway;

/// Installs core assets, evicts stale stores, and serves until terminated.
///
/// A failed install is logged and serving continues; requests then fall
/// through to the origin as usual.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let gateway = Arc::new(CacheGateway::from_config(config)?);

    match gateway.install().await {
        Ok(n) => println!("Installed {} core assets into {}", n, gateway.store_name()),
        Err(e) => log::warn!("install failed, serving without warm cache: {:#}", e),
    }
    for name in gateway.activate().await? {
        println!("Deleted stale cache store {}", name);
    }

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    println!("Gateway listening on http://{}", config.server.bind);
    serve(listener, gateway).await
}

/// Serves `gateway` on an already bound listener.
pub async fn serve(
    listener: tokio::net::TcpListener,
    gateway: Arc<CacheGateway>,
) -> anyhow::Result<()> {
    axum::serve(listener, router(gateway)).await?;
    Ok(())
}

pub fn router(gateway: Arc<CacheGateway>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .fallback(handle_gateway)
        .layer(cors)
        .with_state(gateway)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_gateway(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_GATEWAY,
        code: "bad_gateway".to_string(),
        message: message.into(),
    }
}

fn method_not_allowed(method: &Method) -> AppError {
    AppError {
        status: StatusCode::METHOD_NOT_ALLOWED,
        code: "method_not_allowed".to_string(),
        message: format!("{} is not supported; only GET and HEAD are", method),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    store: String,
}

async fn handle_health(State(gateway): State<Arc<CacheGateway>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        store: gateway.store_name().to_string(),
    })
}

// ============ GET /* ============

async fn handle_gateway(
    State(gateway): State<Arc<CacheGateway>>,
    method: Method,
    uri: Uri,
) -> Result<Response, AppError> {
    if method != Method::GET && method != Method::HEAD {
        return Err(method_not_allowed(&method));
    }

    let path = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    let fetched = gateway
        .fetch(path)
        .await
        .map_err(|e| bad_gateway(e.to_string()))?;

    let status =
        StatusCode::from_u16(fetched.response.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut response = (status, fetched.response.body).into_response();
    let headers = response.headers_mut();
    if let Some(value) = fetched
        .response
        .content_type
        .as_deref()
        .and_then(|ct| HeaderValue::from_str(ct).ok())
    {
        headers.insert(header::CONTENT_TYPE, value);
    }
    headers.insert(
        "x-musannaf-source",
        HeaderValue::from_static(fetched.source.as_str()),
    );
    Ok(response)
}
