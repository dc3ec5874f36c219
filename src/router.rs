//! Edge request router.
//!
//! The stateless dispatch layer in front of the site: programmatic pages
//! are served straight from object storage, everything else passes through
//! to the origin application server untouched.
//!
//! | Path | Destination |
//! |------|-------------|
//! | `/glossary/<slug>` | storage object `glossary/<slug>/index.html` |
//! | `/compare/<slug>` | storage object `compare/<slug>/index.html` |
//! | `/sitemap-pseo*` | storage object of the same name |
//! | `/debug` | binding diagnostics |
//! | anything else | origin, relayed verbatim |
//!
//! An empty slug (`/glossary`, `/compare/`) is origin traffic — those are
//! the hub pages the application renders itself.
//!
//! Storage hits answer with a one-day cache directive and an `X-R2-Key`
//! header naming the object served. Misses are plain-text 404s that name
//! the attempted key; a storage failure is a plain-text 500 — never an
//! opaque blank page. Origin traffic is proxied transparently: same
//! method, headers, and body out; status, headers, and body relayed back
//! with only hop-by-hop headers dropped. No state is retained between
//! requests.

use axum::Router;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{HeaderName, Response, StatusCode, header};
use axum::response::IntoResponse;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::{ConfigError, SiteConfig};
use crate::storage::{ObjectStore, StorageError};

/// Largest request body the proxy will buffer.
const MAX_PROXY_BODY: usize = 32 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum RouterError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Where one request goes. Pure function of the path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    /// Serve this object from the bucket.
    Storage {
        key: String,
        content_type: &'static str,
    },
    /// Forward to the origin server unmodified.
    Origin,
}

/// Decide the destination for a request path.
pub fn route(path: &str) -> RouteDecision {
    if let Some(slug) = pseo_slug(path, "/glossary/") {
        return RouteDecision::Storage {
            key: format!("glossary/{slug}/index.html"),
            content_type: "text/html",
        };
    }
    if let Some(slug) = pseo_slug(path, "/compare/") {
        return RouteDecision::Storage {
            key: format!("compare/{slug}/index.html"),
            content_type: "text/html",
        };
    }
    if path.starts_with("/sitemap-pseo") {
        return RouteDecision::Storage {
            key: path[1..].to_string(),
            content_type: "application/xml",
        };
    }
    RouteDecision::Origin
}

/// Extract a non-empty slug after `prefix`, tolerating a trailing slash.
/// `/glossary`, `/glossary/`, and `/compare/` all yield `None` — the hub
/// pages belong to the origin.
fn pseo_slug<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    let slug = path.strip_prefix(prefix)?.trim_end_matches('/');
    if slug.is_empty() { None } else { Some(slug) }
}

// ============================================================================
// Response builders (pure, so routing behavior is testable without a bucket)
// ============================================================================

pub fn storage_hit_response(
    key: &str,
    content_type: &'static str,
    max_age_secs: u64,
    body: Vec<u8>,
) -> Response<Body> {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(
            header::CACHE_CONTROL,
            format!("public, max-age={max_age_secs}"),
        )
        .header("X-R2-Key", key)
        .body(Body::from(body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

pub fn storage_miss_response(key: &str) -> Response<Body> {
    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from(format!("Page not found: {key}")))
        .unwrap_or_else(|_| StatusCode::NOT_FOUND.into_response())
}

pub fn storage_error_response(message: &str) -> Response<Body> {
    Response::builder()
        .status(StatusCode::INTERNAL_SERVER_ERROR)
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from(format!("Storage error: {message}")))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

// ============================================================================
// Service
// ============================================================================

#[derive(Clone)]
struct AppState {
    store: Arc<ObjectStore>,
    origin_url: String,
    client: reqwest::Client,
    cache_max_age: u64,
}

/// Run the edge router until the process is terminated.
pub async fn serve(config: &SiteConfig) -> Result<(), RouterError> {
    if config.router.origin_url.is_empty() {
        return Err(ConfigError::Validation(
            "router.origin_url is not set — add it to config.toml".to_string(),
        )
        .into());
    }

    let store = ObjectStore::from_env(&config.storage.bucket)?;
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(15))
        .build()
        .map_err(|e| StorageError::Request {
            key: String::new(),
            message: e.to_string(),
        })?;

    let state = AppState {
        store: Arc::new(store),
        origin_url: config.router.origin_url.trim_end_matches('/').to_string(),
        client,
        cache_max_age: config.router.cache_max_age_secs,
    };

    let app = Router::new().fallback(handle).with_state(state);

    println!(
        "Edge router listening on http://{} (origin: {})",
        config.router.bind, config.router.origin_url
    );
    let listener = tokio::net::TcpListener::bind(&config.router.bind).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn handle(State(state): State<AppState>, request: Request) -> Response<Body> {
    let path = request.uri().path().to_string();

    if path == "/debug" {
        let info = serde_json::json!({
            "bucket": state.store.bucket(),
            "origin": state.origin_url,
            "path": path,
        });
        return Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(info.to_string()))
            .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response());
    }

    match route(&path) {
        RouteDecision::Storage { key, content_type } => {
            match state.store.get(&key).await {
                Ok(Some(body)) => {
                    storage_hit_response(&key, content_type, state.cache_max_age, body)
                }
                Ok(None) => storage_miss_response(&key),
                Err(e) => storage_error_response(&e.to_string()),
            }
        }
        RouteDecision::Origin => match proxy_to_origin(&state, request).await {
            Ok(response) => response,
            Err(message) => Response::builder()
                .status(StatusCode::BAD_GATEWAY)
                .header(header::CONTENT_TYPE, "text/plain")
                .body(Body::from(format!("Origin unreachable: {message}")))
                .unwrap_or_else(|_| StatusCode::BAD_GATEWAY.into_response()),
        },
    }
}

/// Forward the request to the origin and relay the response verbatim.
async fn proxy_to_origin(state: &AppState, request: Request) -> Result<Response<Body>, String> {
    let (parts, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, MAX_PROXY_BODY)
        .await
        .map_err(|e| e.to_string())?;

    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let url = format!("{}{}", state.origin_url, path_and_query);

    let mut upstream = state.client.request(parts.method, &url);
    for (name, value) in &parts.headers {
        if name == header::HOST {
            continue;
        }
        upstream = upstream.header(name, value);
    }

    let response = upstream.body(bytes).send().await.map_err(|e| e.to_string())?;

    let status = response.status();
    let headers = response.headers().clone();
    let body_bytes = response.bytes().await.map_err(|e| e.to_string())?;

    let mut relayed = Response::builder().status(status);
    for (name, value) in &headers {
        if is_hop_by_hop(name) {
            continue;
        }
        relayed = relayed.header(name, value);
    }
    relayed.body(Body::from(body_bytes)).map_err(|e| e.to_string())
}

/// Headers that describe the connection, not the payload; never relayed.
fn is_hop_by_hop(name: &HeaderName) -> bool {
    matches!(
        name.as_str(),
        "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "te"
            | "trailer"
            | "transfer-encoding"
            | "upgrade"
    )
}
