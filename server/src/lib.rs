use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse},
    routing::{get, post},
    Json, Router,
};
use docseek_core::{clamp_limit, load_index, FileStore, IndexStats, SearchResult, SharedIndex, SnapshotFormat, SnapshotStore};
use docseek_crawler::{refresh, LockScope};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

const INDEX_HTML: &str = include_str!("../static/index.html");
const INDEX_JS: &str = include_str!("../static/index.js");

/// Everything the server needs to know about where and how to index.
#[derive(Debug, Clone)]
pub struct ServeConfig {
    pub folder: PathBuf,
    pub format: SnapshotFormat,
    pub lock_scope: LockScope,
    /// Re-crawl this often after the first pass; `None` crawls once.
    pub rescan: Option<Duration>,
    /// Comma separated origins from `CORS_ALLOW_ORIGIN`; empty means any.
    pub cors_origins: Option<String>,
}

impl ServeConfig {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
            format: SnapshotFormat::Json,
            lock_scope: LockScope::PerFile,
            rescan: None,
            cors_origins: std::env::var("CORS_ALLOW_ORIGIN").ok(),
        }
    }

    pub fn store(&self) -> FileStore {
        FileStore::in_folder(&self.folder, self.format)
    }
}

#[derive(Clone)]
pub struct AppState {
    pub index: SharedIndex,
}

#[derive(Deserialize)]
pub struct SearchParams {
    pub limit: Option<usize>,
}

/// Restore the folder's snapshot. An unreadable or corrupt snapshot is an
/// error: starting over from an empty index would silently discard it.
pub fn open_index(config: &ServeConfig) -> Result<SharedIndex> {
    let store = config.store();
    let index = load_index(&store).with_context(|| format!("could not load index {}", store.path().display()))?;
    Ok(SharedIndex::new(index))
}

fn cors_layer(origins: Option<&str>) -> CorsLayer {
    let origins: Vec<_> = origins
        .unwrap_or_default()
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();
    if origins.is_empty() {
        CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
    } else {
        CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
    }
}

pub fn build_app(index: SharedIndex, config: &ServeConfig) -> Router {
    Router::new()
        .route("/", get(index_page))
        .route("/index.html", get(index_page))
        .route("/index.js", get(index_script))
        .route("/health", get(|| async { "ok" }))
        .route("/api/search", post(search_handler))
        .route("/api/stats", get(stats_handler))
        .with_state(AppState { index })
        .layer(cors_layer(config.cors_origins.as_deref()))
        .layer(TraceLayer::new_for_http())
}

async fn index_page() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn index_script() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/javascript; charset=utf-8")], INDEX_JS)
}

/// Body is the raw query text; answers with the best `limit` hits (default 20).
pub async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
    query: String,
) -> Result<Json<Vec<SearchResult>>, (StatusCode, String)> {
    let limit = clamp_limit(params.limit);
    tracing::info!(query = %query, limit, "search");
    let index = state.index.clone();
    let results = tokio::task::spawn_blocking(move || index.search(&query, limit))
        .await
        .map_err(internal_error)?;
    Ok(Json(results))
}

pub async fn stats_handler(State(state): State<AppState>) -> Result<Json<IndexStats>, (StatusCode, String)> {
    let index = state.index.clone();
    let stats = tokio::task::spawn_blocking(move || index.stats()).await.map_err(internal_error)?;
    Ok(Json(stats))
}

fn internal_error(e: tokio::task::JoinError) -> (StatusCode, String) {
    tracing::error!(error = %e, "index task failed");
    (StatusCode::INTERNAL_SERVER_ERROR, "index task failed".into())
}

/// Crawl the folder in the background, then again every `rescan` interval.
/// Each pass persists its result once it has finished; a snapshot that could
/// not be written is retried by the next pass.
pub fn spawn_crawler(index: SharedIndex, config: ServeConfig) -> tokio::task::JoinHandle<()> {
    let config = Arc::new(config);
    tokio::spawn(async move {
        let mut unsaved = false;
        loop {
            let pass_index = index.clone();
            let pass_config = config.clone();
            let pass = tokio::task::spawn_blocking(move || {
                let store = pass_config.store();
                let mut pending = unsaved;
                refresh(&pass_config.folder, &pass_index, &store as &dyn SnapshotStore, pass_config.lock_scope, &mut pending);
                pending
            })
            .await;
            match pass {
                Ok(pending) => unsaved = pending,
                Err(e) => tracing::error!(error = %e, "crawl task failed"),
            }
            match config.rescan {
                Some(every) => tokio::time::sleep(every).await,
                None => break,
            }
        }
    })
}
