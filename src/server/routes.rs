//! Routes and request admission

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Extension, Json, Router};
use futures::StreamExt;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::publish::FrameFeed;
use crate::server::config::ServerConfig;
use crate::server::{mjpeg, page};
use crate::shutdown::ShutdownSignal;
use crate::state::DetectionState;
use crate::stats::Stats;

/// Route of the single-frame endpoint
pub const SNAPSHOT_PATH: &str = "/snapshot.jpg";

/// Route of the statistics endpoint
pub const STATS_PATH: &str = "/stats";

/// Everything a handler needs, shared by all requests of a server
#[derive(Debug)]
pub(crate) struct ServerContext {
    pub config: ServerConfig,
    pub feed: FrameFeed,
    pub state: Arc<DetectionState>,
    pub stats: Arc<Stats>,
    pub shutdown: ShutdownSignal,
    pub limiter: Option<Arc<Semaphore>>,
}

/// Slot held by an admitted request; a stream keeps it until its body ends
#[derive(Debug, Clone)]
struct Admission {
    _permit: Arc<OwnedSemaphorePermit>,
}

pub(crate) fn router(ctx: Arc<ServerContext>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/index.html", get(index))
        .route(SNAPSHOT_PATH, get(snapshot))
        .route(STATS_PATH, get(stats))
        .route(&ctx.config.stream_path, get(stream))
        .fallback(fallback)
        .layer(middleware::from_fn_with_state(Arc::clone(&ctx), admit))
        .with_state(ctx)
}

/// Count the request and enforce the connection limit
async fn admit(
    State(ctx): State<Arc<ServerContext>>,
    mut request: Request,
    next: Next,
) -> Response {
    let _active = ctx.stats.server.request_started();

    if let Some(limiter) = &ctx.limiter {
        match Arc::clone(limiter).try_acquire_owned() {
            Ok(permit) => {
                request
                    .extensions_mut()
                    .insert(Admission {
                        _permit: Arc::new(permit),
                    });
            }
            Err(_) => {
                ctx.stats.server.record_rejected();
                tracing::warn!(path = %request.uri().path(), "Request rejected: limit reached");
                return (StatusCode::SERVICE_UNAVAILABLE, "connection limit reached\n")
                    .into_response();
            }
        }
    }

    tracing::debug!(
        method = %request.method(),
        path = %request.uri().path(),
        "Request"
    );

    next.run(request).await
}

async fn index(State(ctx): State<Arc<ServerContext>>) -> Html<String> {
    Html(page::index_html(&ctx.config.stream_path))
}

async fn snapshot(State(ctx): State<Arc<ServerContext>>) -> Response {
    match ctx.feed.latest() {
        Some(frame) => (
            [
                (header::CONTENT_TYPE, "image/jpeg"),
                (header::CACHE_CONTROL, "no-cache, private"),
            ],
            frame.jpeg,
        )
            .into_response(),
        None if ctx.feed.is_closed() => StatusCode::SERVICE_UNAVAILABLE.into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

async fn stats(State(ctx): State<Arc<ServerContext>>) -> Response {
    Json(ctx.stats.snapshot(ctx.state.peek())).into_response()
}

async fn stream(
    State(ctx): State<Arc<ServerContext>>,
    admission: Option<Extension<Admission>>,
) -> Response {
    if ctx.feed.is_closed() {
        tracing::debug!("Stream requested after pipeline stopped");
        return (StatusCode::SERVICE_UNAVAILABLE, "stream has ended\n").into_response();
    }

    tracing::info!(stream = %ctx.config.stream_path, "Stream client connected");

    let parts = mjpeg::frame_parts(
        ctx.feed.subscribe(),
        ctx.shutdown.clone(),
        Arc::clone(&ctx.stats),
    )
    .map(move |part| {
        let _held = &admission;
        part
    });

    let mut response = Body::from_stream(parts).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(mjpeg::CONTENT_TYPE));
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache, private"),
    );
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    response
}

async fn fallback(method: Method) -> Response {
    if method == Method::GET || method == Method::HEAD {
        (StatusCode::NOT_FOUND, "not found\n").into_response()
    } else {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            [(header::ALLOW, "GET")],
            "method not allowed\n",
        )
            .into_response()
    }
}
