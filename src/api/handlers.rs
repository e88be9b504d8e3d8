use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    routing::{get, post},
};
use std::sync::Arc;

use super::node::DsmNode;
use super::types::{
    CacheResponse, ENDPOINT_CACHE, ENDPOINT_READ, ENDPOINT_STATS, ENDPOINT_WRITE, ReadResponse,
    StatsResponse, WriteRequest, WriteResponse, render_bytes,
};
use crate::error::DsmError;

/// Routes of the debug surface, bound to one node.
pub fn router(node: Arc<DsmNode>) -> Router {
    Router::new()
        .route(ENDPOINT_STATS, get(handle_stats))
        .route(ENDPOINT_CACHE, get(handle_cache))
        .route(ENDPOINT_READ, get(handle_read))
        .route(ENDPOINT_WRITE, post(handle_write))
        .layer(Extension(node))
}

pub fn status_for(error: &DsmError) -> StatusCode {
    match error {
        e if e.is_validation() => StatusCode::BAD_REQUEST,
        DsmError::NotInitialized => StatusCode::SERVICE_UNAVAILABLE,
        DsmError::RemoteFetch { .. } => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub async fn handle_stats(
    Extension(node): Extension<Arc<DsmNode>>,
) -> (StatusCode, Json<StatsResponse>) {
    let stats = node.stats();
    (
        StatusCode::OK,
        Json(StatsResponse {
            process: node.local_id(),
            stats,
            hit_rate: stats.hit_rate(),
        }),
    )
}

pub async fn handle_cache(
    Extension(node): Extension<Arc<DsmNode>>,
) -> (StatusCode, Json<CacheResponse>) {
    let valid_blocks = node.valid_cache_blocks().await;
    (
        StatusCode::OK,
        Json(CacheResponse {
            process: node.local_id(),
            valid_blocks,
        }),
    )
}

pub async fn handle_read(
    Extension(node): Extension<Arc<DsmNode>>,
    Path((position, length)): Path<(u64, usize)>,
) -> (StatusCode, Json<ReadResponse>) {
    match node.read(position, length).await {
        Ok(data) => (
            StatusCode::OK,
            Json(ReadResponse {
                success: true,
                data: Some(render_bytes(&data)),
                error: None,
            }),
        ),
        Err(e) => {
            tracing::error!(
                process = node.local_id(),
                "Read of {}+{} failed: {}",
                position,
                length,
                e
            );
            (
                status_for(&e),
                Json(ReadResponse {
                    success: false,
                    data: None,
                    error: Some(e.to_string()),
                }),
            )
        }
    }
}

pub async fn handle_write(
    Extension(node): Extension<Arc<DsmNode>>,
    Json(req): Json<WriteRequest>,
) -> (StatusCode, Json<WriteResponse>) {
    let mut bytes = req.data.into_bytes();
    bytes.push(0);

    match node.write(req.position, &bytes).await {
        Ok(report) => (
            StatusCode::OK,
            Json(WriteResponse {
                success: true,
                report: Some(report),
                error: None,
            }),
        ),
        Err(e) => {
            tracing::error!(process = node.local_id(), "Write at {} failed: {}", req.position, e);
            (
                status_for(&e),
                Json(WriteResponse {
                    success: false,
                    report: None,
                    error: Some(e.to_string()),
                }),
            )
        }
    }
}
