//! HTTP listener for the [`Gateway`] handlers.
//!
//! Routes:
//! - `GET /health`
//! - `POST /v1/verify`
//! - `GET /v1/campaigns/:id/results?key=<read_key>`
//! - `POST /v1/matches/:id/complete`

use crate::api::{ApiResponse, Gateway, VerifyHeaders};
use crate::error::Result;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
struct ResultsQuery {
    key: Option<String>,
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.body)).into_response()
    }
}

/// Router with every public endpoint mounted on `gateway`.
pub fn router(gateway: Arc<Gateway>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/verify", post(verify))
        .route("/v1/campaigns/:id/results", get(campaign_results))
        .route("/v1/matches/:id/complete", post(complete_match))
        .with_state(gateway)
}

/// Serve `gateway` on `listener` until `shutdown` turns true.
///
/// # Errors
///
/// Returns an I/O error if the listener fails.
pub async fn serve(
    listener: TcpListener,
    gateway: Arc<Gateway>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    debug!("Serving HTTP API on {}", listener.local_addr()?);

    axum::serve(listener, router(gateway))
        .with_graceful_shutdown(async move {
            while !*shutdown.borrow_and_update() {
                if shutdown.changed().await.is_err() {
                    break;
                }
            }
        })
        .await?;

    info!("HTTP API stopped");
    Ok(())
}

async fn health() -> &'static str {
    "OK"
}

async fn verify(
    State(gateway): State<Arc<Gateway>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResponse {
    let verify_headers = VerifyHeaders::from_pairs(
        headers
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str(), v))),
    );
    gateway.verify(&verify_headers, &body, Utc::now()).await
}

async fn campaign_results(
    State(gateway): State<Arc<Gateway>>,
    Path(id): Path<String>,
    Query(query): Query<ResultsQuery>,
) -> ApiResponse {
    gateway.campaign_results(&id, query.key.as_deref()).await
}

async fn complete_match(
    State(gateway): State<Arc<Gateway>>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResponse {
    gateway.complete_match(&id, &body, Utc::now()).await
}
