//! Delivery log endpoints: browse, inspect, retry and drain the queue.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::delivery::{BatchResult, EmailLog, EmailLogFilter, EmailLogPage, EmailLogStats, EmailStatus};
use crate::error::{AppError, Result};
use crate::server::AppState;

/// Upper bound for an operator-triggered batch
const MAX_MANUAL_BATCH: usize = 500;

#[derive(Debug, Deserialize)]
pub struct ProcessQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryResponse {
    pub id: Uuid,
    pub status: EmailStatus,
    pub retry_count: u32,
}

/// GET /api/v1/email-logs - Paginated delivery records
#[tracing::instrument(name = "http.list_email_logs", skip(state))]
pub async fn list_email_logs(
    State(state): State<AppState>,
    Query(filter): Query<EmailLogFilter>,
) -> Result<Json<EmailLogPage>> {
    Ok(Json(state.delivery.list(&filter).await?))
}

/// GET /api/v1/email-logs/stats - Counts by status and recent activity
#[tracing::instrument(name = "http.email_log_stats", skip(state))]
pub async fn email_log_stats(State(state): State<AppState>) -> Result<Json<EmailLogStats>> {
    Ok(Json(state.delivery.stats().await?))
}

/// GET /api/v1/email-logs/:id
#[tracing::instrument(name = "http.get_email_log", skip(state))]
pub async fn get_email_log(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<EmailLog>> {
    state
        .delivery
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Email log {} not found", id)))
}

/// POST /api/v1/email-logs/:id/retry - Requeue a permanently failed record
#[tracing::instrument(name = "http.retry_email_log", skip(state))]
pub async fn retry_email_log(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RetryResponse>> {
    let log = state
        .delivery
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Email log {} not found", id)))?;

    if log.status != EmailStatus::Failed || !state.delivery.retry(id).await? {
        return Err(AppError::Conflict(format!(
            "Only FAILED emails can be retried (current status: {})",
            log.status
        )));
    }

    Ok(Json(RetryResponse {
        id,
        status: EmailStatus::Queued,
        retry_count: 0,
    }))
}

/// POST /api/v1/email-logs/process - Run one batch now
#[tracing::instrument(name = "http.process_queue", skip(state))]
pub async fn process_queue(
    State(state): State<AppState>,
    Query(query): Query<ProcessQuery>,
) -> Result<Json<BatchResult>> {
    if !state.delivery.is_transport_configured() {
        return Err(AppError::Unavailable(
            "Email transport is not configured".to_string(),
        ));
    }

    let limit = query
        .limit
        .unwrap_or(state.delivery.config().batch_size)
        .clamp(1, MAX_MANUAL_BATCH);

    let result = state.delivery.process_batch(limit).await?;
    tracing::info!(
        processed = result.processed,
        sent = result.sent,
        failed = result.failed,
        "Manual batch run completed"
    );

    Ok(Json(result))
}
