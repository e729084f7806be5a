//! Session administration handlers

use std::time::Instant;

use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use mentora_billing_core::{BillingSession, StopOutcome};
use mentora_types::{SessionId, SessionState};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub client_id: String,
    pub advisor_id: String,
    pub rate_per_minute_cents: i64,
    pub state: SessionState,
    pub duration_seconds: u64,
    pub total_billed_cents: i64,
    pub started_at: String,
    pub last_billing_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SessionListResponse {
    pub sessions: Vec<SessionResponse>,
    pub total: usize,
}

fn to_response(session: BillingSession) -> SessionResponse {
    SessionResponse {
        session_id: session.session_id.to_string(),
        client_id: session.client_id.to_string(),
        advisor_id: session.advisor_id.to_string(),
        rate_per_minute_cents: session.rate_per_minute.cents(),
        state: session.state,
        duration_seconds: session.duration_secs,
        total_billed_cents: session.total_billed.cents(),
        started_at: session.started_at.to_rfc3339(),
        last_billing_at: session.last_billing_at.to_rfc3339(),
        ended_at: session.ended_at.map(|t| t.to_rfc3339()),
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/v1/sessions
pub async fn list_sessions(State(state): State<AppState>) -> ApiResult<Json<SessionListResponse>> {
    let start = Instant::now();

    let sessions: Vec<SessionResponse> = state
        .engine
        .registry()
        .snapshots()
        .await
        .into_iter()
        .map(to_response)
        .collect();

    metrics::histogram!("billing_operation_duration_seconds", "operation" => "list_sessions")
        .record(start.elapsed().as_secs_f64());

    let total = sessions.len();
    Ok(Json(SessionListResponse { sessions, total }))
}

/// GET /api/v1/sessions/{id}
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<SessionResponse>> {
    let start = Instant::now();

    let entry = state
        .engine
        .registry()
        .get(&SessionId::new(id))
        .await
        .ok_or(ApiError::SessionNotFound)?;
    let session = entry.snapshot().await;

    metrics::histogram!("billing_operation_duration_seconds", "operation" => "get_session")
        .record(start.elapsed().as_secs_f64());

    Ok(Json(to_response(session)))
}

/// DELETE /api/v1/sessions/{id}
pub async fn cancel_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<SessionResponse>> {
    let start = Instant::now();

    let outcome = state
        .engine
        .cancel_session(&SessionId::new(id), Utc::now())
        .await;

    metrics::histogram!("billing_operation_duration_seconds", "operation" => "cancel_session")
        .record(start.elapsed().as_secs_f64());

    match outcome {
        StopOutcome::Finalized(session) => Ok(Json(to_response(session))),
        StopOutcome::AlreadyEnded => Err(ApiError::SessionAlreadyEnded),
        StopOutcome::NotFound => Err(ApiError::SessionNotFound),
    }
}
