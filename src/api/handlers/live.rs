//! Live-session endpoints: start, observe, end, and the duplex channel.

use crate::{
    live::gateway,
    types::{Result, SessionSummary, StartSessionRequest, StartSessionResponse},
    AppState,
};
use axum::{
    extract::{ws::WebSocketUpgrade, Path, State},
    response::Response,
    Json,
};

/// Start a live research session.
#[utoipa::path(
    post,
    path = "/live-research/start",
    request_body = StartSessionRequest,
    responses(
        (status = 200, description = "Session started", body = StartSessionResponse),
        (status = 400, description = "Invalid input")
    ),
    tag = "live"
)]
pub async fn start_live_session(
    State(state): State<AppState>,
    Json(payload): Json<StartSessionRequest>,
) -> Result<Json<StartSessionResponse>> {
    Ok(Json(state.sessions.start_session(payload)?))
}

/// Get a snapshot summary of a live session.
#[utoipa::path(
    get,
    path = "/live-research/{session_id}/status",
    params(("session_id" = String, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Session summary", body = SessionSummary),
        (status = 404, description = "Session not found")
    ),
    tag = "live"
)]
pub async fn get_live_session_status(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionSummary>> {
    Ok(Json(state.status.session_summary(&session_id)?))
}

/// End a live session and receive the final summary.
#[utoipa::path(
    post,
    path = "/live-research/{session_id}/end",
    params(("session_id" = String, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Final session summary", body = SessionSummary),
        (status = 404, description = "Session not found")
    ),
    tag = "live"
)]
pub async fn end_live_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionSummary>> {
    Ok(Json(state.sessions.end_session(&session_id)?))
}

/// Upgrade to the duplex session channel. Inbound frames become session
/// messages; every appended log entry streams back out in append order.
pub async fn session_channel(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    ws: WebSocketUpgrade,
) -> Result<Response> {
    // Resolve the session before upgrading so unknown ids get a 404 instead
    // of a dangling socket.
    state.sessions.state(&session_id)?;

    let sessions = state.sessions.clone();
    Ok(ws.on_upgrade(move |socket| gateway::serve(socket, sessions, session_id)))
}
