//! Persisted feedback board.
//!
//! The board is rebuilt from the store on every request; only the id of the
//! card being dragged is kept in the session workspace.

use super::{IdBody, XLSX_CONTENT_TYPE, attachment};
use crate::app::AppState;
use crate::downloader::{FEEDBACK_BOARD_FILE, board_xlsx};
use crate::error::AppError;
use crate::kanban::{Board, BoardView, load_feedback_board, persist_estimate, persist_move};
use crate::login::AdminSession;
use crate::models::{Feedback, FeedbackStatus};
use axum::{
    Extension, Json,
    extract::{Path, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct DropRequest {
    pub status: FeedbackStatus,
}

#[derive(Debug, Deserialize)]
pub struct EstimateRequest {
    pub estimate: f64,
}

async fn load(state: &AppState, session: &AdminSession) -> Result<Board<Feedback>, AppError> {
    let dragging = session.with_workspace(|ws| ws.kanban_drag)?;
    load_feedback_board(state.store.as_ref(), dragging).await
}

/// Store the board's drag state back into the workspace and render it.
fn respond(session: &AdminSession, board: &Board<Feedback>) -> Result<Response, AppError> {
    let dragging = board.dragging().copied();
    session.with_workspace(|ws| ws.kanban_drag = dragging)?;
    let view: BoardView<'_, Feedback> = board.view();
    Ok(Json(view).into_response())
}

pub async fn board(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AdminSession>,
) -> Result<Response, AppError> {
    let board = load(&state, &session).await?;
    respond(&session, &board)
}

pub async fn start_drag(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AdminSession>,
    Json(body): Json<IdBody<Uuid>>,
) -> Result<Response, AppError> {
    let mut board = load(&state, &session).await?;
    board.start_drag(&body.id)?;
    respond(&session, &board)
}

pub async fn end_drag(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AdminSession>,
) -> Result<Response, AppError> {
    let mut board = load(&state, &session).await?;
    board.end_drag();
    respond(&session, &board)
}

/// Drop the dragged card on a column. A drop onto the card's own column, or
/// with nothing dragged, changes nothing and writes nothing.
pub async fn drop_card(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AdminSession>,
    Json(body): Json<DropRequest>,
) -> Result<Response, AppError> {
    let mut board = load(&state, &session).await?;
    if let Some(movement) = board.drop_on(body.status)? {
        persist_move(state.store.as_ref(), &movement).await;
    }
    respond(&session, &board)
}

pub async fn set_estimate(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AdminSession>,
    Path(id): Path<Uuid>,
    Json(body): Json<EstimateRequest>,
) -> Result<Response, AppError> {
    let mut board = load(&state, &session).await?;
    board.set_estimate(&id, body.estimate)?;
    persist_estimate(state.store.as_ref(), id, body.estimate).await;
    respond(&session, &board)
}

pub async fn export_xlsx(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AdminSession>,
) -> Result<Response, AppError> {
    let board = load(&state, &session).await?;
    let bytes = board_xlsx(&board)?;
    Ok(attachment(FEEDBACK_BOARD_FILE, XLSX_CONTENT_TYPE, bytes))
}
