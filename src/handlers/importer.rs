//! CSV importer board.
//!
//! The board built from an upload lives only in the admin's workspace; no
//! operation here touches the store.

use super::{CSV_CONTENT_TYPE, IdBody, XLSX_CONTENT_TYPE, attachment};
use crate::downloader::{IMPORTED_BOARD_FILE, board_xlsx};
use crate::error::AppError;
use crate::kanban::Board;
use crate::loader::{ImportedFeedback, SAMPLE_FILE_NAME, parse_feedback_csv, sample_csv as sample};
use crate::login::AdminSession;
use crate::models::FeedbackStatus;
use axum::{
    Extension, Json,
    extract::{Multipart, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;

const UPLOAD_FIELD: &str = "file";

#[derive(Debug, Deserialize)]
pub struct DropRequest {
    pub status: FeedbackStatus,
}

#[derive(Debug, Deserialize)]
pub struct EstimateRequest {
    pub estimate: f64,
}

#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    #[serde(default)]
    pub title: String,
}

fn no_board() -> AppError {
    AppError::not_found("Imported board")
}

/// Run `f` on the imported board and answer with the updated board.
fn with_board(
    session: &AdminSession,
    f: impl FnOnce(&mut Board<ImportedFeedback>) -> Result<(), AppError>,
) -> Result<Response, AppError> {
    session.with_workspace(|ws| {
        let board = ws.import.as_mut().ok_or_else(no_board)?;
        f(board)?;
        Ok(Json(board.view()).into_response())
    })?
}

/// The imported board, or `null` before the first upload.
pub async fn board(Extension(session): Extension<AdminSession>) -> Result<Response, AppError> {
    session.with_workspace(|ws| Json(ws.import.as_ref().map(|board| board.view())).into_response())
}

/// Replace the imported board with the rows of an uploaded CSV
///
/// Expects a multipart form with the file in the `file` field. A rejected
/// file leaves the previous board in place.
pub async fn upload(
    Extension(session): Extension<AdminSession>,
    mut multipart: Multipart,
) -> Result<Response, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::invalid_input(e.body_text()))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::invalid_input(e.body_text()))?;

        let rows = parse_feedback_csv(&file_name, content_type.as_deref(), &bytes)?;
        log::info!("Imported {} feedback row(s) from {}", rows.len(), file_name);
        return session.with_workspace(|ws| {
            let board = Board::new(rows);
            let response = Json(board.view()).into_response();
            ws.import = Some(board);
            response
        });
    }
    Err(AppError::import("Please select a valid CSV file."))
}

/// Drop the imported board.
pub async fn reset(Extension(session): Extension<AdminSession>) -> Result<StatusCode, AppError> {
    session.with_workspace(|ws| ws.import = None)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn sample_csv() -> Response {
    attachment(SAMPLE_FILE_NAME, CSV_CONTENT_TYPE, sample())
}

pub async fn start_drag(
    Extension(session): Extension<AdminSession>,
    Json(body): Json<IdBody<String>>,
) -> Result<Response, AppError> {
    with_board(&session, |board| board.start_drag(&body.id))
}

pub async fn end_drag(Extension(session): Extension<AdminSession>) -> Result<Response, AppError> {
    with_board(&session, |board| {
        board.end_drag();
        Ok(())
    })
}

pub async fn drop_card(
    Extension(session): Extension<AdminSession>,
    Json(body): Json<DropRequest>,
) -> Result<Response, AppError> {
    with_board(&session, |board| {
        if let Some(movement) = board.drop_on(body.status)? {
            log::debug!(
                "Moved imported card {} from {} to {}",
                movement.id,
                movement.from,
                movement.to
            );
        }
        Ok(())
    })
}

pub async fn set_estimate(
    Extension(session): Extension<AdminSession>,
    Path(id): Path<String>,
    Json(body): Json<EstimateRequest>,
) -> Result<Response, AppError> {
    with_board(&session, |board| board.set_estimate(&id, body.estimate))
}

pub async fn rename_column(
    Extension(session): Extension<AdminSession>,
    Path(status): Path<FeedbackStatus>,
    Json(body): Json<RenameRequest>,
) -> Result<Response, AppError> {
    with_board(&session, |board| board.rename_column(status, &body.title))
}

/// Delete a column; its cards fall back to To Discuss.
pub async fn delete_column(
    Extension(session): Extension<AdminSession>,
    Path(status): Path<FeedbackStatus>,
) -> Result<Response, AppError> {
    with_board(&session, |board| {
        let moved = board.delete_column(status)?;
        log::info!("Deleted column {}; moved {} card(s) to to_discuss", status, moved);
        Ok(())
    })
}

pub async fn export_xlsx(Extension(session): Extension<AdminSession>) -> Result<Response, AppError> {
    let bytes = session.with_workspace(|ws| {
        let board = ws.import.as_ref().ok_or_else(no_board)?;
        board_xlsx(board)
    })??;
    Ok(attachment(IMPORTED_BOARD_FILE, XLSX_CONTENT_TYPE, bytes))
}
