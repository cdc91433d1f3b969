//! Feedback dashboard.

use super::{CSV_CONTENT_TYPE, IdBody, Listing, Message, PageQuery, StatusBody, attachment};
use crate::app::AppState;
use crate::dashboard::{
    FeedbackFilter, FeedbackStats, bulk_update_feedback_status, export_rows, paginate,
    update_feedback_status,
};
use crate::downloader::{feedback_csv, feedback_file_name};
use crate::error::AppError;
use crate::login::AdminSession;
use crate::models::{Feedback, FeedbackStatus};
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::Response,
};
use std::sync::Arc;
use uuid::Uuid;

type FeedbackListing = Listing<Feedback, FeedbackStats>;

/// Filter every stored row; returns the filtered rows and the ids shown on
/// `page`.
async fn load(
    state: &AppState,
    filter: &FeedbackFilter,
    page: usize,
) -> Result<(Vec<Feedback>, Vec<Uuid>), AppError> {
    let all = state.store.list_feedback(None).await?;
    let filtered = filter.apply(&all);
    let visible = paginate(&filtered, page).items.iter().map(|row| row.id).collect();
    Ok((filtered, visible))
}

fn listing(
    session: &AdminSession,
    feedback: &[Feedback],
    filter: &FeedbackFilter,
    page: usize,
) -> Result<FeedbackListing, AppError> {
    let filtered = filter.apply(feedback);
    let page = paginate(&filtered, page);
    let visible: Vec<Uuid> = page.items.iter().map(|f| f.id).collect();
    let stats = FeedbackStats::from_feedback(feedback);
    session.with_workspace(|ws| Listing::new(page, stats, &ws.feedback, &visible))
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AdminSession>,
    Query(filter): Query<FeedbackFilter>,
    Query(paging): Query<PageQuery>,
) -> Result<Json<FeedbackListing>, AppError> {
    let feedback = state.store.list_feedback(None).await?;
    Ok(Json(listing(&session, &feedback, &filter, paging.page)?))
}

/// Change one feedback item's status.
pub async fn set_status(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AdminSession>,
    Path(id): Path<Uuid>,
    Query(filter): Query<FeedbackFilter>,
    Query(paging): Query<PageQuery>,
    Json(body): Json<StatusBody<FeedbackStatus>>,
) -> Result<Json<FeedbackListing>, AppError> {
    let feedback = update_feedback_status(state.store.as_ref(), id, body.status).await?;
    Ok(Json(listing(&session, &feedback, &filter, paging.page)?))
}

/// Apply one status to every selected feedback item, then clear the selection.
pub async fn bulk_status(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AdminSession>,
    Query(filter): Query<FeedbackFilter>,
    Query(paging): Query<PageQuery>,
    Json(body): Json<StatusBody<FeedbackStatus>>,
) -> Result<Json<FeedbackListing>, AppError> {
    let ids = session.with_workspace(|ws| ws.feedback.ids().to_vec())?;
    let feedback = bulk_update_feedback_status(state.store.as_ref(), &ids, body.status).await?;
    session.with_workspace(|ws| ws.feedback.clear())?;
    Ok(Json(listing(&session, &feedback, &filter, paging.page)?))
}

pub async fn toggle(
    Extension(session): Extension<AdminSession>,
    Json(body): Json<IdBody<Uuid>>,
) -> Result<Json<Vec<Uuid>>, AppError> {
    let selected = session.with_workspace(|ws| {
        ws.feedback.toggle(body.id);
        ws.feedback.ids().to_vec()
    })?;
    Ok(Json(selected))
}

/// The page's "select all" checkbox.
pub async fn toggle_visible(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AdminSession>,
    Query(filter): Query<FeedbackFilter>,
    Query(paging): Query<PageQuery>,
) -> Result<Json<Vec<Uuid>>, AppError> {
    let (_, visible) = load(&state, &filter, paging.page).await?;
    let selected = session.with_workspace(|ws| {
        ws.feedback.select_visible(&visible);
        ws.feedback.ids().to_vec()
    })?;
    Ok(Json(selected))
}

pub async fn clear_selection(
    Extension(session): Extension<AdminSession>,
) -> Result<Json<Message>, AppError> {
    session.with_workspace(|ws| ws.feedback.clear())?;
    Ok(Json(Message::new("Selection cleared.")))
}

/// Download the selected feedback, or every filtered item when nothing is
/// selected.
pub async fn export_csv(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AdminSession>,
    Query(filter): Query<FeedbackFilter>,
) -> Result<Response, AppError> {
    let (filtered, _) = load(&state, &filter, 1).await?;
    let (rows, selected) =
        session.with_workspace(|ws| (export_rows(&filtered, &ws.feedback), !ws.feedback.is_empty()))?;
    Ok(attachment(
        feedback_file_name(selected),
        CSV_CONTENT_TYPE,
        feedback_csv(&rows),
    ))
}
