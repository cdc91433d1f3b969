//! Tester dashboard.

use super::{CSV_CONTENT_TYPE, IdBody, Listing, Message, PageQuery, StatusBody, attachment};
use crate::app::AppState;
use crate::dashboard::{
    TesterFilter, TesterStats, bulk_update_tester_status, export_rows, paginate,
    update_tester_status,
};
use crate::downloader::{testers_csv, testers_file_name};
use crate::error::AppError;
use crate::login::AdminSession;
use crate::models::{Tester, TesterStatus};
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::Response,
};
use std::sync::Arc;
use uuid::Uuid;

type TesterListing = Listing<Tester, TesterStats>;

/// Filter every stored row; returns the filtered rows and the ids shown on
/// `page`.
async fn load(
    state: &AppState,
    filter: &TesterFilter,
    page: usize,
) -> Result<(Vec<Tester>, Vec<Uuid>), AppError> {
    let all = state.store.list_testers(None).await?;
    let filtered = filter.apply(&all);
    let visible = paginate(&filtered, page).items.iter().map(|row| row.id).collect();
    Ok((filtered, visible))
}

fn listing(
    session: &AdminSession,
    testers: &[Tester],
    filter: &TesterFilter,
    page: usize,
) -> Result<TesterListing, AppError> {
    let filtered = filter.apply(testers);
    let page = paginate(&filtered, page);
    let visible: Vec<Uuid> = page.items.iter().map(|t| t.id).collect();
    let stats = TesterStats::from_testers(testers);
    session.with_workspace(|ws| Listing::new(page, stats, &ws.testers, &visible))
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AdminSession>,
    Query(filter): Query<TesterFilter>,
    Query(paging): Query<PageQuery>,
) -> Result<Json<TesterListing>, AppError> {
    let testers = state.store.list_testers(None).await?;
    Ok(Json(listing(&session, &testers, &filter, paging.page)?))
}

/// Change one tester's status.
pub async fn set_status(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AdminSession>,
    Path(id): Path<Uuid>,
    Query(filter): Query<TesterFilter>,
    Query(paging): Query<PageQuery>,
    Json(body): Json<StatusBody<TesterStatus>>,
) -> Result<Json<TesterListing>, AppError> {
    let testers = update_tester_status(state.store.as_ref(), id, body.status).await?;
    Ok(Json(listing(&session, &testers, &filter, paging.page)?))
}

/// Apply one status to every selected tester, then clear the selection.
pub async fn bulk_status(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AdminSession>,
    Query(filter): Query<TesterFilter>,
    Query(paging): Query<PageQuery>,
    Json(body): Json<StatusBody<TesterStatus>>,
) -> Result<Json<TesterListing>, AppError> {
    let ids = session.with_workspace(|ws| ws.testers.ids().to_vec())?;
    let testers = bulk_update_tester_status(state.store.as_ref(), &ids, body.status).await?;
    session.with_workspace(|ws| ws.testers.clear())?;
    Ok(Json(listing(&session, &testers, &filter, paging.page)?))
}

pub async fn toggle(
    Extension(session): Extension<AdminSession>,
    Json(body): Json<IdBody<Uuid>>,
) -> Result<Json<Vec<Uuid>>, AppError> {
    let selected = session.with_workspace(|ws| {
        ws.testers.toggle(body.id);
        ws.testers.ids().to_vec()
    })?;
    Ok(Json(selected))
}

/// The page's "select all" checkbox.
pub async fn toggle_visible(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AdminSession>,
    Query(filter): Query<TesterFilter>,
    Query(paging): Query<PageQuery>,
) -> Result<Json<Vec<Uuid>>, AppError> {
    let (_, visible) = load(&state, &filter, paging.page).await?;
    let selected = session.with_workspace(|ws| {
        ws.testers.select_visible(&visible);
        ws.testers.ids().to_vec()
    })?;
    Ok(Json(selected))
}

pub async fn clear_selection(
    Extension(session): Extension<AdminSession>,
) -> Result<Json<Message>, AppError> {
    session.with_workspace(|ws| ws.testers.clear())?;
    Ok(Json(Message::new("Selection cleared.")))
}

/// Download the selected testers, or every filtered tester when nothing is
/// selected.
pub async fn export_csv(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AdminSession>,
    Query(filter): Query<TesterFilter>,
) -> Result<Response, AppError> {
    let (filtered, _) = load(&state, &filter, 1).await?;
    let (rows, selected) =
        session.with_workspace(|ws| (export_rows(&filtered, &ws.testers), !ws.testers.is_empty()))?;
    Ok(attachment(
        testers_file_name(selected),
        CSV_CONTENT_TYPE,
        testers_csv(&rows),
    ))
}
