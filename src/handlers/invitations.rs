//! Invitation manager: approved testers per platform, invitation history,
//! batch sends and the platform upload CSV.

use super::{CSV_CONTENT_TYPE, IdBody, Message, attachment};
use crate::app::AppState;
use crate::error::AppError;
use crate::invitations::{
    BatchProgress, BatchReport, InvitationQuery, InvitationsOverview, export_platform_csv,
    overview as load_overview, resend_invitation, send_feedback_requests, send_invitations,
};
use crate::login::AdminSession;
use crate::models::Platform;
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::{HeaderValue, header::HeaderName},
    response::Response,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Header carrying the platform CSV summary next to the file body.
pub const EXPORT_MESSAGE_HEADER: &str = "x-export-message";

#[derive(Serialize)]
pub struct OverviewResponse {
    #[serde(flatten)]
    pub overview: InvitationsOverview,
    pub selected: Vec<Uuid>,
    pub all_visible_selected: bool,
}

pub async fn overview(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AdminSession>,
    Query(query): Query<InvitationQuery>,
) -> Result<Json<OverviewResponse>, AppError> {
    let overview = load_overview(state.store.as_ref(), &query).await?;
    let visible: Vec<Uuid> = overview.testers.items.iter().map(|t| t.id).collect();
    let (selected, all_visible_selected) = session.with_workspace(|ws| {
        (
            ws.invitations.ids().to_vec(),
            ws.invitations.covers(&visible),
        )
    })?;
    Ok(Json(OverviewResponse {
        overview,
        selected,
        all_visible_selected,
    }))
}

pub async fn toggle(
    Extension(session): Extension<AdminSession>,
    Json(body): Json<IdBody<Uuid>>,
) -> Result<Json<Vec<Uuid>>, AppError> {
    let selected = session.with_workspace(|ws| {
        ws.invitations.toggle(body.id);
        ws.invitations.ids().to_vec()
    })?;
    Ok(Json(selected))
}

/// Select-all over the approved testers on the current tester page.
pub async fn toggle_visible(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AdminSession>,
    Query(query): Query<InvitationQuery>,
) -> Result<Json<Vec<Uuid>>, AppError> {
    let overview = load_overview(state.store.as_ref(), &query).await?;
    let visible: Vec<Uuid> = overview.testers.items.iter().map(|t| t.id).collect();
    let selected = session.with_workspace(|ws| {
        ws.invitations.select_visible(&visible);
        ws.invitations.ids().to_vec()
    })?;
    Ok(Json(selected))
}

pub async fn clear_selection(
    Extension(session): Extension<AdminSession>,
) -> Result<Json<Message>, AppError> {
    session.with_workspace(|ws| ws.invitations.clear())?;
    Ok(Json(Message::new("Selection cleared.")))
}

#[derive(Debug, Deserialize)]
pub struct SendRequest {
    pub platform: Platform,
    #[serde(default)]
    pub app_id: String,
}

/// Mail the selected testers one by one and clear the selection once the
/// batch has run.
pub async fn send(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AdminSession>,
    Json(request): Json<SendRequest>,
) -> Result<Json<BatchReport>, AppError> {
    let selected = session.with_workspace(|ws| ws.invitations.ids().to_vec())?;
    let report = send_invitations(
        state.outbox(),
        session.progress(),
        request.platform,
        &request.app_id,
        &selected,
    )
    .await?;
    session.with_workspace(|ws| ws.invitations.clear())?;
    Ok(Json(report))
}

#[derive(Serialize)]
pub struct ProgressResponse {
    pub running: bool,
    #[serde(flatten)]
    pub progress: BatchProgress,
}

/// Counters of the batch this session is running, polled by the page.
pub async fn progress(Extension(session): Extension<AdminSession>) -> Json<ProgressResponse> {
    let snapshot = session.progress().snapshot();
    Json(ProgressResponse {
        running: snapshot.is_some(),
        progress: snapshot.unwrap_or_default(),
    })
}

pub async fn resend(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Message>, AppError> {
    let message = resend_invitation(state.outbox(), id).await?;
    Ok(Json(Message::new(message)))
}

#[derive(Debug, Deserialize)]
pub struct PlatformCsvRequest {
    pub platform: Platform,
}

/// The CSV for the store's tester upload; the summary message rides along in
/// [`EXPORT_MESSAGE_HEADER`].
pub async fn platform_csv(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AdminSession>,
    Json(request): Json<PlatformCsvRequest>,
) -> Result<Response, AppError> {
    let selected = session.with_workspace(|ws| ws.invitations.ids().to_vec())?;
    let export = export_platform_csv(state.store.as_ref(), request.platform, &selected).await?;
    log::info!("{}", export.message);

    let mut response = attachment(&export.file_name, CSV_CONTENT_TYPE, export.csv);
    if let Ok(value) = HeaderValue::from_str(&export.message) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(EXPORT_MESSAGE_HEADER), value);
    }
    Ok(response)
}

/// Ask every invited tester for feedback.
pub async fn feedback_requests(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AdminSession>,
) -> Result<Json<BatchReport>, AppError> {
    let report = send_feedback_requests(
        state.outbox(),
        session.progress(),
        &state.config.public_url,
    )
    .await?;
    Ok(Json(report))
}
