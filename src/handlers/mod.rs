//! HTTP handlers.
//!
//! Public endpoints live in [`public`] and [`relay`]; everything else backs
//! one admin page and runs behind [`crate::login::require_auth`].

pub mod feedback;
pub mod importer;
pub mod invitations;
pub mod kanban;
pub mod public;
pub mod relay;
pub mod testers;

use crate::dashboard::{Page, Selection};
use axum::{
    body::Body,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const CSV_CONTENT_TYPE: &str = "text/csv; charset=utf-8";
pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

fn first_page() -> usize {
    1
}

/// `?page=` for paginated listings (1-based).
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PageQuery {
    #[serde(default = "first_page")]
    pub page: usize,
}

#[derive(Debug, Deserialize)]
pub struct IdBody<T> {
    pub id: T,
}

#[derive(Debug, Deserialize)]
pub struct StatusBody<T> {
    pub status: T,
}

#[derive(Debug, Serialize)]
pub struct Message {
    pub message: String,
}

impl Message {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A dashboard page: the visible rows, page-independent stats and the
/// admin's current selection.
#[derive(Debug, Serialize)]
pub struct Listing<T, S> {
    #[serde(flatten)]
    pub page: Page<T>,
    pub stats: S,
    pub selected: Vec<Uuid>,
    /// Every visible row is selected.
    pub all_visible_selected: bool,
}

impl<T, S> Listing<T, S> {
    pub fn new(page: Page<T>, stats: S, selection: &Selection, visible: &[Uuid]) -> Self {
        Self {
            page,
            stats,
            selected: selection.ids().to_vec(),
            all_visible_selected: selection.covers(visible),
        }
    }
}

/// A file download with an RFC 5987 encoded file name.
pub fn attachment(file_name: &str, content_type: &'static str, body: impl Into<Body>) -> Response {
    let disposition = format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        file_name.replace('"', ""),
        urlencoding::encode(file_name)
    );
    let mut response = (StatusCode::OK, body.into()).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    response
}
