//! `/api/send-email`: relays `{to, subject, html}` through the configured
//! mail transport for browser clients.
//!
//! Replies use the relay's own `{success, messageId | error}` shape rather
//! than the API error body, and every response allows any origin.

use crate::app::AppState;
use crate::mailer::OutgoingEmail;
use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::{Method, StatusCode, header},
    response::{IntoResponse, Response},
    routing::post,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

pub const RELAY_PATH: &str = "/api/send-email";

#[derive(Debug, Deserialize)]
struct RelayRequest {
    to: Option<String>,
    subject: Option<String>,
    html: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RelayReply {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn failure(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(RelayReply {
            success: false,
            message_id: None,
            error: Some(error.into()),
        }),
    )
        .into_response()
}

pub fn routes() -> Router<Arc<AppState>> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route(
            RELAY_PATH,
            post(send_email)
                .options(preflight)
                .fallback(method_not_allowed),
        )
        .layer(cors)
}

async fn preflight() -> StatusCode {
    StatusCode::OK
}

async fn method_not_allowed() -> Response {
    failure(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

async fn send_email(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RelayRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            log::warn!("Rejected relay request: {}", rejection.body_text());
            return failure(StatusCode::BAD_REQUEST, rejection.body_text());
        }
    };

    let (Some(to), Some(subject), Some(html)) = (
        present(request.to),
        present(request.subject),
        present(request.html),
    ) else {
        return failure(
            StatusCode::BAD_REQUEST,
            "Missing required fields: to, subject, or html",
        );
    };

    let email = OutgoingEmail { to, subject, html };
    match state.mailer.send(&email).await {
        Ok(message_id) => (
            StatusCode::OK,
            Json(RelayReply {
                success: true,
                message_id: Some(message_id),
                error: None,
            }),
        )
            .into_response(),
        Err(e) => {
            log::error!("Relay failed to send to {}: {}", email.to, e);
            failure(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}
