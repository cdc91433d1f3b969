//! Endpoints open to testers.

use super::Message;
use crate::app::AppState;
use crate::error::AppError;
use crate::forms::{
    FEEDBACK_SUCCESS, FeedbackForm, REGISTRATION_SUCCESS, RegistrationForm, submit_feedback as save_feedback,
    submit_registration,
};
use crate::models::{Feedback, Tester};
use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;
use std::sync::Arc;

pub async fn health() -> Json<Message> {
    Json(Message::new("Server is running correctly"))
}

#[derive(Serialize)]
pub struct Submitted<T> {
    pub message: &'static str,
    #[serde(flatten)]
    pub record: T,
}

#[derive(Serialize)]
pub struct TesterRecord {
    pub tester: Tester,
}

#[derive(Serialize)]
pub struct FeedbackRecord {
    pub feedback: Feedback,
}

/// Beta registration form.
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(form): Json<RegistrationForm>,
) -> Result<(StatusCode, Json<Submitted<TesterRecord>>), AppError> {
    let tester = submit_registration(
        state.store.as_ref(),
        &form,
        state.config.strict_platform_emails,
    )
    .await?;
    Ok((
        StatusCode::CREATED,
        Json(Submitted {
            message: REGISTRATION_SUCCESS,
            record: TesterRecord { tester },
        }),
    ))
}

/// Feedback form, anonymous or not.
pub async fn submit_feedback(
    State(state): State<Arc<AppState>>,
    Json(form): Json<FeedbackForm>,
) -> Result<(StatusCode, Json<Submitted<FeedbackRecord>>), AppError> {
    let feedback = save_feedback(state.store.as_ref(), &form).await?;
    Ok((
        StatusCode::CREATED,
        Json(Submitted {
            message: FEEDBACK_SUCCESS,
            record: FeedbackRecord { feedback },
        }),
    ))
}
