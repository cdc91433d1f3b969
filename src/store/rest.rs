//! PostgREST client for the hosted backend.
//!
//! Rows are read and written through `<url>/rest/v1/<table>` with the
//! project's anon key sent both as `apikey` and as a bearer token. Filters
//! use PostgREST's query syntax (`status=eq.approved`, `id=in.(...)`).

use super::{FEEDBACK_TABLE, INVITATIONS_TABLE, Store, TESTERS_TABLE};
use crate::error::AppError;
use crate::models::{
    Feedback, FeedbackPatch, FeedbackStatus, Invitation, InvitationPatch, InvitationWithTester,
    NewFeedback, NewInvitation, NewTester, Tester, TesterPatch, TesterStatus,
};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, header};
use serde::Serialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

const INVITATION_SELECT: &str = "*,beta_testers(id,full_name,email)";
const NEWEST_FIRST: &str = "created_at.desc";

/// Connection settings for [`RestStore`].
#[derive(Debug, Clone)]
pub struct RestStoreConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`.
    pub base_url: String,
    pub api_key: String,
    pub timeout_secs: u64,
}

pub struct RestStore {
    client: Client,
    config: RestStoreConfig,
}

type Query = Vec<(&'static str, String)>;

impl RestStore {
    pub fn new(config: RestStoreConfig) -> Result<Self, AppError> {
        let mut headers = header::HeaderMap::new();
        let key = header::HeaderValue::from_str(&config.api_key)
            .map_err(|_| AppError::config("Invalid backend API key"))?;
        let bearer = header::HeaderValue::from_str(&format!("Bearer {}", config.api_key))
            .map_err(|_| AppError::config("Invalid backend API key"))?;
        headers.insert("apikey", key);
        headers.insert(header::AUTHORIZATION, bearer);
        headers.insert(
            "Prefer",
            header::HeaderValue::from_static("return=representation"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn table_url(&self, table: &str) -> String {
        format!(
            "{}/rest/v1/{}",
            self.config.base_url.trim_end_matches('/'),
            table
        )
    }

    async fn select<T: DeserializeOwned>(&self, table: &str, query: &Query) -> Result<T, AppError> {
        let response = self
            .client
            .get(self.table_url(table))
            .query(query)
            .send()
            .await?;
        handle_response(response, table).await
    }

    async fn insert<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        table: &str,
        body: &B,
    ) -> Result<T, AppError> {
        let response = self
            .client
            .post(self.table_url(table))
            .json(body)
            .send()
            .await?;
        handle_response(response, table).await
    }

    async fn update<B: Serialize, T: DeserializeOwned>(
        &self,
        table: &str,
        query: &Query,
        body: &B,
    ) -> Result<Vec<T>, AppError> {
        let response = self
            .client
            .patch(self.table_url(table))
            .query(query)
            .json(body)
            .send()
            .await?;
        handle_response(response, table).await
    }
}

/// `id=in.(a,b,c)`
fn ids_filter(ids: &[Uuid]) -> (&'static str, String) {
    let ids: Vec<String> = ids.iter().map(Uuid::to_string).collect();
    ("id", format!("in.({})", ids.join(",")))
}

fn tester_query(status: Option<TesterStatus>) -> Query {
    let mut query = vec![("select", "*".to_string())];
    if let Some(status) = status {
        query.push(("status", format!("eq.{}", status)));
    }
    query.push(("order", NEWEST_FIRST.to_string()));
    query
}

fn feedback_query(statuses: Option<&[FeedbackStatus]>) -> Query {
    let mut query = vec![("select", "*".to_string())];
    if let Some(statuses) = statuses {
        let names: Vec<&str> = statuses.iter().map(FeedbackStatus::as_str).collect();
        query.push(("status", format!("in.({})", names.join(","))));
    }
    query.push(("order", NEWEST_FIRST.to_string()));
    query
}

fn invitation_query() -> Query {
    vec![
        ("select", INVITATION_SELECT.to_string()),
        ("order", NEWEST_FIRST.to_string()),
    ]
}

/// Decode a successful response or turn the backend's error body into an
/// [`AppError::Backend`] tagged with the table name.
async fn handle_response<T: DeserializeOwned>(response: Response, table: &str) -> Result<T, AppError> {
    let status = response.status();

    if status.is_success() {
        return response
            .json::<T>()
            .await
            .map_err(|e| AppError::internal(format!("Failed to parse response: {}", e)));
    }

    if status == StatusCode::UNAUTHORIZED {
        return Err(AppError::backend_full(
            "Backend rejected the API key",
            status.as_u16(),
            table,
        ));
    }

    let body = response.text().await.unwrap_or_default();
    // PostgREST errors look like {"code": "...", "message": "...", "details": ...}
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("error"))
                .and_then(|m| m.as_str().map(str::to_string))
        })
        .unwrap_or_else(|| format!("Request failed ({}): {}", status.as_u16(), body));

    Err(AppError::backend_full(message, status.as_u16(), table))
}

#[async_trait]
impl Store for RestStore {
    async fn list_testers(&self, status: Option<TesterStatus>) -> Result<Vec<Tester>, AppError> {
        self.select(TESTERS_TABLE, &tester_query(status)).await
    }

    async fn insert_tester(&self, tester: NewTester) -> Result<Tester, AppError> {
        let mut rows: Vec<Tester> = self.insert(TESTERS_TABLE, &[tester]).await?;
        rows.pop()
            .ok_or_else(|| AppError::backend("Insert returned no rows"))
    }

    async fn update_testers(&self, ids: &[Uuid], patch: &TesterPatch) -> Result<usize, AppError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let rows: Vec<Tester> = self
            .update(TESTERS_TABLE, &vec![ids_filter(ids)], patch)
            .await?;
        Ok(rows.len())
    }

    async fn list_feedback(
        &self,
        statuses: Option<&[FeedbackStatus]>,
    ) -> Result<Vec<Feedback>, AppError> {
        self.select(FEEDBACK_TABLE, &feedback_query(statuses)).await
    }

    async fn insert_feedback(&self, feedback: NewFeedback) -> Result<Feedback, AppError> {
        let mut rows: Vec<Feedback> = self.insert(FEEDBACK_TABLE, &[feedback]).await?;
        rows.pop()
            .ok_or_else(|| AppError::backend("Insert returned no rows"))
    }

    async fn update_feedback(
        &self,
        ids: &[Uuid],
        patch: &FeedbackPatch,
    ) -> Result<usize, AppError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let rows: Vec<Feedback> = self
            .update(FEEDBACK_TABLE, &vec![ids_filter(ids)], patch)
            .await?;
        Ok(rows.len())
    }

    async fn list_invitations(&self) -> Result<Vec<InvitationWithTester>, AppError> {
        self.select(INVITATIONS_TABLE, &invitation_query()).await
    }

    async fn insert_invitations(
        &self,
        invitations: Vec<NewInvitation>,
    ) -> Result<Vec<Invitation>, AppError> {
        if invitations.is_empty() {
            return Ok(Vec::new());
        }
        self.insert(INVITATIONS_TABLE, &invitations).await
    }

    async fn update_invitation(
        &self,
        id: Uuid,
        patch: &InvitationPatch,
    ) -> Result<Invitation, AppError> {
        let mut rows: Vec<Invitation> = self
            .update(INVITATIONS_TABLE, &vec![ids_filter(&[id])], patch)
            .await?;
        rows.pop()
            .ok_or_else(|| AppError::not_found_with_id("Invitation", id))
    }
}
