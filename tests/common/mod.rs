#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use beta_portal::app::{AppState, router};
use beta_portal::config::Config;
use beta_portal::error::AppError;
use beta_portal::mailer::{MailSender, OutgoingEmail};
use beta_portal::models::{
    Feedback, FeedbackPatch, FeedbackStatus, Invitation, InvitationPatch, InvitationWithTester,
    NewFeedback, NewInvitation, NewTester, Tester, TesterPatch, TesterStatus,
};
use beta_portal::store::{JsonStore, Store};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;
use uuid::Uuid;

pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const ADMIN_PASSWORD: &str = "correct horse";

/// In-memory store that counts update calls.
pub struct CountingStore {
    inner: JsonStore,
    updates: AtomicUsize,
}

impl CountingStore {
    pub fn new() -> Self {
        Self {
            inner: JsonStore::in_memory(),
            updates: AtomicUsize::new(0),
        }
    }

    pub fn updates(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Store for CountingStore {
    async fn list_testers(&self, status: Option<TesterStatus>) -> Result<Vec<Tester>, AppError> {
        self.inner.list_testers(status).await
    }

    async fn insert_tester(&self, tester: NewTester) -> Result<Tester, AppError> {
        self.inner.insert_tester(tester).await
    }

    async fn update_testers(&self, ids: &[Uuid], patch: &TesterPatch) -> Result<usize, AppError> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        self.inner.update_testers(ids, patch).await
    }

    async fn list_feedback(
        &self,
        statuses: Option<&[FeedbackStatus]>,
    ) -> Result<Vec<Feedback>, AppError> {
        self.inner.list_feedback(statuses).await
    }

    async fn insert_feedback(&self, feedback: NewFeedback) -> Result<Feedback, AppError> {
        self.inner.insert_feedback(feedback).await
    }

    async fn update_feedback(
        &self,
        ids: &[Uuid],
        patch: &FeedbackPatch,
    ) -> Result<usize, AppError> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        self.inner.update_feedback(ids, patch).await
    }

    async fn list_invitations(&self) -> Result<Vec<InvitationWithTester>, AppError> {
        self.inner.list_invitations().await
    }

    async fn insert_invitations(
        &self,
        invitations: Vec<NewInvitation>,
    ) -> Result<Vec<Invitation>, AppError> {
        self.inner.insert_invitations(invitations).await
    }

    async fn update_invitation(
        &self,
        id: Uuid,
        patch: &InvitationPatch,
    ) -> Result<Invitation, AppError> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        self.inner.update_invitation(id, patch).await
    }
}

/// Records every email; fails for the listed recipients.
#[derive(Default)]
pub struct FakeMailer {
    pub fail_for: Vec<String>,
    pub sent: Mutex<Vec<OutgoingEmail>>,
}

impl FakeMailer {
    pub fn failing_for(addresses: &[&str]) -> Self {
        Self {
            fail_for: addresses.iter().map(|a| a.to_string()).collect(),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn recipients(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|e| e.to.clone()).collect()
    }
}

#[async_trait]
impl MailSender for FakeMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<String, AppError> {
        self.sent.lock().unwrap().push(email.clone());
        if self.fail_for.contains(&email.to) {
            return Err(AppError::mail("mailbox unavailable"));
        }
        Ok(format!("<{}@test>", self.sent.lock().unwrap().len()))
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<CountingStore>,
    pub mailer: Arc<FakeMailer>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with(&[], FakeMailer::default())
    }

    /// Build the app with extra environment variables on top of the admin
    /// account.
    pub fn with(vars: &[(&str, &str)], mailer: FakeMailer) -> Self {
        let mut env: HashMap<String, String> = HashMap::from([
            ("ADMIN_EMAIL".to_string(), ADMIN_EMAIL.to_string()),
            ("ADMIN_PASSWORD".to_string(), ADMIN_PASSWORD.to_string()),
            ("PUBLIC_URL".to_string(), "https://beta.example.com".to_string()),
            ("STATIC_DIR".to_string(), "does-not-exist".to_string()),
        ]);
        for (key, value) in vars {
            env.insert(key.to_string(), value.to_string());
        }
        let config = Config::from_lookup(|key| env.get(key).cloned()).unwrap();

        let store = Arc::new(CountingStore::new());
        let mailer = Arc::new(mailer);
        let state = AppState::new(config, store.clone(), mailer.clone()).unwrap();
        Self {
            router: router(Arc::new(state)),
            store,
            mailer,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> (StatusCode, Value) {
        self.send(request("GET", uri, cookie, None)).await
    }

    pub async fn post(&self, uri: &str, cookie: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send(request("POST", uri, cookie, Some(body))).await
    }

    /// Sign in as the configured admin and return the `Cookie` header value.
    pub async fn login(&self) -> String {
        let response = self
            .router
            .clone()
            .oneshot(request(
                "POST",
                "/api/admin/login",
                None,
                Some(serde_json::json!({"email": ADMIN_EMAIL, "password": ADMIN_PASSWORD})),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
        set_cookie.split(';').next().unwrap().to_string()
    }

    /// Register an Android tester through the public form.
    pub async fn register(&self, name: &str, email: &str) -> Uuid {
        let (status, body) = self
            .post(
                "/api/testers",
                None,
                serde_json::json!({
                    "fullName": name,
                    "email": email,
                    "deviceType": "android",
                    "deviceModel": "Pixel 8",
                    "experienceLevel": "intermediate",
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["tester"]["id"].as_str().unwrap().parse().unwrap()
    }
}

pub fn request(method: &str, uri: &str, cookie: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}
