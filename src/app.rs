#![cfg(not(tarpaulin_include))]

//! Application state, routing and server startup.

use crate::config::{AdminPassword, Config};
use crate::error::AppError;
use crate::handlers::{feedback, importer, invitations, kanban, public, relay, testers};
use crate::invitations::Outbox;
use crate::login::{self, AdminCredentials, SessionStore};
use crate::mailer::{EmailTemplates, HttpMailer, MailSender, SmtpMailer, UnconfiguredMailer};
use crate::store::{JsonStore, RestStore, RestStoreConfig, Store};
use axum::{
    Router, middleware,
    routing::{delete, get, patch, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::services::{ServeDir, ServeFile};

/// Shared state behind every handler.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn Store>,
    pub mailer: Arc<dyn MailSender>,
    pub templates: EmailTemplates,
    pub sessions: SessionStore,
    /// `None` when no admin account is configured; every login then fails.
    pub admin: Option<AdminCredentials>,
}

impl AppState {
    /// Assemble state around an already-built store and mail transport
    ///
    /// # Arguments
    /// * `config` - Loaded configuration
    /// * `store` - Data store
    /// * `mailer` - Outbound mail transport
    ///
    /// # Returns
    /// * `Result<AppState, AppError>` - The state, or an error if the email
    ///   templates or admin credentials are invalid
    pub fn new(
        config: Config,
        store: Arc<dyn Store>,
        mailer: Arc<dyn MailSender>,
    ) -> Result<Self, AppError> {
        let templates = EmailTemplates::new(config.branding.clone())?;
        let admin = match &config.admin {
            Some(admin) => Some(match &admin.password {
                AdminPassword::Hash(hash) => AdminCredentials::from_hash(&admin.email, hash)?,
                AdminPassword::Plain(password) => {
                    AdminCredentials::from_password(&admin.email, password)?
                }
            }),
            None => {
                log::warn!("ADMIN_EMAIL is not set; the admin area is unreachable");
                None
            }
        };

        Ok(Self {
            config,
            store,
            mailer,
            templates,
            sessions: SessionStore::default(),
            admin,
        })
    }

    pub fn outbox(&self) -> Outbox<'_> {
        Outbox {
            store: self.store.as_ref(),
            mailer: self.mailer.as_ref(),
            templates: &self.templates,
        }
    }
}

/// Pick the hosted backend when configured, the JSON files otherwise.
pub fn build_store(config: &Config) -> Result<Arc<dyn Store>, AppError> {
    match &config.backend {
        Some(backend) => {
            log::info!("Using hosted backend at {}", backend.url);
            Ok(Arc::new(RestStore::new(RestStoreConfig {
                base_url: backend.url.clone(),
                api_key: backend.anon_key.clone(),
                timeout_secs: config.http_timeout_secs,
            })?))
        }
        None => Ok(Arc::new(JsonStore::open(&config.data_dir)?)),
    }
}

/// SMTP if credentials are set, else the HTTP mail endpoint, else nothing.
pub fn build_mailer(config: &Config) -> Result<Arc<dyn MailSender>, AppError> {
    if let Some(smtp) = &config.smtp {
        return Ok(Arc::new(SmtpMailer::new(smtp)?));
    }
    if let Some(endpoint) = &config.mail_endpoint {
        log::info!("Sending email through {}", endpoint);
        return Ok(Arc::new(HttpMailer::new(
            endpoint.clone(),
            config.http_timeout_secs,
        )?));
    }
    log::warn!("No mail transport configured; invitation emails will fail");
    Ok(Arc::new(UnconfiguredMailer))
}

fn admin_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/session", get(login::session_info))
        // testers dashboard
        .route("/testers", get(testers::list))
        .route("/testers/:id/status", patch(testers::set_status))
        .route("/testers/bulk-status", post(testers::bulk_status))
        .route("/testers/selection", delete(testers::clear_selection))
        .route("/testers/selection/toggle", post(testers::toggle))
        .route("/testers/selection/visible", post(testers::toggle_visible))
        .route("/testers/export", get(testers::export_csv))
        // feedback dashboard
        .route("/feedback", get(feedback::list))
        .route("/feedback/:id/status", patch(feedback::set_status))
        .route("/feedback/bulk-status", post(feedback::bulk_status))
        .route("/feedback/selection", delete(feedback::clear_selection))
        .route("/feedback/selection/toggle", post(feedback::toggle))
        .route("/feedback/selection/visible", post(feedback::toggle_visible))
        .route("/feedback/export", get(feedback::export_csv))
        // invitations
        .route("/invitations", get(invitations::overview))
        .route("/invitations/selection", delete(invitations::clear_selection))
        .route("/invitations/selection/toggle", post(invitations::toggle))
        .route("/invitations/selection/visible", post(invitations::toggle_visible))
        .route("/invitations/send", post(invitations::send))
        .route("/invitations/progress", get(invitations::progress))
        .route("/invitations/:id/resend", post(invitations::resend))
        .route("/invitations/platform-csv", post(invitations::platform_csv))
        .route("/invitations/feedback-requests", post(invitations::feedback_requests))
        // persisted kanban
        .route("/kanban", get(kanban::board))
        .route("/kanban/drag", post(kanban::start_drag).delete(kanban::end_drag))
        .route("/kanban/drop", post(kanban::drop_card))
        .route("/kanban/cards/:id/estimate", patch(kanban::set_estimate))
        .route("/kanban/export", get(kanban::export_xlsx))
        // CSV importer
        .route("/importer", get(importer::board).delete(importer::reset))
        .route("/importer/upload", post(importer::upload))
        .route("/importer/sample", get(importer::sample_csv))
        .route("/importer/drag", post(importer::start_drag).delete(importer::end_drag))
        .route("/importer/drop", post(importer::drop_card))
        .route("/importer/cards/:id/estimate", patch(importer::set_estimate))
        .route(
            "/importer/columns/:status",
            patch(importer::rename_column).delete(importer::delete_column),
        )
        .route("/importer/export", get(importer::export_xlsx))
}

/// Build the full router
///
/// Public endpoints sit at the top level, admin endpoints under
/// `/api/admin` behind [`login::require_auth`], and anything else falls
/// through to the static front-end.
pub fn router(state: Arc<AppState>) -> Router {
    let static_dir = &state.config.static_dir;
    let frontend = ServeDir::new(static_dir)
        .append_index_html_on_directories(true)
        .fallback(ServeFile::new(static_dir.join("index.html")));

    let admin = admin_routes().route_layer(middleware::from_fn_with_state(
        state.clone(),
        login::require_auth,
    ));

    let mut app = Router::new()
        .route("/api/test", get(public::health))
        .route("/api/testers", post(public::register))
        .route("/api/feedback", post(public::submit_feedback))
        .route("/api/admin/login", post(login::handle_login))
        .route("/api/admin/logout", post(login::handle_logout))
        .nest("/api/admin", admin);

    if state.config.smtp.is_some() {
        app = app.merge(relay::routes());
    }

    app.fallback_service(frontend).with_state(state)
}

/// Start the web server
///
/// # Arguments
/// * `config` - Loaded configuration
///
/// # Returns
/// * `Result<(), AppError>` - Returns when the server stops, or an error if
///   startup fails
pub async fn run(config: Config) -> Result<(), AppError> {
    let store = build_store(&config)?;
    let mailer = build_mailer(&config)?;
    let bind_addr = config.bind_addr.clone();
    let state = Arc::new(AppState::new(config, store, mailer)?);

    let app = router(state);

    let listener = TcpListener::bind(&bind_addr).await?;
    log::info!("Listening on http://{}", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}
