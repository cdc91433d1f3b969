//! Beta invitations and feedback requests.
//!
//! Emails go out one at a time through a [`MailSender`]; a
//! [`ProgressTracker`] is updated after every send so the admin page can
//! poll sent/failed counts while a batch is still running. Outcomes are
//! recorded per tester id and only testers whose own email went through are
//! given an invitation row and moved to `invited`.

use crate::dashboard::{Page, paginate};
use crate::downloader::{platform_csv, platform_file_name};
use crate::error::AppError;
use crate::mailer::{EmailTemplates, MailSender};
use crate::models::{
    InvitationPatch, InvitationWithTester, NewInvitation, Platform, Tester, TesterPatch,
    TesterStatus, humanize,
};
use crate::store::Store;
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError};
use uuid::Uuid;

/// Everything needed to send portal email.
#[derive(Clone, Copy)]
pub struct Outbox<'a> {
    pub store: &'a dyn Store,
    pub mailer: &'a dyn MailSender,
    pub templates: &'a EmailTemplates,
}

/// Sent/failed counters for a running batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchProgress {
    pub total: usize,
    pub sent: usize,
    pub failed: usize,
}

/// Progress of the batch currently running for one admin session.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    state: Mutex<Option<BatchProgress>>,
}

impl ProgressTracker {
    fn update(&self, f: impl FnOnce(&mut Option<BatchProgress>)) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state);
    }

    /// Begin a batch of `total` emails.
    ///
    /// Only one batch may run per session at a time. The returned guard
    /// clears the tracker when dropped.
    pub fn start(&self, total: usize) -> Result<BatchGuard<'_>, AppError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.is_some() {
            return Err(AppError::invalid_input(
                "An email batch is already running. Please wait for it to finish.",
            ));
        }
        *state = Some(BatchProgress {
            total,
            ..BatchProgress::default()
        });
        Ok(BatchGuard(self))
    }

    pub fn record(&self, delivered: bool) {
        self.update(|s| {
            if let Some(progress) = s {
                if delivered {
                    progress.sent += 1;
                } else {
                    progress.failed += 1;
                }
            }
        });
    }

    fn finish(&self) {
        self.update(|s| *s = None);
    }

    /// `None` when no batch is running.
    pub fn snapshot(&self) -> Option<BatchProgress> {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Clears the tracker when a batch ends, early returns included.
#[must_use]
pub struct BatchGuard<'a>(&'a ProgressTracker);

impl Drop for BatchGuard<'_> {
    fn drop(&mut self) {
        self.0.finish();
    }
}

/// What happened to each recipient of a batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    pub delivered: Vec<Uuid>,
    pub failed: Vec<Uuid>,
    /// `true` when every email went through.
    pub success: bool,
    pub message: String,
}

/// Invitations page filters and pagination.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InvitationQuery {
    pub platform: Platform,
    pub tester_search: String,
    pub invitation_search: String,
    pub tester_page: usize,
    pub invitation_page: usize,
}

impl Default for InvitationQuery {
    fn default() -> Self {
        Self {
            platform: Platform::GooglePlay,
            tester_search: String::new(),
            invitation_search: String::new(),
            tester_page: 1,
            invitation_page: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InvitationsOverview {
    pub platform: Platform,
    pub testers: Page<Tester>,
    pub invitations: Page<InvitationWithTester>,
}

/// Approved testers whose device matches `platform` and whose name or email
/// contains `search`.
pub fn approved_for_platform(testers: &[Tester], platform: Platform, search: &str) -> Vec<Tester> {
    testers
        .iter()
        .filter(|t| t.status == TesterStatus::Approved)
        .filter(|t| t.device_type == platform.device_type())
        .filter(|t| t.matches_search(search))
        .cloned()
        .collect()
}

/// Invitations whose tester matches `search`. Rows without a joined tester
/// are never shown.
pub fn filter_invitations(
    invitations: &[InvitationWithTester],
    search: &str,
) -> Vec<InvitationWithTester> {
    invitations
        .iter()
        .filter(|i| i.matches_search(search))
        .cloned()
        .collect()
}

/// Approved testers and sent invitations, each list paginated on its own.
pub async fn overview(
    store: &dyn Store,
    query: &InvitationQuery,
) -> Result<InvitationsOverview, AppError> {
    let testers = store.list_testers(Some(TesterStatus::Approved)).await?;
    let invitations = store.list_invitations().await?;

    let testers = approved_for_platform(&testers, query.platform, &query.tester_search);
    let invitations = filter_invitations(&invitations, &query.invitation_search);
    Ok(InvitationsOverview {
        platform: query.platform,
        testers: paginate(&testers, query.tester_page),
        invitations: paginate(&invitations, query.invitation_page),
    })
}

/// Email the selected testers a beta invitation
///
/// Selected ids are resolved among approved testers and mailed sequentially.
/// Afterwards one invitation row (status `sent`) is inserted per delivered
/// email and exactly those testers are moved to `invited`.
///
/// # Arguments
/// * `outbox` - Store, mail transport and templates
/// * `progress` - Tracker updated after every email
/// * `platform` - Store the testers are invited through
/// * `app_id` - Package name or TestFlight code used to build the link
/// * `selected` - Tester ids the admin selected
///
/// # Returns
/// * `Result<BatchReport, AppError>` - Per-tester outcomes and the summary
///   message, or an error if a precondition fails or the store rejects the
///   bookkeeping writes
pub async fn send_invitations(
    outbox: Outbox<'_>,
    progress: &ProgressTracker,
    platform: Platform,
    app_id: &str,
    selected: &[Uuid],
) -> Result<BatchReport, AppError> {
    if app_id.trim().is_empty() {
        return Err(AppError::invalid_input_field(
            "Please enter the app ID first.",
            "app_id",
        ));
    }
    if selected.is_empty() {
        return Err(AppError::invalid_input(
            "Please select at least one tester.",
        ));
    }

    let approved = outbox.store.list_testers(Some(TesterStatus::Approved)).await?;
    let recipients: Vec<&Tester> = approved
        .iter()
        .filter(|t| selected.contains(&t.id))
        .collect();
    let link = platform.invitation_link(app_id);

    let _batch = progress.start(selected.len())?;

    let mut report = BatchReport::default();
    for tester in recipients {
        let delivered = match outbox.templates.invitation(
            &tester.email,
            &tester.full_name,
            platform,
            &link,
            false,
        ) {
            Ok(email) => match outbox.mailer.send(&email).await {
                Ok(message_id) => {
                    log::info!("Invitation sent to {} ({})", tester.email, message_id);
                    true
                }
                Err(e) => {
                    log::warn!("Invitation to {} failed: {}", tester.email, e);
                    false
                }
            },
            Err(e) => {
                log::error!("Could not render invitation for {}: {}", tester.email, e);
                false
            }
        };

        if delivered {
            report.delivered.push(tester.id);
        } else {
            report.failed.push(tester.id);
        }
        progress.record(delivered);
    }

    if !report.delivered.is_empty() {
        let rows = report
            .delivered
            .iter()
            .map(|id| NewInvitation::sent(*id, platform, link.clone()))
            .collect();
        outbox.store.insert_invitations(rows).await?;
        outbox
            .store
            .update_testers(&report.delivered, &TesterPatch::status(TesterStatus::Invited))
            .await?;
    }

    report.success = report.failed.is_empty();
    report.message = if report.success {
        format!(
            "Successfully sent {} invitation email(s) to testers for {}.",
            report.delivered.len(),
            humanize(platform.as_str())
        )
    } else {
        format!(
            "Sent {} invitation(s), but failed to send {} invitation(s). Please try again for the failed ones.",
            report.delivered.len(),
            report.failed.len()
        )
    };
    Ok(report)
}

/// Send an invitation again with the "(Reminder)" subject
///
/// On delivery the invitation's `invitation_sent_at` is refreshed and its
/// status goes back to `sent`.
///
/// # Returns
/// * `Result<String, AppError>` - Confirmation message naming the tester
pub async fn resend_invitation(outbox: Outbox<'_>, invitation_id: Uuid) -> Result<String, AppError> {
    let invitation = outbox
        .store
        .list_invitations()
        .await?
        .into_iter()
        .find(|i| i.invitation.id == invitation_id)
        .ok_or_else(|| AppError::not_found_with_id("Invitation", invitation_id))?
        .invitation;

    let tester = outbox
        .store
        .list_testers(None)
        .await?
        .into_iter()
        .find(|t| t.id == invitation.tester_id)
        .ok_or_else(|| AppError::not_found_with_id("Tester", invitation.tester_id))?;

    let email = outbox.templates.invitation(
        &tester.email,
        &tester.full_name,
        invitation.platform,
        &invitation.invitation_link,
        true,
    )?;
    if let Err(e) = outbox.mailer.send(&email).await {
        log::warn!("Reminder to {} failed: {}", tester.email, e);
        return Err(AppError::mail("Failed to resend invitation. Please try again."));
    }

    outbox
        .store
        .update_invitation(invitation.id, &InvitationPatch::resent())
        .await?;
    Ok(format!(
        "Successfully resent invitation to {}.",
        tester.full_name
    ))
}

/// Ask every invited tester to fill in the feedback form at
/// `<public_url>/feedback`.
pub async fn send_feedback_requests(
    outbox: Outbox<'_>,
    progress: &ProgressTracker,
    public_url: &str,
) -> Result<BatchReport, AppError> {
    let testers = outbox.store.list_testers(Some(TesterStatus::Invited)).await?;
    if testers.is_empty() {
        return Err(AppError::invalid_input("No registered testers found."));
    }
    let feedback_url = format!("{}/feedback", public_url.trim_end_matches('/'));

    let _batch = progress.start(testers.len())?;

    let mut report = BatchReport::default();
    for tester in &testers {
        let result = match outbox
            .templates
            .feedback_request(&tester.email, &tester.full_name, &feedback_url)
        {
            Ok(email) => outbox.mailer.send(&email).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(_) => {
                log::info!("Feedback request sent to {}", tester.email);
                report.delivered.push(tester.id);
                progress.record(true);
            }
            Err(e) => {
                log::warn!("Feedback request to {} failed: {}", tester.email, e);
                report.failed.push(tester.id);
                progress.record(false);
            }
        }
    }

    report.success = report.failed.is_empty();
    report.message = if report.success {
        format!(
            "Successfully sent {} feedback invitation email(s) to all registered testers.",
            report.delivered.len()
        )
    } else {
        format!(
            "Sent {} feedback invitation(s), but failed to send {} invitation(s). Please try again for the failed ones.",
            report.delivered.len(),
            report.failed.len()
        )
    };
    Ok(report)
}

/// A platform tester list ready for download.
#[derive(Debug, Clone, PartialEq)]
pub struct PlatformExport {
    pub file_name: String,
    pub csv: String,
    pub message: String,
}

/// Build the platform upload CSV for the selected approved testers and mark
/// them `approved`.
pub async fn export_platform_csv(
    store: &dyn Store,
    platform: Platform,
    selected: &[Uuid],
) -> Result<PlatformExport, AppError> {
    if selected.is_empty() {
        return Err(AppError::invalid_input(
            "Please select at least one tester.",
        ));
    }
    let approved = store.list_testers(Some(TesterStatus::Approved)).await?;
    let chosen: Vec<Tester> = approved
        .into_iter()
        .filter(|t| selected.contains(&t.id))
        .collect();

    let csv = platform_csv(platform, &chosen);
    store
        .update_testers(selected, &TesterPatch::status(TesterStatus::Approved))
        .await?;

    Ok(PlatformExport {
        file_name: platform_file_name(platform),
        csv,
        message: format!(
            "Successfully generated CSV for {} tester(s) for {}.",
            chosen.len(),
            humanize(platform.as_str())
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailer::{Branding, OutgoingEmail};
    use crate::models::{DeviceType, ExperienceLevel, InvitationStatus, NewTester};
    use crate::store::JsonStore;
    use async_trait::async_trait;

    /// Fails for the listed addresses, records everything it is asked to send.
    #[derive(Default)]
    struct ScriptedMailer {
        fail_for: Vec<String>,
        sent: Mutex<Vec<OutgoingEmail>>,
    }

    #[async_trait]
    impl MailSender for ScriptedMailer {
        async fn send(&self, email: &OutgoingEmail) -> Result<String, AppError> {
            self.sent.lock().unwrap().push(email.clone());
            if self.fail_for.contains(&email.to) {
                Err(AppError::mail("relay refused"))
            } else {
                Ok(format!("<{}>", email.to))
            }
        }
    }

    async fn add_tester(store: &JsonStore, name: &str, email: &str, device: DeviceType) -> Tester {
        let tester = store
            .insert_tester(NewTester {
                full_name: name.to_string(),
                email: email.to_string(),
                device_type: device,
                device_model: "Phone".to_string(),
                experience_level: ExperienceLevel::Beginner,
                status: TesterStatus::Pending,
            })
            .await
            .unwrap();
        store
            .update_testers(&[tester.id], &TesterPatch::status(TesterStatus::Approved))
            .await
            .unwrap();
        tester
    }

    fn templates() -> EmailTemplates {
        EmailTemplates::new(Branding::default()).unwrap()
    }

    #[tokio::test]
    async fn test_preconditions() {
        let store = JsonStore::in_memory();
        let mailer = ScriptedMailer::default();
        let templates = templates();
        let outbox = Outbox { store: &store, mailer: &mailer, templates: &templates };
        let progress = ProgressTracker::default();

        let err = send_invitations(outbox, &progress, Platform::GooglePlay, "  ", &[Uuid::new_v4()])
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), "Please enter the app ID first.");

        let err = send_invitations(outbox, &progress, Platform::GooglePlay, "com.app", &[])
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), "Please select at least one tester.");
        assert!(mailer.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_only_delivered_testers_are_invited() {
        let store = JsonStore::in_memory();
        let a = add_tester(&store, "Ann", "ann@gmail.com", DeviceType::Android).await;
        let b = add_tester(&store, "Bob", "bob@gmail.com", DeviceType::Android).await;
        let mailer = ScriptedMailer {
            fail_for: vec!["ann@gmail.com".to_string()],
            ..ScriptedMailer::default()
        };
        let templates = templates();
        let outbox = Outbox { store: &store, mailer: &mailer, templates: &templates };
        let progress = ProgressTracker::default();

        let report = send_invitations(outbox, &progress, Platform::GooglePlay, "com.app", &[a.id, b.id])
            .await
            .unwrap();
        assert_eq!(report.delivered, vec![b.id]);
        assert_eq!(report.failed, vec![a.id]);
        assert_eq!(
            report.message,
            "Sent 1 invitation(s), but failed to send 1 invitation(s). Please try again for the failed ones."
        );
        assert!(progress.snapshot().is_none());

        let testers = store.list_testers(None).await.unwrap();
        let status = |id: Uuid| testers.iter().find(|t| t.id == id).unwrap().status;
        assert_eq!(status(a.id), TesterStatus::Approved);
        assert_eq!(status(b.id), TesterStatus::Invited);

        let invitations = store.list_invitations().await.unwrap();
        assert_eq!(invitations.len(), 1);
        assert_eq!(invitations[0].invitation.tester_id, b.id);
        assert_eq!(
            invitations[0].invitation.invitation_link,
            "https://play.google.com/apps/testing/com.app"
        );
    }

    #[tokio::test]
    async fn test_full_success_message_and_resend() {
        let store = JsonStore::in_memory();
        let a = add_tester(&store, "Ann Lee", "ann@icloud.com", DeviceType::Ios).await;
        let mailer = ScriptedMailer::default();
        let templates = templates();
        let outbox = Outbox { store: &store, mailer: &mailer, templates: &templates };
        let progress = ProgressTracker::default();

        let report = send_invitations(outbox, &progress, Platform::AppStore, "AbC123", &[a.id])
            .await
            .unwrap();
        assert!(report.success);
        assert_eq!(
            report.message,
            "Successfully sent 1 invitation email(s) to testers for app store."
        );

        let invitation = store.list_invitations().await.unwrap().remove(0).invitation;
        let message = resend_invitation(outbox, invitation.id).await.unwrap();
        assert_eq!(message, "Successfully resent invitation to Ann Lee.");

        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert!(sent[1].subject.ends_with("(Reminder)"));
        let refreshed = store.list_invitations().await.unwrap().remove(0).invitation;
        assert_eq!(refreshed.status, InvitationStatus::Sent);
        assert!(refreshed.invitation_sent_at >= invitation.invitation_sent_at);
    }

    #[tokio::test]
    async fn test_feedback_requests_need_invited_testers() {
        let store = JsonStore::in_memory();
        add_tester(&store, "Ann", "ann@gmail.com", DeviceType::Android).await;
        let mailer = ScriptedMailer::default();
        let templates = templates();
        let outbox = Outbox { store: &store, mailer: &mailer, templates: &templates };
        let progress = ProgressTracker::default();

        let err = send_feedback_requests(outbox, &progress, "https://beta.example.com")
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), "No registered testers found.");
    }

    #[tokio::test]
    async fn test_feedback_requests_link_to_form() {
        let store = JsonStore::in_memory();
        let a = add_tester(&store, "Ann", "ann@gmail.com", DeviceType::Android).await;
        store
            .update_testers(&[a.id], &TesterPatch::status(TesterStatus::Invited))
            .await
            .unwrap();
        let mailer = ScriptedMailer::default();
        let templates = templates();
        let outbox = Outbox { store: &store, mailer: &mailer, templates: &templates };
        let progress = ProgressTracker::default();

        let report = send_feedback_requests(outbox, &progress, "https://beta.example.com/")
            .await
            .unwrap();
        assert_eq!(report.delivered, vec![a.id]);
        let sent = mailer.sent.lock().unwrap();
        assert!(sent[0].html.contains("https://beta.example.com/feedback"));
    }

    #[tokio::test]
    async fn test_platform_export_marks_approved() {
        let store = JsonStore::in_memory();
        let a = add_tester(&store, "Ann Marie Lee", "ann@icloud.com", DeviceType::Ios).await;
        let export = export_platform_csv(&store, Platform::AppStore, &[a.id]).await.unwrap();
        assert_eq!(export.file_name, "app_store-testers.csv");
        assert_eq!(
            export.csv,
            "Email,First Name,Last Name\nann@icloud.com,Ann,Marie Lee"
        );
        assert_eq!(
            export.message,
            "Successfully generated CSV for 1 tester(s) for app store."
        );
    }

    #[test]
    fn test_progress_counts() {
        let progress = ProgressTracker::default();
        progress.record(true);
        assert!(progress.snapshot().is_none());
        let batch = progress.start(3).unwrap();
        progress.record(true);
        progress.record(false);
        assert_eq!(
            progress.snapshot(),
            Some(BatchProgress { total: 3, sent: 1, failed: 1 })
        );
        drop(batch);
        assert!(progress.snapshot().is_none());
    }

    #[test]
    fn test_second_batch_rejected_while_running() {
        let progress = ProgressTracker::default();
        let batch = progress.start(2).unwrap();
        progress.record(true);

        let err = progress.start(5).err().unwrap();
        assert_eq!(
            err.user_message(),
            "An email batch is already running. Please wait for it to finish."
        );
        // The running batch keeps its counters.
        assert_eq!(
            progress.snapshot(),
            Some(BatchProgress { total: 2, sent: 1, failed: 0 })
        );

        drop(batch);
        assert!(progress.start(5).is_ok());
    }

    #[tokio::test]
    async fn test_send_rejected_while_batch_running() {
        let store = JsonStore::in_memory();
        let mailer = ScriptedMailer::default();
        let templates = templates();
        let tester = add_tester(&store, "Jane Doe", "jane@gmail.com", DeviceType::Android).await;
        let progress = ProgressTracker::default();
        let _running = progress.start(1).unwrap();

        let outbox = Outbox { store: &store, mailer: &mailer, templates: &templates };
        let err = send_invitations(outbox, &progress, Platform::GooglePlay, "com.app", &[tester.id])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput { .. }));
        assert!(mailer.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn test_platform_filter() {
        let now = chrono::Utc::now();
        let make = |email: &str, device, status| Tester {
            id: Uuid::new_v4(),
            email: email.to_string(),
            full_name: "Some One".to_string(),
            device_type: device,
            device_model: "X".to_string(),
            experience_level: ExperienceLevel::Expert,
            status,
            created_at: now,
            updated_at: now,
        };
        let testers = vec![
            make("a@gmail.com", DeviceType::Android, TesterStatus::Approved),
            make("b@icloud.com", DeviceType::Ios, TesterStatus::Approved),
            make("c@gmail.com", DeviceType::Android, TesterStatus::Pending),
        ];
        let android = approved_for_platform(&testers, Platform::GooglePlay, "");
        assert_eq!(android.len(), 1);
        assert_eq!(android[0].email, "a@gmail.com");
        assert!(approved_for_platform(&testers, Platform::AppStore, "zzz").is_empty());
    }
}
