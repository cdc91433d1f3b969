//! File-backed store.
//!
//! Each table lives in `<data dir>/<table>.json` as a pretty-printed array,
//! following the `database/` directory layout the web app has always used.
//! Writes rewrite the whole table file. A table changes in memory only once
//! its file has been written.

use super::{FEEDBACK_TABLE, INVITATIONS_TABLE, Store, TESTERS_TABLE};
use crate::error::AppError;
use crate::models::{
    Feedback, FeedbackPatch, FeedbackStatus, Invitation, InvitationPatch, InvitationWithTester,
    NewFeedback, NewInvitation, NewTester, Tester, TesterPatch, TesterStatus, TesterSummary,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::{self, create_dir_all};
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

#[derive(Debug, Default)]
struct Tables {
    testers: Vec<Tester>,
    feedback: Vec<Feedback>,
    invitations: Vec<Invitation>,
}

/// JSON-file store, or a purely in-memory one when opened without a directory.
#[derive(Debug)]
pub struct JsonStore {
    dir: Option<PathBuf>,
    tables: RwLock<Tables>,
}

impl JsonStore {
    /// Open (and create if needed) a store rooted at `dir`
    ///
    /// Missing table files are treated as empty tables and created on the
    /// first write.
    ///
    /// # Arguments
    /// * `dir` - Directory holding the table files
    ///
    /// # Returns
    /// * `Result<JsonStore, AppError>` - The loaded store, or a storage error
    ///   if the directory cannot be created or a table file cannot be parsed
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, AppError> {
        let dir = dir.as_ref().to_path_buf();
        if !dir.exists() {
            create_dir_all(&dir)?;
        }

        let tables = Tables {
            testers: read_table(&dir, TESTERS_TABLE)?,
            feedback: read_table(&dir, FEEDBACK_TABLE)?,
            invitations: read_table(&dir, INVITATIONS_TABLE)?,
        };
        log::info!(
            "Opened JSON store at {} ({} testers, {} feedback, {} invitations)",
            dir.display(),
            tables.testers.len(),
            tables.feedback.len(),
            tables.invitations.len()
        );

        Ok(Self {
            dir: Some(dir),
            tables: RwLock::new(tables),
        })
    }

    /// A store that never touches the filesystem.
    pub fn in_memory() -> Self {
        Self {
            dir: None,
            tables: RwLock::new(Tables::default()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, AppError> {
        self.tables
            .read()
            .map_err(|_| AppError::internal("JSON store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, AppError> {
        self.tables
            .write()
            .map_err(|_| AppError::internal("JSON store lock poisoned"))
    }

    fn persist<T: Serialize>(&self, table: &str, rows: &[T]) -> Result<(), AppError> {
        let Some(dir) = &self.dir else {
            return Ok(());
        };
        let json = serde_json::to_string_pretty(rows)?;
        fs::write(table_path(dir, table), json).map_err(|e| {
            AppError::storage(format!("Failed to write {} table: {}", table, e))
        })
    }

    /// Write `next` to disk, then make it the live table.
    fn commit<T: Serialize>(
        &self,
        table: &str,
        live: &mut Vec<T>,
        next: Vec<T>,
    ) -> Result<(), AppError> {
        self.persist(table, &next)?;
        *live = next;
        Ok(())
    }
}

fn table_path(dir: &Path, table: &str) -> PathBuf {
    dir.join(format!("{}.json", table))
}

fn read_table<T: DeserializeOwned>(dir: &Path, table: &str) -> Result<Vec<T>, AppError> {
    let path = table_path(dir, table);
    if !path.exists() {
        return Ok(Vec::new());
    }
    let contents = fs::read_to_string(&path)?;
    if contents.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(&contents)
        .map_err(|e| AppError::storage(format!("Failed to parse {} table: {}", table, e)))
}

/// Newest first; rows with equal timestamps keep insertion order reversed.
fn newest_first<T: Clone>(rows: &[T], created_at: impl Fn(&T) -> DateTime<Utc>) -> Vec<T> {
    let mut sorted: Vec<T> = rows.iter().rev().cloned().collect();
    sorted.sort_by_key(|row| std::cmp::Reverse(created_at(row)));
    sorted
}

#[async_trait]
impl Store for JsonStore {
    async fn list_testers(&self, status: Option<TesterStatus>) -> Result<Vec<Tester>, AppError> {
        let tables = self.read()?;
        let rows = newest_first(&tables.testers, |t| t.created_at);
        Ok(rows
            .into_iter()
            .filter(|t| status.is_none_or(|s| t.status == s))
            .collect())
    }

    async fn insert_tester(&self, tester: NewTester) -> Result<Tester, AppError> {
        let tester = tester.into_tester(Uuid::new_v4(), Utc::now());
        let mut tables = self.write()?;
        let mut next = tables.testers.clone();
        next.push(tester.clone());
        self.commit(TESTERS_TABLE, &mut tables.testers, next)?;
        Ok(tester)
    }

    async fn update_testers(&self, ids: &[Uuid], patch: &TesterPatch) -> Result<usize, AppError> {
        let mut tables = self.write()?;
        let mut next = tables.testers.clone();
        let mut updated = 0;
        for tester in next.iter_mut().filter(|t| ids.contains(&t.id)) {
            patch.apply(tester);
            updated += 1;
        }
        if updated > 0 {
            self.commit(TESTERS_TABLE, &mut tables.testers, next)?;
        }
        Ok(updated)
    }

    async fn list_feedback(
        &self,
        statuses: Option<&[FeedbackStatus]>,
    ) -> Result<Vec<Feedback>, AppError> {
        let tables = self.read()?;
        let rows = newest_first(&tables.feedback, |f| f.created_at);
        Ok(rows
            .into_iter()
            .filter(|f| statuses.is_none_or(|s| s.contains(&f.status)))
            .collect())
    }

    async fn insert_feedback(&self, feedback: NewFeedback) -> Result<Feedback, AppError> {
        let feedback = feedback.into_feedback(Uuid::new_v4(), Utc::now());
        let mut tables = self.write()?;
        let mut next = tables.feedback.clone();
        next.push(feedback.clone());
        self.commit(FEEDBACK_TABLE, &mut tables.feedback, next)?;
        Ok(feedback)
    }

    async fn update_feedback(
        &self,
        ids: &[Uuid],
        patch: &FeedbackPatch,
    ) -> Result<usize, AppError> {
        let mut tables = self.write()?;
        let mut next = tables.feedback.clone();
        let mut updated = 0;
        for feedback in next.iter_mut().filter(|f| ids.contains(&f.id)) {
            patch.apply(feedback);
            updated += 1;
        }
        if updated > 0 {
            self.commit(FEEDBACK_TABLE, &mut tables.feedback, next)?;
        }
        Ok(updated)
    }

    async fn list_invitations(&self) -> Result<Vec<InvitationWithTester>, AppError> {
        let tables = self.read()?;
        let rows = newest_first(&tables.invitations, |i| i.created_at);
        Ok(rows
            .into_iter()
            .map(|invitation| {
                let beta_testers = tables
                    .testers
                    .iter()
                    .find(|t| t.id == invitation.tester_id)
                    .map(TesterSummary::from);
                InvitationWithTester {
                    invitation,
                    beta_testers,
                }
            })
            .collect())
    }

    async fn insert_invitations(
        &self,
        invitations: Vec<NewInvitation>,
    ) -> Result<Vec<Invitation>, AppError> {
        let now = Utc::now();
        let inserted: Vec<Invitation> = invitations
            .into_iter()
            .map(|new| new.into_invitation(Uuid::new_v4(), now))
            .collect();
        if inserted.is_empty() {
            return Ok(inserted);
        }
        let mut tables = self.write()?;
        let mut next = tables.invitations.clone();
        next.extend(inserted.iter().cloned());
        self.commit(INVITATIONS_TABLE, &mut tables.invitations, next)?;
        Ok(inserted)
    }

    async fn update_invitation(
        &self,
        id: Uuid,
        patch: &InvitationPatch,
    ) -> Result<Invitation, AppError> {
        let mut tables = self.write()?;
        let mut next = tables.invitations.clone();
        let invitation = next
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| AppError::not_found_with_id("Invitation", id))?;
        patch.apply(invitation);
        let updated = invitation.clone();
        self.commit(INVITATIONS_TABLE, &mut tables.invitations, next)?;
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DeviceType, ExperienceLevel, FeedbackType, InvitationStatus, Platform};

    fn new_tester(email: &str) -> NewTester {
        NewTester {
            email: email.into(),
            full_name: "Jane Doe".into(),
            device_type: DeviceType::Android,
            device_model: "Pixel 8".into(),
            experience_level: ExperienceLevel::Beginner,
            status: TesterStatus::Pending,
        }
    }

    #[tokio::test]
    async fn test_listing_is_newest_first() {
        let store = JsonStore::in_memory();
        let first = store.insert_tester(new_tester("a@example.com")).await.unwrap();
        let second = store.insert_tester(new_tester("b@example.com")).await.unwrap();

        let rows = store.list_testers(None).await.unwrap();
        assert_eq!(rows[0].id, second.id);
        assert_eq!(rows[1].id, first.id);
    }

    #[tokio::test]
    async fn test_update_counts_only_known_ids() {
        let store = JsonStore::in_memory();
        let tester = store.insert_tester(new_tester("a@example.com")).await.unwrap();

        let updated = store
            .update_testers(
                &[tester.id, Uuid::new_v4()],
                &TesterPatch::status(TesterStatus::Approved),
            )
            .await
            .unwrap();
        assert_eq!(updated, 1);
        let approved = store.list_testers(Some(TesterStatus::Approved)).await.unwrap();
        assert_eq!(approved.len(), 1);
    }

    #[tokio::test]
    async fn test_tables_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = JsonStore::open(dir.path()).unwrap();
            store.insert_tester(new_tester("a@example.com")).await.unwrap();
            store
                .insert_feedback(NewFeedback {
                    device_type: DeviceType::Ios,
                    device_model: "iPhone 15".into(),
                    feedback_type: FeedbackType::Suggestion,
                    comment: "Add a dark mode please".into(),
                    is_anonymous: true,
                    email: None,
                })
                .await
                .unwrap();
        }
        assert!(dir.path().join("beta_testers.json").exists());

        let reopened = JsonStore::open(dir.path()).unwrap();
        assert_eq!(reopened.list_testers(None).await.unwrap().len(), 1);
        assert_eq!(reopened.list_feedback(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_write_leaves_tables_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::open(dir.path()).unwrap();
        let tester = store.insert_tester(new_tester("a@example.com")).await.unwrap();

        // A directory where the table file should be makes every write fail.
        let path = dir.path().join("beta_testers.json");
        fs::remove_file(&path).unwrap();
        fs::create_dir(&path).unwrap();

        let err = store
            .update_testers(&[tester.id], &TesterPatch::status(TesterStatus::Approved))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Storage { .. }));
        assert!(store.insert_tester(new_tester("b@example.com")).await.is_err());

        let rows = store.list_testers(None).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, TesterStatus::Pending);
    }

    #[tokio::test]
    async fn test_invitations_join_tester_summary() {
        let store = JsonStore::in_memory();
        let tester = store.insert_tester(new_tester("a@example.com")).await.unwrap();
        let inserted = store
            .insert_invitations(vec![NewInvitation {
                tester_id: tester.id,
                platform: Platform::GooglePlay,
                invitation_link: Platform::GooglePlay.invitation_link("com.example"),
                status: InvitationStatus::Sent,
            }])
            .await
            .unwrap();

        let rows = store.list_invitations().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].invitation.id, inserted[0].id);
        assert_eq!(
            rows[0].beta_testers.as_ref().map(|t| t.email.as_str()),
            Some("a@example.com")
        );
    }

    #[tokio::test]
    async fn test_update_unknown_invitation_is_not_found() {
        let store = JsonStore::in_memory();
        let err = store
            .update_invitation(Uuid::new_v4(), &InvitationPatch::resent())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_feedback_status_filter() {
        let store = JsonStore::in_memory();
        let feedback = store
            .insert_feedback(NewFeedback {
                device_type: DeviceType::Ios,
                device_model: "iPhone 15".into(),
                feedback_type: FeedbackType::BugReport,
                comment: "Login button does nothing".into(),
                is_anonymous: true,
                email: None,
            })
            .await
            .unwrap();
        store
            .update_feedback(&[feedback.id], &FeedbackPatch::status(FeedbackStatus::Archived))
            .await
            .unwrap();

        let board = store
            .list_feedback(Some(&FeedbackStatus::BOARD))
            .await
            .unwrap();
        assert!(board.is_empty());
        assert_eq!(store.list_feedback(None).await.unwrap().len(), 1);
    }
}
