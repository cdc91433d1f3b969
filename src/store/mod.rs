//! Data access layer.
//!
//! Everything the portal persists goes through the [`Store`] trait. Two
//! implementations exist: [`JsonStore`], which keeps the three tables as
//! pretty-printed JSON files (or purely in memory), and `RestStore`, a
//! client for a PostgREST-style hosted backend.

use crate::error::AppError;
use crate::models::{
    Feedback, FeedbackPatch, FeedbackStatus, Invitation, InvitationPatch, InvitationWithTester,
    NewFeedback, NewInvitation, NewTester, Tester, TesterPatch, TesterStatus,
};
use async_trait::async_trait;
use uuid::Uuid;

pub mod json;
#[cfg(feature = "web")]
pub mod rest;

pub use json::JsonStore;
#[cfg(feature = "web")]
pub use rest::{RestStore, RestStoreConfig};

pub const TESTERS_TABLE: &str = "beta_testers";
pub const FEEDBACK_TABLE: &str = "beta_feedback";
pub const INVITATIONS_TABLE: &str = "beta_invitations";

/// Narrow select/insert/update interface over the three portal tables.
///
/// Every listing is ordered newest first (`created_at` descending). Each
/// call is an independent request; multi-row updates are not transactional.
#[async_trait]
pub trait Store: Send + Sync {
    /// List testers, optionally restricted to one status.
    async fn list_testers(&self, status: Option<TesterStatus>) -> Result<Vec<Tester>, AppError>;

    async fn insert_tester(&self, tester: NewTester) -> Result<Tester, AppError>;

    /// Apply `patch` to every tester whose id is in `ids`.
    ///
    /// Returns the number of rows updated. Unknown ids are ignored.
    async fn update_testers(&self, ids: &[Uuid], patch: &TesterPatch) -> Result<usize, AppError>;

    /// List feedback, optionally restricted to a set of statuses.
    async fn list_feedback(
        &self,
        statuses: Option<&[FeedbackStatus]>,
    ) -> Result<Vec<Feedback>, AppError>;

    async fn insert_feedback(&self, feedback: NewFeedback) -> Result<Feedback, AppError>;

    /// Apply `patch` to every feedback row whose id is in `ids`.
    async fn update_feedback(&self, ids: &[Uuid], patch: &FeedbackPatch)
    -> Result<usize, AppError>;

    /// List invitations joined with the invited tester's id, name and email.
    async fn list_invitations(&self) -> Result<Vec<InvitationWithTester>, AppError>;

    async fn insert_invitations(
        &self,
        invitations: Vec<NewInvitation>,
    ) -> Result<Vec<Invitation>, AppError>;

    /// Update a single invitation. Fails with `NotFound` for an unknown id.
    async fn update_invitation(&self, id: Uuid, patch: &InvitationPatch)
    -> Result<Invitation, AppError>;
}
