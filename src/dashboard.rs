//! Admin dashboards over testers and feedback.
//!
//! Rows are fetched from the store, filtered and paginated here; the admin's
//! row selection lives in their session [`Workspace`](crate::login::Workspace)
//! and drives bulk status changes and exports.

use crate::error::AppError;
use crate::models::{
    DeviceType, Feedback, FeedbackPatch, FeedbackStatus, FeedbackType, Identified, Tester,
    TesterPatch, TesterStatus,
};
use crate::store::Store;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;
use uuid::Uuid;

/// Rows shown per dashboard page.
pub const PAGE_SIZE: usize = 10;

/// Deserialize a select-box value where `"all"` (or nothing) means no filter.
fn all_or<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    let value = Option::<String>::deserialize(deserializer)?;
    match value.as_deref().map(str::trim) {
        None | Some("") | Some("all") => Ok(None),
        Some(v) => v.parse().map(Some).map_err(de::Error::custom),
    }
}

/// Tester dashboard filters.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TesterFilter {
    pub search: String,
    #[serde(deserialize_with = "all_or")]
    pub status: Option<TesterStatus>,
    #[serde(deserialize_with = "all_or")]
    pub device_type: Option<DeviceType>,
}

impl TesterFilter {
    pub fn matches(&self, tester: &Tester) -> bool {
        (self.search.is_empty() || tester.matches_search(&self.search))
            && self.status.is_none_or(|s| tester.status == s)
            && self.device_type.is_none_or(|d| tester.device_type == d)
    }

    pub fn apply(&self, testers: &[Tester]) -> Vec<Tester> {
        testers.iter().filter(|t| self.matches(t)).cloned().collect()
    }
}

/// Feedback dashboard filters.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FeedbackFilter {
    pub search: String,
    #[serde(deserialize_with = "all_or")]
    pub status: Option<FeedbackStatus>,
    #[serde(deserialize_with = "all_or")]
    pub device_type: Option<DeviceType>,
    #[serde(deserialize_with = "all_or")]
    pub feedback_type: Option<FeedbackType>,
}

impl FeedbackFilter {
    pub fn matches(&self, feedback: &Feedback) -> bool {
        (self.search.is_empty() || feedback.matches_search(&self.search))
            && self.status.is_none_or(|s| feedback.status == s)
            && self.device_type.is_none_or(|d| feedback.device_type == d)
            && self.feedback_type.is_none_or(|t| feedback.feedback_type == t)
    }

    pub fn apply(&self, feedback: &[Feedback]) -> Vec<Feedback> {
        feedback.iter().filter(|f| self.matches(f)).cloned().collect()
    }
}

/// One page of rows plus the numbers a pager needs.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-based page number.
    pub page: usize,
    pub per_page: usize,
    pub total_items: usize,
    pub total_pages: usize,
}

/// Slice out 1-based `page` of `items`
///
/// Page numbers below 1 are treated as 1. A page past the end is empty, the
/// totals still describe the whole list.
///
/// # Arguments
/// * `items` - The filtered rows
/// * `page` - Requested page number
///
/// # Returns
/// * `Page<T>` - The rows on that page and the pager totals
pub fn paginate<T: Clone>(items: &[T], page: usize) -> Page<T> {
    let page = page.max(1);
    let start = (page - 1) * PAGE_SIZE;
    let end = (start + PAGE_SIZE).min(items.len());
    Page {
        items: items.get(start..end).map(<[T]>::to_vec).unwrap_or_default(),
        page,
        per_page: PAGE_SIZE,
        total_items: items.len(),
        total_pages: items.len().div_ceil(PAGE_SIZE),
    }
}

/// Ordered set of selected row ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Selection {
    ids: Vec<Uuid>,
}

impl Selection {
    pub fn ids(&self) -> &[Uuid] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.ids.contains(id)
    }

    /// Select `id` if unselected, deselect it otherwise.
    pub fn toggle(&mut self, id: Uuid) {
        if let Some(pos) = self.ids.iter().position(|x| *x == id) {
            self.ids.remove(pos);
        } else {
            self.ids.push(id);
        }
    }

    /// The "select all" checkbox for the visible page: when every visible id
    /// is already selected they are all deselected, otherwise the missing
    /// ones are added.
    pub fn select_visible(&mut self, visible: &[Uuid]) {
        if visible.iter().all(|id| self.contains(id)) {
            self.ids.retain(|id| !visible.contains(id));
        } else {
            for id in visible {
                if !self.contains(id) {
                    self.ids.push(*id);
                }
            }
        }
    }

    /// True when the page is non-empty and fully selected.
    pub fn covers(&self, visible: &[Uuid]) -> bool {
        !visible.is_empty() && visible.iter().all(|id| self.contains(id))
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }
}

/// Rows to export: the selected ones among `filtered` when anything is
/// selected, else all of `filtered`.
pub fn export_rows<T: Identified + Clone>(filtered: &[T], selection: &Selection) -> Vec<T> {
    if selection.is_empty() {
        filtered.to_vec()
    } else {
        filtered
            .iter()
            .filter(|row| selection.contains(&row.id()))
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TesterStats {
    pub total: usize,
    pub pending: usize,
    pub approved: usize,
    pub active: usize,
}

impl TesterStats {
    pub fn from_testers(testers: &[Tester]) -> Self {
        let count = |status: TesterStatus| testers.iter().filter(|t| t.status == status).count();
        Self {
            total: testers.len(),
            pending: count(TesterStatus::Pending),
            approved: count(TesterStatus::Approved),
            active: count(TesterStatus::Active),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FeedbackStats {
    pub total: usize,
    pub bug_reports: usize,
    pub suggestions: usize,
    pub comments: usize,
    pub archived: usize,
}

impl FeedbackStats {
    pub fn from_feedback(feedback: &[Feedback]) -> Self {
        let of_type = |kind: FeedbackType| feedback.iter().filter(|f| f.feedback_type == kind).count();
        Self {
            total: feedback.len(),
            bug_reports: of_type(FeedbackType::BugReport),
            suggestions: of_type(FeedbackType::Suggestion),
            comments: of_type(FeedbackType::GeneralComment),
            archived: feedback
                .iter()
                .filter(|f| f.status == FeedbackStatus::Archived)
                .count(),
        }
    }
}

/// Set `status` on every selected tester and return the refreshed list
///
/// Issues one store update for all ids, then re-fetches every tester. The
/// caller clears its selection only when this succeeds.
///
/// # Errors
/// * `InvalidInput` without touching the store when `ids` is empty
/// * Any store error from the update or the re-fetch
pub async fn bulk_update_tester_status(
    store: &dyn Store,
    ids: &[Uuid],
    status: TesterStatus,
) -> Result<Vec<Tester>, AppError> {
    if ids.is_empty() {
        return Err(AppError::invalid_input("Please select at least one tester."));
    }
    let updated = store
        .update_testers(ids, &TesterPatch::status(status))
        .await?;
    log::info!("Set {} tester(s) to {}", updated, status);
    store.list_testers(None).await
}

/// Feedback counterpart of [`bulk_update_tester_status`].
pub async fn bulk_update_feedback_status(
    store: &dyn Store,
    ids: &[Uuid],
    status: FeedbackStatus,
) -> Result<Vec<Feedback>, AppError> {
    if ids.is_empty() {
        return Err(AppError::invalid_input(
            "Please select at least one feedback item.",
        ));
    }
    let updated = store
        .update_feedback(ids, &FeedbackPatch::status(status))
        .await?;
    log::info!("Set {} feedback item(s) to {}", updated, status);
    store.list_feedback(None).await
}

/// Change one tester's status and return the refreshed list.
pub async fn update_tester_status(
    store: &dyn Store,
    id: Uuid,
    status: TesterStatus,
) -> Result<Vec<Tester>, AppError> {
    let updated = store
        .update_testers(&[id], &TesterPatch::status(status))
        .await?;
    if updated == 0 {
        return Err(AppError::not_found_with_id("Tester", id));
    }
    store.list_testers(None).await
}

/// Change one feedback item's status and return the refreshed list.
pub async fn update_feedback_status(
    store: &dyn Store,
    id: Uuid,
    status: FeedbackStatus,
) -> Result<Vec<Feedback>, AppError> {
    let updated = store
        .update_feedback(&[id], &FeedbackPatch::status(status))
        .await?;
    if updated == 0 {
        return Err(AppError::not_found_with_id("Feedback", id));
    }
    store.list_feedback(None).await
}
