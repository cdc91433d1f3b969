//! Drag-and-drop status boards.
//!
//! A [`Board`] groups cards into status columns and tracks the card being
//! dragged. The same board drives two variants: the persisted board over
//! stored feedback, whose moves and estimate edits are patched back to the
//! store, and the importer board over CSV rows that only live in the admin
//! session.

use crate::error::AppError;
use crate::loader::ImportedFeedback;
use crate::models::{Feedback, FeedbackPatch, FeedbackStatus};
use crate::store::Store;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use uuid::Uuid;

/// Something that can sit in a kanban column.
pub trait Card: Clone + Serialize {
    type Id: Clone + PartialEq + Display + Serialize;

    /// Unit the development estimate is expressed in.
    const ESTIMATE_UNIT: &'static str;

    fn card_id(&self) -> &Self::Id;
    fn status(&self) -> FeedbackStatus;
    fn set_status(&mut self, status: FeedbackStatus);
    fn estimate(&self) -> f64;
    fn set_estimate(&mut self, estimate: f64);
}

impl Card for Feedback {
    type Id = Uuid;
    const ESTIMATE_UNIT: &'static str = "man-days";

    fn card_id(&self) -> &Uuid {
        &self.id
    }

    fn status(&self) -> FeedbackStatus {
        self.status
    }

    fn set_status(&mut self, status: FeedbackStatus) {
        self.status = status;
    }

    fn estimate(&self) -> f64 {
        self.development_estimate
    }

    fn set_estimate(&mut self, estimate: f64) {
        self.development_estimate = estimate;
    }
}

impl Card for ImportedFeedback {
    type Id = String;
    const ESTIMATE_UNIT: &'static str = "hours";

    fn card_id(&self) -> &String {
        &self.id
    }

    fn status(&self) -> FeedbackStatus {
        self.status
    }

    fn set_status(&mut self, status: FeedbackStatus) {
        self.status = status;
    }

    fn estimate(&self) -> f64 {
        self.development_estimate
    }

    fn set_estimate(&mut self, estimate: f64) {
        self.development_estimate = estimate;
    }
}

/// A board column; its id is the status its cards carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub id: FeedbackStatus,
    pub title: String,
}

/// To Discuss, Low Priority, High Priority, To Implement.
pub fn default_columns() -> Vec<Column> {
    FeedbackStatus::BOARD
        .iter()
        .map(|status| Column {
            id: *status,
            title: status.label().to_string(),
        })
        .collect()
}

/// A status change produced by a drop.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Move<Id> {
    pub id: Id,
    pub from: FeedbackStatus,
    pub to: FeedbackStatus,
}

#[derive(Debug, Clone)]
pub struct Board<T: Card> {
    columns: Vec<Column>,
    cards: Vec<T>,
    dragging: Option<T::Id>,
}

impl<T: Card> Board<T> {
    /// A board with the four default columns.
    pub fn new(cards: Vec<T>) -> Self {
        Self::with_columns(default_columns(), cards)
    }

    pub fn with_columns(columns: Vec<Column>, cards: Vec<T>) -> Self {
        Self {
            columns,
            cards,
            dragging: None,
        }
    }

    /// Resume a drag started on an earlier snapshot of the same cards.
    ///
    /// The id is dropped if the card is no longer on the board.
    pub fn resume_drag(mut self, dragging: Option<T::Id>) -> Self {
        self.dragging = dragging.filter(|id| self.position(id).is_some());
        self
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn cards(&self) -> &[T] {
        &self.cards
    }

    pub fn dragging(&self) -> Option<&T::Id> {
        self.dragging.as_ref()
    }

    pub fn cards_in(&self, status: FeedbackStatus) -> Vec<&T> {
        self.cards.iter().filter(|c| c.status() == status).collect()
    }

    fn position(&self, id: &T::Id) -> Option<usize> {
        self.cards.iter().position(|c| c.card_id() == id)
    }

    fn has_column(&self, status: FeedbackStatus) -> bool {
        self.columns.iter().any(|c| c.id == status)
    }

    /// Record `id` as the card being dragged.
    pub fn start_drag(&mut self, id: &T::Id) -> Result<(), AppError> {
        if self.position(id).is_none() {
            return Err(AppError::not_found_with_id("Card", id));
        }
        self.dragging = Some(id.clone());
        Ok(())
    }

    /// Abandon the drag without moving anything.
    pub fn end_drag(&mut self) {
        self.dragging = None;
    }

    /// Drop the dragged card on the `target` column
    ///
    /// The drag state is cleared in every case. A card dropped on the column
    /// it already sits in, or a drop with nothing being dragged, changes
    /// nothing.
    ///
    /// # Returns
    /// * `Ok(Some(Move))` - The card changed column
    /// * `Ok(None)` - Nothing moved
    /// * `Err(AppError)` - `target` is not a column on this board
    pub fn drop_on(&mut self, target: FeedbackStatus) -> Result<Option<Move<T::Id>>, AppError> {
        let dragging = self.dragging.take();
        if !self.has_column(target) {
            return Err(AppError::invalid_input_field(
                format!("Unknown column: {}", target),
                "status",
            ));
        }
        let Some(id) = dragging else {
            return Ok(None);
        };
        let Some(idx) = self.position(&id) else {
            return Ok(None);
        };

        let card = &mut self.cards[idx];
        let from = card.status();
        if from == target {
            return Ok(None);
        }
        card.set_status(target);
        Ok(Some(Move {
            id,
            from,
            to: target,
        }))
    }

    /// Set a card's development estimate. Negative or non-finite values are
    /// rejected.
    pub fn set_estimate(&mut self, id: &T::Id, estimate: f64) -> Result<(), AppError> {
        if !estimate.is_finite() || estimate < 0.0 {
            return Err(AppError::invalid_input_field(
                "Estimate must be a non-negative number.",
                "development_estimate",
            ));
        }
        let idx = self
            .position(id)
            .ok_or_else(|| AppError::not_found_with_id("Card", id))?;
        self.cards[idx].set_estimate(estimate);
        Ok(())
    }

    pub fn column_estimate(&self, status: FeedbackStatus) -> f64 {
        self.cards_in(status).iter().map(|c| c.estimate()).sum()
    }

    /// Total estimate of the work queued for implementation.
    pub fn total_estimate(&self) -> f64 {
        self.column_estimate(FeedbackStatus::ToImplement)
    }

    /// Rename a column. A blank title keeps the current one.
    pub fn rename_column(&mut self, status: FeedbackStatus, title: &str) -> Result<(), AppError> {
        let column = self
            .columns
            .iter_mut()
            .find(|c| c.id == status)
            .ok_or_else(|| AppError::not_found_with_id("Column", status))?;
        let title = title.trim();
        if !title.is_empty() {
            column.title = title.to_string();
        }
        Ok(())
    }

    /// Remove a column, moving its cards to `to_discuss`
    ///
    /// The `to_discuss` column itself cannot be removed since it receives the
    /// displaced cards.
    ///
    /// # Returns
    /// * `Result<usize, AppError>` - Number of cards moved
    pub fn delete_column(&mut self, status: FeedbackStatus) -> Result<usize, AppError> {
        if status == FeedbackStatus::ToDiscuss {
            return Err(AppError::invalid_input_field(
                "The To Discuss column cannot be deleted.",
                "status",
            ));
        }
        if !self.has_column(status) {
            return Err(AppError::not_found_with_id("Column", status));
        }
        self.columns.retain(|c| c.id != status);
        let mut moved = 0;
        for card in self.cards.iter_mut().filter(|c| c.status() == status) {
            card.set_status(FeedbackStatus::ToDiscuss);
            moved += 1;
        }
        Ok(moved)
    }

    /// Serializable snapshot for the API.
    pub fn view(&self) -> BoardView<'_, T> {
        BoardView {
            columns: self
                .columns
                .iter()
                .map(|column| ColumnView {
                    id: column.id,
                    title: &column.title,
                    total_estimate: self.column_estimate(column.id),
                    cards: self.cards_in(column.id),
                })
                .collect(),
            dragging: self.dragging.as_ref(),
            total_estimate: self.total_estimate(),
            estimate_unit: T::ESTIMATE_UNIT,
        }
    }
}

#[derive(Serialize)]
pub struct ColumnView<'a, T: Card> {
    pub id: FeedbackStatus,
    pub title: &'a str,
    pub total_estimate: f64,
    pub cards: Vec<&'a T>,
}

#[derive(Serialize)]
pub struct BoardView<'a, T: Card> {
    pub columns: Vec<ColumnView<'a, T>>,
    pub dragging: Option<&'a T::Id>,
    pub total_estimate: f64,
    pub estimate_unit: &'static str,
}

/// Fetch stored feedback for the persisted board (archived rows excluded).
pub async fn load_feedback_board(
    store: &dyn Store,
    dragging: Option<Uuid>,
) -> Result<Board<Feedback>, AppError> {
    let feedback = store.list_feedback(Some(&FeedbackStatus::BOARD)).await?;
    Ok(Board::new(feedback).resume_drag(dragging))
}

/// Write a persisted-board move back to the store.
///
/// Failures are logged and otherwise ignored; the board is not rolled back.
pub async fn persist_move(store: &dyn Store, movement: &Move<Uuid>) {
    if let Err(e) = store
        .update_feedback(&[movement.id], &FeedbackPatch::status(movement.to))
        .await
    {
        log::error!(
            "Failed to move feedback {} from {} to {}: {}",
            movement.id,
            movement.from,
            movement.to,
            e
        );
    }
}

/// Write a persisted-board estimate edit back to the store, logging failures.
pub async fn persist_estimate(store: &dyn Store, id: Uuid, estimate: f64) {
    if let Err(e) = store
        .update_feedback(&[id], &FeedbackPatch::estimate(estimate))
        .await
    {
        log::error!("Failed to save estimate for feedback {}: {}", id, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FeedbackType;
    use chrono::Utc;

    fn card(id: &str, status: FeedbackStatus, estimate: f64) -> ImportedFeedback {
        ImportedFeedback {
            id: id.to_string(),
            feedback_type: FeedbackType::BugReport,
            module: "Auth".into(),
            title: "Login".into(),
            description: "Broken".into(),
            status,
            development_estimate: estimate,
            created_at: Utc::now(),
        }
    }

    fn board() -> Board<ImportedFeedback> {
        Board::new(vec![
            card("a", FeedbackStatus::ToDiscuss, 0.0),
            card("b", FeedbackStatus::ToImplement, 3.0),
            card("c", FeedbackStatus::ToImplement, 1.5),
            card("d", FeedbackStatus::High, 8.0),
        ])
    }

    #[test]
    fn test_drop_moves_card_and_clears_drag() {
        let mut board = board();
        board.start_drag(&"a".to_string()).unwrap();
        let movement = board.drop_on(FeedbackStatus::Low).unwrap().unwrap();
        assert_eq!(movement.from, FeedbackStatus::ToDiscuss);
        assert_eq!(movement.to, FeedbackStatus::Low);
        assert_eq!(board.cards_in(FeedbackStatus::Low).len(), 1);
        assert!(board.dragging().is_none());
    }

    #[test]
    fn test_drop_on_own_column_is_noop() {
        let mut board = board();
        board.start_drag(&"d".to_string()).unwrap();
        assert_eq!(board.drop_on(FeedbackStatus::High).unwrap(), None);
        assert!(board.dragging().is_none());
    }

    #[test]
    fn test_drop_without_drag_is_noop() {
        let mut board = board();
        assert_eq!(board.drop_on(FeedbackStatus::Low).unwrap(), None);
    }

    #[test]
    fn test_start_drag_unknown_card() {
        let mut board = board();
        let err = board.start_drag(&"zzz".to_string()).unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));
    }

    #[test]
    fn test_end_drag_does_not_move() {
        let mut board = board();
        board.start_drag(&"a".to_string()).unwrap();
        board.end_drag();
        assert_eq!(board.drop_on(FeedbackStatus::High).unwrap(), None);
        assert_eq!(board.cards_in(FeedbackStatus::ToDiscuss).len(), 1);
    }

    #[test]
    fn test_total_estimate_counts_to_implement_only() {
        assert_eq!(board().total_estimate(), 4.5);
    }

    #[test]
    fn test_negative_estimate_rejected() {
        let mut board = board();
        assert!(board.set_estimate(&"a".to_string(), -1.0).is_err());
        assert!(board.set_estimate(&"a".to_string(), f64::NAN).is_err());
        board.set_estimate(&"b".to_string(), 5.0).unwrap();
        assert_eq!(board.total_estimate(), 6.5);
    }

    #[test]
    fn test_rename_blank_keeps_title() {
        let mut board = board();
        board.rename_column(FeedbackStatus::Low, "   ").unwrap();
        assert_eq!(board.columns()[1].title, "Low Priority");
        board.rename_column(FeedbackStatus::Low, " Later ").unwrap();
        assert_eq!(board.columns()[1].title, "Later");
    }

    #[test]
    fn test_delete_column_moves_cards_to_discuss() {
        let mut board = board();
        assert_eq!(board.delete_column(FeedbackStatus::ToImplement).unwrap(), 2);
        assert_eq!(board.columns().len(), 3);
        assert_eq!(board.cards_in(FeedbackStatus::ToDiscuss).len(), 3);
        assert_eq!(board.total_estimate(), 0.0);

        // a deleted column is no longer a drop target
        board.start_drag(&"d".to_string()).unwrap();
        assert!(board.drop_on(FeedbackStatus::ToImplement).is_err());
    }

    #[test]
    fn test_to_discuss_cannot_be_deleted() {
        let mut board = board();
        assert!(board.delete_column(FeedbackStatus::ToDiscuss).is_err());
        assert_eq!(board.columns().len(), 4);
    }

    #[test]
    fn test_view_groups_cards() {
        let board = board();
        let view = serde_json::to_value(board.view()).unwrap();
        assert_eq!(view["estimate_unit"], "hours");
        assert_eq!(view["columns"][3]["id"], "to_implement");
        assert_eq!(view["columns"][3]["cards"].as_array().unwrap().len(), 2);
        assert_eq!(view["columns"][3]["total_estimate"], 4.5);
    }

    #[test]
    fn test_resume_drag_drops_vanished_card() {
        let board = board().resume_drag(Some("gone".to_string()));
        assert!(board.dragging().is_none());
    }
}
