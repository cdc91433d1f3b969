//! Feedback model (`beta_feedback` table).

use super::tester::DeviceType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Kind of feedback submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackType {
    BugReport,
    Suggestion,
    GeneralComment,
}

impl FeedbackType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BugReport => "bug_report",
            Self::Suggestion => "suggestion",
            Self::GeneralComment => "general_comment",
        }
    }

    /// Short badge label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::BugReport => "Bug",
            Self::Suggestion => "Suggestion",
            Self::GeneralComment => "Comment",
        }
    }
}

impl FromStr for FeedbackType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "bug_report" => Ok(Self::BugReport),
            "suggestion" => Ok(Self::Suggestion),
            "general_comment" => Ok(Self::GeneralComment),
            other => Err(format!("Unknown feedback type: {}", other)),
        }
    }
}

impl fmt::Display for FeedbackType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Triage status of a feedback item. Any status is reachable from any other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackStatus {
    #[default]
    ToDiscuss,
    Low,
    High,
    ToImplement,
    Archived,
}

impl FeedbackStatus {
    /// Statuses shown as kanban columns, in display order.
    pub const BOARD: [FeedbackStatus; 4] = [
        FeedbackStatus::ToDiscuss,
        FeedbackStatus::Low,
        FeedbackStatus::High,
        FeedbackStatus::ToImplement,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ToDiscuss => "to_discuss",
            Self::Low => "low",
            Self::High => "high",
            Self::ToImplement => "to_implement",
            Self::Archived => "archived",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::ToDiscuss => "To Discuss",
            Self::Low => "Low Priority",
            Self::High => "High Priority",
            Self::ToImplement => "To Implement",
            Self::Archived => "Archived",
        }
    }
}

impl FromStr for FeedbackStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "to_discuss" => Ok(Self::ToDiscuss),
            "low" => Ok(Self::Low),
            "high" => Ok(Self::High),
            "to_implement" => Ok(Self::ToImplement),
            "archived" => Ok(Self::Archived),
            other => Err(format!("Unknown feedback status: {}", other)),
        }
    }
}

impl fmt::Display for FeedbackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A feedback item submitted through the public form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub id: Uuid,
    pub device_type: DeviceType,
    pub device_model: String,
    pub feedback_type: FeedbackType,
    pub comment: String,
    pub is_anonymous: bool,
    pub email: Option<String>,
    pub status: FeedbackStatus,
    #[serde(default)]
    pub development_estimate: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Feedback {
    /// Case-insensitive match of `term` against comment, device model and email.
    pub fn matches_search(&self, term: &str) -> bool {
        let term = term.to_lowercase();
        self.comment.to_lowercase().contains(&term)
            || self.device_model.to_lowercase().contains(&term)
            || self
                .email
                .as_deref()
                .is_some_and(|email| email.to_lowercase().contains(&term))
    }
}

/// Insert payload for a new feedback item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewFeedback {
    pub device_type: DeviceType,
    pub device_model: String,
    pub feedback_type: FeedbackType,
    pub comment: String,
    pub is_anonymous: bool,
    pub email: Option<String>,
}

impl NewFeedback {
    pub fn into_feedback(self, id: Uuid, now: DateTime<Utc>) -> Feedback {
        Feedback {
            id,
            device_type: self.device_type,
            device_model: self.device_model,
            feedback_type: self.feedback_type,
            comment: self.comment,
            is_anonymous: self.is_anonymous,
            email: if self.is_anonymous { None } else { self.email },
            status: FeedbackStatus::ToDiscuss,
            development_estimate: 0.0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update of feedback rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedbackPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<FeedbackStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub development_estimate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl FeedbackPatch {
    /// Status change stamped with the current time.
    pub fn status(status: FeedbackStatus) -> Self {
        Self {
            status: Some(status),
            updated_at: Some(Utc::now()),
            ..Self::default()
        }
    }

    pub fn estimate(estimate: f64) -> Self {
        Self {
            development_estimate: Some(estimate),
            ..Self::default()
        }
    }

    pub fn apply(&self, feedback: &mut Feedback) {
        if let Some(status) = self.status {
            feedback.status = status;
        }
        if let Some(estimate) = self.development_estimate {
            feedback.development_estimate = estimate;
        }
        if let Some(updated_at) = self.updated_at {
            feedback.updated_at = updated_at;
        }
    }
}

/// Replace the first underscore with a space, as the exports display enum values.
pub fn humanize(value: &str) -> String {
    value.replacen('_', " ", 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_feedback_drops_email() {
        let feedback = NewFeedback {
            device_type: DeviceType::Android,
            device_model: "Pixel 8".into(),
            feedback_type: FeedbackType::BugReport,
            comment: "Crashes on launch every time".into(),
            is_anonymous: true,
            email: Some("someone@example.com".into()),
        }
        .into_feedback(Uuid::new_v4(), Utc::now());

        assert_eq!(feedback.email, None);
        assert_eq!(feedback.status, FeedbackStatus::ToDiscuss);
        assert_eq!(feedback.development_estimate, 0.0);
    }

    #[test]
    fn test_status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&FeedbackStatus::ToImplement).unwrap(),
            "\"to_implement\""
        );
        assert_eq!(
            serde_json::from_str::<FeedbackType>("\"general_comment\"").unwrap(),
            FeedbackType::GeneralComment
        );
    }

    #[test]
    fn test_humanize_replaces_first_underscore_only() {
        assert_eq!(humanize("to_implement"), "to implement");
        assert_eq!(humanize("a_b_c"), "a b_c");
        assert_eq!(humanize("low"), "low");
    }

    #[test]
    fn test_board_excludes_archived() {
        assert!(!FeedbackStatus::BOARD.contains(&FeedbackStatus::Archived));
        assert_eq!(FeedbackStatus::BOARD[0], FeedbackStatus::ToDiscuss);
    }
}
