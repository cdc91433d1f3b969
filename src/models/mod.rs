//! Data models for the three store tables.

pub mod feedback;
pub mod invitation;
pub mod tester;

pub use feedback::{humanize, Feedback, FeedbackPatch, FeedbackStatus, FeedbackType, NewFeedback};
pub use invitation::{
    Invitation, InvitationPatch, InvitationStatus, InvitationWithTester, NewInvitation, Platform,
};
pub use tester::{
    DeviceType, ExperienceLevel, NewTester, Tester, TesterPatch, TesterStatus, TesterSummary,
};

use uuid::Uuid;

/// Rows addressed by a store-assigned UUID.
pub trait Identified {
    fn id(&self) -> Uuid;
}

impl Identified for Tester {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl Identified for Feedback {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl Identified for InvitationWithTester {
    fn id(&self) -> Uuid {
        self.invitation.id
    }
}
