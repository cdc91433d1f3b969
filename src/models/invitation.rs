//! Invitation model (`beta_invitations` table).

use super::tester::{DeviceType, TesterSummary};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Store a tester is invited through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    GooglePlay,
    AppStore,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GooglePlay => "google_play",
            Self::AppStore => "app_store",
        }
    }

    /// Name used in email bodies.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::GooglePlay => "Google Play Store",
            Self::AppStore => "Apple TestFlight",
        }
    }

    /// Devices that can install builds from this platform.
    pub fn device_type(&self) -> DeviceType {
        match self {
            Self::GooglePlay => DeviceType::Android,
            Self::AppStore => DeviceType::Ios,
        }
    }

    /// Public opt-in link for the given app/package id.
    pub fn invitation_link(&self, app_id: &str) -> String {
        let app_id = app_id.trim();
        match self {
            Self::GooglePlay => format!("https://play.google.com/apps/testing/{}", app_id),
            Self::AppStore => format!("https://testflight.apple.com/join/{}", app_id),
        }
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "google_play" => Ok(Self::GooglePlay),
            "app_store" => Ok(Self::AppStore),
            other => Err(format!("Unknown platform: {}", other)),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvitationStatus {
    #[default]
    Sent,
    Accepted,
    Declined,
    Expired,
}

impl InvitationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Accepted => "accepted",
            Self::Declined => "declined",
            Self::Expired => "expired",
        }
    }
}

impl fmt::Display for InvitationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Record of an invitation email that was delivered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invitation {
    pub id: Uuid,
    pub tester_id: Uuid,
    pub platform: Platform,
    pub invitation_sent_at: DateTime<Utc>,
    pub status: InvitationStatus,
    pub invitation_link: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewInvitation {
    pub tester_id: Uuid,
    pub platform: Platform,
    pub invitation_link: String,
    pub status: InvitationStatus,
}

impl NewInvitation {
    /// Row for an invitation email that was just delivered.
    pub fn sent(tester_id: Uuid, platform: Platform, invitation_link: String) -> Self {
        Self {
            tester_id,
            platform,
            invitation_link,
            status: InvitationStatus::Sent,
        }
    }

    pub fn into_invitation(self, id: Uuid, now: DateTime<Utc>) -> Invitation {
        Invitation {
            id,
            tester_id: self.tester_id,
            platform: self.platform,
            invitation_sent_at: now,
            status: self.status,
            invitation_link: self.invitation_link,
            created_at: now,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvitationPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<InvitationStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invitation_sent_at: Option<DateTime<Utc>>,
}

impl InvitationPatch {
    /// Marks an invitation as sent again, now.
    pub fn resent() -> Self {
        Self {
            status: Some(InvitationStatus::Sent),
            invitation_sent_at: Some(Utc::now()),
        }
    }

    pub fn apply(&self, invitation: &mut Invitation) {
        if let Some(status) = self.status {
            invitation.status = status;
        }
        if let Some(sent_at) = self.invitation_sent_at {
            invitation.invitation_sent_at = sent_at;
        }
    }
}

/// Invitation joined with the invited tester's identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvitationWithTester {
    #[serde(flatten)]
    pub invitation: Invitation,
    pub beta_testers: Option<TesterSummary>,
}

impl InvitationWithTester {
    /// Search over the joined tester's name and email. Rows without a
    /// tester never match.
    pub fn matches_search(&self, term: &str) -> bool {
        let term = term.to_lowercase();
        self.beta_testers.as_ref().is_some_and(|tester| {
            tester.full_name.to_lowercase().contains(&term)
                || tester.email.to_lowercase().contains(&term)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invitation_links() {
        assert_eq!(
            Platform::GooglePlay.invitation_link("com.example.app"),
            "https://play.google.com/apps/testing/com.example.app"
        );
        assert_eq!(
            Platform::AppStore.invitation_link(" AbC123 "),
            "https://testflight.apple.com/join/AbC123"
        );
    }

    #[test]
    fn test_platform_device_mapping() {
        assert_eq!(Platform::GooglePlay.device_type(), DeviceType::Android);
        assert_eq!(Platform::AppStore.device_type(), DeviceType::Ios);
    }

    #[test]
    fn test_joined_row_flattens_invitation() {
        let now = Utc::now();
        let row = InvitationWithTester {
            invitation: NewInvitation {
                tester_id: Uuid::new_v4(),
                platform: Platform::AppStore,
                invitation_link: "https://testflight.apple.com/join/x".into(),
                status: InvitationStatus::Sent,
            }
            .into_invitation(Uuid::new_v4(), now),
            beta_testers: None,
        };
        let value = serde_json::to_value(&row).unwrap();
        assert_eq!(value["platform"], "app_store");
        assert!(value["beta_testers"].is_null());
        assert!(!row.matches_search(""));
    }
}
