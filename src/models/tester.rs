//! Beta tester model (`beta_testers` table).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Mobile platform of a tester's or reporter's device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Ios,
    Android,
}

impl DeviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ios => "ios",
            Self::Android => "android",
        }
    }
}

impl FromStr for DeviceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ios" => Ok(Self::Ios),
            "android" => Ok(Self::Android),
            other => Err(format!("Unknown device type: {}", other)),
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Self-declared testing experience.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExperienceLevel {
    Beginner,
    Intermediate,
    Expert,
}

impl ExperienceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Expert => "expert",
        }
    }
}

impl FromStr for ExperienceLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "beginner" => Ok(Self::Beginner),
            "intermediate" => Ok(Self::Intermediate),
            "expert" => Ok(Self::Expert),
            other => Err(format!("Unknown experience level: {}", other)),
        }
    }
}

impl fmt::Display for ExperienceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle of a tester, driven by admin actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TesterStatus {
    #[default]
    Pending,
    Approved,
    Invited,
    Active,
    Declined,
}

impl TesterStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Invited => "invited",
            Self::Active => "active",
            Self::Declined => "declined",
        }
    }
}

impl FromStr for TesterStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "invited" => Ok(Self::Invited),
            "active" => Ok(Self::Active),
            "declined" => Ok(Self::Declined),
            other => Err(format!("Unknown tester status: {}", other)),
        }
    }
}

impl fmt::Display for TesterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A registered beta tester.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tester {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub device_type: DeviceType,
    pub device_model: String,
    pub experience_level: ExperienceLevel,
    pub status: TesterStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tester {
    /// Split the full name into (first, last) the way TestFlight imports expect:
    /// the first space-separated word, then everything after it.
    pub fn split_name(&self) -> (String, String) {
        let mut parts = self.full_name.split(' ');
        let first = parts.next().unwrap_or_default().to_string();
        let last = parts.collect::<Vec<_>>().join(" ");
        (first, last)
    }

    /// Case-insensitive match of `term` against name and email.
    pub fn matches_search(&self, term: &str) -> bool {
        let term = term.to_lowercase();
        self.full_name.to_lowercase().contains(&term) || self.email.to_lowercase().contains(&term)
    }
}

/// Insert payload for a new registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTester {
    pub email: String,
    pub full_name: String,
    pub device_type: DeviceType,
    pub device_model: String,
    pub experience_level: ExperienceLevel,
    pub status: TesterStatus,
}

impl NewTester {
    pub fn into_tester(self, id: Uuid, now: DateTime<Utc>) -> Tester {
        Tester {
            id,
            email: self.email,
            full_name: self.full_name,
            device_type: self.device_type,
            device_model: self.device_model,
            experience_level: self.experience_level,
            status: self.status,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update of tester rows. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TesterPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TesterStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl TesterPatch {
    /// Status change stamped with the current time.
    pub fn status(status: TesterStatus) -> Self {
        Self {
            status: Some(status),
            updated_at: Some(Utc::now()),
        }
    }

    pub fn apply(&self, tester: &mut Tester) {
        if let Some(status) = self.status {
            tester.status = status;
        }
        if let Some(updated_at) = self.updated_at {
            tester.updated_at = updated_at;
        }
    }
}

/// Tester columns embedded in invitation listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TesterSummary {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
}

impl From<&Tester> for TesterSummary {
    fn from(tester: &Tester) -> Self {
        Self {
            id: tester.id,
            full_name: tester.full_name.clone(),
            email: tester.email.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tester(name: &str) -> Tester {
        NewTester {
            email: "jane@example.com".into(),
            full_name: name.into(),
            device_type: DeviceType::Ios,
            device_model: "iPhone 15".into(),
            experience_level: ExperienceLevel::Expert,
            status: TesterStatus::Pending,
        }
        .into_tester(Uuid::new_v4(), Utc::now())
    }

    #[test]
    fn test_split_name() {
        assert_eq!(
            tester("Jane van der Berg").split_name(),
            ("Jane".to_string(), "van der Berg".to_string())
        );
        assert_eq!(tester("Cher").split_name(), ("Cher".to_string(), String::new()));
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [
            TesterStatus::Pending,
            TesterStatus::Approved,
            TesterStatus::Invited,
            TesterStatus::Active,
            TesterStatus::Declined,
        ] {
            assert_eq!(status.as_str().parse::<TesterStatus>(), Ok(status));
        }
        assert!("huawei".parse::<DeviceType>().is_err());
    }

    #[test]
    fn test_serde_uses_lowercase_names() {
        let json = serde_json::to_string(&tester("Jane Doe")).unwrap();
        assert!(json.contains("\"device_type\":\"ios\""));
        assert!(json.contains("\"experience_level\":\"expert\""));
        assert!(json.contains("\"status\":\"pending\""));
    }

    #[test]
    fn test_patch_skips_unset_fields() {
        let json = serde_json::to_string(&TesterPatch {
            status: Some(TesterStatus::Invited),
            updated_at: None,
        })
        .unwrap();
        assert_eq!(json, "{\"status\":\"invited\"}");
    }

    #[test]
    fn test_matches_search_is_case_insensitive() {
        let t = tester("Jane Doe");
        assert!(t.matches_search("JANE"));
        assert!(t.matches_search("example.COM"));
        assert!(!t.matches_search("john"));
    }
}
