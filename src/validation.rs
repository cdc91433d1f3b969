//! Field validation helpers shared by the public forms and the admin login.

use crate::models::DeviceType;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap();
}

const IOS_DOMAINS: [&str; 3] = ["@icloud.com", "@me.com", "@mac.com"];
const ANDROID_DOMAIN: &str = "@gmail.com";

/// Outcome of a single field check.
///
/// `message` is empty when the value is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub message: String,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self {
            is_valid: true,
            message: String::new(),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            message: message.into(),
        }
    }

    /// The failure message, if any.
    pub fn error(&self) -> Option<&str> {
        if self.is_valid {
            None
        } else {
            Some(&self.message)
        }
    }
}

/// Validate an email address
///
/// Checks that the address is present and has the shape `local@domain.tld`.
///
/// # Arguments
/// * `email` - The address to check
///
/// # Returns
/// * `ValidationResult` - Valid, or the message to show next to the field
///
/// # Examples
/// ```
/// use beta_portal::validation::validate_email;
///
/// assert!(validate_email("foo@bar.com").is_valid);
/// assert!(!validate_email("foo@bar").is_valid);
/// ```
pub fn validate_email(email: &str) -> ValidationResult {
    if email.trim().is_empty() {
        return ValidationResult::fail("Email address is required");
    }
    if !EMAIL_RE.is_match(email) {
        return ValidationResult::fail("Please enter a valid email address");
    }
    ValidationResult::ok()
}

/// Validate an email address against the store account the device needs
///
/// TestFlight invitations go to Apple IDs and Play testing lists to Google
/// accounts, so iOS testers must use an iCloud domain and Android testers a
/// Gmail address.
///
/// # Arguments
/// * `email` - The address to check
/// * `device_type` - The tester's device platform
///
/// # Returns
/// * `ValidationResult` - Valid, or the message to show next to the field
pub fn validate_email_for_platform(email: &str, device_type: DeviceType) -> ValidationResult {
    let basic = validate_email(email);
    if !basic.is_valid {
        return basic;
    }

    let email = email.to_lowercase();
    match device_type {
        DeviceType::Ios if !IOS_DOMAINS.iter().any(|domain| email.ends_with(domain)) => {
            ValidationResult::fail(
                "For iOS devices, please use an iCloud email address (@icloud.com, @me.com, or @mac.com)",
            )
        }
        DeviceType::Android if !email.ends_with(ANDROID_DOMAIN) => ValidationResult::fail(
            "For Android devices, please use a Gmail email address (@gmail.com)",
        ),
        _ => ValidationResult::ok(),
    }
}

/// Check that a value is not blank.
pub fn validate_required(value: &str, field_name: &str) -> ValidationResult {
    if value.trim().is_empty() {
        ValidationResult::fail(format!("{} is required", field_name))
    } else {
        ValidationResult::ok()
    }
}

/// Check that a value has at least `min_length` characters (untrimmed).
pub fn validate_min_length(value: &str, min_length: usize, field_name: &str) -> ValidationResult {
    if value.chars().count() < min_length {
        ValidationResult::fail(format!(
            "{} must be at least {} characters long",
            field_name, min_length
        ))
    } else {
        ValidationResult::ok()
    }
}
