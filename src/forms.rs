//! Public registration and feedback forms.
//!
//! Both forms arrive as camelCase JSON with every field as a string, the way
//! the front-end posts them. Validation collects one message per field and
//! fails with [`AppError::Validation`] so the client can show them inline.

use crate::error::{AppError, FieldErrors};
use crate::models::{
    DeviceType, ExperienceLevel, Feedback, FeedbackType, NewFeedback, NewTester, Tester,
    TesterStatus,
};
use crate::store::Store;
use crate::validation::{
    ValidationResult, validate_email, validate_email_for_platform, validate_min_length,
    validate_required,
};
use serde::Deserialize;
use std::str::FromStr;

pub const REGISTRATION_SUCCESS: &str =
    "Thank you for joining our beta program! We'll be in touch soon.";
pub const FEEDBACK_SUCCESS: &str =
    "Thank you for your feedback! We appreciate your input and will review it carefully.";

const MIN_COMMENT_LENGTH: usize = 10;

/// Beta program sign-up form.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegistrationForm {
    pub full_name: String,
    pub email: String,
    pub device_type: String,
    pub device_model: String,
    pub experience_level: String,
}

impl RegistrationForm {
    /// Validate every field and build the insert payload.
    ///
    /// # Arguments
    /// * `strict_platform_emails` - Require an iCloud address for iOS and a
    ///   Gmail address for Android
    ///
    /// # Returns
    /// * `Result<NewTester, AppError>` - A `pending` tester, or the per-field
    ///   messages keyed by form field name
    pub fn validate(&self, strict_platform_emails: bool) -> Result<NewTester, AppError> {
        let mut errors = FieldErrors::new();

        record(&mut errors, "fullName", validate_required(&self.full_name, "Full name"));
        let device_type = parse_choice::<DeviceType>(
            &mut errors,
            "deviceType",
            &self.device_type,
            "Device platform",
        );
        let email_check = match device_type {
            Some(device) if strict_platform_emails => validate_email_for_platform(&self.email, device),
            _ => validate_email(&self.email),
        };
        record(&mut errors, "email", email_check);
        record(
            &mut errors,
            "deviceModel",
            validate_required(&self.device_model, "Device model"),
        );
        let experience_level = parse_choice::<ExperienceLevel>(
            &mut errors,
            "experienceLevel",
            &self.experience_level,
            "Experience level",
        );

        match (device_type, experience_level) {
            (Some(device_type), Some(experience_level)) if errors.is_empty() => Ok(NewTester {
                email: self.email.trim().to_string(),
                full_name: self.full_name.trim().to_string(),
                device_type,
                device_model: self.device_model.trim().to_string(),
                experience_level,
                status: TesterStatus::Pending,
            }),
            _ => Err(AppError::validation(errors)),
        }
    }
}

/// Anonymous-capable feedback form.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FeedbackForm {
    pub device_type: String,
    pub device_model: String,
    pub feedback_type: String,
    pub comment: String,
    pub is_anonymous: bool,
    pub email: String,
}

impl FeedbackForm {
    /// Validate every field and build the insert payload.
    ///
    /// The email is only checked when the submitter is not anonymous, and is
    /// dropped entirely for anonymous feedback.
    pub fn validate(&self) -> Result<NewFeedback, AppError> {
        let mut errors = FieldErrors::new();

        let device_type = parse_choice::<DeviceType>(
            &mut errors,
            "deviceType",
            &self.device_type,
            "Device platform",
        );
        record(
            &mut errors,
            "deviceModel",
            validate_required(&self.device_model, "Device model"),
        );
        let feedback_type = parse_choice::<FeedbackType>(
            &mut errors,
            "feedbackType",
            &self.feedback_type,
            "Feedback type",
        );

        let comment_check = validate_required(&self.comment, "Comment");
        if comment_check.is_valid {
            record(
                &mut errors,
                "comment",
                validate_min_length(&self.comment, MIN_COMMENT_LENGTH, "Comment"),
            );
        } else {
            record(&mut errors, "comment", comment_check);
        }

        if !self.is_anonymous {
            if self.email.trim().is_empty() {
                record(
                    &mut errors,
                    "email",
                    ValidationResult::fail("Email is required for non-anonymous feedback"),
                );
            } else {
                record(&mut errors, "email", validate_email(&self.email));
            }
        }

        match (device_type, feedback_type) {
            (Some(device_type), Some(feedback_type)) if errors.is_empty() => Ok(NewFeedback {
                device_type,
                device_model: self.device_model.trim().to_string(),
                feedback_type,
                comment: self.comment.clone(),
                is_anonymous: self.is_anonymous,
                email: if self.is_anonymous {
                    None
                } else {
                    Some(self.email.trim().to_string())
                },
            }),
            _ => Err(AppError::validation(errors)),
        }
    }
}

/// Validate a registration and insert it as a `pending` tester.
pub async fn submit_registration(
    store: &dyn Store,
    form: &RegistrationForm,
    strict_platform_emails: bool,
) -> Result<Tester, AppError> {
    let new_tester = form.validate(strict_platform_emails)?;
    let tester = store.insert_tester(new_tester).await?;
    log::info!("Registered beta tester {} ({})", tester.id, tester.device_type);
    Ok(tester)
}

/// Validate a feedback submission and insert it as `to_discuss`.
pub async fn submit_feedback(store: &dyn Store, form: &FeedbackForm) -> Result<Feedback, AppError> {
    let new_feedback = form.validate()?;
    let feedback = store.insert_feedback(new_feedback).await?;
    log::info!("Received {} feedback {}", feedback.feedback_type, feedback.id);
    Ok(feedback)
}

fn record(errors: &mut FieldErrors, field: &str, result: ValidationResult) {
    if !result.is_valid {
        errors.insert(field.to_string(), result.message);
    }
}

/// Required select field: blank reports "<label> is required", an unknown
/// option reports "Please select a valid <label>".
fn parse_choice<T: FromStr>(
    errors: &mut FieldErrors,
    field: &str,
    value: &str,
    label: &str,
) -> Option<T> {
    let required = validate_required(value, label);
    if !required.is_valid {
        record(errors, field, required);
        return None;
    }
    match value.parse::<T>() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            errors.insert(
                field.to_string(),
                format!("Please select a valid {}", label.to_lowercase()),
            );
            None
        }
    }
}
