//! Email bodies rendered with handlebars.
//!
//! Templates are compiled into the binary. Every interpolated value goes
//! through handlebars' HTML escaping, so tester names cannot inject markup.

use super::OutgoingEmail;
use crate::error::AppError;
use crate::models::Platform;
use handlebars::Handlebars;
use serde::Serialize;

pub const INVITATION_SUBJECT: &str = "You're Invited to Join Our Beta Test!";
pub const INVITATION_REMINDER_SUBJECT: &str = "You're Invited to Join Our Beta Test! (Reminder)";
pub const FEEDBACK_REQUEST_SUBJECT: &str = "Share Your Feedback - Help Us Improve Our App!";

const INVITATION_TEMPLATE: &str = "invitation";
const FEEDBACK_REQUEST_TEMPLATE: &str = "feedback_request";

/// Program details woven into every email.
#[derive(Debug, Clone, Serialize)]
pub struct Branding {
    pub app_name: String,
    pub team_name: String,
    pub support_email: Option<String>,
    /// Free-form date shown in invitations, e.g. "June 23rd, 2025".
    pub testing_start_date: Option<String>,
}

impl Default for Branding {
    fn default() -> Self {
        Self {
            app_name: "MCCI Tax Refund System".to_string(),
            team_name: "Beta Testing Team".to_string(),
            support_email: None,
            testing_start_date: None,
        }
    }
}

#[derive(Serialize)]
struct InvitationContext<'a> {
    #[serde(flatten)]
    branding: &'a Branding,
    tester_name: &'a str,
    platform_name: &'a str,
    invitation_link: &'a str,
}

#[derive(Serialize)]
struct FeedbackRequestContext<'a> {
    #[serde(flatten)]
    branding: &'a Branding,
    tester_name: &'a str,
    feedback_url: &'a str,
}

pub struct EmailTemplates {
    registry: Handlebars<'static>,
    branding: Branding,
}

impl EmailTemplates {
    pub fn new(branding: Branding) -> Result<Self, AppError> {
        let mut registry = Handlebars::new();
        registry.register_template_string(
            INVITATION_TEMPLATE,
            include_str!("../templates/invitation.hbs"),
        )?;
        registry.register_template_string(
            FEEDBACK_REQUEST_TEMPLATE,
            include_str!("../templates/feedback_request.hbs"),
        )?;
        Ok(Self { registry, branding })
    }

    pub fn branding(&self) -> &Branding {
        &self.branding
    }

    /// Render the beta invitation for one tester
    ///
    /// # Arguments
    /// * `to` - Recipient address
    /// * `tester_name` - Name used in the greeting
    /// * `platform` - Store the tester is invited through
    /// * `invitation_link` - Opt-in link for that store
    /// * `reminder` - Use the "(Reminder)" subject for a resend
    ///
    /// # Returns
    /// * `Result<OutgoingEmail, AppError>` - The message, or a mail error if
    ///   rendering fails
    pub fn invitation(
        &self,
        to: &str,
        tester_name: &str,
        platform: Platform,
        invitation_link: &str,
        reminder: bool,
    ) -> Result<OutgoingEmail, AppError> {
        let html = self.registry.render(
            INVITATION_TEMPLATE,
            &InvitationContext {
                branding: &self.branding,
                tester_name,
                platform_name: platform.display_name(),
                invitation_link,
            },
        )?;
        let subject = if reminder {
            INVITATION_REMINDER_SUBJECT
        } else {
            INVITATION_SUBJECT
        };
        Ok(OutgoingEmail {
            to: to.to_string(),
            subject: subject.to_string(),
            html,
        })
    }

    /// Render the "please share your feedback" request.
    pub fn feedback_request(
        &self,
        to: &str,
        tester_name: &str,
        feedback_url: &str,
    ) -> Result<OutgoingEmail, AppError> {
        let html = self.registry.render(
            FEEDBACK_REQUEST_TEMPLATE,
            &FeedbackRequestContext {
                branding: &self.branding,
                tester_name,
                feedback_url,
            },
        )?;
        Ok(OutgoingEmail {
            to: to.to_string(),
            subject: FEEDBACK_REQUEST_SUBJECT.to_string(),
            html,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn templates() -> EmailTemplates {
        EmailTemplates::new(Branding {
            support_email: Some("help@example.com".into()),
            testing_start_date: Some("June 23rd, 2025".into()),
            ..Branding::default()
        })
        .unwrap()
    }

    #[test]
    fn test_invitation_mentions_platform_and_link() {
        let email = templates()
            .invitation(
                "jane@gmail.com",
                "Jane",
                Platform::GooglePlay,
                "https://play.google.com/apps/testing/com.example",
                false,
            )
            .unwrap();
        assert_eq!(email.subject, INVITATION_SUBJECT);
        assert!(email.html.contains("Hello Jane,"));
        assert!(email.html.contains("Google Play Store"));
        assert!(email.html.contains("https://play.google.com/apps/testing/com.example"));
        assert!(email.html.contains("June 23rd, 2025"));
        assert!(email.html.contains("mailto:help@example.com"));
    }

    #[test]
    fn test_reminder_subject() {
        let email = templates()
            .invitation("a@icloud.com", "A", Platform::AppStore, "https://x", true)
            .unwrap();
        assert_eq!(email.subject, INVITATION_REMINDER_SUBJECT);
        assert!(email.html.contains("Apple TestFlight"));
    }

    #[test]
    fn test_values_are_html_escaped() {
        let email = templates()
            .feedback_request("a@b.com", "<script>alert(1)</script>", "https://portal/feedback")
            .unwrap();
        assert_eq!(email.subject, FEEDBACK_REQUEST_SUBJECT);
        assert!(!email.html.contains("<script>"));
        assert!(email.html.contains("&lt;script&gt;"));
        assert!(email.html.contains("https://portal/feedback"));
    }

    #[test]
    fn test_default_branding() {
        let templates = EmailTemplates::new(Branding::default()).unwrap();
        let email = templates
            .feedback_request("a@b.com", "A", "https://portal/feedback")
            .unwrap();
        assert!(email.html.contains("MCCI Tax Refund System"));
        assert!(!email.html.contains("mailto:"));
    }
}
