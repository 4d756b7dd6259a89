//! User account and notification preference models.

use serde::{Deserialize, Serialize};

use crate::validation::ValidationErrors;

/// A login account. The password hash never leaves the store.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub is_active: bool,
    pub date_joined: String,
}

/// Public view of a user, embedded in staff and preference records.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub is_active: bool,
}

/// Fields for provisioning an account.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

impl NewUser {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.text("username", &Some(self.username.clone()), 150);
        errors.text("password", &Some(self.password.clone()), 128);
        errors.optional_email("email", &Some(self.email.clone()));
        errors.into_result()
    }
}

/// Per-user notification toggles.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationPreference {
    pub id: i64,
    pub user: UserSummary,
    pub email_notifications: bool,
    pub sms_alerts: bool,
    pub test_results_ready: bool,
    pub system_updates: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationPreferenceInput {
    pub user_id: Option<i64>,
    pub email_notifications: Option<bool>,
    pub sms_alerts: Option<bool>,
    pub test_results_ready: Option<bool>,
    pub system_updates: Option<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NotificationPreferenceFields {
    pub user_id: i64,
    pub email_notifications: bool,
    pub sms_alerts: bool,
    pub test_results_ready: bool,
    pub system_updates: bool,
}

impl NotificationPreferenceInput {
    pub fn validate(&self) -> Result<NotificationPreferenceFields, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let user_id = errors.required("user_id", &self.user_id);
        errors.into_result()?;

        Ok(NotificationPreferenceFields {
            user_id: user_id.unwrap_or_default(),
            email_notifications: self.email_notifications.unwrap_or(true),
            sms_alerts: self.sms_alerts.unwrap_or(false),
            test_results_ready: self.test_results_ready.unwrap_or(true),
            system_updates: self.system_updates.unwrap_or(true),
        })
    }
}

impl From<&NotificationPreference> for NotificationPreferenceInput {
    fn from(p: &NotificationPreference) -> Self {
        Self {
            user_id: Some(p.user.id),
            email_notifications: Some(p.email_notifications),
            sms_alerts: Some(p.sms_alerts),
            test_results_ready: Some(p.test_results_ready),
            system_updates: Some(p.system_updates),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preference_defaults() {
        let fields = NotificationPreferenceInput {
            user_id: Some(3),
            ..Default::default()
        }
        .validate()
        .unwrap();
        assert!(fields.email_notifications);
        assert!(!fields.sms_alerts);
        assert!(fields.test_results_ready);
        assert!(fields.system_updates);
    }

    #[test]
    fn test_new_user_requires_credentials() {
        let errors = NewUser::new("", "").validate().unwrap_err();
        assert!(errors.has("username"));
        assert!(errors.has("password"));
        assert!(NewUser::new("admin", "s3cret").validate().is_ok());
    }
}
