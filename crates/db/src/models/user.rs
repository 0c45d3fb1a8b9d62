use bson::{DateTime, oid::ObjectId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    /// Always stored lower-cased.
    pub email: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
    /// Last OTP issued to this user. Overwritten on every OTP request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub otp: Option<String>,
    #[serde(default)]
    pub profile_picture: String,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default)]
    pub default_calendar_view: CalendarView,
    #[serde(default = "default_reminder_minutes")]
    pub default_reminder_minutes: u32,
    #[serde(default)]
    pub notification_preferences: NotificationPrefs,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CalendarView {
    Day,
    Week,
    #[default]
    Month,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationPrefs {
    #[serde(default = "bool_true")]
    pub email: bool,
    #[serde(default = "bool_true")]
    pub push: bool,
}

impl Default for NotificationPrefs {
    fn default() -> Self {
        Self {
            email: true,
            push: true,
        }
    }
}

fn bool_true() -> bool {
    true
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_reminder_minutes() -> u32 {
    30
}

impl User {
    pub const COLLECTION: &'static str = "users";

    /// Display name, falling back to the local part of the email.
    pub fn display_name(&self) -> String {
        if self.name.trim().is_empty() {
            name_from_email(&self.email)
        } else {
            self.name.clone()
        }
    }
}

/// Canonical form used for storage and comparison of email addresses.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn name_from_email(email: &str) -> String {
    email.split('@').next().unwrap_or_default().to_string()
}
