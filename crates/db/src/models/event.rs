use bson::{DateTime, oid::ObjectId};
use chrono::{NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Calendar day, stored as UTC midnight.
    pub start_date: DateTime,
    /// Calendar day, stored as UTC midnight. Inclusive.
    pub end_date: DateTime,
    #[serde(default = "default_start_time")]
    pub start_time: String,
    #[serde(default = "default_end_time")]
    pub end_time: String,
    #[serde(rename = "type", default)]
    pub event_type: EventType,
    #[serde(default)]
    pub calendar_type: CalendarType,
    /// Present iff `calendar_type` is `Team`.
    pub team_id: Option<ObjectId>,
    /// Owner of a personal event, creator of a team event.
    pub user: ObjectId,
    #[serde(default)]
    pub status: EventStatus,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub is_all_day: bool,
    #[serde(default)]
    pub is_recurring: bool,
    /// iCalendar RRULE text. Stored as given, never expanded.
    pub recurrence_rule: Option<String>,
    pub location: Option<String>,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default)]
    pub attendees: Vec<Attendee>,
    #[serde(default)]
    pub reminders: Vec<Reminder>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    #[default]
    Meeting,
    Task,
    Personal,
    Deadline,
    Email,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CalendarType {
    #[default]
    Personal,
    Team,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum EventStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attendee {
    pub user: ObjectId,
    #[serde(default)]
    pub status: AttendanceStatus,
    pub response_date: Option<DateTime>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum AttendanceStatus {
    Attending,
    Maybe,
    Declined,
    #[default]
    NotResponded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reminder {
    pub method: ReminderMethod,
    pub minutes_before: u32,
    #[serde(default)]
    pub sent: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReminderMethod {
    Email,
    Push,
    Sms,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub user: ObjectId,
    pub text: String,
    pub created_at: DateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub url: String,
    pub content_type: Option<String>,
    pub size: Option<u64>,
    pub uploaded_at: DateTime,
}

pub fn default_start_time() -> String {
    "09:00".to_string()
}

pub fn default_end_time() -> String {
    "10:00".to_string()
}

pub fn default_color() -> String {
    "#3B82F6".to_string()
}

fn default_timezone() -> String {
    "UTC".to_string()
}

/// UTC midnight of a calendar day, the stored form of event dates.
pub fn day_start(date: NaiveDate) -> DateTime {
    let midnight = Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN));
    DateTime::from_chrono(midnight)
}

/// Calendar day of a stored event date.
pub fn day_of(value: DateTime) -> NaiveDate {
    value.to_chrono().date_naive()
}

impl Event {
    pub const COLLECTION: &'static str = "events";

    pub fn is_attendee(&self, user_id: ObjectId) -> bool {
        self.attendees.iter().any(|a| a.user == user_id)
    }
}
