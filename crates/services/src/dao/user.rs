use bson::{DateTime, doc, oid::ObjectId};
use mongodb::Database;
use unical_db::models::{CalendarView, NotificationPrefs, User, normalize_email};

use super::base::{BaseDao, DaoError, DaoResult};

pub struct UserDao {
    pub base: BaseDao<User>,
}

/// Optional profile fields; `None` leaves the stored value untouched.
#[derive(Debug, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub profile_picture: Option<String>,
    pub timezone: Option<String>,
    pub default_calendar_view: Option<CalendarView>,
    pub default_reminder_minutes: Option<u32>,
    pub notification_preferences: Option<NotificationPrefs>,
}

impl UserDao {
    pub fn new(db: &Database) -> Self {
        Self {
            base: BaseDao::new(db, User::COLLECTION),
        }
    }

    /// Inserts a user. A second account for the same email (in any case)
    /// fails with `DuplicateKey` through the unique email index.
    pub async fn create(
        &self,
        email: &str,
        name: String,
        password_hash: Option<String>,
    ) -> DaoResult<User> {
        let now = DateTime::now();
        let user = User {
            id: None,
            email: normalize_email(email),
            name,
            password_hash,
            otp: None,
            profile_picture: String::new(),
            timezone: "UTC".to_string(),
            default_calendar_view: CalendarView::Month,
            default_reminder_minutes: 30,
            notification_preferences: NotificationPrefs::default(),
            created_at: now,
            updated_at: now,
        };

        let id = self.base.insert_one(&user).await?;
        self.base.find_by_id(id).await
    }

    pub async fn find_by_email(&self, email: &str) -> DaoResult<User> {
        self.base
            .find_one(doc! { "email": normalize_email(email) })
            .await?
            .ok_or(DaoError::NotFound)
    }

    pub async fn exists(&self, email: &str) -> DaoResult<bool> {
        let count = self
            .base
            .count(doc! { "email": normalize_email(email) })
            .await?;
        Ok(count > 0)
    }

    pub async fn set_otp(&self, user_id: ObjectId, otp: &str) -> DaoResult<bool> {
        self.base
            .update_by_id(user_id, doc! { "$set": { "otp": otp } })
            .await
    }

    pub async fn update_profile(
        &self,
        user_id: ObjectId,
        profile: ProfileUpdate,
    ) -> DaoResult<bool> {
        let mut update = bson::Document::new();
        if let Some(name) = profile.name {
            update.insert("name", name);
        }
        if let Some(picture) = profile.profile_picture {
            update.insert("profile_picture", picture);
        }
        if let Some(tz) = profile.timezone {
            update.insert("timezone", tz);
        }
        if let Some(view) = profile.default_calendar_view {
            update.insert("default_calendar_view", bson::to_bson(&view)?);
        }
        if let Some(minutes) = profile.default_reminder_minutes {
            update.insert("default_reminder_minutes", minutes as i64);
        }
        if let Some(prefs) = profile.notification_preferences {
            update.insert("notification_preferences", bson::to_bson(&prefs)?);
        }

        if update.is_empty() {
            return Ok(false);
        }

        self.base
            .update_by_id(user_id, doc! { "$set": update })
            .await
    }
}
