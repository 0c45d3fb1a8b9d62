use bson::{DateTime, Document, doc, oid::ObjectId};
use mongodb::Database;
use unical_db::models::{AttendanceStatus, Event, EventStatus, EventType};

use super::base::{BaseDao, DaoError, DaoResult};
use crate::calendar::DateRange;

pub struct EventDao {
    pub base: BaseDao<Event>,
}

/// Optional narrowing applied on top of visibility.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub range: DateRange,
    pub event_type: Option<EventType>,
    pub status: Option<EventStatus>,
}

impl EventFilter {
    fn apply(&self, filter: &mut Document) -> DaoResult<()> {
        for (key, value) in self.range.to_filter() {
            filter.insert(key, value);
        }
        if let Some(event_type) = self.event_type {
            filter.insert("type", bson::to_bson(&event_type)?);
        }
        if let Some(status) = self.status {
            filter.insert("status", bson::to_bson(&status)?);
        }
        Ok(())
    }
}

/// Events a user may see without naming a team: owned, attending, or
/// belonging to one of `team_ids`.
pub fn visibility_filter(user_id: ObjectId, team_ids: &[ObjectId]) -> Document {
    let mut any_of = vec![
        bson::Bson::Document(doc! { "user": user_id }),
        bson::Bson::Document(doc! { "attendees.user": user_id }),
    ];
    if !team_ids.is_empty() {
        any_of.push(bson::Bson::Document(doc! {
            "calendar_type": "team",
            "team_id": { "$in": team_ids },
        }));
    }
    doc! { "$or": any_of }
}

impl EventDao {
    pub fn new(db: &Database) -> Self {
        Self {
            base: BaseDao::new(db, Event::COLLECTION),
        }
    }

    pub async fn create(&self, event: &Event) -> DaoResult<Event> {
        let id = self.base.insert_one(event).await?;
        self.base.find_by_id(id).await
    }

    pub async fn find_optional(&self, event_id: ObjectId) -> DaoResult<Option<Event>> {
        self.base.find_one(doc! { "_id": event_id }).await
    }

    pub async fn list_visible(
        &self,
        user_id: ObjectId,
        team_ids: &[ObjectId],
        filter: &EventFilter,
    ) -> DaoResult<Vec<Event>> {
        let mut query = visibility_filter(user_id, team_ids);
        filter.apply(&mut query)?;
        self.base
            .find_many(query, Some(doc! { "start_date": 1, "start_time": 1 }))
            .await
    }

    pub async fn list_for_team(
        &self,
        team_id: ObjectId,
        filter: &EventFilter,
    ) -> DaoResult<Vec<Event>> {
        let mut query = doc! { "team_id": team_id, "calendar_type": "team" };
        filter.apply(&mut query)?;
        self.base
            .find_many(query, Some(doc! { "start_date": 1, "start_time": 1 }))
            .await
    }

    /// Merges `fields` into the stored event and returns the result.
    pub async fn update_fields(&self, event_id: ObjectId, fields: Document) -> DaoResult<Event> {
        if !fields.is_empty() {
            let matched = self
                .base
                .update_by_id(event_id, doc! { "$set": fields })
                .await?;
            if !matched {
                return Err(DaoError::NotFound);
            }
        }
        self.base.find_by_id(event_id).await
    }

    pub async fn delete(&self, event_id: ObjectId) -> DaoResult<bool> {
        let deleted = self.base.hard_delete(doc! { "_id": event_id }).await?;
        Ok(deleted > 0)
    }

    /// Sets the attendance of an existing attendee entry; other attendees
    /// are untouched. Returns false when the user is not an attendee.
    pub async fn update_attendance(
        &self,
        event_id: ObjectId,
        user_id: ObjectId,
        status: AttendanceStatus,
    ) -> DaoResult<bool> {
        self.base
            .update_one(
                doc! { "_id": event_id, "attendees.user": user_id },
                doc! {
                    "$set": {
                        "attendees.$.status": bson::to_bson(&status)?,
                        "attendees.$.response_date": DateTime::now(),
                    }
                },
            )
            .await
    }
}
