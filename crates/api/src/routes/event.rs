use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use bson::{Document, oid::ObjectId};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use tracing::info;
use unical_db::models::{
    Attendee, AttendanceStatus, CalendarType, Event, EventStatus, EventType, Priority, Reminder,
    ReminderMethod, Team, day_of, day_start, default_color, default_end_time, default_start_time,
};
use unical_services::{
    EventChange,
    calendar::{DateRange, parse_calendar_date},
    dao::event::EventFilter,
    policy,
};

use super::{Empty, Envelope, parse_choice, parse_object_id, stored_id, to_rfc3339};
use crate::{error::ApiError, extractors::auth::AuthUser, state::AppState};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReminderInput {
    pub method: String,
    pub minutes_before: u32,
}

/// Body of both event creation routes. Everything is optional on the wire
/// so missing fields surface as validation errors.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CreateEventRequest {
    pub title: String,
    pub description: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    /// Single-day shorthand accepted by the team event route.
    pub date: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    #[serde(rename = "type")]
    pub event_type: Option<String>,
    pub calendar_type: Option<String>,
    pub team_id: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub is_all_day: Option<bool>,
    pub is_recurring: Option<bool>,
    pub recurrence_rule: Option<String>,
    pub location: Option<String>,
    pub color: Option<String>,
    pub timezone: Option<String>,
    pub attendees: Vec<String>,
    pub reminders: Vec<ReminderInput>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UpdateEventRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    #[serde(rename = "type")]
    pub event_type: Option<String>,
    pub calendar_type: Option<String>,
    pub team_id: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub is_all_day: Option<bool>,
    pub is_recurring: Option<bool>,
    pub recurrence_rule: Option<String>,
    pub location: Option<String>,
    pub color: Option<String>,
    pub timezone: Option<String>,
    pub attendees: Option<Vec<String>>,
    pub reminders: Option<Vec<ReminderInput>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ListEventsQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    #[serde(rename = "type")]
    pub event_type: Option<String>,
    pub status: Option<String>,
    pub team_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendeeResponse {
    pub user: String,
    pub status: AttendanceStatus,
    pub response_date: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderResponse {
    pub method: ReminderMethod,
    pub minutes_before: u32,
    pub sent: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventResponse {
    pub id: String,
    pub title: String,
    pub description: String,
    pub start_date: String,
    pub end_date: String,
    pub start_time: String,
    pub end_time: String,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub calendar_type: CalendarType,
    pub team_id: Option<String>,
    pub user: String,
    pub status: EventStatus,
    pub priority: Priority,
    pub is_all_day: bool,
    pub is_recurring: bool,
    pub recurrence_rule: Option<String>,
    pub location: Option<String>,
    pub color: String,
    pub timezone: String,
    pub attendees: Vec<AttendeeResponse>,
    pub reminders: Vec<ReminderResponse>,
    pub comment_count: usize,
    pub attachment_count: usize,
    pub created_at: String,
    pub updated_at: String,
}

impl EventResponse {
    pub fn from_event(event: Event) -> Result<Self, ApiError> {
        Ok(Self {
            id: stored_id(event.id)?.to_hex(),
            title: event.title,
            description: event.description,
            start_date: day_of(event.start_date).format("%Y-%m-%d").to_string(),
            end_date: day_of(event.end_date).format("%Y-%m-%d").to_string(),
            start_time: event.start_time,
            end_time: event.end_time,
            event_type: event.event_type,
            calendar_type: event.calendar_type,
            team_id: event.team_id.map(|id| id.to_hex()),
            user: event.user.to_hex(),
            status: event.status,
            priority: event.priority,
            is_all_day: event.is_all_day,
            is_recurring: event.is_recurring,
            recurrence_rule: event.recurrence_rule,
            location: event.location,
            color: event.color,
            timezone: event.timezone,
            attendees: event
                .attendees
                .into_iter()
                .map(|a| AttendeeResponse {
                    user: a.user.to_hex(),
                    status: a.status,
                    response_date: a.response_date.map(to_rfc3339),
                })
                .collect(),
            reminders: event
                .reminders
                .into_iter()
                .map(|r| ReminderResponse {
                    method: r.method,
                    minutes_before: r.minutes_before,
                    sent: r.sent,
                })
                .collect(),
            comment_count: event.comments.len(),
            attachment_count: event.attachments.len(),
            created_at: to_rfc3339(event.created_at),
            updated_at: to_rfc3339(event.updated_at),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct EventPayload {
    pub event: EventResponse,
}

#[derive(Debug, Serialize)]
pub struct EventsPayload {
    pub events: Vec<EventResponse>,
}

impl EventsPayload {
    pub fn from_events(events: Vec<Event>) -> Result<Self, ApiError> {
        Ok(Self {
            events: events
                .into_iter()
                .map(EventResponse::from_event)
                .collect::<Result<_, _>>()?,
        })
    }
}

fn required_date(value: Option<&str>, field: &str) -> Result<NaiveDate, ApiError> {
    let value = value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::Validation(format!("{field} is required")))?;
    parse_calendar_date(value)
        .ok_or_else(|| ApiError::Validation("Invalid date format".to_string()))
}

fn optional_date(value: Option<&str>) -> Result<Option<NaiveDate>, ApiError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => parse_calendar_date(v)
            .map(Some)
            .ok_or_else(|| ApiError::Validation("Invalid date format".to_string())),
        None => Ok(None),
    }
}

fn check_time(value: &str, field: &str) -> Result<String, ApiError> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M")
        .map(|_| value.to_string())
        .map_err(|_| ApiError::Validation(format!("{field} must be HH:MM")))
}

fn check_span(start: NaiveDate, end: NaiveDate) -> Result<(), ApiError> {
    if end < start {
        return Err(ApiError::Validation(
            "End date must not be before start date".to_string(),
        ));
    }
    Ok(())
}

fn attendees_from(ids: &[String], previous: &[Attendee]) -> Result<Vec<Attendee>, ApiError> {
    let mut attendees: Vec<Attendee> = Vec::with_capacity(ids.len());
    for raw in ids {
        let user = parse_object_id(raw, "attendee")?;
        if attendees.iter().any(|a| a.user == user) {
            continue;
        }
        let kept = previous.iter().find(|a| a.user == user).cloned();
        attendees.push(kept.unwrap_or(Attendee {
            user,
            status: AttendanceStatus::NotResponded,
            response_date: None,
        }));
    }
    Ok(attendees)
}

fn reminders_from(inputs: &[ReminderInput]) -> Result<Vec<Reminder>, ApiError> {
    inputs
        .iter()
        .map(|r| -> Result<Reminder, ApiError> {
            Ok(Reminder {
                method: parse_choice(&r.method, "reminder method")?,
                minutes_before: r.minutes_before,
                sent: false,
            })
        })
        .collect()
}

fn as_bson<T: Serialize>(value: &T) -> Result<bson::Bson, ApiError> {
    bson::to_bson(value).map_err(|e| ApiError::Internal(e.to_string()))
}

/// A `teamId` the client actually filled in; blank means none.
fn requested_team_id(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|t| !t.is_empty())
}

/// Team an event belongs to, when it is a team event whose team still exists.
pub(crate) async fn team_of(state: &AppState, event: &Event) -> Result<Option<Team>, ApiError> {
    match (event.calendar_type, event.team_id) {
        (CalendarType::Team, Some(team_id)) => Ok(state.teams.find_optional(team_id).await?),
        _ => Ok(None),
    }
}

/// Shared by `POST /events/create` and `POST /teams/event`. The team route
/// forces the team calendar and lets `date` stand in for missing bounds.
pub(crate) async fn create_event(
    state: &AppState,
    auth: &AuthUser,
    body: CreateEventRequest,
    team_route: bool,
) -> Result<Event, ApiError> {
    let title = body.title.trim().to_string();
    let fallback = if team_route { body.date.as_deref() } else { None };

    if team_route {
        if title.is_empty()
            || requested_team_id(body.team_id.as_deref()).is_none()
            || body.start_date.as_deref().or(fallback).is_none()
        {
            return Err(ApiError::Validation(
                "TeamId, title, and date are required".to_string(),
            ));
        }
    } else if title.is_empty()
        || body.start_date.is_none()
        || body.end_date.is_none()
        || body.event_type.is_none()
    {
        return Err(ApiError::Validation(
            "Title, start date, end date, and type are required".to_string(),
        ));
    }

    let start = required_date(body.start_date.as_deref().or(fallback), "Start date")?;
    let end = match body.end_date.as_deref().or(fallback) {
        Some(value) => required_date(Some(value), "End date")?,
        None => start,
    };
    check_span(start, end)?;

    let calendar_type = if team_route {
        CalendarType::Team
    } else {
        match body.calendar_type.as_deref() {
            Some(value) => parse_choice(value, "calendarType")?,
            None => CalendarType::Personal,
        }
    };

    let team = match (calendar_type, requested_team_id(body.team_id.as_deref())) {
        (CalendarType::Team, Some(raw)) => {
            let team_id = parse_object_id(raw, "teamId")?;
            let team = state.teams.find_optional(team_id).await?;
            policy::authorize_team_event_create(team.as_ref(), auth.user_id)?;
            team
        }
        (CalendarType::Team, None) => {
            return Err(ApiError::Validation(
                "Team events require a teamId".to_string(),
            ));
        }
        (CalendarType::Personal, Some(_)) => {
            return Err(ApiError::Validation(
                "Personal events cannot have a teamId".to_string(),
            ));
        }
        (CalendarType::Personal, None) => None,
    };

    let now = bson::DateTime::now();
    let event = Event {
        id: None,
        title,
        description: body.description.unwrap_or_default(),
        start_date: day_start(start),
        end_date: day_start(end),
        start_time: match body.start_time.as_deref() {
            Some(t) => check_time(t, "Start time")?,
            None => default_start_time(),
        },
        end_time: match body.end_time.as_deref() {
            Some(t) => check_time(t, "End time")?,
            None => default_end_time(),
        },
        event_type: match body.event_type.as_deref() {
            Some(value) => parse_choice(value, "type")?,
            None => EventType::Meeting,
        },
        calendar_type,
        team_id: team.as_ref().and_then(|t| t.id),
        user: auth.user_id,
        status: match body.status.as_deref() {
            Some(value) => parse_choice(value, "status")?,
            None => EventStatus::Pending,
        },
        priority: match body.priority.as_deref() {
            Some(value) => parse_choice(value, "priority")?,
            None => Priority::Medium,
        },
        is_all_day: body.is_all_day.unwrap_or(false),
        is_recurring: body.is_recurring.unwrap_or(false),
        recurrence_rule: body.recurrence_rule,
        location: body.location,
        color: body.color.unwrap_or_else(default_color),
        timezone: body.timezone.unwrap_or_else(|| "UTC".to_string()),
        attendees: attendees_from(&body.attendees, &[])?,
        reminders: reminders_from(&body.reminders)?,
        comments: Vec::new(),
        attachments: Vec::new(),
        created_at: now,
        updated_at: now,
    };

    let event = state.events.create(&event).await?;
    info!(
        event_id = ?event.id,
        user_id = %auth.user_id,
        calendar = ?event.calendar_type,
        "Event created"
    );
    state
        .feed
        .publish_event(EventChange::Created, &event, team.as_ref(), auth.user_id);
    Ok(event)
}

pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateEventRequest>,
) -> Result<(StatusCode, Json<Envelope<EventPayload>>), ApiError> {
    let event = create_event(&state, &auth, body, false).await?;
    Ok((
        StatusCode::CREATED,
        Json(Envelope::with_msg(
            "Event created successfully",
            EventPayload {
                event: EventResponse::from_event(event)?,
            },
        )),
    ))
}

pub(crate) fn filter_from(query: &ListEventsQuery) -> Result<EventFilter, ApiError> {
    Ok(EventFilter {
        range: DateRange::new(
            optional_date(query.start_date.as_deref())?,
            optional_date(query.end_date.as_deref())?,
        ),
        event_type: query
            .event_type
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .map(|v| parse_choice(v, "type"))
            .transpose()?,
        status: query
            .status
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .map(|v| parse_choice(v, "status"))
            .transpose()?,
    })
}

/// Events of one team, for an active member of it.
pub(crate) async fn list_team_events(
    state: &AppState,
    auth: &AuthUser,
    team_id: ObjectId,
    filter: &EventFilter,
) -> Result<Vec<Event>, ApiError> {
    let team = state.teams.find_optional(team_id).await?;
    policy::authorize_team_view(team.as_ref(), auth.user_id).map_err(|_| {
        ApiError::NotFound("Team not found or you are not an active member".to_string())
    })?;
    Ok(state.events.list_for_team(team_id, filter).await?)
}

pub async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ListEventsQuery>,
) -> Result<Json<Envelope<EventsPayload>>, ApiError> {
    let filter = filter_from(&query)?;

    let events = match query.team_id.as_deref().filter(|t| !t.trim().is_empty()) {
        Some(raw) => {
            let team_id = parse_object_id(raw, "teamId")?;
            list_team_events(&state, &auth, team_id, &filter).await?
        }
        None => {
            let team_ids: Vec<ObjectId> = state
                .teams
                .find_visible(auth.user_id)
                .await?
                .iter()
                .filter(|t| policy::is_active_member(t, auth.user_id))
                .filter_map(|t| t.id)
                .collect();
            state
                .events
                .list_visible(auth.user_id, &team_ids, &filter)
                .await?
        }
    };

    Ok(Json(Envelope::ok(EventsPayload::from_events(events)?)))
}

pub async fn get(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(event_id): Path<String>,
) -> Result<Json<Envelope<EventPayload>>, ApiError> {
    let event_id = parse_object_id(&event_id, "event id")?;
    let event = state.events.find_optional(event_id).await?;
    let team = match &event {
        Some(e) => team_of(&state, e).await?,
        None => None,
    };
    policy::authorize_event_view(event.as_ref(), auth.user_id, team.as_ref())?;

    let event = event.ok_or_else(|| ApiError::NotFound("Event not found".to_string()))?;
    Ok(Json(Envelope::ok(EventPayload {
        event: EventResponse::from_event(event)?,
    })))
}

/// Turns the provided fields into a `$set` document, re-checking the date
/// span and the team/calendar pairing against the stored event.
async fn merge_update(
    state: &AppState,
    auth: &AuthUser,
    event: &Event,
    body: UpdateEventRequest,
) -> Result<(Document, Option<Team>), ApiError> {
    let mut set = Document::new();

    if let Some(title) = body.title {
        let title = title.trim().to_string();
        if title.is_empty() {
            return Err(ApiError::Validation("Title cannot be empty".to_string()));
        }
        set.insert("title", title);
    }
    if let Some(description) = body.description {
        set.insert("description", description);
    }

    let start = optional_date(body.start_date.as_deref())?;
    let end = optional_date(body.end_date.as_deref())?;
    if start.is_some() || end.is_some() {
        let new_start = start.unwrap_or_else(|| day_of(event.start_date));
        let new_end = end.unwrap_or_else(|| day_of(event.end_date));
        check_span(new_start, new_end)?;
        set.insert("start_date", day_start(new_start));
        set.insert("end_date", day_start(new_end));
    }

    if let Some(t) = body.start_time.as_deref() {
        set.insert("start_time", check_time(t, "Start time")?);
    }
    if let Some(t) = body.end_time.as_deref() {
        set.insert("end_time", check_time(t, "End time")?);
    }
    if let Some(value) = body.event_type.as_deref() {
        let event_type: EventType = parse_choice(value, "type")?;
        set.insert("type", as_bson(&event_type)?);
    }
    if let Some(value) = body.status.as_deref() {
        let status: EventStatus = parse_choice(value, "status")?;
        set.insert("status", as_bson(&status)?);
    }
    if let Some(value) = body.priority.as_deref() {
        let priority: Priority = parse_choice(value, "priority")?;
        set.insert("priority", as_bson(&priority)?);
    }
    if let Some(v) = body.is_all_day {
        set.insert("is_all_day", v);
    }
    if let Some(v) = body.is_recurring {
        set.insert("is_recurring", v);
    }
    if let Some(v) = body.recurrence_rule {
        set.insert("recurrence_rule", v);
    }
    if let Some(v) = body.location {
        set.insert("location", v);
    }
    if let Some(v) = body.color {
        set.insert("color", v);
    }
    if let Some(v) = body.timezone {
        set.insert("timezone", v);
    }
    if let Some(ids) = body.attendees.as_deref() {
        let attendees = attendees_from(ids, &event.attendees)?;
        set.insert("attendees", as_bson(&attendees)?);
    }
    if let Some(inputs) = body.reminders.as_deref() {
        let reminders = reminders_from(inputs)?;
        set.insert("reminders", as_bson(&reminders)?);
    }

    let mut team = team_of(state, event).await?;
    if body.calendar_type.is_some() || body.team_id.is_some() {
        let calendar_type = match body.calendar_type.as_deref() {
            Some(value) => parse_choice(value, "calendarType")?,
            None => event.calendar_type,
        };
        match calendar_type {
            CalendarType::Personal => {
                if requested_team_id(body.team_id.as_deref()).is_some() {
                    return Err(ApiError::Validation(
                        "Personal events cannot have a teamId".to_string(),
                    ));
                }
                set.insert("calendar_type", "personal");
                set.insert("team_id", bson::Bson::Null);
                team = None;
            }
            CalendarType::Team => {
                let team_id = match requested_team_id(body.team_id.as_deref()) {
                    Some(raw) => parse_object_id(raw, "teamId")?,
                    None => event.team_id.ok_or_else(|| {
                        ApiError::Validation("Team events require a teamId".to_string())
                    })?,
                };
                if Some(team_id) != event.team_id || event.calendar_type != CalendarType::Team {
                    let target = state.teams.find_optional(team_id).await?;
                    policy::authorize_team_event_create(target.as_ref(), auth.user_id)?;
                    team = target;
                }
                set.insert("calendar_type", "team");
                set.insert("team_id", team_id);
            }
        }
    }

    Ok((set, team))
}

pub async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(event_id): Path<String>,
    Json(body): Json<UpdateEventRequest>,
) -> Result<Json<Envelope<EventPayload>>, ApiError> {
    let event_id = parse_object_id(&event_id, "event id")?;
    let event = state.events.find_optional(event_id).await?;
    let team = match &event {
        Some(e) => team_of(&state, e).await?,
        None => None,
    };
    let event = policy::authorize_event_modify(event.as_ref(), auth.user_id, team.as_ref())?;

    let (set, team) = merge_update(&state, &auth, event, body).await?;
    let updated = state.events.update_fields(event_id, set).await?;
    info!(%event_id, user_id = %auth.user_id, "Event updated");
    state
        .feed
        .publish_event(EventChange::Updated, &updated, team.as_ref(), auth.user_id);

    Ok(Json(Envelope::with_msg(
        "Event updated successfully",
        EventPayload {
            event: EventResponse::from_event(updated)?,
        },
    )))
}

pub async fn delete(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(event_id): Path<String>,
) -> Result<Json<Envelope<Empty>>, ApiError> {
    let event_id = parse_object_id(&event_id, "event id")?;
    let event = state.events.find_optional(event_id).await?;
    let team = match &event {
        Some(e) => team_of(&state, e).await?,
        None => None,
    };
    let event = policy::authorize_event_modify(event.as_ref(), auth.user_id, team.as_ref())?;

    if !state.events.delete(event_id).await? {
        return Err(ApiError::NotFound("Event not found".to_string()));
    }
    info!(%event_id, user_id = %auth.user_id, "Event deleted");
    state
        .feed
        .publish_event(EventChange::Deleted, event, team.as_ref(), auth.user_id);

    Ok(Json(Envelope::with_msg("Event deleted successfully", Empty {})))
}
