//! Authorization decisions for teams and events.
//!
//! Everything here is pure: callers load the documents, ask for a decision
//! and only then mutate. Pending (email-only) members never match a user id,
//! so they can neither administer a team nor edit its events.
//!
//! The `authorize_*` helpers share one convention: an actor who cannot see
//! the resource gets `NotFound`, an actor who can see it but may not perform
//! the action gets `Forbidden`.

use bson::oid::ObjectId;
use thiserror::Error;
use unical_db::models::{
    CalendarType, Event, MemberPermission, MemberRole, MemberStatus, Team,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Denial {
    #[error("{0}")]
    NotFound(&'static str),
    #[error("{0}")]
    Forbidden(&'static str),
    #[error("{0}")]
    Unauthenticated(&'static str),
}

pub type Decision<T = ()> = Result<T, Denial>;

pub fn is_team_admin(team: &Team, user_id: ObjectId) -> bool {
    team.admin == user_id
        || team
            .members
            .iter()
            .any(|m| m.user.is_user(user_id) && m.role == MemberRole::Admin)
}

pub fn is_active_member(team: &Team, user_id: ObjectId) -> bool {
    is_team_admin(team, user_id)
        || team
            .members
            .iter()
            .any(|m| m.user.is_user(user_id) && m.status == MemberStatus::Active)
}

pub fn can_edit_team_events(team: &Team, user_id: ObjectId) -> bool {
    is_team_admin(team, user_id)
        || team.members.iter().any(|m| {
            m.user.is_user(user_id)
                && m.status == MemberStatus::Active
                && m.permissions == MemberPermission::Edit
        })
}

/// Invitations are a privileged action: admins only.
pub fn can_invite(team: &Team, user_id: ObjectId) -> bool {
    is_team_admin(team, user_id)
}

/// `team` is the event's team, if it is a team event and the team exists.
pub fn can_modify_event(event: &Event, user_id: ObjectId, team: Option<&Team>) -> bool {
    if event.user == user_id {
        return true;
    }
    match event.calendar_type {
        CalendarType::Team => team
            .filter(|t| t.id.is_some() && t.id == event.team_id)
            .is_some_and(|t| can_edit_team_events(t, user_id)),
        CalendarType::Personal => false,
    }
}

pub fn can_view_event(event: &Event, user_id: ObjectId, team: Option<&Team>) -> bool {
    if event.user == user_id || event.is_attendee(user_id) {
        return true;
    }
    match event.calendar_type {
        CalendarType::Team => team
            .filter(|t| t.id.is_some() && t.id == event.team_id)
            .is_some_and(|t| is_active_member(t, user_id)),
        CalendarType::Personal => false,
    }
}

pub fn authorize_team_view(team: Option<&Team>, user_id: ObjectId) -> Decision<&Team> {
    match team {
        Some(team) if is_active_member(team, user_id) => Ok(team),
        _ => Err(Denial::NotFound("Team not found or you don't have access")),
    }
}

pub fn authorize_team_admin(team: Option<&Team>, user_id: ObjectId) -> Decision<&Team> {
    let team = authorize_team_view(team, user_id)?;
    if is_team_admin(team, user_id) {
        Ok(team)
    } else {
        Err(Denial::Forbidden("Only team admins can manage members"))
    }
}

pub fn authorize_invite(team: Option<&Team>, user_id: ObjectId) -> Decision<&Team> {
    let team = authorize_team_view(team, user_id)?;
    if can_invite(team, user_id) {
        Ok(team)
    } else {
        Err(Denial::Forbidden(
            "You don't have permission to invite members to this team",
        ))
    }
}

pub fn authorize_team_event_create(team: Option<&Team>, user_id: ObjectId) -> Decision<&Team> {
    let team = authorize_team_view(team, user_id)?;
    if can_edit_team_events(team, user_id) {
        Ok(team)
    } else {
        Err(Denial::Forbidden(
            "You don't have permission to create events for this team",
        ))
    }
}

pub fn authorize_event_view<'a>(
    event: Option<&'a Event>,
    user_id: ObjectId,
    team: Option<&Team>,
) -> Decision<&'a Event> {
    match event {
        Some(event) if can_view_event(event, user_id, team) => Ok(event),
        _ => Err(Denial::NotFound("Event not found")),
    }
}

pub fn authorize_event_modify<'a>(
    event: Option<&'a Event>,
    user_id: ObjectId,
    team: Option<&Team>,
) -> Decision<&'a Event> {
    let event = authorize_event_view(event, user_id, team)?;
    if can_modify_event(event, user_id, team) {
        Ok(event)
    } else {
        Err(Denial::Forbidden("You don't have permission to modify this event"))
    }
}

pub fn authorize_attendance(event: Option<&Event>, user_id: ObjectId) -> Decision<&Event> {
    match event {
        Some(event) if event.is_attendee(user_id) => Ok(event),
        _ => Err(Denial::NotFound("Event not found or you are not an attendee")),
    }
}
