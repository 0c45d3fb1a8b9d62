use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use bson::{DateTime, oid::ObjectId};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use unical_db::models::{
    AttendanceStatus, Invitation, InvitationStatus, Member, MemberPermission, MemberRef,
    MemberRole, MemberStatus, Team, normalize_email,
};
use unical_services::{
    EventChange,
    dao::{base::DaoError, team::JoinOutcome},
    mail::InvitationMail,
    policy,
};
use validator::Validate;

use super::event::{
    CreateEventRequest, EventPayload, EventResponse, EventsPayload, ListEventsQuery, create_event,
    filter_from, list_team_events, team_of,
};
use super::{Empty, Envelope, parse_choice, parse_object_id, stored_id, to_rfc3339};
use crate::{error::ApiError, extractors::auth::AuthUser, state::AppState};

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct CreateTeamRequest {
    #[validate(length(min = 1, max = 100, message = "Team name is required"))]
    pub name: String,
    #[validate(length(max = 500, message = "Description must be at most 500 characters"))]
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct InviteRequest {
    pub team_id: String,
    #[validate(email(message = "A valid email is required"))]
    pub email: String,
    pub name: Option<String>,
    #[validate(length(max = 1000, message = "Message must be at most 1000 characters"))]
    pub message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AddMembersRequest {
    pub team_id: String,
    pub emails: Vec<String>,
    pub permissions: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UpdateMemberRequest {
    pub team_id: String,
    pub member_id: String,
    pub role: Option<String>,
    pub permissions: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AttendanceRequest {
    pub status: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberResponse {
    /// User id, or the email address of a member without an account yet.
    pub user: String,
    pub role: MemberRole,
    pub status: MemberStatus,
    pub permissions: MemberPermission,
    pub added_at: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamResponse {
    pub id: String,
    pub name: String,
    pub description: String,
    pub admin: String,
    pub members: Vec<MemberResponse>,
    pub created_at: String,
    pub updated_at: String,
}

impl TeamResponse {
    fn from_team(team: Team) -> Result<Self, ApiError> {
        Ok(Self {
            id: stored_id(team.id)?.to_hex(),
            name: team.name,
            description: team.description,
            admin: team.admin.to_hex(),
            members: team
                .members
                .into_iter()
                .map(|m| MemberResponse {
                    user: m.user.to_string(),
                    role: m.role,
                    status: m.status,
                    permissions: m.permissions,
                    added_at: to_rfc3339(m.added_at),
                })
                .collect(),
            created_at: to_rfc3339(team.created_at),
            updated_at: to_rfc3339(team.updated_at),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct TeamPayload {
    pub team: TeamResponse,
}

impl TeamPayload {
    fn from_team(team: Team) -> Result<Self, ApiError> {
        Ok(Self {
            team: TeamResponse::from_team(team)?,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct TeamsPayload {
    pub teams: Vec<TeamResponse>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvitationResponse {
    pub id: String,
    pub team: String,
    pub email: String,
    pub name: Option<String>,
    pub inviter: String,
    pub status: InvitationStatus,
    pub message: Option<String>,
    pub token: String,
    pub expires_at: String,
}

impl InvitationResponse {
    fn from_invitation(invitation: Invitation) -> Result<Self, ApiError> {
        Ok(Self {
            id: stored_id(invitation.id)?.to_hex(),
            team: invitation.team.to_hex(),
            email: invitation.invitee.email,
            name: invitation.invitee.name,
            inviter: invitation.inviter.to_hex(),
            status: invitation.status,
            message: invitation.message,
            token: invitation.token,
            expires_at: to_rfc3339(invitation.expires_at),
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvitePayload {
    pub invitation: InvitationResponse,
    pub email_sent: bool,
}

#[derive(Debug, Serialize)]
pub struct AddMembersPayload {
    pub team: TeamResponse,
    pub added: usize,
    pub skipped: Vec<String>,
}

async fn load_team(state: &AppState, team_id: ObjectId) -> Result<Team, ApiError> {
    state
        .teams
        .find_optional(team_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Team not found".to_string()))
}

pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateTeamRequest>,
) -> Result<(StatusCode, Json<Envelope<TeamPayload>>), ApiError> {
    let name = body.name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::Validation("Team name is required".to_string()));
    }
    body.validate()?;

    let team = state
        .teams
        .create(name, body.description.unwrap_or_default(), auth.user_id)
        .await?;
    info!(team_id = ?team.id, admin = %auth.user_id, "Team created");

    Ok((
        StatusCode::CREATED,
        Json(Envelope::with_msg(
            "Team created successfully",
            TeamPayload::from_team(team)?,
        )),
    ))
}

pub async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Envelope<TeamsPayload>>, ApiError> {
    let teams = state
        .teams
        .find_visible(auth.user_id)
        .await?
        .into_iter()
        .map(TeamResponse::from_team)
        .collect::<Result<_, _>>()?;

    Ok(Json(Envelope::ok(TeamsPayload { teams })))
}

pub async fn get(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(team_id): Path<String>,
) -> Result<Json<Envelope<TeamPayload>>, ApiError> {
    let team_id = parse_object_id(&team_id, "team id")?;
    let team = state.teams.find_optional(team_id).await?;
    policy::authorize_team_view(team.as_ref(), auth.user_id)?;

    let team = team.ok_or_else(|| ApiError::NotFound("Team not found".to_string()))?;
    Ok(Json(Envelope::ok(TeamPayload::from_team(team)?)))
}

pub async fn invite(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<InviteRequest>,
) -> Result<(StatusCode, Json<Envelope<InvitePayload>>), ApiError> {
    if body.team_id.trim().is_empty() || body.email.trim().is_empty() {
        return Err(ApiError::Validation(
            "Team ID and email are required".to_string(),
        ));
    }
    body.validate()?;
    let team_id = parse_object_id(&body.team_id, "teamId")?;

    let team = state.teams.find_optional(team_id).await?;
    let team = policy::authorize_invite(team.as_ref(), auth.user_id)?;

    let email = normalize_email(&body.email);
    let registered = match state.users.find_by_email(&email).await {
        Ok(user) => Some(user),
        Err(DaoError::NotFound) => None,
        Err(e) => return Err(e.into()),
    };
    if let Some(user_id) = registered.as_ref().and_then(|u| u.id) {
        if policy::is_active_member(team, user_id) {
            return Err(ApiError::Conflict(
                "User is already a member of this team".to_string(),
            ));
        }
    }
    let invitee_name = registered
        .as_ref()
        .map(|u| u.display_name())
        .or(body.name.filter(|n| !n.trim().is_empty()));

    let invitation = state
        .invitations
        .create(team_id, &email, invitee_name, auth.user_id, body.message)
        .await?;
    info!(%team_id, invitee = %email, "Invitation created");

    let inviter_name = match state.users.base.find_by_id(auth.user_id).await {
        Ok(user) => user.display_name(),
        Err(_) => auth.email.clone(),
    };
    let accept_url = state.accept_url(&invitation.token);
    let mail = InvitationMail {
        to: &invitation.invitee.email,
        invitee_name: invitation.invitee.name.as_deref(),
        inviter_name: &inviter_name,
        team_name: &team.name,
        message: invitation.message.as_deref(),
        accept_url: &accept_url,
    };
    let email_sent = match state.mailer.send_invitation(&mail).await {
        Ok(()) => true,
        Err(e) => {
            warn!(%team_id, invitee = %email, error = %e, "Invitation mail delivery failed");
            false
        }
    };

    Ok((
        StatusCode::CREATED,
        Json(Envelope::with_msg(
            "Invitation sent successfully",
            InvitePayload {
                invitation: InvitationResponse::from_invitation(invitation)?,
                email_sent,
            },
        )),
    ))
}

/// Loads an invitation the actor may act on: it must exist, be addressed to
/// the actor and, when still pending, not be past its deadline.
async fn invitation_for_actor(
    state: &AppState,
    auth: &AuthUser,
    token: &str,
) -> Result<(Invitation, String), ApiError> {
    let not_found = || ApiError::NotFound("Invitation not found or already processed".to_string());

    let invitation = state
        .invitations
        .find_by_token(token)
        .await
        .map_err(|e| match e {
            DaoError::NotFound => not_found(),
            e => e.into(),
        })?;
    if matches!(
        invitation.status,
        InvitationStatus::Declined | InvitationStatus::Expired
    ) {
        return Err(not_found());
    }

    let user = state
        .users
        .base
        .find_by_id(auth.user_id)
        .await
        .map_err(|e| match e {
            DaoError::NotFound => ApiError::NotFound("User not found".to_string()),
            e => e.into(),
        })?;
    if normalize_email(&user.email) != normalize_email(&invitation.invitee.email) {
        if invitation.status == InvitationStatus::Accepted {
            return Err(not_found());
        }
        return Err(ApiError::Forbidden(
            "This invitation was sent to a different email address".to_string(),
        ));
    }

    if invitation.status == InvitationStatus::Pending
        && invitation.is_expired_at(DateTime::now())
    {
        state
            .invitations
            .resolve(stored_id(invitation.id)?, InvitationStatus::Expired)
            .await?;
        return Err(ApiError::BadRequest("Invitation has expired".to_string()));
    }

    Ok((invitation, user.email))
}

pub async fn accept_invitation(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(token): Path<String>,
) -> Result<Json<Envelope<TeamPayload>>, ApiError> {
    let (invitation, email) = invitation_for_actor(&state, &auth, &token).await?;
    let team_id = invitation.team;
    load_team(&state, team_id).await?;

    state.teams.resolve_pending(&email, auth.user_id).await?;
    let outcome = state.teams.join(team_id, auth.user_id).await?;
    if invitation.status == InvitationStatus::Pending {
        state
            .invitations
            .resolve(stored_id(invitation.id)?, InvitationStatus::Accepted)
            .await?;
    }
    info!(%team_id, user_id = %auth.user_id, ?outcome, "Invitation accepted");

    let msg = match outcome {
        JoinOutcome::AlreadyActive => "You are already a member of this team",
        JoinOutcome::Activated | JoinOutcome::Added => "Invitation accepted successfully",
    };
    let team = load_team(&state, team_id).await?;
    Ok(Json(Envelope::with_msg(msg, TeamPayload::from_team(team)?)))
}

pub async fn decline_invitation(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(token): Path<String>,
) -> Result<Json<Envelope<Empty>>, ApiError> {
    let (invitation, _) = invitation_for_actor(&state, &auth, &token).await?;
    let declined = invitation.status == InvitationStatus::Pending
        && state
            .invitations
            .resolve(stored_id(invitation.id)?, InvitationStatus::Declined)
            .await?;
    if !declined {
        return Err(ApiError::NotFound(
            "Invitation not found or already processed".to_string(),
        ));
    }
    info!(team_id = %invitation.team, user_id = %auth.user_id, "Invitation declined");

    Ok(Json(Envelope::with_msg("Invitation declined", Empty {})))
}

/// Member permissions an admin may grant directly.
fn grantable_permission(value: &str) -> Result<MemberPermission, ApiError> {
    match parse_choice(value, "permissions")? {
        p @ (MemberPermission::View | MemberPermission::Edit) => Ok(p),
        MemberPermission::Admin => Err(ApiError::Validation(
            "Invalid permissions value. Must be 'view' or 'edit'".to_string(),
        )),
    }
}

pub async fn add_members(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<AddMembersRequest>,
) -> Result<Json<Envelope<AddMembersPayload>>, ApiError> {
    if body.team_id.trim().is_empty() || body.emails.is_empty() {
        return Err(ApiError::Validation(
            "Team ID and at least one email are required".to_string(),
        ));
    }
    let team_id = parse_object_id(&body.team_id, "teamId")?;
    let permissions = match body.permissions.as_deref() {
        Some(value) => grantable_permission(value)?,
        None => MemberPermission::View,
    };

    let team = state.teams.find_optional(team_id).await?;
    policy::authorize_team_admin(team.as_ref(), auth.user_id)?;

    let mut emails: Vec<String> = Vec::new();
    for raw in &body.emails {
        let email = normalize_email(raw);
        if !email.contains('@') {
            return Err(ApiError::Validation(format!("Invalid email: {raw}")));
        }
        if !emails.contains(&email) {
            emails.push(email);
        }
    }

    let mut added = 0;
    let mut skipped = Vec::new();
    for email in emails {
        let user = match state.users.find_by_email(&email).await {
            Ok(user) => MemberRef::Resolved(stored_id(user.id)?),
            Err(DaoError::NotFound) => MemberRef::Pending(email.clone()),
            Err(e) => return Err(e.into()),
        };
        let member = Member {
            user,
            role: MemberRole::Member,
            status: MemberStatus::Active,
            permissions,
            added_at: DateTime::now(),
        };
        if state.teams.add_member_if_absent(team_id, &member).await? {
            added += 1;
        } else {
            skipped.push(email);
        }
    }
    info!(%team_id, added, skipped = skipped.len(), "Members added");

    let team = load_team(&state, team_id).await?;
    Ok(Json(Envelope::with_msg(
        "Team members added successfully",
        AddMembersPayload {
            team: TeamResponse::from_team(team)?,
            added,
            skipped,
        },
    )))
}

pub async fn update_member(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<UpdateMemberRequest>,
) -> Result<Json<Envelope<TeamPayload>>, ApiError> {
    if body.team_id.trim().is_empty() || body.member_id.trim().is_empty() {
        return Err(ApiError::Validation(
            "Team ID and member ID are required".to_string(),
        ));
    }
    let team_id = parse_object_id(&body.team_id, "teamId")?;
    let role = match body.role.as_deref() {
        Some(value) => Some(parse_choice::<MemberRole>(value, "role").map_err(|_| {
            ApiError::Validation("Invalid role value. Must be 'admin' or 'member'".to_string())
        })?),
        None => None,
    };
    let permissions = body
        .permissions
        .as_deref()
        .map(grantable_permission)
        .transpose()?;
    if role.is_none() && permissions.is_none() {
        return Err(ApiError::Validation(
            "Role or permissions is required".to_string(),
        ));
    }

    let member_id = body.member_id.trim();
    let member = match ObjectId::parse_str(member_id) {
        Ok(id) => MemberRef::Resolved(id),
        Err(_) if member_id.contains('@') => MemberRef::Pending(normalize_email(member_id)),
        Err(_) => return Err(ApiError::Validation("Invalid memberId".to_string())),
    };

    let team = state.teams.find_optional(team_id).await?;
    policy::authorize_team_admin(team.as_ref(), auth.user_id)?;

    if !state
        .teams
        .update_member(team_id, &member, role, permissions)
        .await?
    {
        return Err(ApiError::NotFound("Member not found in this team".to_string()));
    }
    info!(%team_id, %member, ?role, ?permissions, "Member updated");

    let team = load_team(&state, team_id).await?;
    Ok(Json(Envelope::with_msg(
        "Team member updated successfully",
        TeamPayload::from_team(team)?,
    )))
}

pub async fn create_team_event(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateEventRequest>,
) -> Result<(StatusCode, Json<Envelope<EventPayload>>), ApiError> {
    let event = create_event(&state, &auth, body, true).await?;
    Ok((
        StatusCode::CREATED,
        Json(Envelope::with_msg(
            "Team event created successfully",
            EventPayload {
                event: EventResponse::from_event(event)?,
            },
        )),
    ))
}

pub async fn team_events(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(team_id): Path<String>,
    Query(query): Query<ListEventsQuery>,
) -> Result<Json<Envelope<EventsPayload>>, ApiError> {
    let team_id = parse_object_id(&team_id, "team id")?;
    let filter = filter_from(&query)?;
    let events = list_team_events(&state, &auth, team_id, &filter).await?;
    Ok(Json(Envelope::ok(EventsPayload::from_events(events)?)))
}

pub async fn update_attendance(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(event_id): Path<String>,
    Json(body): Json<AttendanceRequest>,
) -> Result<Json<Envelope<EventPayload>>, ApiError> {
    let invalid = || {
        ApiError::Validation(
            "Valid status is required (attending, maybe, or declined)".to_string(),
        )
    };
    let status: AttendanceStatus = parse_choice(&body.status, "status").map_err(|_| invalid())?;
    if status == AttendanceStatus::NotResponded {
        return Err(invalid());
    }
    let event_id = parse_object_id(&event_id, "event id")?;

    let event = state.events.find_optional(event_id).await?;
    policy::authorize_attendance(event.as_ref(), auth.user_id)?;

    if !state
        .events
        .update_attendance(event_id, auth.user_id, status)
        .await?
    {
        return Err(ApiError::NotFound(
            "Event not found or you are not an attendee".to_string(),
        ));
    }
    let event = state
        .events
        .find_optional(event_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Event not found".to_string()))?;
    let team = team_of(&state, &event).await?;
    state
        .feed
        .publish_event(EventChange::Updated, &event, team.as_ref(), auth.user_id);

    Ok(Json(Envelope::with_msg(
        "Attendance status updated successfully",
        EventPayload {
            event: EventResponse::from_event(event)?,
        },
    )))
}
