use axum::{Json, extract::State, http::StatusCode};
use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use unical_db::models::{CalendarView, NotificationPrefs, User, name_from_email, normalize_email};
use unical_services::{auth::otp_matches, dao::base::DaoError, dao::user::ProfileUpdate};
use validator::Validate;

use super::{Empty, Envelope, stored_id, to_rfc3339};
use crate::{error::ApiError, extractors::auth::AuthUser, state::AppState};

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct RegisterRequest {
    #[validate(email(message = "A valid email is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "Email and password are required"))]
    pub password: String,
    #[validate(length(max = 100, message = "Name must be at most 100 characters"))]
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Email and password are required"))]
    pub email: String,
    #[validate(length(min = 1, message = "Email and password are required"))]
    pub password: String,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct EmailRequest {
    #[validate(length(min = 1, message = "Email is required"))]
    pub email: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct VerifyOtpRequest {
    pub email: String,
    /// Clients send the code either as a string or as a number.
    pub otp: serde_json::Value,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,
    pub profile_picture: Option<String>,
    #[validate(length(min = 1, message = "Timezone must not be empty"))]
    pub timezone: Option<String>,
    pub default_calendar_view: Option<CalendarView>,
    #[validate(range(max = 10080, message = "Reminder must be at most one week"))]
    pub default_reminder_minutes: Option<u32>,
    pub notification_preferences: Option<NotificationPrefs>,
}

#[derive(Debug, Serialize)]
pub struct UserSummary {
    pub id: String,
    pub email: String,
    pub name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPayload {
    pub access_token: String,
    pub expires_in: u64,
    pub user: UserSummary,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub id: String,
    pub email: String,
    pub name: String,
    pub profile_picture: String,
    pub timezone: String,
    pub default_calendar_view: CalendarView,
    pub default_reminder_minutes: u32,
    pub notification_preferences: NotificationPrefs,
    pub created_at: String,
}

#[derive(Debug, Serialize)]
pub struct ProfilePayload {
    pub user: ProfileResponse,
}

impl ProfileResponse {
    fn from_user(user: User) -> Result<Self, ApiError> {
        let name = user.display_name();
        Ok(Self {
            id: stored_id(user.id)?.to_hex(),
            email: user.email,
            name,
            profile_picture: user.profile_picture,
            timezone: user.timezone,
            default_calendar_view: user.default_calendar_view,
            default_reminder_minutes: user.default_reminder_minutes,
            notification_preferences: user.notification_preferences,
            created_at: to_rfc3339(user.created_at),
        })
    }
}

/// Resolves pending memberships for the user, then issues a session token.
async fn open_session(state: &AppState, user: &User) -> Result<SessionPayload, ApiError> {
    let user_id = stored_id(user.id)?;
    let resolved = state.teams.resolve_pending(&user.email, user_id).await?;
    if resolved > 0 {
        info!(%user_id, teams = resolved, "Activated pending team memberships");
    }

    let access_token = state.auth.issue_token(user_id, &user.email)?;
    Ok(SessionPayload {
        access_token,
        expires_in: state.auth.token_ttl_secs(),
        user: UserSummary {
            id: user_id.to_hex(),
            email: user.email.clone(),
            name: user.display_name(),
        },
    })
}

pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<Envelope<SessionPayload>>), ApiError> {
    body.validate()?;

    if state.users.exists(&body.email).await? {
        return Err(ApiError::Conflict(
            "User with this email already exists".to_string(),
        ));
    }

    let password_hash = state.auth.hash_password(&body.password)?;
    let name = body
        .name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| name_from_email(&normalize_email(&body.email)));

    let user = state
        .users
        .create(&body.email, name, Some(password_hash))
        .await
        .map_err(|e| match e {
            DaoError::DuplicateKey(_) => {
                ApiError::Conflict("User with this email already exists".to_string())
            }
            e => e.into(),
        })?;
    info!(user_id = ?user.id, "User registered");

    let session = open_session(&state, &user).await?;
    Ok((
        StatusCode::CREATED,
        Json(Envelope::with_msg("User registered successfully", session)),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<Envelope<SessionPayload>>, ApiError> {
    body.validate()?;

    let user = state
        .users
        .find_by_email(&body.email)
        .await
        .map_err(|e| match e {
            DaoError::NotFound => {
                ApiError::Unauthorized("Invalid email or password".to_string())
            }
            e => e.into(),
        })?;

    let password_hash = user.password_hash.as_deref().ok_or_else(|| {
        ApiError::Unauthorized(
            "This account doesn't use password authentication. Please login with OTP."
                .to_string(),
        )
    })?;

    if !state.auth.verify_password(&body.password, password_hash)? {
        return Err(unical_services::auth::AuthError::InvalidCredentials.into());
    }

    let session = open_session(&state, &user).await?;
    Ok(Json(Envelope::with_msg("Login successful", session)))
}

/// Sends a fresh one-time code; the code is stored only once mail delivery
/// has succeeded.
pub async fn email_login(
    State(state): State<AppState>,
    Json(body): Json<EmailRequest>,
) -> Result<Json<Envelope<Empty>>, ApiError> {
    body.validate()?;

    let user = state
        .users
        .find_by_email(&body.email)
        .await
        .map_err(|e| match e {
            DaoError::NotFound => {
                ApiError::NotFound("User not registered. Please register first.".to_string())
            }
            e => e.into(),
        })?;
    let user_id = stored_id(user.id)?;

    let code = state.auth.generate_otp();
    if let Err(e) = state.mailer.send_otp(&user.email, &code).await {
        warn!(%user_id, error = %e, "OTP mail delivery failed");
        return Err(e.into());
    }
    state.users.set_otp(user_id, &code).await?;

    Ok(Json(Envelope::with_msg("OTP sent to your email", Empty {})))
}

pub async fn email_verify(
    State(state): State<AppState>,
    Json(body): Json<VerifyOtpRequest>,
) -> Result<Json<Envelope<SessionPayload>>, ApiError> {
    let submitted = match &body.otp {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        _ => String::new(),
    };
    if body.email.trim().is_empty() || submitted.trim().is_empty() {
        return Err(ApiError::Validation("Email and OTP are required".to_string()));
    }

    let user = state
        .users
        .find_by_email(&body.email)
        .await
        .map_err(|e| match e {
            DaoError::NotFound => ApiError::Unauthorized("User not found".to_string()),
            e => e.into(),
        })?;

    if !otp_matches(user.otp.as_deref(), &submitted) {
        return Err(ApiError::Unauthorized(
            "Invalid OTP. Please try again.".to_string(),
        ));
    }

    let session = open_session(&state, &user).await?;
    Ok(Json(Envelope::with_msg("OTP verified successfully", session)))
}

/// Reports whether an account exists for the email.
pub async fn user_signup(
    State(state): State<AppState>,
    Json(body): Json<EmailRequest>,
) -> Result<Json<Envelope<Empty>>, ApiError> {
    body.validate()?;

    if state.users.exists(&body.email).await? {
        Ok(Json(Envelope::with_msg("User exists", Empty {})))
    } else {
        Err(ApiError::NotFound(
            "User not registered. Please register first.".to_string(),
        ))
    }
}

async fn load_profile(state: &AppState, user_id: ObjectId) -> Result<ProfilePayload, ApiError> {
    let user = state.users.base.find_by_id(user_id).await.map_err(|e| match e {
        DaoError::NotFound => ApiError::Unauthorized("User not found".to_string()),
        e => e.into(),
    })?;
    Ok(ProfilePayload {
        user: ProfileResponse::from_user(user)?,
    })
}

pub async fn me(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Envelope<ProfilePayload>>, ApiError> {
    Ok(Json(Envelope::ok(load_profile(&state, auth.user_id).await?)))
}

pub async fn update_me(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<UpdateProfileRequest>,
) -> Result<Json<Envelope<ProfilePayload>>, ApiError> {
    body.validate()?;

    let update = ProfileUpdate {
        name: body.name.map(|n| n.trim().to_string()),
        profile_picture: body.profile_picture,
        timezone: body.timezone,
        default_calendar_view: body.default_calendar_view,
        default_reminder_minutes: body.default_reminder_minutes,
        notification_preferences: body.notification_preferences,
    };
    state.users.update_profile(auth.user_id, update).await?;

    Ok(Json(Envelope::with_msg(
        "Profile updated successfully",
        load_profile(&state, auth.user_id).await?,
    )))
}
