use mongodb::Database;
use std::sync::Arc;
use unical_config::Settings;
use unical_services::{
    AuthService, EventFeed, Mailer,
    dao::{event::EventDao, invitation::InvitationDao, team::TeamDao, user::UserDao},
    mail::{self, MailError},
};

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub settings: Settings,
    pub auth: Arc<AuthService>,
    pub users: Arc<UserDao>,
    pub teams: Arc<TeamDao>,
    pub invitations: Arc<InvitationDao>,
    pub events: Arc<EventDao>,
    pub mailer: Arc<dyn Mailer>,
    pub feed: Arc<EventFeed>,
}

impl AppState {
    pub fn new(db: Database, settings: Settings) -> Result<Self, MailError> {
        let mailer: Arc<dyn Mailer> = Arc::from(mail::from_settings(&settings.mail)?);
        Ok(Self::with_mailer(db, settings, mailer))
    }

    /// Builds the state around an existing mailer, e.g. a recording one in tests.
    pub fn with_mailer(db: Database, settings: Settings, mailer: Arc<dyn Mailer>) -> Self {
        let auth = Arc::new(AuthService::new(settings.jwt.clone(), settings.otp.digits));
        let users = Arc::new(UserDao::new(&db));
        let teams = Arc::new(TeamDao::new(&db));
        let invitations = Arc::new(InvitationDao::new(&db, settings.invitation.ttl_days));
        let events = Arc::new(EventDao::new(&db));
        let feed = Arc::new(EventFeed::new());

        Self {
            db,
            settings,
            auth,
            users,
            teams,
            invitations,
            events,
            mailer,
            feed,
        }
    }

    /// Link the invitee follows to accept an invitation.
    pub fn accept_url(&self, token: &str) -> String {
        format!(
            "{}/accept-invitation/{}",
            self.settings.app.public_url.trim_end_matches('/'),
            token
        )
    }
}
