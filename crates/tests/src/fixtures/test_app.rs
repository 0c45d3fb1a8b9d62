use async_trait::async_trait;
use mongodb::{Client, Database};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use unical_api::{build_router, state::AppState};
use unical_config::Settings;
use unical_db::{connection::client_options, indexes::ensure_indexes};
use unical_services::mail::{InvitationMail, MailError, Mailer};

/// A message captured by [`RecordingMailer`].
#[derive(Debug, Clone)]
pub enum SentMail {
    Otp { to: String, code: String },
    Invitation { to: String, accept_url: String },
}

/// Keeps every outgoing mail in memory; can be switched to fail delivery.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<SentMail>>,
    failing: Mutex<bool>,
}

impl RecordingMailer {
    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }

    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().unwrap().clone()
    }

    /// Most recent OTP code mailed to `email`.
    pub fn last_otp(&self, email: &str) -> Option<String> {
        self.sent().into_iter().rev().find_map(|m| match m {
            SentMail::Otp { to, code } if to == email => Some(code),
            _ => None,
        })
    }

    /// Invitation token from the most recent accept link mailed to `email`.
    pub fn last_invitation_token(&self, email: &str) -> Option<String> {
        self.sent().into_iter().rev().find_map(|m| match m {
            SentMail::Invitation { to, accept_url } if to == email => accept_url
                .rsplit('/')
                .next()
                .map(str::to_string),
            _ => None,
        })
    }

    fn check(&self) -> Result<(), MailError> {
        if *self.failing.lock().unwrap() {
            return Err(MailError::Config("delivery disabled in test".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_otp(&self, to: &str, code: &str) -> Result<(), MailError> {
        self.check()?;
        self.sent.lock().unwrap().push(SentMail::Otp {
            to: to.to_string(),
            code: code.to_string(),
        });
        Ok(())
    }

    async fn send_invitation(&self, mail: &InvitationMail<'_>) -> Result<(), MailError> {
        self.check()?;
        self.sent.lock().unwrap().push(SentMail::Invitation {
            to: mail.to.to_string(),
            accept_url: mail.accept_url.to_string(),
        });
        Ok(())
    }
}

/// A running test application with its own MongoDB database.
pub struct TestApp {
    pub addr: SocketAddr,
    pub base_url: String,
    pub db: Database,
    pub settings: Settings,
    pub state: AppState,
    pub mailer: Arc<RecordingMailer>,
    pub client: reqwest::Client,
}

impl TestApp {
    /// Spawn a new test server connected to the test MongoDB.
    ///
    /// Requires a running MongoDB (default `mongodb://localhost:27017`,
    /// override with `UNICAL__DATABASE__URL`). Each test gets a unique
    /// database name for isolation.
    pub async fn spawn() -> Self {
        Self::spawn_with_settings(|_| {}).await
    }

    /// Spawn a test server with customized settings.
    pub async fn spawn_with_settings(mutator: impl FnOnce(&mut Settings)) -> Self {
        let db_name = format!("unical_test_{}", uuid::Uuid::new_v4().simple());

        let mut settings = Settings::load().expect("Failed to load settings");
        settings.database.name = db_name.clone();
        settings.jwt.secret = "test-secret".to_string();
        settings.app.public_url = "http://localhost:5173".to_string();
        mutator(&mut settings);

        let client_options = client_options(&settings.database)
            .await
            .expect("Failed to parse MongoDB URL");
        let mongo_client =
            Client::with_options(client_options).expect("Failed to create MongoDB client");
        let db = mongo_client.database(&db_name);

        ensure_indexes(&db).await.expect("Failed to create indexes");

        let mailer = Arc::new(RecordingMailer::default());
        let app_state = AppState::with_mailer(db.clone(), settings.clone(), mailer.clone());
        let app = build_router(app_state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let base_url = format!("http://{}", addr);
        let client = reqwest::Client::new();

        Self {
            addr,
            base_url,
            db,
            settings,
            state: app_state,
            mailer,
            client,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let db = self.db.clone();
        // Best effort cleanup: drop the test database
        tokio::spawn(async move {
            let _ = db.drop().await;
        });
    }
}
