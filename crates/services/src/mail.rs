//! Outgoing mail: one-time codes and team invitations.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::info;
use unical_config::MailSettings;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Mail relay request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Mail provider misconfigured: {0}")]
    Config(String),
}

/// Invitation details rendered into the invitation mail.
#[derive(Debug, Clone)]
pub struct InvitationMail<'a> {
    pub to: &'a str,
    pub invitee_name: Option<&'a str>,
    pub inviter_name: &'a str,
    pub team_name: &'a str,
    pub message: Option<&'a str>,
    pub accept_url: &'a str,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_otp(&self, to: &str, code: &str) -> Result<(), MailError>;
    async fn send_invitation(&self, mail: &InvitationMail<'_>) -> Result<(), MailError>;
}

/// Builds the mailer named by `mail.provider`.
pub fn from_settings(settings: &MailSettings) -> Result<Box<dyn Mailer>, MailError> {
    match settings.provider.as_str() {
        "log" => Ok(Box::new(LogMailer)),
        "http" => {
            let endpoint = settings
                .endpoint
                .clone()
                .ok_or_else(|| MailError::Config("mail.endpoint is required".to_string()))?;
            Ok(Box::new(HttpMailer::new(
                endpoint,
                settings.api_key.clone(),
                settings.from.clone(),
            )))
        }
        other => Err(MailError::Config(format!("unknown provider '{other}'"))),
    }
}

fn invitation_text(mail: &InvitationMail<'_>) -> String {
    let greeting = mail
        .invitee_name
        .map(|name| format!("Hi {name},"))
        .unwrap_or_else(|| "Hi,".to_string());
    let mut body = format!(
        "{greeting}\n\n{} invited you to join the team \"{}\".\n",
        mail.inviter_name, mail.team_name
    );
    if let Some(message) = mail.message.filter(|m| !m.trim().is_empty()) {
        body.push_str(&format!("\n\"{message}\"\n"));
    }
    body.push_str(&format!(
        "\nAccept the invitation: {}\n",
        mail.accept_url
    ));
    body
}

/// Writes mail to the log instead of delivering it.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_otp(&self, to: &str, code: &str) -> Result<(), MailError> {
        info!(%to, %code, "OTP mail");
        Ok(())
    }

    async fn send_invitation(&self, mail: &InvitationMail<'_>) -> Result<(), MailError> {
        info!(to = %mail.to, team = %mail.team_name, url = %mail.accept_url, "Invitation mail");
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct RelayMessage<'a> {
    from: &'a str,
    to: &'a str,
    subject: String,
    text: String,
}

/// Posts each message as JSON to a mail relay.
pub struct HttpMailer {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    from: String,
}

impl HttpMailer {
    pub fn new(endpoint: String, api_key: Option<String>, from: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key,
            from,
        }
    }

    async fn post(&self, message: &RelayMessage<'_>) -> Result<(), MailError> {
        let mut request = self.client.post(&self.endpoint).json(message);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        request.send().await?.error_for_status()?;
        Ok(())
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send_otp(&self, to: &str, code: &str) -> Result<(), MailError> {
        self.post(&RelayMessage {
            from: &self.from,
            to,
            subject: "Your login code".to_string(),
            text: format!("Your one-time login code is {code}.\n"),
        })
        .await
    }

    async fn send_invitation(&self, mail: &InvitationMail<'_>) -> Result<(), MailError> {
        self.post(&RelayMessage {
            from: &self.from,
            to: mail.to,
            subject: format!("You're invited to join {}", mail.team_name),
            text: invitation_text(mail),
        })
        .await
    }
}
