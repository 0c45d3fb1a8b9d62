use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub app: AppSettings,
    pub database: DatabaseSettings,
    pub jwt: JwtSettings,
    pub otp: OtpSettings,
    pub invitation: InvitationSettings,
    pub mail: MailSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppSettings {
    pub host: String,
    pub port: u16,
    /// Base URL of the web client, used to build invitation links.
    pub public_url: String,
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseSettings {
    pub url: String,
    pub name: String,
    pub max_pool_size: Option<u32>,
    pub min_pool_size: Option<u32>,
    /// How long a request waits for a usable server before failing.
    pub server_selection_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtSettings {
    pub secret: String,
    pub token_ttl_secs: u64,
    pub issuer: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OtpSettings {
    pub digits: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InvitationSettings {
    pub ttl_days: i64,
    /// Zero disables the background expiry sweep.
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MailSettings {
    /// `log` writes mail to the tracing log, `http` posts it to `endpoint`.
    pub provider: String,
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub from: String,
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::default()
                    .separator("__")
                    .prefix("UNICAL"),
            )
            .set_default("app.host", "0.0.0.0")?
            .set_default("app.port", 5000)?
            .set_default("app.public_url", "http://localhost:5173")?
            .set_default("app.cors_origins", Vec::<String>::new())?
            .set_default("database.url", "mongodb://localhost:27017")?
            .set_default("database.name", "unical")?
            .set_default("database.server_selection_timeout_secs", 10)?
            .set_default("jwt.secret", "change-me-in-production")?
            .set_default("jwt.token_ttl_secs", 604800)?
            .set_default("jwt.issuer", "unical")?
            .set_default("otp.digits", 4)?
            .set_default("invitation.ttl_days", 7)?
            .set_default("invitation.sweep_interval_secs", 3600)?
            .set_default("mail.provider", "log")?
            .set_default("mail.endpoint", None::<String>)?
            .set_default("mail.api_key", None::<String>)?
            .set_default("mail.from", "no-reply@unical.local")?
            .build()?;

        config.try_deserialize()
    }
}
