use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use argon2::password_hash::rand_core::OsRng;
use bson::oid::ObjectId;
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;
use unical_config::JwtSettings;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Token expired")]
    TokenExpired,
    #[error("Invalid token: {0}")]
    InvalidToken(String),
    #[error("Password hash error: {0}")]
    HashError(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user_id
    pub email: String,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

impl Claims {
    pub fn user_id(&self) -> Result<ObjectId, AuthError> {
        ObjectId::parse_str(&self.sub)
            .map_err(|_| AuthError::InvalidToken("Malformed subject".to_string()))
    }
}

pub struct AuthService {
    jwt_settings: JwtSettings,
    otp_digits: u32,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl AuthService {
    pub fn new(jwt_settings: JwtSettings, otp_digits: u32) -> Self {
        let encoding_key = EncodingKey::from_secret(jwt_settings.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(jwt_settings.secret.as_bytes());
        Self {
            jwt_settings,
            otp_digits: otp_digits.clamp(1, 9),
            encoding_key,
            decoding_key,
        }
    }

    pub fn token_ttl_secs(&self) -> u64 {
        self.jwt_settings.token_ttl_secs
    }

    pub fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();
        let hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AuthError::HashError(e.to_string()))?;
        Ok(hash.to_string())
    }

    pub fn verify_password(&self, password: &str, hash: &str) -> Result<bool, AuthError> {
        let parsed_hash =
            PasswordHash::new(hash).map_err(|e| AuthError::HashError(e.to_string()))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    pub fn issue_token(&self, user_id: ObjectId, email: &str) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_hex(),
            email: email.to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::seconds(self.jwt_settings.token_ttl_secs as i64)).timestamp(),
            iss: self.jwt_settings.issuer.clone(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))
    }

    /// Claims of a valid token, or `None` when the token is expired,
    /// malformed, badly signed or from another issuer.
    pub fn verify_token(&self, token: &str) -> Option<Claims> {
        match self.decode_claims(token) {
            Ok(claims) => Some(claims),
            Err(e) => {
                warn!(error = %e, "Rejected bearer token");
                None
            }
        }
    }

    fn decode_claims(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::default();
        validation.set_issuer(&[&self.jwt_settings.issuer]);
        validation.leeway = 0;

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken(e.to_string()),
            })?;

        // A subject that is not an ObjectId can never name a user.
        token_data.claims.user_id()?;
        Ok(token_data.claims)
    }

    /// A fresh one-time code of the configured length. Codes never start
    /// with zero, so the string length always equals the digit count.
    pub fn generate_otp(&self) -> String {
        generate_otp(self.otp_digits)
    }
}

pub fn generate_otp(digits: u32) -> String {
    let low = 10u32.pow(digits - 1);
    let high = 10u32.pow(digits);
    rand::rng().random_range(low..high).to_string()
}

/// OTP codes carry no expiry and no attempt limit; a stored code stays valid
/// until the next OTP request replaces it.
pub fn otp_matches(stored: Option<&str>, submitted: &str) -> bool {
    match stored {
        Some(code) => !code.is_empty() && code == submitted.trim(),
        None => false,
    }
}
