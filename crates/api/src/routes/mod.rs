pub mod auth;
pub mod event;
pub mod team;

use bson::oid::ObjectId;
use serde::{Serialize, de::DeserializeOwned};

use crate::error::ApiError;

/// Success body shared by every route: `{success: true, msg?, ...payload}`.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
    #[serde(flatten)]
    pub data: T,
}

impl<T: Serialize> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            msg: None,
            data,
        }
    }

    pub fn with_msg(msg: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            msg: Some(msg.into()),
            data,
        }
    }
}

/// Payload for responses that carry only a message.
#[derive(Debug, Serialize)]
pub struct Empty {}

pub(crate) fn parse_object_id(value: &str, field: &str) -> Result<ObjectId, ApiError> {
    ObjectId::parse_str(value.trim())
        .map_err(|_| ApiError::Validation(format!("Invalid {field}")))
}

/// `_id` of a document read back from the database.
pub(crate) fn stored_id(id: Option<ObjectId>) -> Result<ObjectId, ApiError> {
    id.ok_or_else(|| ApiError::Internal("Stored document without _id".to_string()))
}

/// Parses a wire enum value (`"edit"`, `"in-progress"`, ...) into its model type.
pub(crate) fn parse_choice<T: DeserializeOwned>(value: &str, field: &str) -> Result<T, ApiError> {
    serde_json::from_value(serde_json::Value::String(value.trim().to_string()))
        .map_err(|_| ApiError::Validation(format!("Invalid {field} value")))
}

pub(crate) fn to_rfc3339(value: bson::DateTime) -> String {
    value.to_chrono().to_rfc3339()
}
