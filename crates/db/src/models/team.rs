use bson::{DateTime, oid::ObjectId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Owner. Authorized as team admin regardless of `members`.
    pub admin: ObjectId,
    #[serde(default)]
    pub members: Vec<Member>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    pub user: MemberRef,
    #[serde(default)]
    pub role: MemberRole,
    #[serde(default)]
    pub status: MemberStatus,
    #[serde(default)]
    pub permissions: MemberPermission,
    pub added_at: DateTime,
}

/// A member's user reference. Stored as an ObjectId once resolved, or as the
/// raw email address when added by email before the account exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MemberRef {
    Resolved(ObjectId),
    Pending(String),
}

impl MemberRef {
    pub fn as_resolved(&self) -> Option<ObjectId> {
        match self {
            MemberRef::Resolved(id) => Some(*id),
            MemberRef::Pending(_) => None,
        }
    }

    pub fn is_user(&self, user_id: ObjectId) -> bool {
        self.as_resolved() == Some(user_id)
    }
}

impl std::fmt::Display for MemberRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemberRef::Resolved(id) => write!(f, "{}", id.to_hex()),
            MemberRef::Pending(email) => f.write_str(email),
        }
    }
}

impl From<&MemberRef> for bson::Bson {
    fn from(member: &MemberRef) -> Self {
        match member {
            MemberRef::Resolved(id) => bson::Bson::ObjectId(*id),
            MemberRef::Pending(email) => bson::Bson::String(email.clone()),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MemberRole {
    Admin,
    #[default]
    Member,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MemberStatus {
    Pending,
    #[default]
    Active,
    Declined,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MemberPermission {
    #[default]
    View,
    Edit,
    Admin,
}

impl MemberRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberRole::Admin => "admin",
            MemberRole::Member => "member",
        }
    }
}

impl MemberStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberStatus::Pending => "pending",
            MemberStatus::Active => "active",
            MemberStatus::Declined => "declined",
        }
    }
}

impl MemberPermission {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberPermission::View => "view",
            MemberPermission::Edit => "edit",
            MemberPermission::Admin => "admin",
        }
    }
}

impl Team {
    pub const COLLECTION: &'static str = "teams";

    /// The member entry for a resolved user, if any.
    pub fn member(&self, user_id: ObjectId) -> Option<&Member> {
        self.members.iter().find(|m| m.user.is_user(user_id))
    }

    /// Resolved user ids of active members plus the owner, deduplicated.
    pub fn active_member_ids(&self) -> Vec<ObjectId> {
        let mut ids = vec![self.admin];
        for member in &self.members {
            if member.status != MemberStatus::Active {
                continue;
            }
            if let Some(id) = member.user.as_resolved() {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }
        ids
    }
}
