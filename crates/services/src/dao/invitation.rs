use bson::{DateTime, doc, oid::ObjectId};
use mongodb::Database;
use unical_db::models::{Invitation, InvitationStatus, Invitee, normalize_email};

use super::base::{BaseDao, DaoError, DaoResult};

fn already_invited() -> DaoError {
    DaoError::Conflict("An invitation has already been sent to this email".to_string())
}

pub struct InvitationDao {
    pub base: BaseDao<Invitation>,
    ttl_days: i64,
}

impl InvitationDao {
    pub fn new(db: &Database, ttl_days: i64) -> Self {
        Self {
            base: BaseDao::new(db, Invitation::COLLECTION),
            ttl_days,
        }
    }

    /// Records a pending invitation. Fails with `Conflict` while another
    /// pending invitation for the same team and email exists; the partial
    /// unique index on `(team, invitee.email)` enforces this for concurrent
    /// requests too. Overdue pending invitations for the pair are expired
    /// first so they never block a fresh one.
    pub async fn create(
        &self,
        team: ObjectId,
        email: &str,
        name: Option<String>,
        inviter: ObjectId,
        message: Option<String>,
    ) -> DaoResult<Invitation> {
        let email = normalize_email(email);
        let now = DateTime::now();
        self.base
            .update_many(
                doc! {
                    "team": team,
                    "invitee.email": email.as_str(),
                    "status": "pending",
                    "expires_at": { "$lt": now },
                },
                doc! { "$set": { "status": "expired" } },
            )
            .await?;
        if self.has_pending(team, &email).await? {
            return Err(already_invited());
        }

        let expires_at = DateTime::from_millis(
            now.timestamp_millis() + self.ttl_days * 24 * 60 * 60 * 1000,
        );
        let invitation = Invitation {
            id: None,
            team,
            invitee: Invitee { email, name },
            inviter,
            status: InvitationStatus::Pending,
            message,
            token: uuid::Uuid::new_v4().to_string(),
            expires_at,
            created_at: now,
            updated_at: now,
        };

        let id = self
            .base
            .insert_one(&invitation)
            .await
            .map_err(|e| match e {
                DaoError::DuplicateKey(_) => already_invited(),
                e => e,
            })?;
        self.base.find_by_id(id).await
    }

    pub async fn has_pending(&self, team: ObjectId, email: &str) -> DaoResult<bool> {
        let count = self
            .base
            .count(doc! {
                "team": team,
                "invitee.email": normalize_email(email),
                "status": "pending",
            })
            .await?;
        Ok(count > 0)
    }

    pub async fn find_by_token(&self, token: &str) -> DaoResult<Invitation> {
        self.base
            .find_one(doc! { "token": token })
            .await?
            .ok_or(DaoError::NotFound)
    }

    /// Moves a pending invitation to `to`. Returns false when the invitation
    /// was no longer pending.
    pub async fn resolve(&self, id: ObjectId, to: InvitationStatus) -> DaoResult<bool> {
        self.base
            .update_one(
                doc! { "_id": id, "status": "pending" },
                doc! { "$set": { "status": to.as_str() } },
            )
            .await
    }

    /// Marks every pending invitation whose deadline has passed as expired.
    pub async fn expire_stale(&self, now: DateTime) -> DaoResult<u64> {
        self.base
            .update_many(
                doc! { "status": "pending", "expires_at": { "$lt": now } },
                doc! { "$set": { "status": "expired" } },
            )
            .await
    }
}
