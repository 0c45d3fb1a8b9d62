use bson::{DateTime, doc, oid::ObjectId};
use mongodb::{Database, options::UpdateOptions};
use tracing::debug;
use unical_db::models::{Member, MemberPermission, MemberRef, MemberRole, MemberStatus, Team};

use super::base::{BaseDao, DaoError, DaoResult};

pub struct TeamDao {
    pub base: BaseDao<Team>,
}

/// Result of making a user an active member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    AlreadyActive,
    Activated,
    Added,
}

impl TeamDao {
    pub fn new(db: &Database) -> Self {
        Self {
            base: BaseDao::new(db, Team::COLLECTION),
        }
    }

    pub async fn create(
        &self,
        name: String,
        description: String,
        admin: ObjectId,
    ) -> DaoResult<Team> {
        let now = DateTime::now();
        let team = Team {
            id: None,
            name,
            description,
            admin,
            members: vec![Member {
                user: MemberRef::Resolved(admin),
                role: MemberRole::Admin,
                status: MemberStatus::Active,
                permissions: MemberPermission::Admin,
                added_at: now,
            }],
            created_at: now,
            updated_at: now,
        };

        let id = self.base.insert_one(&team).await?;
        self.base.find_by_id(id).await
    }

    /// Teams the user owns or is an active member of, newest first.
    pub async fn find_visible(&self, user_id: ObjectId) -> DaoResult<Vec<Team>> {
        self.base
            .find_many(
                doc! {
                    "$or": [
                        { "admin": user_id },
                        { "members": { "$elemMatch": { "user": user_id, "status": "active" } } },
                    ]
                },
                Some(doc! { "created_at": -1 }),
            )
            .await
    }

    pub async fn find_optional(&self, team_id: ObjectId) -> DaoResult<Option<Team>> {
        self.base.find_one(doc! { "_id": team_id }).await
    }

    /// Appends `member` unless the team already has an entry for the same
    /// user reference. Single conditional write, so concurrent callers can
    /// never insert the same user twice.
    pub async fn add_member_if_absent(
        &self,
        team_id: ObjectId,
        member: &Member,
    ) -> DaoResult<bool> {
        let user: bson::Bson = (&member.user).into();
        let added = self
            .base
            .update_one(
                doc! { "_id": team_id, "members.user": { "$ne": user } },
                doc! { "$push": { "members": bson::to_bson(member)? } },
            )
            .await?;
        debug!(%team_id, user = %member.user, added, "Conditional member insert");
        Ok(added)
    }

    /// Makes the user an active member: flips an existing non-active entry
    /// to active, or appends a fresh member entry when none exists.
    pub async fn join(&self, team_id: ObjectId, user_id: ObjectId) -> DaoResult<JoinOutcome> {
        let activated = self
            .base
            .update_one(
                doc! {
                    "_id": team_id,
                    "members": { "$elemMatch": { "user": user_id, "status": { "$ne": "active" } } },
                },
                doc! { "$set": { "members.$.status": "active" } },
            )
            .await?;
        if activated {
            return Ok(JoinOutcome::Activated);
        }

        let member = Member {
            user: MemberRef::Resolved(user_id),
            role: MemberRole::Member,
            status: MemberStatus::Active,
            permissions: MemberPermission::View,
            added_at: DateTime::now(),
        };
        if self.add_member_if_absent(team_id, &member).await? {
            return Ok(JoinOutcome::Added);
        }

        Ok(JoinOutcome::AlreadyActive)
    }

    /// Rewrites email-only member entries to the user's id across all teams.
    /// Teams that already hold a resolved entry for the user are skipped by
    /// the rewrite and lose the email entry instead, keeping one entry per
    /// user even when a concurrent `join` lands between the two writes.
    pub async fn resolve_pending(&self, email: &str, user_id: ObjectId) -> DaoResult<u64> {
        let opts = UpdateOptions::builder()
            .array_filters(vec![doc! { "m.user": email }])
            .build();
        let result = self
            .base
            .collection()
            .update_many(
                doc! {
                    "$and": [
                        { "members.user": email },
                        { "members.user": { "$ne": user_id } },
                    ]
                },
                doc! {
                    "$set": {
                        "members.$[m].user": user_id,
                        "updated_at": DateTime::now(),
                    }
                },
            )
            .with_options(opts)
            .await
            .map_err(DaoError::Mongo)?;

        self.base
            .update_many(
                doc! { "$and": [ { "members.user": email }, { "members.user": user_id } ] },
                doc! { "$pull": { "members": { "user": email } } },
            )
            .await?;

        if result.modified_count > 0 {
            debug!(%user_id, teams = result.modified_count, "Resolved pending memberships");
        }
        Ok(result.modified_count)
    }

    /// Changes role and/or permissions of one member entry. Returns false
    /// when the team has no entry for `member`.
    pub async fn update_member(
        &self,
        team_id: ObjectId,
        member: &MemberRef,
        role: Option<MemberRole>,
        permissions: Option<MemberPermission>,
    ) -> DaoResult<bool> {
        let user: bson::Bson = member.into();
        let mut set = bson::Document::new();
        if let Some(role) = role {
            set.insert("members.$.role", role.as_str());
        }
        if let Some(permissions) = permissions {
            set.insert("members.$.permissions", permissions.as_str());
        }

        self.base
            .update_one(
                doc! { "_id": team_id, "members.user": user },
                doc! { "$set": set },
            )
            .await
    }
}
