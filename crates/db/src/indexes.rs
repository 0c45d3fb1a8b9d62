use mongodb::{Database, IndexModel, options::IndexOptions};
use tracing::info;

use crate::models::{Event, Invitation, Team, User};

pub async fn ensure_indexes(db: &Database) -> Result<(), mongodb::error::Error> {
    // Users
    create_indexes(
        db,
        User::COLLECTION,
        vec![index_unique(bson::doc! { "email": 1 })],
    )
    .await?;

    // Teams
    create_indexes(
        db,
        Team::COLLECTION,
        vec![
            index(bson::doc! { "admin": 1 }),
            index(bson::doc! { "members.user": 1 }),
        ],
    )
    .await?;

    // Invitations
    create_indexes(
        db,
        Invitation::COLLECTION,
        vec![
            index_unique(bson::doc! { "token": 1 }),
            index(bson::doc! { "team": 1, "invitee.email": 1, "status": 1 }),
            // At most one pending invitation per team and email.
            IndexModel::builder()
                .keys(bson::doc! { "team": 1, "invitee.email": 1 })
                .options(
                    IndexOptions::builder()
                        .unique(true)
                        .partial_filter_expression(bson::doc! { "status": "pending" })
                        .build(),
                )
                .build(),
            index(bson::doc! { "status": 1, "expires_at": 1 }),
        ],
    )
    .await?;

    // Events
    create_indexes(
        db,
        Event::COLLECTION,
        vec![
            index(bson::doc! { "user": 1, "calendar_type": 1 }),
            index(bson::doc! { "start_date": 1, "end_date": 1 }),
            index(bson::doc! { "team_id": 1 }),
            index(bson::doc! { "type": 1 }),
            index(bson::doc! { "status": 1 }),
            index(bson::doc! { "attendees.user": 1 }),
        ],
    )
    .await?;

    info!("All indexes ensured");
    Ok(())
}

fn index(keys: bson::Document) -> IndexModel {
    IndexModel::builder().keys(keys).build()
}

fn index_unique(keys: bson::Document) -> IndexModel {
    IndexModel::builder()
        .keys(keys)
        .options(IndexOptions::builder().unique(true).build())
        .build()
}

async fn create_indexes(
    db: &Database,
    collection: &str,
    indexes: Vec<IndexModel>,
) -> Result<(), mongodb::error::Error> {
    db.collection::<bson::Document>(collection)
        .create_indexes(indexes)
        .await?;
    info!(collection, "Indexes created");
    Ok(())
}
