use bson::oid::ObjectId;
use dashmap::DashMap;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::debug;
use unical_db::models::{Event, Team};

pub type FeedSender = mpsc::UnboundedSender<serde_json::Value>;
pub type FeedReceiver = mpsc::UnboundedReceiver<serde_json::Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventChange {
    Created,
    Updated,
    Deleted,
}

impl EventChange {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "event_created",
            Self::Updated => "event_updated",
            Self::Deleted => "event_deleted",
        }
    }
}

/// In-process change notifications, keyed by user id.
/// A user may hold several subscriptions at once.
pub struct EventFeed {
    subscribers: DashMap<ObjectId, Vec<FeedSender>>,
}

impl EventFeed {
    pub fn new() -> Self {
        Self {
            subscribers: DashMap::new(),
        }
    }

    pub fn subscribe(&self, user_id: ObjectId) -> FeedReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.entry(user_id).or_default().push(tx);
        rx
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.iter().map(|r| r.value().len()).sum()
    }

    /// Sends `message` to every live subscription of `user_ids`, dropping
    /// subscriptions whose receiver is gone. Returns the number delivered.
    pub fn publish(&self, user_ids: &[ObjectId], message: &serde_json::Value) -> usize {
        let mut delivered = 0;
        for user_id in user_ids {
            if let Some(mut senders) = self.subscribers.get_mut(user_id) {
                senders.retain(|tx| match tx.send(message.clone()) {
                    Ok(()) => {
                        delivered += 1;
                        true
                    }
                    Err(_) => false,
                });
                if senders.is_empty() {
                    drop(senders);
                    self.subscribers.remove_if(user_id, |_, s| s.is_empty());
                }
            }
        }
        debug!(recipients = user_ids.len(), delivered, "Feed message published");
        delivered
    }

    /// Notifies the owner, attendees and (for team events) the team's
    /// active members about a change to `event`, skipping `actor`.
    pub fn publish_event(
        &self,
        change: EventChange,
        event: &Event,
        team: Option<&Team>,
        actor: ObjectId,
    ) -> usize {
        let recipients = recipients(event, team, actor);
        let message = json!({
            "type": change.as_str(),
            "event_id": event.id.map(|id| id.to_hex()),
            "title": event.title,
            "team_id": event.team_id.map(|id| id.to_hex()),
            "actor": actor.to_hex(),
        });
        self.publish(&recipients, &message)
    }
}

impl Default for EventFeed {
    fn default() -> Self {
        Self::new()
    }
}

fn recipients(event: &Event, team: Option<&Team>, actor: ObjectId) -> Vec<ObjectId> {
    let mut ids = vec![event.user];
    ids.extend(event.attendees.iter().map(|a| a.user));
    if let Some(team) = team {
        ids.extend(team.active_member_ids());
    }
    ids.sort();
    ids.dedup();
    ids.retain(|id| *id != actor);
    ids
}
