use std::sync::Arc;
use std::time::Duration;

use bson::DateTime;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::dao::invitation::InvitationDao;

/// Periodically marks overdue pending invitations as expired.
/// Returns `None` when `interval_secs` is zero.
pub fn spawn_invitation_sweeper(
    invitations: Arc<InvitationDao>,
    interval_secs: u64,
) -> Option<JoinHandle<()>> {
    if interval_secs == 0 {
        tracing::info!("Invitation sweeper disabled");
        return None;
    }

    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match invitations.expire_stale(DateTime::now()).await {
                Ok(0) => {}
                Ok(expired) => tracing::info!(expired, "Expired stale invitations"),
                Err(error) => tracing::error!(%error, "Invitation sweep failed"),
            }
        }
    });
    tracing::info!(interval_secs, "Invitation sweeper started");
    Some(handle)
}
