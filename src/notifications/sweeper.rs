use std::time::Duration;

use sqlx::PgPool;
use tokio::{
    task::JoinHandle,
    time::{interval, MissedTickBehavior},
};
use tracing::{debug, error, info};

use super::repo;

/// Deletes notifications past their `expires_at` every `every`, starting
/// immediately. Failures are logged and retried on the next tick.
pub fn spawn_expiry_sweeper(db: PgPool, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(every.max(Duration::from_secs(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match repo::delete_expired(&db).await {
                Ok(0) => debug!("no expired notifications"),
                Ok(count) => info!(count, "expired notifications removed"),
                Err(e) => error!(error = %e, "notification sweep failed"),
            }
        }
    })
}
