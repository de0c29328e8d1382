use std::{sync::Arc, time::Duration};

use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tracing::{error, trace};

use crate::aof::CommandLog;

pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(1);

/// Spawns the background task that makes appended commands durable every `interval`.
///
/// At most one interval's worth of acknowledged writes can be lost on a crash.
pub fn spawn_flush_task(log: Arc<dyn CommandLog>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            match log.flush().await {
                Ok(()) => trace!("append-only file flushed"),
                Err(e) => error!("failed to flush append-only file, writes are at risk: {}", e),
            }
        }
    })
}
