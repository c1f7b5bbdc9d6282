//! Periodic cache and session cleanup.

use crate::bot::StoryBot;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Run [`StoryBot::run_maintenance`] every `period` until the handle is
/// aborted. The first pass happens one full period after the call.
pub fn spawn_maintenance(bot: Arc<StoryBot>, period: Duration) -> JoinHandle<()> {
    info!(period_secs = period.as_secs(), "maintenance task started");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let report = bot.run_maintenance().await;
            debug!(?report, "maintenance pass");
        }
    })
}
