use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::info;

use crate::orchestrator::{Orchestrator, RunTrigger};

/// Fires a classification run every `period`, forever.
///
/// The first tick is one full period after start; the startup run is
/// triggered separately. A tick that lands while another run is active is
/// skipped, and a slow run delays the following tick rather than bunching.
pub async fn run_schedule(orchestrator: Orchestrator, period: Duration) {
    info!("Scheduling persona assignment every {}s", period.as_secs());

    let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        orchestrator.run_exclusive(RunTrigger::Schedule).await;
    }
}
