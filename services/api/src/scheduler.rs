use product_compliance::workflows::compliance::{
    ComplianceTypeRepository, PeriodicReevaluator, ProductRepository,
};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

/// Run the compliance sweep every `period`, starting one period after launch.
pub(crate) fn spawn_recompute_schedule<P, T>(
    reevaluator: PeriodicReevaluator<P, T>,
    period: Duration,
) -> JoinHandle<()>
where
    P: ProductRepository + 'static,
    T: ComplianceTypeRepository + 'static,
{
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        info!(period_secs = period.as_secs(), "compliance re-evaluation scheduled");

        loop {
            ticker.tick().await;
            if let Err(err) = reevaluator.run() {
                warn!(error = %err, "scheduled compliance re-evaluation failed");
            }
        }
    })
}
