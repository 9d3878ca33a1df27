//! Daily job: after noon UTC, ingest yesterday.

use std::time::Duration;

use chrono::Utc;
use tracing::{error, info};

use ingestion::{previous_day, until_noon_utc, DayIngester};

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Run the daily cycle until interrupted. With `once`, run one cycle
/// immediately and return.
pub async fn run(ingester: &DayIngester, once: bool) {
    if once {
        run_cycle(ingester).await;
        return;
    }

    let wait = until_noon_utc(Utc::now());
    if !wait.is_zero() {
        info!(wait_secs = wait.as_secs(), "Waiting for noon UTC");
        if !sleep_or_shutdown(wait).await {
            return;
        }
    }

    loop {
        run_cycle(ingester).await;

        info!(interval_secs = DAY.as_secs(), "Sleeping until next cycle");
        if !sleep_or_shutdown(DAY).await {
            return;
        }
    }
}

async fn run_cycle(ingester: &DayIngester) {
    let day = previous_day(Utc::now());
    info!(date = %day, "Starting daily ingestion");

    match ingester.run(day).await {
        Ok(result) => info!(
            date = %day,
            outcome = ?result.outcome,
            swaths = result.swaths.len(),
            "Daily ingestion finished"
        ),
        Err(e) => error!(date = %day, error = %e, "Daily ingestion failed"),
    }
}

/// Returns false if interrupted.
async fn sleep_or_shutdown(duration: Duration) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => true,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown requested");
            false
        }
    }
}
