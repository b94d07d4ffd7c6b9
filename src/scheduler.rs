//! Daily library refresh scheduling.

use std::sync::Arc;

use chrono::{Local, NaiveDateTime, NaiveTime, TimeDelta};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::catalog::CatalogCache;
use crate::error::AppError;

/// Time until the next refresh at `hour`:00 local. Always in the future:
/// once today's slot has passed (or is exactly now), tomorrow's applies.
pub fn next_refresh_delay(now: NaiveDateTime, hour: u32) -> TimeDelta {
    let slot = NaiveTime::from_hms_opt(hour.min(23), 0, 0).unwrap_or(NaiveTime::MIN);
    let today = now.date().and_time(slot);
    let target = if today > now {
        today
    } else {
        today + TimeDelta::days(1)
    };
    target - now
}

/// Refresh the catalog every day at `refresh_hour`:00 local until shutdown
/// is signalled. Hour 0 disables scheduling. Failures (including a manual
/// refresh already in flight) are logged and the next slot is awaited.
pub fn spawn_refresh_scheduler(
    catalog: Arc<CatalogCache>,
    refresh_hour: u32,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        if refresh_hour == 0 {
            log::info!("scheduled library refresh is disabled");
            return;
        }

        loop {
            let delay = next_refresh_delay(Local::now().naive_local(), refresh_hour);
            let sleep = delay.to_std().unwrap_or_default();
            log::info!(
                "next library refresh at {refresh_hour:02}:00, in {}m",
                delay.num_minutes()
            );

            tokio::select! {
                _ = tokio::time::sleep(sleep) => {
                    match catalog.refresh().await {
                        Ok(_) => {}
                        Err(AppError::RefreshInProgress) => {
                            log::info!("scheduled refresh skipped: one is already running");
                        }
                        Err(e) => log::error!("scheduled library refresh failed: {e}"),
                    }
                }
                _ = shutdown.changed() => {
                    log::debug!("refresh scheduler shutting down");
                    return;
                }
            }
        }
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 10)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn before_the_slot_waits_until_today() {
        let delay = next_refresh_delay(at(1, 30), 3);
        assert_eq!(delay, TimeDelta::minutes(90));
    }

    #[test]
    fn after_the_slot_waits_until_tomorrow() {
        let delay = next_refresh_delay(at(3, 30), 3);
        assert_eq!(delay, TimeDelta::hours(23) + TimeDelta::minutes(30));
    }

    #[test]
    fn exactly_on_the_slot_waits_a_full_day() {
        let delay = next_refresh_delay(at(3, 0), 3);
        assert_eq!(delay, TimeDelta::days(1));
    }

    #[test]
    fn out_of_range_hour_is_clamped() {
        let delay = next_refresh_delay(at(22, 0), 99);
        assert_eq!(delay, TimeDelta::hours(1));
    }
}
