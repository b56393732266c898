use crate::{database::Database, streaks::StreakManager};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RefreshReport {
    pub refreshed: usize,
    pub failed: usize,
}

/// Recomputes cached streaks for every user on a cron schedule, so users who
/// stopped logging see their stored streak drop without logging again.
pub struct StreakRefreshScheduler {
    db: Database,
    streaks: Arc<StreakManager>,
    schedule: Schedule,
    timezone: Tz,
}

impl StreakRefreshScheduler {
    pub fn new(db: Database, streaks: Arc<StreakManager>, schedule: Schedule, timezone: Tz) -> Self {
        Self {
            db,
            streaks,
            schedule,
            timezone,
        }
    }

    /// Run the refresh loop forever
    pub async fn start(&self) {
        info!("Starting streak refresh scheduler ({})", self.schedule);

        loop {
            let now = Utc::now();
            let Some(next) = self.next_run(now) else {
                warn!("Streak refresh schedule has no upcoming runs, stopping scheduler");
                return;
            };

            let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
            debug!("Next streak refresh at {} (in {}s)", next, wait.as_secs());
            sleep(wait).await;

            match self.refresh_all().await {
                Ok(report) => info!(
                    "Streak refresh finished: {} users refreshed, {} failed",
                    report.refreshed, report.failed
                ),
                Err(e) => error!("Streak refresh could not list users: {}", e),
            }
        }
    }

    /// First fire time strictly after `after`, evaluated in the configured timezone.
    pub fn next_run(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule
            .after(&after.with_timezone(&self.timezone))
            .next()
            .map(|at| at.with_timezone(&Utc))
    }

    /// Refreshes every user with logs. One user's failure is logged and skipped.
    pub async fn refresh_all(&self) -> anyhow::Result<RefreshReport> {
        let user_ids = self.db.list_user_ids().await?;
        let mut report = RefreshReport::default();

        for user_id in &user_ids {
            match self.streaks.refresh_and_persist_streaks(user_id).await {
                Ok(_) => report.refreshed += 1,
                Err(e) => {
                    error!("Failed to refresh streaks for user {}: {}", user_id, e);
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{ActivityLogEntry, StreakResult};
    use crate::dates::{DayBoundary, FixedClock};
    use chrono::TimeZone;
    use std::str::FromStr;

    fn scheduler(db: &Database, now: DateTime<Utc>, expr: &str, timezone: Tz) -> StreakRefreshScheduler {
        let streaks = StreakManager::new(
            db.clone(),
            DayBoundary::new(2, timezone),
            Arc::new(FixedClock(now)),
        );
        StreakRefreshScheduler::new(db.clone(), Arc::new(streaks), Schedule::from_str(expr).unwrap(), timezone)
    }

    #[tokio::test]
    async fn test_next_run_uses_local_time() {
        let db = Database::in_memory().await;
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();

        let utc = scheduler(&db, now, "0 5 2 * * *", chrono_tz::UTC);
        assert_eq!(utc.next_run(now), Some(Utc.with_ymd_and_hms(2024, 1, 16, 2, 5, 0).unwrap()));

        // 02:05 in Jakarta is 19:05 UTC the previous evening
        let jakarta = scheduler(&db, now, "0 5 2 * * *", chrono_tz::Asia::Jakarta);
        assert_eq!(jakarta.next_run(now), Some(Utc.with_ymd_and_hms(2024, 1, 15, 19, 5, 0).unwrap()));
    }

    #[tokio::test]
    async fn test_refresh_all_updates_every_user() {
        let db = Database::in_memory().await;
        for (user, date) in [("a", "2024-01-14"), ("a", "2024-01-15"), ("b", "2024-01-10")] {
            db.insert_entry(
                user,
                &ActivityLogEntry {
                    logged_date: Some(date.to_string()),
                    category: Some("anime".to_string()),
                    ..Default::default()
                },
            )
            .await;
        }

        let now = Utc.with_ymd_and_hms(2024, 1, 16, 2, 5, 0).unwrap();
        let job = scheduler(&db, now, "0 5 2 * * *", chrono_tz::UTC);
        let report = job.refresh_all().await.unwrap();

        assert_eq!(report, RefreshReport { refreshed: 2, failed: 0 });
        let a = db.fetch_streak_aggregate("a").await.unwrap().unwrap();
        assert_eq!(a.overall, StreakResult { current: 2, longest: 2 });
        let b = db.fetch_streak_aggregate("b").await.unwrap().unwrap();
        assert_eq!(b.overall, StreakResult { current: 0, longest: 1 });
    }
}
