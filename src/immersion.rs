use crate::{
    data::{CategoryStats, DateEncoding, ImmersionLog, MediaType, StreakResult},
    database::Database,
    dates::parse_date,
    streaks::StreakManager,
};
use chrono::{Months, NaiveDate};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum LogError {
    #[error("Invalid date format '{0}'. Please use YYYY-MM-DD (e.g. 2024-01-15).")]
    InvalidDateFormat(String),
    #[error("Cannot log immersion for a future date ({0}).")]
    FutureDate(String),
    #[error("Cannot log immersion for {0}: dates older than one year are not accepted.")]
    DateTooOld(String),
    #[error("Amount must be a finite number.")]
    InvalidAmount,
    #[error("Unknown media type '{0}'.")]
    UnknownMediaType(String),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// An activity as submitted by a user.
#[derive(Debug, Clone)]
pub struct NewActivity {
    pub user_id: String,
    pub media_type: MediaType,
    pub amount: f64,
    pub title: Option<String>,
    pub comment: Option<String>,
    /// `YYYY-MM-DD`; today's streak day when absent.
    pub custom_date: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogStreaks {
    pub overall: StreakResult,
    pub media: StreakResult,
}

#[derive(Debug, Clone)]
pub struct LogOutcome {
    pub log: ImmersionLog,
    pub stats: CategoryStats,
    /// `None` when the log was stored but the streak refresh after it failed.
    pub streaks: Option<LogStreaks>,
}

pub fn parse_media_type(value: &str) -> Result<MediaType, LogError> {
    value
        .trim()
        .parse()
        .map_err(|_| LogError::UnknownMediaType(value.to_string()))
}

/// Checks a user-supplied date against the streak day it is submitted on.
pub fn validate_custom_date(value: &str, today: NaiveDate) -> Result<String, LogError> {
    let value = value.trim();
    let date = parse_date(value).ok_or_else(|| LogError::InvalidDateFormat(value.to_string()))?;

    if date > today {
        return Err(LogError::FutureDate(value.to_string()));
    }

    let oldest = today
        .checked_sub_months(Months::new(12))
        .unwrap_or(NaiveDate::MIN);
    if date < oldest {
        return Err(LogError::DateTooOld(value.to_string()));
    }

    Ok(value.to_string())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && v != "-")
}

pub struct ImmersionLogger {
    db: Database,
    streaks: Arc<StreakManager>,
}

impl ImmersionLogger {
    pub fn new(db: Database, streaks: Arc<StreakManager>) -> Self {
        Self { db, streaks }
    }

    /// Records an activity, updates running totals atomically, then refreshes cached streaks.
    pub async fn log_activity(&self, activity: NewActivity) -> Result<LogOutcome, LogError> {
        if !activity.amount.is_finite() {
            return Err(LogError::InvalidAmount);
        }

        let now = self.streaks.now();
        let day = self.streaks.day_boundary();

        let (logged_date, date_encoding) = match activity.custom_date.as_deref() {
            Some(custom) => (validate_custom_date(custom, day.effective_day(now))?, DateEncoding::Raw),
            None => (day.effective_date_of(now), DateEncoding::Effective),
        };

        let log = ImmersionLog {
            id: Uuid::new_v4().to_string(),
            user_id: activity.user_id,
            media_type: activity.media_type,
            amount: activity.amount,
            title: non_empty(activity.title),
            comment: non_empty(activity.comment),
            logged_date,
            date_encoding,
            created_at: now,
        };

        let mut stats = self.db.append_log(&log).await?;
        debug!(
            "Logged {} {} of {} for user {} on {}",
            log.amount,
            log.media_type.unit(),
            log.media_type,
            log.user_id,
            log.logged_date
        );

        // The log is committed from here on
        let streaks = match self.refresh_streaks(&log).await {
            Ok(streaks) => {
                stats.current_streak = streaks.media.current;
                stats.best_streak = streaks.media.longest;
                info!(
                    "User {} logged {} (total {} {}), overall streak {} days",
                    log.user_id,
                    log.media_type.label(),
                    stats.total,
                    log.media_type.unit(),
                    streaks.overall.current
                );
                Some(streaks)
            }
            Err(e) => {
                warn!(
                    "Stored log {} for user {} but could not refresh streaks: {:#}",
                    log.id, log.user_id, e
                );
                None
            }
        };

        Ok(LogOutcome { log, stats, streaks })
    }

    async fn refresh_streaks(&self, log: &ImmersionLog) -> anyhow::Result<LogStreaks> {
        let summary = self.streaks.refresh_and_persist_streaks(&log.user_id).await?;
        let overall = self.streaks.get_overall_streak(&log.user_id).await?;
        let media = summary
            .by_category
            .get(log.media_type.as_str())
            .copied()
            .unwrap_or_default();
        Ok(LogStreaks { overall, media })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dates::{DayBoundary, FixedClock};
    use chrono::{TimeZone, Utc};

    fn d(value: &str) -> NaiveDate {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").unwrap()
    }

    fn activity(media_type: MediaType, amount: f64, custom_date: Option<&str>) -> NewActivity {
        NewActivity {
            user_id: "42".to_string(),
            media_type,
            amount,
            title: Some("  ".to_string()),
            comment: Some("-".to_string()),
            custom_date: custom_date.map(str::to_string),
        }
    }

    fn logger_at(db: &Database, now: chrono::DateTime<Utc>) -> ImmersionLogger {
        let streaks = StreakManager::new(db.clone(), DayBoundary::default(), Arc::new(FixedClock(now)));
        ImmersionLogger::new(db.clone(), Arc::new(streaks))
    }

    #[test]
    fn test_parse_media_type() {
        assert_eq!(parse_media_type(" manga ").unwrap(), MediaType::Manga);
        let err = parse_media_type("podcast").unwrap_err();
        assert!(matches!(err, LogError::UnknownMediaType(ref value) if value == "podcast"));
        assert_eq!(err.to_string(), "Unknown media type 'podcast'.");
    }

    #[test]
    fn test_validate_custom_date() {
        let today = d("2024-06-15");
        assert_eq!(validate_custom_date("2024-06-15", today).unwrap(), "2024-06-15");
        assert_eq!(validate_custom_date(" 2023-06-15 ", today).unwrap(), "2023-06-15");
        assert!(matches!(validate_custom_date("2024/06/15", today), Err(LogError::InvalidDateFormat(_))));
        assert!(matches!(validate_custom_date("2024-02-31", today), Err(LogError::InvalidDateFormat(_))));
        assert!(matches!(validate_custom_date("2024-06-16", today), Err(LogError::FutureDate(_))));
        assert!(matches!(validate_custom_date("2023-06-14", today), Err(LogError::DateTooOld(_))));
    }

    #[tokio::test]
    async fn test_log_uses_effective_date_and_counts_streak() {
        let db = Database::in_memory().await;

        let day_one = logger_at(&db, Utc.with_ymd_and_hms(2024, 3, 1, 21, 0, 0).unwrap());
        day_one.log_activity(activity(MediaType::Anime, 2.0, None)).await.unwrap();

        // 01:15 on the 3rd is still the 2nd's streak day
        let late_night = logger_at(&db, Utc.with_ymd_and_hms(2024, 3, 3, 1, 15, 0).unwrap());
        let outcome = late_night
            .log_activity(activity(MediaType::Anime, 1.0, None))
            .await
            .unwrap();

        assert_eq!(outcome.log.logged_date, "2024-03-02");
        assert_eq!(outcome.log.date_encoding, DateEncoding::Effective);
        assert_eq!(outcome.log.title, None);
        assert_eq!(outcome.log.comment, None);
        assert_eq!(outcome.stats.total, 3.0);
        assert_eq!(outcome.stats.sessions, 2);
        assert_eq!(outcome.streaks.unwrap().media, StreakResult { current: 2, longest: 2 });
        assert_eq!(outcome.streaks.unwrap().overall, StreakResult { current: 2, longest: 2 });
        assert_eq!((outcome.stats.current_streak, outcome.stats.best_streak), (2, 2));
    }

    #[tokio::test]
    async fn test_custom_date_restores_a_broken_streak() {
        let db = Database::in_memory().await;
        let logger = logger_at(&db, Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap());

        logger.log_activity(activity(MediaType::Reading, 5000.0, Some("2024-03-08"))).await.unwrap();
        let outcome = logger.log_activity(activity(MediaType::Reading, 3000.0, None)).await.unwrap();
        assert_eq!(outcome.streaks.unwrap().overall.current, 1);

        let restored = logger
            .log_activity(activity(MediaType::Reading, 100.0, Some("2024-03-09")))
            .await
            .unwrap();
        assert_eq!(restored.log.date_encoding, DateEncoding::Raw);
        assert_eq!(restored.streaks.unwrap().overall, StreakResult { current: 3, longest: 3 });
        assert_eq!(restored.stats.total, 8100.0);
    }

    #[tokio::test]
    async fn test_rejected_input_writes_nothing() {
        let db = Database::in_memory().await;
        let logger = logger_at(&db, Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap());

        let future = logger.log_activity(activity(MediaType::Book, 10.0, Some("2024-03-11"))).await;
        assert!(matches!(future, Err(LogError::FutureDate(_))));

        let nan = logger.log_activity(activity(MediaType::Book, f64::NAN, None)).await;
        assert!(matches!(nan, Err(LogError::InvalidAmount)));

        assert!(db.list_user_ids().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_media_streaks_are_independent() {
        let db = Database::in_memory().await;
        let yesterday = logger_at(&db, Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap());
        yesterday.log_activity(activity(MediaType::Manga, 10.0, None)).await.unwrap();

        let today = logger_at(&db, Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap());
        let outcome = today.log_activity(activity(MediaType::Listening, 30.0, None)).await.unwrap();

        assert_eq!(outcome.streaks.unwrap().media, StreakResult { current: 1, longest: 1 });
        assert_eq!(outcome.streaks.unwrap().overall, StreakResult { current: 2, longest: 2 });
        assert_eq!(outcome.stats.total, 30.0);
    }

    #[tokio::test]
    async fn test_custom_date_is_bounded_by_the_streak_day() {
        let db = Database::in_memory().await;
        // 01:00 on the 10th still belongs to the 9th
        let logger = logger_at(&db, Utc.with_ymd_and_hms(2024, 3, 10, 1, 0, 0).unwrap());

        let early = logger.log_activity(activity(MediaType::Anime, 1.0, Some("2024-03-10"))).await;
        assert!(matches!(early, Err(LogError::FutureDate(_))));

        let outcome = logger
            .log_activity(activity(MediaType::Anime, 1.0, Some("2024-03-09")))
            .await
            .unwrap();
        assert_eq!(outcome.streaks.unwrap().overall, StreakResult { current: 1, longest: 1 });
    }

    #[tokio::test]
    async fn test_failed_refresh_still_reports_the_stored_log() {
        let db = Database::in_memory().await;
        db.execute_raw("DROP TABLE user_streaks").await;
        let logger = logger_at(&db, Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap());

        let outcome = logger
            .log_activity(activity(MediaType::Book, 12.0, None))
            .await
            .unwrap();

        assert_eq!(outcome.streaks, None);
        assert_eq!(outcome.stats.total, 12.0);
        assert_eq!(outcome.stats.sessions, 1);
        assert_eq!(db.fetch_log_entries("42", None).await.unwrap().len(), 1);
    }
}
