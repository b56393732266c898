use crate::data::{ActivityLogEntry, CategoryStats, ImmersionLog, StreakResult, StreakSummary};
use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{FromRow, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};

const SCHEMA: [&str; 5] = [
    r#"
    CREATE TABLE IF NOT EXISTS immersion_logs (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        media_type TEXT,
        amount REAL NOT NULL DEFAULT 0,
        title TEXT,
        comment TEXT,
        logged_date TEXT,
        date_encoding TEXT,
        created_at TEXT,
        legacy_timestamp TEXT
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_logs_user_media ON immersion_logs (user_id, media_type)",
    r#"
    CREATE TABLE IF NOT EXISTS user_stats (
        user_id TEXT NOT NULL,
        media_type TEXT NOT NULL,
        total REAL NOT NULL DEFAULT 0,
        sessions INTEGER NOT NULL DEFAULT 0,
        current_streak INTEGER NOT NULL DEFAULT 0,
        best_streak INTEGER NOT NULL DEFAULT 0,
        last_activity TEXT,
        PRIMARY KEY (user_id, media_type)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS user_streaks (
        user_id TEXT PRIMARY KEY,
        current_streak INTEGER NOT NULL,
        longest_streak INTEGER NOT NULL,
        by_category TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS users (
        user_id TEXT PRIMARY KEY,
        joined_at TEXT NOT NULL
    )
    "#,
];

#[derive(FromRow)]
struct LogEntryRow {
    logged_date: Option<String>,
    created_at: Option<DateTime<Utc>>,
    legacy_timestamp: Option<DateTime<Utc>>,
    media_type: Option<String>,
}

impl From<LogEntryRow> for ActivityLogEntry {
    fn from(row: LogEntryRow) -> Self {
        ActivityLogEntry {
            logged_date: row.logged_date,
            created_at: row.created_at,
            legacy_timestamp: row.legacy_timestamp,
            category: row.media_type,
        }
    }
}

#[derive(FromRow)]
struct CategoryStatsRow {
    media_type: String,
    total: f64,
    sessions: u32,
    current_streak: u32,
    best_streak: u32,
    last_activity: Option<DateTime<Utc>>,
}

impl From<CategoryStatsRow> for CategoryStats {
    fn from(row: CategoryStatsRow) -> Self {
        CategoryStats {
            media_type: row.media_type,
            total: row.total,
            sessions: row.sessions,
            current_streak: row.current_streak,
            best_streak: row.best_streak,
            last_activity: row.last_activity,
        }
    }
}

const STATS_COLUMNS: &str =
    "media_type, total, sessions, current_streak, best_streak, last_activity";

/// Immersion log store backed by SQLite.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    pub async fn init_schema(&self) -> Result<()> {
        info!("Database: Initializing schema...");
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        debug!("Database: Schema initialized successfully");
        Ok(())
    }

    /// Date-bearing fields of a user's logs, optionally narrowed to one media type.
    pub async fn fetch_log_entries(
        &self,
        user_id: &str,
        media_type: Option<&str>,
    ) -> Result<Vec<ActivityLogEntry>> {
        let rows: Vec<LogEntryRow> = match media_type {
            Some(media_type) => {
                sqlx::query_as(
                    "SELECT logged_date, created_at, legacy_timestamp, media_type
                     FROM immersion_logs WHERE user_id = ?1 AND media_type = ?2",
                )
                .bind(user_id)
                .bind(media_type)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as(
                    "SELECT logged_date, created_at, legacy_timestamp, media_type
                     FROM immersion_logs WHERE user_id = ?1",
                )
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?
            }
        };
        debug!(
            "Database: Loaded {} log entries for user {} (media filter: {:?})",
            rows.len(),
            user_id,
            media_type
        );
        Ok(rows.into_iter().map(ActivityLogEntry::from).collect())
    }

    /// Appends a log and bumps the user's running totals in one transaction.
    ///
    /// Returns the stats row for the log's media type as it stands after the append.
    pub async fn append_log(&self, log: &ImmersionLog) -> Result<CategoryStats> {
        debug!(
            "Database: Appending {} log {} for user {} on {}",
            log.media_type, log.id, log.user_id, log.logged_date
        );
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO immersion_logs
                (id, user_id, media_type, amount, title, comment, logged_date, date_encoding, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )
        .bind(&log.id)
        .bind(&log.user_id)
        .bind(log.media_type.as_str())
        .bind(log.amount)
        .bind(&log.title)
        .bind(&log.comment)
        .bind(&log.logged_date)
        .bind(log.date_encoding.as_str())
        .bind(log.created_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO user_stats (user_id, media_type, total, sessions, last_activity)
             VALUES (?1, ?2, ?3, 1, ?4)
             ON CONFLICT(user_id, media_type) DO UPDATE SET
                total = total + excluded.total,
                sessions = sessions + 1,
                last_activity = excluded.last_activity",
        )
        .bind(&log.user_id)
        .bind(log.media_type.as_str())
        .bind(log.amount)
        .bind(log.created_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO users (user_id, joined_at) VALUES (?1, ?2) ON CONFLICT(user_id) DO NOTHING")
            .bind(&log.user_id)
            .bind(log.created_at)
            .execute(&mut *tx)
            .await?;

        let row: CategoryStatsRow = sqlx::query_as(&format!(
            "SELECT {} FROM user_stats WHERE user_id = ?1 AND media_type = ?2",
            STATS_COLUMNS
        ))
        .bind(&log.user_id)
        .bind(log.media_type.as_str())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row.into())
    }

    /// Writes per-category streaks into user stats and replaces the aggregate row.
    pub async fn save_streaks(
        &self,
        user_id: &str,
        summary: &StreakSummary,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let by_category = serde_json::to_string(&summary.by_category)?;
        let mut tx = self.pool.begin().await?;

        for (media_type, streak) in &summary.by_category {
            sqlx::query(
                "INSERT INTO user_stats (user_id, media_type, current_streak, best_streak)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(user_id, media_type) DO UPDATE SET
                    current_streak = excluded.current_streak,
                    best_streak = excluded.best_streak",
            )
            .bind(user_id)
            .bind(media_type)
            .bind(streak.current)
            .bind(streak.longest)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            "INSERT INTO user_streaks (user_id, current_streak, longest_streak, by_category, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(user_id) DO UPDATE SET
                current_streak = excluded.current_streak,
                longest_streak = excluded.longest_streak,
                by_category = excluded.by_category,
                updated_at = excluded.updated_at",
        )
        .bind(user_id)
        .bind(summary.overall.current)
        .bind(summary.overall.longest)
        .bind(by_category)
        .bind(updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        debug!(
            "Database: Saved streaks for user {} ({} categories)",
            user_id,
            summary.by_category.len()
        );
        Ok(())
    }

    pub async fn fetch_user_stats(&self, user_id: &str) -> Result<Vec<CategoryStats>> {
        let rows: Vec<CategoryStatsRow> = sqlx::query_as(&format!(
            "SELECT {} FROM user_stats WHERE user_id = ?1 ORDER BY media_type",
            STATS_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(CategoryStats::from).collect())
    }

    /// The cached best-of streak and per-category snapshot, if any refresh has run.
    pub async fn fetch_streak_aggregate(&self, user_id: &str) -> Result<Option<StreakSummary>> {
        let row: Option<(u32, u32, String)> = sqlx::query_as(
            "SELECT current_streak, longest_streak, by_category FROM user_streaks WHERE user_id = ?1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some((current, longest, by_category)) => Ok(Some(StreakSummary {
                overall: StreakResult { current, longest },
                by_category: serde_json::from_str(&by_category)?,
            })),
            None => Ok(None),
        }
    }

    /// When the user first logged. Users from before the `users` table fall back to their oldest log.
    pub async fn fetch_joined_at(&self, user_id: &str) -> Result<Option<DateTime<Utc>>> {
        let joined_at: Option<DateTime<Utc>> = sqlx::query_scalar(
            "SELECT COALESCE(
                (SELECT joined_at FROM users WHERE user_id = ?1),
                (SELECT MIN(COALESCE(created_at, legacy_timestamp)) FROM immersion_logs WHERE user_id = ?1)
             )",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(joined_at)
    }

    /// Every user that has at least one log.
    pub async fn list_user_ids(&self) -> Result<Vec<String>> {
        let ids: Vec<String> =
            sqlx::query_scalar("SELECT DISTINCT user_id FROM immersion_logs ORDER BY user_id")
                .fetch_all(&self.pool)
                .await?;
        Ok(ids)
    }
}

#[cfg(test)]
impl Database {
    /// Private in-memory database with the schema applied.
    pub async fn in_memory() -> Self {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let db = Database { pool };
        db.init_schema().await.unwrap();
        db
    }

    pub async fn execute_raw(&self, statement: &str) {
        sqlx::query(statement).execute(&self.pool).await.unwrap();
    }

    /// Inserts a bare row the way older bot versions stored them.
    pub async fn insert_entry(&self, user_id: &str, entry: &ActivityLogEntry) {
        sqlx::query(
            "INSERT INTO immersion_logs (id, user_id, media_type, logged_date, created_at, legacy_timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(user_id)
        .bind(&entry.category)
        .bind(&entry.logged_date)
        .bind(entry.created_at)
        .bind(entry.legacy_timestamp)
        .execute(&self.pool)
        .await
        .unwrap();
    }
}
