use crate::{
    data::{ActivityLogEntry, StreakResult, StreakSummary},
    database::Database,
    dates::{format_date, next_date, previous_date, Clock, DayBoundary},
};
use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Deref;
use std::sync::Arc;
use tracing::{debug, info};

/// Distinct activity days for one user, ascending.
///
/// `YYYY-MM-DD` strings sort chronologically, so string order is date order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DateSet(Vec<String>);

impl Deref for DateSet {
    type Target = [String];

    fn deref(&self) -> &[String] {
        &self.0
    }
}

impl FromIterator<String> for DateSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        let unique: BTreeSet<String> = iter.into_iter().collect();
        DateSet(unique.into_iter().collect())
    }
}

/// The day a log counts towards.
///
/// A stored `logged_date` is trusted as-is. Only rows without one fall back to
/// their timestamps, read as raw calendar days for compatibility with old rows.
pub fn resolve_date(entry: &ActivityLogEntry, day: &DayBoundary) -> Option<String> {
    if let Some(date) = entry.logged_date.as_deref().filter(|d| !d.is_empty()) {
        return Some(date.to_string());
    }
    entry
        .created_at
        .or(entry.legacy_timestamp)
        .map(|ts| day.raw_date_of(ts))
}

pub fn extract_dates(
    records: &[ActivityLogEntry],
    category: Option<&str>,
    day: &DayBoundary,
) -> DateSet {
    records
        .iter()
        .filter(|entry| match category {
            Some(wanted) => entry.category.as_deref() == Some(wanted),
            None => true,
        })
        .filter_map(|entry| resolve_date(entry, day))
        .collect()
}

/// One pass over the records, one date set per category. Uncategorised rows are skipped.
pub fn group_dates_by_category(
    records: &[ActivityLogEntry],
    day: &DayBoundary,
) -> BTreeMap<String, DateSet> {
    let mut grouped: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for entry in records {
        let Some(category) = entry.category.as_deref().filter(|c| !c.is_empty()) else {
            continue;
        };
        if let Some(date) = resolve_date(entry, day) {
            grouped.entry(category.to_string()).or_default().insert(date);
        }
    }
    grouped
        .into_iter()
        .map(|(category, dates)| (category, dates.into_iter().collect()))
        .collect()
}

/// Current and longest streak over ascending, distinct dates.
///
/// The current streak ends at `today`, or at yesterday while nothing has been
/// logged today yet. Dates after `today` never count towards it.
pub fn compute_streak(dates: &[String], today: NaiveDate) -> StreakResult {
    if dates.is_empty() {
        return StreakResult::default();
    }

    let today = format_date(today);
    let mut current = count_back_from(dates, &today);

    if current == 0 {
        if let Some(yesterday) = previous_date(&today) {
            if dates.contains(&yesterday) {
                current = count_back_from(dates, &yesterday);
            }
        }
    }

    StreakResult {
        current,
        longest: longest_run(dates).max(current),
    }
}

fn count_back_from(dates: &[String], start: &str) -> u32 {
    let mut expected = start.to_string();
    let mut count = 0;

    for date in dates.iter().rev() {
        match date.as_str().cmp(expected.as_str()) {
            Ordering::Equal => {
                count += 1;
                match previous_date(&expected) {
                    Some(prev) => expected = prev,
                    None => break,
                }
            }
            // gap
            Ordering::Less => break,
            Ordering::Greater => {}
        }
    }

    count
}

fn longest_run(dates: &[String]) -> u32 {
    if dates.is_empty() {
        return 0;
    }

    let mut longest = 1;
    let mut run = 1;
    for pair in dates.windows(2) {
        if next_date(&pair[0]).as_deref() == Some(pair[1].as_str()) {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 1;
        }
    }
    longest
}

/// Streak per category plus the best-of aggregate across them.
pub fn summarize_streaks(grouped: &BTreeMap<String, DateSet>, today: NaiveDate) -> StreakSummary {
    let by_category: BTreeMap<String, StreakResult> = grouped
        .iter()
        .map(|(category, dates)| (category.clone(), compute_streak(dates, today)))
        .collect();

    let overall = by_category
        .values()
        .fold(StreakResult::default(), |best, streak| StreakResult {
            current: best.current.max(streak.current),
            longest: best.longest.max(streak.longest),
        });

    StreakSummary { overall, by_category }
}

/// Streak queries over the log store. Every call reads fresh rows; nothing is cached here.
pub struct StreakManager {
    db: Database,
    day: DayBoundary,
    clock: Arc<dyn Clock>,
}

impl StreakManager {
    pub fn new(db: Database, day: DayBoundary, clock: Arc<dyn Clock>) -> Self {
        Self { db, day, clock }
    }

    pub fn day_boundary(&self) -> &DayBoundary {
        &self.day
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn today(&self) -> NaiveDate {
        self.day.today(self.clock.as_ref())
    }

    pub async fn get_overall_streak(&self, user_id: &str) -> Result<StreakResult> {
        let records = self.db.fetch_log_entries(user_id, None).await?;
        let dates = extract_dates(&records, None, &self.day);
        let streak = compute_streak(&dates, self.today());
        debug!(
            "Overall streak for user {}: {} days over {} active days (longest {})",
            user_id,
            streak.current,
            dates.len(),
            streak.longest
        );
        Ok(streak)
    }

    /// An unknown category simply has no logs and yields a zero streak.
    pub async fn get_streak_for_category(&self, user_id: &str, category: &str) -> Result<StreakResult> {
        let records = self.db.fetch_log_entries(user_id, Some(category)).await?;
        let dates = extract_dates(&records, Some(category), &self.day);
        let streak = compute_streak(&dates, self.today());
        debug!(
            "{} streak for user {}: {} days (longest {})",
            category, user_id, streak.current, streak.longest
        );
        Ok(streak)
    }

    /// Recomputes every category's streak from one read and writes them back to user stats.
    pub async fn refresh_and_persist_streaks(&self, user_id: &str) -> Result<StreakSummary> {
        let records = self.db.fetch_log_entries(user_id, None).await?;
        let grouped = group_dates_by_category(&records, &self.day);
        let summary = summarize_streaks(&grouped, self.today());

        self.db.save_streaks(user_id, &summary, self.clock.now()).await?;
        info!(
            "Refreshed streaks for user {}: best current {} days, best ever {} days across {} categories",
            user_id,
            summary.overall.current,
            summary.overall.longest,
            summary.by_category.len()
        );
        Ok(summary)
    }
}
