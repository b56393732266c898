use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Kind of immersion being logged. The key doubles as the streak category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    VisualNovel,
    Manga,
    Anime,
    Book,
    ReadingTime,
    Listening,
    Reading,
}

impl MediaType {
    pub const ALL: [MediaType; 7] = [
        MediaType::VisualNovel,
        MediaType::Manga,
        MediaType::Anime,
        MediaType::Book,
        MediaType::ReadingTime,
        MediaType::Listening,
        MediaType::Reading,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::VisualNovel => "visual_novel",
            MediaType::Manga => "manga",
            MediaType::Anime => "anime",
            MediaType::Book => "book",
            MediaType::ReadingTime => "reading_time",
            MediaType::Listening => "listening",
            MediaType::Reading => "reading",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MediaType::VisualNovel => "Visual Novel",
            MediaType::Manga => "Manga",
            MediaType::Anime => "Anime",
            MediaType::Book => "Book",
            MediaType::ReadingTime => "Reading Time",
            MediaType::Listening => "Listening",
            MediaType::Reading => "Reading",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            MediaType::VisualNovel | MediaType::Reading => "characters",
            MediaType::Manga | MediaType::Book => "pages",
            MediaType::Anime => "episodes",
            MediaType::ReadingTime | MediaType::Listening => "minutes",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MediaType::ALL
            .into_iter()
            .find(|media| media.as_str() == s)
            .ok_or_else(|| format!("unknown media type '{}'", s))
    }
}

/// How a stored `logged_date` string was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateEncoding {
    /// Plain calendar date, e.g. a user-supplied custom date.
    Raw,
    /// Derived from a timestamp with the day-end offset applied.
    Effective,
}

impl DateEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            DateEncoding::Raw => "raw",
            DateEncoding::Effective => "effective",
        }
    }
}

/// The date-bearing view of one stored log, as the streak engine reads it.
///
/// Rows written before `logged_date` existed only carry one of the timestamps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityLogEntry {
    pub logged_date: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub legacy_timestamp: Option<DateTime<Utc>>,
    pub category: Option<String>,
}

/// A full immersion log row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImmersionLog {
    pub id: String,
    pub user_id: String,
    pub media_type: MediaType,
    pub amount: f64,
    pub title: Option<String>,
    pub comment: Option<String>,
    pub logged_date: String,
    pub date_encoding: DateEncoding,
    pub created_at: DateTime<Utc>,
}

/// Running totals and cached streaks for one user and one media type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryStats {
    pub media_type: String,
    pub total: f64,
    pub sessions: u32,
    pub current_streak: u32,
    pub best_streak: u32,
    pub last_activity: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakResult {
    pub current: u32,
    pub longest: u32,
}

/// Per-category streaks plus the best-of aggregate, as written back to user stats.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakSummary {
    pub overall: StreakResult,
    pub by_category: BTreeMap<String, StreakResult>,
}

/// Profile line shown under a user's streaks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserSummary {
    pub total_sessions: u32,
    pub active_types: Vec<String>,
    pub joined_at: Option<DateTime<Utc>>,
}

impl UserSummary {
    pub fn new(stats: &[CategoryStats], joined_at: Option<DateTime<Utc>>) -> Self {
        UserSummary {
            total_sessions: stats.iter().map(|s| s.sessions).sum(),
            active_types: stats
                .iter()
                .filter(|s| s.sessions > 0)
                .map(|s| s.media_type.clone())
                .collect(),
            joined_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_user_summary_counts_active_types() {
        let row = |media_type: &str, sessions: u32| CategoryStats {
            media_type: media_type.to_string(),
            total: 1.0,
            sessions,
            current_streak: 0,
            best_streak: 0,
            last_activity: None,
        };
        let joined = Utc.with_ymd_and_hms(2023, 5, 1, 0, 0, 0).unwrap();

        // rows created by a streak refresh alone have no sessions
        let summary = UserSummary::new(&[row("anime", 3), row("legacy_tag", 0), row("manga", 2)], Some(joined));
        assert_eq!(summary.total_sessions, 5);
        assert_eq!(summary.active_types, vec!["anime", "manga"]);
        assert_eq!(summary.joined_at, Some(joined));
    }

    #[test]
    fn test_media_type_keys_round_trip() {
        for media in MediaType::ALL {
            assert_eq!(media.as_str().parse::<MediaType>(), Ok(media));
        }
        assert!("podcast".parse::<MediaType>().is_err());
    }

    #[test]
    fn test_media_type_units() {
        assert_eq!(MediaType::VisualNovel.unit(), "characters");
        assert_eq!(MediaType::Anime.unit(), "episodes");
        assert_eq!(MediaType::Listening.unit(), "minutes");
        assert_eq!(MediaType::ReadingTime.label(), "Reading Time");
    }

    #[test]
    fn test_serde_uses_keys() {
        let json = serde_json::to_string(&MediaType::ReadingTime).unwrap();
        assert_eq!(json, "\"reading_time\"");
        let encoding: DateEncoding = serde_json::from_str("\"effective\"").unwrap();
        assert_eq!(encoding, DateEncoding::Effective);
    }
}
