use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const STARTING_CREDITS: u32 = 50;
pub const DEFAULT_MAX_SESSIONS: usize = 10_000;

/// Per-session usage counters. In memory only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageStats {
    pub credits_remaining: u32,
    pub analyses_today: u32,
}

impl Default for UsageStats {
    fn default() -> Self {
        Self {
            credits_remaining: STARTING_CREDITS,
            analyses_today: 0,
        }
    }
}

impl UsageStats {
    /// Count one successful analysis.
    pub fn record_analysis(&mut self) {
        self.credits_remaining = self.credits_remaining.saturating_sub(1);
        self.analyses_today = self.analyses_today.saturating_add(1);
    }
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    stats: UsageStats,
    day: NaiveDate,
    last_seen: DateTime<Utc>,
}

/// Usage keyed by session id, holding at most `max_sessions` entries.
///
/// `analyses_today` restarts on the first analysis of a new UTC day. When the
/// table is full, sessions idle since an earlier day are dropped first, then
/// the least recently seen one.
#[derive(Debug)]
pub struct UsageTracker {
    entries: HashMap<String, Entry>,
    max_sessions: usize,
}

impl UsageTracker {
    pub fn new(max_sessions: usize) -> Self {
        Self {
            entries: HashMap::new(),
            max_sessions: max_sessions.max(1),
        }
    }

    pub fn record(&mut self, session_id: &str, now: DateTime<Utc>) -> UsageStats {
        let today = now.date_naive();
        if !self.entries.contains_key(session_id) && self.entries.len() >= self.max_sessions {
            self.make_room(today);
        }

        let entry = self
            .entries
            .entry(session_id.to_string())
            .or_insert_with(|| Entry {
                stats: UsageStats::default(),
                day: today,
                last_seen: now,
            });
        if entry.day != today {
            entry.stats.analyses_today = 0;
            entry.day = today;
        }
        entry.last_seen = now;
        entry.stats.record_analysis();
        entry.stats
    }

    fn make_room(&mut self, today: NaiveDate) {
        self.entries.retain(|_, e| e.day == today);
        if self.entries.len() < self.max_sessions {
            return;
        }
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, e)| e.last_seen)
            .map(|(id, _)| id.clone());
        if let Some(id) = oldest {
            tracing::debug!(session_id = %id, "usage table full; evicting least recent session");
            self.entries.remove(&id);
        }
    }
}

impl Default for UsageTracker {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SESSIONS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, hour, 0, 0).unwrap()
    }

    #[test]
    fn records_and_saturates() {
        let mut usage = UsageStats::default();
        usage.record_analysis();
        assert_eq!(
            usage,
            UsageStats {
                credits_remaining: 49,
                analyses_today: 1,
            }
        );

        let mut spent = UsageStats {
            credits_remaining: 0,
            analyses_today: 50,
        };
        spent.record_analysis();
        assert_eq!(spent.credits_remaining, 0);
        assert_eq!(spent.analyses_today, 51);
    }

    #[test]
    fn tracks_sessions_separately() {
        let mut tracker = UsageTracker::default();
        tracker.record("a", at(2, 9));
        tracker.record("a", at(2, 10));
        let b = tracker.record("b", at(2, 11));
        assert_eq!(b.analyses_today, 1);
        assert_eq!(tracker.record("a", at(2, 12)).credits_remaining, 47);
    }

    #[test]
    fn daily_count_rolls_over_but_credits_do_not() {
        let mut tracker = UsageTracker::default();
        tracker.record("a", at(2, 22));
        tracker.record("a", at(2, 23));

        let next_day = tracker.record("a", at(3, 1));
        assert_eq!(
            next_day,
            UsageStats {
                credits_remaining: 47,
                analyses_today: 1,
            }
        );
    }

    #[test]
    fn table_size_is_bounded() {
        let mut tracker = UsageTracker::new(3);
        let start = at(2, 8);
        for i in 0..100 {
            tracker.record(&format!("s-{i}"), start + Duration::seconds(i));
        }
        assert_eq!(tracker.entries.len(), 3);

        // The most recent sessions survive.
        assert_eq!(tracker.record("s-99", start + Duration::hours(1)).analyses_today, 2);
        assert_eq!(tracker.entries.len(), 3);
    }

    #[test]
    fn stale_days_are_pruned_first() {
        let mut tracker = UsageTracker::new(2);
        tracker.record("old", at(1, 9));
        tracker.record("today", at(2, 8));
        tracker.record("new", at(2, 9));

        assert_eq!(tracker.entries.len(), 2);
        assert_eq!(tracker.record("today", at(2, 10)).analyses_today, 2);
        assert_eq!(tracker.record("old", at(2, 11)).analyses_today, 1);
    }
}
