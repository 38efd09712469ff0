use crate::domain::models::{Entry, JournalStats};
use chrono::{Datelike, Duration, NaiveDate};
use chrono_tz::Tz;
use std::collections::BTreeSet;

/// Aggregate counts plus the consecutive-day streak, computed fresh from the
/// entry list. Pure and total; `today` is injected so callers own the clock.
pub fn compute_stats(entries: &[Entry], tz: Tz, today: NaiveDate) -> JournalStats {
    let current_month = entries
        .iter()
        .filter(|entry| {
            let day = entry.local_day(tz);
            day.year() == today.year() && day.month() == today.month()
        })
        .count();

    JournalStats {
        total: entries.len(),
        favorites: entries.iter().filter(|entry| entry.is_favorite).count(),
        current_month,
        streak_days: streak_days(entries, tz, today),
    }
}

/// Length of the chain of consecutive calendar days with at least one entry,
/// anchored at today or yesterday. An unbroken chain ending yesterday still
/// counts, so a positive streak does not imply an entry exists today.
pub fn streak_days(entries: &[Entry], tz: Tz, today: NaiveDate) -> u32 {
    let distinct: BTreeSet<NaiveDate> = entries.iter().map(|entry| entry.local_day(tz)).collect();
    let mut days: Vec<NaiveDate> = distinct.into_iter().collect();
    days.reverse();

    let Some(&most_recent) = days.first() else {
        return 0;
    };
    if most_recent != today && most_recent != today - Duration::days(1) {
        return 0;
    }

    let mut streak = 1;
    for pair in days.windows(2) {
        if pair[0] - pair[1] == Duration::days(1) {
            streak += 1;
        } else {
            break;
        }
    }
    streak
}
