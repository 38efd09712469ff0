use crate::domain::models::{CalendarDay, Entry};
use chrono::{Datelike, Duration, NaiveDate};
use chrono_tz::Tz;

/// Six full weeks. A floor, not a cap: months whose leading padding plus body
/// would overflow it still emit every real day.
pub const GRID_CELLS: usize = 42;

/// Builds the month view grid for `(year, month)`: trailing days of the
/// previous month, every day of the current month, then leading days of the
/// next month, each annotated with the entries falling on that local day.
/// `month` is 1-12. Pure and total; an out-of-range month yields an empty grid.
pub fn month_grid(
    year: i32,
    month: u32,
    entries: &[Entry],
    tz: Tz,
    today: NaiveDate,
) -> Vec<CalendarDay> {
    let Some(first) = NaiveDate::from_ymd_opt(year, month, 1) else {
        return Vec::new();
    };

    let leading = first.weekday().num_days_from_sunday() as usize;
    let body = days_in_month(first) as usize;
    let start = first - Duration::days(leading as i64);
    let total = GRID_CELLS.max(leading + body);

    let mut cells = Vec::with_capacity(total);
    for offset in 0..total {
        let date = start + Duration::days(offset as i64);
        let day_entries = entries
            .iter()
            .filter(|entry| entry.local_day(tz) == date)
            .cloned()
            .collect();
        cells.push(CalendarDay {
            date,
            is_current_month: date.year() == year && date.month() == month,
            is_today: date == today,
            entries: day_entries,
        });
    }
    cells
}

fn days_in_month(first: NaiveDate) -> i64 {
    (1..=31)
        .filter(|day| NaiveDate::from_ymd_opt(first.year(), first.month(), *day).is_some())
        .count() as i64
}
