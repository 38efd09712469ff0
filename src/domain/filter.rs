use crate::domain::models::Entry;
use chrono::NaiveDate;
use chrono_tz::Tz;

/// Journal list filter: free-text query over title/content, optional category
/// name, favorites-only, and an inclusive local-day range.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryFilter {
    pub query: String,
    pub category: Option<String>,
    pub only_favorites: bool,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl EntryFilter {
    pub fn apply(&self, entries: &[Entry], tz: Tz) -> Vec<Entry> {
        let query = self.query.trim().to_lowercase();
        let mut matched: Vec<Entry> = entries
            .iter()
            .filter(|entry| self.matches(entry, &query, tz))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.date.cmp(&a.date));
        matched
    }

    fn matches(&self, entry: &Entry, query: &str, tz: Tz) -> bool {
        if let Some(category) = &self.category
            && entry.category != *category
        {
            return false;
        }
        if self.only_favorites && !entry.is_favorite {
            return false;
        }

        let day = entry.local_day(tz);
        if let Some(from) = self.from
            && day < from
        {
            return false;
        }
        if let Some(to) = self.to
            && day > to
        {
            return false;
        }

        query.is_empty()
            || entry.title.to_lowercase().contains(query)
            || entry.content.to_lowercase().contains(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn entry(id: &str, title: &str, category: &str, date: &str, is_favorite: bool) -> Entry {
        Entry {
            id: id.to_string(),
            title: title.to_string(),
            content: format!("content of {title}"),
            category: category.to_string(),
            date: DateTime::parse_from_rfc3339(date)
                .expect("valid datetime")
                .with_timezone(&Utc),
            is_favorite,
            images: Vec::new(),
        }
    }

    fn sample_entries() -> Vec<Entry> {
        vec![
            entry("a", "Morning thanks", "GRATIDÃO", "2026-03-01T08:00:00Z", true),
            entry("b", "For my family", "INTERCESSÃO", "2026-03-05T20:00:00Z", false),
            entry("c", "Evening confession", "CONFISSÃO", "2026-03-03T22:00:00Z", false),
        ]
    }

    #[test]
    fn default_filter_returns_all_sorted_most_recent_first() {
        let result = EntryFilter::default().apply(&sample_entries(), chrono_tz::UTC);
        let ids: Vec<&str> = result.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }

    #[test]
    fn query_matches_title_or_content_case_insensitively() {
        let filter = EntryFilter {
            query: "FAMILY".to_string(),
            ..EntryFilter::default()
        };
        let result = filter.apply(&sample_entries(), chrono_tz::UTC);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id, "b");
    }

    #[test]
    fn category_and_favorites_narrow_the_list() {
        let by_category = EntryFilter {
            category: Some("CONFISSÃO".to_string()),
            ..EntryFilter::default()
        };
        assert_eq!(by_category.apply(&sample_entries(), chrono_tz::UTC).len(), 1);

        let favorites = EntryFilter {
            only_favorites: true,
            ..EntryFilter::default()
        };
        let result = favorites.apply(&sample_entries(), chrono_tz::UTC);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id, "a");
    }

    #[test]
    fn date_range_is_inclusive_of_both_ends() {
        let filter = EntryFilter {
            from: Some("2026-03-01".parse().expect("valid date")),
            to: Some("2026-03-03".parse().expect("valid date")),
            ..EntryFilter::default()
        };
        let result = filter.apply(&sample_entries(), chrono_tz::UTC);
        let ids: Vec<&str> = result.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a"]);
    }
}
