//! Month and venue options for a league's fixture filters.

use chrono::{Datelike, NaiveDate, Utc};
use common::{Fixture, League, Venue};
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};

/// Options a view offers for narrowing a league's fixtures.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterOptions {
    /// `YYYY-MM`, ascending, never before the current month.
    pub available_months: Vec<String>,
    /// Unique by id, in first-seen order.
    pub available_venues: Vec<Venue>,
}

fn is_month_key(s: &str) -> bool {
    let b = s.as_bytes();
    b.len() == 7
        && b[4] == b'-'
        && b[..4].iter().all(u8::is_ascii_digit)
        && b[5..].iter().all(u8::is_ascii_digit)
}

/// Compute filter options as of `today`.
pub fn resolve_filter_options_at(
    league: Option<&League>,
    initial: &[Fixture],
    filtered: &[Fixture],
    today: NaiveDate,
) -> FilterOptions {
    let floor = format!("{:04}-{:02}", today.year(), today.month());

    let league_months = league
        .into_iter()
        .flat_map(|l| l.months.iter().map(String::as_str));
    let fixture_months = initial
        .iter()
        .chain(filtered)
        .filter_map(Fixture::month_key);

    let available_months: BTreeSet<&str> = league_months
        .chain(fixture_months)
        .filter(|m| is_month_key(m) && *m >= floor.as_str())
        .collect();

    let mut seen = HashSet::new();
    let available_venues = initial
        .iter()
        .chain(filtered)
        .filter_map(|f| f.venue.as_ref())
        .filter(|v| seen.insert(v.id.clone()))
        .cloned()
        .collect();

    FilterOptions {
        available_months: available_months.into_iter().map(str::to_string).collect(),
        available_venues,
    }
}

/// Compute filter options against the current UTC date.
pub fn resolve_filter_options(
    league: Option<&League>,
    initial: &[Fixture],
    filtered: &[Fixture],
) -> FilterOptions {
    resolve_filter_options_at(league, initial, filtered, Utc::now().date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fixtures(raw: serde_json::Value) -> Vec<Fixture> {
        serde_json::from_value(raw).unwrap()
    }

    #[test]
    fn test_past_months_dropped_and_sorted() {
        let league: League = serde_json::from_value(json!({
            "id": "L1",
            "months": ["2025-06", "2025-01", "not-a-month"]
        }))
        .unwrap();
        let initial = fixtures(json!([
            { "id": "F1", "date": "2025-04-12T15:00:00Z" },
            { "id": "F2", "date": "2025-02-01T15:00:00Z" }
        ]));
        let filtered = fixtures(json!([{ "id": "F3", "date": "2025-03-30T12:00:00Z" }]));
        let today = NaiveDate::from_ymd_opt(2025, 3, 15).unwrap();

        let options = resolve_filter_options_at(Some(&league), &initial, &filtered, today);
        assert_eq!(options.available_months, vec!["2025-03", "2025-04", "2025-06"]);
    }

    #[test]
    fn test_only_future_league_month_survives() {
        let league: League = serde_json::from_value(json!({
            "id": "L1",
            "months": ["2025-01", "2025-06"]
        }))
        .unwrap();
        let today = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();

        let options = resolve_filter_options_at(Some(&league), &[], &[], today);
        assert_eq!(options.available_months, vec!["2025-06"]);
    }

    #[test]
    fn test_venues_deduplicated_across_lists() {
        let initial = fixtures(json!([
            { "id": "F1", "venue": { "id": "V1", "name": "Anfield" } },
            { "id": "F2", "venue": { "id": "V2", "name": "Goodison" } },
            { "id": "F3" }
        ]));
        let filtered = fixtures(json!([
            { "id": "F4", "venue": { "id": "V1", "name": "Anfield Road" } }
        ]));
        let today = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();

        let options = resolve_filter_options_at(None, &initial, &filtered, today);
        let ids: Vec<_> = options.available_venues.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["V1", "V2"]);
        assert_eq!(options.available_venues[0].name, "Anfield");
    }
}
