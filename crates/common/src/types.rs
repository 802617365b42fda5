//! Domain types shared across the workspace.

use serde::{Deserialize, Deserializer, Serialize};

/// `null` reads as an empty string.
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// A display name sent either as a bare string or as an object with `name`.
#[derive(Deserialize)]
#[serde(untagged)]
enum NameOrObject {
    Name(String),
    Object {
        #[serde(default)]
        name: String,
    },
}

fn name_or_object<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<NameOrObject>::deserialize(deserializer)?;
    Ok(raw
        .map(|value| match value {
            NameOrObject::Name(name) | NameOrObject::Object { name } => name,
        })
        .filter(|name| !name.is_empty()))
}

// ── Catalog Types ─────────────────────────────────────────────────────

/// A league as returned by the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct League {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub country: Option<String>,
    /// Known `YYYY-MM` months with fixtures, supplied by the backend.
    #[serde(default)]
    pub months: Vec<String>,
}

/// A team as returned by the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub logo_url: Option<String>,
}

/// Element of the "all leagues with teams" payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeagueWithTeams {
    #[serde(flatten)]
    pub league: League,
    #[serde(default)]
    pub teams: Vec<Team>,
}

/// Venue reference embedded in fixtures.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Venue {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub city: Option<String>,
}

/// A scheduled match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fixture {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub home_team: Option<Team>,
    #[serde(default)]
    pub away_team: Option<Team>,
    /// ISO-8601 kickoff, e.g. `2025-06-14T19:00:00Z`. Empty while TBC.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub date: String,
    #[serde(default)]
    pub venue: Option<Venue>,
    #[serde(default)]
    pub league_id: Option<String>,
    /// Lowest offer price seen by the backend, if any.
    #[serde(default)]
    pub min_price: Option<f64>,
}

impl Fixture {
    /// `YYYY-MM` bucket of the kickoff date, when the date is well formed.
    pub fn month_key(&self) -> Option<&str> {
        let month = self.date.get(..7)?;
        let bytes = month.as_bytes();
        let well_formed = bytes[4] == b'-'
            && bytes[..4].iter().all(u8::is_ascii_digit)
            && bytes[5..].iter().all(u8::is_ascii_digit);
        well_formed.then_some(month)
    }
}

/// Optional constraints on a fixture list query.
///
/// The backend partitions by month OR venue, never both.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FixtureFilter {
    /// `YYYY-MM`.
    pub month: Option<String>,
    pub venue: Option<String>,
}

impl FixtureFilter {
    pub fn month(month: impl Into<String>) -> Self {
        Self {
            month: Some(month.into()),
            venue: None,
        }
    }

    pub fn venue(venue: impl Into<String>) -> Self {
        Self {
            month: None,
            venue: Some(venue.into()),
        }
    }

    /// Month wins over venue; blank values count as absent.
    pub fn normalized(&self) -> Self {
        let month = self
            .month
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string);
        let venue = if month.is_some() {
            None
        } else {
            self.venue
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        Self { month, venue }
    }

    /// Query string pairs for the normalized filter.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let normalized = self.normalized();
        let mut pairs = Vec::new();
        if let Some(month) = normalized.month {
            pairs.push(("month", month));
        }
        if let Some(venue) = normalized.venue {
            pairs.push(("venue", venue));
        }
        pairs
    }
}

// ── Offer Stream Types ────────────────────────────────────────────────

/// A single ticket offer from one agent or supplier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Offer {
    #[serde(default, alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub agent: Option<String>,
    #[serde(default)]
    pub supplier: Option<String>,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub quantity: Option<u32>,
    #[serde(default)]
    pub url: Option<String>,
}

/// Fixture header carried by the offer stream.
///
/// Teams, venue and league arrive as names or as the gateway's objects;
/// only the display name is kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixtureSummary {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default, deserialize_with = "name_or_object")]
    pub home_team: Option<String>,
    #[serde(default, deserialize_with = "name_or_object")]
    pub away_team: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default, deserialize_with = "name_or_object")]
    pub venue: Option<String>,
    #[serde(default, deserialize_with = "name_or_object")]
    pub league: Option<String>,
}

/// Counts reported by the `complete` event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSummary {
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub agents: u32,
    #[serde(default)]
    pub suppliers: u32,
    #[serde(default)]
    pub errors: u32,
}

/// One decoded event of a fixture's offer stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Metadata {
        total_chunks: u32,
    },
    Fixture(FixtureSummary),
    OffersBatch {
        offers: Vec<Offer>,
        count: usize,
        source: Option<String>,
    },
    Offer {
        offer: Offer,
        source: Option<String>,
    },
    Error {
        message: String,
        fatal: bool,
    },
    Complete(StreamSummary),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture_on(date: &str) -> Fixture {
        Fixture {
            id: "F1".into(),
            slug: String::new(),
            home_team: None,
            away_team: None,
            date: date.into(),
            venue: None,
            league_id: None,
            min_price: None,
        }
    }

    #[test]
    fn test_month_drops_venue() {
        let filter = FixtureFilter {
            month: Some("2025-06".into()),
            venue: Some("V1".into()),
        };
        let normalized = filter.normalized();
        assert_eq!(normalized.month.as_deref(), Some("2025-06"));
        assert!(normalized.venue.is_none());
        assert_eq!(filter.query_pairs(), vec![("month", "2025-06".to_string())]);
    }

    #[test]
    fn test_blank_month_keeps_venue() {
        let filter = FixtureFilter {
            month: Some("  ".into()),
            venue: Some("V1".into()),
        };
        assert_eq!(filter.query_pairs(), vec![("venue", "V1".to_string())]);
    }

    #[test]
    fn test_month_key() {
        assert_eq!(fixture_on("2025-06-14T19:00:00Z").month_key(), Some("2025-06"));
        assert_eq!(fixture_on("TBC").month_key(), None);
        assert_eq!(fixture_on("").month_key(), None);
    }

    #[test]
    fn test_fixture_with_null_date_is_tbc() {
        let raw = r#"[{"_id":"F1","date":null},{"_id":"F2","date":"2025-06-14T19:00:00Z"}]"#;
        let parsed: Vec<Fixture> = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed[0].date, "");
        assert_eq!(parsed[0].month_key(), None);
        assert_eq!(parsed[1].month_key(), Some("2025-06"));
    }

    #[test]
    fn test_fixture_summary_takes_names_or_objects() {
        let raw = r#"{"_id":"F1","homeTeam":{"id":"T1","slug":"arsenal","name":"Arsenal"},"awayTeam":"Chelsea","venue":{"id":"V1"},"league":null}"#;
        let parsed: FixtureSummary = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.home_team.as_deref(), Some("Arsenal"));
        assert_eq!(parsed.away_team.as_deref(), Some("Chelsea"));
        assert!(parsed.venue.is_none());
        assert!(parsed.league.is_none());
    }

    #[test]
    fn test_league_with_teams_flattens() {
        let raw = r#"{"_id":"L1","slug":"premier-league","name":"Premier League","teams":[{"id":"T1","slug":"arsenal","name":"Arsenal"}]}"#;
        let parsed: LeagueWithTeams = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.league.id, "L1");
        assert_eq!(parsed.teams[0].slug, "arsenal");
    }
}
