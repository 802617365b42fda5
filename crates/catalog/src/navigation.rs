//! Slug lookup table built from the "all leagues with teams" payload.

use common::{League, LeagueWithTeams, Team};
use std::collections::HashMap;
use tracing::info;

/// Explicitly constructed league/team lookup. Slugs are matched
/// case-insensitively.
#[derive(Debug, Default, Clone)]
pub struct NavigationIndex {
    leagues: Vec<LeagueWithTeams>,
    league_by_slug: HashMap<String, usize>,
    team_by_slug: HashMap<String, (usize, usize)>,
    initialized: bool,
}

fn slug_key(slug: &str) -> String {
    slug.trim().to_lowercase()
}

impl NavigationIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build directly from a payload.
    pub fn from_payload(payload: Vec<LeagueWithTeams>) -> Self {
        let mut index = Self::new();
        index.init(payload);
        index
    }

    /// Replace the table with `payload`.
    pub fn init(&mut self, payload: Vec<LeagueWithTeams>) {
        self.reset();
        for (li, entry) in payload.iter().enumerate() {
            if !entry.league.slug.is_empty() {
                self.league_by_slug
                    .entry(slug_key(&entry.league.slug))
                    .or_insert(li);
            }
            for (ti, team) in entry.teams.iter().enumerate() {
                if team.slug.is_empty() {
                    continue;
                }
                // A team listed under two leagues resolves to the first.
                self.team_by_slug
                    .entry(slug_key(&team.slug))
                    .or_insert((li, ti));
            }
        }
        self.leagues = payload;
        self.initialized = true;
        info!(
            "Navigation index ready: {} leagues, {} teams",
            self.league_by_slug.len(),
            self.team_by_slug.len()
        );
    }

    pub fn reset(&mut self) {
        self.leagues.clear();
        self.league_by_slug.clear();
        self.team_by_slug.clear();
        self.initialized = false;
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn leagues(&self) -> impl Iterator<Item = &League> {
        self.leagues.iter().map(|entry| &entry.league)
    }

    pub fn league_by_slug(&self, slug: &str) -> Option<&LeagueWithTeams> {
        let li = *self.league_by_slug.get(&slug_key(slug))?;
        self.leagues.get(li)
    }

    pub fn team_by_slug(&self, slug: &str) -> Option<&Team> {
        let (li, ti) = *self.team_by_slug.get(&slug_key(slug))?;
        self.leagues.get(li)?.teams.get(ti)
    }

    /// The league a team belongs to.
    pub fn league_for_team(&self, team_slug: &str) -> Option<&League> {
        let (li, _) = *self.team_by_slug.get(&slug_key(team_slug))?;
        self.leagues.get(li).map(|entry| &entry.league)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload() -> Vec<LeagueWithTeams> {
        serde_json::from_value(json!([
            {
                "id": "L1",
                "slug": "premier-league",
                "name": "Premier League",
                "teams": [
                    { "id": "T1", "slug": "arsenal", "name": "Arsenal" },
                    { "id": "T2", "slug": "chelsea", "name": "Chelsea" }
                ]
            },
            {
                "id": "L2",
                "slug": "champions-league",
                "name": "Champions League",
                "teams": [{ "id": "T1", "slug": "arsenal", "name": "Arsenal" }]
            }
        ]))
        .unwrap()
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let index = NavigationIndex::from_payload(payload());
        assert!(index.is_initialized());
        assert_eq!(index.league_by_slug("Premier-League").unwrap().league.id, "L1");
        assert_eq!(index.team_by_slug("CHELSEA").unwrap().id, "T2");
        assert!(index.team_by_slug("spurs").is_none());
    }

    #[test]
    fn test_shared_team_resolves_to_first_league() {
        let index = NavigationIndex::from_payload(payload());
        assert_eq!(index.league_for_team("arsenal").unwrap().id, "L1");
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut index = NavigationIndex::from_payload(payload());
        index.reset();
        assert!(!index.is_initialized());
        assert!(index.league_by_slug("premier-league").is_none());
        assert_eq!(index.leagues().count(), 0);
    }
}
