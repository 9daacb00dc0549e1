use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::action::Action;
use crate::cache::PageCache;
use crate::cfg::Config;

/// Errors raised while collecting a page.
#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    /// Transport-level failure talking to the statistics API.
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The page was retrieved but its contents are unexpected.
    #[error("unexpected page contents: {0}")]
    UnexpectedContents(String),
    /// Season is not two directly concatenated YYYY values.
    #[error("season {0:?} is not two concatenated YYYY values, e.g. 20252026")]
    InvalidSeason(String),
    /// Season type outside the three known game types.
    #[error("season type {0:?} is unknown (preseason, regular, postseason)")]
    UnknownSeasonType(String),
}

/// Division or conference reference attached to a team row.
#[derive(Debug, Clone, Deserialize)]
pub struct Group {
    /// Upstream id.
    pub id: u32,
    /// Display name.
    pub name: String,
}

/// One franchise row from the teams endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    /// Upstream team id.
    pub id: u32,
    /// Full team name.
    pub name: String,
    /// Three-letter acronym.
    pub abbreviation: String,
    /// Division assignment, when listed.
    #[serde(default)]
    pub division: Option<Group>,
    /// Conference assignment, when listed.
    #[serde(default)]
    pub conference: Option<Group>,
}

/// One division row from the divisions endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Division {
    /// Upstream division id.
    pub id: u32,
    /// Display name.
    pub name: String,
    /// Short form, when listed.
    #[serde(default)]
    pub abbreviation: Option<String>,
}

/// Either side of a scheduled game.
#[derive(Debug, Clone, Deserialize)]
pub struct TeamRef {
    /// Upstream team id.
    pub id: u32,
    /// Full team name.
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
struct GameSide {
    team: TeamRef,
}

#[derive(Debug, Clone, Deserialize)]
struct GameTeams {
    away: GameSide,
    home: GameSide,
}

/// One game row from the schedule endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    /// Upstream game id; doubles as the report id.
    pub game_pk: u64,
    /// Scheduled start, RFC 3339.
    pub game_date: String,
    #[serde(rename = "teams")]
    sides: GameTeams,
}

impl Game {
    /// Visiting team.
    pub fn visitor(&self) -> &TeamRef {
        &self.sides.away.team
    }

    /// Home team.
    pub fn home(&self) -> &TeamRef {
        &self.sides.home.team
    }
}

#[derive(Debug, Deserialize)]
struct ScheduleDate {
    games: Vec<Game>,
}

/// Fetches statistics pages and turns them into typed rows.
///
/// Construction validates the configured season and season type, so a
/// `Fetcher` only ever issues well-formed requests.
pub struct Fetcher {
    client: Client,
    cache: PageCache,
    base_url: String,
    season: Option<String>,
    game_type: &'static str,
}

impl Fetcher {
    /// Build a fetcher from validated configuration.
    pub fn new(cfg: &Config, cache: PageCache) -> Result<Self, CollectError> {
        if let Some(season) = &cfg.season {
            check_season(season)?;
        }
        let game_type = game_type_id(&cfg.season_type)?;
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            cache,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            season: cfg.season.clone(),
            game_type,
        })
    }

    /// Run one collection action; returns how many rows it yielded.
    pub async fn run(&self, action: Action, use_cache: bool) -> Result<usize, CollectError> {
        match action {
            Action::Teams => {
                let v = self.page(&format!("{}/teams", self.base_url), use_cache).await?;
                Ok(parse_teams(&v)?.len())
            }
            Action::Divisions => {
                let v = self.page(&format!("{}/divisions", self.base_url), use_cache).await?;
                Ok(parse_divisions(&v)?.len())
            }
            Action::Schedule => {
                let v = self.page(&self.schedule_url(), use_cache).await?;
                Ok(parse_schedule(&v)?.len())
            }
            Action::GameReports => {
                let v = self.page(&self.schedule_url(), use_cache).await?;
                Ok(parse_game_reports(&v)?.len())
            }
            // The driver filters no-op actions before they reach a fetcher.
            Action::TestIgnore => Ok(0),
        }
    }

    fn schedule_url(&self) -> String {
        let mut url = format!("{}/schedule?gameType={}", self.base_url, self.game_type);
        if let Some(season) = &self.season {
            url.push_str("&season=");
            url.push_str(season);
        }
        url
    }

    async fn page(&self, url: &str, use_cache: bool) -> Result<Value, CollectError> {
        let body = self.body(url, use_cache).await?;
        serde_json::from_slice(&body)
            .map_err(|e| CollectError::UnexpectedContents(format!("invalid json from {url}: {e}")))
    }

    async fn body(&self, url: &str, use_cache: bool) -> Result<Vec<u8>, CollectError> {
        if use_cache {
            if let Some(hit) = self.cache.load(url) {
                return Ok(hit);
            }
        }
        debug!("fetching {url}");
        let resp = self.client.get(url).send().await?.error_for_status()?;
        let body = resp.bytes().await?.to_vec();
        if use_cache {
            self.cache.store(url, &body);
        }
        Ok(body)
    }
}

fn block<'a>(v: &'a Value, key: &str) -> Result<&'a Value, CollectError> {
    v.get(key)
        .filter(|b| b.is_array())
        .ok_or_else(|| CollectError::UnexpectedContents(format!("no {key} block in response")))
}

/// Extract team rows from a teams page.
pub fn parse_teams(v: &Value) -> Result<Vec<Team>, CollectError> {
    serde_json::from_value(block(v, "teams")?.clone())
        .map_err(|e| CollectError::UnexpectedContents(format!("teams block: {e}")))
}

/// Extract division rows from a divisions page.
pub fn parse_divisions(v: &Value) -> Result<Vec<Division>, CollectError> {
    serde_json::from_value(block(v, "divisions")?.clone())
        .map_err(|e| CollectError::UnexpectedContents(format!("divisions block: {e}")))
}

/// Extract game rows from a schedule page, flattened across dates.
pub fn parse_schedule(v: &Value) -> Result<Vec<Game>, CollectError> {
    let dates: Vec<ScheduleDate> = serde_json::from_value(block(v, "dates")?.clone())
        .map_err(|e| CollectError::UnexpectedContents(format!("dates block: {e}")))?;
    Ok(dates.into_iter().flat_map(|d| d.games).collect())
}

/// Extract report ids (game ids) from a schedule page.
pub fn parse_game_reports(v: &Value) -> Result<Vec<u64>, CollectError> {
    Ok(parse_schedule(v)?.into_iter().map(|g| g.game_pk).collect())
}

fn check_season(season: &str) -> Result<(), CollectError> {
    if season.len() == 8 && season.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(CollectError::InvalidSeason(season.to_string()))
    }
}

fn game_type_id(season_type: &str) -> Result<&'static str, CollectError> {
    match season_type {
        "preseason" => Ok("PR"),
        "regular" => Ok("R"),
        "postseason" => Ok("P"),
        other => Err(CollectError::UnknownSeasonType(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn teams_page_parses() {
        let page = json!({
            "copyright": "x",
            "teams": [
                {"id": 1, "name": "New Jersey Devils", "abbreviation": "NJD",
                 "division": {"id": 18, "name": "Metropolitan"},
                 "conference": {"id": 6, "name": "Eastern"}},
                {"id": 10, "name": "Toronto Maple Leafs", "abbreviation": "TOR"}
            ]
        });
        let teams = parse_teams(&page).unwrap();
        assert_eq!(teams.len(), 2);
        assert_eq!(teams[0].abbreviation, "NJD");
        assert_eq!(teams[0].division.as_ref().unwrap().name, "Metropolitan");
        assert!(teams[1].division.is_none());
    }

    #[test]
    fn missing_teams_block_is_unexpected() {
        let page = json!({"copyright": "x"});
        let err = parse_teams(&page).unwrap_err();
        assert!(matches!(err, CollectError::UnexpectedContents(_)));
        assert!(err.to_string().contains("no teams block"));
    }

    #[test]
    fn schedule_page_flattens_dates() {
        let page = json!({
            "dates": [
                {"date": "2026-01-01", "games": [
                    {"gamePk": 2025020001, "gameDate": "2026-01-01T00:00:00Z",
                     "teams": {"away": {"team": {"id": 10, "name": "Toronto Maple Leafs"}},
                               "home": {"team": {"id": 1, "name": "New Jersey Devils"}}}}
                ]},
                {"date": "2026-01-02", "games": [
                    {"gamePk": 2025020002, "gameDate": "2026-01-02T00:00:00Z",
                     "teams": {"away": {"team": {"id": 1, "name": "New Jersey Devils"}},
                               "home": {"team": {"id": 10, "name": "Toronto Maple Leafs"}}}}
                ]}
            ]
        });
        let games = parse_schedule(&page).unwrap();
        assert_eq!(games.len(), 2);
        assert_eq!(games[0].visitor().name, "Toronto Maple Leafs");
        assert_eq!(games[1].home().id, 10);
    }

    #[test]
    fn game_reports_are_game_ids() {
        let page = json!({
            "dates": [
                {"date": "2026-01-01", "games": [
                    {"gamePk": 2025020001, "gameDate": "2026-01-01T00:00:00Z",
                     "teams": {"away": {"team": {"id": 10, "name": "A"}},
                               "home": {"team": {"id": 1, "name": "B"}}}}
                ]}
            ]
        });
        assert_eq!(parse_game_reports(&page).unwrap(), vec![2025020001]);
    }

    #[test]
    fn season_format_is_checked() {
        assert!(check_season("20252026").is_ok());
        assert!(matches!(check_season("2025"), Err(CollectError::InvalidSeason(_))));
        assert!(matches!(check_season("2025202a"), Err(CollectError::InvalidSeason(_))));
    }

    #[test]
    fn season_types_map_to_game_type_ids() {
        assert_eq!(game_type_id("regular").unwrap(), "R");
        assert_eq!(game_type_id("preseason").unwrap(), "PR");
        assert_eq!(game_type_id("postseason").unwrap(), "P");
        assert!(matches!(
            game_type_id("offseason"),
            Err(CollectError::UnknownSeasonType(_))
        ));
    }

    #[test]
    fn fetcher_rejects_bad_season_config() {
        let dir = tempfile::tempdir().unwrap();
        let cache = crate::cache::open(dir.path()).unwrap();
        let cfg = Config {
            season: Some("garbage".to_string()),
            ..Config::default()
        };
        assert!(matches!(
            Fetcher::new(&cfg, cache),
            Err(CollectError::InvalidSeason(_))
        ));
    }

    #[test]
    fn schedule_url_carries_game_type_and_season() {
        let dir = tempfile::tempdir().unwrap();
        let cache = crate::cache::open(dir.path()).unwrap();
        let cfg = Config {
            season: Some("20252026".to_string()),
            season_type: "postseason".to_string(),
            ..Config::default()
        };
        let fetcher = Fetcher::new(&cfg, cache).unwrap();
        assert_eq!(
            fetcher.schedule_url(),
            "https://statsapi.web.nhl.com/api/v1/schedule?gameType=P&season=20252026"
        );
    }
}
