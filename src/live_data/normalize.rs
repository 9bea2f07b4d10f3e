//! Typed decoding of football-data.org payloads into the display schema.
//!
//! Pure functions, no I/O. A payload whose top level cannot be decoded is an
//! error; a single malformed match or table row is skipped so the rest of the
//! batch still reaches viewers.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use super::error::LiveDataError;
use crate::models::{
    MatchStatus, MatchSummary, StandingsRow, StandingsSnapshot, StatusFilter, NOT_STARTED_SCORE,
};

// ── Provider shapes ──────────────────────────────────────────────────────────
//
// Required fields are plain; optional ones carry `#[serde(default)]` and are
// `Option` where the provider may send `null`.

#[derive(Debug, Default, Deserialize)]
struct RawCompetition {
    #[serde(default)]
    emblem: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawFixturesPayload {
    #[serde(default)]
    competition: Option<RawCompetition>,
    #[serde(default)]
    matches: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RawTeam {
    name: String,
    #[serde(default)]
    crest: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawGoals {
    #[serde(default)]
    home: Option<u32>,
    #[serde(default)]
    away: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawScore {
    #[serde(default)]
    full_time: Option<RawGoals>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMatch {
    status: String,
    utc_date: DateTime<Utc>,
    home_team: RawTeam,
    away_team: RawTeam,
    #[serde(default)]
    score: Option<RawScore>,
}

#[derive(Debug, Deserialize)]
struct RawStandingsPayload {
    #[serde(default)]
    competition: Option<RawCompetition>,
    #[serde(default)]
    standings: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RawStandingGroup {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    table: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTableRow {
    position: u32,
    team: RawTeam,
    played_games: u32,
    won: u32,
    draw: u32,
    lost: u32,
    points: u32,
    goal_difference: i32,
}

fn emblem(competition: Option<RawCompetition>) -> String {
    competition.and_then(|c| c.emblem).unwrap_or_default()
}

/// `"vs"` for a match that has not started, otherwise `"H-A"` with absent
/// goal counts read as 0.
pub fn format_score(status: MatchStatus, full_time: Option<(Option<u32>, Option<u32>)>) -> String {
    if status == MatchStatus::Scheduled {
        return NOT_STARTED_SCORE.to_string();
    }
    let (home, away) = full_time.unwrap_or((None, None));
    format!("{}-{}", home.unwrap_or(0), away.unwrap_or(0))
}

fn summarize(raw: RawMatch, status: MatchStatus, competition_logo: &str) -> MatchSummary {
    let goals = raw
        .score
        .and_then(|s| s.full_time)
        .map(|g| (g.home, g.away));
    MatchSummary {
        home_team: raw.home_team.name,
        home_team_logo: raw.home_team.crest.unwrap_or_default(),
        away_team: raw.away_team.name,
        away_team_logo: raw.away_team.crest.unwrap_or_default(),
        score: format_score(status, goals),
        status,
        kickoff_time: raw.utc_date,
        competition_logo: competition_logo.to_string(),
    }
}

/// Normalize a matches payload, keeping only entries whose status is in
/// `filter`. Output order follows the provider's order.
pub fn normalize_fixtures(
    raw: &serde_json::Value,
    filter: &StatusFilter,
) -> Result<Vec<MatchSummary>, LiveDataError> {
    let payload = RawFixturesPayload::deserialize(raw)?;
    let competition_logo = emblem(payload.competition);

    let matches = payload
        .matches
        .iter()
        .filter_map(|entry| {
            let m = match RawMatch::deserialize(entry) {
                Ok(m) => m,
                Err(e) => {
                    debug!("Skipping malformed match entry: {}", e);
                    return None;
                }
            };
            let status = MatchStatus::from_provider(&m.status)?;
            if !filter.contains(&status) {
                return None;
            }
            Some(summarize(m, status, &competition_logo))
        })
        .collect();

    Ok(matches)
}

/// Normalize a standings payload down to the aggregate table. A payload with
/// no `TOTAL` group yields an empty snapshot.
pub fn normalize_standings(raw: &serde_json::Value) -> Result<StandingsSnapshot, LiveDataError> {
    let payload = RawStandingsPayload::deserialize(raw)?;
    let competition_logo = emblem(payload.competition);

    let total = payload.standings.iter().find_map(|group| {
        RawStandingGroup::deserialize(group)
            .ok()
            .filter(|g| g.kind == "TOTAL")
    });

    let Some(total) = total else {
        debug!("No TOTAL standings group in payload");
        return Ok(StandingsSnapshot {
            standings: Vec::new(),
            competition_logo,
        });
    };

    let mut rows: Vec<StandingsRow> = total
        .table
        .iter()
        .filter_map(|entry| match RawTableRow::deserialize(entry) {
            Ok(r) => Some(StandingsRow {
                position: r.position,
                team: r.team.name,
                team_logo: r.team.crest.unwrap_or_default(),
                played: r.played_games,
                won: r.won,
                draw: r.draw,
                lost: r.lost,
                points: r.points,
                goal_difference: r.goal_difference,
            }),
            Err(e) => {
                debug!("Skipping malformed standings row: {}", e);
                None
            }
        })
        .collect();
    rows.sort_by_key(|r| r.position);

    Ok(StandingsSnapshot {
        standings: rows,
        competition_logo,
    })
}
