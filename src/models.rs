use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Match status as exposed to viewers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchStatus {
    Scheduled,
    Live,
    InPlay,
    Paused,
    Finished,
}

impl MatchStatus {
    pub const ALL: [MatchStatus; 5] = [
        MatchStatus::Scheduled,
        MatchStatus::Live,
        MatchStatus::InPlay,
        MatchStatus::Paused,
        MatchStatus::Finished,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Scheduled => "SCHEDULED",
            MatchStatus::Live => "LIVE",
            MatchStatus::InPlay => "IN_PLAY",
            MatchStatus::Paused => "PAUSED",
            MatchStatus::Finished => "FINISHED",
        }
    }

    /// Map a provider status string. `TIMED` is a scheduled match whose
    /// kickoff time is confirmed.
    pub fn from_provider(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "SCHEDULED" | "TIMED" => Some(MatchStatus::Scheduled),
            "LIVE" => Some(MatchStatus::Live),
            "IN_PLAY" => Some(MatchStatus::InPlay),
            "PAUSED" => Some(MatchStatus::Paused),
            "FINISHED" => Some(MatchStatus::Finished),
            _ => None,
        }
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown match status: {0}")]
pub struct ParseStatusError(pub String);

impl FromStr for MatchStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MatchStatus::from_provider(s).ok_or_else(|| ParseStatusError(s.to_string()))
    }
}

/// Set of statuses a caller wants to see.
pub type StatusFilter = BTreeSet<MatchStatus>;

pub fn all_statuses() -> StatusFilter {
    MatchStatus::ALL.into_iter().collect()
}

/// Score shown for a match that has not kicked off.
pub const NOT_STARTED_SCORE: &str = "vs";

/// One fixture, normalized for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchSummary {
    pub home_team: String,
    /// Crest URL, empty when the provider has none
    pub home_team_logo: String,
    pub away_team: String,
    pub away_team_logo: String,
    /// "H-A", or "vs" for a scheduled match
    pub score: String,
    pub status: MatchStatus,
    pub kickoff_time: DateTime<Utc>,
    pub competition_logo: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StandingsRow {
    /// 1-based rank
    pub position: u32,
    pub team: String,
    pub team_logo: String,
    pub played: u32,
    pub won: u32,
    pub draw: u32,
    pub lost: u32,
    pub points: u32,
    pub goal_difference: i32,
}

/// The aggregate ("TOTAL") league table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StandingsSnapshot {
    pub standings: Vec<StandingsRow>,
    pub competition_logo: String,
}

impl StandingsSnapshot {
    pub fn is_empty(&self) -> bool {
        self.standings.is_empty()
    }
}

/// Output of one refresh cycle. Either half may be empty when its fetch
/// failed; the failure is described in `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResult {
    pub matches: Vec<MatchSummary>,
    pub standings: StandingsSnapshot,
    pub fetched_at: DateTime<Utc>,
    pub error: Option<String>,
}

impl RefreshResult {
    /// Placeholder held by the store before the first publish.
    pub fn empty() -> Self {
        RefreshResult {
            matches: Vec::new(),
            standings: StandingsSnapshot::default(),
            fetched_at: DateTime::<Utc>::UNIX_EPOCH,
            error: None,
        }
    }
}
