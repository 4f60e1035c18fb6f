use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// One entry of a match listing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSummary {
    pub event: String,
    pub teams: (String, String),
    pub link: String,
    /// Winning team's name when the listing marks it (results pages only).
    pub declared_winner: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TeamIdentity {
    pub name: String,
    pub url: String,
}

/// What a match detail page tells us about the match itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchDetail {
    pub teams: (TeamIdentity, TeamIdentity),
    pub played_at: Option<NaiveDateTime>,
    /// 0 or 1, position of the winner in `teams`.
    pub winner: Option<usize>,
    pub score: Option<(u32, u32)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Win,
    Loss,
    Unknown,
}

/// One completed match in a team's history, seen from that team's side.
/// Any field may be absent when the source row could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub event: Option<String>,
    pub team: Option<String>,
    pub opponent: Option<String>,
    /// (own rounds, opponent rounds)
    pub score: Option<(u32, u32)>,
    pub outcome: Outcome,
    pub date: Option<NaiveDate>,
    pub link: Option<String>,
}

impl HistoryRecord {
    pub fn round_diff(&self) -> Option<i64> {
        self.score.map(|(own, opp)| own as i64 - opp as i64)
    }
}

/// A team's statistics evaluated at one cutoff over one window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureSnapshot {
    pub winrate: f64,
    pub avg_round_diff: f64,
    pub winstreak: u32,
    /// Qualifying records actually used, never more than `window`.
    pub matches_used: usize,
    /// Records among `matches_used` that carried a score; the
    /// denominator of `avg_round_diff`.
    pub scored_matches: usize,
    pub window: usize,
}

impl FeatureSnapshot {
    pub fn empty(window: usize) -> Self {
        Self {
            winrate: 0.0,
            avg_round_diff: 0.0,
            winstreak: 0,
            matches_used: 0,
            scored_matches: 0,
            window,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowFeatures {
    pub window: usize,
    pub team_a: FeatureSnapshot,
    pub team_b: FeatureSnapshot,
}

/// One labeled training example.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetRow {
    pub link: String,
    pub date: NaiveDateTime,
    pub team_a: String,
    pub team_b: String,
    /// 0 when team A won, 1 when team B won.
    pub winner: u8,
    pub features: Vec<WindowFeatures>,
}

impl DatasetRow {
    /// Smaller of the two teams' `matches_used` at the largest window.
    pub fn min_matches_used(&self) -> usize {
        self.features
            .iter()
            .max_by_key(|f| f.window)
            .map(|f| f.team_a.matches_used.min(f.team_b.matches_used))
            .unwrap_or(0)
    }
}

/// Both teams' features for a single match, outside of a dataset build.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchFeatures {
    pub teams: (TeamIdentity, TeamIdentity),
    pub cutoff: NaiveDate,
    /// Map score in `teams` order, when the match has been played.
    pub score: Option<(u32, u32)>,
    pub features: Vec<WindowFeatures>,
}

/// Where a match was when it dropped out of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MatchStage {
    Discovered,
    TeamsResolved,
    HistoryFetched,
    FeaturesComputed,
    Emitted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedMatch {
    pub index: usize,
    pub link: String,
    pub stage: MatchStage,
    pub reason: String,
}

/// Result of one dataset build run.
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    pub rows: Vec<DatasetRow>,
    pub skipped: Vec<SkippedMatch>,
    pub below_threshold: usize,
    pub discovered: usize,
    pub histories_fetched: usize,
    pub cancelled: bool,
}
