//! Point-in-time team statistics.
//!
//! A snapshot only ever sees records dated strictly before the cutoff, so a
//! feature computed for a match cannot include that match or anything after
//! it.
//!
//! `avg_round_diff` averages over the records that actually carry a score.
//! Unscored records are left out of both the sum and the count. The older
//! scripts this dataset replaces divided by every record in the window,
//! which dragged the average toward zero whenever a score failed to parse.

use chrono::NaiveDate;

use crate::models::{FeatureSnapshot, HistoryRecord, Outcome, WindowFeatures};

/// Records that feed a snapshot: dated strictly before `cutoff`, then the
/// `window` most recent of those. `records` must be sorted ascending by date.
pub fn contributing_records<'a, I>(records: I, cutoff: NaiveDate, window: usize) -> Vec<&'a HistoryRecord>
where
    I: IntoIterator<Item = &'a HistoryRecord>,
{
    let qualifying: Vec<&HistoryRecord> = records
        .into_iter()
        .filter(|r| r.date.is_some_and(|d| d < cutoff))
        .collect();

    debug_assert!(
        qualifying.windows(2).all(|w| w[0].date <= w[1].date),
        "history must be sorted ascending by date"
    );

    let start = qualifying.len().saturating_sub(window);
    qualifying[start..].to_vec()
}

pub fn compute_snapshot(
    sorted_history: &[HistoryRecord],
    cutoff: NaiveDate,
    window: usize,
) -> FeatureSnapshot {
    summarize(&contributing_records(sorted_history, cutoff, window), window)
}

fn summarize(records: &[&HistoryRecord], window: usize) -> FeatureSnapshot {
    let matches_used = records.len();
    if matches_used == 0 {
        return FeatureSnapshot::empty(window);
    }

    let wins = records.iter().filter(|r| r.outcome == Outcome::Win).count();

    let diffs: Vec<i64> = records.iter().filter_map(|r| r.round_diff()).collect();
    let scored_matches = diffs.len();
    let avg_round_diff = if scored_matches == 0 {
        0.0
    } else {
        diffs.iter().sum::<i64>() as f64 / scored_matches as f64
    };

    let winstreak = records
        .iter()
        .rev()
        .take_while(|r| r.outcome == Outcome::Win)
        .count() as u32;

    FeatureSnapshot {
        winrate: wins as f64 / matches_used as f64,
        avg_round_diff,
        winstreak,
        matches_used,
        scored_matches,
        window,
    }
}

/// Computes both teams' snapshots for every configured window.
#[derive(Debug, Clone)]
pub struct FeatureEngine {
    windows: Vec<usize>,
}

impl FeatureEngine {
    pub fn new(windows: Vec<usize>) -> Self {
        Self { windows }
    }

    pub fn windows(&self) -> &[usize] {
        &self.windows
    }

    /// Snapshot that also ignores any record of the match being scored,
    /// in case the team's feed already lists it.
    pub fn snapshot_excluding(
        &self,
        sorted_history: &[HistoryRecord],
        cutoff: NaiveDate,
        window: usize,
        match_link: &str,
    ) -> FeatureSnapshot {
        let records = contributing_records(
            sorted_history
                .iter()
                .filter(|r| r.link.as_deref() != Some(match_link)),
            cutoff,
            window,
        );
        summarize(&records, window)
    }

    pub fn window_features(
        &self,
        history_a: &[HistoryRecord],
        history_b: &[HistoryRecord],
        cutoff: NaiveDate,
        match_link: &str,
    ) -> Vec<WindowFeatures> {
        self.windows
            .iter()
            .map(|&window| WindowFeatures {
                window,
                team_a: self.snapshot_excluding(history_a, cutoff, window, match_link),
                team_b: self.snapshot_excluding(history_b, cutoff, window, match_link),
            })
            .collect()
    }
}
