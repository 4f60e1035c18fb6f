//! Builds the labeled dataset.
//!
//! Each discovered match walks `Discovered → TeamsResolved → HistoryFetched
//! → FeaturesComputed → Emitted`. Any failure drops the match with a logged
//! reason; a bad page never aborts the run.

use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::config::BuildConfig;
use crate::error::{ConfigError, PipelineError};
use crate::models::{
    BuildReport, DatasetRow, MatchDetail, MatchFeatures, MatchStage, MatchSummary, SkippedMatch,
    TeamIdentity,
};
use crate::services::extractor::{extract_match_detail, EventFilter, ListingDocument};
use crate::services::feature_engine::FeatureEngine;
use crate::services::fetcher::DocumentSource;
use crate::services::history_cache::{HistoryResult, TeamHistoryCache};
use crate::utils::{results_listing_url, same_team_name, upcoming_listing_url};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingKind {
    Upcoming,
    Results,
}

struct Skip {
    stage: MatchStage,
    reason: String,
}

impl Skip {
    fn at(stage: MatchStage, reason: impl ToString) -> Self {
        Self {
            stage,
            reason: reason.to_string(),
        }
    }
}

pub struct DatasetAssembler<S> {
    source: Arc<S>,
    cache: TeamHistoryCache<S>,
    engine: FeatureEngine,
    filter: EventFilter,
    base_url: String,
    pages: u32,
    concurrency: usize,
    min_matches: usize,
    cancel: CancellationToken,
}

impl<S: DocumentSource> DatasetAssembler<S> {
    /// Validates the configuration up front; this is the only fatal check.
    pub fn new(
        source: Arc<S>,
        config: &BuildConfig,
        cancel: CancellationToken,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            cache: TeamHistoryCache::new(source.clone(), config),
            source,
            engine: FeatureEngine::new(config.normalized_windows()),
            filter: EventFilter::from_config(config),
            base_url: config.base_url.clone(),
            pages: config.pages,
            concurrency: config.concurrency,
            min_matches: config.min_matches,
            cancel,
        })
    }

    pub fn windows(&self) -> &[usize] {
        self.engine.windows()
    }

    /// Tier-1 matches across the configured number of listing pages, in
    /// document order. Stops at the first page with no entries.
    pub async fn discover(&self, kind: ListingKind) -> Vec<MatchSummary> {
        let mut found = Vec::new();

        for page in 1..=self.pages {
            if self.cancel.is_cancelled() {
                tracing::warn!("Stop requested, not fetching listing page {}", page);
                break;
            }

            let url = match kind {
                ListingKind::Upcoming => upcoming_listing_url(&self.base_url, page),
                ListingKind::Results => results_listing_url(&self.base_url, page),
            };
            tracing::info!("Scraping {}", url);

            let doc = match self.source.fetch(&url).await {
                Ok(doc) => doc,
                Err(e) => {
                    tracing::warn!("Skipping listing page: {}", e);
                    continue;
                }
            };

            let listing = match ListingDocument::parse(&doc, &self.base_url) {
                Ok(listing) => listing,
                Err(e) => {
                    tracing::warn!("Skipping listing page {}: {}", url, e);
                    continue;
                }
            };
            if listing.entry_count() == 0 {
                tracing::info!("No matches on page {}, stopping", page);
                break;
            }

            let before = found.len();
            found.extend(listing.tier1_matches(&self.filter));
            tracing::info!("Page {}: {} tier-1 matches", page, found.len() - before);
        }

        found
    }

    /// Full run: discover results, assemble a row per match, order rows by
    /// discovery index and apply the minimum-history threshold.
    pub async fn build(&self) -> BuildReport {
        let summaries = self.discover(ListingKind::Results).await;
        tracing::info!("Discovered {} matches to assemble", summaries.len());

        let mut outcomes: Vec<(usize, Result<DatasetRow, Skip>)> =
            stream::iter(summaries.iter().enumerate())
                .map(|(index, summary)| async move { (index, self.assemble_match(summary).await) })
                .buffer_unordered(self.concurrency)
                .collect()
                .await;

        // Completion order is arbitrary; output order is discovery order
        outcomes.sort_by_key(|(index, _)| *index);

        let mut report = BuildReport {
            discovered: summaries.len(),
            ..BuildReport::default()
        };

        for (index, outcome) in outcomes {
            match outcome {
                Ok(row) if row.min_matches_used() < self.min_matches => {
                    tracing::debug!(
                        "Dropping {}: {} matches used, need {}",
                        row.link,
                        row.min_matches_used(),
                        self.min_matches
                    );
                    report.below_threshold += 1;
                }
                Ok(row) => report.rows.push(row),
                Err(skip) => {
                    let link = summaries[index].link.clone();
                    tracing::warn!("Skipped {} at {:?}: {}", link, skip.stage, skip.reason);
                    report.skipped.push(SkippedMatch {
                        index,
                        link,
                        stage: skip.stage,
                        reason: skip.reason,
                    });
                }
            }
        }

        report.histories_fetched = self.cache.loads();
        report.cancelled = self.cancel.is_cancelled();

        tracing::info!(
            "Build finished: {} rows, {} skipped, {} below threshold, {} team histories",
            report.rows.len(),
            report.skipped.len(),
            report.below_threshold,
            report.histories_fetched
        );
        report
    }

    async fn assemble_match(&self, summary: &MatchSummary) -> Result<DatasetRow, Skip> {
        if self.cancel.is_cancelled() {
            return Err(Skip::at(MatchStage::Discovered, "stop requested"));
        }

        let detail = self
            .match_detail(&summary.link)
            .await
            .map_err(|e| Skip::at(MatchStage::Discovered, e))?;
        advance(&summary.link, MatchStage::TeamsResolved);

        let played_at = detail
            .played_at
            .ok_or_else(|| Skip::at(MatchStage::TeamsResolved, "match timestamp unresolvable"))?;
        let (team_a, team_b, winner) = align_to_summary(summary, &detail)
            .map_err(|reason| Skip::at(MatchStage::TeamsResolved, reason))?;
        let winner =
            winner.ok_or_else(|| Skip::at(MatchStage::TeamsResolved, "winner unresolvable"))?;

        let (history_a, history_b) =
            tokio::join!(self.cache.get_history(&team_a), self.cache.get_history(&team_b));
        let history_a = history_a.map_err(|e| Skip::at(MatchStage::TeamsResolved, e))?;
        let history_b = history_b.map_err(|e| Skip::at(MatchStage::TeamsResolved, e))?;
        advance(&summary.link, MatchStage::HistoryFetched);

        // Cutoff is the match's own day
        let features = self.engine.window_features(
            &history_a,
            &history_b,
            played_at.date(),
            &summary.link,
        );
        advance(&summary.link, MatchStage::FeaturesComputed);

        let row = DatasetRow {
            link: summary.link.clone(),
            date: played_at,
            team_a: summary.teams.0.clone(),
            team_b: summary.teams.1.clone(),
            winner: winner as u8,
            features,
        };
        advance(&summary.link, MatchStage::Emitted);
        Ok(row)
    }

    async fn match_detail(&self, link: &str) -> Result<MatchDetail, PipelineError> {
        let doc = self.source.fetch(link).await?;
        extract_match_detail(&doc, &self.base_url).map_err(|e| PipelineError::extraction(link, e))
    }

    pub async fn team_history(&self, team: &TeamIdentity) -> HistoryResult {
        self.cache.get_history(team).await
    }

    /// Current features for one match's teams. The cutoff is the match's
    /// own day, or tomorrow when the page carries no timestamp (so today's
    /// results count for a match that has not been scheduled yet).
    pub async fn match_features(&self, match_url: &str) -> Result<MatchFeatures, PipelineError> {
        let detail = self.match_detail(match_url).await?;
        let cutoff = detail
            .played_at
            .map(|ts| ts.date())
            .unwrap_or_else(|| tomorrow(Utc::now().date_naive()));

        let score = detail.score;
        let (team_a, team_b) = detail.teams;
        let (history_a, history_b) =
            tokio::join!(self.cache.get_history(&team_a), self.cache.get_history(&team_b));
        let features = self
            .engine
            .window_features(&history_a?, &history_b?, cutoff, match_url);

        Ok(MatchFeatures {
            teams: (team_a, team_b),
            cutoff,
            score,
            features,
        })
    }
}

fn advance(link: &str, stage: MatchStage) {
    tracing::trace!("{} -> {:?}", link, stage);
}

fn tomorrow(today: NaiveDate) -> NaiveDate {
    today + Duration::days(1)
}

/// Put the detail page's teams in the listing's order and translate the
/// winner into that order. Falls back to the listing's declared winner when
/// the detail page does not mark one. Each detail team must match exactly
/// one listing name; anything else is reported instead of guessed.
fn align_to_summary(
    summary: &MatchSummary,
    detail: &MatchDetail,
) -> Result<(TeamIdentity, TeamIdentity, Option<usize>), String> {
    let listing_position = |name: &str| {
        if same_team_name(name, &summary.teams.0) {
            Some(0)
        } else if same_team_name(name, &summary.teams.1) {
            Some(1)
        } else {
            None
        }
    };

    let (first, second) = &detail.teams;
    let positions = match (listing_position(&first.name), listing_position(&second.name)) {
        (Some(a), Some(b)) if a != b => [a, b],
        _ => {
            return Err(format!(
                "detail teams '{}' vs '{}' do not match listing '{}' vs '{}'",
                first.name, second.name, summary.teams.0, summary.teams.1
            ))
        }
    };

    let (team_a, team_b) = if positions[0] == 0 {
        (first.clone(), second.clone())
    } else {
        (second.clone(), first.clone())
    };

    let winner = detail
        .winner
        .and_then(|w| positions.get(w).copied())
        .or_else(|| listing_position(summary.declared_winner.as_deref()?));

    Ok((team_a, team_b, winner))
}
