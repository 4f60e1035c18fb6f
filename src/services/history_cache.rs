use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{Mutex, OnceCell};

use crate::config::BuildConfig;
use crate::error::PipelineError;
use crate::models::{HistoryRecord, TeamIdentity};
use crate::services::extractor::extract_history;
use crate::services::fetcher::DocumentSource;
use crate::utils::completed_matches_url;

pub type HistoryResult = Result<Arc<[HistoryRecord]>, PipelineError>;

/// Per-run memo of each team's completed-match history, sorted ascending by
/// date with undated records last.
///
/// Lookups are single-flight: the first caller for a team performs the
/// fetch, every concurrent caller for the same team awaits that one result.
/// Failures are memoised too, so a broken team page is requested once.
pub struct TeamHistoryCache<S> {
    source: Arc<S>,
    base_url: String,
    limit: usize,
    pages: u32,
    entries: Mutex<HashMap<String, Arc<OnceCell<HistoryResult>>>>,
    loads: AtomicUsize,
}

impl<S: DocumentSource> TeamHistoryCache<S> {
    pub fn new(source: Arc<S>, config: &BuildConfig) -> Self {
        Self {
            source,
            base_url: config.base_url.clone(),
            limit: config.history_limit,
            pages: config.history_pages,
            entries: Mutex::new(HashMap::new()),
            loads: AtomicUsize::new(0),
        }
    }

    pub async fn get_history(&self, team: &TeamIdentity) -> HistoryResult {
        let cell = {
            let mut entries = self.entries.lock().await;
            entries.entry(team.url.clone()).or_default().clone()
        };

        cell.get_or_init(|| self.load(team)).await.clone()
    }

    /// Teams whose history has been requested so far.
    pub async fn teams_seen(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Number of times a team history was actually fetched.
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    async fn load(&self, team: &TeamIdentity) -> HistoryResult {
        self.loads.fetch_add(1, Ordering::SeqCst);
        tracing::debug!("Loading history for {} ({})", team.name, team.url);

        let mut records: Vec<HistoryRecord> = Vec::new();

        for page in 1..=self.pages {
            let url = completed_matches_url(&team.url, page);

            let doc = match self.source.fetch(&url).await {
                Ok(doc) => doc,
                // A stopped run must not leave a truncated history behind
                Err(e) if page == 1 || e.is_cancelled() => return Err(e.into()),
                Err(e) => {
                    tracing::warn!(
                        "Partial history for {}: kept {} records from {} of {} pages: {}",
                        team.name,
                        records.len(),
                        page - 1,
                        self.pages,
                        e
                    );
                    break;
                }
            };

            let remaining = self.limit - records.len();
            let batch = extract_history(&doc, &self.base_url, remaining)
                .map_err(|e| PipelineError::extraction(&url, e))?;
            if batch.is_empty() {
                break;
            }
            records.extend(batch);
            if records.len() >= self.limit {
                break;
            }
        }

        records.sort_by_key(|r| (r.date.is_none(), r.date));

        tracing::info!("History for {}: {} records", team.name, records.len());
        Ok(records.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::{history_html, HistoryRow, StaticSource, BASE};
    use chrono::NaiveDate;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    fn team(slug: &str) -> TeamIdentity {
        TeamIdentity {
            name: slug.to_string(),
            url: format!("{}/team/1/{}", BASE, slug),
        }
    }

    fn history_url(slug: &str, page: u32) -> String {
        completed_matches_url(&team(slug).url, page)
    }

    #[tokio::test]
    async fn test_history_is_sorted_with_undated_last() {
        let source = StaticSource::new().page(
            history_url("alpha", 1),
            history_html(&[
                HistoryRow::win("2025/06/10", 2, 0),
                HistoryRow::loss("n/a", 0, 2),
                HistoryRow::win("2025/06/01", 2, 1),
                HistoryRow::loss("2025/06/05", 1, 2),
            ]),
        );
        let cache = TeamHistoryCache::new(Arc::new(source), &BuildConfig::default());

        let history = cache.get_history(&team("alpha")).await.unwrap();
        let dates: Vec<_> = history.iter().map(|r| r.date).collect();
        assert_eq!(
            dates,
            vec![
                NaiveDate::from_ymd_opt(2025, 6, 1),
                NaiveDate::from_ymd_opt(2025, 6, 5),
                NaiveDate::from_ymd_opt(2025, 6, 10),
                None,
            ]
        );
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_one_fetch() {
        let url = history_url("alpha", 1);
        let source = Arc::new(
            StaticSource::new()
                .with_latency(Duration::from_millis(50))
                .page(url.clone(), history_html(&[HistoryRow::win("2025/06/10", 2, 0)])),
        );
        let cache = TeamHistoryCache::new(source.clone(), &BuildConfig::default());
        let alpha = team("alpha");

        let results = futures::future::join_all((0..6).map(|_| cache.get_history(&alpha))).await;

        assert_eq!(source.hits(&url), 1);
        assert_eq!(cache.loads(), 1);
        for r in &results {
            assert_eq!(r.as_ref().unwrap().len(), 1);
        }

        // Later calls are served from the cache as well
        cache.get_history(&alpha).await.unwrap();
        assert_eq!(source.hits(&url), 1);
        assert_eq!(cache.teams_seen().await, 1);
    }

    #[tokio::test]
    async fn test_failures_are_memoised() {
        let source = Arc::new(StaticSource::new());
        let cache = TeamHistoryCache::new(source.clone(), &BuildConfig::default());
        let ghost = team("ghost");

        let first = cache.get_history(&ghost).await.unwrap_err();
        let second = cache.get_history(&ghost).await.unwrap_err();

        assert_eq!(first, second);
        assert!(matches!(first, PipelineError::Fetch(_)));
        assert_eq!(source.total_hits(), 1);
    }

    #[tokio::test]
    async fn test_multiple_pages_until_limit() {
        let source = StaticSource::new()
            .page(
                history_url("alpha", 1),
                history_html(&[
                    HistoryRow::win("2025/06/10", 2, 0),
                    HistoryRow::win("2025/06/09", 2, 0),
                ]),
            )
            .page(
                history_url("alpha", 2),
                history_html(&[
                    HistoryRow::loss("2025/05/10", 0, 2),
                    HistoryRow::loss("2025/05/09", 0, 2),
                ]),
            );
        let mut config = BuildConfig::default();
        config.history_pages = 3;
        config.history_limit = 3;
        let cache = TeamHistoryCache::new(Arc::new(source), &config);

        let history = cache.get_history(&team("alpha")).await.unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].date, NaiveDate::from_ymd_opt(2025, 5, 10));
    }

    #[tokio::test]
    async fn test_missing_later_page_keeps_earlier_records() {
        let source = StaticSource::new().page(
            history_url("alpha", 1),
            history_html(&[HistoryRow::win("2025/06/10", 2, 0)]),
        );
        let mut config = BuildConfig::default();
        config.history_pages = 2;
        let cache = TeamHistoryCache::new(Arc::new(source), &config);

        let history = cache.get_history(&team("alpha")).await.unwrap();
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn test_stop_between_pages_is_not_cached_as_partial() {
        let cancel = CancellationToken::new();
        let source = StaticSource::new()
            .page(
                history_url("alpha", 1),
                history_html(&[HistoryRow::win("2025/06/10", 2, 0)]),
            )
            .page(
                history_url("alpha", 2),
                history_html(&[HistoryRow::win("2025/05/10", 2, 0)]),
            )
            .stop_on(history_url("alpha", 1), cancel.clone());
        let mut config = BuildConfig::default();
        config.history_pages = 2;
        let source = Arc::new(source);
        let cache = TeamHistoryCache::new(source.clone(), &config);

        let err = cache.get_history(&team("alpha")).await.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(source.hits(&history_url("alpha", 2)), 0);
    }
}
