//! HTML → typed records.
//!
//! Everything here is a pure function of the document text: no network, no
//! clock. Partial rows are kept with absent fields; only a document that is
//! structurally unusable produces an [`ExtractionError`].

use chrono::{NaiveDate, NaiveDateTime};
use scraper::{ElementRef, Html, Selector};

use crate::config::BuildConfig;
use crate::error::{ExtractionError, ParseWarning};
use crate::models::{HistoryRecord, MatchDetail, MatchSummary, Outcome, TeamIdentity};
use crate::utils::{absolute_url, collapse_whitespace, parse_score_cell};

const HISTORY_DATE_FORMAT: &str = "%Y/%m/%d";
const MATCH_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn selector(css: &'static str) -> Result<Selector, ExtractionError> {
    Selector::parse(css).map_err(|e| ExtractionError::new(format!("bad selector {}: {:?}", css, e)))
}

fn text_of(el: ElementRef<'_>) -> String {
    collapse_whitespace(&el.text().collect::<String>())
}

fn has_class(el: ElementRef<'_>, class: &str) -> bool {
    el.value().classes().any(|c| c == class)
}

/// Which listing entries count as tier-1.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub markers: Vec<String>,
    pub placeholders: Vec<String>,
}

impl EventFilter {
    pub fn from_config(config: &BuildConfig) -> Self {
        Self {
            markers: config.tier1_markers.clone(),
            placeholders: config.placeholders.clone(),
        }
    }

    /// An empty marker set accepts every event.
    pub fn accepts_event(&self, event: &str) -> bool {
        self.markers.is_empty() || self.markers.iter().any(|m| event.contains(m.as_str()))
    }

    pub fn is_placeholder(&self, team: &str) -> bool {
        self.placeholders.iter().any(|p| team.contains(p.as_str()))
    }
}

// ── Listing pages ───────────────────────────────────────────────────────────

/// A parsed match listing (upcoming or results). Iterating it is cheap and
/// can be repeated; each pass yields entries in document order.
pub struct ListingDocument {
    html: Html,
    base_url: String,
    entry: Selector,
    event: Selector,
    team_name: Selector,
    winner_name: Selector,
}

impl ListingDocument {
    pub fn parse(doc: &str, base_url: &str) -> Result<Self, ExtractionError> {
        Ok(Self {
            html: Html::parse_document(doc),
            base_url: base_url.to_string(),
            entry: selector("a.match-item")?,
            event: selector(".match-item-event")?,
            team_name: selector(".match-item-vs-team-name")?,
            winner_name: selector(".match-item-vs-team.mod-winner .match-item-vs-team-name")?,
        })
    }

    /// Raw number of listing entries before any filtering. Zero means the
    /// listing has run out of pages.
    pub fn entry_count(&self) -> usize {
        self.html.select(&self.entry).count()
    }

    pub fn tier1_matches<'a>(
        &'a self,
        filter: &'a EventFilter,
    ) -> impl Iterator<Item = MatchSummary> + 'a {
        self.html
            .select(&self.entry)
            .filter_map(move |el| self.summarize(el))
            .filter(move |m| {
                filter.accepts_event(&m.event)
                    && !filter.is_placeholder(&m.teams.0)
                    && !filter.is_placeholder(&m.teams.1)
            })
    }

    fn summarize(&self, el: ElementRef<'_>) -> Option<MatchSummary> {
        let href = el.value().attr("href")?;
        let event = el.select(&self.event).next().map(text_of)?;

        let mut names = el.select(&self.team_name).map(text_of);
        let team_a = names.next()?;
        let team_b = names.next()?;

        let declared_winner = el
            .select(&self.winner_name)
            .next()
            .map(text_of)
            .filter(|name| !name.is_empty());

        Some(MatchSummary {
            event,
            teams: (team_a, team_b),
            link: absolute_url(&self.base_url, href),
            declared_winner,
        })
    }
}

/// Tier-1 entries of a listing page, collected in document order.
pub fn extract_tier1_matches(
    listing_doc: &str,
    base_url: &str,
    filter: &EventFilter,
) -> Result<Vec<MatchSummary>, ExtractionError> {
    let listing = ListingDocument::parse(listing_doc, base_url)?;
    let matches = listing.tier1_matches(filter).collect();
    Ok(matches)
}

// ── Match detail pages ──────────────────────────────────────────────────────

pub fn extract_teams(
    match_detail_doc: &str,
    base_url: &str,
) -> Result<(TeamIdentity, TeamIdentity), ExtractionError> {
    let html = Html::parse_document(match_detail_doc);
    teams_from(&html, base_url)
}

fn teams_from(
    html: &Html,
    base_url: &str,
) -> Result<(TeamIdentity, TeamIdentity), ExtractionError> {
    let link_sel = selector("a.match-header-link")?;
    let name_sel = selector(".wf-title-med")?;

    let mut teams = html.select(&link_sel).filter_map(|link| {
        let href = link.value().attr("href")?;
        let name = link.select(&name_sel).next().map(text_of)?;
        if name.is_empty() {
            return None;
        }
        Some(TeamIdentity {
            name,
            url: absolute_url(base_url, href),
        })
    });

    match (teams.next(), teams.next()) {
        (Some(a), Some(b)) => Ok((a, b)),
        (found_a, _) => Err(ExtractionError::new(format!(
            "expected two team links, found {}",
            usize::from(found_a.is_some())
        ))),
    }
}

/// Teams plus the match's own timestamp and result.
pub fn extract_match_detail(
    match_detail_doc: &str,
    base_url: &str,
) -> Result<MatchDetail, ExtractionError> {
    let html = Html::parse_document(match_detail_doc);
    let teams = teams_from(&html, base_url)?;

    let ts_sel = selector(".match-header-date .moment-tz-convert")?;
    let played_at = html
        .select(&ts_sel)
        .find_map(|el| el.value().attr("data-utc-ts"))
        .and_then(|raw| {
            let parsed = NaiveDateTime::parse_from_str(raw.trim(), MATCH_TIMESTAMP_FORMAT).ok();
            if parsed.is_none() {
                warn(&ParseWarning {
                    field: "match timestamp",
                    raw: raw.to_string(),
                });
            }
            parsed
        });

    let score_sel = selector(
        ".match-header-vs-score .match-header-vs-score-winner, \
         .match-header-vs-score .match-header-vs-score-loser",
    )?;
    let cells: Vec<(bool, Option<u32>)> = html
        .select(&score_sel)
        .take(2)
        .map(|el| (has_class(el, "match-header-vs-score-winner"), parse_score_cell(&text_of(el))))
        .collect();

    let (winner, score) = match cells.as_slice() {
        [(a_won, a_score), (b_won, b_score)] => {
            let winner = match (*a_won, *b_won) {
                (true, false) => Some(0),
                (false, true) => Some(1),
                _ => None,
            };
            (winner, (*a_score).zip(*b_score))
        }
        _ => (None, None),
    };

    Ok(MatchDetail {
        teams,
        played_at,
        winner,
        score,
    })
}

// ── Team history pages ──────────────────────────────────────────────────────

struct HistorySelectors {
    row: Selector,
    event: Selector,
    own_team: Selector,
    opponent: Selector,
    result: Selector,
    span: Selector,
    date: Selector,
}

impl HistorySelectors {
    fn new() -> Result<Self, ExtractionError> {
        Ok(Self {
            row: selector("a.wf-card.fc-flex.m-item")?,
            event: selector(".m-item-event")?,
            own_team: selector(".m-item-team .m-item-team-name")?,
            opponent: selector(".m-item-team.mod-right .m-item-team-name")?,
            result: selector(".m-item-result")?,
            span: selector("span")?,
            date: selector(".m-item-date div")?,
        })
    }
}

/// Up to `limit` history rows in document order (most recent first on the
/// source). Callers sort; nothing here assumes an order.
pub fn extract_history(
    team_history_doc: &str,
    base_url: &str,
    limit: usize,
) -> Result<Vec<HistoryRecord>, ExtractionError> {
    let sel = HistorySelectors::new()?;
    let html = Html::parse_document(team_history_doc);

    let records = html
        .select(&sel.row)
        .take(limit)
        .map(|row| {
            let (record, warnings) = history_row(row, &sel, base_url);
            for w in &warnings {
                warn(w);
            }
            record
        })
        .collect();

    Ok(records)
}

fn history_row(
    row: ElementRef<'_>,
    sel: &HistorySelectors,
    base_url: &str,
) -> (HistoryRecord, Vec<ParseWarning>) {
    let mut warnings = Vec::new();

    let event = row
        .select(&sel.event)
        .next()
        .map(text_of)
        .filter(|s| !s.is_empty());
    let team = row
        .select(&sel.own_team)
        .next()
        .map(text_of)
        .filter(|s| !s.is_empty());
    let opponent = row
        .select(&sel.opponent)
        .next()
        .map(text_of)
        .filter(|s| !s.is_empty());

    let mut score = None;
    let mut outcome = Outcome::Unknown;
    if let Some(result) = row.select(&sel.result).next() {
        let cells: Vec<String> = result.select(&sel.span).take(2).map(text_of).collect();
        if cells.len() == 2 {
            score = parse_score_cell(&cells[0]).zip(parse_score_cell(&cells[1]));
            if score.is_none() {
                warnings.push(ParseWarning {
                    field: "score",
                    raw: cells.join("-"),
                });
            }
        }
        if has_class(result, "mod-win") {
            outcome = Outcome::Win;
        } else if has_class(result, "mod-loss") {
            outcome = Outcome::Loss;
        }
    }

    let date = row.select(&sel.date).next().map(text_of).and_then(|raw| {
        let parsed = NaiveDate::parse_from_str(&raw, HISTORY_DATE_FORMAT).ok();
        if parsed.is_none() {
            warnings.push(ParseWarning { field: "date", raw });
        }
        parsed
    });

    let link = row
        .value()
        .attr("href")
        .map(|href| absolute_url(base_url, href));

    let record = HistoryRecord {
        event,
        team,
        opponent,
        score,
        outcome,
        date,
        link,
    };
    (record, warnings)
}

fn warn(warning: &ParseWarning) {
    tracing::warn!("{}; keeping record with field absent", warning);
}
