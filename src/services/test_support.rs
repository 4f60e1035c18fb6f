//! Synthetic pages and an in-memory document source for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::FetchError;
use crate::services::fetcher::DocumentSource;

pub const BASE: &str = "https://www.vlr.gg";

pub struct ListingEntry {
    href: String,
    event: String,
    teams: (String, String),
    winner: Option<usize>,
}

impl ListingEntry {
    pub fn new(href: &str, event: &str, team_a: &str, team_b: &str) -> Self {
        Self {
            href: href.to_string(),
            event: event.to_string(),
            teams: (team_a.to_string(), team_b.to_string()),
            winner: None,
        }
    }

    pub fn with_winner(mut self, position: usize) -> Self {
        self.winner = Some(position);
        self
    }
}

pub fn listing_html(entries: &[ListingEntry]) -> String {
    let mut body = String::new();
    for e in entries {
        let team = |name: &str, pos: usize| {
            let class = if e.winner == Some(pos) {
                "match-item-vs-team mod-winner"
            } else {
                "match-item-vs-team"
            };
            format!(
                r#"<div class="{}"><div class="match-item-vs-team-name"><div class="text-of">
                    <span class="flag mod-un"></span>
                    {}
                </div></div></div>"#,
                class, name
            )
        };
        body.push_str(&format!(
            r#"<a href="{}" class="wf-module-item match-item mod-color">
                <div class="match-item-vs">{}{}</div>
                <div class="match-item-event text-of">
                    <div class="match-item-event-series text-of">Playoffs</div>
                    {}
                </div>
            </a>"#,
            e.href,
            team(&e.teams.0, 0),
            team(&e.teams.1, 1),
            e.event
        ));
    }
    format!(
        "<html><body><div class=\"wf-card\">{}</div></body></html>",
        body
    )
}

/// Event text as the listing exposes it, series label included.
pub fn listing_event(event: &str) -> String {
    format!("Playoffs {}", event)
}

pub fn detail_html(
    team_a: (&str, &str),
    team_b: (&str, &str),
    utc_ts: Option<&str>,
    score: Option<(u32, u32)>,
) -> String {
    let date = utc_ts
        .map(|ts| {
            format!(
                r#"<div class="match-header-date">
                    <div class="moment-tz-convert" data-utc-ts="{}" data-moment-format="dddd, MMMM Do">Saturday</div>
                </div>"#,
                ts
            )
        })
        .unwrap_or_default();

    let vs = score
        .map(|(a, b)| {
            let class = |mine: u32, theirs: u32| {
                if mine > theirs {
                    "match-header-vs-score-winner"
                } else {
                    "match-header-vs-score-loser"
                }
            };
            format!(
                r#"<div class="match-header-vs-score"><div class="js-spoiler">
                    <span class="{}">{}</span>
                    <span class="match-header-vs-score-colon">:</span>
                    <span class="{}">{}</span>
                </div></div>"#,
                class(a, b),
                a,
                class(b, a),
                b
            )
        })
        .unwrap_or_default();

    format!(
        r#"<html><body>
            <div class="match-header-super">{}</div>
            <div class="match-header-vs">
                <a class="match-header-link wf-link-hover mod-1" href="{}">
                    <div class="match-header-link-name mod-1"><div class="wf-title-med">{}</div></div>
                </a>
                {}
                <a class="match-header-link wf-link-hover mod-2" href="{}">
                    <div class="match-header-link-name mod-2"><div class="wf-title-med">{}</div></div>
                </a>
            </div>
        </body></html>"#,
        date, team_a.1, team_a.0, vs, team_b.1, team_b.0
    )
}

#[derive(Clone)]
pub struct HistoryRow {
    pub href: String,
    pub own: String,
    pub opponent: String,
    pub score: Option<(String, String)>,
    pub outcome: Option<&'static str>,
    pub date: String,
}

impl HistoryRow {
    pub fn win(date: &str, own: u32, opp: u32) -> Self {
        Self::with_class("mod-win", date, own, opp)
    }

    pub fn loss(date: &str, own: u32, opp: u32) -> Self {
        Self::with_class("mod-loss", date, own, opp)
    }

    fn with_class(class: &'static str, date: &str, own: u32, opp: u32) -> Self {
        Self {
            href: "/0/unlinked".to_string(),
            own: "Home".to_string(),
            opponent: "Away".to_string(),
            score: Some((own.to_string(), opp.to_string())),
            outcome: Some(class),
            date: date.to_string(),
        }
    }

    pub fn linked(mut self, href: &str) -> Self {
        self.href = href.to_string();
        self
    }

    pub fn unscored(mut self) -> Self {
        self.score = None;
        self
    }
}

pub fn history_html(rows: &[HistoryRow]) -> String {
    let mut body = String::new();
    for r in rows {
        let result_class = match r.outcome {
            Some(c) => format!("m-item-result {}", c),
            None => "m-item-result".to_string(),
        };
        let spans = match &r.score {
            Some((a, b)) => format!("<span>{}</span><span>{}</span>", a, b),
            None => "<span>-</span><span>-</span>".to_string(),
        };
        body.push_str(&format!(
            r#"<a href="{}" class="wf-card fc-flex m-item">
                <div class="m-item-thumb"></div>
                <div class="m-item-event text-of">
                    <div>Masters Toronto</div>
                    Upper Final
                </div>
                <div class="m-item-team text-of">
                    <span class="m-item-team-name">{}</span>
                </div>
                <div class="{}">{}</div>
                <div class="m-item-team text-of mod-right">
                    <span class="m-item-team-name">{}</span>
                </div>
                <div class="m-item-date"><div>{}</div>5:00 pm</div>
            </a>"#,
            r.href, r.own, result_class, spans, r.opponent, r.date
        ));
    }
    format!("<html><body><div class=\"mod-dark\">{}</div></body></html>", body)
}

/// In-memory document source. Counts fetches per URL and can delay every
/// response to force concurrent requests to overlap.
///
/// With a stop trigger it behaves like the HTTP fetcher under a stop
/// signal: requests are refused once the token is cancelled, while a request
/// already dispatched still returns its page.
#[derive(Default)]
pub struct StaticSource {
    pages: HashMap<String, String>,
    hits: Mutex<HashMap<String, usize>>,
    total: AtomicUsize,
    latency: Option<Duration>,
    stop: Option<(String, CancellationToken)>,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Cancel `cancel` when `url` is dispatched.
    pub fn stop_on(mut self, url: impl Into<String>, cancel: CancellationToken) -> Self {
        self.stop = Some((url.into(), cancel));
        self
    }

    pub fn page(mut self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.pages.insert(url.into(), body.into());
        self
    }

    pub fn hits(&self, url: &str) -> usize {
        self.hits
            .lock()
            .unwrap()
            .get(url)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_hits(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }
}

impl DocumentSource for StaticSource {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        if let Some((trigger, cancel)) = &self.stop {
            if cancel.is_cancelled() {
                return Err(FetchError::cancelled(url));
            }
            if trigger == url {
                cancel.cancel();
            }
        }

        self.total.fetch_add(1, Ordering::SeqCst);
        *self.hits.lock().unwrap().entry(url.to_string()).or_default() += 1;

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::new(url, "HTTP 404 Not Found"))
    }
}
