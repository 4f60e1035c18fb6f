use chrono::NaiveDateTime;

/// Collapse runs of whitespace (including newlines and tabs) into single spaces
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Join a relative `href` onto the site base. Absolute links pass through.
pub fn absolute_url(base_url: &str, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }
    let base = base_url.trim_end_matches('/');
    if href.starts_with('/') {
        format!("{}{}", base, href)
    } else {
        format!("{}/{}", base, href)
    }
}

/// Upcoming matches listing page
pub fn upcoming_listing_url(base_url: &str, page: u32) -> String {
    format!("{}/matches/?page={}", base_url.trim_end_matches('/'), page)
}

/// Completed results listing page
pub fn results_listing_url(base_url: &str, page: u32) -> String {
    format!("{}/matches/results/?page={}", base_url.trim_end_matches('/'), page)
}

/// Turn a team profile URL (`.../team/624/paper-rex`) into its completed
/// matches page (`.../team/matches/624/paper-rex/?group=completed`).
pub fn completed_matches_url(team_url: &str, page: u32) -> String {
    let matches_url = team_url
        .trim_end_matches('/')
        .replacen("/team/", "/team/matches/", 1);
    if page <= 1 {
        format!("{}/?group=completed", matches_url)
    } else {
        format!("{}/?group=completed&page={}", matches_url, page)
    }
}

/// Case and whitespace insensitive team name comparison
pub fn same_team_name(a: &str, b: &str) -> bool {
    collapse_whitespace(a).to_lowercase() == collapse_whitespace(b).to_lowercase()
}

/// Timestamp format used in exported rows
pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Parse the leading integer out of a score cell ("13", " 2 ", "13*")
pub fn parse_score_cell(text: &str) -> Option<u32> {
    let digits: String = text
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}
