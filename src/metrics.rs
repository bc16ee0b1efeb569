// Derived metrics and aggregation.
// Pure functions turning raw repository records into display-ready figures.

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::donations::{DEFAULT_CURRENCY, Donations};
use crate::github::RepoStats;

/// A repository counts as active when its last push is at most this many days old.
pub const ACTIVE_WINDOW_DAYS: i64 = 7;

/// Parse an ISO-8601 timestamp, tolerating missing zones and fractional seconds.
///
/// Timestamps without a zone are taken as UTC. Returns `None` for anything
/// unparseable.
pub fn parse_iso_datetime(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    for fmt in ["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"] {
        if let Ok(dt) = DateTime::parse_from_str(value, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(naive.and_utc());
        }
    }

    // Last resort: the leading date-time, ignoring whatever follows.
    value
        .get(..19)
        .and_then(|prefix| NaiveDateTime::parse_from_str(prefix, "%Y-%m-%dT%H:%M:%S").ok())
        .map(|naive| naive.and_utc())
}

/// Format large numbers with K/M suffixes.
pub fn format_number(num: u64) -> String {
    if num >= 1_000_000 {
        format!("{:.1}M", num as f64 / 1_000_000.0)
    } else if num >= 1_000 {
        format!("{:.1}K", num as f64 / 1_000.0)
    } else {
        num.to_string()
    }
}

/// Format a timestamp relative to `now` (e.g. "2h ago").
pub fn format_relative_time(dt: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(dt) = dt else {
        return "Never".to_string();
    };

    let delta = now.signed_duration_since(dt);
    if delta.num_days() > 0 {
        format!("{}d ago", delta.num_days())
    } else if delta.num_hours() >= 1 {
        format!("{}h ago", delta.num_hours())
    } else if delta.num_minutes() >= 1 {
        format!("{}m ago", delta.num_minutes())
    } else {
        "Just now".to_string()
    }
}

/// Format a timestamp as `YYYY-MM-DD HH:MM`.
pub fn format_datetime(dt: Option<DateTime<Utc>>) -> String {
    match dt {
        Some(dt) => dt.format("%Y-%m-%d %H:%M").to_string(),
        None => "Never".to_string(),
    }
}

/// Truncate to `max_length` characters, ending in "..." when shortened.
pub fn truncate_text(text: &str, max_length: usize) -> String {
    if text.chars().count() <= max_length {
        return text.to_string();
    }
    if max_length <= 3 {
        return text.chars().take(max_length).collect();
    }
    let mut out: String = text.chars().take(max_length - 3).collect();
    out.push_str("...");
    out
}

/// Hard-cut a line to `width` characters.
pub fn fit_width(text: &str, width: usize) -> String {
    text.chars().take(width).collect()
}

/// Two-decimal amount with thousands separators, e.g. `1,234.50`.
pub fn format_thousands(value: f64) -> String {
    let formatted = format!("{:.2}", value.abs());
    let (int_part, frac_part) = formatted.split_once('.').unwrap_or((&formatted, "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, digit) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if value < 0.0 { "-" } else { "" };
    format!("{}{}.{}", sign, grouped, frac_part)
}

/// `$X,XXX.XX` for USD, `X,XXX.XX CUR` otherwise.
pub fn format_donations(total: f64, currency: &str) -> String {
    if currency == DEFAULT_CURRENCY {
        format!("${}", format_thousands(total))
    } else {
        format!("{} {}", format_thousands(total), currency)
    }
}

/// A repository record with derived display fields.
#[derive(Debug, Clone, PartialEq)]
pub struct RepoMetrics {
    pub stats: RepoStats,
    pub last_commit_date: Option<DateTime<Utc>>,
    pub last_updated_date: Option<DateTime<Utc>>,
    pub days_since_last_commit: Option<i64>,
    pub is_active: bool,
    pub last_commit_relative: String,
    pub last_updated_relative: String,
    pub stars_formatted: String,
    pub forks_formatted: String,
}

/// Derive display metrics for one repository as of `now`.
pub fn calculate_repo_metrics(stats: &RepoStats, now: DateTime<Utc>) -> RepoMetrics {
    let last_commit_date = parse_iso_datetime(&stats.pushed_at);
    let last_updated_date = parse_iso_datetime(&stats.updated_at);

    let days_since_last_commit = last_commit_date.map(|dt| {
        now.signed_duration_since(dt)
            .num_seconds()
            .div_euclid(86_400)
    });
    let is_active = days_since_last_commit.is_some_and(|days| days <= ACTIVE_WINDOW_DAYS);

    RepoMetrics {
        stats: stats.clone(),
        last_commit_date,
        last_updated_date,
        days_since_last_commit,
        is_active,
        last_commit_relative: format_relative_time(last_commit_date, now),
        last_updated_relative: format_relative_time(last_updated_date, now),
        stars_formatted: format_number(stats.stars),
        forks_formatted: format_number(stats.forks),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MostStarred {
    pub name: String,
    pub stars: u64,
}

/// Totals across every tracked repository.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateSummary {
    pub total_repos: usize,
    pub total_stars: u64,
    pub total_forks: u64,
    pub total_open_issues: u64,
    pub active_repos: usize,
    pub most_starred: Option<MostStarred>,
    pub total_release_downloads: u64,
    pub total_stars_formatted: String,
    pub total_forks_formatted: String,
    pub total_downloads: Option<u64>,
    pub total_downloads_formatted: Option<String>,
    pub total_donations: Option<f64>,
    pub total_donations_formatted: Option<String>,
    pub donations_currency: Option<String>,
}

impl AggregateSummary {
    /// `active/total`, e.g. "3/5".
    pub fn activity_ratio(&self) -> String {
        format!("{}/{}", self.active_repos, self.total_repos)
    }
}

/// Fold repository metrics plus optional package and donation totals into a summary.
///
/// When several repositories share the highest star count, the first one wins.
pub fn aggregate_metrics(
    repos: &[(String, RepoMetrics)],
    package_downloads: Option<u64>,
    donations: Option<&Donations>,
) -> AggregateSummary {
    let mut total_stars = 0;
    let mut total_forks = 0;
    let mut total_open_issues = 0;
    let mut total_release_downloads = 0;
    let mut active_repos = 0;
    let mut most_starred: Option<MostStarred> = None;

    for (repo_path, metrics) in repos {
        let stats = &metrics.stats;
        total_stars += stats.stars;
        total_forks += stats.forks;
        total_open_issues += stats.open_issues;
        total_release_downloads += stats.release_downloads;

        if metrics.is_active {
            active_repos += 1;
        }

        if most_starred.as_ref().is_none_or(|top| stats.stars > top.stars) {
            let name = if stats.name.is_empty() {
                repo_path.clone()
            } else {
                stats.name.clone()
            };
            most_starred = Some(MostStarred {
                name,
                stars: stats.stars,
            });
        }
    }

    AggregateSummary {
        total_repos: repos.len(),
        total_stars,
        total_forks,
        total_open_issues,
        active_repos,
        most_starred,
        total_release_downloads,
        total_stars_formatted: format_number(total_stars),
        total_forks_formatted: format_number(total_forks),
        total_downloads: package_downloads,
        total_downloads_formatted: package_downloads.map(format_number),
        total_donations: donations.map(|d| d.total),
        total_donations_formatted: donations.map(|d| format_donations(d.total, &d.currency)),
        donations_currency: donations.map(|d| d.currency.clone()),
    }
}

/// Four fixed-width lines describing one repository.
pub fn prepare_display_lines(repo: &RepoMetrics, width: usize) -> Vec<String> {
    let name = if repo.stats.name.is_empty() {
        "Unknown"
    } else {
        repo.stats.name.as_str()
    };

    vec![
        fit_width(name, width),
        fit_width(
            &format!("★{} | Fork:{}", repo.stars_formatted, repo.forks_formatted),
            width,
        ),
        fit_width(
            &format!("Issues:{} | {}", repo.stats.open_issues, repo.stats.language),
            width,
        ),
        fit_width(&format!("Last: {}", repo.last_commit_relative), width),
    ]
}

/// Fixed-width summary lines, with a trailing downloads/donations line when known.
pub fn prepare_summary_lines(summary: &AggregateSummary, width: usize) -> Vec<String> {
    let mut lines = vec![
        fit_width("GitHub Stats Summary", width),
        fit_width(
            &format!(
                "★{} | Forks:{}",
                summary.total_stars_formatted, summary.total_forks_formatted
            ),
            width,
        ),
        fit_width(
            &format!(
                "Issues:{} | Active:{}",
                summary.total_open_issues,
                summary.activity_ratio()
            ),
            width,
        ),
    ];

    match &summary.most_starred {
        Some(top) => {
            let name = fit_width(&top.name, width.saturating_sub(10));
            lines.push(fit_width(&format!("Top: {} ★{}", name, top.stars), width));
        }
        None => lines.push(fit_width("No repos found", width)),
    }

    let mut extras = Vec::new();
    if let Some(downloads) = &summary.total_downloads_formatted {
        extras.push(format!("DL:{}", downloads));
    }
    if let Some(donations) = &summary.total_donations_formatted {
        extras.push(format!("Donations:{}", donations));
    }
    if !extras.is_empty() {
        lines.push(fit_width(&extras.join(" | "), width));
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 14, 12, 0, 0).unwrap()
    }

    fn repo(name: &str, stars: u64, pushed: DateTime<Utc>) -> RepoStats {
        RepoStats {
            name: name.to_string(),
            full_name: format!("octocat/{}", name),
            stars,
            forks: stars / 10,
            open_issues: 1,
            language: "Rust".to_string(),
            pushed_at: pushed.to_rfc3339(),
            updated_at: pushed.to_rfc3339(),
            ..RepoStats::default()
        }
    }

    fn metrics(name: &str, stars: u64, days_ago: i64) -> (String, RepoMetrics) {
        let stats = repo(name, stars, now() - Duration::days(days_ago));
        (
            format!("octocat/{}", name),
            calculate_repo_metrics(&stats, now()),
        )
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1_000), "1.0K");
        assert_eq!(format_number(1_500), "1.5K");
        assert_eq!(format_number(2_500_000), "2.5M");
    }

    #[test]
    fn test_format_relative_time() {
        let now = now();
        assert_eq!(format_relative_time(Some(now - Duration::seconds(30)), now), "Just now");
        assert_eq!(format_relative_time(Some(now - Duration::minutes(5)), now), "5m ago");
        assert_eq!(format_relative_time(Some(now - Duration::minutes(90)), now), "1h ago");
        assert_eq!(format_relative_time(Some(now - Duration::days(3)), now), "3d ago");
        assert_eq!(format_relative_time(None, now), "Never");
    }

    #[test]
    fn test_parse_iso_datetime_formats() {
        let expected = Utc.with_ymd_and_hms(2026, 10, 1, 8, 30, 0).unwrap();
        assert_eq!(parse_iso_datetime("2026-10-01T08:30:00Z"), Some(expected));
        assert_eq!(parse_iso_datetime("2026-10-01T08:30:00.000Z"), Some(expected));
        assert_eq!(parse_iso_datetime("2026-10-01T10:30:00+02:00"), Some(expected));
        assert_eq!(parse_iso_datetime("2026-10-01T08:30:00"), Some(expected));
        assert_eq!(parse_iso_datetime("2026-10-01 08:30:00"), Some(expected));
        assert_eq!(parse_iso_datetime(""), None);
        assert_eq!(parse_iso_datetime("yesterday"), None);
    }

    #[test]
    fn test_activity_flag() {
        assert!(metrics("fresh", 1, 5).1.is_active);
        assert!(!metrics("stale", 1, 8).1.is_active);

        let never = calculate_repo_metrics(&RepoStats::default(), now());
        assert!(!never.is_active);
        assert_eq!(never.days_since_last_commit, None);
        assert_eq!(never.last_commit_relative, "Never");
    }

    #[test]
    fn test_calculate_is_pure() {
        let stats = repo("same", 1_234, now() - Duration::hours(3));
        let first = calculate_repo_metrics(&stats, now());
        let second = calculate_repo_metrics(&stats, now());
        assert_eq!(first, second);
        assert_eq!(first.stars_formatted, "1.2K");
        assert_eq!(first.last_commit_relative, "3h ago");
        assert_eq!(first.days_since_last_commit, Some(0));
    }

    #[test]
    fn test_aggregate_totals_and_most_starred() {
        let repos = vec![metrics("a", 5, 1), metrics("b", 50, 10), metrics("c", 20, 2)];
        let summary = aggregate_metrics(&repos, None, None);

        assert_eq!(summary.total_repos, 3);
        assert_eq!(summary.total_stars, 75);
        assert_eq!(summary.active_repos, 2);
        assert_eq!(summary.activity_ratio(), "2/3");
        let top = summary.most_starred.unwrap();
        assert_eq!(top.name, "b");
        assert_eq!(top.stars, 50);
        assert_eq!(summary.total_downloads, None);
        assert_eq!(summary.total_donations_formatted, None);
    }

    #[test]
    fn test_most_starred_tie_keeps_first() {
        let repos = vec![metrics("first", 50, 1), metrics("second", 50, 1), metrics("low", 3, 1)];
        let summary = aggregate_metrics(&repos, None, None);
        assert_eq!(summary.most_starred.unwrap().name, "first");
    }

    #[test]
    fn test_aggregate_empty() {
        let summary = aggregate_metrics(&[], None, None);
        assert_eq!(summary.total_repos, 0);
        assert_eq!(summary.total_stars, 0);
        assert_eq!(summary.most_starred, None);
        assert_eq!(summary.total_stars_formatted, "0");
    }

    #[test]
    fn test_aggregate_downloads_and_donations() {
        use crate::donations::DonationSource;

        let donations = Donations::combine(
            DonationSource::found(1234.5, "USD"),
            DonationSource::failed("offline"),
        );
        let summary = aggregate_metrics(&[metrics("a", 1, 1)], Some(2_500), Some(&donations));

        assert_eq!(summary.total_downloads, Some(2_500));
        assert_eq!(summary.total_downloads_formatted.as_deref(), Some("2.5K"));
        assert_eq!(summary.total_donations, Some(1234.5));
        assert_eq!(summary.total_donations_formatted.as_deref(), Some("$1,234.50"));
        assert_eq!(summary.donations_currency.as_deref(), Some("USD"));
    }

    #[test]
    fn test_format_donations() {
        assert_eq!(format_donations(0.0, "USD"), "$0.00");
        assert_eq!(format_donations(1_234_567.891, "USD"), "$1,234,567.89");
        assert_eq!(format_donations(999.5, "EUR"), "999.50 EUR");
    }

    #[test]
    fn test_format_datetime() {
        assert_eq!(format_datetime(Some(now())), "2026-10-14 12:00");
        assert_eq!(format_datetime(None), "Never");
    }

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("short", 10), "short");
        assert_eq!(truncate_text("a long repository name", 10), "a long ...");
        assert_eq!(truncate_text("abcdef", 2), "ab");
    }

    #[test]
    fn test_display_lines_fit_width() {
        let (_, repo) = metrics("a-very-long-repository-name", 1_500, 2);
        let lines = prepare_display_lines(&repo, 20);

        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "a-very-long-reposito");
        assert_eq!(lines[1], "★1.5K | Fork:150");
        assert_eq!(lines[2], "Issues:1 | Rust");
        assert_eq!(lines[3], "Last: 2d ago");
        assert!(lines.iter().all(|l| l.chars().count() <= 20));
    }

    #[test]
    fn test_summary_lines() {
        let repos = vec![metrics("Hello-World", 1_000, 2)];
        let summary = aggregate_metrics(&repos, Some(42), None);
        let lines = prepare_summary_lines(&summary, 40);

        assert_eq!(lines[0], "GitHub Stats Summary");
        assert_eq!(lines[1], "★1.0K | Forks:100");
        assert_eq!(lines[2], "Issues:1 | Active:1/1");
        assert_eq!(lines[3], "Top: Hello-World ★1000");
        assert_eq!(lines[4], "DL:42");

        let empty = prepare_summary_lines(&aggregate_metrics(&[], None, None), 20);
        assert_eq!(empty.len(), 4);
        assert_eq!(empty[3], "No repos found");
    }
}
