// Best-effort HTML scraping adapters.
// Heuristic extraction of download counts and donation totals from public pages.
//
// These patterns track third-party markup and break whenever it changes.
// Callers treat a miss as a normal outcome, never as an error to retry.

use std::sync::LazyLock;
use std::time::Duration;

use regex::{Regex, RegexBuilder};
use reqwest::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue, USER_AGENT};

use crate::error::{Result, StatsError};

/// Timeout for public page fetches.
pub const PAGE_TIMEOUT: Duration = Duration::from_secs(15);

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

fn case_insensitive(pattern: &str) -> Regex {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .dot_matches_new_line(true)
        .build()
        .unwrap_or_else(|e| panic!("invalid built-in pattern {pattern}: {e}"))
}

/// Download count patterns, most specific first.
static DOWNLOAD_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r#"Total downloads.{0,200}?title="([\d,]+)""#,
        r#""downloadCount"\s*:\s*"?([\d,]+)"#,
        r#""download_count"\s*:\s*"?([\d,]+)"#,
        r"([\d,]+)\s+(?:total\s+)?downloads",
    ]
    .iter()
    .map(|p| case_insensitive(p))
    .collect()
});

/// Abbreviated counts such as `1.2K downloads`.
static ABBREVIATED_DOWNLOADS: LazyLock<Regex> =
    LazyLock::new(|| case_insensitive(r"([\d.]+)\s*([km])\s+(?:total\s+)?downloads"));

/// Plain-text donation patterns.
static DONATION_TEXT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"total[_\s]*(?:earned|raised|donations?)[\s:]*\$?([\d,]+\.?\d*)",
        r"\$([\d,]+\.?\d*)\s*total",
        r"([\d,]+\.?\d*)\s*(?:coffees?|donations?)",
        r#"data-total=["']([\d,]+\.?\d*)["']"#,
        r#""total":\s*([\d,]+\.?\d*)"#,
        r"Total[:\s]+\$?([\d,]+\.?\d*)",
    ]
    .iter()
    .map(|p| case_insensitive(p))
    .collect()
});

static SCRIPT_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| case_insensitive(r"<script[^>]*>(.*?)</script>"));

/// Donation patterns applied inside `<script>` blocks.
static DONATION_SCRIPT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r#""totalEarned":\s*([\d,]+\.?\d*)"#,
        r#""total":\s*([\d,]+\.?\d*)"#,
        r#""earnings":\s*([\d,]+\.?\d*)"#,
        r#""amount":\s*([\d,]+\.?\d*)"#,
    ]
    .iter()
    .map(|p| case_insensitive(p))
    .collect()
});

static DONATION_WIDGET: LazyLock<Regex> = LazyLock::new(|| {
    case_insensitive(r#"bmc-widget[^>]*data-total=["']([\d,]+\.?\d*)["']"#)
});

fn parse_count(raw: &str) -> Option<u64> {
    raw.replace(',', "").parse().ok()
}

fn parse_amount(raw: &str) -> Option<f64> {
    raw.replace(',', "").trim().parse().ok()
}

/// Extract a download count from a package page.
///
/// Patterns are tried in order; the first one yielding a positive number wins.
pub fn extract_download_count(html: &str) -> Option<u64> {
    for pattern in DOWNLOAD_PATTERNS.iter() {
        let found = pattern
            .captures_iter(html)
            .filter_map(|caps| caps.get(1).and_then(|m| parse_count(m.as_str())))
            .find(|&n| n > 0);
        if found.is_some() {
            return found;
        }
    }

    ABBREVIATED_DOWNLOADS.captures_iter(html).find_map(|caps| {
        let value: f64 = caps.get(1)?.as_str().parse().ok()?;
        let scale = match caps.get(2)?.as_str() {
            "k" | "K" => 1_000.0,
            _ => 1_000_000.0,
        };
        let count = (value * scale).round() as u64;
        (count > 0).then_some(count)
    })
}

/// Largest amount matched by `pattern` in `text`, if any.
fn largest_amount(pattern: &Regex, text: &str) -> Option<f64> {
    pattern
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).and_then(|m| parse_amount(m.as_str())))
        .reduce(f64::max)
}

/// Extract a cumulative donation total from a profile page.
///
/// Plain-text patterns run first, then JSON embedded in scripts, then the
/// widget attribute. Within a pattern the largest figure is taken, since the
/// running total is usually the biggest number on the page.
pub fn extract_donation_total(html: &str) -> Option<f64> {
    let from_text = DONATION_TEXT_PATTERNS
        .iter()
        .find_map(|pattern| largest_amount(pattern, html));
    if let Some(total) = from_text.filter(|&t| t > 0.0) {
        return Some(total);
    }

    for script in SCRIPT_BLOCK.captures_iter(html) {
        let Some(body) = script.get(1) else {
            continue;
        };
        let found = DONATION_SCRIPT_PATTERNS
            .iter()
            .find_map(|pattern| largest_amount(pattern, body.as_str()));
        if let Some(total) = found.filter(|&t| t > 0.0) {
            return Some(total);
        }
    }

    DONATION_WIDGET
        .captures(html)
        .and_then(|caps| caps.get(1))
        .and_then(|m| parse_amount(m.as_str()))
        .filter(|&t| t > 0.0)
}

/// Fetches public HTML pages with browser-like headers.
#[derive(Clone)]
pub struct PageFetcher {
    client: Client,
}

impl PageFetcher {
    pub fn new() -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(PAGE_TIMEOUT)
            .build()
            .map_err(StatsError::Api)?;
        Ok(Self { client })
    }

    /// GET a page and return its body text.
    pub async fn fetch(&self, url: &str) -> Result<String> {
        tracing::debug!(%url, "fetching page");
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(StatsError::Http {
                status: status.as_u16(),
                body: format!("Failed to fetch page: {}", status.as_u16()),
            });
        }
        Ok(response.text().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_count_from_sidebar() {
        let html = r#"
            <div class="d-flex">
              <span class="color-fg-muted">Total downloads</span>
              <h3 title="12345">12.3K</h3>
            </div>"#;
        assert_eq!(extract_download_count(html), Some(12_345));
    }

    #[test]
    fn test_download_count_from_embedded_json() {
        let html = r#"<script>{"package":{"downloadCount":"4,210"}}</script>"#;
        assert_eq!(extract_download_count(html), Some(4_210));
    }

    #[test]
    fn test_download_count_skips_zero_matches() {
        let html = r#"{"download_count": 0} and later 87 downloads"#;
        assert_eq!(extract_download_count(html), Some(87));
    }

    #[test]
    fn test_download_count_abbreviated() {
        assert_eq!(extract_download_count("<b>2.5K downloads</b>"), Some(2_500));
        assert_eq!(extract_download_count("1.1M total downloads"), Some(1_100_000));
    }

    #[test]
    fn test_download_count_miss() {
        assert_eq!(extract_download_count("<html>nothing here</html>"), None);
    }

    #[test]
    fn test_donation_total_takes_largest() {
        let html = "<p>Total raised: $1,250.50</p><p>Total raised: $90</p>";
        assert_eq!(extract_donation_total(html), Some(1250.5));
    }

    #[test]
    fn test_donation_total_from_script() {
        let html = r#"<html><script type="application/json">{"creator":{"totalEarned": 310.25, "amount": 5}}</script></html>"#;
        assert_eq!(extract_donation_total(html), Some(310.25));
    }

    #[test]
    fn test_donation_total_from_widget() {
        let html = r#"<div class="bmc-widget" data-id="x" data-total='77.00'></div>"#;
        assert_eq!(extract_donation_total(html), Some(77.0));
    }

    #[test]
    fn test_donation_total_miss() {
        assert_eq!(extract_donation_total("<html><body>hello</body></html>"), None);
    }
}
