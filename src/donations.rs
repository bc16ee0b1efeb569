// Donation totals from PayPal and Buy Me a Coffee.
// PayPal goes through OAuth and Transaction Search; Buy Me a Coffee is scraped.

use chrono::{Duration as ChronoDuration, SecondsFormat, Utc};
use reqwest::Client;
use serde::Deserialize;

use crate::config::{DonationsConfig, Endpoints};
use crate::error::{Result, StatsError};
use crate::github::client::REQUEST_TIMEOUT;
use crate::scrape::{self, PageFetcher};

pub const DEFAULT_CURRENCY: &str = "USD";

/// Transaction Search only allows windows of up to 31 days.
const TRANSACTION_WINDOW_DAYS: i64 = 31;

/// Total reported by one donation provider.
#[derive(Debug, Clone, PartialEq)]
pub struct DonationSource {
    pub total: f64,
    pub currency: String,
    pub transaction_count: Option<usize>,
    pub error: Option<String>,
}

impl DonationSource {
    pub fn found(total: f64, currency: impl Into<String>) -> Self {
        Self {
            total,
            currency: currency.into(),
            transaction_count: None,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            total: 0.0,
            currency: DEFAULT_CURRENCY.to_string(),
            transaction_count: None,
            error: Some(error.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Combined donations across providers.
#[derive(Debug, Clone, PartialEq)]
pub struct Donations {
    pub total: f64,
    pub currency: String,
    pub paypal: DonationSource,
    pub buymeacoffee: DonationSource,
}

impl Donations {
    /// Add up the providers that reported without error.
    pub fn combine(paypal: DonationSource, buymeacoffee: DonationSource) -> Self {
        let mut total = 0.0;
        let mut currency = DEFAULT_CURRENCY.to_string();

        if paypal.is_ok() {
            total += paypal.total;
            currency = paypal.currency.clone();
        }
        if buymeacoffee.is_ok() {
            total += buymeacoffee.total;
        }

        Self {
            total,
            currency,
            paypal,
            buymeacoffee,
        }
    }
}

#[derive(Debug, Clone)]
struct PaypalCredentials {
    client_id: String,
    client_secret: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TransactionSearchResponse {
    transaction_details: Vec<TransactionDetail>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TransactionDetail {
    transaction_info: TransactionInfo,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TransactionInfo {
    transaction_amount: Option<Money>,
}

#[derive(Debug, Deserialize)]
struct Money {
    currency_code: String,
    value: String,
}

/// Fetches donation totals from the configured providers.
pub struct DonationsFetcher {
    client: Client,
    pages: PageFetcher,
    paypal: Option<PaypalCredentials>,
    buymeacoffee_username: Option<String>,
    paypal_base: String,
    buymeacoffee_base: String,
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

impl DonationsFetcher {
    pub fn new(config: &DonationsConfig, endpoints: &Endpoints) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(StatsError::Api)?;

        let paypal = match (
            non_empty(&config.paypal.client_id),
            non_empty(&config.paypal.client_secret),
        ) {
            (Some(client_id), Some(client_secret)) => Some(PaypalCredentials {
                client_id,
                client_secret,
            }),
            _ => None,
        };

        Ok(Self {
            client,
            pages: PageFetcher::new()?,
            paypal,
            buymeacoffee_username: non_empty(&config.buymeacoffee.username),
            paypal_base: endpoints.paypal_api.trim_end_matches('/').to_string(),
            buymeacoffee_base: endpoints.buymeacoffee_web.trim_end_matches('/').to_string(),
        })
    }

    /// Obtain an OAuth bearer token via the client-credentials grant.
    async fn paypal_access_token(&self, credentials: &PaypalCredentials) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/v1/oauth2/token", self.paypal_base))
            .basic_auth(&credentials.client_id, Some(&credentials.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(StatsError::Http {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let token: TokenResponse = response.json().await?;
        Ok(token.access_token)
    }

    /// Completed PayPal transactions over the last 31 days.
    pub async fn get_paypal_donations(&self) -> DonationSource {
        let Some(credentials) = &self.paypal else {
            return DonationSource::failed("PayPal credentials not configured");
        };

        let token = match self.paypal_access_token(credentials).await {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!("PayPal authentication failed: {}", e);
                return DonationSource::failed("Failed to authenticate with PayPal");
            }
        };

        let end = Utc::now();
        let start = end - ChronoDuration::days(TRANSACTION_WINDOW_DAYS);
        let params = [
            ("start_date", start.to_rfc3339_opts(SecondsFormat::Secs, true)),
            ("end_date", end.to_rfc3339_opts(SecondsFormat::Secs, true)),
            ("transaction_status", "S".to_string()),
        ];

        let response = match self
            .client
            .get(format!("{}/v1/reporting/transactions", self.paypal_base))
            .bearer_auth(&token)
            .query(&params)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return DonationSource::failed(e.to_string()),
        };

        if response.status() != reqwest::StatusCode::OK {
            return DonationSource::failed(format!("API error: {}", response.status().as_u16()));
        }

        let search: TransactionSearchResponse = match response.json().await {
            Ok(search) => search,
            Err(e) => return DonationSource::failed(e.to_string()),
        };

        let amounts: Vec<(f64, String)> = search
            .transaction_details
            .into_iter()
            .filter_map(|detail| detail.transaction_info.transaction_amount)
            .filter_map(|money| {
                let value: f64 = money.value.parse().ok()?;
                (value > 0.0).then_some((value, money.currency_code))
            })
            .collect();

        let currency = amounts
            .first()
            .map(|(_, code)| code.clone())
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());
        let mut source = DonationSource::found(amounts.iter().map(|(v, _)| v).sum(), currency);
        source.transaction_count = Some(amounts.len());
        source
    }

    /// Scrape the public Buy Me a Coffee profile for a running total.
    pub async fn get_buymeacoffee_donations(&self) -> DonationSource {
        let Some(username) = &self.buymeacoffee_username else {
            return DonationSource::failed("Buy Me a Coffee username not configured");
        };

        let url = format!("{}/{}", self.buymeacoffee_base, username);
        let html = match self.pages.fetch(&url).await {
            Ok(html) => html,
            Err(StatsError::Http { body, .. }) => return DonationSource::failed(body),
            Err(e) => return DonationSource::failed(e.to_string()),
        };

        match scrape::extract_donation_total(&html) {
            Some(total) => DonationSource::found(total, DEFAULT_CURRENCY),
            None => DonationSource::failed(
                "Could not find donation total on page. The page structure may have changed.",
            ),
        }
    }

    /// Totals from every provider; failures contribute nothing.
    pub async fn get_all_donations(&self) -> Donations {
        let paypal = self.get_paypal_donations().await;
        let buymeacoffee = self.get_buymeacoffee_donations().await;

        for (provider, source) in [("PayPal", &paypal), ("Buy Me a Coffee", &buymeacoffee)] {
            if let Some(error) = &source.error {
                tracing::debug!("{} donations unavailable: {}", provider, error);
            }
        }

        Donations::combine(paypal, buymeacoffee)
    }
}
