//! HTTP client for the search reporting API.
//!
//! Everything goes through one POST endpoint (`query-analytics/list`)
//! whose request body selects the indicator (URL or QUERY), the device,
//! and the filters.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use etl_core::{Error, NewRawAggregate, Result};
use telemetry::metrics;

use crate::config::CollectorConfig;

/// Device segment of the reporting API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceType {
    Desktop,
    Mobile,
    Tablet,
}

impl DeviceType {
    pub const ALL: [DeviceType; 3] = [Self::Desktop, Self::Mobile, Self::Tablet];

    /// Value expected by the API.
    pub fn api_value(&self) -> &'static str {
        match self {
            Self::Desktop => "DESKTOP",
            Self::Mobile => "MOBILE",
            Self::Tablet => "TABLET",
        }
    }

    /// Value stored in the raw layer.
    pub fn storage_value(&self) -> &'static str {
        match self {
            Self::Desktop => "desktop",
            Self::Mobile => "mobile",
            Self::Tablet => "tablet",
        }
    }
}

#[derive(Debug, Serialize)]
struct ListRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<i64>,
    limit: i64,
    text_indicator: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    device_type_indicator: Option<&'static str>,
    filters: Filters,
}

#[derive(Debug, Default, Serialize)]
struct Filters {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    text_filters: Vec<TextFilter>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    statistic_filters: Vec<StatisticFilter>,
}

#[derive(Debug, Serialize)]
struct TextFilter {
    text_indicator: &'static str,
    operation: &'static str,
    value: String,
}

#[derive(Debug, Serialize)]
struct StatisticFilter {
    statistic_field: &'static str,
    operation: &'static str,
    value: &'static str,
    from: String,
    to: String,
}

impl StatisticFilter {
    fn positive_on(field: &'static str, date: NaiveDate) -> Self {
        Self {
            statistic_field: field,
            operation: "GREATER_THAN",
            value: "0",
            from: date.to_string(),
            to: date.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    text_indicator_to_statistics: Vec<IndicatorStats>,
}

#[derive(Debug, Deserialize)]
struct IndicatorStats {
    text_indicator: Indicator,
    #[serde(default)]
    statistics: Vec<StatPoint>,
}

#[derive(Debug, Deserialize)]
struct Indicator {
    #[serde(default)]
    value: String,
}

#[derive(Debug, Deserialize)]
struct StatPoint {
    #[serde(default)]
    date: String,
    #[serde(default)]
    field: String,
    #[serde(default)]
    value: f64,
}

/// Turns one QUERY-indicator response into raw rows for `date`/`device`.
///
/// A query's statistics carry one point per (date, field); only points
/// matching the requested date contribute.
fn rows_from_response(
    response: &ListResponse,
    date: NaiveDate,
    device: DeviceType,
) -> Vec<NewRawAggregate> {
    let date_str = date.to_string();
    let mut rows = Vec::with_capacity(response.text_indicator_to_statistics.len());

    for item in &response.text_indicator_to_statistics {
        let mut fields: HashMap<&str, f64> = HashMap::new();
        for stat in &item.statistics {
            if stat.date == date_str {
                fields.insert(stat.field.as_str(), stat.value);
            }
        }

        rows.push(NewRawAggregate {
            date,
            page_path: String::new(), // filled in by the caller
            query: item.text_indicator.value.clone(),
            device: device.storage_value().to_string(),
            demand: fields.get("DEMAND").copied().unwrap_or(0.0) as i64,
            impressions: fields.get("IMPRESSIONS").copied().unwrap_or(0.0) as i64,
            clicks: fields.get("CLICKS").copied().unwrap_or(0.0) as i64,
            position: fields.get("POSITION").copied().unwrap_or(0.0),
        });
    }

    rows
}

/// Client for the `query-analytics/list` endpoint family.
pub struct ReportsClient {
    http: reqwest::Client,
    config: CollectorConfig,
}

impl ReportsClient {
    pub fn new(config: CollectorConfig) -> Result<Self> {
        if config.token.is_empty() {
            return Err(Error::config("reporting api token is not set"));
        }
        if config.user_id.is_empty() || config.host_id.is_empty() {
            return Err(Error::config("reporting api user_id/host_id are not set"));
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::api(format!("client build failed: {e}")))?;

        Ok(Self { http, config })
    }

    fn list_url(&self) -> String {
        format!(
            "{}/user/{}/hosts/{}/query-analytics/list",
            self.config.base_url, self.config.user_id, self.config.host_id
        )
    }

    async fn post_list(&self, request: &ListRequest) -> Result<ListResponse> {
        let start = Instant::now();
        metrics().api_requests.inc();

        let response = self
            .http
            .post(self.list_url())
            .header("Authorization", format!("OAuth {}", self.config.token))
            .json(request)
            .send()
            .await
            .map_err(|e| {
                metrics().api_errors.inc();
                Error::api(format!("request failed: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            metrics().api_errors.inc();
            return Err(Error::api(format!("unexpected status {status}")));
        }

        let body: ListResponse = response.json().await.map_err(|e| {
            metrics().api_errors.inc();
            Error::api(format!("decode failed: {e}"))
        })?;

        metrics()
            .api_latency_ms
            .observe(start.elapsed().as_millis() as u64);

        Ok(body)
    }

    /// Whether the API reports any impressions for `date`.
    pub async fn date_has_data(&self, date: NaiveDate) -> Result<bool> {
        let request = ListRequest {
            offset: None,
            limit: 1,
            text_indicator: "QUERY",
            device_type_indicator: None,
            filters: Filters {
                statistic_filters: vec![StatisticFilter::positive_on("IMPRESSIONS", date)],
                ..Default::default()
            },
        };

        let response = self.post_list(&request).await?;
        Ok(!response.text_indicator_to_statistics.is_empty())
    }

    /// All distinct page URLs with impressions on `date`, paged.
    pub async fn urls_for_date(&self, date: NaiveDate) -> Result<Vec<String>> {
        let mut urls = Vec::new();
        let mut offset = 0i64;

        loop {
            let request = ListRequest {
                offset: Some(offset),
                limit: self.config.page_limit,
                text_indicator: "URL",
                device_type_indicator: None,
                filters: Filters {
                    statistic_filters: vec![StatisticFilter::positive_on("IMPRESSIONS", date)],
                    ..Default::default()
                },
            };

            let response = self.post_list(&request).await?;
            let page = response.text_indicator_to_statistics;
            if page.is_empty() {
                break;
            }

            let page_len = page.len() as i64;
            for item in page {
                let value = item.text_indicator.value;
                if !value.is_empty() && value != "N/A" {
                    urls.push(value);
                }
            }

            if page_len < self.config.page_limit {
                break;
            }
            offset += self.config.page_limit;
        }

        urls.sort();
        urls.dedup();

        debug!(date = %date, urls = urls.len(), "Listed page URLs");
        Ok(urls)
    }

    /// Per-query statistics for one (date, page URL, device) cell.
    pub async fn stats_for_url(
        &self,
        date: NaiveDate,
        page_url: &str,
        device: DeviceType,
    ) -> Result<Vec<NewRawAggregate>> {
        let request = ListRequest {
            offset: None,
            limit: self.config.page_limit,
            text_indicator: "QUERY",
            device_type_indicator: Some(device.api_value()),
            filters: Filters {
                text_filters: vec![TextFilter {
                    text_indicator: "URL",
                    operation: "TEXT_MATCH",
                    value: page_url.to_string(),
                }],
                ..Default::default()
            },
        };

        let response = self.post_list(&request).await?;

        let mut rows = rows_from_response(&response, date, device);
        for row in &mut rows {
            row.page_path = page_url.to_string();
        }

        Ok(rows)
    }
}
