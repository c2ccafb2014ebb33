use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::EiaError;
use crate::types::{format_period, parse_period, GenerationRecord};

#[derive(Debug, Deserialize)]
struct EiaEnvelope {
    response: EiaResponse,
}

#[derive(Debug, Deserialize)]
struct EiaResponse {
    #[serde(default)]
    total: Option<Value>,
    #[serde(default)]
    data: Vec<EiaRecord>,
}

#[derive(Debug, Deserialize)]
struct EiaRecord {
    period: String,
    respondent: String,
    #[serde(rename = "respondent-name")]
    respondent_name: String,
    fueltype: String,
    #[serde(default)]
    value: Value,
}

impl EiaRecord {
    fn into_record(self) -> Result<GenerationRecord, EiaError> {
        let timestamp = parse_period(&self.period).ok_or_else(|| EiaError::InvalidPeriod(self.period.clone()))?;
        Ok(GenerationRecord {
            region_id: self.respondent,
            region_name: self.respondent_name,
            fuel_type: self.fueltype,
            timestamp,
            value: parse_value(&self.value)?,
        })
    }
}

/// EIA sends values as numbers or numeric strings, and null for unreported hours.
/// Anything that is not a finite number is rejected.
fn parse_value(value: &Value) -> Result<f64, EiaError> {
    let parsed = match value {
        Value::Null => return Ok(0.0),
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .filter(|value| value.is_finite())
        .ok_or_else(|| EiaError::InvalidValue(display_raw(value)))
}

fn display_raw(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn parse_total(total: Option<&Value>) -> Option<usize> {
    match total? {
        Value::Number(number) => number.as_u64().map(|n| n as usize),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

#[derive(Clone)]
pub struct EiaClient {
    client: Client,
    url: String,
    api_key: String,
    page_length: usize,
}

impl EiaClient {
    pub fn new(url: &str, api_key: &str, page_length: usize, timeout: Duration) -> Result<Self, EiaError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.to_string(),
            api_key: api_key.to_string(),
            page_length: page_length.max(1),
        })
    }

    /// Fetch every hourly record from `start` onwards, newest first, following pages.
    pub async fn fetch_since(&self, start: DateTime<Utc>) -> Result<Vec<GenerationRecord>, EiaError> {
        let start = format_period(&start);
        let mut records = Vec::new();

        loop {
            let page = self.fetch_page(&start, records.len()).await?;
            let total = parse_total(page.total.as_ref());
            let received = page.data.len();
            for raw in page.data {
                records.push(raw.into_record()?);
            }
            debug!(offset = records.len() - received, received, ?total, "Fetched EIA page");

            let more = total.is_some_and(|total| records.len() < total);
            if received == 0 || !more {
                break;
            }
        }

        info!(records = records.len(), start = %start, "Fetched generation data from EIA");
        Ok(records)
    }

    /// Records for the current UTC day.
    pub async fn fetch_today(&self) -> Result<Vec<GenerationRecord>, EiaError> {
        self.fetch_since(start_of_day(Utc::now())).await
    }

    async fn fetch_page(&self, start: &str, offset: usize) -> Result<EiaResponse, EiaError> {
        let length = self.page_length.to_string();
        let offset = offset.to_string();
        let response = self
            .client
            .get(&self.url)
            .query(&[
                ("api_key", self.api_key.as_str()),
                ("frequency", "hourly"),
                ("data[0]", "value"),
                ("start", start),
                ("sort[0][column]", "period"),
                ("sort[0][direction]", "desc"),
                ("length", length.as_str()),
                ("offset", offset.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(EiaError::Status(response.status()));
        }

        let envelope: EiaEnvelope = response.json().await?;
        Ok(envelope.response)
    }
}

pub fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive().and_hms_opt(0, 0, 0).map(|naive| naive.and_utc()).unwrap_or(now)
}
