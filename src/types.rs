use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::routing::Classification;

/// EIA period format: UTC hour, e.g. `2024-06-20T12`.
pub const PERIOD_FORMAT: &str = "%Y-%m-%dT%H";

pub fn parse_period(raw: &str) -> Option<DateTime<Utc>> {
    // chrono refuses a time with an hour but no minute, so pin the minute.
    NaiveDateTime::parse_from_str(&format!("{raw}:00"), "%Y-%m-%dT%H:%M")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

pub fn format_period(period: &DateTime<Utc>) -> String {
    period.format(PERIOD_FORMAT).to_string()
}

/// One fuel type's output for one region in one hour.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRecord {
    pub region_id: String,
    pub region_name: String,
    pub fuel_type: String,
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegionSummary {
    pub region_id: String,
    pub region_name: String,
    pub period: DateTime<Utc>,
    pub total_energy: f64,
    pub clean_fraction: f64,
    pub classification: Classification,
}

/// Wire payload published once per region per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationMessage {
    #[serde(rename = "entity")]
    pub region_id: String,
    #[serde(rename = "name")]
    pub region_name: String,
    pub period: String,
    pub total_energy: f64,
    pub pct_clean: String,
}

impl From<&RegionSummary> for NotificationMessage {
    fn from(summary: &RegionSummary) -> Self {
        Self {
            region_id: summary.region_id.clone(),
            region_name: summary.region_name.clone(),
            period: format_period(&summary.period),
            total_energy: summary.total_energy,
            pct_clean: summary.clean_fraction.to_string(),
        }
    }
}
