use std::collections::BTreeMap;

use crate::error::{ConfigError, RegionError};
use crate::fuel::{EnergyClass, FuelType};
use crate::routing::classify;
use crate::types::{format_period, GenerationRecord, RegionSummary};

/// Outcome of one aggregation run. Summaries are ordered by region id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregation {
    pub summaries: Vec<RegionSummary>,
    pub skipped: Vec<RegionError>,
}

/// Summarise a batch of generation records per region.
///
/// Each region is reduced to its own latest hour in the batch; earlier hours
/// are ignored so a partially reported hour is never mixed with a complete one.
/// Any fuel code outside the classification table fails the whole batch.
pub fn aggregate(records: &[GenerationRecord]) -> Result<Aggregation, ConfigError> {
    let mut by_region: BTreeMap<&str, Vec<(&GenerationRecord, EnergyClass)>> = BTreeMap::new();
    for record in records {
        let class = record.fuel_type.parse::<FuelType>()?.class();
        by_region
            .entry(record.region_id.as_str())
            .or_default()
            .push((record, class));
    }

    let mut aggregation = Aggregation::default();
    for (region_id, rows) in by_region {
        match summarize_region(region_id, &rows) {
            Ok(summary) => aggregation.summaries.push(summary),
            Err(err) => aggregation.skipped.push(err),
        }
    }
    Ok(aggregation)
}

fn summarize_region(
    region_id: &str,
    rows: &[(&GenerationRecord, EnergyClass)],
) -> Result<RegionSummary, RegionError> {
    // rows is never empty: regions only exist because a record named them
    let period = rows
        .iter()
        .map(|(record, _)| record.timestamp)
        .max()
        .unwrap_or_default();

    let latest: Vec<_> = rows
        .iter()
        .filter(|(record, _)| record.timestamp == period)
        .collect();

    if latest
        .iter()
        .any(|(record, _)| !record.value.is_finite() || record.value < 0.0)
    {
        return Err(RegionError::InvalidEnergy {
            region_id: region_id.to_string(),
            period: format_period(&period),
        });
    }

    let total_energy = ordered_sum(latest.iter().map(|(record, _)| record.value));
    let clean_energy = ordered_sum(
        latest
            .iter()
            .filter(|(_, class)| *class == EnergyClass::Clean)
            .map(|(record, _)| record.value),
    );

    if total_energy == 0.0 {
        return Err(RegionError::ZeroTotalEnergy {
            region_id: region_id.to_string(),
            period: format_period(&period),
        });
    }

    let clean_fraction = clean_energy / total_energy;
    if !total_energy.is_finite() || !clean_fraction.is_finite() {
        // finite inputs can still overflow the sum
        return Err(RegionError::InvalidEnergy {
            region_id: region_id.to_string(),
            period: format_period(&period),
        });
    }

    let region_name = latest
        .first()
        .map(|(record, _)| record.region_name.clone())
        .unwrap_or_default();

    Ok(RegionSummary {
        region_id: region_id.to_string(),
        region_name,
        period,
        total_energy,
        clean_fraction,
        classification: classify(clean_fraction),
    })
}

/// Floating point addition is not associative; sorting first makes the sum
/// independent of the order records arrived in.
fn ordered_sum(values: impl Iterator<Item = f64>) -> f64 {
    let mut values: Vec<f64> = values.collect();
    values.sort_by(f64::total_cmp);
    values.into_iter().sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::Classification;
    use crate::types::parse_period;

    fn record(region: &str, fuel: &str, period: &str, value: f64) -> GenerationRecord {
        GenerationRecord {
            region_id: region.to_string(),
            region_name: format!("{region} Operator"),
            fuel_type: fuel.to_string(),
            timestamp: parse_period(period).unwrap(),
            value,
        }
    }

    #[test]
    fn nuclear_and_coal_scenario() {
        let records = vec![
            record("ABC", "NUC", "2024-06-20T12", 300.0),
            record("ABC", "COL", "2024-06-20T12", 100.0),
        ];
        let aggregation = aggregate(&records).unwrap();
        assert!(aggregation.skipped.is_empty());
        let summary = &aggregation.summaries[0];
        assert_eq!(summary.total_energy, 400.0);
        assert_eq!(summary.clean_fraction, 0.75);
        assert_eq!(summary.classification, Classification::Clean);
        assert_eq!(summary.classification.topic(), "clean-power");
        assert_eq!(summary.period, parse_period("2024-06-20T12").unwrap());
    }

    #[test]
    fn unknown_counts_toward_total_only() {
        let records = vec![
            record("ABC", "SUN", "2024-06-20T12", 50.0),
            record("ABC", "OTH", "2024-06-20T12", 50.0),
        ];
        let summary = &aggregate(&records).unwrap().summaries[0];
        assert_eq!(summary.total_energy, 100.0);
        assert_eq!(summary.clean_fraction, 0.5);
        assert_eq!(summary.classification, Classification::Fossil);
    }

    #[test]
    fn only_latest_period_is_summed() {
        let records = vec![
            record("ABC", "COL", "2024-06-20T11", 1000.0),
            record("ABC", "WND", "2024-06-20T11", 5.0),
            record("ABC", "WND", "2024-06-20T12", 60.0),
            record("ABC", "NG", "2024-06-20T12", 40.0),
        ];
        let summary = &aggregate(&records).unwrap().summaries[0];
        assert_eq!(summary.period, parse_period("2024-06-20T12").unwrap());
        assert_eq!(summary.total_energy, 100.0);
        assert_eq!(summary.clean_fraction, 0.6);
    }

    #[test]
    fn regions_keep_their_own_period() {
        let records = vec![
            record("AAA", "NUC", "2024-06-20T12", 10.0),
            record("BBB", "COL", "2024-06-20T09", 10.0),
        ];
        let aggregation = aggregate(&records).unwrap();
        let periods: Vec<_> = aggregation
            .summaries
            .iter()
            .map(|s| (s.region_id.as_str(), format_period(&s.period)))
            .collect();
        assert_eq!(
            periods,
            [("AAA", "2024-06-20T12".to_string()), ("BBB", "2024-06-20T09".to_string())]
        );
    }

    #[test]
    fn result_is_independent_of_input_order() {
        let mut records = vec![
            record("ABC", "NUC", "2024-06-20T12", 0.1),
            record("ABC", "WAT", "2024-06-20T12", 0.2),
            record("ABC", "COL", "2024-06-20T12", 0.3),
            record("ABC", "SUN", "2024-06-20T12", 1e16),
            record("ABC", "NG", "2024-06-20T12", 1.0),
        ];
        let forward = aggregate(&records).unwrap();
        records.reverse();
        let backward = aggregate(&records).unwrap();
        records.swap(0, 3);
        let shuffled = aggregate(&records).unwrap();
        assert_eq!(forward, backward);
        assert_eq!(forward, shuffled);
    }

    #[test]
    fn zero_total_skips_only_that_region() {
        let records = vec![
            record("ABC", "NUC", "2024-06-20T12", 0.0),
            record("ABC", "COL", "2024-06-20T12", 0.0),
            record("XYZ", "COL", "2024-06-20T12", 10.0),
        ];
        let aggregation = aggregate(&records).unwrap();
        assert_eq!(aggregation.summaries.len(), 1);
        assert_eq!(aggregation.summaries[0].region_id, "XYZ");
        assert_eq!(
            aggregation.skipped,
            [RegionError::ZeroTotalEnergy {
                region_id: "ABC".to_string(),
                period: "2024-06-20T12".to_string(),
            }]
        );
    }

    #[test]
    fn non_finite_or_negative_values_skip_the_region() {
        for bad in [f64::NAN, f64::INFINITY, -5.0] {
            let records = vec![
                record("ABC", "NUC", "2024-06-20T12", bad),
                record("ABC", "COL", "2024-06-20T12", 5.0),
                record("XYZ", "WND", "2024-06-20T12", 10.0),
            ];
            let aggregation = aggregate(&records).unwrap();
            assert_eq!(aggregation.summaries.len(), 1);
            assert_eq!(aggregation.summaries[0].region_id, "XYZ");
            assert_eq!(
                aggregation.skipped,
                [RegionError::InvalidEnergy {
                    region_id: "ABC".to_string(),
                    period: "2024-06-20T12".to_string(),
                }]
            );
        }
    }

    #[test]
    fn bad_value_in_an_older_hour_is_ignored() {
        let records = vec![
            record("ABC", "NUC", "2024-06-20T11", f64::NAN),
            record("ABC", "NUC", "2024-06-20T12", 30.0),
            record("ABC", "COL", "2024-06-20T12", 10.0),
        ];
        let aggregation = aggregate(&records).unwrap();
        assert!(aggregation.skipped.is_empty());
        assert_eq!(aggregation.summaries[0].clean_fraction, 0.75);
    }

    #[test]
    fn overflowing_total_skips_the_region() {
        let records = vec![
            record("ABC", "NUC", "2024-06-20T12", f64::MAX),
            record("ABC", "COL", "2024-06-20T12", f64::MAX),
        ];
        let aggregation = aggregate(&records).unwrap();
        assert!(aggregation.summaries.is_empty());
        assert!(matches!(aggregation.skipped[0], RegionError::InvalidEnergy { .. }));
    }

    #[test]
    fn unmapped_fuel_aborts_the_run() {
        let records = vec![
            record("ABC", "NUC", "2024-06-20T12", 300.0),
            record("XYZ", "BAT", "2024-06-20T08", 1.0),
        ];
        assert_eq!(
            aggregate(&records),
            Err(ConfigError::UnknownFuelType("BAT".to_string()))
        );
    }

    #[test]
    fn empty_batch_yields_nothing() {
        assert_eq!(aggregate(&[]).unwrap(), Aggregation::default());
    }
}
