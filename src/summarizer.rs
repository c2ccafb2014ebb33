use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::aggregator::aggregate;
use crate::broker::MessageProducer;
use crate::eia::EiaClient;
use crate::error::{RegionError, RunError};
use crate::metrics::REGIONS_SKIPPED_TOTAL;
use crate::publisher::{FlushSummary, Publisher};
use crate::types::{format_period, GenerationRecord, NotificationMessage};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    pub published: usize,
    pub skipped: Vec<RegionError>,
    pub flush: FlushSummary,
}

/// Aggregate a batch and publish one notification per region.
///
/// A configuration error is raised before anything is sent.
pub async fn publish_summaries(
    records: &[GenerationRecord],
    publisher: &mut Publisher,
    flush_timeout: Duration,
) -> Result<RunReport, RunError> {
    let aggregation = aggregate(records)?;

    for skipped in &aggregation.skipped {
        REGIONS_SKIPPED_TOTAL.inc();
        warn!(error = %skipped, "Skipping region");
    }

    let mut published = 0;
    for summary in &aggregation.summaries {
        let topic = summary.classification.topic();
        info!(
            region = %summary.region_id,
            period = %format_period(&summary.period),
            total_energy = summary.total_energy,
            clean_fraction = summary.clean_fraction,
            classification = %summary.classification,
            "Region summarised"
        );
        publisher.send(topic, &NotificationMessage::from(summary))?;
        published += 1;
    }

    let flush = publisher.flush(flush_timeout).await;
    info!(
        published,
        delivered = flush.delivered,
        failed = flush.failed,
        pending = flush.pending,
        "Run flushed"
    );

    Ok(RunReport {
        published,
        skipped: aggregation.skipped,
        flush,
    })
}

pub struct Summarizer {
    eia: EiaClient,
    producer: Arc<dyn MessageProducer>,
    flush_timeout: Duration,
}

impl Summarizer {
    pub fn new(eia: EiaClient, producer: Arc<dyn MessageProducer>, flush_timeout: Duration) -> Self {
        Self {
            eia,
            producer,
            flush_timeout,
        }
    }

    /// One run over today's generation data.
    pub async fn run_once(&self) -> Result<RunReport, RunError> {
        let records = self.eia.fetch_today().await?;
        let mut publisher = Publisher::new(self.producer.clone());
        publish_summaries(&records, &mut publisher, self.flush_timeout).await
    }
}
