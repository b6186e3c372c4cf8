use serde_json::Value;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::error::InsightResult;
use crate::models::insights::{DateKey, InsightsPayload, NodeKind, OutputRow, ResolvedEntity};
use crate::services::classifier::classify_as;
use crate::services::fetcher::HttpFetcher;
use crate::services::urls::MetricUrlTemplate;

/// Result of one metric step that lets collection continue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricOutcome {
    /// Number of points written into the buffer.
    Merged(usize),
    /// The metric returned no points and contributes nothing.
    Skipped,
}

/// Per-date accumulator for a single entity.
#[derive(Debug, Default)]
pub struct RowBuffer {
    rows: BTreeMap<DateKey, BTreeMap<String, Value>>,
}

impl RowBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, date: DateKey, metric: &str, value: Value) {
        self.rows
            .entry(date)
            .or_default()
            .insert(metric.to_string(), value);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// One row per date, ordered by date key.
    pub fn into_rows(self, node: NodeKind, entity: &ResolvedEntity) -> Vec<OutputRow> {
        self.rows
            .into_iter()
            .map(|(date, values)| OutputRow {
                date,
                node,
                entity_id: entity.id.clone(),
                entity_name: entity.name.clone(),
                values,
            })
            .collect()
    }
}

/// Fetches every metric of one entity in order and folds the series into
/// rows keyed by date.
#[derive(Clone)]
pub struct MetricCollector {
    fetcher: Arc<dyn HttpFetcher>,
    node: NodeKind,
    template: Arc<MetricUrlTemplate>,
}

impl MetricCollector {
    pub fn new(fetcher: Arc<dyn HttpFetcher>, node: NodeKind, template: MetricUrlTemplate) -> Self {
        Self {
            fetcher,
            node,
            template: Arc::new(template),
        }
    }

    pub fn node(&self) -> NodeKind {
        self.node
    }

    /// Metrics are fetched one after another; an empty series is skipped,
    /// any other failure stops the entity and is returned as is.
    pub async fn collect(
        &self,
        entity: &ResolvedEntity,
        mut metrics: VecDeque<String>,
    ) -> InsightResult<Vec<OutputRow>> {
        let mut buffer = RowBuffer::new();

        while let Some(metric) = metrics.pop_front() {
            match self.collect_metric(entity, &metric, &mut buffer).await {
                Ok(MetricOutcome::Merged(points)) => {
                    debug!("{} {}: merged {} points", entity.id, metric, points);
                }
                Ok(MetricOutcome::Skipped) => {
                    debug!("{} {}: no data found, skipping", entity.id, metric);
                }
                Err(e) => {
                    error!(
                        "{} {}: collection aborted with {} metrics left: {}",
                        entity.id,
                        metric,
                        metrics.len(),
                        e
                    );
                    return Err(e);
                }
            }
        }

        let rows = buffer.into_rows(self.node, entity);
        info!(
            "Collected {} rows for {} {} ({})",
            rows.len(),
            self.node,
            entity.id,
            entity.name
        );
        Ok(rows)
    }

    async fn collect_metric(
        &self,
        entity: &ResolvedEntity,
        metric: &str,
        buffer: &mut RowBuffer,
    ) -> InsightResult<MetricOutcome> {
        let url = self.template.render(&entity.id, metric);
        let response = self.fetcher.fetch(&url).await?;
        let payload: InsightsPayload = classify_as(response)?;

        let points = payload.value_points();
        if points.is_empty() {
            return Ok(MetricOutcome::Skipped);
        }

        let mut merged = 0;
        for point in points {
            match point.date_key() {
                Some(date) => {
                    buffer.insert(date, metric, point.value);
                    merged += 1;
                }
                None => warn!(
                    "{} {}: dropping point without end_time or time",
                    entity.id, metric
                ),
            }
        }

        Ok(MetricOutcome::Merged(merged))
    }
}
