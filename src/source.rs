use futures::future::BoxFuture;
use futures::stream::{FusedStream, Stream};
use futures::FutureExt;
use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tracing::{debug, error, info, info_span, Span};
use uuid::Uuid;

use crate::error::InsightResult;
use crate::models::insights::{NodeKind, OutputRow, ProgressEvent, ResolvedEntity};
use crate::services::collector::MetricCollector;
use crate::services::fetcher::HttpFetcher;
use crate::services::resolver::{EntityResolver, ItemSource, DEFAULT_RESOLVE_CONCURRENCY};
use crate::services::urls::{redact, MetricUrlTemplate, TimeWindow, DEFAULT_GRAPH_BASE_URL};

const DEFAULT_PERIOD: &str = "day";
const DEFAULT_PASTDAYS: u32 = 30;

/// Everything one run needs. Read once; the stream owns it afterwards.
#[derive(Debug)]
pub struct SourceOptions {
    pub node: NodeKind,
    pub token: String,
    pub metrics: Vec<String>,
    pub period: String,
    pub pastdays: u32,
    pub items: ItemSource,
    pub base_url: String,
    pub resolve_concurrency: usize,
    /// Fixed request window. Computed on the first pull when `None`.
    pub window: Option<TimeWindow>,
}

impl SourceOptions {
    pub fn new(node: NodeKind, token: impl Into<String>, items: impl Into<ItemSource>) -> Self {
        Self {
            node,
            token: token.into(),
            metrics: Vec::new(),
            period: DEFAULT_PERIOD.to_string(),
            pastdays: DEFAULT_PASTDAYS,
            items: items.into(),
            base_url: DEFAULT_GRAPH_BASE_URL.to_string(),
            resolve_concurrency: DEFAULT_RESOLVE_CONCURRENCY,
            window: None,
        }
    }

    pub fn with_metrics<I, S>(mut self, metrics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.metrics = metrics.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_period(mut self, period: impl Into<String>) -> Self {
        self.period = period.into();
        self
    }

    pub fn with_pastdays(mut self, pastdays: u32) -> Self {
        self.pastdays = pastdays;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_resolve_concurrency(mut self, concurrency: usize) -> Self {
        self.resolve_concurrency = concurrency;
        self
    }

    pub fn with_window(mut self, window: TimeWindow) -> Self {
        self.window = Some(window);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    Uninitialized,
    Resolving,
    Ready,
    Draining,
    Done,
    Errored,
}

enum Phase {
    Uninitialized,
    Resolving {
        resolving: BoxFuture<'static, InsightResult<Vec<ResolvedEntity>>>,
        collector: MetricCollector,
    },
    Ready {
        collector: MetricCollector,
    },
    Draining {
        collecting: BoxFuture<'static, InsightResult<Vec<OutputRow>>>,
        collector: MetricCollector,
    },
    Done,
    Errored,
}

impl Phase {
    fn state(&self) -> SourceState {
        match self {
            Phase::Uninitialized => SourceState::Uninitialized,
            Phase::Resolving { .. } => SourceState::Resolving,
            Phase::Ready { .. } => SourceState::Ready,
            Phase::Draining { .. } => SourceState::Draining,
            Phase::Done => SourceState::Done,
            Phase::Errored => SourceState::Errored,
        }
    }
}

/// Pull-driven insights source. Each poll that finds no unit in flight
/// starts work for exactly one entity and yields that entity's rows; nothing
/// is fetched until the consumer asks for it.
///
/// The first poll resolves the item list. A fatal error is yielded once,
/// after which the stream is terminated.
pub struct InsightStream {
    fetcher: Arc<dyn HttpFetcher>,
    node: NodeKind,
    token: String,
    metrics: Vec<String>,
    period: String,
    pastdays: u32,
    base_url: String,
    resolve_concurrency: usize,
    window: Option<TimeWindow>,
    items: Option<ItemSource>,
    phase: Phase,
    queue: VecDeque<ResolvedEntity>,
    total: usize,
    loaded: usize,
    progress: Option<mpsc::UnboundedSender<ProgressEvent>>,
    span: Span,
}

impl InsightStream {
    pub fn new(options: SourceOptions, fetcher: Arc<dyn HttpFetcher>) -> Self {
        let SourceOptions {
            node,
            token,
            metrics,
            period,
            pastdays,
            items,
            base_url,
            resolve_concurrency,
            window,
        } = options;
        let span = info_span!("insight_stream", run_id = %Uuid::new_v4(), %node);

        Self {
            fetcher,
            node,
            token,
            metrics,
            period,
            pastdays,
            base_url,
            resolve_concurrency,
            window,
            items: Some(items),
            phase: Phase::Uninitialized,
            queue: VecDeque::new(),
            total: 0,
            loaded: 0,
            progress: None,
            span,
        }
    }

    pub fn with_progress(mut self, sender: mpsc::UnboundedSender<ProgressEvent>) -> Self {
        self.progress = Some(sender);
        self
    }

    /// Attaches a fresh progress channel and returns its receiving end.
    pub fn subscribe_progress(&mut self) -> mpsc::UnboundedReceiver<ProgressEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.progress = Some(tx);
        rx
    }

    pub fn state(&self) -> SourceState {
        self.phase.state()
    }

    pub fn node(&self) -> NodeKind {
        self.node
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn loaded(&self) -> usize {
        self.loaded
    }

    fn start_resolution(&mut self) -> Phase {
        let window = self
            .window
            .unwrap_or_else(|| TimeWindow::ending_now(self.pastdays));
        let template =
            MetricUrlTemplate::new(&self.base_url, self.node, &self.token, &self.period, window);
        debug!("Metric URL template: {}", redact(template.as_str()));

        let collector = MetricCollector::new(self.fetcher.clone(), self.node, template);
        let resolver = EntityResolver::new(
            self.fetcher.clone(),
            self.base_url.clone(),
            self.token.clone(),
            self.resolve_concurrency,
        );
        let items = self
            .items
            .take()
            .unwrap_or_else(|| ItemSource::Items(Vec::new()));

        Phase::Resolving {
            resolving: async move { resolver.resolve(items).await }.boxed(),
            collector,
        }
    }

    fn start_collection(&self, collector: MetricCollector, entity: ResolvedEntity) -> Phase {
        info!(
            "Collecting {} metrics for {} {} ({}/{})",
            self.metrics.len(),
            self.node,
            entity.id,
            self.loaded + 1,
            self.total
        );
        let metrics: VecDeque<String> = self.metrics.iter().cloned().collect();
        let task = collector.clone();

        Phase::Draining {
            collecting: async move { task.collect(&entity, metrics).await }.boxed(),
            collector,
        }
    }

    fn report_progress(&mut self) {
        self.loaded += 1;
        let event = ProgressEvent::new(self.node, self.total, self.loaded);
        info!("Progress {}/{}: {}", event.loaded, event.total, event.message);

        if let Some(sender) = &self.progress {
            if sender.send(event).is_err() {
                debug!("Progress receiver dropped");
                self.progress = None;
            }
        }
    }
}

impl Stream for InsightStream {
    type Item = InsightResult<Vec<OutputRow>>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let span = this.span.clone();
        let _entered = span.enter();

        loop {
            // Errored is left in place whenever a branch returns without restoring.
            match std::mem::replace(&mut this.phase, Phase::Errored) {
                Phase::Uninitialized => {
                    this.phase = this.start_resolution();
                }
                Phase::Resolving {
                    mut resolving,
                    collector,
                } => match resolving.poll_unpin(cx) {
                    Poll::Pending => {
                        this.phase = Phase::Resolving {
                            resolving,
                            collector,
                        };
                        return Poll::Pending;
                    }
                    Poll::Ready(Ok(entities)) => {
                        this.total = entities.len();
                        this.loaded = 0;
                        this.queue = entities.into();
                        info!("Resolved {} {}s", this.total, this.node);
                        this.phase = Phase::Ready { collector };
                    }
                    Poll::Ready(Err(e)) => {
                        error!("Item resolution failed: {}", e);
                        return Poll::Ready(Some(Err(e)));
                    }
                },
                Phase::Ready { collector } => match this.queue.pop_front() {
                    Some(entity) => {
                        this.phase = this.start_collection(collector, entity);
                    }
                    None => {
                        info!("All {} {}s collected", this.total, this.node);
                        this.phase = Phase::Done;
                        return Poll::Ready(None);
                    }
                },
                Phase::Draining {
                    mut collecting,
                    collector,
                } => match collecting.poll_unpin(cx) {
                    Poll::Pending => {
                        this.phase = Phase::Draining {
                            collecting,
                            collector,
                        };
                        return Poll::Pending;
                    }
                    Poll::Ready(Ok(rows)) => {
                        this.report_progress();
                        this.phase = Phase::Ready { collector };
                        return Poll::Ready(Some(Ok(rows)));
                    }
                    Poll::Ready(Err(e)) => {
                        this.report_progress();
                        if !this.queue.is_empty() {
                            info!("Abandoning {} remaining {}s", this.queue.len(), this.node);
                        }
                        this.queue.clear();
                        return Poll::Ready(Some(Err(e)));
                    }
                },
                Phase::Done => {
                    this.phase = Phase::Done;
                    return Poll::Ready(None);
                }
                Phase::Errored => return Poll::Ready(None),
            }
        }
    }
}

impl FusedStream for InsightStream {
    fn is_terminated(&self) -> bool {
        matches!(self.phase, Phase::Done | Phase::Errored)
    }
}
