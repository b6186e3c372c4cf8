use futures::StreamExt;
use std::io::{self, Write};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use insight_stream::config::AppConfig;
use insight_stream::{InsightStream, OutputRow, ProgressEvent, ReqwestFetcher};

fn setup_logging(config: &AppConfig) {
    let filter = EnvFilter::try_new(format!(
        "{level},hyper=warn,reqwest=warn",
        level = config.log.level
    ))
    .unwrap_or_else(|_| EnvFilter::new(&config.log.level));

    // stdout carries the rows, logs go to stderr
    match config.log.format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(io::stderr)
                        .with_target(false)
                        .with_file(true)
                        .with_line_number(true)
                        .with_current_span(true)
                        .with_span_list(true),
                )
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(io::stderr)
                        .with_target(true)
                        .with_file(true)
                        .with_line_number(true),
                )
                .init();
        }
    }
}

fn write_rows(out: &mut impl Write, rows: &[OutputRow]) -> anyhow::Result<()> {
    for row in rows {
        serde_json::to_writer(&mut *out, row)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::new().map_err(|e| {
        anyhow::anyhow!(
            "Failed to load configuration: {e}. Please check your environment variables and configuration."
        )
    })?;

    setup_logging(&config);

    info!("Starting insight-stream v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Config loaded: node={}, metrics={}, period={}, pastdays={}",
        config.insights.node,
        config.insights.metrics.len(),
        config.insights.period,
        config.insights.pastdays
    );

    let fetcher = Arc::new(ReqwestFetcher::new(config.graph.timeout_secs)?);
    let mut stream = InsightStream::new(config.source_options(), fetcher);

    let mut progress = stream.subscribe_progress();
    let last_progress = tokio::spawn(async move {
        let mut last: Option<ProgressEvent> = None;
        while let Some(event) = progress.recv().await {
            last = Some(event);
        }
        last
    });

    let mut rows_written = 0usize;
    let mut failure = None;
    while let Some(unit) = stream.next().await {
        match unit {
            Ok(rows) => {
                write_rows(&mut io::stdout().lock(), &rows)?;
                rows_written += rows.len();
            }
            Err(e) => {
                error!("Insights run aborted: {e}");
                failure = Some(e);
            }
        }
    }
    drop(stream);

    let last = last_progress.await.ok().flatten();
    info!(
        "Finished: {}/{} {}s, {} rows",
        last.as_ref().map(|e| e.loaded).unwrap_or(0),
        last.as_ref().map(|e| e.total).unwrap_or(0),
        config.insights.node,
        rows_written
    );

    match failure {
        Some(e) => Err(anyhow::Error::new(e).context("Insights run aborted")),
        None => Ok(()),
    }
}
