use config::{Config, ConfigError};
use serde::Deserialize;
use std::env;
use std::path::Path;
use validator::Validate;

use crate::error::{InsightError, InsightResult};
use crate::models::insights::NodeKind;
use crate::services::fetcher::DEFAULT_FETCH_TIMEOUT_SECS;
use crate::services::resolver::{ItemSource, DEFAULT_RESOLVE_CONCURRENCY};
use crate::services::urls::DEFAULT_GRAPH_BASE_URL;
use crate::source::SourceOptions;

const DEFAULT_PERIOD: &str = "day";
const DEFAULT_PASTDAYS: u32 = 30;

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct GraphConfig {
    #[validate(length(min = 1))]
    pub base_url: String,
    #[validate(range(min = 1))]
    pub timeout_secs: u64,
    #[validate(range(min = 1))]
    pub resolve_concurrency: usize,
}

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct InsightsConfig {
    pub node: NodeKind,
    #[validate(length(min = 1))]
    pub token: String,
    #[serde(default)]
    pub metrics: Vec<String>,
    #[validate(length(min = 1))]
    pub period: String,
    #[validate(range(min = 1))]
    pub pastdays: u32,
    #[serde(default)]
    pub items: Vec<String>,
    pub items_file: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct LogConfig {
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_format() -> String {
    "pretty".to_string()
}

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct AppConfig {
    #[validate(nested)]
    pub graph: GraphConfig,
    #[validate(nested)]
    pub insights: InsightsConfig,
    #[validate(nested)]
    pub log: LogConfig,
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// One identifier per line; blank lines and `#` comments are ignored.
pub fn parse_item_lines(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

async fn read_items_file(path: String) -> InsightResult<Vec<String>> {
    let contents = tokio::fs::read_to_string(&path)
        .await
        .map_err(|e| InsightError::ItemSource(format!("Failed to read {}: {}", path, e)))?;
    Ok(parse_item_lines(&contents))
}

impl AppConfig {
    pub fn new() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let s = Config::builder()
            .set_default("graph.base_url", DEFAULT_GRAPH_BASE_URL)?
            .set_default("graph.timeout_secs", DEFAULT_FETCH_TIMEOUT_SECS)?
            .set_default("graph.resolve_concurrency", DEFAULT_RESOLVE_CONCURRENCY as i64)?
            .set_default("insights.node", "page")?
            .set_default("insights.token", "")?
            .set_default("insights.period", DEFAULT_PERIOD)?
            .set_default("insights.pastdays", i64::from(DEFAULT_PASTDAYS))?
            .set_default("log.level", "info")?
            .set_default("log.format", "pretty")?
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option(
                "insights.metrics",
                env::var("APP_INSIGHTS__METRICS").ok().map(|v| parse_list(&v)),
            )?
            .set_override_option(
                "insights.items",
                env::var("APP_INSIGHTS__ITEMS").ok().map(|v| parse_list(&v)),
            )?
            .set_override_option("insights.token", env::var("FACEBOOK_ACCESS_TOKEN").ok())?
            .build()?;

        let config: AppConfig = s.try_deserialize()?;

        if let Err(e) = config.validate() {
            return Err(ConfigError::Message(format!("Validation error: {}", e)));
        }

        if config.insights.items.is_empty() && config.insights.items_file.is_none() {
            return Err(ConfigError::Message(
                "Missing configuration: Must provide either APP_INSIGHTS__ITEMS or APP_INSIGHTS__ITEMS_FILE".into(),
            ));
        }

        if let Some(file) = &config.insights.items_file {
            if !Path::new(file).is_file() {
                return Err(ConfigError::Message(format!(
                    "Items file does not exist: {}",
                    file
                )));
            }
        }

        Ok(config)
    }

    /// Run options for the insights source. An items file takes precedence
    /// over inline items and is read lazily, on the first pull.
    pub fn source_options(&self) -> SourceOptions {
        let items = match &self.insights.items_file {
            Some(path) => ItemSource::deferred(read_items_file(path.clone())),
            None => ItemSource::Items(self.insights.items.clone()),
        };

        SourceOptions::new(self.insights.node, self.insights.token.clone(), items)
            .with_metrics(self.insights.metrics.iter().cloned())
            .with_period(self.insights.period.clone())
            .with_pastdays(self.insights.pastdays)
            .with_base_url(self.graph.base_url.clone())
            .with_resolve_concurrency(self.graph.resolve_concurrency)
    }
}
