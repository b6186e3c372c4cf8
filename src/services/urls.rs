use chrono::{DateTime, Utc};

use crate::models::insights::NodeKind;

pub const DEFAULT_GRAPH_BASE_URL: &str = "https://graph.facebook.com/v2.5";

const ID_PLACEHOLDER: &str = "{id}";
const METRIC_PLACEHOLDER: &str = "{metric}";
const TOKEN_PARAM: &str = "access_token=";

/// The `since`/`until` range shared by every metric request of a run, in
/// Unix seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub since: i64,
    pub until: i64,
}

impl TimeWindow {
    pub fn ending_at(until: DateTime<Utc>, pastdays: u32) -> Self {
        let since = until - chrono::Duration::days(i64::from(pastdays));
        Self {
            since: since.timestamp(),
            until: until.timestamp(),
        }
    }

    pub fn ending_now(pastdays: u32) -> Self {
        Self::ending_at(Utc::now(), pastdays)
    }
}

/// Request URL shared by all metric fetches of a run, with `{id}` and
/// `{metric}` left to fill in per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricUrlTemplate {
    template: String,
}

impl MetricUrlTemplate {
    pub fn new(
        base_url: &str,
        node: NodeKind,
        token: &str,
        period: &str,
        window: TimeWindow,
    ) -> Self {
        let path = [
            base_url.trim_end_matches('/'),
            ID_PLACEHOLDER,
            node.edge(),
            METRIC_PLACEHOLDER,
        ]
        .join("/");
        let query = format!(
            "{}{}&period={}&since={}&until={}",
            TOKEN_PARAM, token, period, window.since, window.until
        );

        Self {
            template: format!("{}?{}", path, query),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }

    pub fn render(&self, id: &str, metric: &str) -> String {
        self.template
            .replacen(ID_PLACEHOLDER, id, 1)
            .replacen(METRIC_PLACEHOLDER, metric, 1)
    }
}

pub fn lookup_url(base_url: &str, id: &str, token: &str) -> String {
    format!("{}/{}?{}{}", base_url.trim_end_matches('/'), id, TOKEN_PARAM, token)
}

/// Masks the access token so URLs can be logged.
pub fn redact(url: &str) -> String {
    let Some(start) = url.find(TOKEN_PARAM).map(|idx| idx + TOKEN_PARAM.len()) else {
        return url.to_string();
    };
    let end = url[start..]
        .find('&')
        .map(|offset| start + offset)
        .unwrap_or(url.len());

    format!("{}***{}", &url[..start], &url[end..])
}
