// Shared helpers for Graph API mocks
use insight_stream::services::urls::TimeWindow;
use insight_stream::{InsightStream, NodeKind, ReqwestFetcher, SourceOptions};
use serde_json::{json, Value};
use std::sync::Arc;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TEST_TOKEN: &str = "test-token";
pub const TEST_WINDOW: TimeWindow = TimeWindow {
    since: 1704067200,
    until: 1706659200,
};

/// Mounts the name lookup for one node.
pub async fn mount_entity(server: &MockServer, id: &str, name: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/{id}")))
        .and(query_param("access_token", TEST_TOKEN))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": id, "name": name})))
        .mount(server)
        .await;
}

pub async fn mount_metric(server: &MockServer, node: NodeKind, id: &str, metric: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path(format!("/{id}/{}/{metric}", node.edge())))
        .and(query_param("access_token", TEST_TOKEN))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

pub async fn mount_error(server: &MockServer, request_path: &str, status: u16, message: &str) {
    Mock::given(method("GET"))
        .and(path(request_path.to_string()))
        .respond_with(ResponseTemplate::new(status).set_body_json(json!({
            "error": {
                "message": message,
                "type": "OAuthException",
                "code": 100,
                "fbtrace_id": "A1b2C3"
            }
        })))
        .mount(server)
        .await;
}

/// Page insights shape: one datum wrapping the series in `values`.
pub fn page_series(metric: &str, points: Value) -> Value {
    json!({
        "data": [{
            "name": metric,
            "period": "day",
            "values": points,
            "title": "Daily",
            "id": format!("111/insights/{metric}/day")
        }],
        "paging": {"previous": "", "next": ""}
    })
}

pub fn options(server: &MockServer, node: NodeKind, items: &[&str], metrics: &[&str]) -> SourceOptions {
    SourceOptions::new(
        node,
        TEST_TOKEN,
        items.iter().map(|s| s.to_string()).collect::<Vec<_>>(),
    )
    .with_metrics(metrics.iter().copied())
    .with_base_url(server.uri())
    .with_window(TEST_WINDOW)
}

pub fn stream_for(options: SourceOptions) -> InsightStream {
    let fetcher = ReqwestFetcher::new(5).expect("HTTP client should build in tests");
    InsightStream::new(options, Arc::new(fetcher))
}

/// Paths of every request the mock server has seen, in arrival order.
pub async fn received_paths(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|r| r.url.path().to_string())
        .collect()
}
