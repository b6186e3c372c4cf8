// Configuration loading from the environment

use insight_stream::config::AppConfig;
use insight_stream::NodeKind;

const CONFIG_VARS: &[&str] = &[
    "APP_GRAPH__BASE_URL",
    "APP_GRAPH__TIMEOUT_SECS",
    "APP_GRAPH__RESOLVE_CONCURRENCY",
    "APP_INSIGHTS__NODE",
    "APP_INSIGHTS__TOKEN",
    "APP_INSIGHTS__METRICS",
    "APP_INSIGHTS__PERIOD",
    "APP_INSIGHTS__PASTDAYS",
    "APP_INSIGHTS__ITEMS",
    "APP_INSIGHTS__ITEMS_FILE",
    "APP_LOG__LEVEL",
    "APP_LOG__FORMAT",
    "FACEBOOK_ACCESS_TOKEN",
];

/// Every config variable unset except the given ones.
fn vars<'a>(set: &[(&'a str, &'a str)]) -> Vec<(&'a str, Option<&'a str>)> {
    CONFIG_VARS
        .iter()
        .map(|key| {
            let value = set.iter().find(|(k, _)| k == key).map(|(_, v)| *v);
            (*key, value)
        })
        .collect()
}

#[test]
fn test_defaults_and_lists() {
    let config = temp_env::with_vars(
        vars(&[
            ("APP_INSIGHTS__TOKEN", "tok"),
            ("APP_INSIGHTS__METRICS", "page_views, page_likes"),
            ("APP_INSIGHTS__ITEMS", "111,222"),
        ]),
        AppConfig::new,
    )
    .expect("config should load");

    assert_eq!(config.insights.node, NodeKind::Page);
    assert_eq!(config.insights.token, "tok");
    assert_eq!(config.insights.metrics, vec!["page_views", "page_likes"]);
    assert_eq!(config.insights.items, vec!["111", "222"]);
    assert_eq!(config.insights.period, "day");
    assert_eq!(config.insights.pastdays, 30);
    assert_eq!(config.graph.base_url, "https://graph.facebook.com/v2.5");
    assert_eq!(config.graph.resolve_concurrency, 3);
    assert_eq!(config.graph.timeout_secs, 30);
    assert_eq!(config.log.format, "pretty");
}

#[test]
fn test_app_node_and_overrides() {
    let config = temp_env::with_vars(
        vars(&[
            ("APP_INSIGHTS__NODE", "app"),
            ("APP_INSIGHTS__TOKEN", "from-app"),
            ("FACEBOOK_ACCESS_TOKEN", "from-facebook"),
            ("APP_INSIGHTS__ITEMS", "42"),
            ("APP_INSIGHTS__PERIOD", "week"),
            ("APP_INSIGHTS__PASTDAYS", "7"),
            ("APP_GRAPH__RESOLVE_CONCURRENCY", "5"),
        ]),
        AppConfig::new,
    )
    .expect("config should load");

    assert_eq!(config.insights.node, NodeKind::App);
    assert_eq!(config.insights.token, "from-facebook");
    assert_eq!(config.insights.items, vec!["42"]);
    assert_eq!(config.insights.period, "week");
    assert_eq!(config.insights.pastdays, 7);
    assert_eq!(config.graph.resolve_concurrency, 5);
}

#[test]
fn test_missing_token_is_rejected() {
    let result = temp_env::with_vars(vars(&[("APP_INSIGHTS__ITEMS", "111")]), AppConfig::new);
    let err = result.expect_err("empty token must fail validation");
    assert!(err.to_string().contains("Validation error"));
}

#[test]
fn test_missing_items_is_rejected() {
    let result = temp_env::with_vars(vars(&[("APP_INSIGHTS__TOKEN", "tok")]), AppConfig::new);
    let err = result.expect_err("items are required");
    assert!(err.to_string().contains("APP_INSIGHTS__ITEMS"));
}

#[test]
fn test_unknown_node_is_rejected() {
    let result = temp_env::with_vars(
        vars(&[
            ("APP_INSIGHTS__NODE", "user"),
            ("APP_INSIGHTS__TOKEN", "tok"),
            ("APP_INSIGHTS__ITEMS", "111"),
        ]),
        AppConfig::new,
    );
    assert!(result.is_err());
}

#[test]
fn test_zero_concurrency_is_rejected() {
    let result = temp_env::with_vars(
        vars(&[
            ("APP_INSIGHTS__TOKEN", "tok"),
            ("APP_INSIGHTS__ITEMS", "111"),
            ("APP_GRAPH__RESOLVE_CONCURRENCY", "0"),
        ]),
        AppConfig::new,
    );
    assert!(result.is_err());
}

#[test]
fn test_missing_items_file_is_rejected() {
    let result = temp_env::with_vars(
        vars(&[
            ("APP_INSIGHTS__TOKEN", "tok"),
            ("APP_INSIGHTS__ITEMS_FILE", "/nonexistent/insight-items.txt"),
        ]),
        AppConfig::new,
    );
    let err = result.expect_err("items file must exist");
    assert!(err.to_string().contains("Items file does not exist"));
}

#[tokio::test]
async fn test_items_file_feeds_deferred_items() {
    let file = std::env::temp_dir().join(format!("insight-items-{}.txt", std::process::id()));
    std::fs::write(&file, "# pages\n111\n\n222\n").unwrap();
    let file_path = file.to_string_lossy().to_string();

    let config = temp_env::with_vars(
        vars(&[
            ("APP_INSIGHTS__TOKEN", "tok"),
            ("APP_INSIGHTS__ITEMS_FILE", file_path.as_str()),
        ]),
        AppConfig::new,
    )
    .expect("config should load");

    let items = config.source_options().items.into_items().await.unwrap();
    std::fs::remove_file(&file).ok();

    assert_eq!(items, vec!["111", "222"]);
}
