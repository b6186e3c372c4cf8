use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

const DATE_FIELD: &str = "date";

/// Kind of Graph node being measured. Selects the insights edge and the
/// prefix of the id/name columns in every emitted row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Page,
    App,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Page => "page",
            NodeKind::App => "app",
        }
    }

    pub fn edge(&self) -> &'static str {
        match self {
            NodeKind::Page => "insights",
            NodeKind::App => "app_insights",
        }
    }

    pub fn id_field(&self) -> &'static str {
        match self {
            NodeKind::Page => "pageId",
            NodeKind::App => "appId",
        }
    }

    pub fn name_field(&self) -> &'static str {
        match self {
            NodeKind::Page => "pageName",
            NodeKind::App => "appName",
        }
    }

    fn is_reserved(&self, field: &str) -> bool {
        field == DATE_FIELD || field == self.id_field() || field == self.name_field()
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEntity {
    pub id: String,
    pub name: String,
}

/// End-of-period key of a row. Integral timestamps sort before text dates.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DateKey {
    Timestamp(i64),
    Text(String),
}

impl DateKey {
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::String(s) if s.is_empty() => None,
            Value::String(s) => Some(DateKey::Text(s.clone())),
            Value::Number(n) => Some(
                n.as_i64()
                    .map(DateKey::Timestamp)
                    .unwrap_or_else(|| DateKey::Text(n.to_string())),
            ),
            other => Some(DateKey::Text(other.to_string())),
        }
    }
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateKey::Timestamp(ts) => write!(f, "{ts}"),
            DateKey::Text(text) => f.write_str(text),
        }
    }
}

impl Serialize for DateKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            DateKey::Timestamp(ts) => serializer.serialize_i64(*ts),
            DateKey::Text(text) => serializer.serialize_str(text),
        }
    }
}

// Responses

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ValuePoint {
    #[serde(default)]
    pub end_time: Option<Value>,
    #[serde(default)]
    pub time: Option<Value>,
    #[serde(default)]
    pub value: Value,
}

impl ValuePoint {
    pub fn date_key(&self) -> Option<DateKey> {
        self.end_time
            .as_ref()
            .and_then(DateKey::from_json)
            .or_else(|| self.time.as_ref().and_then(DateKey::from_json))
    }
}

/// One element of an insights `data` array. Page insights wrap a list of
/// points in `values`, app insights return the points directly.
#[derive(Debug, Clone, Deserialize)]
pub struct InsightDatum {
    #[serde(default)]
    pub values: Option<Vec<ValuePoint>>,
    #[serde(flatten)]
    pub point: ValuePoint,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InsightsPayload {
    #[serde(default)]
    pub data: Vec<InsightDatum>,
}

impl InsightsPayload {
    /// The time series carried by the payload: the first datum's `values` when
    /// present, otherwise `data` itself read as points.
    pub fn value_points(self) -> Vec<ValuePoint> {
        let mut data = self.data;
        if let Some(values) = data.first_mut().and_then(|datum| datum.values.take()) {
            return values;
        }
        data.into_iter().map(|datum| datum.point).collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EntityLookup {
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GraphErrorDetail {
    pub message: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub code: Option<i64>,
    pub fbtrace_id: Option<String>,
}

// Output

#[derive(Debug, Clone, PartialEq)]
pub struct OutputRow {
    pub date: DateKey,
    pub node: NodeKind,
    pub entity_id: String,
    pub entity_name: String,
    pub values: BTreeMap<String, Value>,
}

impl OutputRow {
    pub fn get(&self, metric: &str) -> Option<&Value> {
        self.values.get(metric)
    }
}

/// Flattens to `{ date, <node>Id, <node>Name, <metric>: value, ... }`. A metric
/// named like one of the fixed columns is shadowed by that column.
impl Serialize for OutputRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let metrics: Vec<(&String, &Value)> = self
            .values
            .iter()
            .filter(|(metric, _)| !self.node.is_reserved(metric))
            .collect();

        let mut map = serializer.serialize_map(Some(3 + metrics.len()))?;
        map.serialize_entry(DATE_FIELD, &self.date)?;
        map.serialize_entry(self.node.id_field(), &self.entity_id)?;
        map.serialize_entry(self.node.name_field(), &self.entity_name)?;
        for (metric, value) in metrics {
            map.serialize_entry(metric, value)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressEvent {
    pub total: usize,
    pub loaded: usize,
    pub message: String,
}

impl ProgressEvent {
    pub fn new(node: NodeKind, total: usize, loaded: usize) -> Self {
        Self {
            total,
            loaded,
            message: format!("{} {}s remaining", total.saturating_sub(loaded), node),
        }
    }
}
