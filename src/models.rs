use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Backends written against Gson send `null` for empty collections
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// One recorded UI interaction.
///
/// Only the fields the front-end reads are typed; everything else the
/// backend sends is kept in `extra` so a demo can be sent back as a query
/// without losing information the matcher relies on.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_stamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_event: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_extra: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub w_width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub w_height: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub w_relative_width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub w_relative_height: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub w_relative_x_pos: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub w_relative_y_pos: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Event {
    /// Key used for color grouping; events without an identifier share one
    pub fn key(&self) -> &str {
        self.identifier.as_deref().unwrap_or("")
    }
}

/// Ordered event sequence: a recorded demo, a canned demo, or a result snippet
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct Demo {
    #[serde(default, deserialize_with = "null_as_default")]
    pub events: Vec<Event>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Demo {
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Milliseconds between the first and last timestamped events
    pub fn duration_ms(&self) -> Option<i64> {
        let mut stamps = self.events.iter().filter_map(|e| e.time_stamp);
        let first = stamps.next()?;
        let last = stamps.last()?;
        Some(last - first)
    }

    /// Snippet attributes as `(key, value)` pairs.
    ///
    /// The backend has shipped these both as a list of `{key, value}`
    /// objects and as a map keyed by attribute name.
    pub fn attribute_pairs(&self) -> Vec<(String, Value)> {
        match self.extra.get("attributes") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| {
                    let key = item.get("key")?.as_str()?.to_string();
                    let value = item.get("value").cloned().unwrap_or(Value::Null);
                    Some((key, value))
                })
                .collect(),
            Some(Value::Object(map)) => map
                .iter()
                .map(|(name, attr)| match attr.get("value") {
                    Some(value) => {
                        let key = attr
                            .get("key")
                            .and_then(Value::as_str)
                            .unwrap_or(name)
                            .to_string();
                        (key, value.clone())
                    }
                    None => (name.clone(), attr.clone()),
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Attribute kinds the backend bins by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    Categorical,
    Numerical,
    DateTime,
    Unknown,
}

impl AttributeKind {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "CATEGORICAL" => Self::Categorical,
            "NUMERICAL" => Self::Numerical,
            "DATETIME" => Self::DateTime,
            _ => Self::Unknown,
        }
    }

    /// Whether a bin of this kind is selected by its `[binMin, binMax)` range
    pub fn is_ranged(self) -> bool {
        matches!(self, Self::Numerical | Self::DateTime)
    }
}

/// Attribute description inside a result summary
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct AttributeInfo {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AttributeInfo {
    pub fn kind(&self) -> AttributeKind {
        self.type_name
            .as_deref()
            .map(AttributeKind::parse)
            .unwrap_or(AttributeKind::Unknown)
    }
}

/// One histogram bucket of an attribute summary
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Bin {
    #[serde(default)]
    pub bin_name: String,
    #[serde(default)]
    pub count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bin_min: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bin_max: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Summary of one result bucket (strong matches, elongations, ...)
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResultSummary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default)]
    pub size: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_dist: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_dist: Option<f64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub attributes: BTreeMap<String, AttributeInfo>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub attr_summaries: BTreeMap<String, Vec<Bin>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ResultSummary {
    pub fn attribute_kind(&self, name: &str) -> AttributeKind {
        self.attributes
            .get(name)
            .map(AttributeInfo::kind)
            .unwrap_or(AttributeKind::Unknown)
    }
}

/// A match inside a larger snippet; `end_index` is exclusive
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubSequence {
    #[serde(default)]
    pub snippet: Demo,
    #[serde(default)]
    pub start_index: usize,
    #[serde(default)]
    pub end_index: usize,
    #[serde(default)]
    pub distance: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct DetailedResult {
    #[serde(default, deserialize_with = "null_as_default")]
    pub results: Vec<SubSequence>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Filter derived from a chart bar, in the shape the backend parses
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct FilterParams {
    #[serde(rename = "rSummary")]
    pub summary: ResultSummary,
    #[serde(rename = "attrName")]
    pub attribute: String,
    pub values: String,
}

/// What one `pollForEvents` call produced
#[derive(Debug, Clone, PartialEq)]
pub enum PollPayload {
    /// Nothing new yet
    Idle,
    /// The backend stopped recording
    Stopped,
    /// New events to append
    Events(Vec<Event>),
    /// The whole current query, replacing the demo
    Snippet(Demo),
}

impl PollPayload {
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        match value {
            Value::Null => Ok(Self::Idle),
            Value::Array(_) => {
                let events: Vec<Option<Event>> = serde_json::from_value(value)?;
                Ok(Self::Events(events.into_iter().flatten().collect()))
            }
            Value::Object(map) => {
                if map.get("status").and_then(Value::as_str) == Some("stopped") {
                    Ok(Self::Stopped)
                } else if map.contains_key("events") {
                    Ok(Self::Snippet(serde_json::from_value(Value::Object(map))?))
                } else {
                    Ok(Self::Idle)
                }
            }
            other => Err(serde::de::Error::custom(format!(
                "unexpected poll payload: {other}"
            ))),
        }
    }
}

/// Generic API response (health, errors)
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub status: String,
    pub message: String,
    pub data: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct SelectDemoRequest {
    pub name: String,
}

/// A click on one chart bar
#[derive(Debug, Deserialize)]
pub struct FilterRequest {
    pub bucket: usize,
    pub attribute: String,
    pub bin: usize,
}

/// Everything the page needs to redraw itself
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Panels {
    pub status: String,
    pub mode: String,
    pub recording: bool,
    pub revision: u64,
    pub demos: Vec<String>,
    pub demo_panel: String,
    pub results_panel: String,
    pub alerts: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_keeps_unknown_fields() {
        let raw = json!({
            "identifier": "btn-ok",
            "userId": "u1",
            "timeStamp": 1420070400000i64,
            "wRelativeXPos": 0.25,
            "eventTypeName": "CLICK",
            "keyValuePairs": { "a": "b" }
        });
        let event: Event = serde_json::from_value(raw.clone()).unwrap();

        assert_eq!(event.key(), "btn-ok");
        assert_eq!(event.w_relative_x_pos, Some(0.25));
        assert_eq!(event.extra.get("eventTypeName"), Some(&json!("CLICK")));
        assert_eq!(serde_json::to_value(&event).unwrap(), raw);
    }

    #[test]
    fn test_demo_null_events() {
        let demo: Demo = serde_json::from_value(json!({ "events": null })).unwrap();
        assert!(demo.is_empty());
        assert_eq!(demo.duration_ms(), None);
    }

    #[test]
    fn test_demo_duration() {
        let demo: Demo = serde_json::from_value(json!({
            "events": [{ "timeStamp": 1000 }, { "identifier": "x" }, { "timeStamp": 4500 }]
        }))
        .unwrap();
        assert_eq!(demo.duration_ms(), Some(3500));
    }

    #[test]
    fn test_attribute_pairs_from_list_and_map() {
        let listed: Demo = serde_json::from_value(json!({
            "events": [],
            "attributes": [{ "key": "app", "value": "Maps" }, { "key": "n", "value": 3 }]
        }))
        .unwrap();
        assert_eq!(
            listed.attribute_pairs(),
            vec![("app".to_string(), json!("Maps")), ("n".to_string(), json!(3))]
        );

        let mapped: Demo = serde_json::from_value(json!({
            "events": [],
            "attributes": { "app": { "key": "app", "value": "Maps", "type": "CATEGORICAL" } }
        }))
        .unwrap();
        assert_eq!(mapped.attribute_pairs(), vec![("app".to_string(), json!("Maps"))]);
    }

    #[test]
    fn test_summary_with_nulls() {
        let raw = json!([
            {
                "displayName": "Strong matches",
                "size": 4,
                "minDist": 0.0,
                "maxDist": 1.5,
                "attributes": { "duration": { "key": "duration", "type": "NUMERICAL" } },
                "attrSummaries": { "duration": [{ "binName": "0-5", "count": 4, "binMin": 0, "binMax": 5 }] }
            },
            null
        ]);
        let summaries: Vec<Option<ResultSummary>> = serde_json::from_value(raw).unwrap();

        assert_eq!(summaries.len(), 2);
        assert!(summaries[1].is_none());
        let first = summaries[0].as_ref().unwrap();
        assert_eq!(first.attribute_kind("duration"), AttributeKind::Numerical);
        assert_eq!(first.attribute_kind("missing"), AttributeKind::Unknown);
        assert_eq!(first.attr_summaries["duration"][0].count, 4);
    }

    #[test]
    fn test_poll_payload_shapes() {
        assert_eq!(PollPayload::from_value(Value::Null).unwrap(), PollPayload::Idle);
        assert_eq!(
            PollPayload::from_value(json!({ "status": "stopped" })).unwrap(),
            PollPayload::Stopped
        );

        let events = PollPayload::from_value(json!([{ "identifier": "a" }, null])).unwrap();
        match events {
            PollPayload::Events(events) => {
                assert_eq!(events.len(), 1);
                assert_eq!(events[0].key(), "a");
            }
            other => panic!("expected events, got {other:?}"),
        }

        let snippet = PollPayload::from_value(json!({ "events": [{ "identifier": "b" }] })).unwrap();
        assert!(matches!(snippet, PollPayload::Snippet(ref d) if d.len() == 1));

        assert!(PollPayload::from_value(json!("garbage")).is_err());
    }

    #[test]
    fn test_filter_params_wire_names() {
        let params = FilterParams {
            summary: ResultSummary::default(),
            attribute: "app".to_string(),
            values: "Foo".to_string(),
        };
        let value = serde_json::to_value(&params).unwrap();
        assert!(value.get("rSummary").is_some());
        assert_eq!(value["attrName"], "app");
        assert_eq!(value["values"], "Foo");
    }
}
