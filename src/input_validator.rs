use serde::Serialize;
use serde_json::{Map, Value};

use crate::api_errors::AppError;
use crate::session_metrics::{SessionMetrics, THREE_DAY_WATCH_TIME_ALIAS};

/// One field-level problem found in a request body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub loc: Vec<Value>,
    pub msg: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl FieldError {
    pub fn new(field: &str, msg: impl Into<String>, kind: &str) -> Self {
        Self {
            loc: vec![Value::from("body"), Value::from(field)],
            msg: msg.into(),
            kind: kind.to_string(),
        }
    }

    pub fn missing(field: &str) -> Self {
        Self::new(field, "Field required", "missing")
    }

    fn at_index(field: &str, index: usize, msg: &str, kind: &str) -> Self {
        Self {
            loc: vec![Value::from("body"), Value::from(field), Value::from(index)],
            msg: msg.to_string(),
            kind: kind.to_string(),
        }
    }

    fn body(msg: impl Into<String>, kind: &str) -> Self {
        Self {
            loc: vec![Value::from("body")],
            msg: msg.into(),
            kind: kind.to_string(),
        }
    }

    /// Name of the offending top-level field, if the error points at one.
    pub fn field(&self) -> Option<&str> {
        self.loc.get(1).and_then(Value::as_str)
    }
}

/// A rejected request: every field error plus the body as received.
#[derive(Debug, Clone)]
pub struct ValidationFailure {
    pub detail: Vec<FieldError>,
    pub body: Value,
}

impl From<ValidationFailure> for AppError {
    fn from(failure: ValidationFailure) -> Self {
        AppError::unprocessable(failure.detail, failure.body)
    }
}

#[derive(Clone, Copy)]
enum FieldKind {
    Str,
    Float,
    NonNegativeFloat,
    Bool,
    StrList,
}

const REQUIRED_FIELDS: &[(&str, FieldKind)] = &[
    ("user_id", FieldKind::Str),
    ("session_start_time", FieldKind::Str),
    ("session_duration_min", FieldKind::NonNegativeFloat),
    ("active_period_label", FieldKind::Str),
    ("avg_video_duration_sec", FieldKind::Float),
    ("switch_frequency", FieldKind::Float),
    ("content_emotion_score", FieldKind::Float),
    ("content_type_keywords", FieldKind::StrList),
    ("repeated_viewing_ratio", FieldKind::Float),
    ("skipped_intro_ratio", FieldKind::Float),
    ("saved_to_favorites", FieldKind::Bool),
    ("short_video_ratio", FieldKind::Float),
    ("self_reported_goal", FieldKind::Str),
    ("ai_tone_description", FieldKind::Str),
];

const THREE_DAY_WATCH_TIME: &str = "three_day_total_watch_time";

/// Structural validation of inbound session bodies.
///
/// Collects every problem instead of stopping at the first so the client
/// gets the full picture in one 422 response.
#[derive(Debug, Clone)]
pub struct InputValidator {
    max_body_bytes: usize,
}

impl Default for InputValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl InputValidator {
    pub fn new() -> Self {
        Self {
            max_body_bytes: 256 * 1024,
        }
    }

    /// Validate a raw request body and turn it into [`SessionMetrics`].
    pub fn validate_session(&self, raw: &[u8]) -> Result<SessionMetrics, ValidationFailure> {
        if raw.len() > self.max_body_bytes {
            return Err(ValidationFailure {
                detail: vec![FieldError::body(
                    format!("Body exceeds {} bytes", self.max_body_bytes),
                    "too_long",
                )],
                body: Value::Null,
            });
        }

        let parsed: Value = match serde_json::from_slice(raw) {
            Ok(value) => value,
            Err(e) => {
                return Err(ValidationFailure {
                    detail: vec![FieldError::body(
                        format!("JSON decode error: {e}"),
                        "json_invalid",
                    )],
                    body: Value::String(String::from_utf8_lossy(raw).into_owned()),
                });
            }
        };

        self.validate_value(parsed)
    }

    /// Validate an already-parsed JSON document.
    pub fn validate_value(&self, body: Value) -> Result<SessionMetrics, ValidationFailure> {
        let Some(map) = body.as_object() else {
            return Err(ValidationFailure {
                detail: vec![FieldError::body(
                    "Input should be a valid dictionary or object",
                    "model_attributes_type",
                )],
                body,
            });
        };

        let mut detail = Vec::new();
        for (name, kind) in REQUIRED_FIELDS {
            match map.get(*name) {
                None => detail.push(FieldError::missing(name)),
                Some(value) => check_field(name, *kind, value, &mut detail),
            }
        }

        if let Some((name, value)) = watch_time_entry(map) {
            if !value.is_null() && !value.is_number() {
                detail.push(FieldError::new(
                    name,
                    "Input should be a valid number",
                    "float_type",
                ));
            }
        }

        if !detail.is_empty() {
            return Err(ValidationFailure { detail, body });
        }

        let normalized = normalize_watch_time_alias(map);
        serde_json::from_value(Value::Object(normalized)).map_err(|e| ValidationFailure {
            detail: vec![FieldError::body(e.to_string(), "model_type")],
            body: body.clone(),
        })
    }
}

fn check_field(name: &str, kind: FieldKind, value: &Value, detail: &mut Vec<FieldError>) {
    match kind {
        FieldKind::Str => {
            if !value.is_string() {
                detail.push(FieldError::new(
                    name,
                    "Input should be a valid string",
                    "string_type",
                ));
            }
        }
        FieldKind::Float => {
            if !value.is_number() {
                detail.push(FieldError::new(
                    name,
                    "Input should be a valid number",
                    "float_type",
                ));
            }
        }
        FieldKind::NonNegativeFloat => match value.as_f64() {
            None => detail.push(FieldError::new(
                name,
                "Input should be a valid number",
                "float_type",
            )),
            Some(v) if v < 0.0 => detail.push(FieldError::new(
                name,
                "Input should be greater than or equal to 0",
                "greater_than_equal",
            )),
            Some(_) => {}
        },
        FieldKind::Bool => {
            if !value.is_boolean() {
                detail.push(FieldError::new(
                    name,
                    "Input should be a valid boolean",
                    "bool_type",
                ));
            }
        }
        FieldKind::StrList => match value.as_array() {
            None => detail.push(FieldError::new(
                name,
                "Input should be a valid list",
                "list_type",
            )),
            Some(items) => {
                for (index, item) in items.iter().enumerate() {
                    if !item.is_string() {
                        detail.push(FieldError::at_index(
                            name,
                            index,
                            "Input should be a valid string",
                            "string_type",
                        ));
                    }
                }
            }
        },
    }
}

/// The watch time value that will be used. The numeric-prefixed spelling is
/// looked up first; when it is present the canonical spelling is ignored.
fn watch_time_entry(map: &Map<String, Value>) -> Option<(&'static str, &Value)> {
    map.get(THREE_DAY_WATCH_TIME_ALIAS)
        .map(|value| (THREE_DAY_WATCH_TIME_ALIAS, value))
        .or_else(|| map.get(THREE_DAY_WATCH_TIME).map(|value| (THREE_DAY_WATCH_TIME, value)))
}

fn normalize_watch_time_alias(map: &Map<String, Value>) -> Map<String, Value> {
    let mut normalized = map.clone();
    if normalized.contains_key(THREE_DAY_WATCH_TIME_ALIAS)
        && normalized.remove(THREE_DAY_WATCH_TIME).is_some()
    {
        tracing::debug!("both watch time spellings present, keeping {THREE_DAY_WATCH_TIME_ALIAS}");
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_body() -> Value {
        json!({
            "user_id": "u1",
            "session_start_time": "2025-06-01T21:15:00",
            "session_duration_min": 25.0,
            "active_period_label": "night",
            "avg_video_duration_sec": 15.5,
            "switch_frequency": 2.0,
            "content_emotion_score": -0.3,
            "content_type_keywords": ["prank", "drama"],
            "repeated_viewing_ratio": 0.4,
            "skipped_intro_ratio": 0.8,
            "saved_to_favorites": false,
            "short_video_ratio": 0.95,
            "self_reported_goal": "sleep by midnight",
            "ai_tone_description": "like a blunt coach"
        })
    }

    #[test]
    fn accepts_valid_body() {
        let validator = InputValidator::new();
        let raw = serde_json::to_vec(&valid_body()).unwrap();
        let metrics = validator.validate_session(&raw).unwrap();
        assert_eq!(metrics.user_id, "u1");
        assert_eq!(metrics.content_type_keywords, vec!["prank", "drama"]);
    }

    #[test]
    fn missing_user_id_is_named() {
        let mut body = valid_body();
        body.as_object_mut().unwrap().remove("user_id");

        let failure = InputValidator::new().validate_value(body).unwrap_err();
        assert_eq!(failure.detail.len(), 1);
        assert_eq!(failure.detail[0].field(), Some("user_id"));
        assert_eq!(failure.detail[0].kind, "missing");
        assert_eq!(failure.body["session_duration_min"], 25.0);
    }

    #[test]
    fn collects_every_type_error() {
        let mut body = valid_body();
        body["switch_frequency"] = json!("fast");
        body["saved_to_favorites"] = json!("yes");
        body["content_type_keywords"] = json!(["ok", 7]);

        let failure = InputValidator::new().validate_value(body).unwrap_err();
        let kinds: Vec<_> = failure.detail.iter().map(|e| e.kind.as_str()).collect();
        assert_eq!(kinds, vec!["float_type", "string_type", "bool_type"]);
        assert_eq!(
            failure.detail[1].loc,
            vec![json!("body"), json!("content_type_keywords"), json!(1)]
        );
    }

    #[test]
    fn negative_duration_is_rejected() {
        let mut body = valid_body();
        body["session_duration_min"] = json!(-1.0);

        let failure = InputValidator::new().validate_value(body).unwrap_err();
        assert_eq!(failure.detail[0].kind, "greater_than_equal");
    }

    #[test]
    fn malformed_json_keeps_raw_text() {
        let failure = InputValidator::new()
            .validate_session(b"{\"user_id\": ")
            .unwrap_err();
        assert_eq!(failure.detail[0].kind, "json_invalid");
        assert_eq!(failure.body, json!("{\"user_id\": "));
    }

    #[test]
    fn non_object_body_is_rejected() {
        let failure = InputValidator::new().validate_value(json!([1, 2])).unwrap_err();
        assert_eq!(failure.detail[0].kind, "model_attributes_type");
    }

    #[test]
    fn both_watch_time_spellings_prefer_numeric_prefix() {
        let mut body = valid_body();
        body["three_day_total_watch_time"] = json!(10.0);
        body[THREE_DAY_WATCH_TIME_ALIAS] = json!(99.0);

        let metrics = InputValidator::new().validate_value(body).unwrap();
        assert_eq!(metrics.three_day_total_watch_time, 99.0);
    }

    #[test]
    fn shadowed_canonical_watch_time_is_not_type_checked() {
        let mut body = valid_body();
        body["three_day_total_watch_time"] = json!("lots");
        body[THREE_DAY_WATCH_TIME_ALIAS] = json!(42.0);

        let metrics = InputValidator::new().validate_value(body).unwrap();
        assert_eq!(metrics.three_day_total_watch_time, 42.0);
    }

    #[test]
    fn bad_prefixed_watch_time_is_reported_even_with_canonical() {
        let mut body = valid_body();
        body["three_day_total_watch_time"] = json!(10.0);
        body[THREE_DAY_WATCH_TIME_ALIAS] = json!("lots");

        let failure = InputValidator::new().validate_value(body).unwrap_err();
        assert_eq!(failure.detail.len(), 1);
        assert_eq!(failure.detail[0].field(), Some(THREE_DAY_WATCH_TIME_ALIAS));
    }

    #[test]
    fn null_prefixed_watch_time_shadows_canonical() {
        let mut body = valid_body();
        body["three_day_total_watch_time"] = json!(10.0);
        body[THREE_DAY_WATCH_TIME_ALIAS] = Value::Null;

        let metrics = InputValidator::new().validate_value(body).unwrap();
        assert_eq!(metrics.three_day_total_watch_time, 0.0);
    }

    #[test]
    fn watch_time_must_be_numeric() {
        let mut body = valid_body();
        body[THREE_DAY_WATCH_TIME_ALIAS] = json!("lots");

        let failure = InputValidator::new().validate_value(body).unwrap_err();
        assert_eq!(failure.detail[0].field(), Some(THREE_DAY_WATCH_TIME_ALIAS));
    }
}
