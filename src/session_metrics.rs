//! Session snapshot submitted by a client, and the projection of it that is
//! shared with the behavioral classifier.

use serde::{Deserialize, Deserializer, Serialize};

/// Wire name of the three-day watch time field. Kept for clients and for the
/// classifier, which both expect the digit-prefixed key.
pub const THREE_DAY_WATCH_TIME_ALIAS: &str = "3_day_total_watch_time";

/// One viewing session as reported by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMetrics {
    pub user_id: String,
    pub session_start_time: String,
    pub session_duration_min: f64,
    pub active_period_label: String,
    pub avg_video_duration_sec: f64,
    pub switch_frequency: f64,
    pub content_emotion_score: f64,
    pub content_type_keywords: Vec<String>,
    pub repeated_viewing_ratio: f64,
    pub skipped_intro_ratio: f64,
    pub saved_to_favorites: bool,
    #[serde(
        default,
        alias = "3_day_total_watch_time",
        deserialize_with = "null_as_zero"
    )]
    pub three_day_total_watch_time: f64,
    pub short_video_ratio: f64,
    pub self_reported_goal: String,
    pub ai_tone_description: String,
}

fn null_as_zero<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(0.0))
}

/// Fields forwarded to the classifier. Identity and personalization fields
/// (`user_id`, goal, tone, start time) never leave the service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifierPayload {
    pub session_duration_min: f64,
    pub active_period_label: String,
    pub avg_video_duration_sec: f64,
    pub switch_frequency: f64,
    pub content_emotion_score: f64,
    pub content_type_keywords: Vec<String>,
    pub repeated_viewing_ratio: f64,
    pub skipped_intro_ratio: f64,
    pub saved_to_favorites: bool,
    #[serde(rename = "3_day_total_watch_time")]
    pub three_day_total_watch_time: f64,
    pub short_video_ratio: f64,
}

impl SessionMetrics {
    pub fn classifier_payload(&self) -> ClassifierPayload {
        ClassifierPayload {
            session_duration_min: self.session_duration_min,
            active_period_label: self.active_period_label.clone(),
            avg_video_duration_sec: self.avg_video_duration_sec,
            switch_frequency: self.switch_frequency,
            content_emotion_score: self.content_emotion_score,
            content_type_keywords: self.content_type_keywords.clone(),
            repeated_viewing_ratio: self.repeated_viewing_ratio,
            skipped_intro_ratio: self.skipped_intro_ratio,
            saved_to_favorites: self.saved_to_favorites,
            three_day_total_watch_time: self.three_day_total_watch_time,
            short_video_ratio: self.short_video_ratio,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base_body() -> serde_json::Value {
        json!({
            "user_id": "u1",
            "session_start_time": "2025-06-01T21:15:00",
            "session_duration_min": 25,
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
    fn three_day_watch_time_defaults_to_zero() {
        let metrics: SessionMetrics = serde_json::from_value(base_body()).unwrap();
        assert_eq!(metrics.three_day_total_watch_time, 0.0);
        assert_eq!(metrics.session_duration_min, 25.0);
    }

    #[test]
    fn three_day_watch_time_accepts_alias_and_canonical_name() {
        let mut aliased = base_body();
        aliased[THREE_DAY_WATCH_TIME_ALIAS] = json!(310.5);
        let metrics: SessionMetrics = serde_json::from_value(aliased).unwrap();
        assert_eq!(metrics.three_day_total_watch_time, 310.5);

        let mut canonical = base_body();
        canonical["three_day_total_watch_time"] = json!(42.0);
        let metrics: SessionMetrics = serde_json::from_value(canonical).unwrap();
        assert_eq!(metrics.three_day_total_watch_time, 42.0);
    }

    #[test]
    fn three_day_watch_time_null_is_zero() {
        let mut body = base_body();
        body[THREE_DAY_WATCH_TIME_ALIAS] = serde_json::Value::Null;
        let metrics: SessionMetrics = serde_json::from_value(body).unwrap();
        assert_eq!(metrics.three_day_total_watch_time, 0.0);
    }

    #[test]
    fn classifier_payload_omits_personal_fields() {
        let mut body = base_body();
        body[THREE_DAY_WATCH_TIME_ALIAS] = json!(120.0);
        let metrics: SessionMetrics = serde_json::from_value(body).unwrap();

        let payload = serde_json::to_value(metrics.classifier_payload()).unwrap();
        let obj = payload.as_object().unwrap();

        assert_eq!(obj.len(), 11);
        assert_eq!(obj[THREE_DAY_WATCH_TIME_ALIAS], 120.0);
        assert_eq!(obj["content_type_keywords"], json!(["prank", "drama"]));
        for private in [
            "user_id",
            "self_reported_goal",
            "ai_tone_description",
            "session_start_time",
            "three_day_total_watch_time",
        ] {
            assert!(!obj.contains_key(private), "{private} leaked to classifier");
        }
    }
}
