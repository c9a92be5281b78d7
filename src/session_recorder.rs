//! Turns a session and its outcome into one persisted audit record.

use std::sync::Arc;

use crate::errors::WatchResult;
use crate::session_metrics::SessionMetrics;
use crate::session_store::{InterventionLevel, NewSessionRecord, SessionRecord, SessionStore};

/// Separator used to flatten `content_type_keywords`.
///
/// The flattened form splits back to the original list only when no keyword
/// contains the delimiter and the list is not a single empty keyword: `[""]`
/// and `[]` both flatten to `""`, which splits back to `[]`. Neither case is
/// rejected.
pub const KEYWORD_DELIMITER: char = ',';

/// What the pipeline decided for one session.
#[derive(Debug, Clone, PartialEq)]
pub struct InterventionOutcome {
    pub intervention_level: InterventionLevel,
    pub predicted_label: String,
    pub advice_text: String,
}

pub fn flatten_keywords(keywords: &[String]) -> String {
    if keywords.iter().any(|k| k.contains(KEYWORD_DELIMITER)) {
        tracing::debug!(
            "keyword contains '{KEYWORD_DELIMITER}', stored value will not split back cleanly"
        );
    }
    if matches!(keywords, [only] if only.is_empty()) {
        tracing::debug!("single empty keyword is stored the same as no keywords");
    }
    keywords.join(&KEYWORD_DELIMITER.to_string())
}

pub fn split_keywords(flattened: &str) -> Vec<String> {
    if flattened.is_empty() {
        return Vec::new();
    }
    flattened
        .split(KEYWORD_DELIMITER)
        .map(str::to_string)
        .collect()
}

#[derive(Clone)]
pub struct SessionRecorder {
    store: Arc<dyn SessionStore>,
}

impl SessionRecorder {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    pub fn to_entry(metrics: &SessionMetrics, outcome: &InterventionOutcome) -> NewSessionRecord {
        NewSessionRecord {
            user_id: metrics.user_id.clone(),
            session_start_time: metrics.session_start_time.clone(),
            session_duration_min: metrics.session_duration_min,
            active_period_label: metrics.active_period_label.clone(),
            avg_video_duration_sec: metrics.avg_video_duration_sec,
            switch_frequency: metrics.switch_frequency,
            content_emotion_score: metrics.content_emotion_score,
            content_type_keywords: flatten_keywords(&metrics.content_type_keywords),
            repeated_viewing_ratio: metrics.repeated_viewing_ratio,
            skipped_intro_ratio: metrics.skipped_intro_ratio,
            saved_to_favorites: metrics.saved_to_favorites,
            three_day_total_watch_time: metrics.three_day_total_watch_time,
            short_video_ratio: metrics.short_video_ratio,
            self_reported_goal: metrics.self_reported_goal.clone(),
            ai_tone_description: metrics.ai_tone_description.clone(),
            predicted_label: outcome.predicted_label.clone(),
            intervention_level: outcome.intervention_level,
            advice_text: outcome.advice_text.clone(),
        }
    }

    /// Write one record and return its id. Errors are never swallowed.
    pub async fn persist(
        &self,
        metrics: &SessionMetrics,
        outcome: &InterventionOutcome,
    ) -> WatchResult<i64> {
        let entry = Self::to_entry(metrics, outcome);
        let store = self.store.clone();
        let record = tokio::task::spawn_blocking(move || store.append(&entry)).await??;
        Ok(record.id)
    }

    pub async fn history(&self, user_id: &str, limit: usize) -> WatchResult<Vec<SessionRecord>> {
        let store = self.store.clone();
        let user_id = user_id.to_string();
        tokio::task::spawn_blocking(move || store.recent_for_user(&user_id, limit)).await?
    }

    pub async fn is_ready(&self) -> bool {
        let store = self.store.clone();
        matches!(
            tokio::task::spawn_blocking(move || store.ping()).await,
            Ok(Ok(()))
        )
    }
}
