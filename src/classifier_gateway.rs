//! Best-effort behavioral classification.
//!
//! The gateway never fails: whatever goes wrong talking to the classifier is
//! logged and replaced with [`UNKNOWN_LABEL`].

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use crate::errors::{WatchError, WatchResult};
use crate::session_metrics::{ClassifierPayload, SessionMetrics};

/// Label recorded when no classification could be obtained.
pub const UNKNOWN_LABEL: &str = "unknown";

/// Anything that can turn a session projection into a behavioral label.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, payload: &ClassifierPayload) -> WatchResult<String>;

    fn name(&self) -> &str;
}

#[derive(Deserialize)]
struct PredictResponse {
    predicted_state: String,
}

/// Classifier reached over HTTP at `{base_url}/predict`.
pub struct HttpClassifier {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpClassifier {
    pub fn new(base_url: &str, timeout: Duration) -> WatchResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| WatchError::config(format!("failed to build classifier client: {e}")))?;

        Ok(Self {
            endpoint: format!("{}/predict", base_url.trim_end_matches('/')),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Classifier for HttpClassifier {
    async fn classify(&self, payload: &ClassifierPayload) -> WatchResult<String> {
        let res = self
            .client
            .post(&self.endpoint)
            .json(payload)
            .send()
            .await
            .map_err(|e| WatchError::classifier(format!("request failed: {e}")))?;

        if !res.status().is_success() {
            return Err(WatchError::classifier(format!(
                "classifier returned {}",
                res.status()
            )));
        }

        let parsed: PredictResponse = res
            .json()
            .await
            .map_err(|e| WatchError::classifier(format!("malformed response: {e}")))?;

        let label = parsed.predicted_state.trim();
        if label.is_empty() {
            return Err(WatchError::classifier("empty predicted_state"));
        }
        Ok(label.to_string())
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Wraps a [`Classifier`] with a hard deadline and the unknown-label fallback.
#[derive(Clone)]
pub struct ClassifierGateway {
    classifier: Arc<dyn Classifier>,
    timeout: Duration,
}

impl ClassifierGateway {
    pub fn new(classifier: Arc<dyn Classifier>, timeout: Duration) -> Self {
        Self {
            classifier,
            timeout,
        }
    }

    pub async fn classify(&self, metrics: &SessionMetrics) -> String {
        let payload = metrics.classifier_payload();
        let outcome = tokio::time::timeout(self.timeout, self.classifier.classify(&payload)).await;

        match outcome {
            Ok(Ok(label)) => {
                tracing::debug!(classifier = self.classifier.name(), %label, "session classified");
                label
            }
            Ok(Err(e)) => {
                tracing::warn!(classifier = self.classifier.name(), error = %e, "classifier unavailable, using fallback label");
                UNKNOWN_LABEL.to_string()
            }
            Err(_) => {
                tracing::warn!(
                    classifier = self.classifier.name(),
                    timeout_ms = self.timeout.as_millis() as u64,
                    "classifier timed out, using fallback label"
                );
                UNKNOWN_LABEL.to_string()
            }
        }
    }
}
