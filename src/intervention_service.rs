//! The per-request pipeline: receive, classify, decide, advise, record, respond.

use serde::{Deserialize, Serialize};
use tracing::Instrument;
use uuid::Uuid;

use crate::advice_generator::AdviceGenerator;
use crate::api_errors::AppError;
use crate::classifier_gateway::ClassifierGateway;
use crate::input_validator::InputValidator;
use crate::intervention_policy::InterventionPolicy;
use crate::session_metrics::SessionMetrics;
use crate::session_recorder::{InterventionOutcome, SessionRecorder};
use crate::session_store::InterventionLevel;

/// Body returned to the client for an accepted session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterventionResponse {
    pub level: InterventionLevel,
    pub advice_text: String,
}

#[derive(Clone)]
pub struct InterventionService {
    validator: InputValidator,
    classifier: ClassifierGateway,
    advisor: AdviceGenerator,
    recorder: SessionRecorder,
}

impl InterventionService {
    pub fn new(
        validator: InputValidator,
        classifier: ClassifierGateway,
        advisor: AdviceGenerator,
        recorder: SessionRecorder,
    ) -> Self {
        Self {
            validator,
            classifier,
            advisor,
            recorder,
        }
    }

    pub fn recorder(&self) -> &SessionRecorder {
        &self.recorder
    }

    /// Validate a raw request body and run it through the pipeline.
    ///
    /// A body that fails validation produces no classifier call, no advice
    /// call and no record.
    pub async fn handle(&self, raw: &[u8]) -> Result<InterventionResponse, AppError> {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!("intervene", %request_id);

        async move {
            let metrics = match self.validator.validate_session(raw) {
                Ok(metrics) => metrics,
                Err(failure) => {
                    tracing::warn!(
                        errors = ?failure.detail,
                        body = %failure.body,
                        "rejected session payload"
                    );
                    return Err(failure.into());
                }
            };
            self.process(&metrics).await
        }
        .instrument(span)
        .await
    }

    /// Run an already-validated session through classify, decide, advise,
    /// record. Single pass, no retries.
    pub async fn process(&self, metrics: &SessionMetrics) -> Result<InterventionResponse, AppError> {
        let predicted_label = self.classifier.classify(metrics).await;

        let assessment = InterventionPolicy::assess(metrics);
        tracing::debug!(
            score = assessment.score,
            signals = ?assessment.signals,
            "risk assessed"
        );

        let advice_text = self
            .advisor
            .advise(
                assessment.intervene,
                &metrics.self_reported_goal,
                &predicted_label,
                &metrics.ai_tone_description,
            )
            .await?;

        let outcome = InterventionOutcome {
            intervention_level: InterventionLevel::from_decision(assessment.intervene),
            predicted_label,
            advice_text,
        };

        let record_id = self.recorder.persist(metrics, &outcome).await.map_err(|e| {
            tracing::error!(error = %e, "failed to persist session record");
            AppError::from(e)
        })?;

        tracing::info!(
            user_id = %metrics.user_id,
            level = outcome.intervention_level.as_str(),
            label = %outcome.predicted_label,
            record_id,
            "session recorded"
        );

        Ok(InterventionResponse {
            level: outcome.intervention_level,
            advice_text: outcome.advice_text,
        })
    }
}
