use std::sync::Arc;

use crate::{
    advice_generator::{AdviceBackend, AdviceGenerator, ChatCompletionBackend},
    classifier_gateway::{Classifier, ClassifierGateway, HttpClassifier},
    config_loader::WatchConfig,
    errors::WatchResult,
    input_validator::InputValidator,
    intervention_service::InterventionService,
    session_recorder::SessionRecorder,
    session_store::{SessionStore, SqliteSessionStore},
};

pub struct AppState {
    pub service: InterventionService,
}

impl AppState {
    /// Assemble the pipeline from explicit collaborators.
    pub fn new(
        classifier: Arc<dyn Classifier>,
        advice_backend: Arc<dyn AdviceBackend>,
        store: Arc<dyn SessionStore>,
        config: &WatchConfig,
    ) -> Self {
        let service = InterventionService::new(
            InputValidator::new(),
            ClassifierGateway::new(classifier, config.classifier.timeout()),
            AdviceGenerator::new(
                advice_backend,
                config.advice.timeout(),
                config.advice.fail_open,
            ),
            SessionRecorder::new(store),
        );

        Self { service }
    }

    /// Wire the production HTTP clients and the on-disk store.
    pub fn from_config(config: &WatchConfig) -> WatchResult<Self> {
        let classifier =
            HttpClassifier::new(&config.classifier.base_url, config.classifier.timeout())?;
        let advice_backend = ChatCompletionBackend::new(
            &config.advice.base_url,
            &config.advice.api_key,
            &config.advice.model,
            config.advice.timeout(),
        )?;
        let store = SqliteSessionStore::open(&config.storage.database_path)?;

        tracing::info!(
            classifier = classifier.endpoint(),
            advice_model = %config.advice.model,
            database = %config.storage.database_path.display(),
            "application state initialized"
        );

        Ok(Self::new(
            Arc::new(classifier),
            Arc::new(advice_backend),
            Arc::new(store),
            config,
        ))
    }

    pub async fn is_ready(&self) -> bool {
        self.service.recorder().is_ready().await
    }
}
