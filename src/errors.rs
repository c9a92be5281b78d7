//! Error handling for the intervention service
//!
//! Every failure that can leave a pipeline stage is expressed as a
//! [`WatchError`]. The HTTP layer maps these onto status codes in
//! `api_errors.rs`; the classifier and advice stages may recover from theirs.

use thiserror::Error;

/// Main error type for the watchguard service
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Classifier call failed: {message}")]
    Classifier { message: String },

    #[error("Advice generation failed: {message}")]
    Advice { message: String },

    #[error("Database operation failed: {operation} - {source}")]
    Database {
        operation: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("I/O operation failed: {operation}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Mutex lock failed: {resource}")]
    MutexPoisoned { resource: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Shorthand for results carrying a [`WatchError`]
pub type WatchResult<T> = Result<T, WatchError>;

impl WatchError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn classifier(message: impl Into<String>) -> Self {
        Self::Classifier {
            message: message.into(),
        }
    }

    pub fn advice(message: impl Into<String>) -> Self {
        Self::Advice {
            message: message.into(),
        }
    }

    /// `operation` names what was being attempted, e.g. `insert session_log`.
    pub fn database(
        operation: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Database {
            operation: operation.into(),
            source: Box::new(source),
        }
    }

    pub fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// Helper trait for mutex locking that reports poisoning instead of panicking
pub trait SafeLock<T: ?Sized> {
    fn safe_lock(&self, resource: &str) -> WatchResult<std::sync::MutexGuard<'_, T>>;
}

impl<T: ?Sized> SafeLock<T> for std::sync::Mutex<T> {
    fn safe_lock(&self, resource: &str) -> WatchResult<std::sync::MutexGuard<'_, T>> {
        self.lock().map_err(|_| WatchError::MutexPoisoned {
            resource: resource.to_string(),
        })
    }
}

impl From<rusqlite::Error> for WatchError {
    fn from(err: rusqlite::Error) -> Self {
        WatchError::database("sqlite_operation", err)
    }
}

impl From<tokio::task::JoinError> for WatchError {
    fn from(err: tokio::task::JoinError) -> Self {
        WatchError::internal(format!("blocking task failed: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn sqlite_errors_keep_their_source() {
        let err: WatchError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, WatchError::Database { ref operation, .. } if operation == "sqlite_operation"));
        assert!(err.source().is_some());
    }

    #[tokio::test]
    async fn panicked_blocking_task_becomes_internal() {
        let join_err = tokio::task::spawn_blocking(|| panic!("writer crashed"))
            .await
            .unwrap_err();
        let err = WatchError::from(join_err);
        assert!(matches!(err, WatchError::Internal { .. }));
        assert!(err.to_string().contains("blocking task failed"));
    }

    #[test]
    fn poisoned_store_lock_is_reported() {
        let lock = std::sync::Arc::new(std::sync::Mutex::new(0u8));
        let cloned = lock.clone();
        let _ = std::thread::spawn(move || {
            let _guard = cloned.lock().unwrap();
            panic!("poison the lock");
        })
        .join();

        let err = lock.safe_lock("session_store").unwrap_err();
        assert!(matches!(err, WatchError::MutexPoisoned { ref resource } if resource == "session_store"));
    }
}
