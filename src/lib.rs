//! Library root for the `watchguard` crate
//! Intervention decisions for video-watching sessions

// Core error handling
pub mod api_errors;
pub mod errors;

// Request model & validation
pub mod input_validator;
pub mod session_metrics;

// Pipeline stages
pub mod advice_generator;
pub mod classifier_gateway;
pub mod intervention_policy;
pub mod intervention_service;
pub mod session_recorder;

// Persistence
pub mod session_store;

// Configuration & CLI
pub mod cli;
pub mod config_loader;

// Web server interface
pub mod app_state;
pub mod web;

#[cfg(test)]
mod test_utils;

pub use intervention_policy::{InterventionPolicy, RiskAssessment, RiskSignal};
pub use intervention_service::{InterventionResponse, InterventionService};
pub use session_store::{InterventionLevel, SessionRecord, SessionStore, SqliteSessionStore};
