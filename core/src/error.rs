// core/src/error.rs
use thiserror::Error;

/// Errors raised by the runner itself, as opposed to errors returned by handlers.
///
/// Pipelines require their handler error type to be `From<FlowError>` so these can be
/// surfaced through the same `Result`.
#[derive(Debug, Error)]
pub enum FlowError {
  #[error("Handler missing for non-optional step: {step_name}")]
  HandlerMissing { step_name: String },

  #[error("No pipeline registered for context type {type_name}")]
  NotRegistered { type_name: &'static str },

  #[error("Context type mismatch in registry dispatch (expected {expected_type})")]
  TypeMismatch { expected_type: &'static str },
}
