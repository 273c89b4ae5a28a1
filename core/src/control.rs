// core/src/control.rs

//! Flow signals returned by handlers and the outcome of a full run.

/// Returned by every handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineControl {
  /// Keep going with the remaining handlers and steps.
  Continue,
  /// Halt the run; nothing after the current handler executes.
  Stop,
}

/// Outcome of [`Pipeline::run`](crate::Pipeline::run).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineResult {
  /// Every step ran (or was skipped by its condition).
  Completed,
  /// A handler returned [`PipelineControl::Stop`].
  Stopped,
}
