// core/src/lib.rs

//! Lightbox Flow: the asynchronous step runner behind the lightbox storefront.
//!
//! A workflow is a [`Pipeline`] of named steps sharing one [`ContextData`]. Each step
//! can carry `before`, `on` and `after` handlers, be marked optional, or be skipped by a
//! condition evaluated against the shared context. Handlers decide whether the run
//! continues through [`PipelineControl`].
//!
//! Pipelines are registered in a [`Registry`], keyed by the type of data they operate
//! on, so callers only need to build the context and call [`Registry::run`].

pub mod context;
pub mod control;
pub mod error;
pub mod pipeline;
pub mod registry;
pub mod step;

pub use crate::context::{ContextData, Handler};
pub use crate::control::{PipelineControl, PipelineResult};
pub use crate::error::FlowError;
pub use crate::pipeline::Pipeline;
pub use crate::registry::Registry;
pub use crate::step::{SkipCondition, StepDef};
