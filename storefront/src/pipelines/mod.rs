// storefront/src/pipelines/mod.rs

//! The storefront's workflows, each registered on the shared `Registry` under its
//! context type.

use crate::errors::AppError;
use lightbox_flow::{ContextData, Registry, SkipCondition};
use std::sync::Arc;

pub mod contexts;

pub mod checkout_pipeline;
pub mod fulfillment_pipeline;
pub mod status_pipeline;
pub mod webhook_pipeline;

/// Registers every workflow. Called once at startup.
pub fn register_all_pipelines(registry: &Registry<AppError>) {
  tracing::info!("Registering pipelines...");

  checkout_pipeline::register_checkout_pipeline(registry);
  webhook_pipeline::register_webhook_pipeline(registry);
  fulfillment_pipeline::register_fulfillment_pipeline(registry);
  status_pipeline::register_status_pipeline(registry);

  tracing::info!(count = registry.len(), "All pipelines registered.");
}

/// Skip condition evaluated against a read of the context.
pub(crate) fn skip_when<T>(predicate: impl Fn(&T) -> bool + Send + Sync + 'static) -> Option<SkipCondition<T>>
where
  T: Send + Sync + 'static,
{
  let condition: SkipCondition<T> = Arc::new(move |ctx: ContextData<T>| ctx.with(|data| predicate(data)));
  Some(condition)
}
