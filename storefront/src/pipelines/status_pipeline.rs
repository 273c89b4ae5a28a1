// storefront/src/pipelines/status_pipeline.rs

use crate::errors::{AppError, Result};
use crate::models::{OrderPatch, OrderStatus, StatusGuard};
use crate::pipelines::contexts::StatusOverrideCtxData;
use chrono::Utc;
use lightbox_flow::{ContextData, Pipeline, PipelineControl, Registry};
use tracing::{debug, info, instrument, warn};

/// Admin override: any status to any status, with `sent_at` following the target.
pub fn register_status_pipeline(registry: &Registry<AppError>) {
  let mut p = Pipeline::<StatusOverrideCtxData, AppError>::new(
    "status_override",
    &[("parse_target", false, None), ("apply_override", false, None)],
  );

  p.on("parse_target", |ctx: ContextData<StatusOverrideCtxData>| async move {
    let target = OrderStatus::parse(&ctx.with(|c| c.requested.clone()))?;
    ctx.update(|c| c.target = Some(target));
    Ok::<_, AppError>(PipelineControl::Continue)
  });

  p.on("apply_override", apply_override);
  p.after("apply_override", |ctx: ContextData<StatusOverrideCtxData>| async move {
    ctx.with(|c| {
      if let (Some(order), Some(previous)) = (&c.order, c.previous) {
        info!(
          audit = true,
          order_id = %order.id,
          previous_status = %previous,
          new_status = %order.status,
          "Admin changed order status."
        );
      }
    });
    Ok::<_, AppError>(PipelineControl::Continue)
  });

  registry.register_pipeline(p);
  info!("Status override pipeline registered.");
}

/// Guarded attempts before the override falls back to an unconditional write.
const OVERRIDE_ATTEMPTS: usize = 3;

#[instrument(name = "status_override::apply", skip_all, err(Display))]
async fn apply_override(ctx: ContextData<StatusOverrideCtxData>) -> Result<PipelineControl> {
  let (state, order_id, target) = ctx.with(|c| (c.app_state.clone(), c.order_id.clone(), c.target));
  let target = target.ok_or_else(|| AppError::Internal("status target not parsed".to_string()))?;

  // Writes only while the status is still the one read, so `previous` is exact for the audit line.
  let mut observed = None;
  for _ in 0..OVERRIDE_ATTEMPTS {
    let previous = state
      .orders
      .find(&order_id)
      .await?
      .ok_or_else(|| AppError::NotFound(format!("order {}", order_id)))?
      .status;

    if let Some(updated) = state
      .orders
      .update_where(&order_id, StatusGuard::only(previous), OrderPatch::transition(target, Utc::now()))
      .await?
    {
      ctx.update(|c| {
        c.previous = Some(previous);
        c.order = Some(updated);
      });
      return Ok(PipelineControl::Continue);
    }
    debug!(order_id = %order_id, observed = %previous, "Order status moved during override; re-reading.");
    observed = Some(previous);
  }

  // Still contended: the admin's write wins and `previous` is only the last status observed.
  warn!(order_id = %order_id, "Order kept changing during override; writing unconditionally.");
  let updated = state
    .orders
    .update_where(&order_id, StatusGuard::Any, OrderPatch::transition(target, Utc::now()))
    .await?
    .ok_or_else(|| AppError::NotFound(format!("order {}", order_id)))?;

  ctx.update(|c| {
    c.previous = observed;
    c.order = Some(updated);
  });
  Ok(PipelineControl::Continue)
}
