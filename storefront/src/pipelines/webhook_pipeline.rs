// storefront/src/pipelines/webhook_pipeline.rs

//! Payment completion events. Delivery is at-least-once, so every step tolerates replays:
//! the PENDING -> PAID write is guarded and a replay finds nothing to do.

use crate::errors::{AppError, Result};
use crate::models::{OrderPatch, OrderStatus, StatusGuard};
use crate::pipelines::contexts::{PaymentEventCtxData, PaymentEventOutcome};
use crate::pipelines::skip_when;
use crate::pricing::format_minor_units;
use crate::services::email::payment_confirmation_email;
use crate::services::payment::GatewayEvent;
use chrono::Utc;
use lightbox_flow::{ContextData, Pipeline, PipelineControl, Registry};
use tracing::{info, instrument, warn};

pub fn register_webhook_pipeline(registry: &Registry<AppError>) {
  let mut p = Pipeline::<PaymentEventCtxData, AppError>::new(
    "payment_event",
    &[
      ("verify_event", false, None),
      ("locate_order", false, None),
      ("mark_paid", false, None),
      (
        "send_payment_confirmation",
        true,
        skip_when(|ctx: &PaymentEventCtxData| !ctx.newly_paid),
      ),
    ],
  );

  p.on("verify_event", verify_event);
  p.on("locate_order", locate_order);
  p.on("mark_paid", mark_paid);
  p.on("send_payment_confirmation", send_payment_confirmation);

  registry.register_pipeline(p);
  info!("Payment event pipeline registered.");
}

fn ignore(ctx: &ContextData<PaymentEventCtxData>, reason: impl Into<String>) -> Result<PipelineControl> {
  let reason = reason.into();
  info!(%reason, "Payment event acknowledged and ignored.");
  ctx.update(|c| c.outcome = Some(PaymentEventOutcome::Ignored { reason }));
  Ok(PipelineControl::Stop)
}

#[instrument(name = "payment_event::verify", skip_all, err(Display))]
async fn verify_event(ctx: ContextData<PaymentEventCtxData>) -> Result<PipelineControl> {
  let (state, payload, signature) = ctx.with(|c| (c.app_state.clone(), c.payload.clone(), c.signature.clone()));
  let signature = signature.ok_or_else(|| AppError::SignatureInvalid("missing signature header".to_string()))?;

  let event = state.payments.parse_event(&payload, &signature)?;
  ctx.update(|c| c.event = Some(event.clone()));

  match event {
    GatewayEvent::Other { event_id, event_type } => {
      ignore(&ctx, format!("event {} of type {} is not handled", event_id, event_type))
    }
    GatewayEvent::SessionCompleted(completion) if !completion.paid => ignore(
      &ctx,
      format!("session {} completed without payment yet", completion.session_id),
    ),
    GatewayEvent::SessionCompleted(completion) => {
      info!(event_id = %completion.event_id, session_id = %completion.session_id, "Verified completion event.");
      ctx.update(|c| c.completion = Some(completion));
      Ok(PipelineControl::Continue)
    }
  }
}

#[instrument(name = "payment_event::locate_order", skip_all, err(Display))]
async fn locate_order(ctx: ContextData<PaymentEventCtxData>) -> Result<PipelineControl> {
  let (state, completion) = ctx.with(|c| (c.app_state.clone(), c.completion.clone()));
  let completion = completion.ok_or_else(|| AppError::Internal("no completion to locate".to_string()))?;

  let mut order = state.orders.find_by_session_ref(&completion.session_id).await?;
  if order.is_none() {
    // The event can outrun the write that attaches the session to the order.
    if let Some(order_id) = &completion.order_id {
      order = state.orders.find(order_id).await?;
    }
  }
  let Some(order) = order else {
    warn!(session_id = %completion.session_id, order_id = ?completion.order_id, "Completion event for an unknown order.");
    return ignore(&ctx, format!("no order for session {}", completion.session_id));
  };

  if let Some(attached) = &order.payment_session_ref {
    if attached != &completion.session_id {
      warn!(order_id = %order.id, attached = %attached, paid_session = %completion.session_id, "Order paid through a session other than the attached one.");
    }
  }
  if let Some(total) = completion.amount_total {
    if total != order.total_amount_minor_units {
      warn!(order_id = %order.id, expected = order.total_amount_minor_units, paid = total, "Paid amount differs from the order total.");
    }
  }

  ctx.update(|c| c.order = Some(order));
  Ok(PipelineControl::Continue)
}

#[instrument(name = "payment_event::mark_paid", skip_all, err(Display))]
async fn mark_paid(ctx: ContextData<PaymentEventCtxData>) -> Result<PipelineControl> {
  let (state, order, completion) = ctx.with(|c| (c.app_state.clone(), c.order.clone(), c.completion.clone()));
  let (Some(order), Some(completion)) = (order, completion) else {
    return Err(AppError::Internal("mark_paid reached without order and event".to_string()));
  };

  let patch = OrderPatch::transition(OrderStatus::Paid, Utc::now()).with_customer_email(completion.customer_email.clone());
  match state
    .orders
    .update_where(&order.id, StatusGuard::only(OrderStatus::Pending), patch)
    .await?
  {
    Some(updated) => {
      info!(order_id = %updated.id, event_id = %completion.event_id, "Order marked PAID.");
      ctx.update(|c| {
        c.outcome = Some(PaymentEventOutcome::MarkedPaid {
          order_id: updated.id.clone(),
        });
        c.order = Some(updated);
        c.newly_paid = true;
      });
    }
    None => {
      let current = state.orders.find(&order.id).await?.unwrap_or(order);
      if current.status == OrderStatus::Canceled {
        warn!(order_id = %current.id, "Payment completed for a canceled order.");
      } else {
        info!(order_id = %current.id, status = %current.status, "Completion replayed; order already past PENDING.");
      }
      ctx.update(|c| {
        c.outcome = Some(PaymentEventOutcome::AlreadyProcessed {
          order_id: current.id.clone(),
          status: current.status,
        });
        c.order = Some(current);
      });
    }
  }
  Ok(PipelineControl::Continue)
}

/// Best effort: the payment is recorded whether or not this email goes out.
async fn send_payment_confirmation(ctx: ContextData<PaymentEventCtxData>) -> Result<PipelineControl> {
  let (state, order) = ctx.with(|c| (c.app_state.clone(), c.order.clone()));
  let Some(order) = order else {
    return Ok(PipelineControl::Continue);
  };
  let Some(to) = order.customer_email.clone() else {
    info!(order_id = %order.id, "No payer email; skipping payment confirmation.");
    return Ok(PipelineControl::Continue);
  };

  let amount = format_minor_units(order.total_amount_minor_units, &order.currency);
  let message = payment_confirmation_email(&to, &order.id, &amount, &state.config.store_name);
  match state.mailer.send(&message).await {
    Ok(()) => {
      info!(order_id = %order.id, "Payment confirmation sent.");
      ctx.update(|c| c.confirmation_sent = true);
    }
    Err(e) => warn!(order_id = %order.id, error = %e, "Payment confirmation email failed."),
  }
  Ok(PipelineControl::Continue)
}
