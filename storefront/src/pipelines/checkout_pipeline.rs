// storefront/src/pipelines/checkout_pipeline.rs

//! Checkout: price the cart, record a PENDING order under the caller's idempotency token
//! and hand back a payment page for exactly that amount.

use crate::errors::{AppError, Result};
use crate::models::{CartLine, InsertOutcome, NewOrder, OrderPatch, OrderStatus, StatusGuard};
use crate::pipelines::contexts::{CheckoutCtxData, CheckoutOutcome};
use crate::pipelines::skip_when;
use crate::services::payment::{CheckoutSessionRequest, SessionStatus};
use lightbox_flow::{ContextData, Pipeline, PipelineControl, Registry};
use std::collections::BTreeMap;
use tracing::{debug, info, instrument, warn};

const MAX_TOKEN_CHARS: usize = 128;

pub fn register_checkout_pipeline(registry: &Registry<AppError>) {
  let mut p = Pipeline::<CheckoutCtxData, AppError>::new(
    "checkout",
    &[
      ("validate_cart", false, None),
      ("price_order", false, None),
      ("record_order", false, None),
      (
        "resolve_existing_order",
        false,
        skip_when(|ctx: &CheckoutCtxData| ctx.freshly_inserted),
      ),
      (
        "create_payment_session",
        false,
        skip_when(|ctx: &CheckoutCtxData| ctx.redirect_url.is_some()),
      ),
      (
        "attach_session",
        false,
        skip_when(|ctx: &CheckoutCtxData| ctx.session.is_none()),
      ),
    ],
  );

  p.on("validate_cart", validate_cart);
  p.on("price_order", price_order);
  p.on("record_order", record_order);
  p.on("resolve_existing_order", resolve_existing_order);
  p.on("create_payment_session", create_payment_session);
  p.on("attach_session", attach_session);

  registry.register_pipeline(p);
  info!("Checkout pipeline registered.");
}

/// Accepts ASCII letters, digits and `-_:.`, at most 128 characters after trimming.
pub fn validate_token(raw: &str) -> Result<String> {
  let token = raw.trim();
  if token.is_empty() {
    return Err(AppError::InvalidRequest("idempotency token is required".to_string()));
  }
  if token.len() > MAX_TOKEN_CHARS {
    return Err(AppError::InvalidRequest(format!(
      "idempotency token exceeds {} characters",
      MAX_TOKEN_CHARS
    )));
  }
  if !token
    .chars()
    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':' | '.'))
  {
    return Err(AppError::InvalidRequest(
      "idempotency token may only contain letters, digits and -_:.".to_string(),
    ));
  }
  Ok(token.to_string())
}

/// Trims product ids, merges repeated products and sorts by product id, so two
/// submissions of the same cart compare equal.
pub fn normalize_lines(lines: &[CartLine]) -> Result<Vec<CartLine>> {
  if lines.is_empty() {
    return Err(AppError::EmptyCart);
  }
  let mut merged: BTreeMap<String, i64> = BTreeMap::new();
  for line in lines {
    let product_id = line.product_id.trim();
    if product_id.is_empty() {
      return Err(AppError::InvalidRequest("every cart line needs a product id".to_string()));
    }
    if line.quantity <= 0 {
      return Err(AppError::InvalidRequest(format!(
        "quantity for '{}' must be positive",
        product_id
      )));
    }
    let total = merged.entry(product_id.to_string()).or_insert(0);
    *total = total
      .checked_add(line.quantity)
      .ok_or_else(|| AppError::InvalidRequest("quantity overflow".to_string()))?;
  }
  Ok(
    merged
      .into_iter()
      .map(|(product_id, quantity)| CartLine { product_id, quantity })
      .collect(),
  )
}

#[instrument(name = "checkout::validate_cart", skip_all, err(Display))]
async fn validate_cart(ctx: ContextData<CheckoutCtxData>) -> Result<PipelineControl> {
  let (raw_token, lines, max_photos) = ctx.with(|c| {
    (
      c.token.clone(),
      c.lines.clone(),
      c.app_state.config.max_photos_per_order,
    )
  });

  let token = validate_token(&raw_token)?;
  let normalized = normalize_lines(&lines)?;
  let photo_count: i64 = normalized.iter().map(|l| l.quantity).sum();
  if photo_count > i64::from(max_photos) {
    return Err(AppError::InvalidRequest(format!(
      "an order may hold at most {} photos",
      max_photos
    )));
  }
  let photo_count = u32::try_from(photo_count)
    .map_err(|_| AppError::InvalidRequest("photo count out of range".to_string()))?;

  ctx.update(|c| {
    c.token = token;
    c.normalized_lines = normalized;
    c.photo_count = photo_count;
  });
  Ok(PipelineControl::Continue)
}

async fn price_order(ctx: ContextData<CheckoutCtxData>) -> Result<PipelineControl> {
  ctx.update(|c| {
    c.amount_minor_units = c.app_state.config.price_table.price_for(c.photo_count);
    info!(
      order_id = %c.token,
      photo_count = c.photo_count,
      amount = c.amount_minor_units,
      "Cart priced."
    );
  });
  Ok(PipelineControl::Continue)
}

#[instrument(name = "checkout::record_order", skip_all, err(Display))]
async fn record_order(ctx: ContextData<CheckoutCtxData>) -> Result<PipelineControl> {
  let (state, new_order) = ctx.with(|c| {
    (
      c.app_state.clone(),
      NewOrder {
        id: c.token.clone(),
        total_amount_minor_units: c.amount_minor_units,
        currency: c.app_state.config.currency.clone(),
        line_items: c.normalized_lines.clone(),
        photo_count: c.photo_count,
      },
    )
  });

  let (order, fresh) = match state.orders.insert_if_absent(new_order.clone()).await? {
    InsertOutcome::Inserted(order) => {
      info!(order_id = %order.id, "Order recorded as PENDING.");
      (order, true)
    }
    InsertOutcome::Existing(order) => {
      if order.line_items != new_order.line_items {
        warn!(order_id = %order.id, "Idempotency token reused with a different cart.");
        return Err(AppError::InvalidRequest(
          "this checkout token was already used for a different cart".to_string(),
        ));
      }
      info!(order_id = %order.id, status = %order.status, "Checkout retried for an existing order.");
      (order, false)
    }
  };

  ctx.update(|c| {
    c.session_key = Some(order.id.clone());
    c.order = Some(order);
    c.freshly_inserted = fresh;
  });
  Ok(PipelineControl::Continue)
}

#[instrument(name = "checkout::resolve_existing_order", skip_all, err(Display))]
async fn resolve_existing_order(ctx: ContextData<CheckoutCtxData>) -> Result<PipelineControl> {
  let (state, order) = ctx.with(|c| (c.app_state.clone(), c.order.clone()));
  let order = order.ok_or_else(|| AppError::Internal("checkout reached resolution without an order".to_string()))?;

  match order.status {
    OrderStatus::Paid | OrderStatus::Sent => {
      let url = state.config.completed_url(&order.id);
      ctx.update(|c| {
        c.redirect_url = Some(url);
        c.outcome = Some(CheckoutOutcome::AlreadyCompleted);
      });
      return Ok(PipelineControl::Continue);
    }
    OrderStatus::Canceled => {
      return Err(AppError::InvalidState(format!("order {} was canceled", order.id)));
    }
    OrderStatus::Pending => {}
  }

  // A previous attempt failed before a session was attached; retry with the same key.
  let Some(session_ref) = order.payment_session_ref.clone() else {
    return Ok(PipelineControl::Continue);
  };

  let session = state.payments.retrieve_session(&session_ref).await?;
  match (session.status, session.url.clone()) {
    (SessionStatus::Open, Some(url)) => {
      info!(order_id = %order.id, session_id = %session.id, "Reusing open payment session.");
      ctx.update(|c| {
        c.redirect_url = Some(url);
        c.outcome = Some(CheckoutOutcome::Resumed);
      });
    }
    (SessionStatus::Complete, _) => {
      // Paid but the completion event has not been processed yet.
      let url = state.config.completed_url(&order.id);
      ctx.update(|c| {
        c.redirect_url = Some(url);
        c.outcome = Some(CheckoutOutcome::AlreadyCompleted);
      });
    }
    (SessionStatus::Expired, _) | (SessionStatus::Open, None) => {
      info!(order_id = %order.id, expired_session = %session.id, "Payment session expired; issuing a replacement.");
      ctx.update(|c| {
        c.session_key = Some(format!("{}:{}", order.id, session.id));
        c.outcome = Some(CheckoutOutcome::Renewed);
      });
    }
  }
  Ok(PipelineControl::Continue)
}

#[instrument(name = "checkout::create_payment_session", skip_all, err(Display))]
async fn create_payment_session(ctx: ContextData<CheckoutCtxData>) -> Result<PipelineControl> {
  let (state, request) = ctx.with(|c| {
    let cfg = &c.app_state.config;
    // A recorded order keeps the total and currency it was created with.
    let (amount_minor_units, currency, photo_count) = match &c.order {
      Some(order) => (order.total_amount_minor_units, order.currency.clone(), order.photo_count),
      None => (c.amount_minor_units, cfg.currency.clone(), c.photo_count),
    };
    (
      c.app_state.clone(),
      CheckoutSessionRequest {
        order_id: c.token.clone(),
        amount_minor_units,
        currency,
        description: format!("{}: {} photo(s)", cfg.store_name, photo_count),
        success_url: cfg.success_url(),
        cancel_url: cfg.cancel_url(),
        idempotency_key: c.session_key.clone().unwrap_or_else(|| c.token.clone()),
      },
    )
  });

  debug!(order_id = %request.order_id, gateway = state.payments.name(), amount = request.amount_minor_units, "Requesting payment session.");
  let session = state.payments.create_checkout_session(&request).await?;
  if let Some(total) = session.amount_total {
    if total != request.amount_minor_units {
      warn!(order_id = %request.order_id, expected = request.amount_minor_units, got = total, "Gateway session total differs from the order total.");
    }
  }
  ctx.update(|c| c.session = Some(session));
  Ok(PipelineControl::Continue)
}

#[instrument(name = "checkout::attach_session", skip_all, err(Display))]
async fn attach_session(ctx: ContextData<CheckoutCtxData>) -> Result<PipelineControl> {
  let (state, order_id, session) = ctx.with(|c| (c.app_state.clone(), c.token.clone(), c.session.clone()));
  let session = session.ok_or_else(|| AppError::Internal("no session to attach".to_string()))?;

  let attached = state
    .orders
    .update_where(&order_id, StatusGuard::only(OrderStatus::Pending), OrderPatch::session_ref(&session.id))
    .await?;

  if attached.is_none() {
    // The order left PENDING between recording and now.
    let current = state
      .orders
      .find(&order_id)
      .await?
      .ok_or_else(|| AppError::NotFound(format!("order {}", order_id)))?;
    let status = current.status;
    return match status {
      OrderStatus::Paid | OrderStatus::Sent => {
        let url = state.config.completed_url(&order_id);
        ctx.update(|c| {
          c.order = Some(current);
          c.redirect_url = Some(url);
          c.outcome = Some(CheckoutOutcome::AlreadyCompleted);
        });
        Ok(PipelineControl::Continue)
      }
      status => Err(AppError::InvalidState(format!("order {} is {}", order_id, status))),
    };
  }

  let url = session
    .url
    .clone()
    .ok_or_else(|| AppError::GatewayRejected(format!("session {} has no payment URL", session.id)))?;
  info!(order_id = %order_id, session_id = %session.id, "Payment session attached.");
  ctx.update(|c| {
    c.order = attached;
    c.redirect_url = Some(url);
    if c.outcome.is_none() {
      c.outcome = Some(if c.freshly_inserted {
        CheckoutOutcome::Created
      } else {
        CheckoutOutcome::Resumed
      });
    }
  });
  Ok(PipelineControl::Continue)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn line(product_id: &str, quantity: i64) -> CartLine {
    CartLine {
      product_id: product_id.to_string(),
      quantity,
    }
  }

  #[test]
  fn tokens_are_trimmed_and_checked() {
    assert_eq!(validate_token("  tok-A ").unwrap(), "tok-A");
    assert!(validate_token("cart:2024.01_x-y").is_ok());
    assert!(validate_token("   ").is_err());
    assert!(validate_token("has space").is_err());
    assert!(validate_token(&"a".repeat(129)).is_err());
  }

  #[test]
  fn lines_are_merged_and_sorted() {
    let normalized = normalize_lines(&[line("b", 1), line(" a ", 2), line("b", 3)]).unwrap();
    assert_eq!(normalized, vec![line("a", 2), line("b", 4)]);
  }

  #[test]
  fn bad_lines_are_rejected() {
    assert!(matches!(normalize_lines(&[]), Err(AppError::EmptyCart)));
    assert!(matches!(normalize_lines(&[line("a", 0)]), Err(AppError::InvalidRequest(_))));
    assert!(matches!(normalize_lines(&[line("a", -2)]), Err(AppError::InvalidRequest(_))));
    assert!(matches!(normalize_lines(&[line(" ", 1)]), Err(AppError::InvalidRequest(_))));
  }
}
