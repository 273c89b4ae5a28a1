// storefront/src/operations.rs

//! The storefront's public operations. HTTP handlers and tests both go through here;
//! multi-step operations run as workflows on `AppState::flows`.

use crate::errors::{AppError, Result};
use crate::models::{CartLine, Order, OrderFilter};
use crate::pipelines::contexts::{
  CheckoutCtxData, CheckoutOutcome, DeliveryFile, FulfillmentCtxData, PaymentEventCtxData, PaymentEventOutcome,
  StatusOverrideCtxData,
};
use crate::pricing::PriceQuote;
use crate::services::email::DeliveryLink;
use crate::services::storage::{sanitize_file_name, staged_object_path, SignedUpload};
use crate::state::AppState;
use chrono::Utc;
use lightbox_flow::{ContextData, PipelineResult};
use serde::Serialize;
use tracing::{debug, info, instrument};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
  pub order_id: String,
  pub redirect_url: String,
  pub outcome: CheckoutOutcome,
  pub amount_minor_units: i64,
  pub currency: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryReceipt {
  pub order: Order,
  pub files: Vec<DeliveryLink>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryUpload {
  #[serde(flatten)]
  pub upload: SignedUpload,
  pub content_type: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteResponse {
  #[serde(flatten)]
  pub quote: PriceQuote,
  pub currency: String,
}

fn log_result(workflow: &str, result: PipelineResult) {
  debug!(workflow, ?result, "Workflow finished.");
}

/// Prices the cart, records the order and returns where to send the customer.
#[instrument(name = "op::initiate_checkout", skip(state, lines), fields(lines = lines.len()), err(Display))]
pub async fn initiate_checkout(state: &AppState, token: &str, lines: Vec<CartLine>) -> Result<CheckoutResponse> {
  let ctx = ContextData::new(CheckoutCtxData::new(state.clone(), token.to_string(), lines));
  log_result("checkout", state.flows.run(ctx.clone()).await?);

  ctx.with(|c| {
    let redirect_url = c
      .redirect_url
      .clone()
      .ok_or_else(|| AppError::Internal("checkout finished without a redirect".to_string()))?;
    Ok(CheckoutResponse {
      order_id: c.token.clone(),
      redirect_url,
      outcome: c.outcome.unwrap_or(CheckoutOutcome::Created),
      amount_minor_units: c
        .order
        .as_ref()
        .map_or(c.amount_minor_units, |o| o.total_amount_minor_units),
      currency: c
        .order
        .as_ref()
        .map_or_else(|| state.config.currency.clone(), |o| o.currency.clone()),
    })
  })
}

/// Verifies and applies a gateway event. Replays and irrelevant events succeed quietly.
#[instrument(name = "op::handle_payment_event", skip_all, fields(size = payload.len()), err(Display))]
pub async fn handle_payment_event(
  state: &AppState,
  payload: Vec<u8>,
  signature: Option<String>,
) -> Result<PaymentEventOutcome> {
  let ctx = ContextData::new(PaymentEventCtxData::new(state.clone(), payload, signature));
  log_result("payment_event", state.flows.run(ctx.clone()).await?);
  ctx.with(|c| {
    c.outcome
      .clone()
      .ok_or_else(|| AppError::Internal("payment event finished without an outcome".to_string()))
  })
}

#[instrument(name = "op::set_order_status", skip(state), err(Display))]
pub async fn set_order_status(state: &AppState, order_id: &str, requested: &str) -> Result<Order> {
  let ctx = ContextData::new(StatusOverrideCtxData::new(
    state.clone(),
    order_id.to_string(),
    requested.to_string(),
  ));
  log_result("status_override", state.flows.run(ctx.clone()).await?);
  ctx.with(|c| {
    c.order
      .clone()
      .ok_or_else(|| AppError::Internal("status override finished without an order".to_string()))
  })
}

#[instrument(name = "op::send_order_files", skip(state, subject, message, files), fields(files = files.len()), err(Display))]
pub async fn send_order_files(
  state: &AppState,
  order_id: &str,
  subject: Option<String>,
  message: Option<String>,
  files: Vec<DeliveryFile>,
) -> Result<DeliveryReceipt> {
  let ctx = ContextData::new(FulfillmentCtxData::new(
    state.clone(),
    order_id.to_string(),
    subject,
    message,
    files,
  ));
  log_result("fulfillment", state.flows.run(ctx.clone()).await?);
  ctx.with(|c| {
    let order = c
      .order
      .clone()
      .ok_or_else(|| AppError::Internal("fulfillment finished without an order".to_string()))?;
    Ok(DeliveryReceipt {
      order,
      files: c.links.clone(),
    })
  })
}

pub async fn list_orders(state: &AppState, filter: &OrderFilter) -> Result<Vec<Order>> {
  state.orders.list(filter).await
}

pub async fn get_order(state: &AppState, order_id: &str) -> Result<Order> {
  state
    .orders
    .find(order_id)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("order {}", order_id)))
}

/// Reserves an object path under the order and returns a URL to upload it to directly.
#[instrument(name = "op::create_delivery_upload", skip(state), err(Display))]
pub async fn create_delivery_upload(
  state: &AppState,
  order_id: &str,
  file_name: &str,
  content_type: Option<&str>,
) -> Result<DeliveryUpload> {
  if file_name.trim().is_empty() {
    return Err(AppError::InvalidRequest("fileName is required".to_string()));
  }
  let order = get_order(state, order_id).await?;
  let safe_name = sanitize_file_name(file_name);
  let path = staged_object_path(&order.id, &safe_name, Utc::now().timestamp_millis());

  let upload = state
    .blobs
    .signed_upload_url(&state.config.delivery_bucket, &path)
    .await?;
  info!(order_id = %order.id, %path, "Signed upload URL issued.");
  Ok(DeliveryUpload {
    upload,
    content_type: content_type
      .map(str::trim)
      .filter(|c| c.contains('/'))
      .unwrap_or("application/octet-stream")
      .to_string(),
  })
}

pub fn quote(state: &AppState, photo_count: u32) -> Result<QuoteResponse> {
  if photo_count > state.config.max_photos_per_order {
    return Err(AppError::InvalidRequest(format!(
      "an order may hold at most {} photos",
      state.config.max_photos_per_order
    )));
  }
  Ok(QuoteResponse {
    quote: state.config.price_table.quote(photo_count),
    currency: state.config.currency.clone(),
  })
}
