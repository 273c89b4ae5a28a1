// storefront/src/pipelines/fulfillment_pipeline.rs

//! Manual delivery: store the originals, sign a download link per file, email the links,
//! and only then mark the order SENT.

use crate::errors::{AppError, Result};
use crate::models::{OrderPatch, OrderStatus, StatusGuard};
use crate::pipelines::contexts::{DeliveryFile, FulfillmentCtxData, StoredFile};
use crate::pipelines::skip_when;
use crate::services::email::{delivery_email, DeliveryLink};
use crate::services::storage::{belongs_to_order, delivery_object_path, sanitize_file_name};
use chrono::Utc;
use futures_util::future::try_join_all;
use lightbox_flow::{ContextData, Pipeline, PipelineControl, Registry};
use tracing::{info, instrument, warn};

pub fn register_fulfillment_pipeline(registry: &Registry<AppError>) {
  let mut p = Pipeline::<FulfillmentCtxData, AppError>::new(
    "fulfillment",
    &[
      ("load_order", false, None),
      ("store_files", false, None),
      ("sign_links", false, None),
      ("send_delivery_email", false, None),
      ("mark_sent", false, None),
    ],
  );

  p.before("load_order", check_request);
  p.on("load_order", load_order);
  p.on("store_files", store_files);
  p.set_skip_condition(
    "store_files",
    skip_when(|ctx: &FulfillmentCtxData| !ctx.has_inline_files()),
  );
  p.on("sign_links", sign_links);
  p.on("send_delivery_email", send_delivery_email);
  p.on("mark_sent", mark_sent);

  registry.register_pipeline(p);
  info!("Fulfillment pipeline registered.");
}

/// Checks that depend only on the request itself.
async fn check_request(ctx: ContextData<FulfillmentCtxData>) -> Result<PipelineControl> {
  let (order_id, max_bytes) = ctx.with(|c| (c.order_id.trim().to_string(), c.app_state.config.max_upload_bytes));
  if order_id.is_empty() {
    return Err(AppError::InvalidRequest("order id is required".to_string()));
  }
  let oversized = ctx.with(|c| {
    c.files.iter().find_map(|f| match f {
      DeliveryFile::Inline { name, bytes, .. } if bytes.len() > max_bytes => Some(name.clone()),
      _ => None,
    })
  });
  if let Some(name) = oversized {
    return Err(AppError::InvalidRequest(format!(
      "file '{}' exceeds the {} byte limit",
      name, max_bytes
    )));
  }
  ctx.update(|c| c.order_id = order_id);
  Ok(PipelineControl::Continue)
}

#[instrument(name = "fulfillment::load_order", skip_all, err(Display))]
async fn load_order(ctx: ContextData<FulfillmentCtxData>) -> Result<PipelineControl> {
  let (state, order_id) = ctx.with(|c| (c.app_state.clone(), c.order_id.clone()));
  let order = state
    .orders
    .find(&order_id)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("order {}", order_id)))?;

  if !matches!(order.status, OrderStatus::Paid | OrderStatus::Sent) {
    return Err(AppError::InvalidState(format!(
      "order {} is {}; only PAID or SENT orders can be delivered",
      order.id, order.status
    )));
  }
  let recipient = order
    .customer_email
    .as_deref()
    .map(str::trim)
    .filter(|e| !e.is_empty())
    .map(str::to_string)
    .ok_or_else(|| AppError::MissingRecipient(order.id.clone()))?;

  let files = ctx.with(|c| c.files.clone());
  if files.is_empty() {
    return Err(AppError::InvalidRequest("at least one file is required".to_string()));
  }
  let mut staged = Vec::new();
  for file in &files {
    if let DeliveryFile::Staged { path, name } = file {
      if !belongs_to_order(&order.id, path) {
        return Err(AppError::InvalidRequest(format!(
          "'{}' is not a delivery path of order {}",
          path, order.id
        )));
      }
      staged.push(StoredFile {
        name: name
          .as_deref()
          .map(sanitize_file_name)
          .unwrap_or_else(|| sanitize_file_name(path)),
        path: path.clone(),
      });
    }
  }

  // With inline files present, store_files lays out every file in request order.
  ctx.update(|c| {
    c.order = Some(order);
    c.recipient = Some(recipient);
    if !c.has_inline_files() {
      c.stored = staged;
    }
  });
  Ok(PipelineControl::Continue)
}

#[instrument(name = "fulfillment::store_files", skip_all, err(Display))]
async fn store_files(ctx: ContextData<FulfillmentCtxData>) -> Result<PipelineControl> {
  let (state, order_id, files) = ctx.with(|c| (c.app_state.clone(), c.order_id.clone(), c.files.clone()));
  let bucket = state.config.delivery_bucket.clone();
  let stamp = Utc::now().timestamp_millis();

  let uploads = files.into_iter().map(|file| {
    let state = state.clone();
    let bucket = bucket.clone();
    let order_id = order_id.clone();
    async move {
      match file {
        DeliveryFile::Inline {
          name,
          content_type,
          bytes,
        } => {
          let safe_name = sanitize_file_name(&name);
          let path = delivery_object_path(&order_id, &safe_name, stamp);
          let content_type = if content_type.contains('/') {
            content_type
          } else {
            "application/octet-stream".to_string()
          };
          state.blobs.upload(&bucket, &path, bytes, &content_type).await?;
          info!(%path, "Delivery file stored.");
          Ok::<_, AppError>(StoredFile { name: safe_name, path })
        }
        DeliveryFile::Staged { path, name } => Ok(StoredFile {
          name: sanitize_file_name(name.as_deref().unwrap_or(&path)),
          path,
        }),
      }
    }
  });
  let stored = try_join_all(uploads).await?;

  ctx.update(|c| c.stored = stored);
  Ok(PipelineControl::Continue)
}

#[instrument(name = "fulfillment::sign_links", skip_all, err(Display))]
async fn sign_links(ctx: ContextData<FulfillmentCtxData>) -> Result<PipelineControl> {
  let (state, stored) = ctx.with(|c| (c.app_state.clone(), c.stored.clone()));
  let bucket = &state.config.delivery_bucket;
  let expiry = state.config.signed_url_expiry;

  let links = try_join_all(stored.iter().map(|file| async {
    let url = state.blobs.signed_url(bucket, &file.path, expiry).await?;
    Ok::<_, AppError>(DeliveryLink {
      name: file.name.clone(),
      url,
    })
  }))
  .await?;

  ctx.update(|c| c.links = links);
  Ok(PipelineControl::Continue)
}

#[instrument(name = "fulfillment::send_delivery_email", skip_all, err(Display))]
async fn send_delivery_email(ctx: ContextData<FulfillmentCtxData>) -> Result<PipelineControl> {
  let (state, order_id, recipient, subject, message, links) = ctx.with(|c| {
    (
      c.app_state.clone(),
      c.order_id.clone(),
      c.recipient.clone(),
      c.subject.clone(),
      c.message.clone(),
      c.links.clone(),
    )
  });
  let recipient = recipient.ok_or_else(|| AppError::MissingRecipient(order_id.clone()))?;
  let store_name = &state.config.store_name;

  let subject = subject
    .map(|s| s.trim().to_string())
    .filter(|s| !s.is_empty())
    .unwrap_or_else(|| format!("Your {} photos (order {})", store_name, order_id));
  let message = message
    .map(|m| m.trim().to_string())
    .filter(|m| !m.is_empty())
    .unwrap_or_else(|| "Hello,\n\nThank you for your purchase! Here are your photos:".to_string());

  let email = delivery_email(&recipient, &subject, &message, &links, store_name);
  if let Err(e) = state.mailer.send(&email).await {
    warn!(order_id = %order_id, error = %e, "Delivery email failed; order left unchanged.");
    return Err(e);
  }
  info!(order_id = %order_id, files = links.len(), "Delivery email sent.");
  ctx.update(|c| c.email_sent = true);
  Ok(PipelineControl::Continue)
}

#[instrument(name = "fulfillment::mark_sent", skip_all, err(Display))]
async fn mark_sent(ctx: ContextData<FulfillmentCtxData>) -> Result<PipelineControl> {
  let (state, order_id) = ctx.with(|c| (c.app_state.clone(), c.order_id.clone()));
  let updated = state
    .orders
    .update_where(
      &order_id,
      StatusGuard::OneOf(vec![OrderStatus::Paid, OrderStatus::Sent]),
      OrderPatch::transition(OrderStatus::Sent, Utc::now()),
    )
    .await?;

  let Some(updated) = updated else {
    let status = state.orders.find(&order_id).await?.map(|o| o.status);
    warn!(order_id = %order_id, ?status, "Order changed while its files were being delivered.");
    return Err(AppError::InvalidState(format!(
      "order {} left PAID/SENT during delivery; email was already sent",
      order_id
    )));
  };
  info!(order_id = %order_id, "Order marked SENT.");
  ctx.update(|c| c.order = Some(updated));
  Ok(PipelineControl::Continue)
}
