// storefront/src/web/handlers/webhook_handlers.rs

use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::json;
use tracing::{info, instrument};

use crate::errors::AppError;
use crate::operations;
use crate::state::AppState;

/// Stripe retries anything but a 2xx, so only signature failures and transient errors
/// produce one.
#[instrument(name = "handler::stripe_webhook", skip(app_state, req, body), fields(size = body.len()))]
pub async fn stripe_webhook_handler(
  app_state: web::Data<AppState>,
  req: HttpRequest,
  body: web::Bytes,
) -> Result<HttpResponse, AppError> {
  let signature = req
    .headers()
    .get("Stripe-Signature")
    .and_then(|h| h.to_str().ok())
    .map(str::to_string);

  let outcome = operations::handle_payment_event(app_state.get_ref(), body.to_vec(), signature).await?;
  info!(?outcome, "Webhook processed.");
  Ok(HttpResponse::Ok().json(json!({ "received": true, "outcome": outcome })))
}
