// storefront/src/web/handlers/checkout_handlers.rs

use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use tracing::{info, instrument};

use crate::errors::AppError;
use crate::models::CartLine;
use crate::operations;
use crate::state::AppState;

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CheckoutRequestPayload {
  /// Falls back to the `Idempotency-Key` header when absent.
  #[serde(default)]
  pub idempotency_token: Option<String>,
  pub items: Vec<CartLine>,
}

#[instrument(name = "handler::start_checkout", skip(app_state, req, payload), fields(items = payload.items.len()))]
pub async fn start_checkout_handler(
  app_state: web::Data<AppState>,
  req: HttpRequest,
  payload: web::Json<CheckoutRequestPayload>,
) -> Result<HttpResponse, AppError> {
  let payload = payload.into_inner();
  let token = payload
    .idempotency_token
    .or_else(|| {
      req
        .headers()
        .get("Idempotency-Key")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
    })
    .unwrap_or_default();

  let response = operations::initiate_checkout(app_state.get_ref(), &token, payload.items).await?;
  info!(order_id = %response.order_id, outcome = ?response.outcome, "Checkout initiated.");
  Ok(HttpResponse::Ok().json(response))
}
