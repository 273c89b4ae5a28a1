// storefront/src/web/handlers/pricing_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::errors::AppError;
use crate::operations;
use crate::state::AppState;

#[derive(Deserialize, Debug)]
pub struct QuoteQuery {
  pub photos: u32,
}

pub async fn quote_handler(
  app_state: web::Data<AppState>,
  query: web::Query<QuoteQuery>,
) -> Result<HttpResponse, AppError> {
  let quote = operations::quote(app_state.get_ref(), query.photos)?;
  Ok(HttpResponse::Ok().json(quote))
}
