// storefront/src/web/routes.rs

use actix_web::web;

use crate::config::AppConfig;
use crate::errors::AppError;
use crate::web::handlers::{admin_handlers, checkout_handlers, pricing_handlers, webhook_handlers};

async fn health_check_handler() -> actix_web::HttpResponse {
  actix_web::HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

/// JSON extractor settings. The limit leaves room for base64-encoded delivery files.
pub fn json_config(config: &AppConfig) -> web::JsonConfig {
  let limit = config.max_upload_bytes.saturating_mul(4) / 3 + 64 * 1024;
  web::JsonConfig::default()
    .limit(limit)
    .error_handler(|err, _req| AppError::InvalidRequest(err.to_string()).into())
}

pub fn configure_app_routes(cfg: &mut web::ServiceConfig) {
  cfg.service(
    web::scope("/api/v1")
      .route("/health", web::get().to(health_check_handler))
      .route("/pricing/quote", web::get().to(pricing_handlers::quote_handler))
      .route("/checkout", web::post().to(checkout_handlers::start_checkout_handler))
      .route("/webhooks/stripe", web::post().to(webhook_handlers::stripe_webhook_handler))
      .service(
        web::scope("/admin/orders")
          .route("", web::get().to(admin_handlers::list_orders_handler))
          .route("/{order_id}", web::get().to(admin_handlers::get_order_handler))
          .route("/{order_id}/status", web::post().to(admin_handlers::set_status_handler))
          .route(
            "/{order_id}/delivery-upload",
            web::post().to(admin_handlers::delivery_upload_handler),
          )
          .route("/{order_id}/send", web::post().to(admin_handlers::send_files_handler)),
      ),
  );
}
