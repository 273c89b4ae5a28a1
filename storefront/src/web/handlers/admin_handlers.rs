// storefront/src/web/handlers/admin_handlers.rs

use actix_web::dev::Payload;
use actix_web::http::header::AUTHORIZATION;
use actix_web::{web, FromRequest, HttpRequest, HttpResponse};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use futures_util::future::LocalBoxFuture;
use serde::Deserialize;
use tracing::{info, instrument, warn};

use crate::errors::AppError;
use crate::models::{OrderFilter, OrderStatus};
use crate::operations;
use crate::pipelines::contexts::DeliveryFile;
use crate::state::AppState;

/// Present in a handler's arguments means the caller proved admin rights.
#[derive(Debug)]
pub struct AdminCaller;

impl FromRequest for AdminCaller {
  type Error = AppError;
  type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

  fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
    let state = req.app_data::<web::Data<AppState>>().cloned();
    let token = req
      .headers()
      .get(AUTHORIZATION)
      .and_then(|v| v.to_str().ok())
      .and_then(|v| v.strip_prefix("Bearer "))
      .map(|t| t.trim().to_string())
      .filter(|t| !t.is_empty());

    Box::pin(async move {
      let state = state.ok_or_else(|| AppError::Internal("application state missing".to_string()))?;
      if state.admins.is_admin(token.as_deref()).await? {
        Ok(AdminCaller)
      } else {
        warn!(token_present = token.is_some(), "Admin request refused.");
        Err(AppError::Unauthorized("admin credentials required".to_string()))
      }
    })
  }
}

// --- Request DTOs ---

#[derive(Deserialize, Debug)]
pub struct ListOrdersQuery {
  #[serde(default)]
  pub status: Option<String>,
  #[serde(default)]
  pub limit: Option<u32>,
}

#[derive(Deserialize, Debug)]
pub struct StatusChangePayload {
  pub status: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryUploadPayload {
  pub file_name: String,
  #[serde(default)]
  pub content_type: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineFilePayload {
  pub name: String,
  #[serde(default)]
  pub content_type: Option<String>,
  pub data_base64: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct StagedFilePayload {
  pub path: String,
  #[serde(default)]
  pub name: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendFilesPayload {
  #[serde(default)]
  pub subject: Option<String>,
  #[serde(default)]
  pub message: Option<String>,
  #[serde(default)]
  pub files: Vec<InlineFilePayload>,
  #[serde(default)]
  pub staged_files: Vec<StagedFilePayload>,
}

impl SendFilesPayload {
  fn into_delivery_files(self) -> Result<(Option<String>, Option<String>, Vec<DeliveryFile>), AppError> {
    let mut files = Vec::with_capacity(self.files.len() + self.staged_files.len());
    for file in self.files {
      let bytes = BASE64
        .decode(file.data_base64.trim())
        .map_err(|e| AppError::InvalidRequest(format!("file '{}' is not valid base64: {}", file.name, e)))?;
      if bytes.is_empty() {
        return Err(AppError::InvalidRequest(format!("file '{}' is empty", file.name)));
      }
      files.push(DeliveryFile::Inline {
        name: file.name,
        content_type: file.content_type.unwrap_or_default(),
        bytes,
      });
    }
    files.extend(
      self
        .staged_files
        .into_iter()
        .map(|f| DeliveryFile::Staged { path: f.path, name: f.name }),
    );
    Ok((self.subject, self.message, files))
  }
}

// --- Handler Implementations ---

#[instrument(name = "handler::admin_list_orders", skip(app_state, _admin))]
pub async fn list_orders_handler(
  app_state: web::Data<AppState>,
  _admin: AdminCaller,
  query: web::Query<ListOrdersQuery>,
) -> Result<HttpResponse, AppError> {
  let status = query.status.as_deref().map(OrderStatus::parse).transpose()?;
  let filter = OrderFilter {
    status,
    limit: query.limit,
  };
  let orders = operations::list_orders(app_state.get_ref(), &filter).await?;
  Ok(HttpResponse::Ok().json(orders))
}

pub async fn get_order_handler(
  app_state: web::Data<AppState>,
  _admin: AdminCaller,
  path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
  let order = operations::get_order(app_state.get_ref(), &path.into_inner()).await?;
  Ok(HttpResponse::Ok().json(order))
}

#[instrument(name = "handler::admin_set_status", skip(app_state, _admin, payload))]
pub async fn set_status_handler(
  app_state: web::Data<AppState>,
  _admin: AdminCaller,
  path: web::Path<String>,
  payload: web::Json<StatusChangePayload>,
) -> Result<HttpResponse, AppError> {
  let order = operations::set_order_status(app_state.get_ref(), &path.into_inner(), &payload.status).await?;
  Ok(HttpResponse::Ok().json(order))
}

#[instrument(name = "handler::admin_delivery_upload", skip(app_state, _admin, payload))]
pub async fn delivery_upload_handler(
  app_state: web::Data<AppState>,
  _admin: AdminCaller,
  path: web::Path<String>,
  payload: web::Json<DeliveryUploadPayload>,
) -> Result<HttpResponse, AppError> {
  let upload = operations::create_delivery_upload(
    app_state.get_ref(),
    &path.into_inner(),
    &payload.file_name,
    payload.content_type.as_deref(),
  )
  .await?;
  Ok(HttpResponse::Ok().json(upload))
}

#[instrument(name = "handler::admin_send_files", skip(app_state, _admin, payload))]
pub async fn send_files_handler(
  app_state: web::Data<AppState>,
  _admin: AdminCaller,
  path: web::Path<String>,
  payload: web::Json<SendFilesPayload>,
) -> Result<HttpResponse, AppError> {
  let order_id = path.into_inner();
  let (subject, message, files) = payload.into_inner().into_delivery_files()?;
  let receipt = operations::send_order_files(app_state.get_ref(), &order_id, subject, message, files).await?;
  info!(order_id = %order_id, files = receipt.files.len(), "Order files delivered.");
  Ok(HttpResponse::Ok().json(receipt))
}
