// storefront/src/pipelines/contexts.rs

//! Data carried through each workflow. Handlers receive these wrapped in `ContextData`.

use crate::models::{CartLine, Order, OrderStatus};
use crate::services::email::DeliveryLink;
use crate::services::payment::{CheckoutSession, GatewayEvent, SessionCompletion};
use crate::state::AppState;
use serde::Serialize;

// --- Checkout ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CheckoutOutcome {
  /// A new order with a new payment session.
  Created,
  /// The order's session is still open; the same payment page is returned.
  Resumed,
  /// The previous session expired and a replacement was issued.
  Renewed,
  /// The order is already paid; the customer goes to the success page.
  AlreadyCompleted,
}

#[derive(Clone)]
pub struct CheckoutCtxData {
  pub app_state: AppState,
  pub token: String,
  pub lines: Vec<CartLine>,

  pub normalized_lines: Vec<CartLine>,
  pub photo_count: u32,
  pub amount_minor_units: i64,
  pub order: Option<Order>,
  pub freshly_inserted: bool,
  /// Gateway idempotency key for the session about to be created.
  pub session_key: Option<String>,
  pub session: Option<CheckoutSession>,
  pub redirect_url: Option<String>,
  pub outcome: Option<CheckoutOutcome>,
}

impl CheckoutCtxData {
  pub fn new(app_state: AppState, token: String, lines: Vec<CartLine>) -> Self {
    Self {
      app_state,
      token,
      lines,
      normalized_lines: Vec::new(),
      photo_count: 0,
      amount_minor_units: 0,
      order: None,
      freshly_inserted: false,
      session_key: None,
      session: None,
      redirect_url: None,
      outcome: None,
    }
  }
}

// --- Payment events ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "result")]
pub enum PaymentEventOutcome {
  MarkedPaid { order_id: String },
  AlreadyProcessed { order_id: String, status: OrderStatus },
  Ignored { reason: String },
}

#[derive(Clone)]
pub struct PaymentEventCtxData {
  pub app_state: AppState,
  pub payload: Vec<u8>,
  pub signature: Option<String>,

  pub event: Option<GatewayEvent>,
  pub completion: Option<SessionCompletion>,
  pub order: Option<Order>,
  pub newly_paid: bool,
  pub confirmation_sent: bool,
  pub outcome: Option<PaymentEventOutcome>,
}

impl PaymentEventCtxData {
  pub fn new(app_state: AppState, payload: Vec<u8>, signature: Option<String>) -> Self {
    Self {
      app_state,
      payload,
      signature,
      event: None,
      completion: None,
      order: None,
      newly_paid: false,
      confirmation_sent: false,
      outcome: None,
    }
  }
}

// --- Fulfillment ---

#[derive(Debug, Clone)]
pub enum DeliveryFile {
  /// Bytes sent with the request, stored before linking.
  Inline {
    name: String,
    content_type: String,
    bytes: Vec<u8>,
  },
  /// An object already uploaded through a signed upload URL.
  Staged { path: String, name: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
  pub name: String,
  pub path: String,
}

#[derive(Clone)]
pub struct FulfillmentCtxData {
  pub app_state: AppState,
  pub order_id: String,
  pub subject: Option<String>,
  pub message: Option<String>,
  pub files: Vec<DeliveryFile>,

  pub order: Option<Order>,
  pub recipient: Option<String>,
  pub stored: Vec<StoredFile>,
  pub links: Vec<DeliveryLink>,
  pub email_sent: bool,
}

impl FulfillmentCtxData {
  pub fn new(
    app_state: AppState,
    order_id: String,
    subject: Option<String>,
    message: Option<String>,
    files: Vec<DeliveryFile>,
  ) -> Self {
    Self {
      app_state,
      order_id,
      subject,
      message,
      files,
      order: None,
      recipient: None,
      stored: Vec::new(),
      links: Vec::new(),
      email_sent: false,
    }
  }

  pub fn has_inline_files(&self) -> bool {
    self.files.iter().any(|f| matches!(f, DeliveryFile::Inline { .. }))
  }
}

// --- Admin status override ---

#[derive(Clone)]
pub struct StatusOverrideCtxData {
  pub app_state: AppState,
  pub order_id: String,
  pub requested: String,

  pub target: Option<OrderStatus>,
  pub previous: Option<OrderStatus>,
  pub order: Option<Order>,
}

impl StatusOverrideCtxData {
  pub fn new(app_state: AppState, order_id: String, requested: String) -> Self {
    Self {
      app_state,
      order_id,
      requested,
      target: None,
      previous: None,
      order: None,
    }
  }
}
