// storefront/src/models/order.rs

use crate::errors::AppError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
  Pending,
  Paid,
  Sent,
  Canceled,
}

impl OrderStatus {
  pub const ALL: [OrderStatus; 4] = [
    OrderStatus::Pending,
    OrderStatus::Paid,
    OrderStatus::Sent,
    OrderStatus::Canceled,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      OrderStatus::Pending => "PENDING",
      OrderStatus::Paid => "PAID",
      OrderStatus::Sent => "SENT",
      OrderStatus::Canceled => "CANCELED",
    }
  }

  /// Case-insensitive, surrounding whitespace ignored.
  pub fn parse(raw: &str) -> Result<Self, AppError> {
    let wanted = raw.trim().to_ascii_uppercase();
    Self::ALL
      .into_iter()
      .find(|s| s.as_str() == wanted)
      .ok_or_else(|| AppError::InvalidStatus(format!("'{}' is not one of PENDING, PAID, SENT, CANCELED", raw.trim())))
  }
}

impl fmt::Display for OrderStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
  pub product_id: String,
  pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
  pub id: String,
  pub status: OrderStatus,
  pub total_amount_minor_units: i64,
  pub currency: String,
  pub line_items: Vec<CartLine>,
  pub photo_count: u32,
  pub customer_email: Option<String>,
  pub payment_session_ref: Option<String>,
  pub sent_at: Option<DateTime<Utc>>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

/// A freshly priced order, always inserted as `PENDING`.
#[derive(Debug, Clone)]
pub struct NewOrder {
  pub id: String,
  pub total_amount_minor_units: i64,
  pub currency: String,
  pub line_items: Vec<CartLine>,
  pub photo_count: u32,
}

impl NewOrder {
  pub fn into_order(self, now: DateTime<Utc>) -> Order {
    Order {
      id: self.id,
      status: OrderStatus::Pending,
      total_amount_minor_units: self.total_amount_minor_units,
      currency: self.currency,
      line_items: self.line_items,
      photo_count: self.photo_count,
      customer_email: None,
      payment_session_ref: None,
      sent_at: None,
      created_at: now,
      updated_at: now,
    }
  }
}

#[derive(Debug)]
pub enum InsertOutcome {
  Inserted(Order),
  /// Another request already holds the key; carries the stored order.
  Existing(Order),
}

impl InsertOutcome {
  pub fn order(&self) -> &Order {
    match self {
      InsertOutcome::Inserted(order) | InsertOutcome::Existing(order) => order,
    }
  }
}

/// A status together with the `sent_at` it implies. Only constructible through
/// [`OrderPatch::transition`], so the two never disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
  status: OrderStatus,
  sent_at: Option<DateTime<Utc>>,
}

impl StatusChange {
  pub fn status(&self) -> OrderStatus {
    self.status
  }

  pub fn sent_at(&self) -> Option<DateTime<Utc>> {
    self.sent_at
  }
}

/// Fields a conditional update may write. Everything else on an order is immutable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderPatch {
  status: Option<StatusChange>,
  customer_email: Option<String>,
  payment_session_ref: Option<String>,
}

impl OrderPatch {
  pub fn transition(to: OrderStatus, now: DateTime<Utc>) -> Self {
    let sent_at = (to == OrderStatus::Sent).then_some(now);
    Self {
      status: Some(StatusChange { status: to, sent_at }),
      ..Self::default()
    }
  }

  pub fn session_ref(session_ref: impl Into<String>) -> Self {
    Self {
      payment_session_ref: Some(session_ref.into()),
      ..Self::default()
    }
  }

  pub fn with_customer_email(mut self, email: Option<String>) -> Self {
    self.customer_email = email;
    self
  }

  pub fn status_change(&self) -> Option<StatusChange> {
    self.status
  }

  pub fn customer_email(&self) -> Option<&str> {
    self.customer_email.as_deref()
  }

  pub fn payment_session_ref(&self) -> Option<&str> {
    self.payment_session_ref.as_deref()
  }

  pub fn apply(&self, order: &mut Order, now: DateTime<Utc>) {
    if let Some(change) = self.status {
      order.status = change.status;
      order.sent_at = change.sent_at;
    }
    if let Some(email) = &self.customer_email {
      order.customer_email = Some(email.clone());
    }
    if let Some(session_ref) = &self.payment_session_ref {
      order.payment_session_ref = Some(session_ref.clone());
    }
    order.updated_at = now;
  }
}

/// Which current statuses a conditional update accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusGuard {
  Any,
  OneOf(Vec<OrderStatus>),
}

impl StatusGuard {
  pub fn only(status: OrderStatus) -> Self {
    StatusGuard::OneOf(vec![status])
  }

  pub fn admits(&self, status: OrderStatus) -> bool {
    match self {
      StatusGuard::Any => true,
      StatusGuard::OneOf(allowed) => allowed.contains(&status),
    }
  }
}

#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
  pub status: Option<OrderStatus>,
  pub limit: Option<u32>,
}
