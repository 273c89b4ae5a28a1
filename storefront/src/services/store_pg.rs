// storefront/src/services/store_pg.rs

use crate::errors::{AppError, Result};
use crate::models::{CartLine, InsertOutcome, NewOrder, Order, OrderFilter, OrderPatch, OrderStatus, StatusGuard};
use crate::services::order_store::OrderStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use tracing::{debug, instrument};

const COLUMNS: &str = "id, status, total_amount_minor_units, currency, line_items, photo_count, \
  customer_email, payment_session_ref, sent_at, created_at, updated_at";

#[derive(FromRow)]
struct OrderRow {
  id: String,
  status: String,
  total_amount_minor_units: i64,
  currency: String,
  line_items: Json<Vec<CartLine>>,
  photo_count: i32,
  customer_email: Option<String>,
  payment_session_ref: Option<String>,
  sent_at: Option<DateTime<Utc>>,
  created_at: DateTime<Utc>,
  updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
  type Error = AppError;

  fn try_from(row: OrderRow) -> Result<Self> {
    let status = OrderStatus::parse(&row.status)
      .map_err(|_| AppError::Internal(format!("order {} has unknown status '{}'", row.id, row.status)))?;
    let photo_count = u32::try_from(row.photo_count)
      .map_err(|_| AppError::Internal(format!("order {} has negative photo count", row.id)))?;
    Ok(Order {
      id: row.id,
      status,
      total_amount_minor_units: row.total_amount_minor_units,
      currency: row.currency,
      line_items: row.line_items.0,
      photo_count,
      customer_email: row.customer_email,
      payment_session_ref: row.payment_session_ref,
      sent_at: row.sent_at,
      created_at: row.created_at,
      updated_at: row.updated_at,
    })
  }
}

/// Orders in Postgres. Guarded updates are single `UPDATE ... WHERE status = ANY(..)`
/// statements, so the database serializes competing transitions.
pub struct PgOrderStore {
  pool: PgPool,
}

impl PgOrderStore {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }

  async fn fetch_one_by(&self, column: &str, value: &str) -> Result<Option<Order>> {
    let sql = format!("SELECT {} FROM orders WHERE {} = $1", COLUMNS, column);
    sqlx::query_as::<_, OrderRow>(&sql)
      .bind(value)
      .fetch_optional(&self.pool)
      .await?
      .map(Order::try_from)
      .transpose()
  }
}

#[async_trait]
impl OrderStore for PgOrderStore {
  #[instrument(name = "pg::insert_if_absent", skip(self, order), fields(order_id = %order.id), err(Display))]
  async fn insert_if_absent(&self, order: NewOrder) -> Result<InsertOutcome> {
    let photo_count = i32::try_from(order.photo_count)
      .map_err(|_| AppError::InvalidRequest("photo count too large".to_string()))?;
    let sql = format!(
      "INSERT INTO orders (id, status, total_amount_minor_units, currency, line_items, photo_count) \
       VALUES ($1, $2, $3, $4, $5, $6) ON CONFLICT (id) DO NOTHING RETURNING {}",
      COLUMNS
    );
    let inserted = sqlx::query_as::<_, OrderRow>(&sql)
      .bind(&order.id)
      .bind(OrderStatus::Pending.as_str())
      .bind(order.total_amount_minor_units)
      .bind(&order.currency)
      .bind(Json(&order.line_items))
      .bind(photo_count)
      .fetch_optional(&self.pool)
      .await?;

    match inserted {
      Some(row) => Ok(InsertOutcome::Inserted(row.try_into()?)),
      None => {
        debug!("Order key already taken, reading back the existing order.");
        let existing = self
          .find(&order.id)
          .await?
          .ok_or_else(|| AppError::Internal(format!("order {} conflicted but cannot be read", order.id)))?;
        Ok(InsertOutcome::Existing(existing))
      }
    }
  }

  #[instrument(name = "pg::update_where", skip(self, patch), err(Display))]
  async fn update_where(&self, id: &str, guard: StatusGuard, patch: OrderPatch) -> Result<Option<Order>> {
    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE orders SET updated_at = ");
    qb.push_bind(Utc::now());
    if let Some(change) = patch.status_change() {
      qb.push(", status = ").push_bind(change.status().as_str());
      qb.push(", sent_at = ").push_bind(change.sent_at());
    }
    if let Some(email) = patch.customer_email() {
      qb.push(", customer_email = ").push_bind(email.to_string());
    }
    if let Some(session_ref) = patch.payment_session_ref() {
      qb.push(", payment_session_ref = ").push_bind(session_ref.to_string());
    }
    qb.push(" WHERE id = ").push_bind(id.to_string());
    if let StatusGuard::OneOf(allowed) = &guard {
      let allowed: Vec<String> = allowed.iter().map(|s| s.as_str().to_string()).collect();
      qb.push(" AND status = ANY(").push_bind(allowed).push(")");
    }
    qb.push(" RETURNING ").push(COLUMNS);

    qb.build_query_as::<OrderRow>()
      .fetch_optional(&self.pool)
      .await?
      .map(Order::try_from)
      .transpose()
  }

  async fn find(&self, id: &str) -> Result<Option<Order>> {
    self.fetch_one_by("id", id).await
  }

  async fn find_by_session_ref(&self, session_ref: &str) -> Result<Option<Order>> {
    self.fetch_one_by("payment_session_ref", session_ref).await
  }

  #[instrument(name = "pg::list_orders", skip(self), err(Display))]
  async fn list(&self, filter: &OrderFilter) -> Result<Vec<Order>> {
    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!("SELECT {} FROM orders", COLUMNS));
    if let Some(status) = filter.status {
      qb.push(" WHERE status = ").push_bind(status.as_str());
    }
    qb.push(" ORDER BY created_at DESC, id ASC");
    if let Some(limit) = filter.limit {
      qb.push(" LIMIT ").push_bind(i64::from(limit));
    }

    qb.build_query_as::<OrderRow>()
      .fetch_all(&self.pool)
      .await?
      .into_iter()
      .map(Order::try_from)
      .collect()
  }
}
