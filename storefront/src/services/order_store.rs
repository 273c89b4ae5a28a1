// storefront/src/services/order_store.rs

use crate::errors::Result;
use crate::models::{InsertOutcome, NewOrder, Order, OrderFilter, OrderPatch, StatusGuard};
use async_trait::async_trait;

/// Durable order records keyed by the checkout idempotency token.
///
/// Implementations must make `insert_if_absent` and `update_where` atomic: two concurrent
/// inserts for one id yield one `Inserted` and one `Existing`, and a guarded update either
/// observes an admitted status and writes, or writes nothing.
#[async_trait]
pub trait OrderStore: Send + Sync {
  async fn insert_if_absent(&self, order: NewOrder) -> Result<InsertOutcome>;

  /// Applies `patch` if the order exists and its status passes `guard`; returns the updated
  /// order, or `None` when nothing was written.
  async fn update_where(&self, id: &str, guard: StatusGuard, patch: OrderPatch) -> Result<Option<Order>>;

  async fn find(&self, id: &str) -> Result<Option<Order>>;

  async fn find_by_session_ref(&self, session_ref: &str) -> Result<Option<Order>>;

  /// Newest first.
  async fn list(&self, filter: &OrderFilter) -> Result<Vec<Order>>;
}
