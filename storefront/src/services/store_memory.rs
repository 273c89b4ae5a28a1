// storefront/src/services/store_memory.rs

use crate::errors::Result;
use crate::models::{InsertOutcome, NewOrder, Order, OrderFilter, OrderPatch, StatusGuard};
use crate::services::order_store::OrderStore;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Orders held in process memory. Every check-and-set happens under one write lock.
#[derive(Default)]
pub struct MemoryOrderStore {
  orders: RwLock<HashMap<String, Order>>,
}

impl MemoryOrderStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub async fn len(&self) -> usize {
    self.orders.read().await.len()
  }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
  async fn insert_if_absent(&self, order: NewOrder) -> Result<InsertOutcome> {
    let mut orders = self.orders.write().await;
    if let Some(existing) = orders.get(&order.id) {
      return Ok(InsertOutcome::Existing(existing.clone()));
    }
    let created = order.into_order(Utc::now());
    orders.insert(created.id.clone(), created.clone());
    Ok(InsertOutcome::Inserted(created))
  }

  async fn update_where(&self, id: &str, guard: StatusGuard, patch: OrderPatch) -> Result<Option<Order>> {
    let mut orders = self.orders.write().await;
    match orders.get_mut(id) {
      Some(order) if guard.admits(order.status) => {
        patch.apply(order, Utc::now());
        Ok(Some(order.clone()))
      }
      _ => Ok(None),
    }
  }

  async fn find(&self, id: &str) -> Result<Option<Order>> {
    Ok(self.orders.read().await.get(id).cloned())
  }

  async fn find_by_session_ref(&self, session_ref: &str) -> Result<Option<Order>> {
    Ok(
      self
        .orders
        .read()
        .await
        .values()
        .find(|o| o.payment_session_ref.as_deref() == Some(session_ref))
        .cloned(),
    )
  }

  async fn list(&self, filter: &OrderFilter) -> Result<Vec<Order>> {
    let mut found: Vec<Order> = self
      .orders
      .read()
      .await
      .values()
      .filter(|o| filter.status.map_or(true, |s| o.status == s))
      .cloned()
      .collect();
    found.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
    if let Some(limit) = filter.limit {
      found.truncate(limit as usize);
    }
    Ok(found)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::models::{CartLine, OrderStatus};
  use std::sync::Arc;

  fn new_order(id: &str) -> NewOrder {
    NewOrder {
      id: id.to_string(),
      total_amount_minor_units: 800,
      currency: "eur".to_string(),
      line_items: vec![CartLine {
        product_id: "p".to_string(),
        quantity: 1,
      }],
      photo_count: 1,
    }
  }

  #[tokio::test]
  async fn concurrent_inserts_have_one_winner() {
    let store = Arc::new(MemoryOrderStore::new());
    let handles: Vec<_> = (0..16)
      .map(|_| {
        let store = store.clone();
        tokio::spawn(async move { store.insert_if_absent(new_order("tok-A")).await })
      })
      .collect();

    let mut inserted = 0;
    for handle in handles {
      if let InsertOutcome::Inserted(_) = handle.await.unwrap().unwrap() {
        inserted += 1;
      }
    }
    assert_eq!(inserted, 1);
    assert_eq!(store.len().await, 1);
  }

  #[tokio::test]
  async fn guarded_updates_write_only_when_admitted() {
    let store = MemoryOrderStore::new();
    store.insert_if_absent(new_order("tok-A")).await.unwrap();

    let paid = store
      .update_where(
        "tok-A",
        StatusGuard::only(OrderStatus::Pending),
        OrderPatch::transition(OrderStatus::Paid, Utc::now()),
      )
      .await
      .unwrap();
    assert_eq!(paid.map(|o| o.status), Some(OrderStatus::Paid));

    let replay = store
      .update_where(
        "tok-A",
        StatusGuard::only(OrderStatus::Pending),
        OrderPatch::transition(OrderStatus::Paid, Utc::now()),
      )
      .await
      .unwrap();
    assert!(replay.is_none());

    let missing = store
      .update_where("nope", StatusGuard::Any, OrderPatch::session_ref("cs"))
      .await
      .unwrap();
    assert!(missing.is_none());
  }

  #[tokio::test]
  async fn lookups_and_listing() {
    let store = MemoryOrderStore::new();
    store.insert_if_absent(new_order("a")).await.unwrap();
    store.insert_if_absent(new_order("b")).await.unwrap();
    store
      .update_where("b", StatusGuard::Any, OrderPatch::session_ref("cs_b"))
      .await
      .unwrap();

    assert_eq!(store.find_by_session_ref("cs_b").await.unwrap().map(|o| o.id), Some("b".to_string()));
    assert!(store.find_by_session_ref("cs_x").await.unwrap().is_none());

    let all = store.list(&OrderFilter::default()).await.unwrap();
    assert_eq!(all.len(), 2);
    let paid = store
      .list(&OrderFilter {
        status: Some(OrderStatus::Paid),
        limit: None,
      })
      .await
      .unwrap();
    assert!(paid.is_empty());
  }
}
