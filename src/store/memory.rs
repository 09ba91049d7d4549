use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

use super::{OrderRepository, StoreError};
use crate::models::{Item, Order};

// ============================================================================
// In-Memory Order Repository
// ============================================================================
//
// Process-local implementation of the repository contract, normalized the
// same way as the PostgreSQL tables: item bodies are shared by chrt_id and
// orders reference them through an association list. Used by tests and by
// the service when `STORE_BACKEND=memory`.
//
// ============================================================================

#[derive(Default)]
struct Tables {
    orders: HashMap<String, Order>,
    payments: HashMap<String, String>,
    items: HashMap<i64, Item>,
    order_items: HashMap<String, Vec<i64>>,
}

impl Tables {
    fn hydrate(&self, order: &Order) -> Order {
        let items = self
            .order_items
            .get(&order.order_uid)
            .map(|ids| ids.iter().filter_map(|id| self.items.get(id)).cloned().collect())
            .unwrap_or_default();

        Order {
            items,
            ..order.clone()
        }
    }
}

#[derive(Default)]
pub struct InMemoryOrderRepository {
    tables: Mutex<Tables>,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tables.lock().orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.lock().orders.is_empty()
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn get_by_id(&self, order_uid: &str) -> Result<Option<Order>, StoreError> {
        let tables = self.tables.lock();
        Ok(tables.orders.get(order_uid).map(|order| tables.hydrate(order)))
    }

    async fn get_most_recent(&self, limit: usize) -> Result<Vec<Order>, StoreError> {
        let tables = self.tables.lock();
        let mut orders: Vec<&Order> = tables.orders.values().collect();
        orders.sort_by(|a, b| b.date_created.cmp(&a.date_created));

        Ok(orders
            .into_iter()
            .take(limit)
            .map(|order| tables.hydrate(order))
            .collect())
    }

    async fn save(&self, order: &Order) -> Result<(), StoreError> {
        let mut tables = self.tables.lock();

        // Check every constraint before touching any table.
        if tables.orders.contains_key(&order.order_uid) {
            return Err(StoreError::Conflict(format!(
                "order {} already exists",
                order.order_uid
            )));
        }
        if tables.payments.contains_key(&order.payment.transaction) {
            return Err(StoreError::Conflict(format!(
                "payment {} already exists",
                order.payment.transaction
            )));
        }

        for item in &order.items {
            tables.items.entry(item.chrt_id).or_insert_with(|| item.clone());
        }
        tables.order_items.insert(
            order.order_uid.clone(),
            order.items.iter().map(|item| item.chrt_id).collect(),
        );
        tables
            .payments
            .insert(order.payment.transaction.clone(), order.order_uid.clone());
        tables.orders.insert(
            order.order_uid.clone(),
            Order {
                items: Vec::new(),
                ..order.clone()
            },
        );

        Ok(())
    }
}
