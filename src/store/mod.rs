// ============================================================================
// Store Module - durable order storage
// ============================================================================
//
// `OrderRepository` is the contract the order service sits in front of:
// - get_by_id:       Ok(None) is "not in the store", distinct from Err
// - get_most_recent: newest first by date_created, used for cache warm-up
// - save:            all rows of an order or none of them
//
// Implementations never retry. Retry policy belongs to the caller.
//
// ============================================================================

mod memory;
mod postgres;

use async_trait::async_trait;

use crate::models::Order;
use crate::utils::IsTransient;

pub use memory::InMemoryOrderRepository;
pub use postgres::PgOrderRepository;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("conflicting write: {0}")]
    Conflict(String),

    #[error("failed to decode stored order: {0}")]
    Decode(String),
}

impl IsTransient for StoreError {
    fn is_transient(&self) -> bool {
        match self {
            StoreError::Database(e) => matches!(
                e,
                sqlx::Error::Io(_)
                    | sqlx::Error::PoolTimedOut
                    | sqlx::Error::PoolClosed
                    | sqlx::Error::WorkerCrashed
                    | sqlx::Error::Protocol(_)
                    | sqlx::Error::Tls(_)
            ),
            StoreError::Conflict(_) | StoreError::Decode(_) => false,
        }
    }
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Fetch one fully hydrated order. `Ok(None)` when no order row matches.
    async fn get_by_id(&self, order_uid: &str) -> Result<Option<Order>, StoreError>;

    /// Up to `limit` orders, newest `date_created` first.
    async fn get_most_recent(&self, limit: usize) -> Result<Vec<Order>, StoreError>;

    /// Persist the order with its delivery, payment and items atomically.
    async fn save(&self, order: &Order) -> Result<(), StoreError>;
}
