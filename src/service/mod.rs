// ============================================================================
// Order Service - cache-aside reads, write-through ingestion
// ============================================================================
//
// Orchestrates: OrderCache <-> OrderRepository
//
// ============================================================================

pub mod errors;
pub mod order_service;

// Re-export for convenience
pub use errors::*;
pub use order_service::*;
