use crate::config::ConfigError;
use crate::store::StoreError;
use crate::utils::IsTransient;

// ============================================================================
// Order Service Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("order {order_uid} not found")]
    NotFound { order_uid: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("invalid configuration: {0}")]
    Configuration(#[from] ConfigError),
}

impl IsTransient for ServiceError {
    fn is_transient(&self) -> bool {
        match self {
            ServiceError::Store(e) => e.is_transient(),
            ServiceError::NotFound { .. } | ServiceError::Configuration(_) => false,
        }
    }
}
