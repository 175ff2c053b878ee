//! Error types for cart engine operations.

use thiserror::Error;

use crate::store::StoreError;

/// Errors from engine operations that coordinate with other state.
///
/// Plain cart mutations never fail; only the operations that depend on the
/// restore having completed, or that read other stored documents, do.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("cart has not been restored yet")]
    NotLoaded,

    #[error(transparent)]
    Store(#[from] StoreError),
}
