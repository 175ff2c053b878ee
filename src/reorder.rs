//! Hand-off of items from a previous order into the cart.
//!
//! The order history page stages a transfer, the cart consumes it exactly
//! once after it has been restored. The transfer has its own key so it can
//! never be mistaken for the cart document.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::model::LineItem;
use crate::store::{KeyValueStore, StoreError};

/// Key the pending transfer is stored under.
pub const REORDER_KEY: &str = "reorder_items";

/// Items to merge into the cart.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReorderTransfer {
    pub items: Vec<LineItem>,
}

impl ReorderTransfer {
    pub fn new(items: Vec<LineItem>) -> Self {
        Self { items }
    }

    /// Write the transfer, replacing any transfer not yet consumed.
    pub fn stage(&self, store: &impl KeyValueStore) -> Result<(), StoreError> {
        let doc = serde_json::to_string(self).map_err(|source| StoreError::Encode {
            key: REORDER_KEY.to_string(),
            source,
        })?;
        store.set(REORDER_KEY, &doc)
    }

    /// Read and delete the pending transfer.
    ///
    /// A malformed transfer is deleted as well and reported as absent.
    pub fn take(store: &impl KeyValueStore) -> Result<Option<Self>, StoreError> {
        let Some(raw) = store.get(REORDER_KEY)? else {
            return Ok(None);
        };
        store.remove(REORDER_KEY)?;

        match serde_json::from_str(&raw) {
            Ok(transfer) => Ok(Some(transfer)),
            Err(e) => {
                warn!(reason = %e, "discarding malformed reorder transfer");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Amount;
    use crate::model::Product;
    use crate::store::{CART_KEY, MemoryStore};

    fn transfer() -> ReorderTransfer {
        ReorderTransfer::new(vec![LineItem::new(
            Product::new("p1", "Mug", Amount::from_rupees(120)),
            2,
            Some("Blue".into()),
        )])
    }

    #[test]
    fn take_reads_once() {
        let store = MemoryStore::new();
        transfer().stage(&store).unwrap();

        assert_eq!(ReorderTransfer::take(&store).unwrap(), Some(transfer()));
        assert_eq!(ReorderTransfer::take(&store).unwrap(), None);
    }

    #[test]
    fn take_without_transfer_is_none() {
        let store = MemoryStore::new();
        assert_eq!(ReorderTransfer::take(&store).unwrap(), None);
    }

    #[test]
    fn malformed_transfer_is_discarded() {
        let store = MemoryStore::new();
        store.set(REORDER_KEY, "[1, 2").unwrap();

        assert_eq!(ReorderTransfer::take(&store).unwrap(), None);
        assert_eq!(store.get(REORDER_KEY).unwrap(), None);
    }

    #[test]
    fn transfer_does_not_touch_cart_key() {
        let store = MemoryStore::new();
        store.set(CART_KEY, "cart document").unwrap();
        transfer().stage(&store).unwrap();
        ReorderTransfer::take(&store).unwrap();

        assert_eq!(store.get(CART_KEY).unwrap().as_deref(), Some("cart document"));
    }
}
