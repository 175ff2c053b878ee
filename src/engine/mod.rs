//! Cart engine.
//!
//! The engine owns the cart state, persists it to a [`KeyValueStore`] after
//! every change, restores it once at startup and publishes a [`CartSummary`]
//! to subscribers whenever it changes.
//! Also supports an async stream of cart actions.

use tokio::sync::watch;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, info, warn};

use crate::Amount;
use crate::model::{CartAction, Coupon, LineItem, Product};
use crate::pricing;
use crate::reorder::ReorderTransfer;
use crate::store::{CART_KEY, KeyValueStore};

mod state;
pub use state::{CartState, PersistedCart};

mod error;
pub use error::EngineError;

/// Whether an action changed the cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    Applied,
    /// The action referenced nothing or changed nothing.
    Unchanged,
}

impl From<bool> for ActionOutcome {
    fn from(changed: bool) -> Self {
        if changed {
            ActionOutcome::Applied
        } else {
            ActionOutcome::Unchanged
        }
    }
}

/// Read-only view of the cart published to subscribers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CartSummary {
    /// Sum of quantities.
    pub item_count: u64,
    pub line_count: usize,
    pub total_amount: Amount,
    pub discount: Amount,
    pub coupon_code: Option<String>,
    /// Coupon attached but contributing nothing (minimum order unmet).
    pub coupon_pending: bool,
    pub is_loaded: bool,
}

impl CartSummary {
    pub fn grand_total(&self, delivery_fee: Amount) -> Amount {
        pricing::grand_total(self.total_amount, delivery_fee, self.discount)
    }
}

/// The cart engine.
///
/// Owns the only copy of the cart; every other component reads through
/// [`CartEngine::subscribe`] or the accessors.
pub struct CartEngine<S: KeyValueStore> {
    state: CartState,
    store: S,
    loaded: bool,
    /// Actions taken before the restore, replayed on top of it.
    pending: Vec<CartAction>,
    notifier: watch::Sender<CartSummary>,
}

/// Public API
impl<S: KeyValueStore> CartEngine<S> {
    /// Create an engine with an empty, not yet restored cart.
    pub fn new(store: S) -> Self {
        let (notifier, _) = watch::channel(CartSummary::default());
        Self {
            state: CartState::default(),
            store,
            loaded: false,
            pending: Vec::new(),
            notifier,
        }
    }

    /// Create an engine and restore the stored cart.
    pub fn open(store: S) -> Self {
        let mut engine = Self::new(store);
        engine.restore();
        engine
    }

    /// Restore the cart from the store.
    ///
    /// Only the first call does anything. A missing or unreadable document
    /// yields an empty cart. Either way the engine is loaded afterwards, and
    /// changes made before the restore are reapplied on top of it.
    pub fn restore(&mut self) {
        if self.loaded {
            return;
        }

        self.state = match self.store.get(CART_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<PersistedCart>(&raw) {
                Ok(doc) => CartState::from_persisted(doc),
                Err(e) => {
                    warn!(reason = %e, "stored cart is malformed, starting empty");
                    CartState::default()
                }
            },
            Ok(None) => CartState::default(),
            Err(e) => {
                warn!(reason = %e, "cart store unavailable, starting empty");
                CartState::default()
            }
        };
        self.loaded = true;

        let replayed = std::mem::take(&mut self.pending);
        let count = replayed.len();
        let mut changed = false;
        for action in replayed {
            changed |= self.state.apply(action);
        }
        if changed {
            self.persist();
        }

        info!(
            lines = self.state.items().len(),
            total = %self.state.total_amount(),
            replayed = count,
            "cart restored"
        );
        self.notify();
    }

    /// Run the engine with the given action stream
    pub async fn run(&mut self, mut stream: impl Stream<Item = CartAction> + Unpin) {
        while let Some(action) = stream.next().await {
            self.apply(action);
        }
    }

    /// Apply a single action on top of the current cart
    pub fn apply(&mut self, action: CartAction) -> ActionOutcome {
        let name = action.name();
        let outcome: ActionOutcome = self.mutate(action).into();

        match outcome {
            ActionOutcome::Applied => info!(
                total = %self.state.total_amount(),
                discount = %self.state.discount(),
                "{name} applied"
            ),
            ActionOutcome::Unchanged => info!("{name} left cart unchanged"),
        }
        outcome
    }

    /// Add one unit of `product`, merging with an existing line of the same
    /// product and color.
    pub fn add_item(&mut self, product: Product, color: Option<&str>) -> bool {
        self.mutate(CartAction::Add {
            product,
            color: color.map(str::to_string),
        })
    }

    /// Set the quantity of a line. Below 1 removes the line.
    pub fn update_quantity(&mut self, product_id: &str, quantity: i64, color: Option<&str>) -> bool {
        self.mutate(CartAction::SetQuantity {
            product_id: product_id.to_string(),
            color: color.map(str::to_string),
            quantity,
        })
    }

    /// Move a line to another color, merging into an existing line there.
    pub fn update_item_color(
        &mut self,
        product_id: &str,
        from: Option<&str>,
        to: Option<&str>,
    ) -> bool {
        self.mutate(CartAction::Recolor {
            product_id: product_id.to_string(),
            from: from.map(str::to_string),
            to: to.map(str::to_string),
        })
    }

    /// Drop the line with this product and color.
    pub fn remove_item(&mut self, product_id: &str, color: Option<&str>) -> bool {
        self.mutate(CartAction::Remove {
            product_id: product_id.to_string(),
            color: color.map(str::to_string),
        })
    }

    /// Empty the cart and drop the coupon.
    pub fn clear_cart(&mut self) -> bool {
        self.mutate(CartAction::Clear)
    }

    /// Attach a coupon, replacing any previous one. The coupon must already
    /// have been validated by the coupon service.
    pub fn apply_coupon(&mut self, coupon: Coupon) -> bool {
        self.mutate(CartAction::ApplyCoupon(coupon))
    }

    /// Detach the coupon, if any.
    pub fn remove_coupon(&mut self) -> bool {
        self.mutate(CartAction::RemoveCoupon)
    }

    /// Merge items carried over from a previous order.
    ///
    /// Refuses to run before the cart is restored. Returns the number of
    /// lines merged.
    pub fn merge_reorder(&mut self, transfer: ReorderTransfer) -> Result<usize, EngineError> {
        if !self.loaded {
            return Err(EngineError::NotLoaded);
        }
        let mut merged = 0;
        for item in transfer.items {
            if self.state.add(item.product, item.selected_color, item.quantity) {
                merged += 1;
            }
        }
        self.commit(merged > 0);
        info!(lines = merged, "reorder items merged");
        Ok(merged)
    }

    /// Take the pending reorder transfer from the store, if any, and merge it.
    ///
    /// The transfer stays in the store when the cart is not loaded yet.
    pub fn merge_pending_reorder(&mut self) -> Result<usize, EngineError> {
        if !self.loaded {
            return Err(EngineError::NotLoaded);
        }
        match ReorderTransfer::take(&self.store)? {
            Some(transfer) => self.merge_reorder(transfer),
            None => Ok(0),
        }
    }

    /// Receive a fresh [`CartSummary`] after every change.
    pub fn subscribe(&self) -> watch::Receiver<CartSummary> {
        self.notifier.subscribe()
    }

    pub fn summary(&self) -> CartSummary {
        CartSummary {
            item_count: self.state.item_count(),
            line_count: self.state.items().len(),
            total_amount: self.state.total_amount(),
            discount: self.state.discount(),
            coupon_code: self.state.coupon().map(|c| c.code.clone()),
            coupon_pending: self.coupon_pending(),
            is_loaded: self.loaded,
        }
    }

    pub fn state(&self) -> &CartState {
        &self.state
    }

    pub fn items(&self) -> &[LineItem] {
        self.state.items()
    }

    pub fn coupon(&self) -> Option<&Coupon> {
        self.state.coupon()
    }

    pub fn total_amount(&self) -> Amount {
        self.state.total_amount()
    }

    pub fn discount(&self) -> Amount {
        self.state.discount()
    }

    pub fn item_count(&self) -> u64 {
        self.state.item_count()
    }

    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// A coupon is attached but the subtotal is below its minimum.
    pub fn coupon_pending(&self) -> bool {
        self.state.coupon().is_some() && self.state.discount().is_zero()
    }

    pub fn grand_total(&self, delivery_fee: Amount) -> Amount {
        pricing::grand_total(self.state.total_amount(), delivery_fee, self.state.discount())
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

/// Private API
impl<S: KeyValueStore> CartEngine<S> {
    /// Apply an action to the in-memory cart, then persist and notify.
    ///
    /// Before the restore the action is also kept for replay.
    fn mutate(&mut self, action: CartAction) -> bool {
        let changed = if self.loaded {
            self.state.apply(action)
        } else {
            let changed = self.state.apply(action.clone());
            if changed {
                self.pending.push(action);
            }
            changed
        };
        self.commit(changed)
    }

    /// Persist and notify after a change. Returns `changed` for chaining.
    fn commit(&mut self, changed: bool) -> bool {
        if changed {
            self.persist();
            self.notify();
        }
        changed
    }

    /// Best-effort write of the cart document; failures are only logged.
    fn persist(&self) {
        // writing before the restore would clobber the stored cart
        if !self.loaded {
            debug!("cart not restored yet, skipping persist");
            return;
        }

        let doc = match serde_json::to_string(&self.state.to_persisted()) {
            Ok(doc) => doc,
            Err(e) => {
                warn!(reason = %e, "failed to encode cart");
                return;
            }
        };
        if let Err(e) = self.store.set(CART_KEY, &doc) {
            warn!(reason = %e, "failed to persist cart");
        }
    }

    fn notify(&self) {
        self.notifier.send_replace(self.summary());
    }
}

impl Default for CartEngine<crate::store::MemoryStore> {
    fn default() -> Self {
        Self::open(crate::store::MemoryStore::new())
    }
}
