use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::Amount;
use crate::model::{CartAction, Coupon, LineItem, Product, canonical_code};
use crate::pricing;

/// The cart aggregate: ordered line items, at most one coupon, and the
/// totals derived from them.
///
/// `total_amount` and `discount` are caches refreshed by every mutation;
/// they are never set directly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CartState {
    items: Vec<LineItem>,
    coupon: Option<Coupon>,
    total_amount: Amount,
    discount: Amount,
}

/// The document written to the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedCart {
    #[serde(default)]
    pub items: Vec<LineItem>,
    #[serde(default)]
    pub coupon: Option<Coupon>,
    #[serde(default)]
    pub discount: Amount,
}

impl CartState {
    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    pub fn coupon(&self) -> Option<&Coupon> {
        self.coupon.as_ref()
    }

    pub fn total_amount(&self) -> Amount {
        self.total_amount
    }

    pub fn discount(&self) -> Amount {
        self.discount
    }

    /// Sum of quantities across lines.
    pub fn item_count(&self) -> u64 {
        self.items.iter().map(|i| i.quantity as u64).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn position(&self, product_id: &str, color: Option<&str>) -> Option<usize> {
        self.items.iter().position(|i| i.matches(product_id, color))
    }

    /// Add `quantity` units, merging into an existing line with the same key.
    ///
    /// Refused when the price is negative or the subtotal would leave the
    /// range of [`Amount`].
    pub fn add(&mut self, product: Product, color: Option<String>, quantity: u32) -> bool {
        if quantity == 0 {
            return false;
        }
        if product.price.is_negative() {
            warn!(
                product = %product.id,
                price = %product.price,
                "refusing line item with negative price"
            );
            return false;
        }
        match self.position(&product.id, color.as_deref()) {
            Some(idx) => {
                let price = self.items[idx].product.price;
                let merged = self.items[idx]
                    .quantity
                    .checked_add(quantity)
                    .filter(|&q| self.fits(&[idx], price, q));
                let Some(merged) = merged else {
                    return out_of_range(&product.id);
                };
                self.items[idx].quantity = merged;
            }
            None => {
                if !self.fits(&[], product.price, quantity) {
                    return out_of_range(&product.id);
                }
                self.items.push(LineItem::new(product, quantity, color));
            }
        }
        self.recompute();
        true
    }

    /// Set a line's quantity; below 1 removes it.
    pub fn set_quantity(&mut self, product_id: &str, color: Option<&str>, quantity: i64) -> bool {
        let Some(idx) = self.position(product_id, color) else {
            return false;
        };
        if quantity < 1 {
            self.items.remove(idx);
        } else {
            let price = self.items[idx].product.price;
            let quantity = u32::try_from(quantity)
                .ok()
                .filter(|&q| self.fits(&[idx], price, q));
            let Some(quantity) = quantity else {
                return out_of_range(product_id);
            };
            if self.items[idx].quantity == quantity {
                return false;
            }
            self.items[idx].quantity = quantity;
        }
        self.recompute();
        true
    }

    /// Move a line from one color to another, merging into the destination
    /// line when one already exists.
    pub fn recolor(&mut self, product_id: &str, from: Option<&str>, to: Option<&str>) -> bool {
        if from == to {
            return false;
        }
        let Some(src) = self.position(product_id, from) else {
            return false;
        };
        match self.position(product_id, to) {
            Some(dst) => {
                let price = self.items[dst].product.price;
                let merged = self.items[dst]
                    .quantity
                    .checked_add(self.items[src].quantity)
                    .filter(|&q| self.fits(&[src, dst], price, q));
                let Some(merged) = merged else {
                    return out_of_range(product_id);
                };
                self.items[dst].quantity = merged;
                self.items.remove(src);
            }
            None => self.items[src].selected_color = to.map(str::to_string),
        }
        self.recompute();
        true
    }

    pub fn remove(&mut self, product_id: &str, color: Option<&str>) -> bool {
        let Some(idx) = self.position(product_id, color) else {
            return false;
        };
        self.items.remove(idx);
        self.recompute();
        true
    }

    pub fn clear(&mut self) -> bool {
        if self.items.is_empty() && self.coupon.is_none() {
            return false;
        }
        self.items.clear();
        self.coupon = None;
        self.recompute();
        true
    }

    pub fn set_coupon(&mut self, mut coupon: Coupon) -> bool {
        coupon.code = canonical_code(&coupon.code);
        if self.coupon.as_ref() == Some(&coupon) {
            return false;
        }
        self.coupon = Some(coupon);
        self.recompute();
        true
    }

    pub fn clear_coupon(&mut self) -> bool {
        if self.coupon.take().is_none() {
            return false;
        }
        self.recompute();
        true
    }

    /// Apply one action; returns whether the cart changed.
    pub fn apply(&mut self, action: CartAction) -> bool {
        match action {
            CartAction::Add { product, color } => self.add(product, color, 1),
            CartAction::SetQuantity {
                product_id,
                color,
                quantity,
            } => self.set_quantity(&product_id, color.as_deref(), quantity),
            CartAction::Recolor {
                product_id,
                from,
                to,
            } => self.recolor(&product_id, from.as_deref(), to.as_deref()),
            CartAction::Remove { product_id, color } => self.remove(&product_id, color.as_deref()),
            CartAction::Clear => self.clear(),
            CartAction::ApplyCoupon(coupon) => self.set_coupon(coupon),
            CartAction::RemoveCoupon => self.clear_coupon(),
        }
    }

    /// Whether the subtotal stays representable once the lines at `replaced`
    /// give way to `quantity` units at `price`.
    fn fits(&self, replaced: &[usize], price: Amount, quantity: u32) -> bool {
        let rest = replaced
            .iter()
            .fold(self.total_amount, |acc, &idx| acc - self.items[idx].line_total());
        price
            .checked_mul(quantity)
            .and_then(|line| rest.checked_add(line))
            .is_some()
    }

    fn recompute(&mut self) {
        self.total_amount = self.items.iter().map(LineItem::line_total).sum();
        self.discount = pricing::discount_for(self.coupon.as_ref(), self.total_amount);
    }

    pub fn to_persisted(&self) -> PersistedCart {
        PersistedCart {
            items: self.items.clone(),
            coupon: self.coupon.clone(),
            discount: self.discount,
        }
    }

    /// Rebuild a state from a stored document.
    ///
    /// Lines with a zero quantity, a negative price or an out-of-range total
    /// are dropped, lines sharing a key are merged, and the stored discount
    /// is recomputed.
    pub fn from_persisted(doc: PersistedCart) -> Self {
        let mut state = CartState::default();
        for item in doc.items {
            if item.quantity == 0 {
                warn!(
                    product = %item.product.id,
                    "dropping stored line item with zero quantity"
                );
                continue;
            }
            state.add(item.product, item.selected_color, item.quantity);
        }
        if let Some(mut coupon) = doc.coupon {
            coupon.code = canonical_code(&coupon.code);
            state.coupon = Some(coupon);
        }
        state.recompute();
        state
    }
}

fn out_of_range(product_id: &str) -> bool {
    warn!(product = %product_id, "refusing change, quantity or cart total out of range");
    false
}
