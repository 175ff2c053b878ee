//! Pricing rules: coupon discount, delivery fee and grand total.

use serde::{Deserialize, Serialize};

use crate::Amount;
use crate::model::{Coupon, DiscountType};

/// Discount a coupon yields on `subtotal`.
///
/// Zero when the coupon's minimum order value is not met. Never more than
/// the subtotal.
pub fn coupon_discount(coupon: &Coupon, subtotal: Amount) -> Amount {
    if subtotal < coupon.min_order_value {
        return Amount::ZERO;
    }
    let raw = match coupon.discount_type {
        DiscountType::Flat => coupon.discount_amount,
        DiscountType::Percentage => subtotal.percentage(coupon.discount_amount),
    };
    raw.min(subtotal).floor_zero()
}

/// Cart discount for an optional coupon.
pub fn discount_for(coupon: Option<&Coupon>, subtotal: Amount) -> Amount {
    coupon.map_or(Amount::ZERO, |c| coupon_discount(c, subtotal))
}

/// `max(0, subtotal + delivery_fee - discount)`
pub fn grand_total(subtotal: Amount, delivery_fee: Amount, discount: Amount) -> Amount {
    (subtotal + delivery_fee - discount).floor_zero()
}

/// Pick the coupon with the largest discount on `subtotal`.
///
/// Ties keep the first candidate. A candidate yielding nothing (minimum order
/// unmet, zero amount) never wins, so `None` is returned when no candidate
/// gives a positive discount.
pub fn best_coupon(candidates: &[Coupon], subtotal: Amount) -> Option<&Coupon> {
    let mut best: Option<(&Coupon, Amount)> = None;
    for coupon in candidates {
        let discount = coupon_discount(coupon, subtotal);
        if discount.is_zero() {
            continue;
        }
        match best {
            Some((_, current)) if current >= discount => {}
            _ => best = Some((coupon, discount)),
        }
    }
    best.map(|(coupon, _)| coupon)
}

/// Candidates ordered by discount on `subtotal`, best first.
///
/// Coupons whose minimum is unmet compute to zero and sort last.
pub fn rank_coupons(candidates: &[Coupon], subtotal: Amount) -> Vec<(&Coupon, Amount)> {
    let mut ranked: Vec<_> = candidates
        .iter()
        .map(|c| (c, coupon_discount(c, subtotal)))
        .collect();
    // stable sort keeps input order among equal discounts
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked
}

/// Delivery settings supplied by the store configuration service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreConfig {
    /// Flat delivery fee.
    #[serde(default)]
    pub delivery_fee: Amount,
    /// Subtotal from which delivery is free. `None` means never free.
    #[serde(default)]
    pub min_order_free_delivery: Option<Amount>,
}

impl StoreConfig {
    pub fn new(delivery_fee: Amount, min_order_free_delivery: Option<Amount>) -> Self {
        Self {
            delivery_fee,
            min_order_free_delivery,
        }
    }

    /// Delivery fee owed on a cart with this subtotal.
    pub fn delivery_fee_for(&self, subtotal: Amount) -> Amount {
        if subtotal.is_zero() {
            return Amount::ZERO;
        }
        match self.min_order_free_delivery {
            Some(threshold) if subtotal >= threshold => Amount::ZERO,
            _ => self.delivery_fee,
        }
    }
}
