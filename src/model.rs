//! Core domain types for the cart engine.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::Amount;

/// Product identifier, as issued by the backend.
pub type ProductId = String;

/// A catalog product, as returned by the backend.
///
/// The engine only reads `id` and `price`; other descriptive fields are kept
/// so a line item can render without another catalog lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Amount,
    #[serde(default)]
    pub image: String,
    /// Available color variants.
    #[serde(default)]
    pub colors: Vec<String>,
    /// Any other catalog fields (description, category, stock, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Product {
    pub fn new(id: impl Into<ProductId>, name: impl Into<String>, price: Amount) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price,
            image: String::new(),
            colors: Vec::new(),
            extra: Map::new(),
        }
    }

    pub fn with_colors<I, S>(mut self, colors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.colors = colors.into_iter().map(Into::into).collect();
        self
    }
}

/// Identity of a line item: a product in one color.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LineKey {
    pub product_id: ProductId,
    pub color: Option<String>,
}

impl LineKey {
    pub fn new(product_id: impl Into<ProductId>, color: Option<&str>) -> Self {
        Self {
            product_id: product_id.into(),
            color: color.map(str::to_string),
        }
    }
}

/// One distinct product + color entry in the cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    /// Snapshot taken when the product was first added.
    pub product: Product,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_color: Option<String>,
}

impl LineItem {
    pub fn new(product: Product, quantity: u32, selected_color: Option<String>) -> Self {
        Self {
            product,
            quantity,
            selected_color,
        }
    }

    pub fn key(&self) -> LineKey {
        LineKey::new(self.product.id.clone(), self.selected_color.as_deref())
    }

    pub fn matches(&self, product_id: &str, color: Option<&str>) -> bool {
        self.product.id == product_id && self.selected_color.as_deref() == color
    }

    pub fn line_total(&self) -> Amount {
        self.product.price * self.quantity
    }
}

/// How a coupon's `discount_amount` is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscountType {
    /// Fixed rupee amount off.
    Flat,
    /// Percentage of the subtotal off.
    Percentage,
}

/// A validated, server-issued coupon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_amount: Amount,
    #[serde(default)]
    pub min_order_value: Amount,
}

impl Coupon {
    pub fn flat(code: &str, amount: Amount, min_order_value: Amount) -> Self {
        Self {
            code: canonical_code(code),
            discount_type: DiscountType::Flat,
            discount_amount: amount,
            min_order_value,
        }
    }

    pub fn percentage(code: &str, percent: Amount, min_order_value: Amount) -> Self {
        Self {
            code: canonical_code(code),
            discount_type: DiscountType::Percentage,
            discount_amount: percent,
            min_order_value,
        }
    }
}

/// Coupon codes are case-insensitive; the uppercase form is canonical.
pub fn canonical_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// A single user action against the cart.
#[derive(Debug, Clone)]
pub enum CartAction {
    /// Add one unit of a product in an optional color.
    Add {
        product: Product,
        color: Option<String>,
    },
    /// Set a line's quantity; anything below 1 removes the line.
    SetQuantity {
        product_id: ProductId,
        color: Option<String>,
        quantity: i64,
    },
    /// Move a line to another color, merging with an existing line there.
    Recolor {
        product_id: ProductId,
        from: Option<String>,
        to: Option<String>,
    },
    Remove {
        product_id: ProductId,
        color: Option<String>,
    },
    Clear,
    ApplyCoupon(Coupon),
    RemoveCoupon,
}

impl CartAction {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            CartAction::Add { .. } => "add_item",
            CartAction::SetQuantity { .. } => "update_quantity",
            CartAction::Recolor { .. } => "update_item_color",
            CartAction::Remove { .. } => "remove_item",
            CartAction::Clear => "clear_cart",
            CartAction::ApplyCoupon(_) => "apply_coupon",
            CartAction::RemoveCoupon => "remove_coupon",
        }
    }
}
