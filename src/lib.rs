pub mod amount;
pub mod config;
pub mod csv;
pub mod engine;
pub mod model;
pub mod pricing;
pub mod reorder;
pub mod service;
pub mod store;

pub use amount::Amount;
pub use engine::{ActionOutcome, CartEngine, CartSummary};
pub use model::{CartAction, Coupon, DiscountType, LineItem, LineKey, Product, ProductId};
pub use pricing::StoreConfig;
pub use store::{FileStore, KeyValueStore, MemoryStore};
