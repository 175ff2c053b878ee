//! Clients for the storefront backend and the flows gluing them to the cart.
//!
//! Three collaborators sit behind HTTP: coupon validation, store settings and
//! order placement. Each is a trait so flows can run against [`HttpApi`] or
//! an in-process fake.

use std::future::Future;

use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::Amount;
use crate::engine::CartEngine;
use crate::model::{Coupon, LineItem, canonical_code};
use crate::pricing::StoreConfig;
use crate::store::KeyValueStore;

/// Errors from backend calls and the flows built on them.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("coupon code is empty")]
    EmptyCode,

    #[error("cart is empty")]
    EmptyCart,
}

/// Validates a coupon code against the current order total.
pub trait CouponValidator {
    fn validate(
        &self,
        code: &str,
        order_total: Amount,
    ) -> impl Future<Output = Result<Coupon, ServiceError>> + Send;
}

/// Supplies delivery settings.
pub trait SettingsProvider {
    fn store_config(&self) -> impl Future<Output = Result<StoreConfig, ServiceError>> + Send;
}

/// Creates orders.
pub trait OrderPlacer {
    fn place_order(
        &self,
        order: &OrderSnapshot,
    ) -> impl Future<Output = Result<OrderReceipt, ServiceError>> + Send;
}

/// Everything the order service needs to create an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSnapshot {
    pub items: Vec<LineItem>,
    pub total_amount: Amount,
    pub discount: Amount,
    pub delivery_fee: Amount,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coupon_code: Option<String>,
    pub grand_total: Amount,
}

impl OrderSnapshot {
    pub fn from_engine<S: KeyValueStore>(engine: &CartEngine<S>, config: &StoreConfig) -> Self {
        let delivery_fee = config.delivery_fee_for(engine.total_amount());
        Self {
            items: engine.items().to_vec(),
            total_amount: engine.total_amount(),
            discount: engine.discount(),
            delivery_fee,
            coupon_code: engine.coupon().map(|c| c.code.clone()),
            grand_total: engine.grand_total(delivery_fee),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderReceipt {
    pub order_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ValidateRequest<'a> {
    code: &'a str,
    order_total: Amount,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// HTTP client for the storefront backend.
#[derive(Debug, Clone)]
pub struct HttpApi {
    client: Client,
    base_url: String,
}

impl HttpApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Turn a non-success response into [`ServiceError::Rejected`], using the
    /// server's `message` when the body carries one.
    async fn check(resp: Response) -> Result<Response, ServiceError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<ErrorBody>(&body) {
            Ok(err) => err.message,
            Err(_) if !body.trim().is_empty() => body,
            Err(_) => status.canonical_reason().unwrap_or("error").to_string(),
        };
        Err(ServiceError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}

impl CouponValidator for HttpApi {
    async fn validate(&self, code: &str, order_total: Amount) -> Result<Coupon, ServiceError> {
        let resp = self
            .client
            .post(self.url("/coupons/validate"))
            .json(&ValidateRequest { code, order_total })
            .send()
            .await?;
        Ok(Self::check(resp).await?.json().await?)
    }
}

impl SettingsProvider for HttpApi {
    async fn store_config(&self) -> Result<StoreConfig, ServiceError> {
        let resp = self.client.get(self.url("/settings")).send().await?;
        Ok(Self::check(resp).await?.json().await?)
    }
}

impl OrderPlacer for HttpApi {
    async fn place_order(&self, order: &OrderSnapshot) -> Result<OrderReceipt, ServiceError> {
        let resp = self
            .client
            .post(self.url("/orders"))
            .json(order)
            .send()
            .await?;
        Ok(Self::check(resp).await?.json().await?)
    }
}

/// Validate `code` against the current subtotal and attach the coupon.
///
/// The cart is left untouched when validation fails.
pub async fn redeem_coupon<S: KeyValueStore>(
    engine: &mut CartEngine<S>,
    validator: &impl CouponValidator,
    code: &str,
) -> Result<Coupon, ServiceError> {
    let code = canonical_code(code);
    if code.is_empty() {
        return Err(ServiceError::EmptyCode);
    }

    match validator.validate(&code, engine.total_amount()).await {
        Ok(mut coupon) => {
            coupon.code = canonical_code(&coupon.code);
            engine.apply_coupon(coupon.clone());
            info!(code = %code, discount = %engine.discount(), "coupon applied");
            Ok(coupon)
        }
        Err(e) => {
            warn!(code = %code, reason = %e, "coupon rejected");
            Err(e)
        }
    }
}

/// Place an order for the current cart and clear it once the order exists.
///
/// On failure the cart keeps its items so the user can retry.
pub async fn checkout<S: KeyValueStore>(
    engine: &mut CartEngine<S>,
    placer: &impl OrderPlacer,
    config: &StoreConfig,
) -> Result<OrderReceipt, ServiceError> {
    if engine.is_empty() {
        return Err(ServiceError::EmptyCart);
    }

    let snapshot = OrderSnapshot::from_engine(engine, config);
    match placer.place_order(&snapshot).await {
        Ok(receipt) => {
            info!(
                order = %receipt.order_id,
                total = %snapshot.grand_total,
                "order placed"
            );
            engine.clear_cart();
            Ok(receipt)
        }
        Err(e) => {
            warn!(reason = %e, "order placement failed, keeping cart");
            Err(e)
        }
    }
}
