/// venue.rs — Venue client abstraction
///
/// The controller and the binaries only talk to the venue through
/// `VenueClient`. All values crossing this trait are already descaled
/// decimals; x18 encoding is the implementation's concern.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::data::{Granularity, VenueCandle};
use crate::error::Result;
use crate::models::Side;

/// Position amounts below this are treated as dust.
const DUST_AMOUNT: Decimal = dec!(0.00001);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subaccount {
    pub subaccount: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    pub assets: Decimal,
    pub liabilities: Decimal,
    pub health: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpotBalance {
    pub product_id: u32,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerpBalance {
    pub product_id: u32,
    /// Signed base amount; negative is short.
    pub amount: Decimal,
    pub v_quote_balance: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSummary {
    pub subaccount: String,
    pub exists: bool,
    pub healths: Vec<Health>,
    pub spot_balances: Vec<SpotBalance>,
    pub perp_balances: Vec<PerpBalance>,
}

/// Open perp position as reported by the venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenPerp {
    pub amount: Decimal,
    /// |v_quote_balance / amount|
    pub entry_price: Decimal,
}

impl AccountSummary {
    /// Non-dust perp position for `product_id`, if any.
    pub fn perp_position(&self, product_id: u32) -> Option<OpenPerp> {
        let bal = self.perp_balances.iter().find(|b| b.product_id == product_id)?;
        if bal.amount.abs() <= DUST_AMOUNT {
            return None;
        }
        Some(OpenPerp {
            amount: bal.amount,
            entry_price: (bal.v_quote_balance / bal.amount).abs(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketOrderParams {
    pub product_id: u32,
    pub subaccount: String,
    pub side: Side,
    /// Unsigned base amount.
    pub amount: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    LastPriceAbove,
    LastPriceBelow,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerOrderParams {
    pub product_id: u32,
    pub sender: String,
    /// Limit price once triggered; zero means market.
    pub price: Decimal,
    /// Signed amount: negative sells.
    pub amount: Decimal,
    pub trigger_price: Decimal,
    pub trigger_type: TriggerType,
    pub expiration: DateTime<Utc>,
    pub reduce_only: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAck {
    pub digest: String,
}

/// Every call may fail; callers decide whether that is fatal.
#[async_trait]
pub trait VenueClient: Send + Sync {
    async fn get_subaccounts(&self, address: &str) -> Result<Vec<Subaccount>>;

    async fn get_account_summary(&self, subaccount: &str) -> Result<AccountSummary>;

    async fn get_candlesticks(
        &self,
        product_id: u32,
        granularity: Granularity,
    ) -> Result<Vec<VenueCandle>>;

    async fn place_market_order(&self, params: &MarketOrderParams) -> Result<OrderAck>;

    async fn place_price_trigger_order(&self, params: &TriggerOrderParams) -> Result<OrderAck>;

    async fn cancel_trigger_orders(
        &self,
        product_id: u32,
        sender: &str,
        digests: &[String],
    ) -> Result<()>;
}
