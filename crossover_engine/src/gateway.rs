/// gateway.rs — Venue client over the JSON/HTTP gateway
///
/// Implements `VenueClient` against the venue's REST gateway.
/// Compatible with both testnet and mainnet (selected by base URL).
///
/// REQUEST FLOW (mutating calls):
///   1. Scale decimal fields to x18 integer strings
///   2. Serialize the JSON body
///   3. Sign `"{timestamp_ms}{body}"` with HMAC-SHA256 keyed by the signing secret
///   4. POST with `X-VENUE-TIMESTAMP` / `X-VENUE-SIGNATURE` headers
///
/// ENDPOINTS:
///   GET  /v1/subaccounts?address=…            → {"subaccounts": [{"subaccount": …}]}
///   GET  /v1/subaccounts/{id}/summary         → account summary (x18 strings)
///   GET  /v1/candlesticks?product_id=…&granularity=…  → {"candlesticks": [...]}
///   POST /v1/orders/market
///   POST /v1/orders/trigger
///   POST /v1/orders/trigger/cancel
///
/// Error responses carry `{"error": "..."}` and become `Error::Venue`.
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::{debug, error, info};

use crate::data::{parse_x18, to_x18, Granularity, VenueCandle};
use crate::error::{Error, Result};
use crate::venue::{
    AccountSummary, Health, MarketOrderParams, OrderAck, PerpBalance, SpotBalance, Subaccount,
    TriggerOrderParams, TriggerType, VenueClient,
};

type HmacSha256 = Hmac<Sha256>;

// ── Wire types ────────────────────────────────────────────────────────────

#[derive(Deserialize, Debug)]
struct SubaccountsResponse {
    subaccounts: Vec<Subaccount>,
}

#[derive(Deserialize, Debug)]
struct CandlesticksResponse {
    candlesticks: Vec<VenueCandle>,
}

#[derive(Deserialize, Debug)]
struct WireHealth {
    assets: String,
    liabilities: String,
    health: String,
}

#[derive(Deserialize, Debug)]
struct WireBalance {
    amount: String,
    #[serde(default)]
    v_quote_balance: Option<String>,
}

#[derive(Deserialize, Debug)]
struct WireProductBalance {
    product_id: u32,
    balance: WireBalance,
}

#[derive(Deserialize, Debug)]
struct WireSummary {
    subaccount: String,
    exists: bool,
    #[serde(default)]
    healths: Vec<WireHealth>,
    #[serde(default)]
    spot_balances: Vec<WireProductBalance>,
    #[serde(default)]
    perp_balances: Vec<WireProductBalance>,
}

impl WireSummary {
    fn into_summary(self) -> Result<AccountSummary> {
        let healths = self
            .healths
            .iter()
            .map(|h| {
                Ok(Health {
                    assets: parse_x18(&h.assets)?,
                    liabilities: parse_x18(&h.liabilities)?,
                    health: parse_x18(&h.health)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let spot_balances = self
            .spot_balances
            .iter()
            .map(|b| {
                Ok(SpotBalance {
                    product_id: b.product_id,
                    amount: parse_x18(&b.balance.amount)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let perp_balances = self
            .perp_balances
            .iter()
            .map(|b| {
                let v_quote = b.balance.v_quote_balance.as_deref().unwrap_or("0");
                Ok(PerpBalance {
                    product_id: b.product_id,
                    amount: parse_x18(&b.balance.amount)?,
                    v_quote_balance: parse_x18(v_quote)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(AccountSummary {
            subaccount: self.subaccount,
            exists: self.exists,
            healths,
            spot_balances,
            perp_balances,
        })
    }
}

#[derive(Serialize, Debug)]
struct WireMarketOrder<'a> {
    product_id: u32,
    subaccount: &'a str,
    is_buy: bool,
    amount_x18: String,
}

#[derive(Serialize, Debug)]
struct WireTriggerOrder<'a> {
    product_id: u32,
    sender: &'a str,
    price_x18: String,
    amount_x18: String,
    trigger_price_x18: String,
    trigger_type: TriggerType,
    /// Unix seconds.
    expiration: i64,
    reduce_only: bool,
}

#[derive(Serialize, Debug)]
struct WireCancel<'a> {
    product_id: u32,
    sender: &'a str,
    digests: &'a [String],
}

#[derive(Deserialize, Debug)]
struct GatewayError {
    error: String,
}

// ── Gateway client ────────────────────────────────────────────────────────

pub struct GatewayClient {
    client:      Client,
    signing_key: String,
    base_url:    String,
}

impl GatewayClient {
    pub fn new(base_url: &str, signing_key: &str) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self {
            client,
            signing_key: signing_key.to_owned(),
            base_url: base_url.trim_end_matches('/').to_owned(),
        })
    }

    /// Hex HMAC-SHA256 of `payload`.
    fn sign(&self, payload: &str) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(self.signing_key.as_bytes())
            .map_err(|e| Error::config(format!("signing key rejected: {e}")))?;
        mac.update(payload.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    async fn get<T: DeserializeOwned>(&self, path_and_query: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path_and_query);
        debug!("GET {url}");
        let resp = self.client.get(&url).send().await?;
        decode(resp).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let body = serde_json::to_string(body)?;
        let ts = Utc::now().timestamp_millis();
        let signature = self.sign(&format!("{ts}{body}"))?;
        debug!("POST {url} {body}");

        let resp = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("X-VENUE-TIMESTAMP", ts.to_string())
            .header("X-VENUE-SIGNATURE", signature)
            .body(body)
            .send()
            .await?;
        decode(resp).await
    }
}

async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T> {
    let status = resp.status();
    let body = resp.text().await?;

    if !status.is_success() {
        let message = match serde_json::from_str::<GatewayError>(&body) {
            Ok(e) => e.error,
            Err(_) => body,
        };
        error!("Gateway error {}: {}", status, message);
        return Err(Error::Venue { status: status.as_u16(), message });
    }
    Ok(serde_json::from_str(&body)?)
}

#[async_trait]
impl VenueClient for GatewayClient {
    async fn get_subaccounts(&self, address: &str) -> Result<Vec<Subaccount>> {
        let resp: SubaccountsResponse =
            self.get(&format!("/v1/subaccounts?address={address}")).await?;
        Ok(resp.subaccounts)
    }

    async fn get_account_summary(&self, subaccount: &str) -> Result<AccountSummary> {
        let wire: WireSummary = self.get(&format!("/v1/subaccounts/{subaccount}/summary")).await?;
        wire.into_summary()
    }

    async fn get_candlesticks(
        &self,
        product_id: u32,
        granularity: Granularity,
    ) -> Result<Vec<VenueCandle>> {
        let resp: CandlesticksResponse = self
            .get(&format!(
                "/v1/candlesticks?product_id={product_id}&granularity={}",
                granularity.seconds()
            ))
            .await?;
        Ok(resp.candlesticks)
    }

    async fn place_market_order(&self, params: &MarketOrderParams) -> Result<OrderAck> {
        let wire = WireMarketOrder {
            product_id: params.product_id,
            subaccount: &params.subaccount,
            is_buy: params.side.is_buy(),
            amount_x18: to_x18(params.amount)?.to_string(),
        };
        info!("Placing {} {} of product {} @ MARKET", params.side, params.amount, params.product_id);
        let ack: OrderAck = self.post("/v1/orders/market", &wire).await?;
        info!(digest = %ack.digest, "Market order accepted");
        Ok(ack)
    }

    async fn place_price_trigger_order(&self, params: &TriggerOrderParams) -> Result<OrderAck> {
        let wire = WireTriggerOrder {
            product_id: params.product_id,
            sender: &params.sender,
            price_x18: to_x18(params.price)?.to_string(),
            amount_x18: to_x18(params.amount)?.to_string(),
            trigger_price_x18: to_x18(params.trigger_price)?.to_string(),
            trigger_type: params.trigger_type,
            expiration: params.expiration.timestamp(),
            reduce_only: params.reduce_only,
        };
        let ack: OrderAck = self.post("/v1/orders/trigger", &wire).await?;
        info!(digest = %ack.digest, trigger = ?params.trigger_type, "Trigger order accepted");
        Ok(ack)
    }

    async fn cancel_trigger_orders(
        &self,
        product_id: u32,
        sender: &str,
        digests: &[String],
    ) -> Result<()> {
        let wire = WireCancel { product_id, sender, digests };
        let _: serde_json::Value = self.post("/v1/orders/trigger/cancel", &wire).await?;
        info!("Cancelled {} trigger order(s)", digests.len());
        Ok(())
    }
}
