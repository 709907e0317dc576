/// paper.rs — Dry-run venue
///
/// Wraps a real client: market data and account reads go to the venue,
/// order placements are logged, recorded and acknowledged locally.
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use tracing::info;

use crate::data::{Granularity, VenueCandle};
use crate::error::Result;
use crate::venue::{
    AccountSummary, MarketOrderParams, OrderAck, Subaccount, TriggerOrderParams, VenueClient,
};

#[derive(Debug, Clone, PartialEq)]
pub enum PaperOrder {
    Market(MarketOrderParams),
    Trigger(TriggerOrderParams),
    Cancel(Vec<String>),
}

pub struct PaperVenue<V> {
    inner: V,
    next_id: AtomicU64,
    orders: Mutex<Vec<PaperOrder>>,
}

impl<V: VenueClient> PaperVenue<V> {
    pub fn new(inner: V) -> Self {
        Self { inner, next_id: AtomicU64::new(1), orders: Mutex::new(Vec::new()) }
    }

    pub fn inner(&self) -> &V {
        &self.inner
    }

    /// Orders "placed" so far, oldest first.
    pub fn orders(&self) -> Vec<PaperOrder> {
        self.orders.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn record(&self, order: PaperOrder) -> OrderAck {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.orders.lock().unwrap_or_else(PoisonError::into_inner).push(order);
        OrderAck { digest: format!("paper-{id:08}") }
    }
}

#[async_trait]
impl<V: VenueClient> VenueClient for PaperVenue<V> {
    async fn get_subaccounts(&self, address: &str) -> Result<Vec<Subaccount>> {
        self.inner.get_subaccounts(address).await
    }

    async fn get_account_summary(&self, subaccount: &str) -> Result<AccountSummary> {
        self.inner.get_account_summary(subaccount).await
    }

    async fn get_candlesticks(
        &self,
        product_id: u32,
        granularity: Granularity,
    ) -> Result<Vec<VenueCandle>> {
        self.inner.get_candlesticks(product_id, granularity).await
    }

    async fn place_market_order(&self, params: &MarketOrderParams) -> Result<OrderAck> {
        let ack = self.record(PaperOrder::Market(params.clone()));
        info!("[paper] {} {} of product {} @ MARKET -> {}", params.side, params.amount, params.product_id, ack.digest);
        Ok(ack)
    }

    async fn place_price_trigger_order(&self, params: &TriggerOrderParams) -> Result<OrderAck> {
        let ack = self.record(PaperOrder::Trigger(params.clone()));
        info!(
            "[paper] {:?} trigger @ {} amount {} reduce_only={} -> {}",
            params.trigger_type, params.trigger_price, params.amount, params.reduce_only, ack.digest
        );
        Ok(ack)
    }

    async fn cancel_trigger_orders(
        &self,
        _product_id: u32,
        _sender: &str,
        digests: &[String],
    ) -> Result<()> {
        self.record(PaperOrder::Cancel(digests.to_vec()));
        info!("[paper] cancelled {} trigger order(s)", digests.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::panic::{catch_unwind, AssertUnwindSafe};

    struct Offline;

    #[async_trait]
    impl VenueClient for Offline {
        async fn get_subaccounts(&self, _address: &str) -> Result<Vec<Subaccount>> {
            Err(Error::EmptyData("subaccounts"))
        }

        async fn get_account_summary(&self, _subaccount: &str) -> Result<AccountSummary> {
            Err(Error::EmptyData("account summary"))
        }

        async fn get_candlesticks(&self, _: u32, _: Granularity) -> Result<Vec<VenueCandle>> {
            Err(Error::EmptyData("candles"))
        }

        async fn place_market_order(&self, _params: &MarketOrderParams) -> Result<OrderAck> {
            Err(Error::Venue { status: 503, message: "offline".into() })
        }

        async fn place_price_trigger_order(&self, _params: &TriggerOrderParams) -> Result<OrderAck> {
            Err(Error::Venue { status: 503, message: "offline".into() })
        }

        async fn cancel_trigger_orders(&self, _: u32, _: &str, _: &[String]) -> Result<()> {
            Err(Error::Venue { status: 503, message: "offline".into() })
        }
    }

    #[tokio::test]
    async fn cancels_are_recorded_without_touching_the_venue() {
        let venue = PaperVenue::new(Offline);
        venue.cancel_trigger_orders(2, "0xabc", &["d1".into(), "d2".into()]).await.unwrap();
        assert_eq!(venue.orders(), vec![PaperOrder::Cancel(vec!["d1".into(), "d2".into()])]);
    }

    #[tokio::test]
    async fn ledger_survives_a_poisoned_lock() {
        let venue = PaperVenue::new(Offline);
        venue.cancel_trigger_orders(2, "0xabc", &["d1".into()]).await.unwrap();

        let poisoned = catch_unwind(AssertUnwindSafe(|| {
            let _guard = venue.orders.lock().unwrap();
            panic!("writer died holding the ledger");
        }));
        assert!(poisoned.is_err());
        assert!(venue.orders.is_poisoned());

        venue.cancel_trigger_orders(2, "0xabc", &["d2".into()]).await.unwrap();
        assert_eq!(
            venue.orders(),
            vec![PaperOrder::Cancel(vec!["d1".into()]), PaperOrder::Cancel(vec!["d2".into()])]
        );
    }
}
