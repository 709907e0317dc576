//! Controller scenarios against a scripted venue.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crossover_engine::data::{to_x18, Granularity, VenueCandle};
use crossover_engine::live::{Controller, ControllerConfig, CycleOutcome};
use crossover_engine::paper::{PaperOrder, PaperVenue};
use crossover_engine::venue::{
    AccountSummary, MarketOrderParams, OrderAck, Subaccount, TriggerOrderParams, TriggerType,
    VenueClient,
};
use crossover_engine::{Error, PositionState, Result, Side};

// SMA 2/3 over these closes: last row is a +1 crossover at 12.
const BULLISH: [Decimal; 4] = [dec!(10), dec!(10), dec!(10), dec!(12)];
// Same history, then a drop: last row is a −1 crossover.
const BEARISH: [Decimal; 5] = [dec!(10), dec!(10), dec!(10), dec!(12), dec!(6)];
const FLAT_LINE: [Decimal; 4] = [dec!(10), dec!(10), dec!(10), dec!(10)];

fn candles(closes: &[Decimal]) -> Vec<VenueCandle> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| {
            let x = to_x18(c).unwrap().to_string();
            VenueCandle {
                timestamp: 1_700_000_000 + i as i64 * 3_600,
                open_x18: x.clone(),
                high_x18: x.clone(),
                low_x18: x.clone(),
                close_x18: x,
                volume: to_x18(dec!(1)).unwrap().to_string(),
            }
        })
        .collect()
}

#[derive(Default)]
struct Script {
    /// `None` makes the fetch fail. An exhausted queue returns no candles.
    candles: VecDeque<Option<Vec<VenueCandle>>>,
    candle_calls: usize,
    markets: Vec<MarketOrderParams>,
    triggers: Vec<TriggerOrderParams>,
    cancels: Vec<Vec<String>>,
    fail_buy: bool,
    fail_sell: bool,
    fail_triggers: bool,
}

#[derive(Default)]
struct MockVenue {
    script: Mutex<Script>,
}

impl MockVenue {
    fn with_candles(batches: Vec<Option<Vec<VenueCandle>>>) -> Self {
        let venue = Self::default();
        venue.script.lock().unwrap().candles = batches.into();
        venue
    }

    fn edit(&self, f: impl FnOnce(&mut Script)) {
        let mut s = self.script.lock().unwrap();
        f(&mut *s);
    }

    fn read<T>(&self, f: impl FnOnce(&Script) -> T) -> T {
        let s = self.script.lock().unwrap();
        f(&*s)
    }
}

fn rejected() -> Error {
    Error::Venue { status: 400, message: "rejected".into() }
}

#[async_trait]
impl VenueClient for MockVenue {
    async fn get_subaccounts(&self, _address: &str) -> Result<Vec<Subaccount>> {
        Ok(vec![Subaccount { subaccount: "0xsub".into() }])
    }

    async fn get_account_summary(&self, subaccount: &str) -> Result<AccountSummary> {
        Ok(AccountSummary {
            subaccount: subaccount.into(),
            exists: true,
            healths: vec![],
            spot_balances: vec![],
            perp_balances: vec![],
        })
    }

    async fn get_candlesticks(&self, _product_id: u32, _g: Granularity) -> Result<Vec<VenueCandle>> {
        let mut s = self.script.lock().unwrap();
        s.candle_calls += 1;
        match s.candles.pop_front() {
            Some(Some(batch)) => Ok(batch),
            Some(None) => Err(Error::Venue { status: 503, message: "indexer unavailable".into() }),
            None => Ok(vec![]),
        }
    }

    async fn place_market_order(&self, params: &MarketOrderParams) -> Result<OrderAck> {
        let mut s = self.script.lock().unwrap();
        s.markets.push(params.clone());
        let fail = match params.side {
            Side::Buy => s.fail_buy,
            Side::Sell => s.fail_sell,
        };
        if fail {
            return Err(rejected());
        }
        Ok(OrderAck { digest: format!("0xmarket{}", s.markets.len()) })
    }

    async fn place_price_trigger_order(&self, params: &TriggerOrderParams) -> Result<OrderAck> {
        let mut s = self.script.lock().unwrap();
        s.triggers.push(params.clone());
        if s.fail_triggers {
            return Err(rejected());
        }
        Ok(OrderAck { digest: format!("0xtrigger{}", s.triggers.len()) })
    }

    async fn cancel_trigger_orders(&self, _p: u32, _sender: &str, digests: &[String]) -> Result<()> {
        self.script.lock().unwrap().cancels.push(digests.to_vec());
        Ok(())
    }
}

fn config() -> ControllerConfig {
    ControllerConfig {
        product_id: 2,
        granularity: Granularity::OneHour,
        short_window: 2,
        long_window: 3,
        trade_amount: dec!(0.0001),
        stop_loss_percent: dec!(2.0),
        take_profit_percent: dec!(4.0),
        cancel_stale_protection: false,
        trigger_expiry: Duration::from_secs(7 * 24 * 3_600),
        check_interval: Duration::from_secs(3_600),
    }
}

fn controller(venue: MockVenue) -> Controller<MockVenue> {
    Controller::new(venue, config(), "0xsub")
}

#[tokio::test]
async fn buy_crossover_opens_long_with_protection() {
    let mut ctl = controller(MockVenue::with_candles(vec![Some(candles(&BULLISH))]));

    let outcome = ctl.run_cycle().await.unwrap();
    assert_eq!(outcome, CycleOutcome::Entered { entry_price: dec!(12), protective_orders: 2 });
    assert_eq!(ctl.state(), PositionState::Long);

    ctl.venue().read(|s| {
        assert_eq!(s.markets.len(), 1);
        assert_eq!(s.markets[0].side, Side::Buy);
        assert_eq!(s.markets[0].amount, dec!(0.0001));
        assert_eq!(s.markets[0].subaccount, "0xsub");

        assert_eq!(s.triggers.len(), 2);
        let (sl, tp) = (&s.triggers[0], &s.triggers[1]);
        assert_eq!(sl.trigger_type, TriggerType::LastPriceBelow);
        assert_eq!(sl.trigger_price, dec!(11.76));
        assert_eq!(tp.trigger_type, TriggerType::LastPriceAbove);
        assert_eq!(tp.trigger_price, dec!(12.48));
        for t in [sl, tp] {
            assert!(t.reduce_only);
            assert_eq!(t.amount, dec!(-0.0001));
            assert_eq!(t.price, Decimal::ZERO);
            assert!(t.expiration > Utc::now() + chrono::Duration::days(6));
        }
    });
    assert_eq!(ctl.protective_orders().len(), 2);
}

#[tokio::test]
async fn failed_buy_stays_flat_without_triggers() {
    let venue = MockVenue::with_candles(vec![Some(candles(&BULLISH))]);
    venue.edit(|s| s.fail_buy = true);
    let mut ctl = controller(venue);

    assert_eq!(ctl.run_cycle().await.unwrap(), CycleOutcome::EntryFailed);
    assert_eq!(ctl.state(), PositionState::Flat);
    ctl.venue().read(|s| {
        assert_eq!(s.markets.len(), 1);
        assert!(s.triggers.is_empty());
    });
}

#[tokio::test]
async fn failed_trigger_leaves_position_long() {
    let venue = MockVenue::with_candles(vec![Some(candles(&BULLISH))]);
    venue.edit(|s| s.fail_triggers = true);
    let mut ctl = controller(venue);

    let outcome = ctl.run_cycle().await.unwrap();
    assert_eq!(outcome, CycleOutcome::Entered { entry_price: dec!(12), protective_orders: 0 });
    assert_eq!(ctl.state(), PositionState::Long);
    assert_eq!(ctl.venue().read(|s| s.triggers.len()), 2);
}

#[tokio::test]
async fn sell_crossover_closes_long() {
    let mut ctl = controller(MockVenue::with_candles(vec![
        Some(candles(&BULLISH)),
        Some(candles(&BEARISH)),
    ]));

    ctl.run_cycle().await.unwrap();
    assert_eq!(ctl.run_cycle().await.unwrap(), CycleOutcome::Exited);
    assert_eq!(ctl.state(), PositionState::Flat);
    ctl.venue().read(|s| {
        assert_eq!(s.markets.len(), 2);
        assert_eq!(s.markets[1].side, Side::Sell);
        assert_eq!(s.markets[1].amount, dec!(0.0001));
        assert!(s.cancels.is_empty());
    });
    assert!(ctl.protective_orders().is_empty());
}

#[tokio::test]
async fn failed_sell_stays_long() {
    let venue = MockVenue::with_candles(vec![Some(candles(&BULLISH)), Some(candles(&BEARISH))]);
    venue.edit(|s| s.fail_sell = true);
    let mut ctl = controller(venue);

    ctl.run_cycle().await.unwrap();
    assert_eq!(ctl.run_cycle().await.unwrap(), CycleOutcome::ExitFailed);
    assert_eq!(ctl.state(), PositionState::Long);
    assert_eq!(ctl.protective_orders().len(), 2);
}

#[tokio::test]
async fn stale_protection_is_cancelled_when_enabled() {
    let venue = MockVenue::with_candles(vec![Some(candles(&BULLISH)), Some(candles(&BEARISH))]);
    let cfg = ControllerConfig { cancel_stale_protection: true, ..config() };
    let mut ctl = Controller::new(venue, cfg, "0xsub");

    ctl.run_cycle().await.unwrap();
    assert_eq!(ctl.run_cycle().await.unwrap(), CycleOutcome::Exited);
    ctl.venue().read(|s| {
        assert_eq!(s.cancels, vec![vec!["0xtrigger1".to_string(), "0xtrigger2".to_string()]]);
    });
}

#[tokio::test]
async fn repeated_buy_signal_while_long_holds() {
    let mut ctl = controller(MockVenue::with_candles(vec![
        Some(candles(&BULLISH)),
        Some(candles(&BULLISH)),
    ]));

    ctl.run_cycle().await.unwrap();
    assert_eq!(ctl.run_cycle().await.unwrap(), CycleOutcome::Hold);
    assert_eq!(ctl.venue().read(|s| s.markets.len()), 1);
}

#[tokio::test]
async fn sell_signal_while_flat_holds() {
    let mut ctl = controller(MockVenue::with_candles(vec![Some(candles(&BEARISH))]));
    assert_eq!(ctl.run_cycle().await.unwrap(), CycleOutcome::Hold);
    assert_eq!(ctl.state(), PositionState::Flat);
}

#[tokio::test]
async fn no_crossover_holds() {
    let mut ctl = controller(MockVenue::with_candles(vec![Some(candles(&FLAT_LINE))]));
    assert_eq!(ctl.run_cycle().await.unwrap(), CycleOutcome::Hold);
    assert!(ctl.venue().read(|s| s.markets.is_empty()));
}

#[tokio::test]
async fn empty_candles_skip_cycle() {
    let mut ctl = controller(MockVenue::with_candles(vec![Some(vec![])]));
    assert_eq!(ctl.run_cycle().await.unwrap(), CycleOutcome::Skipped);
    assert_eq!(ctl.state(), PositionState::Flat);
    ctl.venue().read(|s| {
        assert!(s.markets.is_empty());
        assert!(s.triggers.is_empty());
    });
}

#[tokio::test]
async fn fetch_error_surfaces_from_cycle() {
    let mut ctl = controller(MockVenue::with_candles(vec![None]));
    let err = ctl.run_cycle().await.unwrap_err();
    assert!(matches!(err, Error::Venue { status: 503, .. }));
    assert!(!err.is_fatal());
}

#[tokio::test]
async fn run_until_survives_cycle_error_and_stops_on_shutdown() {
    let mut ctl = controller(MockVenue::with_candles(vec![None]));

    ctl.run_until(async {}).await;

    assert_eq!(ctl.venue().read(|s| s.candle_calls), 1);
    assert_eq!(ctl.state(), PositionState::Flat);
}

#[tokio::test]
async fn dry_run_records_orders_without_touching_inner_venue() {
    let inner = MockVenue::with_candles(vec![Some(candles(&BULLISH))]);
    let mut ctl = Controller::new(PaperVenue::new(inner), config(), "0xsub");

    let outcome = ctl.run_cycle().await.unwrap();
    assert_eq!(outcome, CycleOutcome::Entered { entry_price: dec!(12), protective_orders: 2 });
    assert_eq!(ctl.protective_orders(), ["paper-00000002", "paper-00000003"]);

    let orders = ctl.venue().orders();
    assert_eq!(orders.len(), 3);
    assert!(matches!(&orders[0], PaperOrder::Market(m) if m.side == Side::Buy));
    assert!(matches!(&orders[1], PaperOrder::Trigger(t) if t.trigger_type == TriggerType::LastPriceBelow));
    assert!(ctl.venue().inner().read(|s| s.markets.is_empty() && s.triggers.is_empty()));
}
