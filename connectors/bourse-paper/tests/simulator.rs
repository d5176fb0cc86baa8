use std::collections::HashMap;
use std::sync::Arc;

use bourse_broker::{ExchangeListener, ListenerFanout, OrderStore, PortfolioStore};
use bourse_core::{
    AssetId, Order, OrderId, OrderState, OrderUpdate, Position, Side, Trade, TradeId,
};
use bourse_execution::{LiveOrderCache, OrderCacheConfig};
use bourse_paper::{
    ExchangeEventSimulator, MissingOrderPolicy, SimulationReport, SimulatorConfig, SimulatorError,
};
use bourse_portfolio::Portfolio;
use bourse_test_utils::{
    base_time, candle, candle_at, init_test_tracing, trade, OrderBuilder, RecordedEvent,
    RecordingListener,
};
use parking_lot::Mutex;
use rust_decimal::Decimal;

type CacheSimulator = ExchangeEventSimulator<Arc<LiveOrderCache>, Arc<Portfolio>, ListenerFanout>;

struct Harness {
    cache: Arc<LiveOrderCache>,
    portfolio: Arc<Portfolio>,
    recorder: Arc<RecordingListener>,
    simulator: CacheSimulator,
}

fn harness(cache_config: OrderCacheConfig, config: SimulatorConfig) -> Harness {
    init_test_tracing();
    let cache = Arc::new(LiveOrderCache::new(cache_config));
    let portfolio = Arc::new(Portfolio::default());
    let recorder = Arc::new(RecordingListener::new());
    let listener = ListenerFanout::new()
        .with(cache.clone())
        .with(recorder.clone());
    let simulator =
        ExchangeEventSimulator::with_config(cache.clone(), portfolio.clone(), listener, config);
    Harness {
        cache,
        portfolio,
        recorder,
        simulator,
    }
}

fn default_harness() -> Harness {
    harness(OrderCacheConfig::default(), SimulatorConfig::default())
}

fn without_reactions() -> OrderCacheConfig {
    OrderCacheConfig {
        cancel_siblings_on_fill: false,
        spawn_exit_orders: false,
    }
}

fn btc() -> AssetId {
    AssetId::from("BTC")
}

fn usdt() -> AssetId {
    AssetId::from("USDT")
}

#[test]
fn buy_limit_below_close_fills_and_moves_balances() {
    let h = default_harness();
    h.portfolio.set_free(usdt(), Decimal::from(1_000));
    h.cache.open_trade(trade(1, "BTC", "USDT")).unwrap();
    h.cache
        .submit(OrderBuilder::limit(1, Side::Buy, 100).quantity(2).build())
        .unwrap();

    let bar = candle(100, 101, 98, 99);
    let report = h.simulator.simulate(&bar).unwrap();
    assert_eq!(report.filled, 1);
    assert_eq!(report.passes, 1);

    let events = h.recorder.events();
    assert_eq!(events.len(), 3);
    let RecordedEvent::Order(update) = &events[0] else {
        panic!("first event must be the order update, got {:?}", events[0]);
    };
    assert_eq!(update.state, OrderState::Filled);
    assert_eq!(update.price, Decimal::from(100));
    assert_eq!(update.cum_executed_qty, Decimal::from(2));
    assert_eq!(update.last_executed_qty, Decimal::from(2));
    assert_eq!(update.timestamp, bar.close_time);
    assert_eq!(
        events[1],
        RecordedEvent::Position(Position::with_free(btc(), Decimal::from(2)))
    );
    assert_eq!(
        events[2],
        RecordedEvent::Position(Position::with_free(usdt(), Decimal::from(800)))
    );

    assert_eq!(h.portfolio.free(btc()), Decimal::from(2));
    assert_eq!(h.portfolio.free(usdt()), Decimal::from(800));
    assert!(h.cache.is_empty());
}

#[test]
fn pending_open_and_cancel_resolve_without_position_updates() {
    let h = default_harness();
    h.cache.open_trade(trade(1, "BTC", "USDT")).unwrap();
    h.cache.open_trade(trade(2, "ETH", "USDT")).unwrap();
    h.cache
        .submit(
            OrderBuilder::limit(1, Side::Buy, 50)
                .state(OrderState::OpenPendingExt)
                .build(),
        )
        .unwrap();
    h.cache
        .submit(
            OrderBuilder::limit(2, Side::Sell, 500)
                .trade(2)
                .state(OrderState::CancelPendingExt)
                .build(),
        )
        .unwrap();

    // prices far away from both orders
    let bar = candle(1, 1, 1, 1);
    let report = h.simulator.simulate(&bar).unwrap();
    assert_eq!(
        report,
        SimulationReport {
            passes: 1,
            confirmed: 1,
            canceled: 1,
            ..SimulationReport::default()
        }
    );

    assert!(h.recorder.position_updates().is_empty());
    let updates = h.recorder.order_updates();
    assert_eq!(updates.len(), 2);
    assert_eq!(updates[0].state, OrderState::Opened);
    assert_eq!(updates[0].timestamp, base_time());
    assert_eq!(updates[0].cum_executed_qty, Decimal::ZERO);
    assert_eq!(updates[1].state, OrderState::Canceled);
    assert_eq!(updates[1].timestamp, bar.close_time);

    assert_eq!(h.cache.order(OrderId(1)).unwrap().state, OrderState::Opened);
    assert!(h.cache.order(OrderId(2)).is_none());
    assert!(h.portfolio.is_empty());
}

#[test]
fn pass_evaluates_orders_in_priority_sequence() {
    let h = harness(without_reactions(), SimulatorConfig::default());
    h.cache.open_trade(trade(1, "BTC", "USDT")).unwrap();
    let orders = vec![
        OrderBuilder::limit(10, Side::Sell, 95).build(),
        OrderBuilder::limit(11, Side::Buy, 105).build(),
        OrderBuilder::stop_loss_market(12, Side::Sell, 90).build(),
        OrderBuilder::stop_loss_market(13, Side::Sell, 110).build(),
        OrderBuilder::stop_loss_limit(14, Side::Buy, 115, 116).build(),
        OrderBuilder::stop_loss_limit(15, Side::Buy, 100, 101).build(),
        OrderBuilder::market(17, Side::Buy, 100).build(),
        OrderBuilder::market(16, Side::Sell, 100).build(),
    ];
    for order in orders {
        h.cache.submit(order).unwrap();
    }

    let report = h.simulator.simulate(&candle(100, 120, 80, 100)).unwrap();
    assert_eq!(report.filled, 8);
    assert_eq!(report.passes, 1);

    let sequence: Vec<String> = h
        .recorder
        .order_updates()
        .into_iter()
        .map(|update| update.client_order_id)
        .collect();
    assert_eq!(
        sequence,
        vec![
            "order-16", "order-17", "order-13", "order-12", "order-14", "order-15", "order-10",
            "order-11",
        ]
    );
}

#[test]
fn limit_on_wrong_side_of_close_stays_open() {
    let h = default_harness();
    h.cache.open_trade(trade(1, "BTC", "USDT")).unwrap();
    h.cache
        .submit(OrderBuilder::limit(1, Side::Sell, 100).build())
        .unwrap();

    // the high trades through the limit but the close stays below it
    let report = h.simulator.simulate(&candle(95, 130, 90, 99)).unwrap();
    assert_eq!(report.transitions(), 0);
    assert!(h.recorder.is_empty());
    assert_eq!(h.cache.order(OrderId(1)).unwrap().state, OrderState::Opened);
}

#[test]
fn stops_trigger_on_candle_range() {
    let h = harness(without_reactions(), SimulatorConfig::default());
    h.cache.open_trade(trade(1, "BTC", "USDT")).unwrap();
    h.cache
        .submit(OrderBuilder::stop_loss_market(1, Side::Sell, 95).build())
        .unwrap();
    h.cache
        .submit(
            OrderBuilder::stop_loss_limit(2, Side::Buy, 105, 106)
                .quantity(3)
                .build(),
        )
        .unwrap();
    h.cache
        .submit(OrderBuilder::stop_loss_market(3, Side::Sell, 80).build())
        .unwrap();

    let report = h.simulator.simulate(&candle(100, 105, 95, 100)).unwrap();
    assert_eq!(report.filled, 2);

    // sell stop 95 settles at its price, buy stop-limit at 106
    assert_eq!(h.portfolio.free(btc()), Decimal::from(-1 + 3));
    assert_eq!(h.portfolio.free(usdt()), Decimal::from(95 - 3 * 106));
    assert_eq!(h.cache.live_order_ids(), vec![OrderId(3)]);
}

#[test]
fn entry_fill_spawns_exits_which_settle_within_the_candle() {
    let h = default_harness();
    h.portfolio.set_free(usdt(), Decimal::from(1_000));
    h.cache.open_trade(trade(1, "BTC", "USDT")).unwrap();
    h.cache
        .submit(
            OrderBuilder::market(1, Side::Buy, 100)
                .state(OrderState::OpenPendingExt)
                .take_profit(110)
                .stop_loss(90)
                .build(),
        )
        .unwrap();

    let first = h
        .simulator
        .simulate(&candle_at(1, 100, 105, 95, 102))
        .unwrap();
    assert_eq!(first.passes, 3);
    assert_eq!(first.confirmed, 3);
    assert_eq!(first.filled, 1);
    assert_eq!(h.portfolio.free(btc()), Decimal::ONE);
    assert_eq!(h.portfolio.free(usdt()), Decimal::from(900));

    let fill = h
        .recorder
        .order_updates()
        .into_iter()
        .find(|update| update.is_fill())
        .unwrap();
    // market fills carry the opening timestamp stamped by the cache
    assert_eq!(fill.timestamp, base_time());

    let take_profit = h.cache.order(OrderId(2)).unwrap();
    let stop_loss = h.cache.order(OrderId(3)).unwrap();
    assert_eq!(take_profit.state, OrderState::Opened);
    assert_eq!(stop_loss.state, OrderState::Opened);
    assert!(h.cache.live_orders().iter().all(|o| !o.awaits_resolution()));

    h.recorder.clear();
    let second = h
        .simulator
        .simulate(&candle_at(2, 102, 112, 101, 111))
        .unwrap();
    assert_eq!(second.passes, 2);
    assert_eq!(second.filled, 1);
    assert_eq!(second.canceled, 1);
    assert_eq!(h.portfolio.free(btc()), Decimal::ZERO);
    assert_eq!(h.portfolio.free(usdt()), Decimal::from(1_010));

    assert!(h.cache.is_empty());
    assert!(h.cache.trade(TradeId(1)).is_none());
    let history: Vec<(OrderId, OrderState)> = h
        .cache
        .order_history()
        .into_iter()
        .map(|order| (order.id, order.state))
        .collect();
    assert_eq!(
        history,
        vec![
            (OrderId(1), OrderState::Filled),
            (OrderId(2), OrderState::Filled),
            (OrderId(3), OrderState::Canceled),
        ]
    );
}

/// Forwards to the cache, then drops `victim` from it on the first update.
struct VanishingListener {
    cache: Arc<LiveOrderCache>,
    victim: Mutex<Option<OrderId>>,
}

impl ExchangeListener for VanishingListener {
    fn on_order_update(&self, update: &OrderUpdate) {
        self.cache.on_order_update(update);
        if let Some(victim) = self.victim.lock().take() {
            self.cache.remove(victim);
        }
    }

    fn on_position_update(&self, _position: &Position) {}
}

fn vanishing_scenario(policy: MissingOrderPolicy) -> (Arc<LiveOrderCache>, SimulationReport) {
    init_test_tracing();
    let cache = Arc::new(LiveOrderCache::new(without_reactions()));
    for id in 1..=3 {
        cache.open_trade(trade(id, "BTC", "USDT")).unwrap();
    }
    cache
        .submit(OrderBuilder::market(1, Side::Buy, 100).build())
        .unwrap();
    cache
        .submit(OrderBuilder::limit(2, Side::Buy, 100).trade(2).build())
        .unwrap();
    cache
        .submit(OrderBuilder::limit(3, Side::Buy, 101).trade(3).build())
        .unwrap();

    let listener = VanishingListener {
        cache: cache.clone(),
        victim: Mutex::new(Some(OrderId(2))),
    };
    let simulator = ExchangeEventSimulator::with_config(
        cache.clone(),
        Arc::new(Portfolio::default()),
        listener,
        SimulatorConfig {
            missing_order_policy: policy,
            max_passes: None,
        },
    );
    let report = simulator.simulate(&candle(100, 100, 98, 99)).unwrap();
    (cache, report)
}

#[test]
fn vanished_order_abandons_the_rest_of_the_pass_by_default() {
    let (cache, report) = vanishing_scenario(MissingOrderPolicy::default());
    assert_eq!(report.abandoned_passes, 1);
    assert_eq!(report.filled, 1);
    assert_eq!(report.passes, 1);
    // order 3 was fillable but never reached
    assert_eq!(cache.order(OrderId(3)).unwrap().state, OrderState::Opened);
}

#[test]
fn skip_policy_keeps_evaluating_after_a_vanished_order() {
    let (cache, report) = vanishing_scenario(MissingOrderPolicy::SkipOrder);
    assert_eq!(report.skipped_orders, 1);
    assert_eq!(report.abandoned_passes, 0);
    assert_eq!(report.filled, 2);
    assert!(cache.order(OrderId(3)).is_none());
}

/// Store that never applies updates.
#[derive(Default)]
struct StaticStore {
    orders: HashMap<OrderId, Order>,
    trades: HashMap<TradeId, Trade>,
}

impl StaticStore {
    fn with(orders: Vec<Order>, trades: Vec<Trade>) -> Self {
        Self {
            orders: orders.into_iter().map(|order| (order.id, order)).collect(),
            trades: trades.into_iter().map(|trade| (trade.id, trade)).collect(),
        }
    }
}

impl OrderStore for StaticStore {
    fn live_order_ids(&self) -> Vec<OrderId> {
        self.orders.keys().copied().collect()
    }

    fn order(&self, id: OrderId) -> Option<Order> {
        self.orders.get(&id).cloned()
    }

    fn trade(&self, id: TradeId) -> Option<Trade> {
        self.trades.get(&id).cloned()
    }
}

#[test]
fn missing_trade_aborts_the_call() {
    init_test_tracing();
    let store = StaticStore::with(
        vec![OrderBuilder::limit(1, Side::Buy, 100).trade(99).build()],
        vec![],
    );
    let recorder = Arc::new(RecordingListener::new());
    let simulator =
        ExchangeEventSimulator::new(store, Arc::new(Portfolio::default()), recorder.clone());

    let err = simulator.simulate(&candle(100, 100, 90, 95)).unwrap_err();
    assert_eq!(
        err,
        SimulatorError::TradeNotFound {
            order_id: OrderId(1),
            trade_id: TradeId(99),
        }
    );
    assert!(recorder.is_empty());
}

#[test]
fn terminal_orders_are_never_revisited() {
    init_test_tracing();
    let store = StaticStore::with(
        vec![
            OrderBuilder::market(1, Side::Buy, 100)
                .state(OrderState::Filled)
                .build(),
            OrderBuilder::limit(2, Side::Buy, 100)
                .state(OrderState::Canceled)
                .build(),
        ],
        vec![trade(1, "BTC", "USDT")],
    );
    let recorder = Arc::new(RecordingListener::new());
    let simulator =
        ExchangeEventSimulator::new(store, Arc::new(Portfolio::default()), recorder.clone());

    let report = simulator.simulate(&candle(100, 200, 1, 50)).unwrap();
    assert_eq!(report.passes, 1);
    assert_eq!(report.transitions(), 0);
    assert!(recorder.is_empty());
}

#[test]
fn pass_limit_stops_a_store_that_never_settles() {
    init_test_tracing();
    let store = StaticStore::with(
        vec![OrderBuilder::limit(1, Side::Buy, 100)
            .state(OrderState::OpenPendingExt)
            .build()],
        vec![trade(1, "BTC", "USDT")],
    );
    let recorder = Arc::new(RecordingListener::new());
    let simulator = ExchangeEventSimulator::with_config(
        store,
        Arc::new(Portfolio::default()),
        recorder.clone(),
        SimulatorConfig {
            max_passes: Some(3),
            ..SimulatorConfig::default()
        },
    );

    let err = simulator.simulate(&candle(100, 100, 100, 100)).unwrap_err();
    assert_eq!(err, SimulatorError::PassLimitExceeded { passes: 3 });
    assert_eq!(recorder.order_updates().len(), 3);
}

#[test]
fn fills_mutate_the_shared_position_in_place() {
    let h = default_harness();
    let base = h.portfolio.position(btc());
    base.lock().free = Decimal::from(5);
    base.lock().locked = Decimal::from(7);
    h.cache.open_trade(trade(1, "BTC", "USDT")).unwrap();
    h.cache
        .submit(
            OrderBuilder::limit(1, Side::Sell, Decimal::new(2505, 1))
                .quantity(2)
                .build(),
        )
        .unwrap();

    h.simulator.simulate(&candle(240, 260, 239, 251)).unwrap();

    let base = base.lock().clone();
    assert_eq!(base.free, Decimal::from(3));
    assert_eq!(base.locked, Decimal::from(7));
    assert_eq!(h.portfolio.free(usdt()), Decimal::from(501));
    assert_eq!(h.portfolio.position(usdt()).lock().locked, Decimal::ZERO);
}

#[test]
fn market_fill_without_open_time_uses_candle_close() {
    let h = default_harness();
    h.cache.open_trade(trade(1, "BTC", "USDT")).unwrap();
    h.cache
        .submit(
            OrderBuilder::market(1, Side::Buy, 100)
                .opened_at(None)
                .build(),
        )
        .unwrap();

    let bar = candle(100, 100, 100, 100);
    h.simulator.simulate(&bar).unwrap();
    let updates = h.recorder.order_updates();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].timestamp, bar.close_time);
}

#[test]
fn fixed_point_leaves_nothing_awaiting_resolution() {
    let h = default_harness();
    h.cache.open_trade(trade(1, "BTC", "USDT")).unwrap();
    h.cache.open_trade(trade(2, "ETH", "USDT")).unwrap();
    h.cache
        .submit(
            OrderBuilder::market(1, Side::Buy, 100)
                .state(OrderState::OpenPendingExt)
                .stop_loss(80)
                .build(),
        )
        .unwrap();
    h.cache
        .submit(OrderBuilder::limit(2, Side::Sell, 130).trade(2).build())
        .unwrap();
    h.cache
        .submit(
            OrderBuilder::limit(3, Side::Sell, 140)
                .trade(2)
                .state(OrderState::CancelPendingExt)
                .build(),
        )
        .unwrap();

    let report = h.simulator.simulate(&candle(100, 101, 99, 100)).unwrap();
    assert!(report.passes >= 2);
    assert!(h
        .cache
        .live_orders()
        .iter()
        .all(|order| !order.awaits_resolution()));
}

#[test]
fn exit_orders_do_not_hijack_a_lookalike_reference() {
    let h = harness(
        OrderCacheConfig::default(),
        SimulatorConfig {
            max_passes: Some(50),
            ..SimulatorConfig::default()
        },
    );
    h.cache.open_trade(trade(1, "BTC", "USDT")).unwrap();
    h.cache.open_trade(trade(2, "ETH", "USDT")).unwrap();
    h.cache
        .submit(
            OrderBuilder::market(1, Side::Buy, 100)
                .client_order_id("a")
                .take_profit(110)
                .build(),
        )
        .unwrap();
    h.cache
        .submit(
            OrderBuilder::limit(5, Side::Buy, 90)
                .trade(2)
                .client_order_id("a-tp")
                .state(OrderState::OpenPendingExt)
                .build(),
        )
        .unwrap();

    let report = h.simulator.simulate(&candle(100, 105, 95, 100)).unwrap();
    assert_eq!(report.passes, 2);
    assert_eq!(report.confirmed, 2);
    assert_eq!(h.cache.order(OrderId(5)).unwrap().state, OrderState::Opened);
    let take_profit = h.cache.order(OrderId(6)).unwrap();
    assert_eq!(take_profit.client_order_id, "a-tp-6");
    assert_eq!(take_profit.state, OrderState::Opened);
}

#[test]
fn overflowing_fill_fails_without_touching_balances() {
    let h = default_harness();
    h.cache.open_trade(trade(1, "BTC", "USDT")).unwrap();
    h.cache
        .submit(
            OrderBuilder::limit(1, Side::Buy, Decimal::MAX)
                .quantity(2)
                .build(),
        )
        .unwrap();

    let err = h.simulator.simulate(&candle(1, 1, 1, 1)).unwrap_err();
    assert_eq!(
        err,
        SimulatorError::BalanceOverflow {
            client_order_id: "order-1".into(),
        }
    );
    assert!(h.recorder.position_updates().is_empty());
    assert_eq!(h.portfolio.free(btc()), Decimal::ZERO);
    assert_eq!(h.portfolio.free(usdt()), Decimal::ZERO);
}

#[test]
fn quote_balance_overflow_leaves_base_unchanged() {
    let h = default_harness();
    h.portfolio.set_free(usdt(), Decimal::MAX);
    h.cache.open_trade(trade(1, "BTC", "USDT")).unwrap();
    h.cache
        .submit(OrderBuilder::limit(1, Side::Sell, 100).build())
        .unwrap();

    let err = h.simulator.simulate(&candle(100, 100, 100, 100)).unwrap_err();
    assert!(matches!(err, SimulatorError::BalanceOverflow { .. }));
    assert_eq!(h.portfolio.free(btc()), Decimal::ZERO);
    assert_eq!(h.portfolio.free(usdt()), Decimal::MAX);
}
