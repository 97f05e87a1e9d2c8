use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use super::ledger::LotLedger;
use super::sizing::{sizer_from_mode, OrderSizer};
use crate::common::errors::{Result, TradeError};
use crate::common::precision::Precision;
use crate::common::traits::{BarHandler, Market, UpdateHandler};
use crate::common::types::{Action, Balance, Bar, Update};
use crate::config::types::TraderConfig;
use crate::strategy::BoxedStrategy;

/// Trader lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// No balance seen yet, ledgers empty
    Cold,
    /// Ledgers seeded, decisions are acted on
    Ready,
}

/// Counters and balances reported at the end of a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraderSummary {
    pub phase: Phase,
    pub orders_submitted: u64,
    pub updates_handled: u64,
    pub first_total: Option<Decimal>,
    pub last_total: Option<Decimal>,
}

impl TraderSummary {
    /// Change of the total balance since the first bar, in percent
    pub fn change_percent(&self) -> Option<Decimal> {
        percent_change(self.first_total?, self.last_total?)
    }
}

struct TraderState {
    strategy: BoxedStrategy,
    sizer: OrderSizer,
    phase: Phase,
    recent_buys: LotLedger,
    recent_sells: LotLedger,
    first_total: Option<Decimal>,
    last_total: Option<Decimal>,
    orders_submitted: u64,
    updates_handled: u64,
    history: VecDeque<Bar>,
}

/// Turns strategy signals into bounded orders and keeps lot ledgers of
/// recent fills so that it does not buy back above a recent sale or sell
/// below a recent buy.
///
/// Bars and updates are processed one at a time: the state lock is held for
/// a whole decision, market calls included.
pub struct Trader {
    market: Arc<dyn Market>,
    precision: Precision,
    buy_margin: Decimal,
    sell_margin: Decimal,
    history_limit: usize,
    state: Mutex<TraderState>,
}

impl Trader {
    pub fn new(market: Arc<dyn Market>, strategy: BoxedStrategy, config: &TraderConfig) -> Self {
        let sizer = OrderSizer::new(
            config.min_order_size,
            config.precision(),
            sizer_from_mode(config.sizing),
        );
        Self::with_sizer(market, strategy, sizer, config)
    }

    pub fn with_sizer(
        market: Arc<dyn Market>,
        strategy: BoxedStrategy,
        sizer: OrderSizer,
        config: &TraderConfig,
    ) -> Self {
        Self {
            market,
            precision: config.precision(),
            buy_margin: config.buy_margin,
            sell_margin: config.sell_margin,
            history_limit: config.history_limit,
            state: Mutex::new(TraderState {
                strategy,
                sizer,
                phase: Phase::Cold,
                recent_buys: LotLedger::new(),
                recent_sells: LotLedger::new(),
                first_total: None,
                last_total: None,
                orders_submitted: 0,
                updates_handled: 0,
                history: VecDeque::new(),
            }),
        }
    }

    pub async fn phase(&self) -> Phase {
        self.state.lock().await.phase
    }

    pub async fn summary(&self) -> TraderSummary {
        let state = self.state.lock().await;
        TraderSummary {
            phase: state.phase,
            orders_submitted: state.orders_submitted,
            updates_handled: state.updates_handled,
            first_total: state.first_total,
            last_total: state.last_total,
        }
    }

    /// Annotated bars seen so far, oldest first
    pub async fn history(&self) -> Vec<Bar> {
        self.state.lock().await.history.iter().cloned().collect()
    }

    /// Size held at `price` in the buy ledger
    pub async fn recent_buy(&self, price: Decimal) -> Option<Decimal> {
        self.state.lock().await.recent_buys.get(price)
    }

    /// Size held at `price` in the sell ledger
    pub async fn recent_sell(&self, price: Decimal) -> Option<Decimal> {
        self.state.lock().await.recent_sells.get(price)
    }

    /// Seed both ledgers from the current balance on the first bar
    async fn bootstrap(&self, state: &mut TraderState, bar: &Bar) -> Result<bool> {
        if bar.high <= Decimal::ZERO {
            warn!(high = %bar.high, "Cannot bootstrap on a bar without a positive high");
            return Ok(false);
        }

        let balance = self.market.balance().await?;
        let reference = balance.currency / bar.high;

        state
            .recent_buys
            .set(self.precision.price(bar.high), balance.asset);
        state
            .recent_sells
            .set(self.precision.price(bar.low), reference);
        state.first_total = Some(self.precision.asset(balance.asset + reference));
        state.phase = Phase::Ready;

        info!(
            asset = %balance.asset,
            currency = %balance.currency,
            high = %bar.high,
            low = %bar.low,
            first_total = ?state.first_total,
            "Trader ready"
        );
        Ok(true)
    }

    async fn buy(&self, state: &mut TraderState, bar: &Bar) -> Result<()> {
        let price = self.precision.price(bar.close);
        if price <= Decimal::ZERO {
            return Ok(());
        }

        let balance = self.market.balance().await?;
        let max_buyable = self.precision.asset(balance.currency / price);

        let buy_margin = self.buy_margin;
        let margin = self
            .precision
            .asset(state.recent_sells.eligible_size(|level| price <= level * buy_margin));
        debug!(
            action = %Action::Buy,
            total = %state.recent_sells.total(),
            size = %margin,
            price = %price,
            "Margin result"
        );

        let size = state.sizer.quantity(margin.min(max_buyable));
        if size < state.sizer.min_order_size() {
            debug!(size = %size, max_buyable = %max_buyable, "Size below minimum");
            return Ok(());
        }

        self.market.buy(size, price).await?;

        state.orders_submitted += 1;
        state.recent_buys.add(price, size);
        info!(action = %Action::Buy, price = %price, size = %size, "Submitted order");
        Ok(())
    }

    async fn sell(&self, state: &mut TraderState, bar: &Bar) -> Result<()> {
        let price = self.precision.price(bar.close);
        if price <= Decimal::ZERO {
            return Ok(());
        }

        let balance = self.market.balance().await?;
        let available = self.precision.asset(balance.asset);

        let sell_margin = self.sell_margin;
        let margin = self
            .precision
            .asset(state.recent_buys.eligible_size(|level| price >= level * sell_margin));
        debug!(
            action = %Action::Sell,
            total = %state.recent_buys.total(),
            size = %margin,
            price = %price,
            "Margin result"
        );

        let size = state.sizer.quantity(margin.min(available));
        if size < state.sizer.min_order_size() {
            debug!(size = %size, asset_balance = %available, "Size below minimum");
            return Ok(());
        }

        self.market.sell(size, price).await?;

        state.orders_submitted += 1;
        state.recent_sells.add(price, size);
        info!(action = %Action::Sell, price = %price, size = %size, "Submitted order");
        Ok(())
    }

    fn record(&self, state: &mut TraderState, bar: Bar) {
        if self.history_limit == 0 {
            return;
        }
        if state.history.len() >= self.history_limit {
            state.history.pop_front();
        }
        state.history.push_back(bar);
    }

    fn report_balance(&self, state: &mut TraderState, balance: &Balance, update: &Update) {
        let total = self.precision.asset(balance.total_in_asset(update.price));
        state.last_total = Some(total);
        let change = state
            .first_total
            .and_then(|first| percent_change(first, total))
            .map(|pct| pct.round_dp(2));

        info!(
            asset_balance = %balance.asset,
            currency_balance = %self.precision.price(balance.currency),
            converted_asset_balance = %total,
            size = %update.size,
            price = %update.price,
            action = %update.action,
            inc = ?change,
            "Received update"
        );
    }
}

fn percent_change(first: Decimal, last: Decimal) -> Option<Decimal> {
    if first.is_zero() {
        return None;
    }
    Some((last - first) / first * Decimal::ONE_HUNDRED)
}

#[async_trait]
impl BarHandler for Trader {
    #[instrument(skip(self, bar), fields(window_start = %bar.window_start, close = %bar.close))]
    async fn handle_bar(&self, bar: &Bar) -> Result<()> {
        let mut state = self.state.lock().await;

        if state.phase == Phase::Cold {
            match self.bootstrap(&mut state, bar).await {
                Ok(true) => {}
                Ok(false) => return Ok(()),
                Err(e) => {
                    warn!(error = %e, "Could not get balance for ready");
                    return Ok(());
                }
            }
        }

        let signal = state.strategy.decide(bar);
        self.record(&mut state, bar.annotated(signal.annotations));

        let result = match signal.action {
            Action::Hold => {
                debug!(action = %signal.action, "Strategy says hold");
                Ok(())
            }
            Action::Cancel => Err(TradeError::Internal(format!(
                "strategy returned {} which is not a decision",
                signal.action
            ))),
            Action::Buy => self.buy(&mut state, bar).await,
            Action::Sell => self.sell(&mut state, bar).await,
        };

        if let Err(e) = result {
            if !e.is_recoverable() {
                return Err(e);
            }
            warn!(action = %signal.action, error = %e, "Decision abandoned");
        }
        Ok(())
    }
}

#[async_trait]
impl UpdateHandler for Trader {
    #[instrument(skip(self, update), fields(action = %update.action))]
    async fn handle_update(&self, update: &Update) -> Result<()> {
        let mut state = self.state.lock().await;

        match self.market.balance().await {
            Ok(balance) => self.report_balance(&mut state, &balance, update),
            Err(e) => warn!(error = %e, "Could not get balance"),
        }

        let level = self.precision.price(update.price);
        match update.action {
            Action::Buy => {
                state.recent_buys.add(level, update.size);
                let buy_margin = self.buy_margin;
                let price = update.price;
                let left = state
                    .recent_sells
                    .reduce(update.size, |p| price <= p * buy_margin);
                debug!(
                    total_size = %state.recent_sells.total(),
                    left_size = %left,
                    size = %update.size,
                    "Cleaned up sells"
                );
            }
            Action::Sell => {
                state.recent_sells.add(level, update.size);
                let sell_margin = self.sell_margin;
                let price = update.price;
                let left = state
                    .recent_buys
                    .reduce(update.size, |p| price >= p * sell_margin);
                debug!(
                    total_size = %state.recent_buys.total(),
                    left_size = %left,
                    size = %update.size,
                    "Cleaned up buys"
                );
            }
            Action::Cancel | Action::Hold => {
                warn!(action = %update.action, "Update carries no fill");
            }
        }

        state.updates_handled += 1;
        Ok(())
    }
}
