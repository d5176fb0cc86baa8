//! Free-balance bookkeeping for fills.

use bourse_broker::{ExchangeListener, PortfolioStore};
use bourse_core::{OrderUpdate, Price, Quantity, Side};
use tracing::debug;

use crate::{SimulatorError, SimulatorResult};

/// Signed `(base, quote)` free-balance changes caused by a fill.
///
/// Returns `None` when the notional does not fit in a `Decimal`.
#[must_use]
pub fn balance_deltas(
    side: Side,
    quantity: Quantity,
    price: Price,
) -> Option<(Quantity, Quantity)> {
    let notional = quantity.checked_mul(price)?;
    Some(match side {
        Side::Buy => (quantity, -notional),
        Side::Sell => (-quantity, notional),
    })
}

/// Move free balances for a fill and report both positions, base first.
///
/// Both new balances are computed before either position changes, so an
/// overflow leaves the portfolio untouched. Each position lock is released
/// before the listener runs.
pub(crate) fn apply_fill<P, L>(
    portfolio: &P,
    listener: &L,
    fill: &OrderUpdate,
) -> SimulatorResult<()>
where
    P: PortfolioStore + ?Sized,
    L: ExchangeListener + ?Sized,
{
    let overflow = || SimulatorError::BalanceOverflow {
        client_order_id: fill.client_order_id.clone(),
    };
    let (base_delta, quote_delta) =
        balance_deltas(fill.side, fill.orig_qty, fill.price).ok_or_else(overflow)?;

    let base = portfolio.position(fill.base_asset);
    let quote = portfolio.position(fill.quote_asset);
    let base_free = base
        .lock()
        .free
        .checked_add(base_delta)
        .ok_or_else(overflow)?;
    let quote_free = quote
        .lock()
        .free
        .checked_add(quote_delta)
        .ok_or_else(overflow)?;

    let base_snapshot = {
        let mut position = base.lock();
        position.free = base_free;
        position.clone()
    };
    let quote_snapshot = {
        let mut position = quote.lock();
        position.free = quote_free;
        position.clone()
    };
    debug!(
        base = %fill.base_asset,
        base_free = %base_snapshot.free,
        quote = %fill.quote_asset,
        quote_free = %quote_snapshot.free,
        "balances updated"
    );

    listener.on_position_update(&base_snapshot);
    listener.on_position_update(&quote_snapshot);
    Ok(())
}
