//! Condition evaluator.
//!
//! Pure decision logic: given a normalized order and the current price,
//! decide whether to do nothing, arm the stop, fill, or arm and then fill.
//! Both sides of every comparison are rounded to the configured number of
//! decimals first, so float noise such as `99.99999999` never crosses a
//! `100.00` threshold.
//!
//! | Condition | BUY               | SELL              |
//! |-----------|-------------------|-------------------|
//! | arm stop  | `price >= trigger`| `price <= trigger`|
//! | fill      | `price <= limit`  | `price >= limit`  |

use lw_core::types::{Order, OrderKind, Side};

/// Outcome of evaluating one order against one price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Nothing to do at this price.
    Hold,
    /// Stop crossed; persist `triggered` and wait for a later tick to fill.
    Arm,
    /// Order is eligible and its fill condition holds.
    Fill,
    /// Stop crossed and the fill condition already holds on the same tick.
    /// The arm write must commit before the fill transaction runs.
    ArmAndFill,
}

#[derive(Debug, Clone, Copy)]
pub struct Evaluator {
    scale: f64,
    same_tick_fill: bool,
}

impl Evaluator {
    pub fn new(price_decimals: u32, same_tick_fill: bool) -> Self {
        Self { scale: 10f64.powi(price_decimals as i32), same_tick_fill }
    }

    #[inline]
    pub fn round(&self, v: f64) -> f64 {
        (v * self.scale).round() / self.scale
    }

    /// Whether `price` crosses the stop `trigger` for `side`.
    pub fn stop_crossed(&self, side: Side, trigger: f64, price: f64) -> bool {
        let (t, p) = (self.round(trigger), self.round(price));
        match side {
            Side::Buy => p >= t,
            Side::Sell => p <= t,
        }
    }

    /// Whether `price` satisfies the fill condition. No limit means a market
    /// fill, which any price satisfies.
    pub fn fill_crossed(&self, side: Side, limit: Option<f64>, price: f64) -> bool {
        let Some(limit) = limit else {
            return true;
        };
        let (l, p) = (self.round(limit), self.round(price));
        match side {
            Side::Buy => p <= l,
            Side::Sell => p >= l,
        }
    }

    pub fn evaluate(&self, order: &Order, price: f64) -> Decision {
        if !order.is_live() || !price.is_finite() || price <= 0.0 {
            return Decision::Hold;
        }

        let fills = self.fill_crossed(order.side, order.kind.limit(), price);
        match order.kind {
            OrderKind::Limit { .. } => {
                if fills {
                    Decision::Fill
                } else {
                    Decision::Hold
                }
            }
            OrderKind::StopLimit { trigger, .. } | OrderKind::StopMarket { trigger, .. } => {
                if order.triggered {
                    return if fills { Decision::Fill } else { Decision::Hold };
                }
                if !self.stop_crossed(order.side, trigger, price) {
                    Decision::Hold
                } else if fills && self.same_tick_fill {
                    Decision::ArmAndFill
                } else {
                    Decision::Arm
                }
            }
        }
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new(2, true)
    }
}
