//! Bar-by-bar portfolio simulation.
//!
//! Per bar:
//! 1. Deliver signals emitted up to this bar's timestamp; refresh the regime tag
//! 2. Open position: raise the peak from the bar high, consult the exit policy
//! 3. Apply delivered signals in order (entries, scale-ins, signal exits)
//! 4. Mark to market at the close and sample equity
//!
//! A position still open after the last bar is closed at the last close.

use std::borrow::Cow;

use tracing::{debug, warn};

use crate::domain::{Bar, ExitReason, PriceSeries, Signal, SignalAction};
use crate::exit::{ExitDecision, ExitPolicy, MarketContext};
use crate::fees::FeeModel;
use crate::sizing::{PositionSizer, SizingContext};

use super::accounting::{add_tranche, close_fraction, open_position};
use super::error::{MissedEntry, SimError};
use super::state::{GapPolicy, Phase, SimConfig, SimState, SimulationOutput, SizingBasis};

/// Run one deterministic simulation.
///
/// `signals` must be strictly time-ordered (as produced by the signal store).
pub fn simulate(
    signals: &[Signal],
    prices: &PriceSeries,
    fees: &FeeModel,
    exit_policy: &dyn ExitPolicy,
    sizer: &dyn PositionSizer,
    config: &SimConfig,
) -> Result<SimulationOutput, SimError> {
    validate_config(fees, config)?;
    let (series, synthesized) = prepare_series(prices, config.gap_policy)?;
    let bars = series.bars();

    let mut state = SimState::new(config.initial_capital);
    state.report.synthesized_bars = synthesized;
    let mut cursor = 0;

    for bar in bars {
        let start = cursor;
        while cursor < signals.len() && signals[cursor].timestamp <= bar.timestamp {
            cursor += 1;
        }
        let delivered = &signals[start..cursor];
        state.report.signals_delivered += delivered.len();
        if let Some(tag) = delivered.iter().rev().find_map(|s| s.market_state.as_ref()) {
            state.market_state = Some(tag.clone());
        }

        if state.is_open() {
            check_exit_policy(&mut state, fees, exit_policy, bar);
        }

        for signal in delivered {
            apply_signal(&mut state, fees, sizer, config, signal, bar);
        }

        state.portfolio.record_equity(bar.timestamp, bar.close);
        state.report.bars_processed += 1;
    }

    if let Some(last) = bars.last() {
        if state.is_open() {
            // Replace the final mark-to-market sample with the realized value.
            state.portfolio.equity_curve.pop();
            exit(&mut state, fees, 1.0, last.timestamp, last.close, ExitReason::EndOfData);
            state.portfolio.record_equity(last.timestamp, last.close);
        }
        state.report.final_equity = state.portfolio.equity(last.close);
    }
    state.report.total_fees = state.portfolio.total_fees;

    debug!(
        trades = state.trades.len(),
        final_equity = state.report.final_equity,
        missed = state.report.missed_entry_count(),
        ignored = state.report.ignored_signals,
        "simulation finished"
    );
    Ok(state.into_output())
}

fn validate_config(fees: &FeeModel, config: &SimConfig) -> Result<(), SimError> {
    if !config.initial_capital.is_finite() || config.initial_capital <= 0.0 {
        return Err(SimError::InvalidConfig(format!(
            "initial_capital must be positive, got {}",
            config.initial_capital
        )));
    }
    if !fees.is_valid() {
        return Err(SimError::InvalidConfig(format!(
            "fee rates out of range: fee_rate={}, slippage_rate={}",
            fees.fee_rate, fees.slippage_rate
        )));
    }
    if !(config.scale_out_fraction > 0.0 && config.scale_out_fraction <= 1.0) {
        return Err(SimError::InvalidConfig(format!(
            "scale_out_fraction must be in (0, 1], got {}",
            config.scale_out_fraction
        )));
    }
    if !config.min_order_notional.is_finite() || config.min_order_notional < 0.0 {
        return Err(SimError::InvalidConfig(format!(
            "min_order_notional must be >= 0, got {}",
            config.min_order_notional
        )));
    }
    Ok(())
}

/// Check bars and apply the gap policy. Borrows the input unless gaps are filled.
fn prepare_series(
    prices: &PriceSeries,
    gap_policy: GapPolicy,
) -> Result<(Cow<'_, PriceSeries>, usize), SimError> {
    if prices.is_empty() {
        return Err(SimError::EmptySeries);
    }
    if let Some(bad) = prices.bars().iter().find(|b| !b.is_sane()) {
        return Err(SimError::InvalidBar {
            timestamp: bad.timestamp,
        });
    }
    if let Some(pair) = prices
        .bars()
        .windows(2)
        .find(|w| w[1].timestamp <= w[0].timestamp)
    {
        return Err(SimError::InvalidBar {
            timestamp: pair[1].timestamp,
        });
    }

    let gaps = prices.gaps();
    let Some(first) = gaps.first() else {
        return Ok((Cow::Borrowed(prices), 0));
    };
    match gap_policy {
        GapPolicy::Abort => Err(SimError::DataGap {
            at: first.after,
            expected: first.expected,
            found: first.found,
        }),
        GapPolicy::CarryForward => {
            let (filled, synthesized) = prices.carry_forward();
            warn!(
                gaps = gaps.len(),
                synthesized,
                first_gap = %first.after,
                "carried forward prices across gaps"
            );
            Ok((Cow::Owned(filled), synthesized))
        }
    }
}

fn check_exit_policy(state: &mut SimState, fees: &FeeModel, policy: &dyn ExitPolicy, bar: &Bar) {
    let decision = {
        let Some(position) = state.portfolio.open_position.as_mut() else {
            return;
        };
        position.update_peak(bar.high);
        let ctx = MarketContext::new(bar).with_market_state(state.market_state.as_deref());
        policy.check(position, &ctx)
    };

    if let ExitDecision::Exit {
        fraction,
        price,
        reason,
    } = decision
    {
        exit(state, fees, fraction, bar.timestamp, price, reason);
    }
}

fn apply_signal(
    state: &mut SimState,
    fees: &FeeModel,
    sizer: &dyn PositionSizer,
    config: &SimConfig,
    signal: &Signal,
    bar: &Bar,
) {
    if let Some(lag) = config.max_signal_lag {
        let delay = bar.timestamp - signal.timestamp;
        if delay > lag {
            if signal.action.is_entry() {
                miss(
                    state,
                    MissedEntry::Stale {
                        at: signal.timestamp,
                        lag_secs: delay.num_seconds(),
                    },
                );
            } else {
                state.report.ignored_signals += 1;
            }
            return;
        }
    }

    match (signal.action, state.phase()) {
        (SignalAction::Buy, Phase::Flat) => enter(state, fees, sizer, config, signal, bar),
        (SignalAction::ScaleIn, Phase::Open) => scale_in(state, fees, sizer, config, signal),
        (SignalAction::Sell | SignalAction::CloseLong, Phase::Open) => {
            exit(state, fees, 1.0, bar.timestamp, signal.price, ExitReason::Signal);
        }
        (SignalAction::ScaleOut, Phase::Open) => {
            let fraction = signal
                .metadata_f64("fraction")
                .filter(|f| *f > 0.0 && *f <= 1.0)
                .unwrap_or(config.scale_out_fraction);
            exit(state, fees, fraction, bar.timestamp, signal.price, ExitReason::ScaleOut);
        }
        (action, phase) => {
            debug!(?action, ?phase, at = %signal.timestamp, "signal ignored");
            state.report.ignored_signals += 1;
        }
    }
}

/// Committed cash for a new tranche, or the reason none is committed.
fn size_order(
    state: &SimState,
    sizer: &dyn PositionSizer,
    config: &SimConfig,
    signal: &Signal,
) -> Result<f64, MissedEntry> {
    let cash = state.portfolio.cash;
    let ctx = SizingContext {
        available_capital: cash,
        recent_trades: &state.trades,
    };
    let fraction = sizer.fraction(signal, &ctx);
    let basis = match config.sizing_basis {
        SizingBasis::Cash => cash,
        SizingBasis::InitialCapital => config.initial_capital,
    };
    let committed = fraction * basis;

    if committed <= 0.0 {
        return Err(MissedEntry::ZeroSize {
            at: signal.timestamp,
        });
    }
    if committed > cash {
        return Err(MissedEntry::InsufficientCapital {
            at: signal.timestamp,
            required: committed,
            available: cash,
        });
    }
    if committed < config.min_order_notional {
        return Err(MissedEntry::BelowMinimum {
            at: signal.timestamp,
            notional: committed,
            minimum: config.min_order_notional,
        });
    }
    Ok(committed)
}

fn enter(
    state: &mut SimState,
    fees: &FeeModel,
    sizer: &dyn PositionSizer,
    config: &SimConfig,
    signal: &Signal,
    bar: &Bar,
) {
    state.transition(Phase::Entering);
    match size_order(state, sizer, config, signal) {
        Ok(committed) => {
            // Entry time is the delivery bar; the fill price is the signal's.
            open_position(
                &mut state.portfolio,
                fees,
                signal,
                bar.timestamp,
                signal.price,
                committed,
            );
            state.transition(Phase::Open);
            state.report.entries += 1;
            debug!(
                at = %bar.timestamp,
                price = signal.price,
                committed,
                cash = state.portfolio.cash,
                "entered position"
            );
        }
        Err(missed) => {
            state.transition(Phase::Flat);
            miss(state, missed);
        }
    }
}

fn scale_in(
    state: &mut SimState,
    fees: &FeeModel,
    sizer: &dyn PositionSizer,
    config: &SimConfig,
    signal: &Signal,
) {
    match size_order(state, sizer, config, signal) {
        Ok(committed) => {
            if add_tranche(&mut state.portfolio, fees, signal.price, committed).is_some() {
                state.report.scale_ins += 1;
                debug!(at = %signal.timestamp, price = signal.price, committed, "scaled in");
            }
        }
        Err(missed) => miss(state, missed),
    }
}

fn exit(
    state: &mut SimState,
    fees: &FeeModel,
    fraction: f64,
    time: chrono::DateTime<chrono::Utc>,
    price: f64,
    reason: ExitReason,
) {
    state.transition(Phase::Exiting);
    let Some((trade, full)) =
        close_fraction(&mut state.portfolio, fees, fraction, time, price, reason)
    else {
        state.transition(Phase::Flat);
        return;
    };

    debug!(
        at = %time,
        price,
        reason = %trade.exit_reason,
        return_pct = trade.return_pct,
        partial = trade.partial,
        "exited position"
    );
    *state
        .report
        .exits_by_reason
        .entry(trade.exit_reason.to_string())
        .or_default() += 1;
    if full {
        state.report.full_exits += 1;
        state.transition(Phase::Flat);
    } else {
        state.report.partial_exits += 1;
        state.transition(Phase::Open);
    }
    state.trades.push(trade);
}

fn miss(state: &mut SimState, missed: MissedEntry) {
    warn!(%missed, "entry skipped");
    state.report.missed_entries.push(missed);
}
