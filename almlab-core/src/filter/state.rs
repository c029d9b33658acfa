//! Per-asset filter state and its single-bar transition rule.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Price-based exits measured in ATRs.
///
/// Stop-loss and take-profit are fixed at entry from the entry close and the
/// entry ATR. The trailing stop follows the best high (long) or low (short)
/// since entry, offset by the current ATR. A triggered exit closes the
/// position even inside the minimum holding period and starts the cooldown.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExitConfig {
    pub enabled: bool,
    pub atr_window: usize,
    pub stop_loss_atr: Option<f64>,
    pub take_profit_atr: Option<f64>,
    pub trailing_atr: Option<f64>,
}

impl Default for ExitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            atr_window: 14,
            stop_loss_atr: Some(2.0),
            take_profit_atr: Some(3.0),
            trailing_atr: Some(2.5),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Consecutive identical signals needed to enter from FLAT.
    pub persistence_periods: usize,
    /// Bars a position must be held before it may be closed.
    pub min_holding_periods: usize,
    /// Bars after an exit during which re-entry is blocked.
    pub cooldown_periods: usize,
    pub exits: ExitConfig,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            persistence_periods: 4,
            min_holding_periods: 8,
            cooldown_periods: 4,
            exits: ExitConfig::default(),
        }
    }
}

impl FilterConfig {
    /// No filtering: every non-zero signal is acted on immediately.
    pub fn passthrough() -> Self {
        Self {
            persistence_periods: 1,
            min_holding_periods: 0,
            cooldown_periods: 0,
            exits: ExitConfig::default(),
        }
    }
}

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    Signal,
    StopLoss,
    TakeProfit,
    TrailingStop,
}

/// Prices of one bar as seen by the exit rules.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceContext {
    pub close: f64,
    pub high: f64,
    pub low: f64,
    pub atr: f64,
}

impl PriceContext {
    fn is_valid(&self) -> bool {
        [self.close, self.high, self.low, self.atr]
            .iter()
            .all(|v| v.is_finite())
            && self.close > 0.0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionState {
    #[default]
    Flat,
    Long,
    Short,
}

impl PositionState {
    /// Map a directional signal to a state; NaN and zero are flat.
    pub fn from_signal(signal: f64) -> Self {
        if signal > 0.0 {
            PositionState::Long
        } else if signal < 0.0 {
            PositionState::Short
        } else {
            PositionState::Flat
        }
    }

    pub fn as_signal(&self) -> f64 {
        match self {
            PositionState::Flat => 0.0,
            PositionState::Long => 1.0,
            PositionState::Short => -1.0,
        }
    }
}

/// State record for one asset over one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterState {
    pub state: PositionState,
    /// Bars elapsed since entry (0 on the entry bar).
    pub periods_held: usize,
    pub last_exit: Option<DateTime<Utc>>,
    /// Bars elapsed since the last exit (0 on the exit bar).
    pub bars_since_exit: Option<usize>,
    /// Consecutive bars the `candidate` direction has been signalled while FLAT.
    pub consecutive_signal_count: usize,
    pub candidate: PositionState,
    /// A reversal arrived before the minimum holding period elapsed.
    pub pending_exit: bool,
    /// Close and ATR of the entry bar, when prices were supplied.
    pub entry_price: Option<f64>,
    pub entry_atr: Option<f64>,
    /// Best high (long) or low (short) since entry.
    pub extreme: Option<f64>,
    /// Reason for the most recent exit.
    pub exit_reason: Option<ExitReason>,
}

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate one bar. Returns `Some((from, to))` when the state changed.
    pub fn step(
        &mut self,
        signal: f64,
        timestamp: DateTime<Utc>,
        config: &FilterConfig,
    ) -> Option<(PositionState, PositionState)> {
        self.step_with_prices(signal, timestamp, None, config)
    }

    /// `step` with the bar's prices, so enabled price exits can fire.
    pub fn step_with_prices(
        &mut self,
        signal: f64,
        timestamp: DateTime<Utc>,
        prices: Option<PriceContext>,
        config: &FilterConfig,
    ) -> Option<(PositionState, PositionState)> {
        let incoming = PositionState::from_signal(signal);
        if let Some(bars) = self.bars_since_exit.as_mut() {
            *bars += 1;
        }

        match self.state {
            PositionState::Flat => {
                if incoming == PositionState::Flat {
                    self.consecutive_signal_count = 0;
                    self.candidate = PositionState::Flat;
                    return None;
                }
                if incoming == self.candidate {
                    self.consecutive_signal_count += 1;
                } else {
                    self.candidate = incoming;
                    self.consecutive_signal_count = 1;
                }

                let persisted =
                    self.consecutive_signal_count >= config.persistence_periods.max(1);
                if persisted && self.cooldown_elapsed(config) {
                    self.transition(incoming);
                    self.record_entry(incoming, prices);
                    return Some((PositionState::Flat, incoming));
                }
                None
            }
            held => {
                self.periods_held += 1;
                let forced = match prices {
                    Some(p) if config.exits.enabled => self.price_exit(held, p, &config.exits),
                    _ => None,
                };
                if let Some(reason) = forced {
                    self.exit(timestamp, reason);
                    return Some((held, PositionState::Flat));
                }
                if incoming == held {
                    self.pending_exit = false;
                    return None;
                }
                if self.periods_held >= config.min_holding_periods {
                    self.exit(timestamp, ExitReason::Signal);
                    return Some((held, PositionState::Flat));
                }
                self.pending_exit = true;
                None
            }
        }
    }

    /// True once more than `cooldown_periods` bars have passed since the last exit.
    pub fn cooldown_elapsed(&self, config: &FilterConfig) -> bool {
        self.bars_since_exit
            .map_or(true, |bars| bars > config.cooldown_periods)
    }

    fn transition(&mut self, to: PositionState) {
        self.state = to;
        self.periods_held = 0;
        self.consecutive_signal_count = 0;
        self.candidate = PositionState::Flat;
        self.pending_exit = false;
        self.entry_price = None;
        self.entry_atr = None;
        self.extreme = None;
    }

    fn exit(&mut self, timestamp: DateTime<Utc>, reason: ExitReason) {
        self.transition(PositionState::Flat);
        self.last_exit = Some(timestamp);
        self.bars_since_exit = Some(0);
        self.exit_reason = Some(reason);
    }

    fn record_entry(&mut self, side: PositionState, prices: Option<PriceContext>) {
        let Some(p) = prices.filter(PriceContext::is_valid) else {
            return;
        };
        self.entry_price = Some(p.close);
        self.entry_atr = Some(p.atr);
        self.extreme = Some(if side == PositionState::Long { p.high } else { p.low });
    }

    /// Stop-loss, then take-profit, then trailing stop. Invalid prices never trigger.
    fn price_exit(
        &mut self,
        held: PositionState,
        p: PriceContext,
        exits: &ExitConfig,
    ) -> Option<ExitReason> {
        if !p.is_valid() {
            return None;
        }
        let side = held.as_signal();
        let extreme = match (held, self.extreme) {
            (PositionState::Long, Some(e)) => e.max(p.high),
            (PositionState::Long, None) => p.high,
            (_, Some(e)) => e.min(p.low),
            (_, None) => p.low,
        };
        self.extreme = Some(extreme);

        if let (Some(entry), Some(atr)) = (self.entry_price, self.entry_atr) {
            let gain = side * (p.close - entry);
            if exits.stop_loss_atr.is_some_and(|k| gain <= -k * atr) {
                return Some(ExitReason::StopLoss);
            }
            if exits.take_profit_atr.is_some_and(|k| gain >= k * atr) {
                return Some(ExitReason::TakeProfit);
            }
        }
        if exits
            .trailing_atr
            .is_some_and(|k| side * (p.close - extreme) < -k * p.atr)
        {
            return Some(ExitReason::TrailingStop);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn ts(i: usize) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::hours(i as i64)
    }

    /// Feed a signal sequence and return the state after each bar.
    fn run(signals: &[f64], config: &FilterConfig) -> Vec<PositionState> {
        let mut state = FilterState::new();
        signals
            .iter()
            .enumerate()
            .map(|(i, s)| {
                state.step(*s, ts(i), config);
                state.state
            })
            .collect()
    }

    #[test]
    fn entry_requires_persistence() {
        let cfg = FilterConfig::default();
        let states = run(&[1.0, 1.0, 1.0, 1.0, 1.0], &cfg);
        assert_eq!(&states[..3], &[PositionState::Flat; 3]);
        assert_eq!(states[3], PositionState::Long);
    }

    #[test]
    fn interrupted_signal_restarts_count() {
        let cfg = FilterConfig::default();
        let states = run(&[1.0, 1.0, 1.0, 0.0, 1.0, 1.0, 1.0], &cfg);
        assert!(states.iter().all(|s| *s == PositionState::Flat));
    }

    #[test]
    fn sign_change_restarts_count() {
        let cfg = FilterConfig::default();
        let states = run(&[1.0, 1.0, 1.0, -1.0, -1.0, -1.0, -1.0], &cfg);
        assert_eq!(states[5], PositionState::Flat);
        assert_eq!(states[6], PositionState::Short);
    }

    #[test]
    fn exit_waits_for_min_holding() {
        let cfg = FilterConfig {
            persistence_periods: 1,
            min_holding_periods: 3,
            cooldown_periods: 0,
            ..FilterConfig::default()
        };
        let mut state = FilterState::new();
        assert!(state.step(1.0, ts(0), &cfg).is_some());
        assert_eq!(state.step(0.0, ts(1), &cfg), None);
        assert!(state.pending_exit);
        assert_eq!(state.step(0.0, ts(2), &cfg), None);
        assert_eq!(
            state.step(0.0, ts(3), &cfg),
            Some((PositionState::Long, PositionState::Flat))
        );
        assert_eq!(state.last_exit, Some(ts(3)));
        assert_eq!(state.exit_reason, Some(ExitReason::Signal));
        assert_eq!(state.periods_held, 0);
    }

    #[test]
    fn queued_exit_cancelled_when_signal_returns() {
        let cfg = FilterConfig {
            persistence_periods: 1,
            min_holding_periods: 3,
            cooldown_periods: 0,
            ..FilterConfig::default()
        };
        let states = run(&[1.0, -1.0, 1.0, 1.0, 1.0], &cfg);
        assert!(states.iter().all(|s| *s == PositionState::Long));
    }

    #[test]
    fn cooldown_blocks_reentry() {
        let cfg = FilterConfig {
            persistence_periods: 1,
            min_holding_periods: 0,
            cooldown_periods: 2,
            ..FilterConfig::default()
        };
        // enter at 0, exit at 1, blocked at 2 and 3, re-enter at 4
        let states = run(&[1.0, 0.0, 1.0, 1.0, 1.0], &cfg);
        assert_eq!(
            states,
            vec![
                PositionState::Long,
                PositionState::Flat,
                PositionState::Flat,
                PositionState::Flat,
                PositionState::Long,
            ]
        );
    }

    #[test]
    fn persistence_accumulates_during_cooldown() {
        let cfg = FilterConfig {
            persistence_periods: 3,
            min_holding_periods: 0,
            cooldown_periods: 3,
            ..FilterConfig::default()
        };
        let mut state = FilterState::new();
        state.bars_since_exit = Some(0);
        for i in 0..3 {
            assert_eq!(state.step(-1.0, ts(i), &cfg), None);
        }
        assert_eq!(state.consecutive_signal_count, 3);
        assert_eq!(
            state.step(-1.0, ts(3), &cfg),
            Some((PositionState::Flat, PositionState::Short))
        );
    }

    #[test]
    fn nan_signal_is_flat() {
        assert_eq!(PositionState::from_signal(f64::NAN), PositionState::Flat);
    }

    // ── Price exits ──

    fn px(close: f64, atr: f64) -> Option<PriceContext> {
        Some(PriceContext {
            close,
            high: close + 0.5,
            low: close - 0.5,
            atr,
        })
    }

    /// Immediate entry, a long holding period, only the given exits.
    fn with_exits(stop: Option<f64>, take: Option<f64>, trail: Option<f64>) -> FilterConfig {
        FilterConfig {
            persistence_periods: 1,
            min_holding_periods: 10,
            cooldown_periods: 0,
            exits: ExitConfig {
                enabled: true,
                atr_window: 14,
                stop_loss_atr: stop,
                take_profit_atr: take,
                trailing_atr: trail,
            },
        }
    }

    #[test]
    fn stop_loss_overrides_min_holding() {
        let cfg = with_exits(Some(2.0), None, None);
        let mut state = FilterState::new();
        assert!(state.step_with_prices(1.0, ts(0), px(100.0, 2.0), &cfg).is_some());
        assert_eq!(state.entry_price, Some(100.0));
        // 3 below entry is inside 2 ATR
        assert_eq!(state.step_with_prices(1.0, ts(1), px(97.0, 2.0), &cfg), None);
        assert_eq!(
            state.step_with_prices(1.0, ts(2), px(96.0, 2.0), &cfg),
            Some((PositionState::Long, PositionState::Flat))
        );
        assert_eq!(state.exit_reason, Some(ExitReason::StopLoss));
        assert_eq!(state.last_exit, Some(ts(2)));
        assert_eq!(state.bars_since_exit, Some(0));
        assert_eq!(state.entry_price, None);
    }

    #[test]
    fn take_profit_on_short() {
        let cfg = with_exits(None, Some(3.0), None);
        let mut state = FilterState::new();
        state.step_with_prices(-1.0, ts(0), px(100.0, 2.0), &cfg);
        assert_eq!(state.step_with_prices(-1.0, ts(1), px(95.0, 2.0), &cfg), None);
        assert_eq!(
            state.step_with_prices(-1.0, ts(2), px(94.0, 2.0), &cfg),
            Some((PositionState::Short, PositionState::Flat))
        );
        assert_eq!(state.exit_reason, Some(ExitReason::TakeProfit));
    }

    #[test]
    fn trailing_stop_follows_the_best_high() {
        let cfg = with_exits(None, None, Some(2.5));
        let mut state = FilterState::new();
        state.step_with_prices(1.0, ts(0), px(100.0, 1.0), &cfg);
        // new high 104.5 puts the stop at 102.0
        assert_eq!(state.step_with_prices(1.0, ts(1), px(104.0, 1.0), &cfg), None);
        assert_eq!(state.extreme, Some(104.5));
        assert_eq!(state.step_with_prices(1.0, ts(2), px(102.2, 1.0), &cfg), None);
        assert!(state.step_with_prices(1.0, ts(3), px(101.9, 1.0), &cfg).is_some());
        assert_eq!(state.exit_reason, Some(ExitReason::TrailingStop));
    }

    #[test]
    fn price_exits_need_enabling_and_valid_prices() {
        let mut cfg = with_exits(Some(1.0), None, None);
        cfg.exits.enabled = false;
        let mut state = FilterState::new();
        state.step_with_prices(1.0, ts(0), px(100.0, 1.0), &cfg);
        assert_eq!(state.step_with_prices(1.0, ts(1), px(50.0, 1.0), &cfg), None);

        let cfg = with_exits(Some(1.0), None, None);
        let mut state = FilterState::new();
        state.step_with_prices(1.0, ts(0), px(100.0, 1.0), &cfg);
        assert_eq!(state.step_with_prices(1.0, ts(1), px(f64::NAN, 1.0), &cfg), None);
        assert_eq!(state.step(1.0, ts(2), &cfg), None);
        assert_eq!(state.state, PositionState::Long);
    }

    #[test]
    fn forced_exit_starts_cooldown() {
        let mut cfg = with_exits(Some(1.0), None, None);
        cfg.cooldown_periods = 1;
        let mut state = FilterState::new();
        state.step_with_prices(1.0, ts(0), px(100.0, 1.0), &cfg);
        assert!(state.step_with_prices(1.0, ts(1), px(98.0, 1.0), &cfg).is_some());
        assert_eq!(state.step_with_prices(1.0, ts(2), px(98.0, 1.0), &cfg), None);
        assert_eq!(
            state.step_with_prices(1.0, ts(3), px(98.0, 1.0), &cfg),
            Some((PositionState::Flat, PositionState::Long))
        );
        assert_eq!(state.entry_price, Some(98.0));
    }
}
