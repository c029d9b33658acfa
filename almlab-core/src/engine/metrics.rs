//! Performance metrics: pure functions over an equity curve.
//!
//! Annualization uses `bars_per_year` (8760 for hourly crypto bars) instead of
//! a trading-day calendar.

/// Total return as a fraction: (final - initial) / initial.
pub fn total_return(initial: f64, equity_curve: &[f64]) -> f64 {
    match equity_curve.last() {
        Some(&final_eq) if initial > 0.0 => (final_eq - initial) / initial,
        _ => 0.0,
    }
}

/// Compound annual growth over `bar_count` bars.
pub fn annual_return(initial: f64, equity_curve: &[f64], bars_per_year: f64) -> f64 {
    let Some(&final_eq) = equity_curve.last() else {
        return 0.0;
    };
    if equity_curve.len() < 2 || initial <= 0.0 || final_eq <= 0.0 || bars_per_year <= 0.0 {
        return 0.0;
    }
    let years = equity_curve.len() as f64 / bars_per_year;
    (final_eq / initial).powf(1.0 / years) - 1.0
}

/// Annualized standard deviation of bar returns.
pub fn annual_volatility(equity_curve: &[f64], bars_per_year: f64) -> f64 {
    std_dev(&bar_returns(equity_curve)) * bars_per_year.sqrt()
}

/// Annualized Sharpe ratio (zero risk-free rate).
///
/// Returns 0.0 if variance is zero or fewer than 2 returns.
pub fn sharpe_ratio(equity_curve: &[f64], bars_per_year: f64) -> f64 {
    let returns = bar_returns(equity_curve);
    if returns.len() < 2 {
        return 0.0;
    }
    let std = std_dev(&returns);
    if std < 1e-15 {
        return 0.0;
    }
    (mean_f64(&returns) / std) * bars_per_year.sqrt()
}

/// Annualized Sortino ratio (downside deviation only).
///
/// Returns 0.0 if there is no downside deviation or fewer than 2 returns.
pub fn sortino_ratio(equity_curve: &[f64], bars_per_year: f64) -> f64 {
    let returns = bar_returns(equity_curve);
    if returns.len() < 2 {
        return 0.0;
    }
    let downside_sq: f64 = returns
        .iter()
        .filter(|&&r| r < 0.0)
        .map(|r| r * r)
        .sum();
    let downside_std = (downside_sq / returns.len() as f64).sqrt();
    if downside_std < 1e-15 {
        return 0.0;
    }
    (mean_f64(&returns) / downside_std) * bars_per_year.sqrt()
}

/// Calmar ratio: annual return / |max drawdown|.
pub fn calmar_ratio(annual_return: f64, max_drawdown: f64) -> f64 {
    if max_drawdown >= 0.0 {
        return 0.0;
    }
    annual_return / max_drawdown.abs()
}

/// Maximum drawdown as a negative fraction (e.g., -0.15 = 15% drawdown).
pub fn max_drawdown(equity_curve: &[f64]) -> f64 {
    let Some(&first) = equity_curve.first() else {
        return 0.0;
    };
    let mut peak = first;
    let mut max_dd = 0.0_f64;
    for &eq in equity_curve {
        if eq > peak {
            peak = eq;
        }
        if peak > 0.0 {
            max_dd = max_dd.min((eq - peak) / peak);
        }
    }
    max_dd
}

/// Historical value-at-risk: the `1 - confidence` quantile of bar returns
/// (linear interpolation). Typically negative.
pub fn value_at_risk(equity_curve: &[f64], confidence: f64) -> f64 {
    let mut returns = bar_returns(equity_curve);
    if returns.is_empty() {
        return 0.0;
    }
    returns.sort_by(|a, b| a.total_cmp(b));
    let q = (1.0 - confidence).clamp(0.0, 1.0);
    let pos = q * (returns.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    returns[lo] + (returns[hi] - returns[lo]) * frac
}

/// Sum of per-bar turnover scaled to one year.
pub fn annualized_turnover(turnover: &[f64], bars_per_year: f64) -> f64 {
    if turnover.is_empty() {
        return 0.0;
    }
    turnover.iter().sum::<f64>() * bars_per_year / turnover.len() as f64
}

// ─── Helpers ────────────────────────────────────────────────────────

/// Bar-over-bar returns of an equity curve.
pub fn bar_returns(equity_curve: &[f64]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .map(|w| if w[0] > 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
        .collect()
}

pub(crate) fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}
