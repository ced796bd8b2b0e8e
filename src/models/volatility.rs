use crate::errors::{EngineError, EngineResult};
use crate::series::OrderedSeries;
use crate::types::{Diagnosed, Issues, RecoverableIssue};
use chrono::Datelike;
use smallvec::SmallVec;
use statrs::statistics::Statistics;

/// Used whenever the data cannot support an estimate.
pub const DEFAULT_VOLATILITY: f64 = 0.20;

/// How consecutive prices are turned into returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VolatilityMethod {
    /// ln(P_t / P_{t-1})
    #[default]
    Log,
    /// (P_t - P_{t-1}) / P_{t-1}
    PctChange,
    /// (P_t - P_{t-1}) / mean(P). Stable when prices touch zero.
    Normalized,
}

impl std::str::FromStr for VolatilityMethod {
    type Err = EngineError;

    fn from_str(s: &str) -> EngineResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "log" => Ok(Self::Log),
            "pct_change" | "pct" => Ok(Self::PctChange),
            "normalized" => Ok(Self::Normalized),
            other => Err(EngineError::Config(format!("unknown volatility method: {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct VolatilitySample {
    pub annualized_sigma: f64,
    /// Finite returns the estimate was computed from.
    pub return_series: Vec<f64>,
}

/// Period returns with non-finite values dropped.
pub fn returns(series: &OrderedSeries, method: VolatilityMethod) -> Vec<f64> {
    let prices: Vec<f64> = series.values().collect();
    let scale = match method {
        VolatilityMethod::Normalized => prices.iter().mean(),
        _ => f64::NAN,
    };

    prices
        .windows(2)
        .map(|w| {
            let (prev, cur) = (w[0], w[1]);
            match method {
                VolatilityMethod::Log => (cur / prev).ln(),
                VolatilityMethod::PctChange => (cur - prev) / prev,
                VolatilityMethod::Normalized => (cur - prev) / scale,
            }
        })
        .filter(|r| r.is_finite())
        .collect()
}

/// Annualized historical volatility: sample std of returns * sqrt(periods_per_year).
///
/// Data problems never fail the call. Too few returns or a degenerate
/// estimate fall back to DEFAULT_VOLATILITY, an estimate above `cap` is
/// clamped, and each case is reported in the returned issues.
pub fn estimate(
    series: &OrderedSeries,
    periods_per_year: u32,
    method: VolatilityMethod,
    cap: Option<f64>,
) -> EngineResult<Diagnosed<VolatilitySample>> {
    if periods_per_year == 0 {
        return Err(EngineError::invalid("periods_per_year", 0.0, "must be >= 1"));
    }
    if let Some(c) = cap {
        if !(c.is_finite() && c > 0.0) {
            return Err(EngineError::invalid("volatility_cap", c, "must be finite and > 0"));
        }
    }

    let return_series = returns(series, method);
    let mut issues: Issues = SmallVec::new();

    if return_series.len() < 2 {
        tracing::warn!(
            valid = return_series.len(),
            fallback = DEFAULT_VOLATILITY,
            "insufficient returns for volatility estimate"
        );
        issues.push(RecoverableIssue::InsufficientReturns {
            valid: return_series.len(),
            fallback: DEFAULT_VOLATILITY,
        });
        return Ok(Diagnosed {
            value: VolatilitySample {
                annualized_sigma: DEFAULT_VOLATILITY,
                return_series,
            },
            issues,
        });
    }

    let raw = return_series.iter().std_dev() * (periods_per_year as f64).sqrt();
    let mut sigma = raw;

    if let Some(cap) = cap {
        if sigma > cap {
            tracing::warn!(raw = sigma, cap, "volatility capped");
            issues.push(RecoverableIssue::VolatilityCapped { raw: sigma, cap });
            sigma = cap;
        }
    }

    if !sigma.is_finite() || sigma <= 0.0 {
        tracing::warn!(raw = sigma, fallback = DEFAULT_VOLATILITY, "invalid volatility estimate");
        issues.push(RecoverableIssue::InvalidVolatility {
            raw: sigma,
            fallback: DEFAULT_VOLATILITY,
        });
        sigma = DEFAULT_VOLATILITY;
    }

    tracing::debug!(
        sigma,
        raw,
        returns = return_series.len(),
        method = ?method,
        "volatility estimated"
    );

    Ok(Diagnosed {
        value: VolatilitySample {
            annualized_sigma: sigma,
            return_series,
        },
        issues,
    })
}

/// Divide each observation by the mean of its calendar month (across all
/// years), leaving the deviation from the seasonal profile. Points whose
/// month mean is not positive are dropped.
pub fn deseasonalize_monthly(series: &OrderedSeries) -> OrderedSeries {
    let mut sums = [0.0_f64; 12];
    let mut counts = [0_u32; 12];
    for &(date, value) in series.points() {
        let m = date.month0() as usize;
        sums[m] += value;
        counts[m] += 1;
    }

    let means: [f64; 12] = std::array::from_fn(|m| {
        if counts[m] == 0 {
            f64::NAN
        } else {
            sums[m] / counts[m] as f64
        }
    });

    series
        .filter(|date, _| means[date.month0() as usize] > 0.0)
        .map_values(|date, value| value / means[date.month0() as usize])
}
