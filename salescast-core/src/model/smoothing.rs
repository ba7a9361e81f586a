//! Additive trend / seasonal exponential smoothing.
//!
//! - Holt's linear trend for short histories and yearly data
//! - Holt-Winters additive seasonality once two full seasons are available
//!
//! Smoothing parameters are picked by grid search on one-step-ahead squared
//! error. Bounds form an 80% interval around the point forecast, widened by
//! `sqrt(h)` from the one-step residual standard deviation.

use chrono::NaiveDateTime;
use tracing::debug;

use super::{ForecastModel, ModelBuilder, ModelError, Prediction};
use crate::domain::{AggregatedPoint, Granularity};

/// Two-sided z-score for an 80% interval.
const INTERVAL_Z: f64 = 1.281_551_565_545;

const ALPHAS: [f64; 9] = [0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9];
const BETAS: [f64; 5] = [0.01, 0.05, 0.1, 0.2, 0.3];
const GAMMAS: [f64; 4] = [0.05, 0.1, 0.3, 0.5];

#[derive(Debug, Clone, Copy, PartialEq)]
struct Params {
    alpha: f64,
    beta: f64,
    gamma: f64,
}

#[derive(Debug, Clone, PartialEq)]
struct Fitted {
    level: f64,
    trend: f64,
    /// Seasonal offsets indexed by position modulo the season length.
    seasonal: Vec<f64>,
    /// Number of observations the state has absorbed.
    n: usize,
    sigma: f64,
    last_period: NaiveDateTime,
}

/// Result of running the recursions once with fixed parameters.
struct Pass {
    level: f64,
    trend: f64,
    seasonal: Vec<f64>,
    sse: f64,
    errors: usize,
}

#[derive(Debug, Clone)]
pub struct ExponentialSmoothing {
    granularity: Granularity,
    season_length: Option<usize>,
    fitted: Option<Fitted>,
}

impl ExponentialSmoothing {
    pub fn new(granularity: Granularity) -> Self {
        let season_length = match granularity {
            Granularity::Monthly => Some(12),
            Granularity::Yearly => None,
        };
        Self {
            granularity,
            season_length,
            fitted: None,
        }
    }

    /// Season length actually used for `n` observations.
    fn effective_season(&self, n: usize) -> Option<usize> {
        self.season_length.filter(|m| n >= 2 * m)
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    /// One-step residual standard deviation of the fitted model.
    pub fn residual_sigma(&self) -> Option<f64> {
        self.fitted.as_ref().map(|f| f.sigma)
    }

    fn run(values: &[f64], season: Option<usize>, p: Params) -> Pass {
        match season {
            None => Self::run_holt(values, p),
            Some(m) => Self::run_seasonal(values, m, p),
        }
    }

    fn run_holt(values: &[f64], p: Params) -> Pass {
        let mut level = values[0];
        let mut trend = values[1] - values[0];
        let mut sse = 0.0;
        let mut errors = 0;

        for &y in &values[1..] {
            let err = y - (level + trend);
            sse += err * err;
            errors += 1;
            let prev_level = level;
            level = p.alpha * y + (1.0 - p.alpha) * (level + trend);
            trend = p.beta * (level - prev_level) + (1.0 - p.beta) * trend;
        }

        Pass {
            level,
            trend,
            seasonal: Vec::new(),
            sse,
            errors,
        }
    }

    fn run_seasonal(values: &[f64], m: usize, p: Params) -> Pass {
        let mean = |s: &[f64]| s.iter().sum::<f64>() / s.len() as f64;
        let first = mean(&values[..m]);
        let second = mean(&values[m..2 * m]);

        let mut level = first;
        let mut trend = (second - first) / m as f64;
        let mut seasonal: Vec<f64> = values[..m].iter().map(|y| y - first).collect();
        let mut sse = 0.0;
        let mut errors = 0;

        for (t, &y) in values.iter().enumerate().skip(m) {
            let s = seasonal[t % m];
            let err = y - (level + trend + s);
            sse += err * err;
            errors += 1;
            let prev_level = level;
            level = p.alpha * (y - s) + (1.0 - p.alpha) * (level + trend);
            trend = p.beta * (level - prev_level) + (1.0 - p.beta) * trend;
            seasonal[t % m] = p.gamma * (y - level) + (1.0 - p.gamma) * s;
        }

        Pass {
            level,
            trend,
            seasonal,
            sse,
            errors,
        }
    }
}

impl ForecastModel for ExponentialSmoothing {
    fn name(&self) -> &str {
        match self.season_length {
            Some(_) => "holt_winters_additive",
            None => "holt_linear",
        }
    }

    fn fit(&mut self, history: &[AggregatedPoint]) -> Result<(), ModelError> {
        self.fitted = None;
        if history.len() < 2 {
            return Err(ModelError::InsufficientHistory {
                required: 2,
                actual: history.len(),
            });
        }
        if let Some(index) = history.iter().position(|p| !p.total_amount.is_finite()) {
            return Err(ModelError::NonFinite { index });
        }
        if let Some(index) = history
            .windows(2)
            .position(|w| w[0].period_start >= w[1].period_start)
        {
            return Err(ModelError::UnorderedHistory { index: index + 1 });
        }

        let values: Vec<f64> = history.iter().map(|p| p.total_amount).collect();
        let season = self.effective_season(values.len());
        let gammas: &[f64] = if season.is_some() { &GAMMAS } else { &[0.0] };

        let mut best: Option<(Params, Pass)> = None;
        for &alpha in &ALPHAS {
            for &beta in &BETAS {
                for &gamma in gammas {
                    let params = Params { alpha, beta, gamma };
                    let pass = Self::run(&values, season, params);
                    if !pass.sse.is_finite() {
                        continue;
                    }
                    if best.as_ref().map_or(true, |(_, b)| pass.sse < b.sse) {
                        best = Some((params, pass));
                    }
                }
            }
        }

        let (params, pass) = best.ok_or_else(|| {
            ModelError::Other("no smoothing parameters produced a finite fit".into())
        })?;
        debug!(
            model = self.name(),
            alpha = params.alpha,
            beta = params.beta,
            gamma = params.gamma,
            sse = pass.sse,
            "smoothing parameters selected"
        );
        let sigma = if pass.errors > 0 {
            (pass.sse / pass.errors as f64).sqrt()
        } else {
            0.0
        };

        self.fitted = Some(Fitted {
            level: pass.level,
            trend: pass.trend,
            seasonal: pass.seasonal,
            n: values.len(),
            sigma,
            last_period: history[history.len() - 1].period_start,
        });
        Ok(())
    }

    fn predict(&self, future: &[NaiveDateTime]) -> Result<Vec<Prediction>, ModelError> {
        let fitted = self.fitted.as_ref().ok_or(ModelError::NotFitted)?;

        future
            .iter()
            .map(|&ts| {
                let h = self.granularity.periods_between(fitted.last_period, ts);
                if h < 1 {
                    return Err(ModelError::NotFuture { timestamp: ts });
                }
                let h_f = h as f64;
                let seasonal = if fitted.seasonal.is_empty() {
                    0.0
                } else {
                    let m = fitted.seasonal.len();
                    fitted.seasonal[(fitted.n + h as usize - 1) % m]
                };
                let predicted = fitted.level + h_f * fitted.trend + seasonal;
                let half_width = INTERVAL_Z * fitted.sigma * h_f.sqrt();
                Ok(Prediction {
                    predicted,
                    lower: predicted - half_width,
                    upper: predicted + half_width,
                })
            })
            .collect()
    }
}

/// Builds an [`ExponentialSmoothing`] model per call.
#[derive(Debug, Clone, Copy, Default)]
pub struct SmoothingBuilder;

impl ModelBuilder for SmoothingBuilder {
    fn build(&self, granularity: Granularity) -> Box<dyn ForecastModel> {
        Box::new(ExponentialSmoothing::new(granularity))
    }
}
