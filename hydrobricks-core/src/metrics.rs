//! Goodness-of-fit metrics comparing simulated and observed discharge.
//!
//! The free functions take `(observed, simulated)` slices of equal length. Time steps
//! with a missing (NaN) observation are ignored. A non-finite simulated value is not
//! filtered out, so a degenerate simulation yields a NaN score rather than a good one.

use crate::errors::{HBError, HBResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Metric {
    /// Nash-Sutcliffe efficiency
    Nse,
    /// Kling-Gupta efficiency (Gupta et al., 2009)
    Kge2009,
    /// Kling-Gupta efficiency (Kling et al., 2012)
    Kge2012,
    Rmse,
    Mae,
    /// Percent bias
    Pbias,
}

impl Metric {
    pub fn name(self) -> &'static str {
        match self {
            Metric::Nse => "nse",
            Metric::Kge2009 => "kge_2009",
            Metric::Kge2012 => "kge_2012",
            Metric::Rmse => "rmse",
            Metric::Mae => "mae",
            Metric::Pbias => "pbias",
        }
    }

    /// Score a simulation against observations.
    pub fn evaluate(self, simulated: &[f64], observed: &[f64]) -> HBResult<f64> {
        if simulated.len() != observed.len() {
            return Err(HBError::LengthMismatch {
                expected: observed.len(),
                found: simulated.len(),
            });
        }
        let (obs, sim) = observed_pairs(observed, simulated);
        if obs.is_empty() {
            return Err(HBError::InvalidInput(
                "No valid observation to evaluate the simulation against".to_string(),
            ));
        }
        Ok(match self {
            Metric::Nse => nse(&obs, &sim),
            Metric::Kge2009 => kge_2009(&obs, &sim),
            Metric::Kge2012 => kge_2012(&obs, &sim),
            Metric::Rmse => rmse(&obs, &sim),
            Metric::Mae => mae(&obs, &sim),
            Metric::Pbias => pbias(&obs, &sim),
        })
    }
}

impl FromStr for Metric {
    type Err = HBError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "nse" => Ok(Metric::Nse),
            "kge_2009" | "kge" => Ok(Metric::Kge2009),
            "kge_2012" => Ok(Metric::Kge2012),
            "rmse" => Ok(Metric::Rmse),
            "mae" => Ok(Metric::Mae),
            "pbias" => Ok(Metric::Pbias),
            other => Err(HBError::UnknownMetric(other.to_string())),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Keep the time steps with an observation.
fn observed_pairs(observed: &[f64], simulated: &[f64]) -> (Vec<f64>, Vec<f64>) {
    observed
        .iter()
        .zip(simulated)
        .filter(|(o, _)| !o.is_nan())
        .map(|(o, s)| (*o, *s))
        .unzip()
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation.
fn std_dev(values: &[f64], mean: f64) -> f64 {
    (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64).sqrt()
}

fn correlation(observed: &[f64], simulated: &[f64]) -> f64 {
    let mean_o = mean(observed);
    let mean_s = mean(simulated);
    let std_o = std_dev(observed, mean_o);
    let std_s = std_dev(simulated, mean_s);
    if std_o == 0.0 || std_s == 0.0 {
        return 0.0;
    }
    observed
        .iter()
        .zip(simulated)
        .map(|(o, s)| (o - mean_o) * (s - mean_s))
        .sum::<f64>()
        / (observed.len() as f64 * std_o * std_s)
}

/// Nash-Sutcliffe Efficiency. Range: (-inf, 1], 1 = perfect.
pub fn nse(observed: &[f64], simulated: &[f64]) -> f64 {
    let mean_obs = mean(observed);
    let numerator: f64 = observed
        .iter()
        .zip(simulated)
        .map(|(o, s)| (o - s).powi(2))
        .sum();
    let denominator: f64 = observed.iter().map(|o| (o - mean_obs).powi(2)).sum();
    if denominator == 0.0 {
        return f64::NEG_INFINITY;
    }
    1.0 - numerator / denominator
}

/// Kling-Gupta Efficiency with the variability ratio. Range: (-inf, 1], 1 = perfect.
pub fn kge_2009(observed: &[f64], simulated: &[f64]) -> f64 {
    let mean_o = mean(observed);
    let mean_s = mean(simulated);
    let std_o = std_dev(observed, mean_o);
    let std_s = std_dev(simulated, mean_s);

    let r = correlation(observed, simulated);
    let alpha = if std_o == 0.0 { 0.0 } else { std_s / std_o };
    let beta = if mean_o == 0.0 { 0.0 } else { mean_s / mean_o };

    1.0 - ((r - 1.0).powi(2) + (alpha - 1.0).powi(2) + (beta - 1.0).powi(2)).sqrt()
}

/// Kling-Gupta Efficiency with the coefficient of variation ratio.
pub fn kge_2012(observed: &[f64], simulated: &[f64]) -> f64 {
    let mean_o = mean(observed);
    let mean_s = mean(simulated);
    let cv_o = if mean_o == 0.0 {
        0.0
    } else {
        std_dev(observed, mean_o) / mean_o
    };
    let cv_s = if mean_s == 0.0 {
        0.0
    } else {
        std_dev(simulated, mean_s) / mean_s
    };

    let r = correlation(observed, simulated);
    let gamma = if cv_o == 0.0 { 0.0 } else { cv_s / cv_o };
    let beta = if mean_o == 0.0 { 0.0 } else { mean_s / mean_o };

    1.0 - ((r - 1.0).powi(2) + (gamma - 1.0).powi(2) + (beta - 1.0).powi(2)).sqrt()
}

/// Root Mean Square Error. Range: [0, inf), 0 = perfect.
pub fn rmse(observed: &[f64], simulated: &[f64]) -> f64 {
    let mse: f64 = observed
        .iter()
        .zip(simulated)
        .map(|(o, s)| (o - s).powi(2))
        .sum::<f64>()
        / observed.len() as f64;
    mse.sqrt()
}

/// Mean Absolute Error. Range: [0, inf), 0 = perfect.
pub fn mae(observed: &[f64], simulated: &[f64]) -> f64 {
    observed
        .iter()
        .zip(simulated)
        .map(|(o, s)| (o - s).abs())
        .sum::<f64>()
        / observed.len() as f64
}

/// Percent Bias. Optimal = 0. Positive = overestimation.
pub fn pbias(observed: &[f64], simulated: &[f64]) -> f64 {
    let sum_obs: f64 = observed.iter().sum();
    if sum_obs == 0.0 {
        return f64::INFINITY;
    }
    let diff_sum: f64 = simulated.iter().zip(observed).map(|(s, o)| s - o).sum();
    100.0 * diff_sum / sum_obs
}
