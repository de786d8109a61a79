//! Constrained uniform sampling of parameter values.
//!
//! The sampler draws every requested parameter uniformly within its bounds, commits the
//! draw into the [`ParameterSet`] and checks the constraints. When any constraint is
//! violated the whole draw is repeated. The number of redraws is bounded: after the
//! first draw, up to [`MAX_REDRAWS`] further draws are attempted (1001 draws in total)
//! before giving up with [`HBError::ConstraintUnsatisfiable`].
//!
//! # Example
//!
//! ```rust
//! use hydrobricks_core::{ParameterSet, ParameterSpec};
//! use hydrobricks_core::sampler::Sampler;
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha8Rng;
//!
//! let mut parameters = ParameterSet::new();
//! parameters
//!     .define(ParameterSpec::new("slow_reservoir", "response_factor").alias("k_slow_1").range(0.0, 1.0))
//!     .unwrap();
//! parameters
//!     .define(ParameterSpec::new("slow_reservoir_2", "response_factor").alias("k_slow_2").range(0.0, 1.0))
//!     .unwrap();
//! parameters.define_constraint("k_slow_1", "<=", "k_slow_2").unwrap();
//!
//! let mut rng = ChaCha8Rng::seed_from_u64(42);
//! let drawn = Sampler::new()
//!     .sample(&mut parameters, &["k_slow_1", "k_slow_2"], &mut rng)
//!     .unwrap();
//! assert!(drawn["k_slow_1"].as_scalar() <= drawn["k_slow_2"].as_scalar());
//! ```

use crate::errors::{HBError, HBResult};
use crate::parameters::{ParameterSet, ParameterValue};
use indexmap::IndexMap;
use log::{debug, trace};
use rand::Rng;

/// Number of redraws allowed after the first draw.
pub const MAX_REDRAWS: usize = 1000;

/// Bounds of a draw, in the shape of the value to produce.
#[derive(Debug, Clone, PartialEq)]
enum DrawRange {
    Scalar(f64, f64),
    /// `(min, max)` for every element
    Vector(Vec<(f64, f64)>),
}

impl DrawRange {
    fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> ParameterValue {
        match self {
            DrawRange::Scalar(lo, hi) => ParameterValue::Scalar(rng.gen_range(*lo..=*hi)),
            DrawRange::Vector(ranges) => ParameterValue::Vector(
                ranges.iter().map(|&(lo, hi)| rng.gen_range(lo..=hi)).collect(),
            ),
        }
    }
}

/// A parameter selected for sampling, with its bounds resolved.
#[derive(Debug, Clone)]
struct DrawTarget {
    key: String,
    position: usize,
    range: DrawRange,
}

/// Uniform sampler with a bounded number of redraws.
#[derive(Debug, Clone, Copy)]
pub struct Sampler {
    max_redraws: usize,
}

impl Default for Sampler {
    fn default() -> Self {
        Self::new()
    }
}

impl Sampler {
    pub fn new() -> Self {
        Self {
            max_redraws: MAX_REDRAWS,
        }
    }

    /// Use a different redraw ceiling.
    pub fn with_max_redraws(mut self, max_redraws: usize) -> Self {
        self.max_redraws = max_redraws;
        self
    }

    /// Maximum number of draws performed by [`sample`](Self::sample).
    pub fn max_draws(&self) -> usize {
        self.max_redraws + 1
    }

    /// Draw new values for `keys` and commit them into `parameters`.
    ///
    /// Scalar parameters receive one value in `[min, max]`; vector parameters receive
    /// one value per position in `[min[i], max[i]]`. The draw is repeated as long as
    /// the constraints of the parameter set are violated.
    ///
    /// Returns the values of the last draw, keyed by the requested names. Keys naming
    /// the same parameter are drawn once and report the same value. Scalar bounds on a
    /// parameter currently holding a vector produce a vector of the same length.
    ///
    /// # Errors
    ///
    /// Before any draw:
    /// - [`HBError::UnknownParameter`] if a key does not resolve
    /// - [`HBError::RangeUndefined`] if a parameter lacks its min or max
    /// - [`HBError::InvalidInput`] if `max - min` overflows
    ///
    /// After drawing:
    /// - [`HBError::ConstraintUnsatisfiable`] once the redraw ceiling is reached. The
    ///   parameter set then holds the values of the last draw.
    /// - any error raised while evaluating the constraints
    pub fn sample<R, S>(
        &self,
        parameters: &mut ParameterSet,
        keys: &[S],
        rng: &mut R,
    ) -> HBResult<IndexMap<String, ParameterValue>>
    where
        R: Rng + ?Sized,
        S: AsRef<str>,
    {
        // Keys naming the same parameter share a single draw
        let mut targets: Vec<DrawTarget> = Vec::with_capacity(keys.len());
        let mut requested = Vec::with_capacity(keys.len());
        for key in keys {
            let target = resolve_target(parameters, key.as_ref())?;
            let index = match targets.iter().position(|t| t.position == target.position) {
                Some(index) => index,
                None => {
                    targets.push(target);
                    targets.len() - 1
                }
            };
            requested.push((key.as_ref().to_string(), index));
        }

        let mut attempt = 0;
        loop {
            let mut drawn = Vec::with_capacity(targets.len());
            for target in &targets {
                let value = target.range.draw(rng);
                parameters.commit(target.position, value.clone());
                drawn.push(value);
            }

            if parameters.are_constraints_satisfied()? {
                return Ok(requested
                    .iter()
                    .map(|(key, index)| (key.clone(), drawn[*index].clone()))
                    .collect());
            }
            trace!("Draw {} violates the parameter constraints", attempt + 1);

            if attempt >= self.max_redraws {
                debug!(
                    "Giving up sampling {:?} after {} draws",
                    targets.iter().map(|t| t.key.as_str()).collect::<Vec<_>>(),
                    attempt + 1
                );
                return Err(HBError::ConstraintUnsatisfiable {
                    attempts: attempt + 1,
                });
            }
            attempt += 1;
        }
    }
}

fn resolve_target(parameters: &ParameterSet, key: &str) -> HBResult<DrawTarget> {
    let position = parameters
        .resolve(key)
        .map_err(|_| HBError::UnknownParameter(key.to_string()))?;
    let definition = parameters.definition_at(position);

    let (min, max) = match (&definition.min, &definition.max) {
        (Some(min), Some(max)) => (min, max),
        _ => return Err(HBError::RangeUndefined(key.to_string())),
    };

    // Bounds were checked for consistency at definition, so both share the same shape
    let range = match (min, max, &definition.value) {
        (
            ParameterValue::Scalar(lo),
            ParameterValue::Scalar(hi),
            Some(ParameterValue::Vector(current)),
        ) => DrawRange::Vector(vec![(*lo, *hi); current.len()]),
        (ParameterValue::Scalar(lo), ParameterValue::Scalar(hi), _) => {
            DrawRange::Scalar(*lo, *hi)
        }
        _ => DrawRange::Vector(min.iter().zip(max.iter()).collect()),
    };

    let spans_finite = match &range {
        DrawRange::Scalar(lo, hi) => (hi - lo).is_finite(),
        DrawRange::Vector(ranges) => {
            if ranges.is_empty() {
                return Err(HBError::RangeUndefined(key.to_string()));
            }
            ranges.iter().all(|(lo, hi)| (hi - lo).is_finite())
        }
    };
    if !spans_finite {
        return Err(HBError::InvalidInput(format!(
            "the range of \"{}\" is too wide to be sampled",
            key
        )));
    }

    Ok(DrawTarget {
        key: key.to_string(),
        position,
        range,
    })
}
