//! Core parameter management and orchestration for hydrobricks models.
//!
//! The crate is organised around the [`ParameterSet`](parameters::ParameterSet), which
//! owns the catalogue of model parameters (component, name, unit, aliases, bounds,
//! default and current value) together with the constraints linking them.
//! Values are either assigned explicitly or drawn at random by the
//! [`Sampler`](sampler::Sampler), and the finalised set is handed to an external
//! [`SimulationEngine`](model::SimulationEngine) through the [`Model`](model::Model)
//! driver.
//!
//! # Module Organisation
//!
//! - `parameters`: parameter values, definitions and the registry
//! - `constraints`: binary relational constraints between scalar parameters
//! - `sampler`: constrained uniform sampling with a bounded number of redraws
//! - `config`: configuration documents (JSON, YAML, TOML)
//! - `spatial`, `forcing`, `model`: data contract with the simulation engine
//! - `metrics`, `analysis`, `calibration`: goodness of fit, Monte Carlo analysis and
//!   the interface used by calibration algorithms

pub mod analysis;
pub mod calibration;
pub mod config;
pub mod constraints;
pub mod errors;
pub mod forcing;
pub mod metrics;
pub mod model;
pub mod parameters;
#[cfg(feature = "python")]
pub mod python;
pub mod sampler;
pub mod spatial;

pub use errors::{HBError, HBResult};
pub use parameters::{ParameterDefinition, ParameterSet, ParameterSpec, ParameterValue};
