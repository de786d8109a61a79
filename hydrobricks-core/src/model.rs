//! Model driver.
//!
//! The numerical engine is external to this crate and is reached through the
//! [`SimulationEngine`] trait. The [`Model`] driver owns an engine and is responsible for
//! the orchestration around it: checking that the model has been set up, that every
//! parameter has a value and that the forcing is usable, before handing everything to
//! the engine and collecting the outlet discharge.

use crate::config::{dump_config_file, FileType};
use crate::errors::{HBError, HBResult};
use crate::forcing::Forcing;
use crate::metrics::Metric;
use crate::parameters::{ParameterSet, ParameterValue};
use crate::spatial::SpatialStructure;
use indexmap::IndexMap;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Failure reported by the simulation engine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// The solver diverged or produced an invalid state during a run
    #[error("Numerical failure: {0}")]
    Numerical(String),
    /// The engine could not be configured
    #[error("Engine setup failed: {0}")]
    Setup(String),
}

/// Error raised by the [`Model`] driver.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DriverError {
    #[error("The model has not been initialized. Please run setup() first.")]
    NotInitialized,
    #[error("The model has already been initialized. Please create a new instance.")]
    AlreadyInitialized,
    #[error("The parameter \"{name}\" of the component \"{component}\" has no value")]
    MissingValue { component: String, name: String },
    #[error("Please provide the forcing data at least once.")]
    ForcingMissing,
    #[error("The forcing {0} has not been spatialized.")]
    ForcingNotSpatialized(String),
    #[error("The forcing {variable} has {found} hydro units, {expected} expected")]
    ForcingShape {
        variable: String,
        expected: usize,
        found: usize,
    },
    #[error("The forcing does not cover the simulation period ({start} to {end})")]
    ForcingCoverage { start: f64, end: f64 },
    #[error("The model has not been run yet")]
    NoResults,
    #[error(transparent)]
    Engine(#[from] EngineError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeStep {
    Day,
}

impl TimeStep {
    /// Length of the step in days.
    pub fn days(self) -> f64 {
        match self {
            TimeStep::Day => 1.0,
        }
    }
}

/// Simulation period, both ends included, in Modified Julian Days.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationPeriod {
    start: f64,
    end: f64,
    time_step: TimeStep,
}

impl SimulationPeriod {
    pub fn new(start: f64, end: f64) -> HBResult<Self> {
        if !start.is_finite() || !end.is_finite() || start > end {
            return Err(HBError::InvalidInput(format!(
                "Invalid simulation period ({} to {})",
                start, end
            )));
        }
        Ok(Self {
            start,
            end,
            time_step: TimeStep::Day,
        })
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn end(&self) -> f64 {
        self.end
    }

    pub fn time_step(&self) -> TimeStep {
        self.time_step
    }

    /// Number of time steps.
    pub fn len(&self) -> usize {
        ((self.end - self.start) / self.time_step.days()).floor() as usize + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn time_axis(&self) -> Array1<f64> {
        let step = self.time_step.days();
        Array1::from_iter((0..self.len()).map(|i| self.start + i as f64 * step))
    }
}

/// Structural options of a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSettings {
    pub solver: String,
    /// Record every state variable rather than the outlet discharge only
    pub record_all: bool,
    pub surface_names: Vec<String>,
    pub surface_types: Vec<String>,
    /// Options specific to a model structure, e.g. the number of soil storages
    #[serde(default)]
    pub options: IndexMap<String, serde_json::Value>,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            solver: "HeunExplicit".to_string(),
            record_all: true,
            surface_names: vec!["ground".to_string()],
            surface_types: vec!["ground".to_string()],
            options: IndexMap::new(),
        }
    }
}

#[derive(Serialize)]
struct Surfaces<'a> {
    names: &'a [String],
    types: &'a [String],
}

/// Document describing the model structure, readable by the command-line version.
#[derive(Serialize)]
struct StructureConfig<'a> {
    base: &'a str,
    solver: &'a str,
    options: &'a IndexMap<String, serde_json::Value>,
    surfaces: Surfaces<'a>,
    logger: &'a str,
}

/// External simulation engine.
///
/// The engine performs the actual hydrological computation. Implementations are
/// expected to keep their state between calls: parameters are pushed one by one then
/// committed with [`update_parameters`](Self::update_parameters), and the forcing stays
/// loaded until replaced.
pub trait SimulationEngine {
    fn initialize(
        &mut self,
        settings: &ModelSettings,
        structure: &SpatialStructure,
        period: &SimulationPeriod,
    ) -> Result<(), EngineError>;

    /// Restore the initial state before a new run.
    fn reset(&mut self);

    fn set_parameter(
        &mut self,
        component: &str,
        name: &str,
        value: &ParameterValue,
    ) -> Result<(), EngineError>;

    fn update_parameters(&mut self) -> Result<(), EngineError>;

    /// Replace the forcing with spatialized time series.
    fn load_forcing(&mut self, forcing: &Forcing) -> Result<(), EngineError>;

    fn forcing_loaded(&self) -> bool;

    /// Run over the whole period and return the outlet discharge, one value per step.
    fn run(&mut self) -> Result<Array1<f64>, EngineError>;

    /// Use the current state variables as the initial state of the next runs.
    fn save_as_initial_state(&mut self) -> Result<(), EngineError>;
}

/// Outlet discharge of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discharge {
    pub time: Array1<f64>,
    pub values: Array1<f64>,
}

impl Discharge {
    /// Whether the series contains non-finite values.
    pub fn is_degenerate(&self) -> bool {
        self.values.iter().any(|v| !v.is_finite())
    }
}

/// Driver of a simulation engine.
#[derive(Debug, Clone)]
pub struct Model<E> {
    name: String,
    settings: ModelSettings,
    engine: E,
    spatial_structure: Option<SpatialStructure>,
    period: Option<SimulationPeriod>,
    discharge: Option<Discharge>,
}

impl<E: SimulationEngine> Model<E> {
    pub fn new(name: &str, engine: E) -> Self {
        Self::with_settings(name, ModelSettings::default(), engine)
    }

    pub fn with_settings(name: &str, settings: ModelSettings, engine: E) -> Self {
        Self {
            name: name.to_string(),
            settings,
            engine,
            spatial_structure: None,
            period: None,
            discharge: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn settings(&self) -> &ModelSettings {
        &self.settings
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn spatial_structure(&self) -> Option<&SpatialStructure> {
        self.spatial_structure.as_ref()
    }

    pub fn period(&self) -> Option<&SimulationPeriod> {
        self.period.as_ref()
    }

    pub fn is_initialized(&self) -> bool {
        self.period.is_some()
    }

    /// Initialize the engine for a catchment and a period.
    ///
    /// A model can only be set up once.
    pub fn setup(
        &mut self,
        spatial_structure: SpatialStructure,
        period: SimulationPeriod,
    ) -> HBResult<()> {
        if self.is_initialized() {
            return Err(DriverError::AlreadyInitialized.into());
        }
        self.engine
            .initialize(&self.settings, &spatial_structure, &period)
            .map_err(DriverError::from)?;
        self.spatial_structure = Some(spatial_structure);
        self.period = Some(period);
        Ok(())
    }

    /// Run the model with the given parameters.
    ///
    /// The forcing must be given on the first run; later runs reuse the forcing
    /// already loaded in the engine when `forcing` is `None`. Everything is checked
    /// before the engine is touched.
    pub fn run(&mut self, parameters: &ParameterSet, forcing: Option<&Forcing>) -> HBResult<()> {
        let period = *self.period.as_ref().ok_or(DriverError::NotInitialized)?;

        let table = parameters.model_parameters();
        if let Some(missing) = table.iter().find(|p| p.value.is_none()) {
            return Err(DriverError::MissingValue {
                component: missing.component.clone(),
                name: missing.name.clone(),
            }
            .into());
        }
        match forcing {
            Some(forcing) => self.check_forcing(forcing, &period)?,
            None if !self.engine.forcing_loaded() => {
                return Err(DriverError::ForcingMissing.into())
            }
            None => {}
        }

        self.discharge = None;
        self.engine.reset();
        for parameter in table.iter() {
            if let Some(value) = &parameter.value {
                self.engine
                    .set_parameter(&parameter.component, &parameter.name, value)
                    .map_err(DriverError::from)?;
            }
        }
        self.engine
            .update_parameters()
            .map_err(DriverError::from)?;
        if let Some(forcing) = forcing {
            self.engine
                .load_forcing(forcing)
                .map_err(DriverError::from)?;
        }

        let values = self.engine.run().map_err(DriverError::from)?;
        if values.len() != period.len() {
            return Err(HBError::LengthMismatch {
                expected: period.len(),
                found: values.len(),
            });
        }
        self.discharge = Some(Discharge {
            time: period.time_axis(),
            values,
        });
        Ok(())
    }

    /// Run the model and keep the final state as the initial state of the next runs.
    pub fn initialize_state_variables(
        &mut self,
        parameters: &ParameterSet,
        forcing: Option<&Forcing>,
    ) -> HBResult<()> {
        self.run(parameters, forcing)?;
        self.engine
            .save_as_initial_state()
            .map_err(DriverError::from)?;
        Ok(())
    }

    /// Outlet discharge of the last successful run.
    pub fn outlet_discharge(&self) -> HBResult<&Discharge> {
        Ok(self.discharge.as_ref().ok_or(DriverError::NoResults)?)
    }

    /// Score the last run against observations aligned with the simulation period.
    pub fn eval(&self, metric: Metric, observations: &[f64]) -> HBResult<f64> {
        let discharge = self.outlet_discharge()?;
        metric.evaluate(&discharge.values.to_vec(), observations)
    }

    /// Write the model structure as a configuration document.
    pub fn create_config_file(
        &self,
        directory: &Path,
        name: &str,
        file_type: FileType,
    ) -> HBResult<Vec<PathBuf>> {
        let config = StructureConfig {
            base: &self.name,
            solver: &self.settings.solver,
            options: &self.settings.options,
            surfaces: Surfaces {
                names: &self.settings.surface_names,
                types: &self.settings.surface_types,
            },
            logger: if self.settings.record_all { "all" } else { "" },
        };
        dump_config_file(&config, directory, name, file_type)
    }

    fn check_forcing(&self, forcing: &Forcing, period: &SimulationPeriod) -> HBResult<()> {
        let nb_units = self.spatial_structure.as_ref().map_or(0, SpatialStructure::len);
        for (variable, data) in forcing.variables() {
            let data =
                data.ok_or_else(|| DriverError::ForcingNotSpatialized(variable.to_string()))?;
            if data.ncols() != nb_units {
                return Err(DriverError::ForcingShape {
                    variable: variable.to_string(),
                    expected: nb_units,
                    found: data.ncols(),
                }
                .into());
            }
        }

        let time = forcing.time();
        let covered = match (time.iter().next(), time.iter().last()) {
            (Some(first), Some(last)) => *first <= period.start() && *last >= period.end(),
            _ => false,
        };
        if !covered {
            return Err(DriverError::ForcingCoverage {
                start: period.start(),
                end: period.end(),
            }
            .into());
        }
        Ok(())
    }
}
