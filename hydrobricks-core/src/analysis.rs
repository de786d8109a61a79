//! Monte Carlo analysis of the model parameters.
//!
//! Each trial draws new values for the assessed parameters (under the constraints of the
//! parameter set), runs the model and scores the outlet discharge against observations.
//! When one of the assessed parameters drives the forcing spatialization (a `data`
//! parameter), the forcing is spatialized again for every trial; otherwise it is
//! spatialized and loaded once.
//!
//! A trial in which the engine fails numerically is kept in the table with a
//! [`TrialStatus::SimulationFailed`] status and NaN scores. Any other error aborts the
//! analysis.

use crate::errors::{HBError, HBResult};
use crate::forcing::{Forcing, ForcingSpatializer};
use crate::metrics::Metric;
use crate::model::{DriverError, EngineError, Model, SimulationEngine};
use crate::parameters::{ParameterSet, ParameterValue};
use crate::spatial::SpatialStructure;
use log::{info, warn};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// What to assess and what to compare against.
pub struct Assessment<'a, S: ?Sized> {
    /// Keys (canonical or aliases) of the parameters to draw
    pub parameters: &'a [String],
    /// Forcing before spatialization
    pub forcing: &'a Forcing,
    pub spatializer: &'a S,
    /// Observed discharge, aligned with the simulation period
    pub observations: &'a [f64],
    pub metrics: &'a [Metric],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TrialStatus {
    Completed,
    /// The engine failed numerically, with the reported reason
    SimulationFailed(String),
}

/// One row of an [`AnalysisTable`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    pub trial: usize,
    /// Drawn values, in the order of the assessed parameters
    pub parameters: Vec<ParameterValue>,
    /// Scores, in the order of the metrics. NaN for failed trials.
    pub scores: Vec<f64>,
    pub status: TrialStatus,
}

/// Results of an analysis: the assessed parameters followed by the metrics as columns,
/// one row per trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisTable {
    parameters: Vec<String>,
    metrics: Vec<Metric>,
    rows: Vec<TrialRecord>,
}

impl AnalysisTable {
    fn new(parameters: &[String], metrics: &[Metric]) -> Self {
        Self {
            parameters: parameters.to_vec(),
            metrics: metrics.to_vec(),
            rows: vec![],
        }
    }

    /// Column names: the assessed parameters, then the metric names.
    pub fn columns(&self) -> Vec<String> {
        self.parameters
            .iter()
            .cloned()
            .chain(self.metrics.iter().map(|m| m.name().to_string()))
            .collect()
    }

    pub fn rows(&self) -> &[TrialRecord] {
        &self.rows
    }

    /// Values drawn for a parameter over all trials.
    pub fn parameter_column(&self, key: &str) -> Option<Vec<&ParameterValue>> {
        let index = self.parameters.iter().position(|p| p == key)?;
        Some(self.rows.iter().map(|row| &row.parameters[index]).collect())
    }

    /// Scores of a metric over all trials.
    pub fn metric_column(&self, metric: Metric) -> Option<Vec<f64>> {
        let index = self.metrics.iter().position(|m| *m == metric)?;
        Some(self.rows.iter().map(|row| row.scores[index]).collect())
    }

    pub fn nb_failed(&self) -> usize {
        self.rows
            .iter()
            .filter(|row| row.status != TrialStatus::Completed)
            .count()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Uniform Monte Carlo sampling of the parameter space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonteCarlo {
    pub nb_runs: usize,
    pub seed: u64,
}

impl Default for MonteCarlo {
    fn default() -> Self {
        Self {
            nb_runs: 10000,
            seed: 0,
        }
    }
}

impl MonteCarlo {
    pub fn new(nb_runs: usize, seed: u64) -> Self {
        Self { nb_runs, seed }
    }

    /// Run the trials one after the other on the given model and parameter set.
    ///
    /// The model must have been set up. The parameter set keeps the values of the last
    /// trial.
    pub fn analyze<E, S>(
        &self,
        model: &mut Model<E>,
        parameters: &mut ParameterSet,
        assessment: &Assessment<S>,
    ) -> HBResult<AnalysisTable>
    where
        E: SimulationEngine,
        S: ForcingSpatializer + ?Sized,
    {
        let structure = model
            .spatial_structure()
            .cloned()
            .ok_or(DriverError::NotInitialized)?;
        let random_forcing = needs_random_forcing(parameters, assessment.parameters)?;
        let shared_forcing = if random_forcing {
            None
        } else {
            Some(spatialize(assessment, &structure, parameters)?)
        };

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut table = AnalysisTable::new(assessment.parameters, assessment.metrics);
        for trial in 0..self.nb_runs {
            info!("Run {}/{}", trial + 1, self.nb_runs);
            // The engine keeps the shared forcing once loaded
            let forcing = if trial == 0 || !model.engine().forcing_loaded() {
                shared_forcing.as_ref()
            } else {
                None
            };
            let record = run_trial(
                trial,
                model,
                parameters,
                assessment,
                &structure,
                forcing,
                random_forcing,
                &mut rng,
            )?;
            table.rows.push(record);
        }
        Ok(table)
    }

    /// Run the trials in parallel, each on its own copy of the model and parameter set.
    ///
    /// Trial `n` draws from a generator seeded with `seed + n`, so the results do not
    /// depend on the scheduling.
    pub fn analyze_parallel<E, S>(
        &self,
        model: &Model<E>,
        parameters: &ParameterSet,
        assessment: &Assessment<S>,
    ) -> HBResult<AnalysisTable>
    where
        E: SimulationEngine + Clone + Send + Sync,
        S: ForcingSpatializer + Sync + ?Sized,
    {
        let structure = model
            .spatial_structure()
            .cloned()
            .ok_or(DriverError::NotInitialized)?;
        let random_forcing = needs_random_forcing(parameters, assessment.parameters)?;
        let shared_forcing = if random_forcing {
            None
        } else {
            Some(spatialize(assessment, &structure, parameters)?)
        };

        info!("Running {} trials in parallel", self.nb_runs);
        let rows = (0..self.nb_runs)
            .into_par_iter()
            .map(|trial| {
                let mut model = model.clone();
                let mut parameters = parameters.clone();
                let mut rng = ChaCha8Rng::seed_from_u64(self.seed.wrapping_add(trial as u64));
                run_trial(
                    trial,
                    &mut model,
                    &mut parameters,
                    assessment,
                    &structure,
                    shared_forcing.as_ref(),
                    random_forcing,
                    &mut rng,
                )
            })
            .collect::<HBResult<Vec<_>>>()?;

        let mut table = AnalysisTable::new(assessment.parameters, assessment.metrics);
        table.rows = rows;
        Ok(table)
    }
}

/// Whether any assessed parameter drives the forcing spatialization.
fn needs_random_forcing(parameters: &ParameterSet, keys: &[String]) -> HBResult<bool> {
    let mut random_forcing = false;
    for key in keys {
        if !parameters.has(key) {
            return Err(HBError::UnknownParameter(key.clone()));
        }
        random_forcing |= parameters.is_for_forcing(key)?;
    }
    Ok(random_forcing)
}

fn spatialize<S: ForcingSpatializer + ?Sized>(
    assessment: &Assessment<S>,
    structure: &SpatialStructure,
    parameters: &ParameterSet,
) -> HBResult<Forcing> {
    let mut forcing = assessment.forcing.clone();
    assessment
        .spatializer
        .spatialize(&mut forcing, structure, parameters)?;
    Ok(forcing)
}

#[allow(clippy::too_many_arguments)]
fn run_trial<E, S, R>(
    trial: usize,
    model: &mut Model<E>,
    parameters: &mut ParameterSet,
    assessment: &Assessment<S>,
    structure: &SpatialStructure,
    shared_forcing: Option<&Forcing>,
    random_forcing: bool,
    rng: &mut R,
) -> HBResult<TrialRecord>
where
    E: SimulationEngine,
    S: ForcingSpatializer + ?Sized,
    R: Rng + ?Sized,
{
    let drawn = parameters.set_random_values(assessment.parameters, rng)?;
    let drawn = assessment
        .parameters
        .iter()
        .map(|key| {
            drawn
                .get(key)
                .cloned()
                .ok_or_else(|| HBError::UnknownParameter(key.clone()))
        })
        .collect::<HBResult<Vec<_>>>()?;

    let result = if random_forcing {
        let forcing = spatialize(assessment, structure, parameters)?;
        model.run(parameters, Some(&forcing))
    } else {
        model.run(parameters, shared_forcing)
    };

    match result {
        Ok(()) => {
            let scores = assessment
                .metrics
                .iter()
                .map(|metric| model.eval(*metric, assessment.observations))
                .collect::<HBResult<Vec<_>>>()?;
            Ok(TrialRecord {
                trial,
                parameters: drawn,
                scores,
                status: TrialStatus::Completed,
            })
        }
        Err(HBError::Model(DriverError::Engine(EngineError::Numerical(reason)))) => {
            warn!("Run {} failed: {}", trial + 1, reason);
            Ok(TrialRecord {
                trial,
                parameters: drawn,
                scores: vec![f64::NAN; assessment.metrics.len()],
                status: TrialStatus::SimulationFailed(reason),
            })
        }
        Err(e) => Err(e),
    }
}
