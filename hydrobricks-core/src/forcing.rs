//! Meteorological forcing.
//!
//! The forcing holds one time axis and a set of named variables (precipitation,
//! temperature, ...). Each variable must be spatialized, i.e. distributed over the hydro
//! units as a `time x unit` array, before it can be handed to the engine. The
//! spatialization itself is performed by an external [`ForcingSpatializer`], which may
//! depend on the `data` parameters of the parameter set.

use crate::errors::{HBError, HBResult};
use crate::parameters::ParameterSet;
use crate::spatial::SpatialStructure;
use indexmap::IndexMap;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Forcing time series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forcing {
    /// Time axis in Modified Julian Days
    time: Array1<f64>,
    /// Variable name -> spatialized values (`time x unit`), `None` until spatialized
    variables: IndexMap<String, Option<Array2<f64>>>,
}

impl Forcing {
    /// Create a forcing on a strictly increasing, non-empty time axis.
    pub fn new(time: Array1<f64>) -> HBResult<Self> {
        if time.is_empty() {
            return Err(HBError::InvalidInput("The forcing time axis is empty".to_string()));
        }
        if time.iter().zip(time.iter().skip(1)).any(|(a, b)| b <= a) {
            return Err(HBError::InvalidInput(
                "The forcing time axis must be strictly increasing".to_string(),
            ));
        }
        Ok(Self {
            time,
            variables: IndexMap::new(),
        })
    }

    /// Declare a variable, still to be spatialized.
    pub fn with_variable(mut self, name: &str) -> Self {
        self.variables.entry(name.to_string()).or_insert(None);
        self
    }

    /// Store the spatialized values of a variable.
    ///
    /// The array must have one row per time step.
    pub fn set_spatialized(&mut self, name: &str, data: Array2<f64>) -> HBResult<()> {
        if data.nrows() != self.time.len() {
            return Err(HBError::LengthMismatch {
                expected: self.time.len(),
                found: data.nrows(),
            });
        }
        self.variables.insert(name.to_string(), Some(data));
        Ok(())
    }

    pub fn time(&self) -> &Array1<f64> {
        &self.time
    }

    pub fn variable(&self, name: &str) -> Option<&Array2<f64>> {
        self.variables.get(name).and_then(Option::as_ref)
    }

    /// Iterate over the variables, unspatialized ones yielding `None`.
    pub fn variables(&self) -> impl Iterator<Item = (&str, Option<&Array2<f64>>)> {
        self.variables
            .iter()
            .map(|(name, data)| (name.as_str(), data.as_ref()))
    }

    pub fn is_spatialized(&self) -> bool {
        self.variables.values().all(Option::is_some)
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }
}

/// Distributes the forcing over the hydro units.
///
/// Implemented outside of the core (station interpolation, lapse rates, precipitation
/// correction, ...). Implementations read the `data` parameters they need from
/// `parameters`.
pub trait ForcingSpatializer {
    fn spatialize(
        &self,
        forcing: &mut Forcing,
        structure: &SpatialStructure,
        parameters: &ParameterSet,
    ) -> HBResult<()>;
}
