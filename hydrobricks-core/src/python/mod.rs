//! Python bindings for the parameter registry.

use crate::errors::HBError;
use crate::metrics::Metric;
use crate::sampler::MAX_REDRAWS;
use pyo3::exceptions::{PyIOError, PyKeyError, PyRuntimeError, PyValueError};
use pyo3::prelude::*;

mod parameter_set;

pub use parameter_set::PyParameterSet;

impl From<HBError> for PyErr {
    fn from(e: HBError) -> Self {
        match e {
            HBError::NotFound(_) | HBError::UnknownParameter(_) => {
                PyKeyError::new_err(e.to_string())
            }
            HBError::ConstraintUnsatisfiable { .. } | HBError::Model(_) => {
                PyRuntimeError::new_err(e.to_string())
            }
            HBError::Io(_) => PyIOError::new_err(e.to_string()),
            _ => PyValueError::new_err(e.to_string()),
        }
    }
}

/// Evaluate a simulated series against observations with a metric given by name
/// (e.g. `nse` or `kge_2012`).
#[pyfunction]
pub fn evaluate(metric: &str, simulated: Vec<f64>, observed: Vec<f64>) -> PyResult<f64> {
    let metric: Metric = metric.parse()?;
    Ok(metric.evaluate(&simulated, &observed)?)
}

#[pymodule]
#[pyo3(name = "core")]
pub fn core_module(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyParameterSet>()?;
    m.add_function(wrap_pyfunction!(evaluate, m)?)?;
    m.add("MAX_REDRAWS", MAX_REDRAWS)?;
    Ok(())
}
