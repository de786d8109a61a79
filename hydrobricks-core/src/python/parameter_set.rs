use crate::config::{dump_config_file, FileType};
use crate::parameters::{ParameterSet, ParameterSpec, ParameterValue};
use pyo3::prelude::*;
use pyo3::types::PyDict;
use pythonize::pythonize;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::path::Path;

/// Value accepted from Python: a number or a sequence of numbers.
#[derive(FromPyObject)]
enum PyParameterValue {
    Scalar(f64),
    Vector(Vec<f64>),
}

impl From<PyParameterValue> for ParameterValue {
    fn from(value: PyParameterValue) -> Self {
        match value {
            PyParameterValue::Scalar(v) => ParameterValue::Scalar(v),
            PyParameterValue::Vector(v) => ParameterValue::Vector(v),
        }
    }
}

/// Python wrapper for the parameter registry.
///
/// Example:
///     parameters = ParameterSet()
///     parameters.define_parameter("snowpack", "degree_day_factor", unit="mm/d/°C",
///                                 aliases=["a_snow"], min_value=0, max_value=12)
///     parameters.set_values({"a_snow": 3.0})
#[pyclass(name = "ParameterSet", module = "hydrobricks._hydrobricks.core")]
#[derive(Debug, Clone, Default)]
pub struct PyParameterSet(pub ParameterSet);

#[pymethods]
impl PyParameterSet {
    #[new]
    fn new() -> Self {
        Self::default()
    }

    /// Define a new parameter of a component.
    #[pyo3(signature = (component, name, unit=None, aliases=None, min_value=None, max_value=None, default_value=None, mandatory=true))]
    #[allow(clippy::too_many_arguments)]
    fn define_parameter(
        &mut self,
        component: &str,
        name: &str,
        unit: Option<&str>,
        aliases: Option<Vec<String>>,
        min_value: Option<PyParameterValue>,
        max_value: Option<PyParameterValue>,
        default_value: Option<PyParameterValue>,
        mandatory: bool,
    ) -> PyResult<()> {
        let mut spec = ParameterSpec::new(component, name)
            .aliases(aliases.unwrap_or_default())
            .mandatory(mandatory);
        if let Some(unit) = unit {
            spec = spec.unit(unit);
        }
        if let Some(min) = min_value {
            spec = spec.min(ParameterValue::from(min));
        }
        if let Some(max) = max_value {
            spec = spec.max(ParameterValue::from(max));
        }
        if let Some(default) = default_value {
            spec = spec.default_value(ParameterValue::from(default));
        }
        Ok(self.0.define(spec)?)
    }

    /// Add a parameter controlling the forcing spatialization.
    #[pyo3(signature = (name, value=None, min_value=None, max_value=None, unit=None))]
    fn add_data_parameter(
        &mut self,
        name: &str,
        value: Option<PyParameterValue>,
        min_value: Option<PyParameterValue>,
        max_value: Option<PyParameterValue>,
        unit: Option<&str>,
    ) -> PyResult<()> {
        Ok(self.0.define_data_parameter(
            name,
            value.map(Into::into),
            min_value.map(Into::into),
            max_value.map(Into::into),
            unit,
        )?)
    }

    /// Add a constraint such as `define_constraint("k_slow_1", "<", "k_slow_2")`.
    fn define_constraint(
        &mut self,
        parameter_1: &str,
        operator: &str,
        parameter_2: &str,
    ) -> PyResult<()> {
        Ok(self.0.define_constraint(parameter_1, operator, parameter_2)?)
    }

    fn are_constraints_satisfied(&self) -> PyResult<bool> {
        Ok(self.0.are_constraints_satisfied()?)
    }

    /// Assign values from a dict keyed by canonical key or alias.
    ///
    /// Nothing is assigned if any value is rejected.
    fn set_values(&mut self, values: &Bound<'_, PyDict>) -> PyResult<()> {
        let mut batch = Vec::with_capacity(values.len());
        for (key, value) in values.iter() {
            let key: String = key.extract()?;
            let value: PyParameterValue = value.extract()?;
            batch.push((key, ParameterValue::from(value)));
        }
        Ok(self.0.set_values(batch)?)
    }

    /// Value of a parameter, `None` when unset.
    fn get(&self, py: Python<'_>, name: &str) -> PyResult<PyObject> {
        Ok(pythonize(py, &self.0.get(name)?)?)
    }

    fn has(&self, name: &str) -> bool {
        self.0.has(name)
    }

    fn is_for_forcing(&self, name: &str) -> PyResult<bool> {
        Ok(self.0.is_for_forcing(name)?)
    }

    #[pyo3(signature = (name, min_value=None, max_value=None))]
    fn change_range(
        &mut self,
        name: &str,
        min_value: Option<PyParameterValue>,
        max_value: Option<PyParameterValue>,
    ) -> PyResult<()> {
        Ok(self
            .0
            .change_range(name, min_value.map(Into::into), max_value.map(Into::into))?)
    }

    /// Draw random values for the given parameters under the constraints.
    ///
    /// Returns a dict of the assigned values.
    #[pyo3(signature = (parameters, seed=None))]
    fn set_random_values(
        &mut self,
        py: Python<'_>,
        parameters: Vec<String>,
        seed: Option<u64>,
    ) -> PyResult<PyObject> {
        let mut rng = match seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        let assigned = self.0.set_random_values(&parameters, &mut rng)?;
        Ok(pythonize(py, &assigned)?)
    }

    fn allow_changing(&mut self, parameters: Vec<String>) -> PyResult<()> {
        Ok(self.0.allow_changing(&parameters)?)
    }

    /// Table of the parameters handed to the engine, as a list of dicts.
    fn get_model_parameters(&self, py: Python<'_>) -> PyResult<PyObject> {
        Ok(pythonize(py, &self.0.model_parameters())?)
    }

    /// Values grouped by component.
    fn to_dict(&self, py: Python<'_>) -> PyResult<PyObject> {
        Ok(pythonize(py, &self.0.export_by_component())?)
    }

    /// Write the values grouped by component to `directory/name.<ext>`.
    #[pyo3(signature = (directory, name, file_type="both"))]
    fn create_file(&self, directory: &str, name: &str, file_type: &str) -> PyResult<Vec<String>> {
        let file_type: FileType = file_type.parse()?;
        let written = dump_config_file(
            &self.0.export_by_component(),
            Path::new(directory),
            name,
            file_type,
        )?;
        Ok(written
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect())
    }

    fn __len__(&self) -> usize {
        self.0.len()
    }

    fn __contains__(&self, name: &str) -> bool {
        self.0.has(name)
    }

    fn __repr__(&self) -> String {
        format!("ParameterSet({} parameters)", self.0.len())
    }
}
