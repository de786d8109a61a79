use super::value::ParameterValue;
use crate::errors::{HBError, HBResult};
use serde::{Deserialize, Serialize};

/// Component name used for parameters that drive the spatialization of the forcing
/// rather than the model itself.
pub const DATA_COMPONENT: &str = "data";

/// Definition of a single addressable parameter.
///
/// A parameter belongs to a component (brick) of the model and is addressed either by
/// its canonical key `component:name` or by any of its aliases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDefinition {
    /// Component (brick) the parameter belongs to, e.g. `snowpack` or `slow-reservoir`
    pub component: String,
    /// Name of the parameter within the component, e.g. `degree_day_factor`
    pub name: String,
    /// Unit of the parameter (descriptive only)
    pub unit: Option<String>,
    /// Alternative names, unique across the whole parameter set
    pub aliases: Vec<String>,
    /// Current value
    pub value: Option<ParameterValue>,
    pub min: Option<ParameterValue>,
    pub max: Option<ParameterValue>,
    pub default_value: Option<ParameterValue>,
    /// Mandatory parameters have to be assigned explicitly before running a model
    pub mandatory: bool,
}

impl ParameterDefinition {
    /// Canonical key of the parameter (`component:name`).
    pub fn key(&self) -> String {
        canonical_key(&self.component, &self.name)
    }

    /// Whether the parameter controls the forcing spatialization.
    pub fn is_for_forcing(&self) -> bool {
        self.component == DATA_COMPONENT
    }

    /// Whether both bounds are defined.
    pub fn has_range(&self) -> bool {
        self.min.is_some() && self.max.is_some()
    }
}

pub(crate) fn canonical_key(component: &str, name: &str) -> String {
    format!("{}:{}", component, name)
}

/// Specification of a new parameter, consumed by
/// [`ParameterSet::define`](super::ParameterSet::define).
///
/// # Example
///
/// ```rust
/// use hydrobricks_core::{ParameterSet, ParameterSpec};
///
/// let mut parameters = ParameterSet::new();
/// parameters
///     .define(
///         ParameterSpec::new("snowpack", "degree_day_factor")
///             .unit("mm/d/°C")
///             .aliases(["a_snow"])
///             .range(2.0, 12.0),
///     )
///     .unwrap();
/// assert!(parameters.has("a_snow"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSpec {
    pub component: String,
    pub name: String,
    pub unit: Option<String>,
    pub aliases: Vec<String>,
    pub min: Option<ParameterValue>,
    pub max: Option<ParameterValue>,
    pub default_value: Option<ParameterValue>,
    pub mandatory: bool,
}

impl ParameterSpec {
    /// Create a mandatory parameter without unit, aliases, bounds or default.
    pub fn new(component: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            name: name.into(),
            unit: None,
            aliases: vec![],
            min: None,
            max: None,
            default_value: None,
            mandatory: true,
        }
    }

    pub fn unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases.extend(aliases.into_iter().map(Into::into));
        self
    }

    pub fn min(mut self, min: impl Into<ParameterValue>) -> Self {
        self.min = Some(min.into());
        self
    }

    pub fn max(mut self, max: impl Into<ParameterValue>) -> Self {
        self.max = Some(max.into());
        self
    }

    /// Set both bounds at once.
    pub fn range(self, min: impl Into<ParameterValue>, max: impl Into<ParameterValue>) -> Self {
        self.min(min).max(max)
    }

    pub fn default_value(mut self, value: impl Into<ParameterValue>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// Non-mandatory parameters silently use their default value.
    pub fn mandatory(mut self, mandatory: bool) -> Self {
        self.mandatory = mandatory;
        self
    }
}

/// Check that a pair of bounds is usable.
///
/// Bounds are consistent when at most one of them is set, or when both have the same
/// shape (scalar/scalar or vectors of equal length) and `min <= max` everywhere.
pub(crate) fn check_range_consistency(
    parameter: &str,
    min: Option<&ParameterValue>,
    max: Option<&ParameterValue>,
) -> HBResult<()> {
    for bound in [min, max].into_iter().flatten() {
        if bound.is_empty() {
            return Err(HBError::RangeConsistency(format!(
                "empty bounds given for \"{}\"",
                parameter
            )));
        }
        if !bound.iter().all(f64::is_finite) {
            return Err(HBError::RangeConsistency(format!(
                "non-finite bounds given for \"{}\"",
                parameter
            )));
        }
    }

    let (min, max) = match (min, max) {
        (Some(min), Some(max)) => (min, max),
        _ => return Ok(()),
    };

    match (min, max) {
        (ParameterValue::Scalar(lo), ParameterValue::Scalar(hi)) => {
            if hi < lo {
                return Err(HBError::RangeConsistency(format!(
                    "the provided min value ({}) is greater than the max value ({}) for \"{}\"",
                    lo, hi, parameter
                )));
            }
        }
        (ParameterValue::Vector(lo), ParameterValue::Vector(hi)) => {
            if lo.len() != hi.len() {
                return Err(HBError::RangeConsistency(format!(
                    "the lengths of the min/max lists are not equal ({} and {}) for \"{}\"",
                    lo.len(),
                    hi.len(),
                    parameter
                )));
            }
            if let Some((lo, hi)) = lo.iter().zip(hi).find(|(lo, hi)| hi < lo) {
                return Err(HBError::RangeConsistency(format!(
                    "the provided min value ({}) in list is greater than the max value ({}) for \"{}\"",
                    lo, hi, parameter
                )));
            }
        }
        _ => {
            return Err(HBError::RangeConsistency(format!(
                "mixing lists and scalars for the min/max values of \"{}\"",
                parameter
            )));
        }
    }
    Ok(())
}

/// Check that a value fits the bounds of a parameter.
///
/// Scalar bounds apply to every element of a vector value. Vector bounds require a
/// vector value of the same length.
pub(crate) fn check_value_range(
    parameter: &str,
    value: &ParameterValue,
    min: Option<&ParameterValue>,
    max: Option<&ParameterValue>,
) -> HBResult<()> {
    if value.is_empty() {
        return Err(HBError::ShapeMismatch {
            parameter: parameter.to_string(),
            reason: "empty list given".to_string(),
        });
    }
    if value.iter().any(f64::is_nan) {
        return Err(HBError::InvalidInput(format!(
            "NaN value given for the parameter \"{}\"",
            parameter
        )));
    }

    for bound in [min, max].into_iter().flatten() {
        if let ParameterValue::Vector(b) = bound {
            match value {
                ParameterValue::Scalar(_) => {
                    return Err(HBError::ShapeMismatch {
                        parameter: parameter.to_string(),
                        reason: format!("expected a list of {} values, got a scalar", b.len()),
                    });
                }
                ParameterValue::Vector(v) if v.len() != b.len() => {
                    return Err(HBError::ShapeMismatch {
                        parameter: parameter.to_string(),
                        reason: format!("expected {} values, got {}", b.len(), v.len()),
                    });
                }
                _ => {}
            }
        }
    }

    for (i, v) in value.iter().enumerate() {
        if let Some(hi) = max.and_then(|m| m.bound_at(i)) {
            if v > hi {
                return Err(HBError::RangeViolation {
                    parameter: parameter.to_string(),
                    value: v,
                    side: "above",
                    bound: "maximum",
                    threshold: hi,
                });
            }
        }
        if let Some(lo) = min.and_then(|m| m.bound_at(i)) {
            if v < lo {
                return Err(HBError::RangeViolation {
                    parameter: parameter.to_string(),
                    value: v,
                    side: "below",
                    bound: "minimum",
                    threshold: lo,
                });
            }
        }
    }
    Ok(())
}
