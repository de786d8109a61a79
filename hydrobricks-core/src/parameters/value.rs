use serde::{Deserialize, Serialize};
use std::fmt;

/// Value of a parameter, or one of its bounds.
///
/// Most parameters hold a single number. Parameters defined per elevation band or per
/// month hold a fixed-length list instead, and their bounds then have the same length.
///
/// The value is serialised untagged, so configuration files contain either a number or
/// a list of numbers.
///
/// # Example
///
/// ```rust
/// use hydrobricks_core::ParameterValue;
///
/// let k = ParameterValue::from(0.5);
/// assert_eq!(k.as_scalar(), Some(0.5));
///
/// let monthly = ParameterValue::from(vec![1.0, 2.0, 3.0]);
/// assert_eq!(monthly.len(), 3);
/// assert!(monthly.is_vector());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    /// Single value
    Scalar(f64),
    /// One value per position (elevation band, month, ...)
    Vector(Vec<f64>),
}

impl ParameterValue {
    /// Get the value as a scalar if this is a Scalar variant.
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            ParameterValue::Scalar(v) => Some(*v),
            ParameterValue::Vector(_) => None,
        }
    }

    /// Get the values as a slice if this is a Vector variant.
    pub fn as_vector(&self) -> Option<&[f64]> {
        match self {
            ParameterValue::Scalar(_) => None,
            ParameterValue::Vector(v) => Some(v),
        }
    }

    pub fn is_vector(&self) -> bool {
        matches!(self, ParameterValue::Vector(_))
    }

    /// Number of elements (1 for a scalar).
    pub fn len(&self) -> usize {
        match self {
            ParameterValue::Scalar(_) => 1,
            ParameterValue::Vector(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate over the elements, a scalar yielding a single item.
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        let values: &[f64] = match self {
            ParameterValue::Scalar(v) => std::slice::from_ref(v),
            ParameterValue::Vector(v) => v,
        };
        values.iter().copied()
    }

    /// Element used as a bound for position `i`.
    ///
    /// A scalar bound applies to every position.
    pub(crate) fn bound_at(&self, i: usize) -> Option<f64> {
        match self {
            ParameterValue::Scalar(v) => Some(*v),
            ParameterValue::Vector(v) => v.get(i).copied(),
        }
    }
}

impl From<f64> for ParameterValue {
    fn from(value: f64) -> Self {
        ParameterValue::Scalar(value)
    }
}

impl From<Vec<f64>> for ParameterValue {
    fn from(value: Vec<f64>) -> Self {
        ParameterValue::Vector(value)
    }
}

impl From<&[f64]> for ParameterValue {
    fn from(value: &[f64]) -> Self {
        ParameterValue::Vector(value.to_vec())
    }
}

impl<const N: usize> From<[f64; N]> for ParameterValue {
    fn from(value: [f64; N]) -> Self {
        ParameterValue::Vector(value.to_vec())
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::Scalar(v) => write!(f, "{}", v),
            ParameterValue::Vector(v) => {
                write!(f, "[")?;
                for (i, x) in v.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", x)?;
                }
                write!(f, "]")
            }
        }
    }
}
