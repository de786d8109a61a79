//! Flat view of the parameters a calibration algorithm may modify.
//!
//! Optimizers work on plain `f64` vectors. A [`CalibrationSpace`] maps the parameters
//! declared with [`ParameterSet::allow_changing`] to such a vector: one dimension per
//! scalar parameter and one per element of a vector parameter (named `key[i]`).

use crate::errors::{HBError, HBResult};
use crate::parameters::{ParameterSet, ParameterValue};
use serde::{Deserialize, Serialize};

/// A single scalar dimension of the calibration space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
    pub name: String,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq)]
struct Block {
    key: String,
    /// `None` for scalar parameters
    length: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationSpace {
    blocks: Vec<Block>,
    dimensions: Vec<Dimension>,
}

impl CalibrationSpace {
    /// Build the space from the parameters allowed to change.
    ///
    /// Every such parameter must have both bounds.
    pub fn from_parameter_set(parameters: &ParameterSet) -> HBResult<Self> {
        let mut blocks = vec![];
        let mut dimensions = vec![];
        for key in parameters.allowed_to_change() {
            let definition = parameters.get_definition(key)?;
            let (min, max) = match (&definition.min, &definition.max) {
                (Some(min), Some(max)) => (min, max),
                _ => return Err(HBError::RangeUndefined(key.clone())),
            };

            if min.is_vector() {
                for (i, (lo, hi)) in min.iter().zip(max.iter()).enumerate() {
                    dimensions.push(Dimension {
                        name: format!("{}[{}]", key, i),
                        min: lo,
                        max: hi,
                    });
                }
                blocks.push(Block {
                    key: key.clone(),
                    length: Some(min.len()),
                });
            } else {
                let (lo, hi) = match (min.as_scalar(), max.as_scalar()) {
                    (Some(lo), Some(hi)) => (lo, hi),
                    _ => return Err(HBError::RangeUndefined(key.clone())),
                };
                // Scalar bounds may still apply to a vector value
                let length = definition
                    .value
                    .as_ref()
                    .filter(|v| v.is_vector())
                    .map(ParameterValue::len);
                match length {
                    Some(length) => dimensions.extend((0..length).map(|i| Dimension {
                        name: format!("{}[{}]", key, i),
                        min: lo,
                        max: hi,
                    })),
                    None => dimensions.push(Dimension {
                        name: key.clone(),
                        min: lo,
                        max: hi,
                    }),
                }
                blocks.push(Block {
                    key: key.clone(),
                    length,
                });
            }
        }
        Ok(Self { blocks, dimensions })
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    pub fn names(&self) -> Vec<&str> {
        self.dimensions.iter().map(|d| d.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.dimensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dimensions.is_empty()
    }

    /// Current values of the parameters, flattened.
    pub fn current(&self, parameters: &ParameterSet) -> HBResult<Vec<f64>> {
        let mut values = Vec::with_capacity(self.len());
        for block in &self.blocks {
            let value = parameters
                .get(&block.key)?
                .ok_or_else(|| HBError::UnsetValue(block.key.clone()))?;
            values.extend(value.iter());
        }
        if values.len() != self.len() {
            return Err(HBError::LengthMismatch {
                expected: self.len(),
                found: values.len(),
            });
        }
        Ok(values)
    }

    /// Write a flat vector back into the parameter set.
    ///
    /// All values are validated against their bounds before any is assigned. Returns
    /// whether the constraints of the parameter set hold for the new values.
    pub fn apply(&self, parameters: &mut ParameterSet, values: &[f64]) -> HBResult<bool> {
        if values.len() != self.len() {
            return Err(HBError::LengthMismatch {
                expected: self.len(),
                found: values.len(),
            });
        }

        let mut remaining = values;
        let mut batch = Vec::with_capacity(self.blocks.len());
        for block in &self.blocks {
            let value = match block.length {
                Some(length) => {
                    let (head, tail) = remaining.split_at(length);
                    remaining = tail;
                    ParameterValue::from(head)
                }
                None => {
                    let (head, tail) = remaining.split_at(1);
                    remaining = tail;
                    ParameterValue::Scalar(head[0])
                }
            };
            batch.push((block.key.as_str(), value));
        }
        parameters.set_values(batch)?;
        parameters.are_constraints_satisfied()
    }
}
