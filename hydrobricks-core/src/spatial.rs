//! Spatial structure of a catchment.
//!
//! The catchment is discretized into hydro units (e.g. elevation/aspect bands) by an
//! external tool. The core never interprets the unit IDs; it only forwards them, with
//! their static attributes, to the simulation engine.

use crate::errors::{HBError, HBResult};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Ordered set of hydro units and their static attributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpatialStructure {
    ids: Vec<i64>,
    /// Attribute name -> one value per unit, e.g. `area` or `elevation`
    attributes: IndexMap<String, Vec<f64>>,
}

impl SpatialStructure {
    /// Create a structure from unit IDs, which must be unique.
    pub fn new(ids: Vec<i64>) -> HBResult<Self> {
        let mut seen = HashSet::with_capacity(ids.len());
        if let Some(duplicate) = ids.iter().find(|id| !seen.insert(**id)) {
            return Err(HBError::InvalidInput(format!(
                "The hydro unit ID {} is not unique",
                duplicate
            )));
        }
        Ok(Self {
            ids,
            attributes: IndexMap::new(),
        })
    }

    /// Attach a static attribute, one value per unit.
    pub fn with_attribute(mut self, name: &str, values: Vec<f64>) -> HBResult<Self> {
        if values.len() != self.ids.len() {
            return Err(HBError::LengthMismatch {
                expected: self.ids.len(),
                found: values.len(),
            });
        }
        self.attributes.insert(name.to_string(), values);
        Ok(self)
    }

    pub fn ids(&self) -> &[i64] {
        &self.ids
    }

    pub fn attribute(&self, name: &str) -> Option<&[f64]> {
        self.attributes.get(name).map(Vec::as_slice)
    }

    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
