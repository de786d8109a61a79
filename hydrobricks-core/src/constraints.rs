//! Relational constraints between parameters.
//!
//! A constraint compares the current values of two scalar parameters
//! (e.g. `k_slow_1 <= k_slow_2`). Constraints never change values; they only report
//! whether the values currently held by a [`ValueSource`] satisfy them. Parameters are
//! referenced by name and resolved at evaluation time, so the constraint list is
//! independent of the registry internals.

use crate::errors::{HBError, HBResult};
use crate::parameters::ParameterValue;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Anything able to provide the current value of a parameter by name.
pub trait ValueSource {
    /// Current value of `key`.
    ///
    /// Returns `Ok(None)` if the parameter exists but is unset, and an
    /// [`HBError::NotFound`] error if the key is unknown.
    fn lookup(&self, key: &str) -> HBResult<Option<&ParameterValue>>;
}

impl ValueSource for HashMap<String, ParameterValue> {
    fn lookup(&self, key: &str) -> HBResult<Option<&ParameterValue>> {
        self.get(key)
            .map(Some)
            .ok_or_else(|| HBError::NotFound(key.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComparisonOperator {
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
}

impl ComparisonOperator {
    /// Whether `lhs <op> rhs` holds.
    pub fn holds(self, lhs: f64, rhs: f64) -> bool {
        match self {
            ComparisonOperator::Greater => lhs > rhs,
            ComparisonOperator::GreaterOrEqual => lhs >= rhs,
            ComparisonOperator::Less => lhs < rhs,
            ComparisonOperator::LessOrEqual => lhs <= rhs,
        }
    }
}

impl FromStr for ComparisonOperator {
    type Err = HBError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            ">" | "gt" => Ok(ComparisonOperator::Greater),
            ">=" | "ge" => Ok(ComparisonOperator::GreaterOrEqual),
            "<" | "lt" => Ok(ComparisonOperator::Less),
            "<=" | "le" => Ok(ComparisonOperator::LessOrEqual),
            other => Err(HBError::UnknownOperator(other.to_string())),
        }
    }
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComparisonOperator::Greater => write!(f, ">"),
            ComparisonOperator::GreaterOrEqual => write!(f, ">="),
            ComparisonOperator::Less => write!(f, "<"),
            ComparisonOperator::LessOrEqual => write!(f, "<="),
        }
    }
}

/// A constraint `parameter_1 <operator> parameter_2`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    pub parameter_1: String,
    pub operator: ComparisonOperator,
    pub parameter_2: String,
}

impl Constraint {
    pub fn is_satisfied<S: ValueSource + ?Sized>(&self, source: &S) -> HBResult<bool> {
        let lhs = scalar_operand(source, &self.parameter_1)?;
        let rhs = scalar_operand(source, &self.parameter_2)?;
        Ok(self.operator.holds(lhs, rhs))
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.parameter_1, self.operator, self.parameter_2
        )
    }
}

fn scalar_operand<S: ValueSource + ?Sized>(source: &S, key: &str) -> HBResult<f64> {
    match source.lookup(key)? {
        None => Err(HBError::UnsetValue(key.to_string())),
        Some(ParameterValue::Vector(_)) => Err(HBError::UnsupportedOperand(key.to_string())),
        Some(ParameterValue::Scalar(v)) => Ok(*v),
    }
}

/// Ordered list of constraints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Constraints(Vec<Constraint>);

impl Constraints {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a constraint. The parameters are not resolved until evaluation.
    pub fn add(&mut self, parameter_1: &str, operator: ComparisonOperator, parameter_2: &str) {
        self.0.push(Constraint {
            parameter_1: parameter_1.to_string(),
            operator,
            parameter_2: parameter_2.to_string(),
        });
    }

    /// Whether every constraint holds for the current values.
    ///
    /// Stops at the first violated constraint. Fails if a referenced parameter is
    /// unknown or unset, or holds a vector.
    pub fn all_satisfied<S: ValueSource + ?Sized>(&self, source: &S) -> HBResult<bool> {
        for constraint in &self.0 {
            if !constraint.is_satisfied(source)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Constraint> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
