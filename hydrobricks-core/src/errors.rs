use crate::model::DriverError;
use thiserror::Error;

/// Error type for invalid parameter, constraint and orchestration operations.
#[derive(Error, Debug)]
pub enum HBError {
    #[error("The alias \"{0}\" already exists. It must be unique.")]
    DuplicateAlias(String),
    #[error("The parameter \"{0}\" is already defined.")]
    DuplicateParameter(String),
    #[error("Inconsistent range: {0}")]
    RangeConsistency(String),
    #[error("The value {value} for the parameter \"{parameter}\" is {side} the {bound} threshold ({threshold}).")]
    RangeViolation {
        parameter: String,
        value: f64,
        side: &'static str,
        bound: &'static str,
        threshold: f64,
    },
    #[error("Shape mismatch for the parameter \"{parameter}\": {reason}")]
    ShapeMismatch { parameter: String, reason: String },
    #[error("The parameter \"{0}\" was not found")]
    NotFound(String),
    #[error("The parameter \"{0}\" has no value")]
    UnsetValue(String),
    #[error("Unknown comparison operator \"{0}\"")]
    UnknownOperator(String),
    #[error("Constraints on vector parameters are not supported (\"{0}\")")]
    UnsupportedOperand(String),
    #[error("The parameter constraints could not be satisfied after {attempts} draws.")]
    ConstraintUnsatisfiable { attempts: usize },
    #[error("Cannot sample the unknown parameter \"{0}\"")]
    UnknownParameter(String),
    #[error("The parameter \"{0}\" needs both a min and a max value to be sampled")]
    RangeUndefined(String),
    #[error("Unknown metric \"{0}\"")]
    UnknownMetric(String),
    #[error("Length mismatch: expected {expected}, got {found}")]
    LengthMismatch { expected: usize, found: usize },
    #[error("{0}")]
    InvalidInput(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("Serialization failed: {0}")]
    Serialization(String),
    #[error(transparent)]
    Model(#[from] DriverError),
}

impl From<serde_json::Error> for HBError {
    fn from(e: serde_json::Error) -> Self {
        HBError::Serialization(e.to_string())
    }
}

impl From<serde_yaml::Error> for HBError {
    fn from(e: serde_yaml::Error) -> Self {
        HBError::Serialization(e.to_string())
    }
}

impl From<toml::ser::Error> for HBError {
    fn from(e: toml::ser::Error) -> Self {
        HBError::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for HBError {
    fn from(e: toml::de::Error) -> Self {
        HBError::Serialization(e.to_string())
    }
}

/// Convenience type for `Result<T, HBError>`.
pub type HBResult<T> = Result<T, HBError>;
