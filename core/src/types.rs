use crate::{
    deagg::DeaggregationError,
    record::{AggregationError, ValidationError},
    wire::WireError,
};

/// Crate-level error covering every layer.
/// - `From<T>` impls let callers mixing aggregation and deaggregation use `?` once.
/// - Layer errors stay available for matching through the variants.
#[derive(Debug)]
pub enum AggError {
    /// Rejected input (partition key, explicit hash key, or data).
    Validation(ValidationError),

    /// Aggregation failure (capacity or configuration).
    Aggregation(AggregationError),

    /// Received blob failed checksum or decoding.
    Deaggregation(DeaggregationError),

    /// Wire-level decode error outside of a deaggregation call.
    Wire(WireError),

    /// Malformed configuration document.
    Config(String),
}

impl std::fmt::Display for AggError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AggError::Validation(e) => write!(f, "validation error: {}", e),
            AggError::Aggregation(e) => write!(f, "aggregation error: {}", e),
            AggError::Deaggregation(e) => write!(f, "deaggregation error: {}", e),
            AggError::Wire(e) => write!(f, "wire error: {}", e),
            AggError::Config(msg) => write!(f, "config error: {}", msg),
        }
    }
}

impl std::error::Error for AggError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AggError::Validation(e) => Some(e),
            AggError::Aggregation(e) => Some(e),
            AggError::Deaggregation(e) => Some(e),
            AggError::Wire(e) => Some(e),
            AggError::Config(_) => None,
        }
    }
}

impl From<ValidationError> for AggError {
    fn from(e: ValidationError) -> Self {
        AggError::Validation(e)
    }
}

impl From<AggregationError> for AggError {
    fn from(e: AggregationError) -> Self {
        match e {
            AggregationError::Validation(v) => AggError::Validation(v),
            other => AggError::Aggregation(other),
        }
    }
}

impl From<DeaggregationError> for AggError {
    fn from(e: DeaggregationError) -> Self {
        AggError::Deaggregation(e)
    }
}

impl From<WireError> for AggError {
    fn from(e: WireError) -> Self {
        AggError::Wire(e)
    }
}

impl From<serde_json::Error> for AggError {
    fn from(e: serde_json::Error) -> Self {
        AggError::Config(e.to_string())
    }
}
