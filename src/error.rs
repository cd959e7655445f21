//! Error types for trip planning.
//!
//! Planning fails only for bad input or an unusable distance lookup.
//! Hours-of-Service breaches are not errors: they are recorded as
//! [`Violation`](crate::models::Violation)s inside an otherwise complete
//! report.

use crate::distance::ProviderError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlanError {
    /// A request field is missing, malformed or out of range.
    #[error("invalid {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },

    /// The distance lookup failed or returned unusable data.
    #[error("distance lookup failed: {0}")]
    Provider(#[from] ProviderError),

    /// The planner hit its iteration bound without finishing the trip.
    #[error("trip could not be scheduled: {0}")]
    Unschedulable(String),

    /// The planning task itself failed, e.g. it panicked.
    #[error("internal error: {0}")]
    Internal(String),
}

impl PlanError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        PlanError::InvalidInput {
            field,
            reason: reason.into(),
        }
    }

    /// True when the caller, rather than the planner or its
    /// collaborators, is at fault.
    pub fn is_client_error(&self) -> bool {
        matches!(self, PlanError::InvalidInput { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_field() {
        let err = PlanError::invalid("currentCycleUsed", "must be between 0 and 70");
        assert_eq!(
            err.to_string(),
            "invalid currentCycleUsed: must be between 0 and 70"
        );
        assert!(err.is_client_error());
    }

    #[test]
    fn test_provider_errors_convert() {
        let err: PlanError = ProviderError::UnknownLocation("Atlantis".into()).into();
        assert!(!err.is_client_error());
        assert!(err.to_string().contains("Atlantis"));
    }
}
