use crate::Error;
use thiserror::Error as ThisError;

/// Failures raised by the core itself rather than by the backend.
#[derive(Debug, ThisError)]
pub enum Failure {
    /// Invalid or inconsistent options. Raised before anything is sent to the driver.
    #[error("Invalid configuration: {0}")]
    Configuration(String),
    /// The driver does not implement the requested feature. Statement creation
    /// falls back on these, see [`ReturnKeys::fallbacks`](crate::ReturnKeys::fallbacks).
    #[error("Feature not supported by the driver: {0}")]
    Unsupported(String),
    /// The API was used in a way that cannot work, like binding parameters to an
    /// ad hoc statement or reading a cursor that is not positioned on a row.
    #[error("Misuse: {0}")]
    Misuse(String),
}

impl Failure {
    pub fn configuration(message: impl Into<String>) -> Error {
        Failure::Configuration(message.into()).into()
    }
    pub fn unsupported(message: impl Into<String>) -> Error {
        Failure::Unsupported(message.into()).into()
    }
    pub fn misuse(message: impl Into<String>) -> Error {
        Failure::Misuse(message.into()).into()
    }
}

/// A rollback that failed while handling another failure. Carries both.
#[derive(Debug, ThisError)]
#[error("{original:#} (the rollback failed as well: {rollback:#})")]
pub struct RollbackFailure {
    pub original: Error,
    pub rollback: Error,
}

pub fn is_unsupported(error: &Error) -> bool {
    matches!(error.downcast_ref::<Failure>(), Some(Failure::Unsupported(..)))
}

pub fn is_configuration(error: &Error) -> bool {
    matches!(error.downcast_ref::<Failure>(), Some(Failure::Configuration(..)))
}

pub fn is_misuse(error: &Error) -> bool {
    matches!(error.downcast_ref::<Failure>(), Some(Failure::Misuse(..)))
}
