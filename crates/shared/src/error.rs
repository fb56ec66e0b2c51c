use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification tag a unit of work attaches to its failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Malformed or rejected domain input discovered mid-operation.
    ClientFault,
    /// The durable-write step failed.
    PersistenceFault,
    Unclassified,
}

impl FailureKind {
    pub fn status_code(self) -> u16 {
        match self {
            FailureKind::ClientFault => 400,
            FailureKind::PersistenceFault | FailureKind::Unclassified => 500,
        }
    }
}

#[derive(Debug, Error)]
pub enum WorkError {
    #[error("client fault: {0}")]
    ClientFault(anyhow::Error),
    #[error("persistence fault: {0}")]
    PersistenceFault(anyhow::Error),
    #[error(transparent)]
    Unclassified(#[from] anyhow::Error),
}

impl WorkError {
    pub fn client(message: impl Into<String>) -> Self {
        Self::ClientFault(anyhow::Error::msg(message.into()))
    }

    pub fn persistence(error: impl Into<anyhow::Error>) -> Self {
        Self::PersistenceFault(error.into())
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            WorkError::ClientFault(_) => FailureKind::ClientFault,
            WorkError::PersistenceFault(_) => FailureKind::PersistenceFault,
            WorkError::Unclassified(_) => FailureKind::Unclassified,
        }
    }

    pub fn cause(&self) -> &anyhow::Error {
        match self {
            WorkError::ClientFault(error)
            | WorkError::PersistenceFault(error)
            | WorkError::Unclassified(error) => error,
        }
    }

    /// Message of the innermost cause, or of the failure itself when it wraps
    /// nothing.
    pub fn innermost_message(&self) -> String {
        self.cause().root_cause().to_string()
    }

    /// Full cause chain (and backtrace, when captured) for the envelope's
    /// `result` on server-side failures.
    pub fn diagnostic(&self) -> String {
        format!("{:?}", self.cause())
    }
}

impl From<serde_json::Error> for WorkError {
    fn from(error: serde_json::Error) -> Self {
        Self::Unclassified(error.into())
    }
}

/// Tags the error side of a collaborator result with a [`FailureKind`].
pub trait ClassifyFailure<T> {
    fn client_fault(self) -> Result<T, WorkError>;
    fn persistence_fault(self) -> Result<T, WorkError>;
}

impl<T, E> ClassifyFailure<T> for Result<T, E>
where
    E: Into<anyhow::Error>,
{
    fn client_fault(self) -> Result<T, WorkError> {
        self.map_err(|error| WorkError::ClientFault(error.into()))
    }

    fn persistence_fault(self) -> Result<T, WorkError> {
        self.map_err(|error| WorkError::PersistenceFault(error.into()))
    }
}
