use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("device not found: {0}")]
    DeviceNotFound(String),

    #[error("patient not found: {0}")]
    PatientNotFound(String),

    #[error("threshold profile not found for patient: {0}")]
    ThresholdProfileNotFound(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("malformed event: {0}")]
    MalformedEvent(String),

    #[error("registry unavailable: {0}")]
    RegistryUnavailable(String),

    #[error("scoring unavailable: {0}")]
    ScoringUnavailable(String),

    #[error("baseline store error: {0}")]
    BaselineStore(String),

    #[error("transport error: {0}")]
    Transport(#[from] anyhow::Error),
}

pub type DomainResult<T> = Result<T, DomainError>;
