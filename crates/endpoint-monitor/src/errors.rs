use schema_registry::RegistryError;
use thiserror::Error;

/// Why an exchange with the upstream API produced no usable response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("connection error: {0}")]
    Connection(String),

    /// 2xx answer whose body is not JSON.
    #[error("response decode error: {0}")]
    Decode(String),
}

pub type FetchResult<T> = std::result::Result<T, FetchError>;

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("invalid http client configuration: {0}")]
    Client(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

pub type MonitorResult<T> = std::result::Result<T, MonitorError>;
