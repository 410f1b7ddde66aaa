use schema_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    /// Persistence failed. In-memory state is unaffected.
    #[error("schema store ({backend}) failed: {source}")]
    Store {
        backend: String,
        #[source]
        source: StoreError,
    },
}

pub type RegistryResult<T> = std::result::Result<T, RegistryError>;
