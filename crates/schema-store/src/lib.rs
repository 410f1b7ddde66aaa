//! Durable persistence for the schema registry document.
//!
//! A store holds exactly one document: the serialized registry. Writes
//! replace the whole document so a reader never sees a partial state.

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};

mod errors;
mod file_store;
mod mem_store;

pub use errors::{StoreError, StoreResult};
pub use file_store::FileSchemaStore;
pub use mem_store::MemSchemaStore;

/// Schema store trait.
#[async_trait]
pub trait SchemaStore: Send + Sync {
    /// Read the raw document. `None` on cold start.
    async fn read_raw(&self) -> StoreResult<Option<Vec<u8>>>;

    /// Atomically replace the raw document. Once this returns the new
    /// document survives a crash.
    async fn write_raw(&self, bytes: &[u8]) -> StoreResult<()>;

    /// Short backend description for logs.
    fn describe(&self) -> String;
}

/// Extension trait for typed document access.
#[async_trait]
pub trait SchemaStoreExt: SchemaStore {
    /// Read and decode the document.
    async fn read<T>(&self) -> StoreResult<Option<T>>
    where
        T: DeserializeOwned + Send,
    {
        match self.read_raw().await? {
            Some(buf) => Ok(Some(serde_json::from_slice(&buf)?)),
            None => Ok(None),
        }
    }

    /// Encode and store the document.
    async fn write<T>(&self, document: &T) -> StoreResult<()>
    where
        T: Serialize + Sync,
    {
        let buf = serde_json::to_vec_pretty(document)?;
        self.write_raw(&buf).await
    }
}

impl<T: SchemaStore + ?Sized> SchemaStoreExt for T {}
