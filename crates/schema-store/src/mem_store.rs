use super::{SchemaStore, StoreResult};
use async_trait::async_trait;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct MemSchemaStore {
    doc: RwLock<Option<Vec<u8>>>,
}

#[async_trait]
impl SchemaStore for MemSchemaStore {
    async fn read_raw(&self) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.doc.read().await.clone())
    }

    async fn write_raw(&self, bytes: &[u8]) -> StoreResult<()> {
        *self.doc.write().await = Some(bytes.to_vec());
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
