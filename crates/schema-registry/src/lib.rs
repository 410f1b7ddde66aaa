//! Schema registry: durable endpoint id → current schema, fingerprint and
//! bounded fingerprint history.

mod errors;
mod record;
mod registry;

pub use errors::{RegistryError, RegistryResult};
pub use record::{ChangeOutcome, EndpointSchema, HistoryEntry, ProbeStatus};
pub use registry::SchemaRegistry;
