//! Endpoint monitoring: paced probing of configured endpoints, schema
//! change detection through the registry, and the query operations built
//! on top of it.

mod cycle;
mod errors;
mod fetch;
mod monitor;
mod report;
mod tools;

pub use cycle::{MonitoringCycleResult, ProbeKind, ProbeResult};
pub use errors::{FetchError, FetchResult, MonitorError, MonitorResult};
pub use fetch::{FetchRequest, FetchResponse, Fetcher, HttpFetcher};
pub use monitor::EndpointMonitor;
pub use report::{EndpointReport, MonitoringReport, ReportStatus, ReportSummary};
pub use tools::{
    EndpointListing, EndpointStatus, ExploreResult, SchemaChange, SchemaChanges,
    SchemaDetails, SchemaLookup,
};
