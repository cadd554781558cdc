//! SigLab Runner — caller-side orchestration around the pipeline core.
//!
//! - `pool`: bounded worker pool with submit/collect semantics
//! - `basket`: parallel sub-strategy runs recombined in submission order
//! - `metrics`: performance statistics over the named outputs
//! - `export`: JSON/CSV artifact generation (the "downstream consumer"
//!   of the core's read-only outputs)

pub mod basket;
pub mod export;
pub mod metrics;
pub mod pool;

pub use basket::{run_basket, BasketMember, BasketResult};
pub use export::{export_json, import_json, RunArtifact, SCHEMA_VERSION};
pub use metrics::PerformanceMetrics;
pub use pool::{TaskError, TaskHandle, WorkerPool};
