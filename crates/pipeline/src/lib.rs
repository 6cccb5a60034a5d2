pub mod config;
pub mod metrics;
pub mod orchestrator;
pub mod store;

pub use config::{LogFormat, PipelineConfig};
pub use metrics::{MetricsSnapshot, StageMetrics, TimedOperation};
pub use orchestrator::{Collaborators, Pipeline, PipelineReport};
pub use store::{JsonlStore, RecordStore, SupabaseStore, init_schema};
