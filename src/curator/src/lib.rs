//! Retention curator for time-partitioned index collections.
//!
//! Operators declare per-family retention rules: a name template with an
//! embedded `%{date-format}` placeholder plus close and delete age
//! thresholds. The engine compiles each rule into a policy (a timestamp
//! format and a name pattern derived together), then periodically classifies
//! every live index name as keep, close, or delete from the age embedded in
//! its name.

pub mod cluster;
pub mod matcher;
pub mod metrics;
pub mod period;
pub mod policy;
pub mod service;
pub mod template;

// Re-export commonly used types
pub use cluster::{ClusterError, ElasticsearchClient, IndexStore};
pub use matcher::{RetentionAction, classify};
pub use metrics::CuratorMetrics;
pub use period::{Period, PeriodError};
pub use policy::{Policy, PolicyError, PolicySet};
pub use service::{CuratorService, CycleResult, SharedPolicySet};
pub use template::{CompiledTemplate, DateFormat, TemplateError, compile};
