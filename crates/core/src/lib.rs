pub mod config;
pub mod domain;
pub mod errors;
pub mod policy;
pub mod trace;

pub use config::{AppConfig, ConfigError, EngineKind, LoadOptions, LogFormat, OrdersMode};
pub use domain::{Intent, OrderContext, PolicyDecision, PolicyReason, Reply, ToolResult, ToolStatus};
pub use errors::ValidationError;
pub use policy::{
    BlackoutInterval, CancellationPolicy, InMemoryQuotaStore, PolicyConfig, PolicyRule, QuotaStore,
};
pub use trace::{DecisionTrace, InMemoryTraceSink, StageName, StageRecord, TraceSink, TracingTraceSink};
