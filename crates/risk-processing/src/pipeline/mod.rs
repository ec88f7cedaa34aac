//! Pipeline module.
//!
//! The transformation stages after feature engineering, plus the
//! orchestrator that sequences every stage and reports progress.

pub mod balancer;
mod orchestrator;
pub mod outliers;
pub mod progress;
pub mod scaler;
pub mod splitter;

pub use balancer::{BalanceReport, SmoteBalancer};
pub use orchestrator::{Orchestrator, OrchestratorBuilder, RunHandle};
pub use outliers::{CapBounds, OutlierCapper, OutlierReport};
pub use progress::{
    ChannelListener, ClosureListener, ListenerError, PipelineEvent, PipelineStage, ProgressEntry,
    ProgressListener, ProgressRecord, RunState, StepStatus,
};
pub use scaler::{FeatureScale, MinMaxScaler, ScalingParams};
pub use splitter::StratifiedSplitter;
