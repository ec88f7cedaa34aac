//! Run state, step history and progress events for the pipeline.
//!
//! The orchestrator owns one [`ProgressRecord`] per run and publishes a
//! [`PipelineEvent`] for every state change to zero or more listeners.
//! Transports (push channels, polling endpoints) are adapters implementing
//! [`ProgressListener`]; two are provided here.
//!
//! # Example
//!
//! ```rust,ignore
//! use risk_processing::{Orchestrator, PipelineEvent};
//!
//! let orchestrator = Orchestrator::builder()
//!     .on_event(|event| {
//!         if let PipelineEvent::Progress { label, detail, .. } = event {
//!             println!("{label}: {detail}");
//!         }
//!     })
//!     .build()?;
//! ```

use chrono::Local;
use serde::{Deserialize, Serialize};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use thiserror::Error;
use tracing::warn;

/// The nine transformation stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Load,
    Clean,
    Engineer,
    CapOutliers,
    Split,
    Scale,
    Balance,
    Validate,
    WriteArtifacts,
}

impl PipelineStage {
    pub const ALL: [PipelineStage; 9] = [
        Self::Load,
        Self::Clean,
        Self::Engineer,
        Self::CapOutliers,
        Self::Split,
        Self::Scale,
        Self::Balance,
        Self::Validate,
        Self::WriteArtifacts,
    ];

    /// 1-based position in the run.
    pub fn step(&self) -> usize {
        Self::ALL.iter().position(|s| s == self).map_or(0, |i| i + 1)
    }

    /// Returns a human-readable name for the stage.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Load => "Loading Data",
            Self::Clean => "Cleaning Data",
            Self::Engineer => "Engineering Features",
            Self::CapOutliers => "Capping Outliers",
            Self::Split => "Splitting Data",
            Self::Scale => "Scaling Features",
            Self::Balance => "Balancing Classes",
            Self::Validate => "Validating Splits",
            Self::WriteArtifacts => "Writing Artifacts",
        }
    }

    /// Detail text published when the stage starts.
    pub fn entry_detail(&self) -> &'static str {
        match self {
            Self::Load => "Reading raw student records",
            Self::Clean => "Imputing missing values and removing invalid or duplicate rows",
            Self::Engineer => "Deriving engagement, decline and withdrawal features",
            Self::CapOutliers => "Winsorizing continuous features to percentile bounds",
            Self::Split => "Stratified train/validation/test split",
            Self::Scale => "Fitting min-max scaling on the training split",
            Self::Balance => "Synthesizing minority rows in the training split",
            Self::Validate => "Running split and feature checks",
            Self::WriteArtifacts => "Writing splits, models, reports and plots",
        }
    }
}

/// Overall state of the orchestrator's current or last run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    #[default]
    Idle,
    Running,
    Complete,
    Failed,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Active,
    Complete,
    Failed,
}

/// One appended line of the step history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEntry {
    pub step: usize,
    pub label: String,
    pub status: StepStatus,
    pub detail: String,
    pub timestamp: String,
}

/// State plus append-only step history of one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub state: RunState,
    pub entries: Vec<ProgressEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<String>,
}

impl ProgressRecord {
    /// Discard the previous run's history and mark a new run as running.
    pub fn begin(&mut self) {
        *self = Self {
            state: RunState::Running,
            started_at: Some(Local::now().to_rfc3339()),
            ..Default::default()
        };
    }

    pub fn push(&mut self, stage: PipelineStage, status: StepStatus, detail: impl Into<String>) {
        self.entries.push(ProgressEntry {
            step: stage.step(),
            label: stage.display_name().to_string(),
            status,
            detail: detail.into(),
            timestamp: Local::now().to_rfc3339(),
        });
    }

    pub fn complete(&mut self) {
        self.state = RunState::Complete;
        self.finished_at = Some(Local::now().to_rfc3339());
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.state = RunState::Failed;
        self.error = Some(message.into());
        self.finished_at = Some(Local::now().to_rfc3339());
    }

    /// Latest status of each stage; stages not reached yet are `Pending`.
    pub fn step_statuses(&self) -> Vec<(PipelineStage, StepStatus)> {
        PipelineStage::ALL
            .iter()
            .map(|stage| {
                let status = self
                    .entries
                    .iter()
                    .rev()
                    .find(|e| e.step == stage.step())
                    .map_or(StepStatus::Pending, |e| e.status);
                (*stage, status)
            })
            .collect()
    }

    pub fn last_entry(&self) -> Option<&ProgressEntry> {
        self.entries.last()
    }
}

/// Typed events published to listeners, in step order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
    Started {
        started_at: String,
    },
    Progress {
        step: usize,
        label: String,
        status: StepStatus,
        detail: String,
    },
    Complete {
        validation_passed: usize,
        validation_total: usize,
    },
    Failed {
        error: String,
    },
}

impl PipelineEvent {
    pub fn progress(stage: PipelineStage, status: StepStatus, detail: impl Into<String>) -> Self {
        Self::Progress {
            step: stage.step(),
            label: stage.display_name().to_string(),
            status,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ListenerError {
    /// The receiving side has gone away; stop delivering to this listener.
    #[error("listener disconnected")]
    Disconnected,
}

/// Receiver of pipeline events.
///
/// Implementations must be `Send + Sync` since runs execute on a background
/// thread. Delivery is best-effort: returning `Disconnected` removes the
/// listener for the rest of the run without affecting the run itself.
pub trait ProgressListener: Send + Sync {
    fn on_event(&self, event: &PipelineEvent) -> Result<(), ListenerError>;
}

/// Wrapper that implements [`ProgressListener`] using a closure.
pub struct ClosureListener<F>
where
    F: Fn(&PipelineEvent) + Send + Sync,
{
    callback: F,
}

impl<F> ClosureListener<F>
where
    F: Fn(&PipelineEvent) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressListener for ClosureListener<F>
where
    F: Fn(&PipelineEvent) + Send + Sync,
{
    fn on_event(&self, event: &PipelineEvent) -> Result<(), ListenerError> {
        (self.callback)(event);
        Ok(())
    }
}

/// Forwards events into an `mpsc` channel.
///
/// Dropping the receiver disconnects the listener.
pub struct ChannelListener {
    sender: Sender<PipelineEvent>,
}

impl ChannelListener {
    pub fn new(sender: Sender<PipelineEvent>) -> Self {
        Self { sender }
    }

    /// Create a listener together with the receiving end of its channel.
    pub fn channel() -> (Self, Receiver<PipelineEvent>) {
        let (tx, rx) = mpsc::channel();
        (Self::new(tx), rx)
    }
}

impl ProgressListener for ChannelListener {
    fn on_event(&self, event: &PipelineEvent) -> Result<(), ListenerError> {
        self.sender
            .send(event.clone())
            .map_err(|_| ListenerError::Disconnected)
    }
}

/// The listeners attached to one run.
///
/// A listener that disconnects or panics is removed on first failure and
/// never affects the run itself.
pub(crate) struct ListenerSet {
    listeners: Vec<Arc<dyn ProgressListener>>,
}

impl ListenerSet {
    pub(crate) fn new(listeners: Vec<Arc<dyn ProgressListener>>) -> Self {
        Self { listeners }
    }

    pub(crate) fn publish(&mut self, event: &PipelineEvent) {
        self.listeners.retain(|listener| {
            match panic::catch_unwind(AssertUnwindSafe(|| listener.on_event(event))) {
                Ok(Ok(())) => true,
                Ok(Err(err)) => {
                    warn!("Dropping progress listener: {}", err);
                    false
                }
                Err(_) => {
                    warn!("Dropping progress listener: panicked while handling an event");
                    false
                }
            }
        });
    }

    pub(crate) fn len(&self) -> usize {
        self.listeners.len()
    }
}

static_assertions::assert_impl_all!(ProgressRecord: Send, Sync);
static_assertions::assert_impl_all!(PipelineEvent: Send, Sync);
static_assertions::assert_impl_all!(ChannelListener: Send, Sync);
