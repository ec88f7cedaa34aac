//! Sequences the nine stages, owns run state and publishes progress.
//!
//! # Example
//!
//! ```rust,ignore
//! use risk_processing::{Orchestrator, PipelineConfig};
//!
//! let orchestrator = Orchestrator::builder()
//!     .config(PipelineConfig::builder().input_path("data/students.csv").build()?)
//!     .on_event(|event| println!("{event:?}"))
//!     .build()?;
//!
//! let handle = orchestrator.start_run()?;
//! let summary = handle.wait()?;
//! println!("{}/{} checks passed", summary.validation.passed, summary.validation.total);
//! ```

use crate::cleaner::DataCleaner;
use crate::config::{ConfigValidationError, PipelineConfig};
use crate::error::{PipelineError, Result};
use crate::features::FeatureEngineer;
use crate::loader::Loader;
use crate::pipeline::balancer::SmoteBalancer;
use crate::pipeline::outliers::OutlierCapper;
use crate::pipeline::progress::{
    ClosureListener, ListenerSet, PipelineEvent, PipelineStage, ProgressListener, ProgressRecord,
    RunState, StepStatus,
};
use crate::pipeline::scaler::MinMaxScaler;
use crate::pipeline::splitter::StratifiedSplitter;
use crate::quality::Validator;
use crate::reporting::{ArtifactBundle, ArtifactWriter, PLOT_NAMES, PlotInput, summary_statistics};
use crate::types::ResultsSummary;
use chrono::Local;
use parking_lot::{Mutex, RwLock};
use std::fs;
use std::io::ErrorKind;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{error, info, warn};

/// Owns the run state of one pipeline instance.
///
/// At most one run is active at a time; a second request while running is
/// rejected with [`PipelineError::AlreadyRunning`]. Cloning shares the same
/// state.
#[derive(Clone)]
pub struct Orchestrator {
    shared: Arc<Shared>,
}

struct Shared {
    config: PipelineConfig,
    listeners: Vec<Arc<dyn ProgressListener>>,
    status: RwLock<ProgressRecord>,
    results: RwLock<Option<Arc<ResultsSummary>>>,
    writer: Mutex<ArtifactWriter>,
}

static_assertions::assert_impl_all!(Orchestrator: Send, Sync);
static_assertions::assert_impl_all!(RunHandle: Send);

impl Orchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::default()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.shared.config
    }

    /// Begin a run on a background thread and return immediately.
    pub fn start_run(&self) -> Result<RunHandle> {
        self.shared.try_begin()?;

        let runner = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name("risk-pipeline".to_string())
            .spawn(move || runner.execute());

        match spawned {
            Ok(handle) => Ok(RunHandle { handle }),
            Err(e) => {
                let message = format!("could not spawn pipeline thread: {}", e);
                self.shared.status.write().fail(message.clone());
                Err(PipelineError::Internal(message))
            }
        }
    }

    /// Run on the calling thread.
    pub fn run_blocking(&self) -> Result<Arc<ResultsSummary>> {
        self.shared.try_begin()?;
        self.shared.execute()
    }

    /// State and step history of the active or last run.
    pub fn get_status(&self) -> ProgressRecord {
        self.shared.status.read().clone()
    }

    pub fn is_running(&self) -> bool {
        self.shared.status.read().state == RunState::Running
    }

    /// Summary of the last completed run.
    pub fn get_results(&self) -> Result<Arc<ResultsSummary>> {
        self.shared
            .results
            .read()
            .clone()
            .ok_or(PipelineError::NoResults)
    }

    /// SVG bytes of a rendered plot, by name without extension.
    pub fn get_plot(&self, name: &str) -> Result<Vec<u8>> {
        if !PLOT_NAMES.contains(&name) {
            return Err(PipelineError::NotFound(format!("unknown plot '{}'", name)));
        }
        let writer = self.shared.writer.lock();
        let path = writer
            .output_dir()
            .join("plots")
            .join(format!("{}.svg", name));
        fs::read(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => {
                PipelineError::NotFound(format!("plot '{}' has not been rendered", name))
            }
            _ => PipelineError::Io(e),
        })
    }
}

/// Handle to a run started with [`Orchestrator::start_run`].
pub struct RunHandle {
    handle: JoinHandle<Result<Arc<ResultsSummary>>>,
}

impl RunHandle {
    /// Block until the run finishes and return its outcome.
    pub fn wait(self) -> Result<Arc<ResultsSummary>> {
        self.handle
            .join()
            .map_err(|_| PipelineError::Internal("pipeline thread panicked".to_string()))?
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Shared {
    /// Atomically move to `Running` unless a run is already active.
    fn try_begin(&self) -> Result<()> {
        let mut status = self.status.write();
        if status.state == RunState::Running {
            warn!("Rejected run request: pipeline is already running");
            return Err(PipelineError::AlreadyRunning);
        }
        status.begin();
        Ok(())
    }

    fn execute(&self) -> Result<Arc<ResultsSummary>> {
        let _terminal = TerminalGuard {
            status: &self.status,
        };
        let mut listeners = ListenerSet::new(self.listeners.clone());
        let started_at = self
            .status
            .read()
            .started_at
            .clone()
            .unwrap_or_else(|| Local::now().to_rfc3339());
        info!("Starting risk preprocessing run ({})", started_at);
        listeners.publish(&PipelineEvent::Started { started_at });

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.run_stages(&mut listeners)))
            .unwrap_or_else(|_| Err(PipelineError::Internal("pipeline stage panicked".to_string())));

        match outcome {
            Ok(summary) => {
                let summary = Arc::new(summary);
                *self.results.write() = Some(Arc::clone(&summary));
                self.status.write().complete();

                if !summary.validation.all_passed() {
                    warn!(
                        "Run complete with {} failed validation checks",
                        summary.validation.total - summary.validation.passed
                    );
                }
                info!(
                    "Run complete in {}ms: {}/{} validation checks passed",
                    summary.duration_ms, summary.validation.passed, summary.validation.total
                );
                listeners.publish(&PipelineEvent::Complete {
                    validation_passed: summary.validation.passed,
                    validation_total: summary.validation.total,
                });
                Ok(summary)
            }
            Err(e) => {
                error!("Pipeline error: {}", e);
                self.status.write().fail(e.to_string());
                listeners.publish(&PipelineEvent::Failed {
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    fn transition(
        &self,
        listeners: &mut ListenerSet,
        stage: PipelineStage,
        status: StepStatus,
        detail: String,
    ) {
        self.status.write().push(stage, status, detail.clone());
        listeners.publish(&PipelineEvent::progress(stage, status, detail));
    }

    /// Run one stage between an entry and an exit (or failure) update.
    fn stage<T>(
        &self,
        listeners: &mut ListenerSet,
        stage: PipelineStage,
        work: impl FnOnce() -> Result<T>,
        describe: impl FnOnce(&T) -> String,
    ) -> Result<T> {
        info!(
            "[{}/{}] {}...",
            stage.step(),
            PipelineStage::ALL.len(),
            stage.display_name()
        );
        self.transition(
            listeners,
            stage,
            StepStatus::Active,
            stage.entry_detail().to_string(),
        );

        match work() {
            Ok(value) => {
                let detail = describe(&value);
                info!("{}: {}", stage.display_name(), detail);
                self.transition(listeners, stage, StepStatus::Complete, detail);
                Ok(value)
            }
            Err(e) => {
                self.transition(listeners, stage, StepStatus::Failed, e.to_string());
                Err(e)
            }
        }
    }

    fn run_stages(&self, listeners: &mut ListenerSet) -> Result<ResultsSummary> {
        let started = Instant::now();
        let cfg = &self.config;

        let (raw, load) = self.stage(
            listeners,
            PipelineStage::Load,
            || Loader::load(&cfg.input_path),
            |(_, report)| report.to_string(),
        )?;

        let cleaned = self.stage(
            listeners,
            PipelineStage::Clean,
            || DataCleaner::clean(&raw),
            |c| c.report.summary(),
        )?;
        drop(raw);

        let mut engineered = self.stage(
            listeners,
            PipelineStage::Engineer,
            || FeatureEngineer::engineer(&cleaned.records),
            |e| {
                format!(
                    "{} features ({} derived) for {} rows",
                    e.dataset.schema.len(),
                    e.engineered_names().len(),
                    e.dataset.len()
                )
            },
        )?;
        let statistics = summary_statistics(&engineered.dataset);
        let full = engineered.dataset.class_distribution();

        let outliers = self.stage(
            listeners,
            PipelineStage::CapOutliers,
            || {
                OutlierCapper::new(cfg.lower_percentile, cfg.upper_percentile)
                    .cap(&mut engineered.dataset)
            },
            |r| {
                format!(
                    "{} values capped across {} continuous features",
                    r.total_capped(),
                    r.capped.len()
                )
            },
        )?;

        let mut splits = self.stage(
            listeners,
            PipelineStage::Split,
            || {
                StratifiedSplitter::new(cfg.val_ratio, cfg.test_ratio, cfg.stratify_tolerance, cfg.seed)
                    .split(&engineered.dataset)
            },
            |s| {
                let sizes = s.sizes();
                format!("train {}, val {}, test {}", sizes.train, sizes.val, sizes.test)
            },
        )?;

        let params = self.stage(
            listeners,
            PipelineStage::Scale,
            || MinMaxScaler::fit_transform(&mut splits),
            |p| {
                format!(
                    "{} continuous features scaled, {} zero-variance",
                    p.features.len(),
                    p.zero_variance().len()
                )
            },
        )?;

        let balance = self.stage(
            listeners,
            PipelineStage::Balance,
            || SmoteBalancer::new(cfg.smote_k, cfg.balance_ratio, cfg.seed).balance(&mut splits.train.dataset),
            |b| {
                format!(
                    "{} synthetic rows; train now {} positive / {} negative",
                    b.synthesized, b.after.positive, b.after.negative
                )
            },
        )?;

        let mut validation = self.stage(
            listeners,
            PipelineStage::Validate,
            || Ok(Validator::new(cfg.stratify_tolerance, cfg.balance_ratio).validate(&splits, &params, full)),
            |v| format!("{}/{} checks passed", v.passed, v.total),
        )?;

        self.stage(
            listeners,
            PipelineStage::WriteArtifacts,
            || {
                let writer = self.writer.lock();
                let plots = cfg.generate_plots.then(|| PlotInput {
                    dataset: &engineered.dataset,
                    full,
                    before_balancing: balance.before,
                    after_balancing: balance.after,
                });
                let staged = writer.stage(&ArtifactBundle {
                    splits: [&splits.train, &splits.val, &splits.test],
                    scaling: &params,
                    cleaning: &cleaned.report,
                    summary_statistics: &statistics,
                    plots,
                })?;
                Validator::check_artifacts(&mut validation, staged.root(), staged.plot_files());

                let summary = ResultsSummary {
                    completed_at: Local::now().to_rfc3339(),
                    duration_ms: started.elapsed().as_millis() as u64,
                    seed: cfg.seed,
                    raw_rows: load.rows,
                    raw_columns: load.columns,
                    clean_rows: cleaned.report.rows_after,
                    dropped_rows: cleaned.report.dropped_rows(),
                    duplicates_removed: cleaned.report.duplicates_removed,
                    feature_count: splits.train.dataset.schema.len(),
                    feature_names: splits
                        .train
                        .dataset
                        .schema
                        .names()
                        .into_iter()
                        .map(str::to_string)
                        .collect(),
                    engineered_features: engineered.engineered_names(),
                    split_sizes: splits.sizes(),
                    class_distribution_full: full,
                    class_distribution_before_balancing: balance.before,
                    class_distribution_after_balancing: balance.after,
                    missing_values: cleaned.report.missing_values.clone(),
                    imputed_values: cleaned.report.imputed_values.clone(),
                    outliers_capped: outliers.capped.clone(),
                    zero_variance_features: params.zero_variance(),
                    validation: validation.clone(),
                    plots: staged
                        .plot_files()
                        .iter()
                        .filter_map(|p| Path::new(p).file_stem())
                        .map(|s| s.to_string_lossy().into_owned())
                        .collect(),
                    output_dir: writer.output_dir().to_path_buf(),
                };
                staged.commit(&summary)?;
                Ok(summary)
            },
            |s| format!("Splits and {} plots written to {}", s.plots.len(), s.output_dir.display()),
        )
    }
}

/// Marks the run failed if `execute` unwinds before reaching a terminal state.
struct TerminalGuard<'a> {
    status: &'a RwLock<ProgressRecord>,
}

impl Drop for TerminalGuard<'_> {
    fn drop(&mut self) {
        let mut status = self.status.write();
        if status.state == RunState::Running {
            error!("Run ended without a terminal state; marking it failed");
            status.fail("run ended without reaching a terminal state");
        }
    }
}

/// Builder for [`Orchestrator`].
#[derive(Default)]
pub struct OrchestratorBuilder {
    config: Option<PipelineConfig>,
    listeners: Vec<Arc<dyn ProgressListener>>,
}

static_assertions::assert_impl_all!(OrchestratorBuilder: Send);

impl OrchestratorBuilder {
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Attach a listener; may be called more than once.
    pub fn listener(mut self, listener: Arc<dyn ProgressListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Attach a closure listener.
    pub fn on_event<F>(self, callback: F) -> Self
    where
        F: Fn(&PipelineEvent) + Send + Sync + 'static,
    {
        self.listener(Arc::new(ClosureListener::new(callback)))
    }

    /// Build the orchestrator.
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> std::result::Result<Orchestrator, ConfigValidationError> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let writer = ArtifactWriter::new(config.output_dir.clone());
        Ok(Orchestrator {
            shared: Arc::new(Shared {
                config,
                listeners: self.listeners,
                status: RwLock::new(ProgressRecord::default()),
                results: RwLock::new(None),
                writer: Mutex::new(writer),
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn missing_input(dir: &Path) -> PipelineConfig {
        PipelineConfig::builder()
            .input_path(dir.join("absent.csv"))
            .output_dir(dir.join("out"))
            .build()
            .unwrap()
    }

    #[test]
    fn test_new_orchestrator_is_idle_without_results() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = Orchestrator::builder()
            .config(missing_input(dir.path()))
            .build()
            .unwrap();

        assert_eq!(orchestrator.get_status().state, RunState::Idle);
        assert!(matches!(orchestrator.get_results(), Err(PipelineError::NoResults)));
        assert!(matches!(
            orchestrator.get_plot("class_distribution"),
            Err(PipelineError::NotFound(_))
        ));
        assert!(matches!(
            orchestrator.get_plot("../secrets"),
            Err(PipelineError::NotFound(_))
        ));
    }

    #[test]
    fn test_failed_run_records_error_and_events() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, rx) = mpsc::channel();
        let orchestrator = Orchestrator::builder()
            .config(missing_input(dir.path()))
            .listener(Arc::new(crate::pipeline::progress::ChannelListener::new(tx)))
            .build()
            .unwrap();

        let err = orchestrator.start_run().unwrap().wait().unwrap_err();
        assert_eq!(err.error_code(), "INGEST_ERROR");

        let status = orchestrator.get_status();
        assert_eq!(status.state, RunState::Failed);
        assert!(status.error.is_some());
        assert_eq!(status.entries.len(), 2);
        assert_eq!(status.entries[1].status, StepStatus::Failed);
        assert!(matches!(orchestrator.get_results(), Err(PipelineError::NoResults)));

        let events: Vec<PipelineEvent> = rx.try_iter().collect();
        assert!(matches!(events.first(), Some(PipelineEvent::Started { .. })));
        assert!(matches!(events.last(), Some(PipelineEvent::Failed { .. })));
        assert!(!dir.path().join("out").join("data").exists());
    }

    #[test]
    fn test_second_run_rejected_while_running() {
        let dir = tempfile::tempdir().unwrap();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let (started_tx, started_rx) = mpsc::channel::<()>();
        let release_rx = Mutex::new(release_rx);
        let started_tx = Mutex::new(started_tx);

        // Holds the run inside its first event until released.
        let orchestrator = Orchestrator::builder()
            .config(missing_input(dir.path()))
            .on_event(move |event| {
                if matches!(event, PipelineEvent::Started { .. }) {
                    let _ = started_tx.lock().send(());
                    let _ = release_rx.lock().recv();
                }
            })
            .build()
            .unwrap();

        let handle = orchestrator.start_run().unwrap();
        started_rx.recv().unwrap();

        let before = orchestrator.get_status();
        assert!(matches!(orchestrator.start_run(), Err(PipelineError::AlreadyRunning)));
        assert!(matches!(orchestrator.run_blocking(), Err(PipelineError::AlreadyRunning)));
        assert_eq!(orchestrator.get_status(), before);
        assert!(orchestrator.is_running());

        release_tx.send(()).unwrap();
        assert!(handle.wait().is_err());
        assert_eq!(orchestrator.get_status().state, RunState::Failed);

        // A terminal run can be restarted directly.
        release_tx.send(()).unwrap();
        assert!(orchestrator.run_blocking().is_err());
    }

    #[test]
    fn test_panicking_listener_cannot_leave_run_stuck() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, rx) = mpsc::channel();
        let orchestrator = Orchestrator::builder()
            .config(missing_input(dir.path()))
            .on_event(|event| {
                if matches!(event, PipelineEvent::Started { .. }) {
                    panic!("listener bug");
                }
            })
            .listener(Arc::new(crate::pipeline::progress::ChannelListener::new(tx)))
            .build()
            .unwrap();

        let err = orchestrator.start_run().unwrap().wait().unwrap_err();
        assert_eq!(err.error_code(), "INGEST_ERROR");
        assert_eq!(orchestrator.get_status().state, RunState::Failed);
        assert!(matches!(rx.try_iter().last(), Some(PipelineEvent::Failed { .. })));

        // The next run is accepted rather than rejected as already running.
        let err = orchestrator.run_blocking().unwrap_err();
        assert_eq!(err.error_code(), "INGEST_ERROR");
    }

    #[test]
    fn test_terminal_guard_fails_an_unfinished_run() {
        let status = RwLock::new(ProgressRecord::default());
        status.write().begin();
        drop(TerminalGuard { status: &status });

        let record = status.read();
        assert_eq!(record.state, RunState::Failed);
        assert!(record.error.is_some());
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let mut config = PipelineConfig::default();
        config.smote_k = 0;
        assert!(Orchestrator::builder().config(config).build().is_err());
    }
}
