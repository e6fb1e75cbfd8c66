//! Debounced background analysis for script debugger front ends.
//!
//! File events are coalesced by a [`BatchCollector`], split per language
//! plugin by the [`AnalysisDispatcher`] and run on a single
//! [`AnalysisWorker`] thread. [`reconcile`] turns fresh results into a
//! minimal edit set against what is currently displayed.

mod batch;
mod clock;
mod config;
mod dispatch;
mod entry;
mod error;
mod events;
mod file;
mod function;
mod reconcile;
mod service;
mod timer;
mod worker;

pub use batch::{default_flush_threshold, BatchCollector, DEFAULT_TICK_INTERVAL};
pub use clock::{Clock, ManualClock, StdClock, StopSignal};
pub use config::AnalysisSettings;
pub use dispatch::{AnalysisDispatcher, AnalysisRequest, WorkQueue};
pub use entry::{group_by_file, AnalysisEntry, ResultSet, Severity};
pub use error::AnalysisError;
pub use events::{ListenerId, Listeners};
pub use file::{FileHandle, FileId, FileRegistry, MemoryFileRegistry, PluginId};
pub use function::{
    files_analysis_fn, string_analysis_fn, AnalysisOutcome, CancelToken, FilesAnalysisFn,
    StringAnalysisFn, UserData, Verbosity,
};
pub use reconcile::{reconcile, DisplayedRecord, EntryKey, Reconciliation};
pub use service::{AnalysisService, ProjectEvent};
pub use timer::PeriodicTimer;
pub use worker::{
    AnalysisFinished, AnalysisWorker, WorkerOptions, WorkerState, DEFAULT_POLL_INTERVAL,
    DEFAULT_STOP_TIMEOUT,
};
