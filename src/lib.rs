//! Reconciles a daily station-level rainfall series and an annual
//! state-level series into one consistent per-state, per-year table.
//!
//! The library holds every stage of the pipeline; the `rainfall-reconcile`
//! binary wraps [`pipeline::run`] with file output and console previews.
pub mod aggregate;
pub mod calibrate;
pub mod config;
pub mod error;
pub mod impute;
pub mod loader;
pub mod merge;
pub mod names;
pub mod output;
pub mod pipeline;
pub mod proxy;
pub mod reports;
pub mod types;
pub mod util;

pub use config::{ImputationStrategy, PipelineConfig};
pub use error::{ReconcileError, Result};
pub use pipeline::{reconcile, run, Reconciliation, RunOutput};
pub use types::{ObservationTable, ReconciledRow, Totals};
