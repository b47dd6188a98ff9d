//! Reload machinery: reconciliation passes and their scheduling

pub mod reconciler;
pub mod scheduler;

pub use reconciler::{AppenderReconciler, PassSummary};
pub use scheduler::{ReloadMode, ReloadPass, ReloadScheduler, SchedulerState, DEFAULT_SHUTDOWN_TIMEOUT};
