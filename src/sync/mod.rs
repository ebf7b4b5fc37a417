//! Sync execution: rsync command building, snapshot strategies,
//! dependency ordering, and the per-run orchestrator.

pub mod btrfs;
pub mod hardlinks;
pub mod ordering;
pub mod rsync;
pub mod runner;
pub mod snapshot;

pub use rsync::{build_rsync_command, BuildOptions, ProgressMode, DEFAULT_RSYNC_OPTIONS};
pub use runner::{
    prune_all_syncs, run_all_syncs, NullObserver, OutcomeStatus, PruneOutcome, RunObserver,
    RunOptions, SyncOutcome,
};
pub use snapshot::{
    strategy_for, PruneReport, PruneWarning, SnapshotContext, SnapshotStrategy, TransferTarget,
};
