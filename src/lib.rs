//! Caravan - backup orchestrator for volumes that come and go
//!
//! Caravan gates each configured sync on marker-file availability
//! checks, builds the right rsync invocation for every local/remote
//! topology, and layers btrfs or hard-link snapshot retention on top.
//! The same decision code renders either as live process execution or
//! as a standalone shell script.

pub mod check;
pub mod config;
pub mod error;
pub mod net;
pub mod output;
pub mod remote;
pub mod scriptgen;
pub mod sync;

// Re-exports for convenience
pub use check::{check_all, check_sync, check_volume, SyncStatus, VolumeStatus};
pub use config::{load_config, Config, Endpoint, SyncConfig, Volume};
pub use error::{CaravanError, CaravanResult};
pub use remote::{resolve_all_endpoints, EndpointFilter, EndpointResolution, NetworkPreference};
pub use scriptgen::{generate_script, ScriptOptions};
pub use sync::{
    prune_all_syncs, run_all_syncs, OutcomeStatus, ProgressMode, RunOptions, SyncOutcome,
};
