//! Configuration: typed records, discovery, and load-time validation.

mod loader;
mod model;
mod resolve;

pub use loader::{find_config_file, load_config};
pub use model::{
    is_valid_slug, Config, ConfigFile, ConnectionOptions, Endpoint, EndpointSpec, FilterRule,
    LocalVolume, RemoteVolume, SnapshotConfig, SnapshotMode, SyncConfig, SyncEndpoint, Volume,
};
pub use resolve::validate;
