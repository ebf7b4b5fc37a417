//! Remote access: ssh command building, endpoint resolution, and the
//! local/remote execution seam.

mod resolution;
mod shell;
mod ssh;

pub use resolution::{
    resolve_all_endpoints, resolve_all_endpoints_with_probe, select_endpoint, EndpointFilter,
    EndpointResolution, HostProbe, NetworkPreference, ResolvedEndpoint,
};
pub use shell::VolumeShell;
pub use ssh::{
    build_ssh_base_args, build_ssh_e_option, format_proxy_jump, format_remote_path, quote_command,
    run_remote_command, ssh_o_options,
};
