//! VolumeShell: run a command "on" a volume
//!
//! The single dispatch point between local process spawning and remote
//! execution over ssh. Callers build argv lists with the pure builders
//! and hand them here; nothing else needs to know which side of the
//! wire a volume lives on.

use std::io;
use std::process::{Command, Output};

use crate::remote::resolution::{EndpointResolution, ResolvedEndpoint};
use crate::remote::ssh::run_remote_command;
use crate::config::Volume;

/// Where a volume's commands execute.
#[derive(Debug, Clone, Copy)]
pub enum VolumeShell<'a> {
    Local,
    Remote(&'a ResolvedEndpoint),
}

impl<'a> VolumeShell<'a> {
    /// Shell for a volume. `None` when the volume is remote and its
    /// endpoint did not resolve.
    pub fn for_volume(volume: &Volume, resolution: &'a EndpointResolution) -> Option<Self> {
        match volume {
            Volume::Local(_) => Some(VolumeShell::Local),
            Volume::Remote(remote) => resolution.get(&remote.slug).map(VolumeShell::Remote),
        }
    }

    /// Run an argv, capturing output.
    pub fn run(&self, argv: &[String]) -> io::Result<Output> {
        if argv.is_empty() {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "empty argv"));
        }
        match self {
            VolumeShell::Local => Command::new(&argv[0]).args(&argv[1..]).output(),
            VolumeShell::Remote(ep) => run_remote_command(&ep.server, &ep.proxy_chain, argv),
        }
    }

    /// Run an argv and report only whether it succeeded.
    pub fn probe(&self, argv: &[String]) -> bool {
        self.run(argv).map(|o| o.status.success()).unwrap_or(false)
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, VolumeShell::Remote(_))
    }
}
