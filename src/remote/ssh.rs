//! SSH command building and remote command execution
//!
//! Everything here that builds argument lists is pure: the same
//! builders feed the live executor and the generated script, so the
//! two cannot disagree about what a connection looks like.

use std::io;
use std::process::{Command, Output};

use crate::config::{ConnectionOptions, Endpoint};

/// Derive ssh `-o` option values from structured connection options.
pub fn ssh_o_options(opts: &ConnectionOptions) -> Vec<String> {
    let mut result = vec![
        format!("ConnectTimeout={}", opts.connect_timeout),
        "BatchMode=yes".to_string(),
    ];
    if opts.compress {
        result.push("Compression=yes".to_string());
    }
    if let Some(interval) = opts.server_alive_interval {
        result.push(format!("ServerAliveInterval={interval}"));
    }
    if !opts.strict_host_key_checking {
        result.push("StrictHostKeyChecking=no".to_string());
    }
    if let Some(file) = &opts.known_hosts_file {
        result.push(format!("UserKnownHostsFile={file}"));
    }
    if opts.forward_agent {
        result.push("ForwardAgent=yes".to_string());
    }
    result
}

fn format_hop(endpoint: &Endpoint) -> String {
    let mut hop = match &endpoint.user {
        Some(user) => format!("{user}@{}", endpoint.host),
        None => endpoint.host.clone(),
    };
    if endpoint.port != Endpoint::default_port() {
        hop.push_str(&format!(":{}", endpoint.port));
    }
    hop
}

/// Format a proxy chain as the ssh `-J` value: comma-joined
/// `[user@]host[:port]` hops in connection order.
pub fn format_proxy_jump(chain: &[Endpoint]) -> String {
    chain.iter().map(format_hop).collect::<Vec<_>>().join(",")
}

fn ssh_common_args(server: &Endpoint, proxy_chain: &[Endpoint]) -> Vec<String> {
    let mut args = Vec::new();
    for opt in ssh_o_options(&server.connection_options) {
        args.push("-o".to_string());
        args.push(opt);
    }
    if server.port != Endpoint::default_port() {
        args.push("-p".to_string());
        args.push(server.port.to_string());
    }
    if let Some(key) = &server.key {
        args.push("-i".to_string());
        args.push(key.clone());
    }
    if !proxy_chain.is_empty() {
        args.push("-J".to_string());
        args.push(format_proxy_jump(proxy_chain));
    }
    args
}

/// Build base ssh args for running commands on an endpoint:
/// `ssh -o ConnectTimeout=10 -o BatchMode=yes [opts] [user@]host`
pub fn build_ssh_base_args(server: &Endpoint, proxy_chain: &[Endpoint]) -> Vec<String> {
    let mut args = vec!["ssh".to_string()];
    args.extend(ssh_common_args(server, proxy_chain));
    args.push(match &server.user {
        Some(user) => format!("{user}@{}", server.host),
        None => server.host.clone(),
    });
    args
}

/// Build rsync's `-e` option for ssh transport with custom
/// port/key/options: `["-e", "ssh -o ... -p N -i key"]`
pub fn build_ssh_e_option(server: &Endpoint, proxy_chain: &[Endpoint]) -> Vec<String> {
    let mut parts = vec!["ssh".to_string()];
    parts.extend(ssh_common_args(server, proxy_chain));
    vec!["-e".to_string(), parts.join(" ")]
}

/// Format a remote path as `[user@]host:path`.
pub fn format_remote_path(server: &Endpoint, path: &str) -> String {
    match &server.user {
        Some(user) => format!("{user}@{}:{path}", server.host),
        None => format!("{}:{path}", server.host),
    }
}

/// Join an argv into a single shell-quoted command string for the far
/// side of an ssh invocation.
pub fn quote_command(argv: &[String]) -> String {
    shlex::try_join(argv.iter().map(String::as_str)).unwrap_or_default()
}

/// Run a command on a remote host via ssh, capturing output.
pub fn run_remote_command(
    server: &Endpoint,
    proxy_chain: &[Endpoint],
    command: &[String],
) -> io::Result<Output> {
    let mut args = build_ssh_base_args(server, proxy_chain);
    args.push(quote_command(command));
    Command::new(&args[0]).args(&args[1..]).output()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConnectionOptions;

    fn endpoint(slug: &str, host: &str) -> Endpoint {
        Endpoint {
            slug: slug.into(),
            host: host.into(),
            port: 22,
            user: None,
            key: None,
            connection_options: ConnectionOptions::default(),
            proxy_jumps: Vec::new(),
            location: None,
        }
    }

    #[test]
    fn base_args_default_options() {
        let args = build_ssh_base_args(&endpoint("nas", "nas.lan"), &[]);
        assert_eq!(
            args,
            vec![
                "ssh",
                "-o",
                "ConnectTimeout=10",
                "-o",
                "BatchMode=yes",
                "nas.lan"
            ]
        );
    }

    #[test]
    fn base_args_with_port_user_key_and_proxy() {
        let mut server = endpoint("nas", "nas.example.com");
        server.port = 2200;
        server.user = Some("backup".into());
        server.key = Some("/home/me/.ssh/backup_ed25519".into());
        let mut gate = endpoint("gate", "gate.example.com");
        gate.user = Some("jump".into());
        gate.port = 2022;

        let args = build_ssh_base_args(&server, &[gate]);
        assert_eq!(
            args,
            vec![
                "ssh",
                "-o",
                "ConnectTimeout=10",
                "-o",
                "BatchMode=yes",
                "-p",
                "2200",
                "-i",
                "/home/me/.ssh/backup_ed25519",
                "-J",
                "jump@gate.example.com:2022",
                "backup@nas.example.com"
            ]
        );
    }

    #[test]
    fn multi_hop_proxy_chain_is_comma_joined() {
        let a = endpoint("a", "a.example.com");
        let b = endpoint("b", "b.example.com");
        assert_eq!(format_proxy_jump(&[a, b]), "a.example.com,b.example.com");
    }

    #[test]
    fn e_option_reflects_connection_options() {
        let mut server = endpoint("nas", "nas.lan");
        server.connection_options.compress = true;
        server.connection_options.strict_host_key_checking = false;
        let e = build_ssh_e_option(&server, &[]);
        assert_eq!(e[0], "-e");
        assert_eq!(
            e[1],
            "ssh -o ConnectTimeout=10 -o BatchMode=yes -o Compression=yes \
             -o StrictHostKeyChecking=no"
        );
    }

    #[test]
    fn remote_path_formatting() {
        let mut server = endpoint("nas", "nas.lan");
        assert_eq!(format_remote_path(&server, "/srv/backups"), "nas.lan:/srv/backups");
        server.user = Some("backup".into());
        assert_eq!(
            format_remote_path(&server, "/srv/backups"),
            "backup@nas.lan:/srv/backups"
        );
    }

    #[test]
    fn quote_command_round_trips_through_word_splitting() {
        let argv = vec![
            "test".to_string(),
            "-f".to_string(),
            "/a dir/.caravan-vol".to_string(),
        ];
        let joined = quote_command(&argv);
        assert!(joined.starts_with("test -f "));
        assert_eq!(shlex::split(&joined).unwrap(), argv);
    }
}
