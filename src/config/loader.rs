//! Configuration discovery and parsing
//!
//! Search order: explicit `--config` path, then the user config
//! directory (`$XDG_CONFIG_HOME/caravan/`), then `/etc/caravan/`.
//! Both TOML and YAML are accepted, picked by file extension.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{Config, ConfigFile};
use crate::config::resolve::validate;
use crate::error::{CaravanError, CaravanResult};

const FILE_NAMES: [&str; 3] = ["config.toml", "config.yaml", "config.yml"];

/// Locate the config file.
pub fn find_config_file(explicit: Option<&Path>) -> CaravanResult<PathBuf> {
    if let Some(path) = explicit {
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
        return Err(CaravanError::ConfigNotFound {
            searched: vec![path.to_path_buf()],
        });
    }

    let mut searched = Vec::new();
    let mut roots = Vec::new();
    if let Some(config_dir) = dirs::config_dir() {
        roots.push(config_dir.join("caravan"));
    }
    roots.push(PathBuf::from("/etc/caravan"));

    for root in roots {
        for name in FILE_NAMES {
            let candidate = root.join(name);
            if candidate.is_file() {
                return Ok(candidate);
            }
            searched.push(candidate);
        }
    }
    Err(CaravanError::ConfigNotFound { searched })
}

/// Load, parse, and validate configuration.
pub fn load_config(explicit: Option<&Path>) -> CaravanResult<Config> {
    let path = find_config_file(explicit)?;
    let text = fs::read_to_string(&path)?;
    let raw = parse_config(&path, &text)?;
    validate(raw)
}

fn parse_config(path: &Path, text: &str) -> CaravanResult<ConfigFile> {
    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );
    if is_yaml {
        serde_yaml_ng::from_str(text).map_err(|e| CaravanError::ConfigParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    } else {
        toml::from_str(text).map_err(|e| CaravanError::ConfigParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_missing_path_errors() {
        let err = find_config_file(Some(Path::new("/nonexistent/caravan.toml"))).unwrap_err();
        assert!(matches!(err, CaravanError::ConfigNotFound { .. }));
    }

    #[test]
    fn loads_toml_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
            [volumes.docs]
            type = "local"
            path = "/home/me/docs"
            "#,
        )
        .unwrap();
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.volumes.len(), 1);
        assert_eq!(config.volumes["docs"].path(), "/home/me/docs");
    }

    #[test]
    fn loads_yaml_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(
            &path,
            concat!(
                "ssh-endpoints:\n",
                "  nas:\n",
                "    host: nas.lan\n",
                "    user: backup\n",
                "volumes:\n",
                "  remote-nas:\n",
                "    type: remote\n",
                "    ssh-endpoint: nas\n",
                "    path: /srv/backups\n",
            ),
        )
        .unwrap();
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.ssh_endpoints["nas"].host, "nas.lan");
        assert!(config.volumes["remote-nas"].is_remote());
    }

    #[test]
    fn parse_error_carries_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "volumes = 3").unwrap();
        let err = load_config(Some(&path)).unwrap_err();
        match err {
            CaravanError::ConfigParse { path: p, .. } => assert_eq!(p, path),
            other => panic!("expected ConfigParse, got {other:?}"),
        }
    }
}
