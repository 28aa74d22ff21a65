use std::path::{Path, PathBuf};
use std::time::Duration;

use condarel_github::{DEFAULT_API_ROOT, GitHubConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to read settings from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid settings in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseSettings {
    #[serde(default = "default_owner")]
    pub owner: String,

    #[serde(default = "default_repo")]
    pub repo: String,

    #[serde(default = "default_api_root")]
    pub api_root: String,

    #[serde(default = "default_workflow")]
    pub workflow: String,

    #[serde(default = "default_branch")]
    pub branch: String,

    #[serde(default = "default_build_config_path")]
    pub build_config_path: String,

    /// Seconds to wait for the next chunk of a response before giving up.
    #[serde(default = "default_idle_timeout", alias = "http_timeout_secs")]
    pub idle_timeout_secs: u64,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_owner() -> String {
    "DIRACGrid".to_string()
}

fn default_repo() -> String {
    "DIRACOS2".to_string()
}

fn default_api_root() -> String {
    DEFAULT_API_ROOT.to_string()
}

fn default_workflow() -> String {
    "build-and-test.yml".to_string()
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_build_config_path() -> String {
    "construct.yaml".to_string()
}

fn default_idle_timeout() -> u64 {
    60
}

fn default_connect_timeout() -> u64 {
    10
}

impl Default for ReleaseSettings {
    fn default() -> Self {
        Self {
            owner: default_owner(),
            repo: default_repo(),
            api_root: default_api_root(),
            workflow: default_workflow(),
            branch: default_branch(),
            build_config_path: default_build_config_path(),
            idle_timeout_secs: default_idle_timeout(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl ReleaseSettings {
    /// Defaults when no file is given. A file that was asked for must exist
    /// and parse.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn github_config(&self, token: String) -> GitHubConfig {
        GitHubConfig {
            api_root: self.api_root.clone(),
            owner: self.owner.clone(),
            repo: self.repo.clone(),
            token,
            idle_timeout: Duration::from_secs(self.idle_timeout_secs),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_uses_defaults() {
        let settings: ReleaseSettings = serde_json::from_str("{}").expect("valid settings");
        assert_eq!(settings, ReleaseSettings::default());
        assert_eq!(settings.owner, "DIRACGrid");
        assert_eq!(settings.repo, "DIRACOS2");
        assert_eq!(settings.build_config_path, "construct.yaml");
    }

    #[test]
    fn partial_file_overrides_only_given_fields() {
        let temp_dir = tempfile::tempdir().expect("temporary directory should be created");
        let path = temp_dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"owner": "me", "api_root": "http://127.0.0.1:9000", "idle_timeout_secs": 5}"#,
        )
        .expect("settings file should be written");

        let settings = ReleaseSettings::load(Some(&path)).expect("settings should load");

        assert_eq!(settings.owner, "me");
        assert_eq!(settings.repo, "DIRACOS2");
        assert_eq!(settings.workflow, "build-and-test.yml");

        let config = settings.github_config("t".to_string());
        assert_eq!(config.api_root, "http://127.0.0.1:9000");
        assert_eq!(config.idle_timeout, Duration::from_secs(5));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
    }

    #[test]
    fn legacy_http_timeout_key_sets_idle_timeout() {
        let settings: ReleaseSettings =
            serde_json::from_str(r#"{"http_timeout_secs": 300}"#).expect("valid settings");

        assert_eq!(settings.idle_timeout_secs, 300);
        assert_eq!(
            settings.github_config(String::new()).idle_timeout,
            Duration::from_secs(300)
        );
    }

    #[test]
    fn missing_file_is_an_error() {
        let temp_dir = tempfile::tempdir().expect("temporary directory should be created");
        let err = ReleaseSettings::load(Some(&temp_dir.path().join("absent.json")))
            .expect_err("missing file should fail");
        assert!(matches!(err, SettingsError::Read { .. }));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let temp_dir = tempfile::tempdir().expect("temporary directory should be created");
        let path = temp_dir.path().join("settings.json");
        std::fs::write(&path, r#"{"owner": 3}"#).expect("settings file should be written");

        let err = ReleaseSettings::load(Some(&path)).expect_err("bad type should fail");
        assert!(matches!(err, SettingsError::Parse { .. }));
    }

    #[test]
    fn no_path_means_defaults() {
        assert_eq!(
            ReleaseSettings::load(None).expect("defaults"),
            ReleaseSettings::default()
        );
    }
}
