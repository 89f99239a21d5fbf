//! Configuration types.

use std::path::PathBuf;

use crate::error::ConfigError;

/// Default location of the channel configuration file.
pub const DEFAULT_CHANNELS_PATH: &str = "configs/channels.json";

/// Service-level configuration for the dashboard and the batch extractor.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Interface the HTTP server binds to.
    pub host: String,
    /// Port the HTTP server listens on.
    pub port: u16,
    /// JSON file holding `{"channels": [...]}`.
    pub channels_path: PathBuf,
    /// Directories scanned for `summary_*` files by the extractor.
    pub summary_dirs: Vec<PathBuf>,
    /// Where generated summaries are written when `save_summaries` is on.
    pub results_dir: PathBuf,
    /// Where `all_actions.json` and `actions_by_client.json` live.
    pub actions_dir: PathBuf,
    /// Persist every generated summary to `results_dir`.
    pub save_summaries: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            channels_path: PathBuf::from(DEFAULT_CHANNELS_PATH),
            summary_dirs: vec![PathBuf::from("outputs"), PathBuf::from("part1/results")],
            results_dir: PathBuf::from("part1/results"),
            actions_dir: PathBuf::from("part2"),
            save_summaries: false,
        }
    }
}

impl AppConfig {
    /// Build config from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup (used by `from_env` and tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let port = match lookup("NOSY_PORT") {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "NOSY_PORT".into(),
                message: format!("`{raw}` is not a valid port"),
            })?,
            None => defaults.port,
        };

        let save_summaries = match lookup("NOSY_SAVE_SUMMARIES") {
            Some(raw) => parse_bool(&raw).ok_or_else(|| ConfigError::InvalidValue {
                key: "NOSY_SAVE_SUMMARIES".into(),
                message: format!("`{raw}` is not a boolean"),
            })?,
            None => defaults.save_summaries,
        };

        let summary_dirs = lookup("NOSY_SUMMARY_DIRS")
            .map(|raw| split_list(&raw).into_iter().map(PathBuf::from).collect())
            .unwrap_or(defaults.summary_dirs);

        Ok(Self {
            host: lookup("NOSY_HOST").unwrap_or(defaults.host),
            port,
            channels_path: lookup("NOSY_CHANNELS_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.channels_path),
            summary_dirs,
            results_dir: lookup("NOSY_RESULTS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.results_dir),
            actions_dir: lookup("NOSY_ACTIONS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.actions_dir),
            save_summaries,
        })
    }

    /// `host:port` for the listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Split a comma-separated list, dropping blanks.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_set() {
        let config = AppConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.port, 5000);
        assert_eq!(config.channels_path, PathBuf::from(DEFAULT_CHANNELS_PATH));
        assert_eq!(config.summary_dirs.len(), 2);
        assert!(!config.save_summaries);
    }

    #[test]
    fn overrides_from_lookup() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("NOSY_PORT", "8081"),
            ("NOSY_SUMMARY_DIRS", "a, b ,,c"),
            ("NOSY_SAVE_SUMMARIES", "yes"),
        ]))
        .unwrap();
        assert_eq!(config.port, 8081);
        assert_eq!(
            config.summary_dirs,
            vec![PathBuf::from("a"), PathBuf::from("b"), PathBuf::from("c")]
        );
        assert!(config.save_summaries);
        assert_eq!(config.bind_address(), "127.0.0.1:8081");
    }

    #[test]
    fn invalid_port_is_rejected() {
        let err = AppConfig::from_lookup(lookup_from(&[("NOSY_PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "NOSY_PORT"));
    }
}
