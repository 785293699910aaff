//! Configuration types for putio-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Download behavior configuration (directories, cadence, worker pools)
///
/// Groups settings related to how transfers are fetched and stored locally.
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Root directory for all local download plans (default: "./downloads")
    #[serde(default = "default_download_directory")]
    pub download_directory: PathBuf,

    /// Period in seconds for the poller and the import/seed watchers (default: 10)
    #[serde(default = "default_polling_interval")]
    pub polling_interval: u64,

    /// Number of orchestration worker tasks (default: 10)
    #[serde(default = "default_orchestration_workers")]
    pub orchestration_workers: usize,

    /// Number of file-fetch worker tasks (default: 4)
    #[serde(default = "default_download_workers")]
    pub download_workers: usize,

    /// Remote folder names whose subtrees are never downloaded, matched
    /// case-insensitively against the outermost folder (default: sample, extras)
    #[serde(default = "default_skip_directories")]
    pub skip_directories: Vec<String>,

    /// Per-request timeout in seconds for file downloads (default: 1800)
    #[serde(default = "default_download_timeout")]
    pub download_timeout: u64,
}

impl DownloadConfig {
    /// Polling period as a [`Duration`].
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.polling_interval)
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            download_directory: default_download_directory(),
            polling_interval: default_polling_interval(),
            orchestration_workers: default_orchestration_workers(),
            download_workers: default_download_workers(),
            skip_directories: default_skip_directories(),
            download_timeout: default_download_timeout(),
        }
    }
}

/// put.io account and instance-scoping configuration
///
/// An instance is distinguished on the put.io side by a short source tag
/// (`instance_name`) and a dedicated parent folder (`instance_folder_id`).
/// Either alone is insufficient to scope a transfer listing; both are applied
/// when present.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PutioConfig {
    /// OAuth token for the put.io API
    pub api_key: String,

    /// Base URL of the put.io REST API (default: "https://api.put.io/v2")
    #[serde(default = "default_putio_base_url")]
    pub base_url: String,

    /// Source tag identifying this instance's transfers
    #[serde(default)]
    pub instance_name: Option<String>,

    /// put.io folder id under which this instance saves its transfers
    #[serde(default)]
    pub instance_folder_id: Option<i64>,

    /// Per-request timeout in seconds for API calls (default: 30)
    #[serde(default = "default_api_timeout")]
    pub api_timeout: u64,
}

impl Default for PutioConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_putio_base_url(),
            instance_name: None,
            instance_folder_id: None,
            api_timeout: default_api_timeout(),
        }
    }
}

/// A single Arr service (Sonarr, Radarr, or Whisparr) to probe for imports
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArrServiceConfig {
    /// Display name used in logs; defaults to the config section the entry
    /// appears under ("sonarr", "radarr", "whisparr")
    #[serde(default)]
    pub name: Option<String>,

    /// Base URL of the service, e.g. "http://localhost:8989"
    pub url: String,

    /// API key sent as the `X-Api-Key` header
    pub api_key: String,
}

/// Retry configuration for transient remote failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the initial try (default: 3)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial backoff delay in milliseconds (default: 500)
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Maximum backoff delay in milliseconds (default: 10000)
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Multiplier applied to the backoff after each attempt (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to backoff delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// Main configuration for [`PutioDownloader`](crate::PutioDownloader)
///
/// The consumer application is responsible for producing this value (from a
/// TOML file, environment, or otherwise); the library only validates it.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Download behavior settings
    #[serde(default)]
    pub download: DownloadConfig,

    /// put.io account and scoping settings
    #[serde(default)]
    pub putio: PutioConfig,

    /// Sonarr instances to probe for import confirmation
    #[serde(default)]
    pub sonarr: Vec<ArrServiceConfig>,

    /// Radarr instances to probe for import confirmation
    #[serde(default)]
    pub radarr: Vec<ArrServiceConfig>,

    /// Whisparr instances to probe for import confirmation
    #[serde(default)]
    pub whisparr: Vec<ArrServiceConfig>,

    /// Retry policy for transient remote failures
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Config {
    /// Validate the configuration before the service starts.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the offending key when a required
    /// value is missing or a numeric setting is out of range.
    pub fn validate(&self) -> Result<()> {
        if self.putio.api_key.is_empty() {
            return Err(Error::Config {
                message: "put.io API key must not be empty".to_string(),
                key: Some("putio.api_key".to_string()),
            });
        }
        if self.download.polling_interval == 0 {
            return Err(Error::Config {
                message: "polling interval must be at least 1 second".to_string(),
                key: Some("download.polling_interval".to_string()),
            });
        }
        if self.download.orchestration_workers == 0 {
            return Err(Error::Config {
                message: "at least one orchestration worker is required".to_string(),
                key: Some("download.orchestration_workers".to_string()),
            });
        }
        if self.download.download_workers == 0 {
            return Err(Error::Config {
                message: "at least one download worker is required".to_string(),
                key: Some("download.download_workers".to_string()),
            });
        }
        for (kind, entries) in [
            ("sonarr", &self.sonarr),
            ("radarr", &self.radarr),
            ("whisparr", &self.whisparr),
        ] {
            for entry in entries.iter() {
                if entry.url.is_empty() {
                    return Err(Error::Config {
                        message: format!("{kind} entry has an empty url"),
                        key: Some(format!("{kind}.url")),
                    });
                }
            }
        }
        Ok(())
    }

    /// All configured Arr services in probe order, each paired with its
    /// effective display name.
    pub fn arr_services(&self) -> Vec<(String, &ArrServiceConfig)> {
        let mut services = Vec::new();
        for (kind, entries) in [
            ("sonarr", &self.sonarr),
            ("radarr", &self.radarr),
            ("whisparr", &self.whisparr),
        ] {
            for entry in entries.iter() {
                let name = entry.name.clone().unwrap_or_else(|| kind.to_string());
                services.push((name, entry));
            }
        }
        services
    }
}

fn default_download_directory() -> PathBuf {
    PathBuf::from("./downloads")
}

fn default_polling_interval() -> u64 {
    10
}

fn default_orchestration_workers() -> usize {
    10
}

fn default_download_workers() -> usize {
    4
}

fn default_skip_directories() -> Vec<String> {
    vec!["sample".to_string(), "extras".to_string()]
}

fn default_download_timeout() -> u64 {
    30 * 60
}

fn default_putio_base_url() -> String {
    "https://api.put.io/v2".to_string()
}

fn default_api_timeout() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    10_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config {
            putio: PutioConfig {
                api_key: "token".to_string(),
                ..PutioConfig::default()
            },
            ..Config::default()
        }
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.download.polling_interval, 10);
        assert_eq!(config.download.orchestration_workers, 10);
        assert_eq!(config.download.download_workers, 4);
        assert_eq!(config.download.download_directory, PathBuf::from("./downloads"));
        assert_eq!(config.putio.base_url, "https://api.put.io/v2");
        assert!(config.download.skip_directories.contains(&"sample".to_string()));
    }

    #[test]
    fn validate_rejects_empty_api_key() {
        let config = Config::default();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("API key"));
    }

    #[test]
    fn validate_rejects_zero_workers() {
        let mut config = valid_config();
        config.download.orchestration_workers = 0;
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.download.download_workers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_arr_url() {
        let mut config = valid_config();
        config.radarr.push(ArrServiceConfig {
            name: None,
            url: String::new(),
            api_key: "key".to_string(),
        });
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("radarr"));
    }

    #[test]
    fn arr_services_flatten_in_probe_order_with_default_names() {
        let mut config = valid_config();
        config.sonarr.push(ArrServiceConfig {
            name: None,
            url: "http://sonarr:8989".to_string(),
            api_key: "a".to_string(),
        });
        config.radarr.push(ArrServiceConfig {
            name: Some("movies-4k".to_string()),
            url: "http://radarr:7878".to_string(),
            api_key: "b".to_string(),
        });

        let services = config.arr_services();
        assert_eq!(services.len(), 2);
        assert_eq!(services[0].0, "sonarr");
        assert_eq!(services[1].0, "movies-4k");
    }

    #[test]
    fn config_deserializes_with_partial_toml_shape() {
        let json = serde_json::json!({
            "putio": { "api_key": "token", "instance_folder_id": 42 },
            "download": { "polling_interval": 5 },
            "sonarr": [ { "url": "http://localhost:8989", "api_key": "k" } ]
        });
        let config: Config = serde_json::from_value(json).unwrap();
        assert_eq!(config.download.polling_interval, 5);
        assert_eq!(config.download.download_workers, 4);
        assert_eq!(config.putio.instance_folder_id, Some(42));
        assert_eq!(config.sonarr.len(), 1);
    }
}
