//! Configuration management.

use crate::autovolume::TolerancePolicy;
use crate::host::ElementNames;
use crate::node::NodeOptions;
use crate::paths::{self, DataPaths, PathConfig};
use autolimit_types::DEFAULT_METER_INTERVAL_MS;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration structure that matches the TOML file format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    settings: SettingsConfig,
    #[serde(default)]
    metering: MeteringConfig,
    #[serde(default)]
    elements: ElementNames,
    #[serde(default)]
    autovolume: AutoVolumeConfig,
    #[serde(default)]
    logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct SettingsConfig {
    data_dir: Option<PathBuf>,
    path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MeteringConfig {
    #[serde(default = "default_interval_ms")]
    interval_ms: u64,
}

impl Default for MeteringConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct AutoVolumeConfig {
    /// Hold the gain while loudness is within `autovolume-tolerance`
    #[serde(default)]
    respect_tolerance: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct LoggingConfig {
    /// Path to log file (if set, logs will be written to file in addition to stdout)
    log_file: Option<PathBuf>,
    /// Log level (trace, debug, info, warn, error)
    /// If not set, uses RUST_LOG environment variable or defaults to "info"
    log_level: Option<String>,
}

fn default_interval_ms() -> u64 {
    DEFAULT_METER_INTERVAL_MS
}

/// Values given on the command line. They override every other source.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub data_dir: Option<PathBuf>,
    pub settings_path: Option<PathBuf>,
    pub meter_interval_ms: Option<u64>,
    pub log_level: Option<String>,
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the persisted limiter settings
    pub settings_path: PathBuf,
    /// Cadence of the meter timers
    pub meter_interval: Duration,
    /// Factory names of the chain elements
    pub elements: ElementNames,
    pub tolerance: TolerancePolicy,
    /// Path to log file (if set, logs will be written to file in addition to stdout)
    pub log_file: Option<PathBuf>,
    /// Log level (if set, overrides RUST_LOG environment variable)
    pub log_level: Option<String>,
}

impl Config {
    /// Load configuration with full priority chain: CLI args > env vars > config files > defaults.
    ///
    /// Config files are searched in this order:
    /// 1. `.autolimit.toml` in current directory
    /// 2. `config.toml` in user config directory (~/.config/autolimit/ on Linux)
    ///
    /// Environment variables use the `AUTOLIMIT_` prefix with `__` between
    /// section and key, e.g. `AUTOLIMIT_METERING__INTERVAL_MS=50`.
    pub fn from_figment(overrides: ConfigOverrides) -> anyhow::Result<Self> {
        let local_config = std::env::current_dir()
            .ok()
            .map(|d| d.join(".autolimit.toml"));
        let user_config = paths::user_config_file();

        // Build figment with priority: defaults < user config < local config < env vars < CLI args
        let mut figment = Figment::new().merge(Serialized::defaults(ConfigFile::default()));

        if let Some(ref path) = user_config {
            if path.exists() {
                figment = figment.merge(Toml::file(path));
            }
        }

        if let Some(ref path) = local_config {
            if path.exists() {
                figment = figment.merge(Toml::file(path));
            }
        }

        figment = figment.merge(Env::prefixed("AUTOLIMIT_").split("__"));

        if let Some(ref dir) = overrides.data_dir {
            figment = figment.merge(Serialized::default("settings.data_dir", dir));
        }
        if let Some(ref path) = overrides.settings_path {
            figment = figment.merge(Serialized::default("settings.path", path));
        }
        if let Some(interval) = overrides.meter_interval_ms {
            figment = figment.merge(Serialized::default("metering.interval_ms", interval));
        }
        if let Some(ref level) = overrides.log_level {
            figment = figment.merge(Serialized::default("logging.log_level", level));
        }

        let config_file: ConfigFile = figment.extract()?;
        Self::from_file(config_file)
    }

    fn from_file(file: ConfigFile) -> anyhow::Result<Self> {
        if file.metering.interval_ms == 0 {
            anyhow::bail!("metering.interval_ms must be greater than zero");
        }

        let data_paths = DataPaths::resolve(PathConfig {
            data_dir: file.settings.data_dir,
            settings_path: file.settings.path,
        });

        Ok(Self {
            settings_path: data_paths.settings_path,
            meter_interval: Duration::from_millis(file.metering.interval_ms),
            elements: file.elements,
            tolerance: TolerancePolicy::from(file.autovolume.respect_tolerance),
            log_file: file.logging.log_file,
            log_level: file.logging.log_level,
        })
    }

    /// Options for constructing a node with this configuration.
    pub fn node_options(&self) -> NodeOptions {
        NodeOptions {
            elements: self.elements.clone(),
            meter_interval: self.meter_interval,
            tolerance: self.tolerance,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_paths = DataPaths::resolve(PathConfig::default());
        Self {
            settings_path: data_paths.settings_path,
            meter_interval: Duration::from_millis(DEFAULT_METER_INTERVAL_MS),
            elements: ElementNames::default(),
            tolerance: TolerancePolicy::default(),
            log_file: None,
            log_level: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    const ENV_VARS: &[&str] = &[
        "AUTOLIMIT_METERING__INTERVAL_MS",
        "AUTOLIMIT_SETTINGS__DATA_DIR",
        "AUTOLIMIT_SETTINGS__PATH",
        "AUTOLIMIT_AUTOVOLUME__RESPECT_TOLERANCE",
    ];

    fn clear_env() {
        for var in ENV_VARS {
            std::env::remove_var(var);
        }
    }

    /// Load in `dir` so that no project `.autolimit.toml` is picked up.
    fn load_in(dir: &TempDir, overrides: ConfigOverrides) -> Config {
        let original_dir = std::env::current_dir().unwrap();
        std::env::set_current_dir(dir).unwrap();
        let config = Config::from_figment(overrides);
        // Restore before temp_dir is dropped, ignore errors
        let _ = std::env::set_current_dir(original_dir);
        config.unwrap()
    }

    #[test]
    #[serial]
    fn test_from_figment_defaults() {
        clear_env();
        let temp_dir = TempDir::new().unwrap();

        let config = load_in(&temp_dir, ConfigOverrides::default());

        assert_eq!(config.meter_interval, Duration::from_millis(100));
        assert_eq!(config.elements, ElementNames::default());
        assert_eq!(config.tolerance, TolerancePolicy::Ignore);
        assert!(config.settings_path.ends_with("limiter.json"));
    }

    #[test]
    #[serial]
    fn test_from_figment_config_file() {
        clear_env();
        let temp_dir = TempDir::new().unwrap();
        let data_dir = temp_dir.path().join("custom_data");
        let config_content = format!(
            r#"
[settings]
data_dir = "{}"

[metering]
interval_ms = 250

[elements]
limiter = "lsp-plug-in-plugins-lv2-limiter-stereo"

[autovolume]
respect_tolerance = true
"#,
            data_dir.display()
        );
        fs::write(temp_dir.path().join(".autolimit.toml"), config_content).unwrap();

        let config = load_in(&temp_dir, ConfigOverrides::default());

        assert_eq!(config.meter_interval, Duration::from_millis(250));
        assert_eq!(config.elements.limiter, "lsp-plug-in-plugins-lv2-limiter-stereo");
        assert_eq!(config.elements.loudness, "peebur");
        assert_eq!(config.tolerance, TolerancePolicy::Respect);
        assert_eq!(config.settings_path, data_dir.join("limiter.json"));
    }

    #[test]
    #[serial]
    fn test_from_figment_env_vars_override_config_file() {
        clear_env();
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join(".autolimit.toml"),
            "[metering]\ninterval_ms = 250",
        )
        .unwrap();
        std::env::set_var("AUTOLIMIT_METERING__INTERVAL_MS", "50");

        let config = load_in(&temp_dir, ConfigOverrides::default());
        clear_env();

        assert_eq!(config.meter_interval, Duration::from_millis(50));
    }

    #[test]
    #[serial]
    fn test_from_figment_cli_overrides_env_and_config() {
        clear_env();
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join(".autolimit.toml"),
            "[metering]\ninterval_ms = 250",
        )
        .unwrap();
        std::env::set_var("AUTOLIMIT_METERING__INTERVAL_MS", "50");
        let settings = temp_dir.path().join("elsewhere.json");

        let config = load_in(
            &temp_dir,
            ConfigOverrides {
                meter_interval_ms: Some(20),
                settings_path: Some(settings.clone()),
                ..Default::default()
            },
        );
        clear_env();

        assert_eq!(config.meter_interval, Duration::from_millis(20));
        assert_eq!(config.settings_path, settings);
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let file = ConfigFile {
            metering: MeteringConfig { interval_ms: 0 },
            ..Default::default()
        };
        assert!(Config::from_file(file).is_err());
    }

    #[test]
    fn test_node_options() {
        let config = Config {
            meter_interval: Duration::from_millis(40),
            tolerance: TolerancePolicy::Respect,
            ..Config::default()
        };
        let options = config.node_options();
        assert_eq!(options.meter_interval, Duration::from_millis(40));
        assert_eq!(options.tolerance, TolerancePolicy::Respect);
    }
}
