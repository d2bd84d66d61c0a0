//! Cross-platform data path resolution.
//!
//! Decides where the settings file lives, based on explicit configuration,
//! platform conventions and Docker detection.

use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// File name of the persisted limiter settings.
pub const SETTINGS_FILE: &str = "limiter.json";

/// Represents the resolved paths for application data storage.
#[derive(Debug, Clone)]
pub struct DataPaths {
    /// Path to the settings file
    pub settings_path: PathBuf,
}

/// Configuration for path resolution.
#[derive(Debug, Default)]
pub struct PathConfig {
    /// Explicit data directory (limiter.json will be inside)
    pub data_dir: Option<PathBuf>,
    /// Explicit path to the settings file
    pub settings_path: Option<PathBuf>,
}

impl DataPaths {
    /// Resolve data paths based on configuration.
    ///
    /// Priority (highest to lowest):
    /// 1. Explicit settings_path if provided
    /// 2. Explicit data_dir if provided
    /// 3. Default directory (platform-specific or Docker-detected)
    ///
    /// Directories are created when the settings are first saved.
    pub fn resolve(config: PathConfig) -> Self {
        let settings_path = match (config.settings_path, config.data_dir) {
            (Some(path), _) => {
                info!("Using custom settings path: {}", path.display());
                path
            }
            (None, Some(dir)) => dir.join(SETTINGS_FILE),
            (None, None) => Self::default_data_dir().join(SETTINGS_FILE),
        };

        info!("Settings: {}", settings_path.display());

        Self { settings_path }
    }

    /// Determine the default data directory based on platform and environment.
    fn default_data_dir() -> PathBuf {
        if Self::is_docker() {
            info!("Docker environment detected, using ./data/ for storage");
            return PathBuf::from("./data");
        }

        if let Some(proj_dirs) = ProjectDirs::from("", "", "autolimit") {
            proj_dirs.data_dir().to_path_buf()
        } else {
            warn!("Could not determine user data directory, falling back to ./data/");
            PathBuf::from("./data")
        }
    }

    /// Detect if running inside a Docker container.
    fn is_docker() -> bool {
        // Check for /.dockerenv file (standard Docker indicator)
        if Path::new("/.dockerenv").exists() {
            return true;
        }

        if let Ok(cgroup) = std::fs::read_to_string("/proc/self/cgroup") {
            if cgroup.contains("docker") || cgroup.contains("containerd") {
                return true;
            }
        }

        false
    }
}

/// User configuration file (`config.toml` in the platform config directory).
pub fn user_config_file() -> Option<PathBuf> {
    ProjectDirs::from("", "", "autolimit").map(|dirs| dirs.config_dir().join("config.toml"))
}
