//! Engine configuration (.droidpilot/config.toml)

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use droidpilot_core::prelude::*;

const CONFIG_FILENAME: &str = "config.toml";
const DROIDPILOT_DIR: &str = ".droidpilot";

/// Engine settings, all optional in the file.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub stability: StabilityConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub executor: ExecutorConfig,
}

/// Stability detector tuning.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StabilityConfig {
    /// Quiet window that counts as touch-idle, in milliseconds.
    #[serde(default = "default_touch_idle_ms")]
    pub touch_idle_ms: u64,

    /// Hard limit on waiting for touch idle.
    #[serde(default = "default_touch_limit_ms")]
    pub touch_limit_ms: u64,

    /// How long a rotation may take to settle before it is an error.
    #[serde(default = "default_rotation_timeout_ms")]
    pub rotation_timeout_ms: u64,

    /// Poll interval while waiting on rotation.
    #[serde(default = "default_poll_ms")]
    pub rotation_poll_ms: u64,

    /// How long frame stats must stay quiet before the UI counts as stable.
    #[serde(default = "default_ui_hold_ms")]
    pub ui_hold_ms: u64,

    /// Overall limit on waiting for UI stability.
    #[serde(default = "default_ui_timeout_ms")]
    pub ui_timeout_ms: u64,

    /// Poll interval while waiting on UI stability.
    #[serde(default = "default_poll_ms")]
    pub ui_poll_ms: u64,

    /// Ceiling for the p50 and p90 frame time percentiles.
    #[serde(default = "default_tight_ceiling_ms")]
    pub tight_ceiling_ms: f64,

    /// Ceiling for the p95 frame time percentile.
    #[serde(default = "default_loose_ceiling_ms")]
    pub loose_ceiling_ms: f64,
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            touch_idle_ms: default_touch_idle_ms(),
            touch_limit_ms: default_touch_limit_ms(),
            rotation_timeout_ms: default_rotation_timeout_ms(),
            rotation_poll_ms: default_poll_ms(),
            ui_hold_ms: default_ui_hold_ms(),
            ui_timeout_ms: default_ui_timeout_ms(),
            ui_poll_ms: default_poll_ms(),
            tight_ceiling_ms: default_tight_ceiling_ms(),
            loose_ceiling_ms: default_loose_ceiling_ms(),
        }
    }
}

impl StabilityConfig {
    pub fn touch_idle(&self) -> Duration {
        Duration::from_millis(self.touch_idle_ms)
    }

    pub fn touch_limit(&self) -> Duration {
        Duration::from_millis(self.touch_limit_ms)
    }

    pub fn rotation_timeout(&self) -> Duration {
        Duration::from_millis(self.rotation_timeout_ms)
    }

    pub fn rotation_poll(&self) -> Duration {
        Duration::from_millis(self.rotation_poll_ms)
    }

    pub fn ui_hold(&self) -> Duration {
        Duration::from_millis(self.ui_hold_ms)
    }

    pub fn ui_timeout(&self) -> Duration {
        Duration::from_millis(self.ui_timeout_ms)
    }

    pub fn ui_poll(&self) -> Duration {
        Duration::from_millis(self.ui_poll_ms)
    }
}

fn default_touch_idle_ms() -> u64 {
    100
}

fn default_touch_limit_ms() -> u64 {
    8000
}

fn default_rotation_timeout_ms() -> u64 {
    500
}

// One frame at 60Hz.
fn default_poll_ms() -> u64 {
    17
}

fn default_ui_hold_ms() -> u64 {
    250
}

fn default_ui_timeout_ms() -> u64 {
    12_000
}

fn default_tight_ceiling_ms() -> f64 {
    100.0
}

fn default_loose_ceiling_ms() -> f64 {
    200.0
}

/// Hierarchy cache tuning.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Maximum perceptual hash distance for the first-stage filter.
    #[serde(default = "default_hash_distance_max")]
    pub hash_distance_max: u32,

    /// Fraction of pixels that must match for a cache hit.
    #[serde(default = "default_pixel_match")]
    pub pixel_match_threshold: f64,

    /// Stricter fraction used while text is being typed, so cursor and
    /// field contents cannot hide behind the normal tolerance.
    #[serde(default = "default_typed_text_pixel_match")]
    pub typed_text_pixel_match_threshold: f64,

    /// Entries retained per device session.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            hash_distance_max: default_hash_distance_max(),
            pixel_match_threshold: default_pixel_match(),
            typed_text_pixel_match_threshold: default_typed_text_pixel_match(),
            max_entries: default_max_entries(),
        }
    }
}

fn default_hash_distance_max() -> u32 {
    3
}

fn default_pixel_match() -> f64 {
    0.998
}

fn default_typed_text_pixel_match() -> f64 {
    0.99995
}

fn default_max_entries() -> usize {
    32
}

/// Plan executor tuning.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExecutorConfig {
    /// Mechanical retries per step before the plan fails.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Pause between retries, in milliseconds.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl ExecutorConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_delay_ms() -> u64 {
    500
}

fn default_true() -> bool {
    true
}

impl EngineConfig {
    /// Load config from a project directory, falling back to the home
    /// directory, falling back to defaults when neither file exists.
    pub fn load(project_dir: &Path) -> Result<Self> {
        if let Some(config) = Self::load_dir(project_dir)? {
            return Ok(config);
        }
        if let Some(home) = dirs::home_dir() {
            if let Some(config) = Self::load_dir(&home)? {
                return Ok(config);
            }
        }
        Ok(Self::default())
    }

    fn load_dir(dir: &Path) -> Result<Option<Self>> {
        let path = Self::config_path(dir);
        if !path.exists() {
            return Ok(None);
        }
        Self::load_from(&path).map(Some)
    }

    /// Parse a specific config file. A file that exists but does not
    /// parse is a hard error rather than a silent fallback.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("cannot read {}: {e}", path.display())))?;
        let config: Self = toml::from_str(&content).map_err(|e| Error::ConfigInvalid {
            message: format!("{}: {e}", path.display()),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn config_path(dir: &Path) -> PathBuf {
        dir.join(DROIDPILOT_DIR).join(CONFIG_FILENAME)
    }

    fn validate(&self) -> Result<()> {
        let thresholds = [
            self.cache.pixel_match_threshold,
            self.cache.typed_text_pixel_match_threshold,
        ];
        if thresholds.iter().any(|t| !(0.0..=1.0).contains(t)) {
            return Err(Error::ConfigInvalid {
                message: "pixel match thresholds must be between 0 and 1".to_string(),
            });
        }
        if self.stability.ui_poll_ms == 0 || self.stability.rotation_poll_ms == 0 {
            return Err(Error::ConfigInvalid {
                message: "poll intervals must be non-zero".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.stability.touch_idle_ms, 100);
        assert_eq!(config.stability.touch_limit_ms, 8000);
        assert_eq!(config.stability.rotation_timeout_ms, 500);
        assert_eq!(config.stability.ui_hold_ms, 250);
        assert_eq!(config.stability.ui_timeout_ms, 12_000);
        assert!(config.cache.enabled);
        assert_eq!(config.cache.pixel_match_threshold, 0.998);
        assert_eq!(config.executor.max_retries, 2);
    }

    #[test]
    fn test_parse_partial_file() {
        let toml_str = r#"
[stability]
ui_timeout_ms = 5000

[cache]
enabled = false
"#;
        let config: EngineConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.stability.ui_timeout_ms, 5000);
        assert_eq!(config.stability.ui_hold_ms, 250);
        assert!(!config.cache.enabled);
        assert_eq!(config.executor.max_retries, 2);
    }

    // The load() fallback chain reads the real home directory, so these
    // two cannot run concurrently with anything that changes it.
    #[test]
    #[serial(home_config)]
    fn test_load_from_missing_dir_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig::load(dir.path()).unwrap();
        assert_eq!(config.stability.touch_idle_ms, 100);
    }

    #[test]
    #[serial(home_config)]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let config_dir = dir.path().join(DROIDPILOT_DIR);
        std::fs::create_dir_all(&config_dir).unwrap();
        std::fs::write(
            config_dir.join(CONFIG_FILENAME),
            "[executor]\nmax_retries = 5\n",
        )
        .unwrap();

        let config = EngineConfig::load(dir.path()).unwrap();
        assert_eq!(config.executor.max_retries, 5);
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[cache]\npixel_match_threshold = 1.5\n").unwrap();

        let err = EngineConfig::load_from(&path).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_unparseable_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "not toml {{{{").unwrap();

        let err = EngineConfig::load_from(&path).unwrap_err();
        assert!(err.is_fatal());
    }
}
