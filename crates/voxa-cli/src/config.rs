//! Configuration Vault – reads/writes `~/.voxa/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::warn;
use voxa_kernel::CONFIDENCE_THRESHOLD;
use voxa_runtime::SessionConfig;

/// Persisted user configuration stored in `~/.voxa/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Relay to mirror commands through (`ws://host:port`).  Empty runs
    /// local-only.
    #[serde(default)]
    pub relay_url: String,

    /// Port `voxa relay` listens on.
    #[serde(default = "default_relay_port")]
    pub relay_port: u16,

    /// HTTP/WebSocket port of the cockpit page.
    #[serde(default = "default_cockpit_port")]
    pub cockpit_port: u16,

    /// Minimum recognizer confidence that may move the vehicle.
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,

    /// Motion smoothing ticks per second.
    #[serde(default = "default_tick_hz")]
    pub tick_hz: u32,

    #[serde(default = "default_autopilot_period_ms")]
    pub autopilot_period_ms: u64,
}

fn default_relay_port() -> u16 {
    voxa_middleware::relay::DEFAULT_RELAY_PORT
}
fn default_cockpit_port() -> u16 {
    voxa_cockpit::DEFAULT_PORT
}
fn default_confidence_threshold() -> f32 {
    CONFIDENCE_THRESHOLD
}
fn default_tick_hz() -> u32 {
    60
}
fn default_autopilot_period_ms() -> u64 {
    1200
}

impl Default for Config {
    fn default() -> Self {
        Self {
            relay_url: String::new(),
            relay_port: default_relay_port(),
            cockpit_port: default_cockpit_port(),
            confidence_threshold: default_confidence_threshold(),
            tick_hz: default_tick_hz(),
            autopilot_period_ms: default_autopilot_period_ms(),
        }
    }
}

impl Config {
    /// Replace tunables outside the ranges the env overrides accept with
    /// their defaults.
    fn reset_out_of_range(&mut self) {
        if !is_valid_threshold(self.confidence_threshold) {
            warn!(
                value = self.confidence_threshold,
                "confidence_threshold outside [0, 1]; using default"
            );
            self.confidence_threshold = default_confidence_threshold();
        }
        if !is_valid_tick_hz(self.tick_hz) {
            warn!(value = self.tick_hz, "tick_hz outside 1..=1000; using default");
            self.tick_hz = default_tick_hz();
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            confidence_threshold: self.confidence_threshold,
            tick_hz: self.tick_hz.max(1),
            autopilot_period: Duration::from_millis(self.autopilot_period_ms.max(1)),
            ..SessionConfig::default()
        }
    }
}

/// Return the path to `~/.voxa/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".voxa").join("config.toml")
}

/// Load the config from disk with env overrides applied.  Returns `None` if
/// the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    let mut cfg = read_from(&config_path())?;
    if let Some(cfg) = cfg.as_mut() {
        apply_env_overrides(cfg);
    }
    Ok(cfg)
}

/// Parse the file at `path` as-is.
pub(crate) fn read_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    cfg.reset_out_of_range();
    Ok(Some(cfg))
}

/// Apply `VOXA_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `VOXA_RELAY_URL` | `relay_url` |
/// | `VOXA_RELAY_PORT` | `relay_port` |
/// | `VOXA_COCKPIT_PORT` | `cockpit_port` |
/// | `VOXA_CONFIDENCE_THRESHOLD` | `confidence_threshold` |
/// | `VOXA_TICK_HZ` | `tick_hz` |
///
/// Unparseable values are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("VOXA_RELAY_URL") {
        cfg.relay_url = v.trim().to_string();
    }
    if let Ok(v) = std::env::var("VOXA_RELAY_PORT")
        && let Ok(port) = v.parse::<u16>()
    {
        cfg.relay_port = port;
    }
    if let Ok(v) = std::env::var("VOXA_COCKPIT_PORT")
        && let Ok(port) = v.parse::<u16>()
    {
        cfg.cockpit_port = port;
    }
    if let Ok(v) = std::env::var("VOXA_CONFIDENCE_THRESHOLD")
        && let Some(threshold) = parse_threshold(&v)
    {
        cfg.confidence_threshold = threshold;
    }
    if let Ok(v) = std::env::var("VOXA_TICK_HZ")
        && let Some(hz) = parse_tick_hz(&v)
    {
        cfg.tick_hz = hz;
    }
}

/// A confidence threshold must be a probability.
fn is_valid_threshold(t: f32) -> bool {
    (0.0..=1.0).contains(&t)
}

fn is_valid_tick_hz(hz: u32) -> bool {
    (1..=1000).contains(&hz)
}

pub(crate) fn parse_threshold(raw: &str) -> Option<f32> {
    raw.trim().parse::<f32>().ok().filter(|t| is_valid_threshold(*t))
}

pub(crate) fn parse_tick_hz(raw: &str) -> Option<u32> {
    raw.trim().parse::<u32>().ok().filter(|hz| is_valid_tick_hz(*hz))
}

/// Save the config to disk, creating `~/.voxa/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

/// Save the config to a specific path.
pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
        // Owner-only (rwx------) on Unix.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(raw.as_bytes())
            })
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}
