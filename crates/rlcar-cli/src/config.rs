//! Bench configuration – reads `~/.rlcar/config.toml`.
//!
//! ```toml
//! device_id = "RL-CAR-07"
//!
//! [core.video]
//! port = 8081
//!
//! [sim]
//! ssid = "garage"
//! password = "hunter2"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use rlcar_types::{CarError, CoreConfig};
use serde::{Deserialize, Serialize};

/// How the simulated operator behaves in bench mode.
#[derive(Clone, Serialize, Deserialize)]
pub struct SimConfig {
    /// Network the operator provisions over the pairing channel.
    #[serde(default = "default_ssid")]
    pub ssid: String,

    #[serde(default = "default_password")]
    pub password: String,

    /// Delay before the operator's phone pairs.
    #[serde(default = "default_pair_after_ms")]
    pub pair_after_ms: u64,

    /// Status polls before the simulated access point accepts the join.
    #[serde(default = "default_join_polls")]
    pub join_polls: u32,

    /// Simulated pack voltage.
    #[serde(default = "default_battery_volts")]
    pub battery_volts: f32,
}

impl std::fmt::Debug for SimConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimConfig")
            .field("ssid", &self.ssid)
            .field(
                "password",
                if self.password.is_empty() { &"<not set>" } else { &"<redacted>" },
            )
            .field("pair_after_ms", &self.pair_after_ms)
            .field("join_polls", &self.join_polls)
            .field("battery_volts", &self.battery_volts)
            .finish()
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            ssid: default_ssid(),
            password: default_password(),
            pair_after_ms: default_pair_after_ms(),
            join_polls: default_join_polls(),
            battery_volts: default_battery_volts(),
        }
    }
}

/// Persisted bench configuration stored in `~/.rlcar/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Name advertised on the pairing channel.
    #[serde(default = "default_device_id")]
    pub device_id: String,

    #[serde(default)]
    pub core: CoreConfig,

    #[serde(default)]
    pub sim: SimConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device_id: default_device_id(),
            core: CoreConfig::default(),
            sim: SimConfig::default(),
        }
    }
}

fn default_device_id() -> String {
    "RL-CAR-SIM".to_string()
}
fn default_ssid() -> String {
    "rlcar-bench".to_string()
}
fn default_password() -> String {
    "rlcar-bench".to_string()
}
fn default_pair_after_ms() -> u64 {
    1500
}
fn default_join_polls() -> u32 {
    10
}
fn default_battery_volts() -> f32 {
    3.9
}

/// Return the path to `~/.rlcar/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".rlcar").join("config.toml")
}

/// Load the config from disk and apply environment overrides.  Returns
/// `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, CarError> {
    let mut cfg = load_from(&config_path())?;
    if let Some(cfg) = cfg.as_mut() {
        apply_env_overrides(cfg);
    }
    Ok(cfg)
}

/// Parse the config at a specific path, without environment overrides.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, CarError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| CarError::Config(format!("failed to read {}: {e}", path.display())))?;
    let cfg: Config = toml::from_str(&raw)
        .map_err(|e| CarError::Config(format!("failed to parse {}: {e}", path.display())))?;
    Ok(Some(cfg))
}

/// Defaults with the `RLCAR_*` overrides applied, used when no config file
/// is usable.
pub fn env_defaults() -> Config {
    let mut cfg = Config::default();
    apply_env_overrides(&mut cfg);
    cfg
}

/// Apply `RLCAR_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `RLCAR_DEVICE_ID` | `device_id` |
/// | `RLCAR_VIDEO_PORT` | `core.video.port` |
/// | `RLCAR_JOIN_TIMEOUT_MS` | `core.timing.join_timeout_ms` |
///
/// Values that do not parse are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("RLCAR_DEVICE_ID")
        && !v.is_empty()
    {
        cfg.device_id = v;
    }
    if let Ok(v) = std::env::var("RLCAR_VIDEO_PORT")
        && let Ok(port) = v.parse::<u16>()
    {
        cfg.core.video.port = port;
    }
    if let Ok(v) = std::env::var("RLCAR_JOIN_TIMEOUT_MS")
        && let Ok(ms) = v.parse::<u64>()
    {
        cfg.core.timing.join_timeout_ms = ms;
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn write_config(body: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        fs::create_dir_all(path.parent().unwrap()).expect("mkdir");
        let mut file = fs::File::create(&path).expect("create");
        file.write_all(body.as_bytes()).expect("write");
        (dir, path)
    }

    #[test]
    fn config_path_points_to_rlcar_dir() {
        let p = config_path_for_home("/home/testuser");
        assert!(p.to_string_lossy().contains(".rlcar"));
        assert!(p.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        assert!(load_from(&path).expect("no error").is_none());
    }

    #[test]
    fn empty_file_yields_stock_timing() {
        let (_dir, path) = write_config("");
        let cfg = load_from(&path).expect("load ok").expect("some");
        assert_eq!(cfg.core.timing.poll_interval_ms, 100);
        assert_eq!(cfg.core.video.period_ms, 66);
        assert_eq!(cfg.sim.pair_after_ms, 1500);
    }

    #[test]
    fn nested_tables_override_defaults() {
        let (_dir, path) = write_config(
            "device_id = \"RL-CAR-07\"\n\
             [core.video]\nport = 8081\n\
             [core.motor]\nnominal_volts = 3.7\n\
             [sim]\nssid = \"garage\"\n",
        );
        let cfg = load_from(&path).expect("load ok").expect("some");
        assert_eq!(cfg.core.video.port, 8081);
        assert_eq!(cfg.core.video.write_timeout_ms, 2000);
        assert_eq!(cfg.core.motor.nominal_volts, 3.7);
        assert_eq!(cfg.sim.ssid, "garage");
        assert_eq!(cfg.sim.password, "rlcar-bench");
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let (_dir, path) = write_config("device_id = [");
        assert!(matches!(load_from(&path), Err(CarError::Config(_))));
    }

    #[test]
    fn sim_debug_redacts_password() {
        let sim = SimConfig {
            password: "super-secret".to_string(),
            ..SimConfig::default()
        };
        let debug_str = format!("{:?}", sim);
        assert!(!debug_str.contains("super-secret"));
        assert!(debug_str.contains("<redacted>"));
    }

    // All env-var cases share one test so they never race each other.
    #[test]
    fn apply_env_overrides_reads_rlcar_vars() {
        // SAFETY: the only test in this crate touching RLCAR_* variables.
        unsafe {
            std::env::set_var("RLCAR_DEVICE_ID", "RL-CAR-42");
            std::env::set_var("RLCAR_VIDEO_PORT", "8082");
            std::env::set_var("RLCAR_JOIN_TIMEOUT_MS", "not-a-number");
        }
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.device_id, "RL-CAR-42");
        assert_eq!(cfg.core.video.port, 8082);
        assert_eq!(cfg.core.timing.join_timeout_ms, 15_000, "invalid value is ignored");

        unsafe { std::env::set_var("RLCAR_JOIN_TIMEOUT_MS", "5000") };
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.core.timing.join_timeout_ms, 5000);

        // Defaults used after a missing or unparsable file carry them too.
        let fallback = env_defaults();
        assert_eq!(fallback.device_id, "RL-CAR-42");
        assert_eq!(fallback.core.video.port, 8082);
        assert_eq!(fallback.core.timing.join_timeout_ms, 5000);

        unsafe {
            std::env::remove_var("RLCAR_DEVICE_ID");
            std::env::remove_var("RLCAR_VIDEO_PORT");
            std::env::remove_var("RLCAR_JOIN_TIMEOUT_MS");
        }
    }
}
