//! Tunables of the control core.
//!
//! Every field has a default, so an empty TOML table (or no file at all)
//! yields the stock timing of the vehicle. Durations are stored as integer
//! milliseconds and exposed as [`Duration`]s through accessors.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Full configuration consumed by the core.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CoreConfig {
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub video: VideoConfig,
    #[serde(default)]
    pub motor: MotorConfig,
    #[serde(default)]
    pub battery: BatteryCurve,
}

/// Polling cadence and timeouts of the connectivity workers and the drive
/// loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Interval between pairing / credential / join status polls.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// How long a network join may take before the attempt is abandoned.
    #[serde(default = "default_join_timeout_ms")]
    pub join_timeout_ms: u64,
    #[serde(default = "default_connector_period_ms")]
    pub connector_period_ms: u64,
    #[serde(default = "default_monitor_period_ms")]
    pub monitor_period_ms: u64,
    #[serde(default = "default_drive_period_ms")]
    pub drive_period_ms: u64,
}

impl TimingConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }

    pub fn connector_period(&self) -> Duration {
        Duration::from_millis(self.connector_period_ms)
    }

    pub fn monitor_period(&self) -> Duration {
        Duration::from_millis(self.monitor_period_ms)
    }

    pub fn drive_period(&self) -> Duration {
        Duration::from_millis(self.drive_period_ms)
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            join_timeout_ms: default_join_timeout_ms(),
            connector_period_ms: default_connector_period_ms(),
            monitor_period_ms: default_monitor_period_ms(),
            drive_period_ms: default_drive_period_ms(),
        }
    }
}

/// MJPEG streaming server settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoConfig {
    /// TCP port of the stream (`0` picks an ephemeral port).
    #[serde(default = "default_video_port")]
    pub port: u16,
    /// One frame is pushed per period (~15 fps by default).
    #[serde(default = "default_video_period_ms")]
    pub period_ms: u64,
    /// A client that cannot absorb a frame within this window is dropped.
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,
}

impl VideoConfig {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            port: default_video_port(),
            period_ms: default_video_period_ms(),
            write_timeout_ms: default_write_timeout_ms(),
        }
    }
}

/// Electrical rating of the drive motors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotorConfig {
    /// Voltage the motors are rated for; the drive loop scales the PWM
    /// ceiling by `nominal / battery` so a full pack never over-drives them.
    #[serde(default = "default_nominal_volts")]
    pub nominal_volts: f32,
}

impl Default for MotorConfig {
    fn default() -> Self {
        Self {
            nominal_volts: default_nominal_volts(),
        }
    }
}

/// Linear state-of-charge curve between an empty and a full pack voltage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatteryCurve {
    #[serde(default = "default_empty_volts")]
    pub empty_volts: f32,
    #[serde(default = "default_full_volts")]
    pub full_volts: f32,
}

impl BatteryCurve {
    pub fn new(empty_volts: f32, full_volts: f32) -> Self {
        Self {
            empty_volts,
            full_volts,
        }
    }

    /// State of charge for `volts`: `0` at or below empty, `100` at or above
    /// full, linear in between.
    ///
    /// ```
    /// use rlcar_types::BatteryCurve;
    ///
    /// let curve = BatteryCurve::new(3.0, 4.0);
    /// assert_eq!(curve.percent(3.5), 50.0);
    /// ```
    pub fn percent(&self, volts: f32) -> f32 {
        if volts.is_nan() || volts <= self.empty_volts {
            0.0
        } else if volts >= self.full_volts {
            100.0
        } else {
            let t = (volts - self.empty_volts) / (self.full_volts - self.empty_volts);
            (t * 100.0).clamp(0.0, 100.0)
        }
    }
}

impl Default for BatteryCurve {
    fn default() -> Self {
        Self {
            empty_volts: default_empty_volts(),
            full_volts: default_full_volts(),
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    100
}
fn default_join_timeout_ms() -> u64 {
    15_000
}
fn default_connector_period_ms() -> u64 {
    100
}
fn default_monitor_period_ms() -> u64 {
    100
}
fn default_drive_period_ms() -> u64 {
    500
}
fn default_video_port() -> u16 {
    81
}
fn default_video_period_ms() -> u64 {
    66
}
fn default_write_timeout_ms() -> u64 {
    2_000
}
fn default_nominal_volts() -> f32 {
    3.0
}
fn default_empty_volts() -> f32 {
    3.3
}
fn default_full_volts() -> f32 {
    4.2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_vehicle_timing() {
        let cfg = CoreConfig::default();
        assert_eq!(cfg.timing.poll_interval(), Duration::from_millis(100));
        assert_eq!(cfg.timing.join_timeout(), Duration::from_secs(15));
        assert_eq!(cfg.timing.drive_period(), Duration::from_millis(500));
        assert_eq!(cfg.video.port, 81);
        assert_eq!(cfg.video.period(), Duration::from_millis(66));
        assert_eq!(cfg.video.write_timeout(), Duration::from_secs(2));
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let cfg: CoreConfig = toml::from_str(
            r#"
            [timing]
            join_timeout_ms = 500

            [video]
            port = 8081
            "#,
        )
        .unwrap();
        assert_eq!(cfg.timing.join_timeout_ms, 500);
        assert_eq!(cfg.timing.poll_interval_ms, 100);
        assert_eq!(cfg.video.port, 8081);
        assert_eq!(cfg.video.period_ms, 66);
        assert_eq!(cfg.battery, BatteryCurve::default());
    }

    #[test]
    fn empty_toml_is_default() {
        let cfg: CoreConfig = toml::from_str("").unwrap();
        assert_eq!(cfg, CoreConfig::default());
    }

    #[test]
    fn percent_is_clamped_at_both_ends() {
        let curve = BatteryCurve::new(3.3, 4.2);
        assert_eq!(curve.percent(3.3), 0.0);
        assert_eq!(curve.percent(2.0), 0.0);
        assert_eq!(curve.percent(4.2), 100.0);
        assert_eq!(curve.percent(5.0), 100.0);
        assert_eq!(curve.percent(f32::NAN), 0.0);
    }

    #[test]
    fn percent_midpoint_is_fifty() {
        let curve = BatteryCurve::new(3.0, 4.0);
        assert!((curve.percent(3.5) - 50.0).abs() < 1e-4);
    }

    #[test]
    fn percent_is_monotonic_between_thresholds() {
        let curve = BatteryCurve::default();
        let mut last = curve.percent(curve.empty_volts);
        let steps = 90;
        for i in 1..=steps {
            let v = curve.empty_volts
                + (curve.full_volts - curve.empty_volts) * i as f32 / steps as f32;
            let p = curve.percent(v);
            assert!(p >= last, "percent fell from {last} to {p} at {v} V");
            last = p;
        }
        assert!((last - 100.0).abs() < 1e-3);
    }

    #[test]
    fn degenerate_curve_does_not_divide_by_zero() {
        let curve = BatteryCurve::new(4.0, 4.0);
        assert_eq!(curve.percent(3.9), 0.0);
        assert_eq!(curve.percent(4.1), 100.0);
    }
}
