//! `rlcar-types` – shared vocabulary of the vehicle control core.
//!
//! Every other crate in the workspace speaks in these types: the remote
//! control state written over the pairing channel, the motor command the
//! drive loop computes from it, the battery curve, network credentials, the
//! link status string reported back to the operator, and the [`CarError`]
//! returned by hardware collaborators.

pub mod config;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use config::{BatteryCurve, CoreConfig, MotorConfig, TimingConfig, VideoConfig};

/// Rotation sense applied to both wheels of the differential pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Forward,
    Backward,
}

impl Direction {
    /// Interpret the remote y-axis: negative values drive backward, anything
    /// else drives forward.
    pub fn from_axis(y: i8) -> Self {
        if y < 0 {
            Direction::Backward
        } else {
            Direction::Forward
        }
    }
}

/// Motor-bridge current decay (braking) behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecayMode {
    /// Coast: the undriven input is held low.
    #[default]
    Fast,
    /// Brake: one input is held high and the other is PWM'd inverted.
    Slow,
}

impl DecayMode {
    /// Decode the remote decay-mode byte: `0` is fast decay, anything else
    /// slow decay.
    pub fn from_code(code: i8) -> Self {
        if code == 0 {
            DecayMode::Fast
        } else {
            DecayMode::Slow
        }
    }
}

/// Remote-control inputs as last written by the operator.
///
/// Raw values are percentages; the accessors normalise them for the mixer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RemoteControl {
    /// Steering, `-100` (full left) ..= `100` (full right).
    pub x: i8,
    /// Direction axis, sign selects forward/backward.
    pub y: i8,
    /// Throttle, `0 ..= 100`.
    pub speed: i8,
    /// Decay-mode code, `0` or `1`.
    pub decay_mode: i8,
}

impl RemoteControl {
    /// Steering normalised to `[-1, 1]`.
    pub fn steering(&self) -> f32 {
        (f32::from(self.x) / 100.0).clamp(-1.0, 1.0)
    }

    /// Throttle normalised to `[0, 1]`.
    pub fn throttle(&self) -> f32 {
        (f32::from(self.speed) / 100.0).clamp(0.0, 1.0)
    }

    pub fn direction(&self) -> Direction {
        Direction::from_axis(self.y)
    }

    pub fn decay(&self) -> DecayMode {
        DecayMode::from_code(self.decay_mode)
    }
}

/// Per-wheel speeds for one drive iteration.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MotorCommand {
    /// Left wheel speed in `[0, 1]`.
    pub left: f32,
    /// Right wheel speed in `[0, 1]`.
    pub right: f32,
    pub direction: Direction,
}

impl MotorCommand {
    /// Differential mix of a steering input `x` (`-1..=1`, positive turns
    /// right) and a speed command (`0..=1`).
    ///
    /// The outer wheel keeps the commanded speed while the inner wheel slows
    /// down; at full lock the inner wheel is exactly `0`, never negative.
    ///
    /// ```
    /// use rlcar_types::{Direction, MotorCommand};
    ///
    /// let cmd = MotorCommand::mix(1.0, Direction::Forward, 0.8);
    /// assert_eq!(cmd.right, 0.0);
    /// assert!((cmd.left - 0.8).abs() < 1e-6);
    /// ```
    pub fn mix(x: f32, direction: Direction, speed: f32) -> Self {
        let x = if x.is_nan() { 0.0 } else { x.clamp(-1.0, 1.0) };
        let speed = if speed.is_nan() { 0.0 } else { speed.clamp(0.0, 1.0) };

        let denom = 1.0 + x.abs();
        let left = (speed * (1.0 + x) / denom).clamp(0.0, 1.0);
        let right = (speed * (1.0 - x) / denom).clamp(0.0, 1.0);

        Self {
            left,
            right,
            direction,
        }
    }

    /// Both wheels at rest.
    pub fn stopped() -> Self {
        Self::default()
    }

    pub fn is_stopped(&self) -> bool {
        self.left == 0.0 && self.right == 0.0
    }
}

/// One battery measurement.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BatterySample {
    pub volts: f32,
    /// State of charge in `[0, 100]`.
    pub percent: f32,
}

/// Network credentials received over the pairing channel.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Credentials {
    pub ssid: String,
    pub password: String,
}

impl Credentials {
    pub fn new(ssid: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            ssid: ssid.into(),
            password: password.into(),
        }
    }

    /// Both fields are present.
    pub fn is_complete(&self) -> bool {
        !self.ssid.is_empty() && !self.password.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("ssid", &self.ssid)
            .field(
                "password",
                if self.password.is_empty() { &"<not set>" } else { &"<redacted>" },
            )
            .finish()
    }
}

/// Link status reported to the operator through the pairing `status` slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkStatus {
    #[default]
    Idle,
    /// Credentials were written and validated, waiting to be consumed.
    Configured,
    /// A network join is in progress.
    Connecting,
    Connected,
    /// The last join attempt timed out.
    Failed,
    /// The monitor observed a pairing or network drop.
    Lost,
}

impl LinkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkStatus::Idle => "idle",
            LinkStatus::Configured => "configured",
            LinkStatus::Connecting => "connecting",
            LinkStatus::Connected => "connected",
            LinkStatus::Failed => "failed",
            LinkStatus::Lost => "lost",
        }
    }
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Health of both links, evaluated fresh from the collaborators each time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnectivitySnapshot {
    pub pairing_connected: bool,
    pub credentials_available: bool,
    pub network_connected: bool,
}

impl ConnectivitySnapshot {
    /// Both the pairing channel and the network link are up.
    pub fn is_healthy(&self) -> bool {
        self.pairing_connected && self.network_connected
    }
}

/// Error type shared by hardware collaborators and workers.
#[derive(Error, Debug)]
pub enum CarError {
    #[error("Hardware Fault on {component}: {details}")]
    HardwareFault { component: String, details: String },

    /// Every frame buffer is currently checked out.
    #[error("no frame buffer available")]
    FrameUnavailable,

    #[error("Network Error: {0}")]
    Network(String),

    #[error("Stream Error: {0}")]
    Stream(String),

    #[error("Configuration Error: {0}")]
    Config(String),
}

impl CarError {
    pub fn hardware(component: impl Into<String>, details: impl Into<String>) -> Self {
        CarError::HardwareFault {
            component: component.into(),
            details: details.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-6;

    #[test]
    fn mix_keeps_both_wheels_in_unit_range() {
        for xi in -20..=20 {
            for si in 0..=10 {
                let x = xi as f32 / 20.0;
                let speed = si as f32 / 10.0;
                let cmd = MotorCommand::mix(x, Direction::Forward, speed);
                assert!((0.0..=1.0).contains(&cmd.left), "left {} at x={x} s={speed}", cmd.left);
                assert!((0.0..=1.0).contains(&cmd.right), "right {} at x={x} s={speed}", cmd.right);
            }
        }
    }

    #[test]
    fn mix_full_lock_stops_inner_wheel() {
        let right_turn = MotorCommand::mix(1.0, Direction::Forward, 0.6);
        assert_eq!(right_turn.right, 0.0);
        assert!((right_turn.left - 0.6).abs() < EPS);

        let left_turn = MotorCommand::mix(-1.0, Direction::Backward, 0.6);
        assert_eq!(left_turn.left, 0.0);
        assert!((left_turn.right - 0.6).abs() < EPS);
        assert_eq!(left_turn.direction, Direction::Backward);
    }

    #[test]
    fn mix_straight_ahead_matches_speed() {
        let cmd = MotorCommand::mix(0.0, Direction::Forward, 0.42);
        assert!((cmd.left - 0.42).abs() < EPS);
        assert!((cmd.right - 0.42).abs() < EPS);
    }

    #[test]
    fn mix_clamps_out_of_range_inputs() {
        let cmd = MotorCommand::mix(3.0, Direction::Forward, 7.0);
        assert_eq!(cmd.right, 0.0);
        assert!((cmd.left - 1.0).abs() < EPS);

        let nan = MotorCommand::mix(f32::NAN, Direction::Forward, f32::NAN);
        assert!(nan.is_stopped());
    }

    #[test]
    fn remote_control_normalisation() {
        let rc = RemoteControl {
            x: -50,
            y: -100,
            speed: 75,
            decay_mode: 1,
        };
        assert!((rc.steering() + 0.5).abs() < EPS);
        assert!((rc.throttle() - 0.75).abs() < EPS);
        assert_eq!(rc.direction(), Direction::Backward);
        assert_eq!(rc.decay(), DecayMode::Slow);

        let neutral = RemoteControl::default();
        assert_eq!(neutral.direction(), Direction::Forward);
        assert_eq!(neutral.decay(), DecayMode::Fast);
        assert_eq!(neutral.throttle(), 0.0);
    }

    #[test]
    fn negative_speed_byte_is_no_throttle() {
        let rc = RemoteControl {
            speed: -20,
            ..RemoteControl::default()
        };
        assert_eq!(rc.throttle(), 0.0);
    }

    #[test]
    fn credentials_debug_redacts_password() {
        let creds = Credentials::new("garage", "hunter2");
        let debug_str = format!("{creds:?}");
        assert!(debug_str.contains("garage"));
        assert!(!debug_str.contains("hunter2"), "password must not appear in debug output");
        assert!(debug_str.contains("<redacted>"));
        assert!(creds.is_complete());
        assert!(!Credentials::new("garage", "").is_complete());
    }

    #[test]
    fn link_status_strings() {
        assert_eq!(LinkStatus::Configured.to_string(), "configured");
        assert_eq!(LinkStatus::Lost.as_str(), "lost");
        let json = serde_json::to_string(&LinkStatus::Connecting).unwrap();
        assert_eq!(json, "\"connecting\"");
    }

    #[test]
    fn snapshot_health_needs_both_links() {
        let mut snap = ConnectivitySnapshot {
            pairing_connected: true,
            credentials_available: false,
            network_connected: true,
        };
        assert!(snap.is_healthy());
        snap.network_connected = false;
        assert!(!snap.is_healthy());
    }

    #[test]
    fn motor_command_serialises_direction_lowercase() {
        let cmd = MotorCommand::mix(0.0, Direction::Backward, 0.5);
        let json = serde_json::to_string(&cmd).unwrap();
        assert!(json.contains("\"backward\""));
        let back: MotorCommand = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cmd);
    }

    #[test]
    fn car_error_display() {
        let err = CarError::hardware("motor", "sleep pin stuck");
        assert!(err.to_string().contains("motor"));
        assert!(CarError::FrameUnavailable.to_string().contains("frame buffer"));
    }
}
