//! [`DriveControl`] – the armed car's control loop.
//!
//! Each step refreshes the battery, scales the operator's throttle by a
//! battery-dependent speed ceiling, mixes it with the steering input and
//! applies the result to the motor bridge.  The battery percentage goes back
//! over the pairing channel on every step.

use std::sync::Arc;

use async_trait::async_trait;
use rlcar_hal::{BatterySampler, MotorBridge, PairingChannel};
use rlcar_kernel::Worker;
use rlcar_types::{DecayMode, MotorCommand, MotorConfig, RemoteControl};
use tracing::{debug, error, warn};

/// Fraction of full throttle the bridge may use at `battery_volts`.
///
/// `nominal / battery`, clamped to `[0, 1]`, so a fresh pack above the
/// motors' nominal voltage is throttled down and a depleted one is allowed
/// full duty.  A non-positive or missing reading yields `0`.
pub fn speed_ceiling(nominal_volts: f32, battery_volts: f32) -> f32 {
    if battery_volts.is_nan() || battery_volts <= 0.0 || nominal_volts.is_nan() {
        return 0.0;
    }
    (nominal_volts / battery_volts).clamp(0.0, 1.0)
}

/// Motor command and decay mode for one set of inputs.
pub fn compute(
    remote: &RemoteControl,
    battery_volts: f32,
    nominal_volts: f32,
) -> (MotorCommand, DecayMode) {
    let speed = speed_ceiling(nominal_volts, battery_volts) * remote.throttle();
    let command = MotorCommand::mix(remote.steering(), remote.direction(), speed);
    (command, remote.decay())
}

pub struct DriveControl {
    pairing: Arc<dyn PairingChannel>,
    motor: Box<dyn MotorBridge>,
    battery: Box<dyn BatterySampler>,
    nominal_volts: f32,
    last: Option<MotorCommand>,
}

impl DriveControl {
    pub fn new(
        pairing: Arc<dyn PairingChannel>,
        motor: Box<dyn MotorBridge>,
        battery: Box<dyn BatterySampler>,
        config: &MotorConfig,
    ) -> Self {
        Self {
            pairing,
            motor,
            battery,
            nominal_volts: config.nominal_volts,
            last: None,
        }
    }

    /// Command applied by the most recent step.
    pub fn last_command(&self) -> Option<MotorCommand> {
        self.last
    }
}

#[async_trait]
impl Worker for DriveControl {
    async fn setup(&mut self) {
        self.last = None;
        if let Err(e) = self.motor.start() {
            error!(error = %e, "motor bridge failed to wake");
        }
    }

    async fn step(&mut self) {
        self.battery.read();
        let battery = self.battery.sample();
        let remote = self.pairing.remote_control();
        let (command, mode) = compute(&remote, battery.volts, self.nominal_volts);

        self.pairing.publish_battery(battery.percent);

        self.motor.set_decay_mode(mode);
        match self.motor.apply(&command) {
            Ok(()) => self.last = Some(command),
            Err(e) => warn!(error = %e, "motor command rejected"),
        }
        debug!(
            volts = battery.volts,
            percent = battery.percent,
            x = remote.x,
            y = remote.y,
            speed = remote.speed,
            left = command.left,
            right = command.right,
            ?mode,
            "drive"
        );
    }

    async fn teardown(&mut self) {
        if let Err(e) = self.motor.stop() {
            error!(error = %e, "motor bridge failed to stop");
        }
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use rlcar_hal::sim::{SimBattery, SimMotor, SimPairing};
    use rlcar_types::{BatteryCurve, Direction};

    use super::*;

    fn remote(x: i8, y: i8, speed: i8, decay_mode: i8) -> RemoteControl {
        RemoteControl { x, y, speed, decay_mode }
    }

    #[test]
    fn ceiling_scales_with_battery() {
        assert!((speed_ceiling(3.0, 4.0) - 0.75).abs() < 1e-6);
        assert_eq!(speed_ceiling(3.0, 3.0), 1.0);
        assert_eq!(speed_ceiling(3.0, 2.5), 1.0, "clamped at full duty");
        assert_eq!(speed_ceiling(3.0, 0.0), 0.0);
        assert_eq!(speed_ceiling(3.0, -1.0), 0.0);
        assert_eq!(speed_ceiling(3.0, f32::NAN), 0.0);
    }

    #[test]
    fn ceiling_is_monotonic_in_battery_drain() {
        let mut previous = 0.0;
        for tenth in (30..=50).rev() {
            let ceiling = speed_ceiling(3.0, tenth as f32 / 10.0);
            assert!(ceiling >= previous);
            previous = ceiling;
        }
    }

    #[test]
    fn straight_ahead_drives_both_wheels_equally() {
        let (command, mode) = compute(&remote(0, 100, 100, 0), 3.0, 3.0);
        assert_eq!(command.left, 1.0);
        assert_eq!(command.right, 1.0);
        assert_eq!(command.direction, Direction::Forward);
        assert_eq!(mode, DecayMode::Fast);
    }

    #[test]
    fn full_lock_stops_inner_wheel() {
        let (right_turn, _) = compute(&remote(100, 100, 80, 1), 3.0, 3.0);
        assert_eq!(right_turn.right, 0.0);
        assert!((right_turn.left - 0.8).abs() < 1e-6);

        let (left_turn, mode) = compute(&remote(-100, -100, 80, 1), 3.0, 3.0);
        assert_eq!(left_turn.left, 0.0);
        assert_eq!(left_turn.direction, Direction::Backward);
        assert_eq!(mode, DecayMode::Slow);
    }

    #[test]
    fn wheel_speeds_stay_in_unit_range() {
        for x in (-100..=100).step_by(5) {
            for speed in (0..=100).step_by(10) {
                let (command, _) = compute(&remote(x as i8, 100, speed as i8, 0), 3.0, 3.0);
                assert!((0.0..=1.0).contains(&command.left), "x={x} speed={speed}");
                assert!((0.0..=1.0).contains(&command.right), "x={x} speed={speed}");
            }
        }
    }

    #[test]
    fn dead_battery_stops_motors() {
        let (command, _) = compute(&remote(30, 100, 100, 0), 0.0, 3.0);
        assert!(command.is_stopped());
    }

    fn worker(volts: f32) -> (DriveControl, Arc<SimPairing>, SimMotor, SimBattery) {
        let pairing = Arc::new(SimPairing::new("RL-CAR-TEST"));
        let motor = SimMotor::new();
        let battery = SimBattery::new(volts, BatteryCurve::new(3.3, 4.2));
        let drive = DriveControl::new(
            pairing.clone(),
            Box::new(motor.clone()),
            Box::new(battery.clone()),
            &MotorConfig { nominal_volts: 3.0 },
        );
        (drive, pairing, motor, battery)
    }

    #[tokio::test]
    async fn step_applies_remote_inputs() {
        let (mut drive, pairing, motor, _battery) = worker(3.75);
        drive.setup().await;
        pairing.steer(0, 100, 50, 1);
        drive.step().await;

        let state = motor.state();
        assert!(state.awake);
        assert_eq!(state.mode, DecayMode::Slow);
        let applied = state.last.unwrap();
        assert!((applied.left - 0.4).abs() < 1e-6);
        assert!((applied.right - 0.4).abs() < 1e-6);
        assert_eq!(drive.last_command(), Some(applied));
        assert!((pairing.store().battery.get() - 50.0).abs() < 1e-3);
    }

    #[tokio::test]
    async fn battery_is_read_every_step() {
        let (mut drive, pairing, _motor, battery) = worker(4.2);
        drive.setup().await;
        drive.step().await;
        assert_eq!(pairing.store().battery.get(), 100.0);

        battery.set_volts(3.3);
        drive.step().await;
        assert_eq!(pairing.store().battery.get(), 0.0);
        assert_eq!(battery.reads(), 2);
    }

    #[tokio::test]
    async fn teardown_stops_and_sleeps_bridge() {
        let (mut drive, pairing, motor, _battery) = worker(3.6);
        drive.setup().await;
        pairing.steer(40, 100, 100, 0);
        drive.step().await;
        assert!(!motor.state().last.unwrap().is_stopped());

        drive.teardown().await;
        let state = motor.state();
        assert!(!state.awake);
        assert!(state.last.unwrap().is_stopped());
        assert_eq!((state.starts, state.stops), (1, 1));
        assert_eq!(drive.last_command(), None);
    }

    #[tokio::test]
    async fn step_without_setup_is_rejected_by_bridge() {
        let (mut drive, pairing, motor, _battery) = worker(3.6);
        pairing.steer(0, 100, 100, 0);
        drive.step().await;
        assert_eq!(motor.state().applied, 0);
        assert_eq!(drive.last_command(), None);
    }
}
