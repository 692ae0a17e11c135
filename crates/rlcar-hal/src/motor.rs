//! Differential motor pair behind a dual H-bridge.
//!
//! [`MotorBridge`] is the contract the drive loop talks to.  [`HBridge`] is
//! the reference implementation for a DRV8833-style driver: two channels of
//! two PWM inputs each plus a shared sleep line, abstracted by
//! [`PwmOutput`] so the pin mapping stays with board bring-up.

use rlcar_types::{CarError, DecayMode, Direction, MotorCommand};
use tracing::debug;

/// A two-wheel differential drive.
///
/// Owned by the drive worker alone, hence `&mut self`.
pub trait MotorBridge: Send {
    /// Wake the bridge from sleep.
    fn start(&mut self) -> Result<(), CarError>;

    /// Stop both wheels and put the bridge to sleep.
    fn stop(&mut self) -> Result<(), CarError>;

    fn set_decay_mode(&mut self, mode: DecayMode);

    /// Apply already-mixed wheel speeds.
    fn apply(&mut self, command: &MotorCommand) -> Result<(), CarError>;

    /// Mix steering `x` (`-1..=1`) and `speed` (`0..=1`) and apply the
    /// result.
    fn drive(&mut self, x: f32, direction: Direction, speed: f32) -> Result<(), CarError> {
        self.apply(&MotorCommand::mix(x, direction, speed))
    }
}

/// The four PWM inputs of a dual H-bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BridgePin {
    Ain1,
    Ain2,
    Bin1,
    Bin2,
}

/// Board-level PWM and sleep-line access.
pub trait PwmOutput: Send {
    /// Write an 8-bit duty cycle to `pin`.
    fn write_duty(&mut self, pin: BridgePin, duty: u8) -> Result<(), CarError>;

    /// Drive the sleep line (`true` = awake).
    fn set_awake(&mut self, awake: bool) -> Result<(), CarError>;
}

/// Duty pair `(in1, in2)` for one bridge channel.
///
/// Fast decay PWMs the driving input and holds the other low.  Slow decay
/// holds one input high and PWMs the other with the inverted duty.
pub fn channel_duties(direction: Direction, speed: f32, mode: DecayMode) -> (u8, u8) {
    let speed = if speed.is_nan() { 0.0 } else { speed.clamp(0.0, 1.0) };
    match mode {
        DecayMode::Fast => {
            let duty = (255.0 * speed) as u8;
            match direction {
                Direction::Forward => (duty, 0),
                Direction::Backward => (0, duty),
            }
        }
        DecayMode::Slow => {
            let duty = (255.0 * (1.0 - speed)) as u8;
            match direction {
                Direction::Forward => (255, duty),
                Direction::Backward => (duty, 255),
            }
        }
    }
}

/// DRV8833-style dual H-bridge.  Channel B drives the left wheel, channel A
/// the right wheel.
pub struct HBridge<P> {
    pwm: P,
    mode: DecayMode,
    awake: bool,
}

impl<P: PwmOutput> HBridge<P> {
    /// A sleeping bridge in fast-decay mode.
    pub fn new(pwm: P) -> Self {
        Self {
            pwm,
            mode: DecayMode::Fast,
            awake: false,
        }
    }

    pub fn decay_mode(&self) -> DecayMode {
        self.mode
    }

    pub fn is_awake(&self) -> bool {
        self.awake
    }

    pub fn pwm(&self) -> &P {
        &self.pwm
    }

    fn write_channel(
        &mut self,
        pins: (BridgePin, BridgePin),
        duties: (u8, u8),
    ) -> Result<(), CarError> {
        self.pwm.write_duty(pins.0, duties.0)?;
        self.pwm.write_duty(pins.1, duties.1)
    }
}

impl<P: PwmOutput> MotorBridge for HBridge<P> {
    fn start(&mut self) -> Result<(), CarError> {
        self.pwm.set_awake(true)?;
        self.awake = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), CarError> {
        self.write_channel((BridgePin::Ain1, BridgePin::Ain2), (0, 0))?;
        self.write_channel((BridgePin::Bin1, BridgePin::Bin2), (0, 0))?;
        self.pwm.set_awake(false)?;
        self.awake = false;
        Ok(())
    }

    fn set_decay_mode(&mut self, mode: DecayMode) {
        self.mode = mode;
    }

    fn apply(&mut self, command: &MotorCommand) -> Result<(), CarError> {
        if !self.awake {
            return Err(CarError::hardware("h_bridge", "bridge is asleep"));
        }
        let left = channel_duties(command.direction, command.left, self.mode);
        let right = channel_duties(command.direction, command.right, self.mode);
        debug!(?command, mode = ?self.mode, ?left, ?right, "h-bridge duties");
        self.write_channel((BridgePin::Bin1, BridgePin::Bin2), left)?;
        self.write_channel((BridgePin::Ain1, BridgePin::Ain2), right)
    }
}
