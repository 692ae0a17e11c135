//! `rlcar-hal` – Hardware Abstraction Layer
//!
//! Contracts for every peripheral the control core touches, plus reference
//! drivers and in-process simulations.
//!
//! # Modules
//!
//! - [`slot`] – [`Slot`][slot::Slot]: a locked value cell with optional
//!   bounds, and the [`SlotCodec`][slot::SlotCodec] byte codecs used by the
//!   pairing store.
//! - [`pairing`] – [`PairingStore`][pairing::PairingStore] holding the
//!   remotely writable fields, and the [`PairingChannel`][pairing::PairingChannel]
//!   contract of the short-range link.
//! - [`network`] – [`NetworkLink`][network::NetworkLink]: station-mode join,
//!   status, address and signal strength.
//! - [`motor`] – [`MotorBridge`][motor::MotorBridge] and the
//!   [`HBridge`][motor::HBridge] reference driver over [`PwmOutput`][motor::PwmOutput].
//! - [`battery`] – [`BatterySampler`][battery::BatterySampler] and the
//!   [`DividerBattery`][battery::DividerBattery] reference driver.
//! - [`camera`] – [`ImageSensor`][camera::ImageSensor] with driver-owned
//!   [`CameraFrame`][camera::CameraFrame] buffers.
//! - [`sim`] – simulated implementations of every contract, bundled in
//!   [`SimRig`][sim::SimRig].

pub mod battery;
pub mod camera;
pub mod motor;
pub mod network;
pub mod pairing;
pub mod sim;
pub mod slot;

pub use battery::{BatterySampler, DividerBattery, MillivoltSource};
pub use camera::{CameraFrame, ImageSensor};
pub use motor::{HBridge, MotorBridge, PwmOutput};
pub use network::NetworkLink;
pub use pairing::{PairingChannel, PairingStore};
pub use sim::{JoinBehavior, SimRig};
pub use slot::{Slot, SlotCodec};
