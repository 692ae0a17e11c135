//! `rlcar-runtime` – The Armed Car
//!
//! The workers that only run while the car is online, and the process-level
//! [`Core`][car::Core] that launches them next to the connector and monitor.
//!
//! # Modules
//!
//! - [`drive`] – [`DriveControl`][drive::DriveControl]: battery-limited
//!   differential drive from the remote-control inputs.
//! - [`video`] – [`VideoWorker`][video::VideoWorker]: one-client MJPEG
//!   server, one frame per step.
//! - [`mjpeg`] – multipart framing of the stream.
//! - [`car`] – [`Core::init`][car::Core::init] / [`Core::start`][car::Core::start]
//!   and the [`CoreHandle`][car::CoreHandle] used to shut everything down.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: the global
//!   `tracing` subscriber.

pub mod car;
pub mod drive;
pub mod mjpeg;
pub mod telemetry;
pub mod video;

pub use car::{CarContext, Core, CoreHandle};
pub use drive::DriveControl;
pub use telemetry::init_tracing;
pub use video::VideoWorker;
