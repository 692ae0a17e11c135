//! `rlcar-kernel` – Supervision & Scheduling
//!
//! Decides which workers run and when.  Nothing here touches a motor or a
//! camera; it only watches links and moves flags on the [`FlagBus`][rlcar_middleware::FlagBus].
//!
//! # Modules
//!
//! - [`worker`] – [`GatedDriver`][worker::GatedDriver]: runs a
//!   [`Worker`][worker::Worker]'s setup / step / teardown hooks under a gate
//!   flag, restarting the cycle every time the gate reopens.
//! - [`connector`] – [`Connector`][connector::Connector]: waits for the
//!   pairing link and credentials, joins the network within a deadline, and
//!   arms the downstream workers.
//! - [`monitor`] – [`Monitor`][monitor::Monitor]: disarms everything and
//!   re-arms the connector as soon as either link drops.

pub mod connector;
pub mod monitor;
pub mod worker;

pub use connector::{Connector, ConnectorState};
pub use monitor::Monitor;
pub use worker::{GatedDriver, Worker, WorkerDescriptor, WorkerHandle, WorkerPhase};
