//! [`Monitor`] – link watchdog for the armed car.
//!
//! Runs under `RUN`.  Every step reads a fresh [`ConnectivitySnapshot`]; on
//! loss of either link it clears the matching state flag, drops `RUN` (which
//! stops itself, drive control and video) and raises `CONNECT` to hand
//! control back to the [`Connector`][crate::connector::Connector].

use std::sync::Arc;

use async_trait::async_trait;
use rlcar_hal::{NetworkLink, PairingChannel};
use rlcar_middleware::{FlagBus, Flags};
use rlcar_types::{ConnectivitySnapshot, LinkStatus};
use tracing::{debug, info, warn};

use crate::worker::Worker;

pub struct Monitor {
    pairing: Arc<dyn PairingChannel>,
    network: Arc<dyn NetworkLink>,
    bus: FlagBus,
    losses: u32,
}

impl Monitor {
    pub const GATE: Flags = Flags::RUN;

    pub fn new(
        pairing: Arc<dyn PairingChannel>,
        network: Arc<dyn NetworkLink>,
        bus: FlagBus,
    ) -> Self {
        Self {
            pairing,
            network,
            bus,
            losses: 0,
        }
    }

    /// Read both links right now.
    pub fn snapshot(&self) -> ConnectivitySnapshot {
        ConnectivitySnapshot {
            pairing_connected: self.pairing.is_connected(),
            credentials_available: self.pairing.credentials_available(),
            network_connected: self.network.is_connected(),
        }
    }

    /// Link losses detected so far.
    pub fn losses(&self) -> u32 {
        self.losses
    }
}

#[async_trait]
impl Worker for Monitor {
    async fn step(&mut self) {
        let snapshot = self.snapshot();
        if snapshot.is_healthy() {
            return;
        }

        if !snapshot.pairing_connected {
            self.bus.clear(Flags::PAIRED);
        }
        if !snapshot.network_connected {
            self.bus.clear(Flags::LINKED);
        }
        if !self.bus.hand_off(Flags::RUN, Flags::CONNECT) {
            debug!("run already dropped, connector left alone");
            return;
        }

        self.losses += 1;
        warn!(
            pairing = snapshot.pairing_connected,
            network = snapshot.network_connected,
            losses = self.losses,
            "link lost, stopping workers"
        );
        self.pairing.publish_status(LinkStatus::Lost);
    }

    async fn teardown(&mut self) {
        info!("monitor waiting for reconnection");
    }
}
