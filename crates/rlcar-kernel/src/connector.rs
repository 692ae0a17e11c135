//! [`Connector`] – brings the car online.
//!
//! Each step walks WaitPairing → WaitCredentials → Joining and ends either
//! Armed (raise `LINKED | RUN`, drop its own `CONNECT` gate) or back where it
//! started, leaving the driver to call it again on the next period.  Every
//! wait polls at a fixed interval and bails out as soon as `CONNECT` drops.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rlcar_hal::{NetworkLink, PairingChannel};
use rlcar_middleware::{FlagBus, Flags};
use rlcar_types::{Credentials, LinkStatus, TimingConfig};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::worker::Worker;

/// Where the connector currently is in its bring-up sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectorState {
    WaitPairing,
    WaitCredentials,
    Joining,
    Armed,
}

/// Why a join attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JoinOutcome {
    Joined,
    TimedOut,
    PairingLost,
    Aborted,
}

pub struct Connector {
    pairing: Arc<dyn PairingChannel>,
    network: Arc<dyn NetworkLink>,
    bus: FlagBus,
    poll_interval: Duration,
    join_timeout: Duration,
    state: ConnectorState,
    attempts: u32,
}

impl Connector {
    pub fn new(
        pairing: Arc<dyn PairingChannel>,
        network: Arc<dyn NetworkLink>,
        bus: FlagBus,
        timing: &TimingConfig,
    ) -> Self {
        Self {
            pairing,
            network,
            bus,
            poll_interval: timing.poll_interval(),
            join_timeout: timing.join_timeout(),
            state: ConnectorState::WaitPairing,
            attempts: 0,
        }
    }

    /// Gate flag the connector must run under.
    pub const GATE: Flags = Flags::CONNECT;

    pub fn state(&self) -> ConnectorState {
        self.state
    }

    /// Join attempts issued so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Sleep one poll interval.  Returns `false` if the gate dropped.
    async fn pause(&self) -> bool {
        !self.bus.wait_cleared(Self::GATE, Some(self.poll_interval)).await
    }

    fn gate_open(&self) -> bool {
        self.bus.contains(Self::GATE)
    }

    async fn wait_pairing(&mut self) -> bool {
        self.state = ConnectorState::WaitPairing;
        debug!("waiting for pairing link");
        loop {
            if !self.gate_open() {
                return false;
            }
            if self.pairing.is_connected() {
                self.bus.set(Flags::PAIRED);
                info!("pairing link up");
                return true;
            }
            if !self.pause().await {
                return false;
            }
        }
    }

    async fn wait_credentials(&mut self) -> Option<Credentials> {
        self.state = ConnectorState::WaitCredentials;
        debug!("waiting for credentials");
        loop {
            if !self.gate_open() {
                return None;
            }
            if !self.pairing.is_connected() {
                self.bus.clear(Flags::PAIRED);
                info!("pairing link lost while waiting for credentials");
                return None;
            }
            if self.pairing.credentials_available() {
                if let Some(credentials) = self.pairing.take_credentials() {
                    return Some(credentials);
                }
            }
            if !self.pause().await {
                return None;
            }
        }
    }

    async fn join(&mut self, credentials: &Credentials) -> JoinOutcome {
        self.state = ConnectorState::Joining;
        self.attempts += 1;
        info!(ssid = %credentials.ssid, attempt = self.attempts, "joining network");
        self.pairing.publish_status(LinkStatus::Connecting);
        self.network.connect(credentials, Duration::ZERO);

        let deadline = Instant::now() + self.join_timeout;
        loop {
            if self.network.is_connected() {
                return JoinOutcome::Joined;
            }
            if !self.pairing.is_connected() {
                self.bus.clear(Flags::PAIRED);
                return JoinOutcome::PairingLost;
            }
            if Instant::now() >= deadline {
                return JoinOutcome::TimedOut;
            }
            if !self.pause().await {
                return JoinOutcome::Aborted;
            }
        }
    }

    fn arm(&mut self) {
        if !self.bus.hand_off(Self::GATE, Flags::LINKED | Flags::RUN) {
            debug!("gate dropped as the join completed, not arming");
            self.network.disconnect(false);
            return;
        }
        self.state = ConnectorState::Armed;
        let ip = self
            .network
            .local_address()
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| "-".to_string());
        info!(ip = %ip, rssi = self.network.signal_strength(), "network joined, workers armed");
        self.pairing.publish_status(LinkStatus::Connected);
    }
}

#[async_trait]
impl Worker for Connector {
    async fn setup(&mut self) {
        self.bus.clear(Flags::PAIRED | Flags::LINKED | Flags::RUN);
        self.state = ConnectorState::WaitPairing;
        debug!("connector reset");
    }

    async fn step(&mut self) {
        if !self.bus.contains(Flags::PAIRED) && !self.wait_pairing().await {
            return;
        }

        let Some(credentials) = self.wait_credentials().await else {
            return;
        };

        match self.join(&credentials).await {
            JoinOutcome::Joined => self.arm(),
            JoinOutcome::Aborted => {
                info!("join abandoned, gate dropped");
                self.network.disconnect(false);
            }
            outcome => {
                warn!(
                    ?outcome,
                    timeout_ms = self.join_timeout.as_millis() as u64,
                    "network join failed, retrying"
                );
                self.pairing.publish_status(LinkStatus::Failed);
                self.network.disconnect(false);
            }
        }
    }

    async fn teardown(&mut self) {
        info!(state = ?self.state, "connector idle until re-armed");
    }
}
