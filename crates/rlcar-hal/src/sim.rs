//! In-process simulated collaborators for tests and bench runs without a
//! vehicle.
//!
//! Every simulated device is a cheap clonable handle around shared state, so
//! a test can keep a handle after the device itself has moved into a worker.
//! [`SimRig`] bundles one of each.
//!
//! # Example
//!
//! ```rust
//! use rlcar_hal::network::NetworkLink;
//! use rlcar_hal::pairing::PairingChannel;
//! use rlcar_hal::sim::{JoinBehavior, SimRig};
//!
//! let rig = SimRig::new("RL-CAR-SIM").with_join(JoinBehavior::AfterPolls(1));
//! rig.pairing.set_connected(true);
//! rig.pairing.provision("garage", "hunter2");
//!
//! let creds = rig.pairing.take_credentials().expect("provisioned");
//! rig.network.connect(&creds, std::time::Duration::ZERO);
//! assert!(!rig.network.is_connected());
//! assert!(rig.network.is_connected());
//! ```

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use rlcar_types::{BatteryCurve, CarError, Credentials, DecayMode, MotorCommand};
use tracing::debug;

use crate::battery::BatterySampler;
use crate::camera::{CameraFrame, ImageSensor};
use crate::motor::MotorBridge;
use crate::network::NetworkLink;
use crate::pairing::{PairingChannel, PairingStore, RemoteField};

// ────────────────────────────────────────────────────────────────────────────
// Pairing
// ────────────────────────────────────────────────────────────────────────────

/// A pairing channel whose connection state and remote writes are driven by
/// the test (playing the operator's phone).
pub struct SimPairing {
    store: PairingStore,
    connected: AtomicBool,
}

impl SimPairing {
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            store: PairingStore::new(device_id),
            connected: AtomicBool::new(false),
        }
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Write ssid and password and commit them, as the operator app does.
    pub fn provision(&self, ssid: &str, password: &str) {
        self.store.remote_write(RemoteField::Ssid, ssid.as_bytes());
        self.store.remote_write(RemoteField::Password, password.as_bytes());
        self.store.remote_write(RemoteField::Apply, &[1]);
    }

    /// Write all four remote-control fields.
    pub fn steer(&self, x: i8, y: i8, speed: i8, decay_mode: i8) {
        self.store.remote_write(RemoteField::X, &[x as u8]);
        self.store.remote_write(RemoteField::Y, &[y as u8]);
        self.store.remote_write(RemoteField::Speed, &[speed as u8]);
        self.store.remote_write(RemoteField::DecayMode, &[decay_mode as u8]);
    }
}

impl PairingChannel for SimPairing {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn store(&self) -> &PairingStore {
        &self.store
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Network
// ────────────────────────────────────────────────────────────────────────────

/// How a simulated join resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinBehavior {
    /// The link comes up on the `n`-th status poll after the join request
    /// (`0` = the first poll already sees it up).
    AfterPolls(u32),
    /// The access point never answers.
    Never,
}

#[derive(Debug)]
struct NetState {
    behavior: JoinBehavior,
    connected: bool,
    /// Polls remaining before a pending join completes.
    pending: Option<u32>,
    connect_calls: u32,
    disconnect_calls: u32,
    last_ssid: Option<String>,
}

/// A network link whose join outcome is scripted by [`JoinBehavior`].
pub struct SimNetwork {
    state: Mutex<NetState>,
    address: IpAddr,
}

impl SimNetwork {
    pub fn new(behavior: JoinBehavior) -> Self {
        Self {
            state: Mutex::new(NetState {
                behavior,
                connected: false,
                pending: None,
                connect_calls: 0,
                disconnect_calls: 0,
                last_ssid: None,
            }),
            address: IpAddr::V4(Ipv4Addr::new(192, 168, 4, 2)),
        }
    }

    pub fn set_behavior(&self, behavior: JoinBehavior) {
        self.state.lock().behavior = behavior;
    }

    /// Simulate the access point going away.
    pub fn drop_link(&self) {
        let mut state = self.state.lock();
        state.connected = false;
        state.pending = None;
    }

    pub fn connect_calls(&self) -> u32 {
        self.state.lock().connect_calls
    }

    pub fn disconnect_calls(&self) -> u32 {
        self.state.lock().disconnect_calls
    }

    pub fn last_ssid(&self) -> Option<String> {
        self.state.lock().last_ssid.clone()
    }
}

impl NetworkLink for SimNetwork {
    fn connect(&self, credentials: &Credentials, timeout: Duration) -> bool {
        let mut state = self.state.lock();
        state.connect_calls += 1;
        if credentials.ssid.is_empty() {
            return false;
        }
        state.connected = false;
        state.last_ssid = Some(credentials.ssid.clone());
        state.pending = match state.behavior {
            JoinBehavior::AfterPolls(n) => Some(n),
            JoinBehavior::Never => None,
        };
        debug!(ssid = %credentials.ssid, behavior = ?state.behavior, "sim network: join requested");

        if timeout.is_zero() {
            return false;
        }
        if state.pending.take().is_some() {
            state.connected = true;
        }
        state.connected
    }

    fn disconnect(&self, _erase: bool) {
        let mut state = self.state.lock();
        state.disconnect_calls += 1;
        state.connected = false;
        state.pending = None;
    }

    fn is_connected(&self) -> bool {
        let mut state = self.state.lock();
        match state.pending {
            Some(0) => {
                state.pending = None;
                state.connected = true;
            }
            Some(n) => state.pending = Some(n - 1),
            None => {}
        }
        state.connected
    }

    fn local_address(&self) -> Option<IpAddr> {
        self.state.lock().connected.then_some(self.address)
    }

    fn signal_strength(&self) -> i32 {
        if self.state.lock().connected { -55 } else { 0 }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Motor
// ────────────────────────────────────────────────────────────────────────────

/// Everything the simulated bridge has been told.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimMotorState {
    pub awake: bool,
    pub mode: DecayMode,
    pub last: Option<MotorCommand>,
    pub applied: u32,
    pub starts: u32,
    pub stops: u32,
}

/// A motor bridge that records commands.  Rejects commands while asleep,
/// like the real bridge.
#[derive(Clone, Default)]
pub struct SimMotor {
    state: Arc<Mutex<SimMotorState>>,
}

impl SimMotor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SimMotorState {
        self.state.lock().clone()
    }
}

impl MotorBridge for SimMotor {
    fn start(&mut self) -> Result<(), CarError> {
        let mut state = self.state.lock();
        state.awake = true;
        state.starts += 1;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), CarError> {
        let mut state = self.state.lock();
        state.awake = false;
        state.last = Some(MotorCommand::stopped());
        state.stops += 1;
        Ok(())
    }

    fn set_decay_mode(&mut self, mode: DecayMode) {
        self.state.lock().mode = mode;
    }

    fn apply(&mut self, command: &MotorCommand) -> Result<(), CarError> {
        let mut state = self.state.lock();
        if !state.awake {
            return Err(CarError::hardware("sim_motor", "bridge is asleep"));
        }
        state.last = Some(*command);
        state.applied += 1;
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Battery
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
struct SimBatteryState {
    source_volts: f32,
    measured_volts: f32,
    reads: u32,
}

/// A battery whose pack voltage is set by the test.
#[derive(Clone)]
pub struct SimBattery {
    state: Arc<Mutex<SimBatteryState>>,
    curve: BatteryCurve,
}

impl SimBattery {
    pub fn new(volts: f32, curve: BatteryCurve) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimBatteryState {
                source_volts: volts,
                measured_volts: 0.0,
                reads: 0,
            })),
            curve,
        }
    }

    /// Change the pack voltage seen by the next [`read`][BatterySampler::read].
    pub fn set_volts(&self, volts: f32) {
        self.state.lock().source_volts = volts;
    }

    pub fn reads(&self) -> u32 {
        self.state.lock().reads
    }
}

impl BatterySampler for SimBattery {
    fn read(&mut self) {
        let mut state = self.state.lock();
        state.measured_volts = state.source_volts;
        state.reads += 1;
    }

    fn volts(&self) -> f32 {
        self.state.lock().measured_volts
    }

    fn percent(&self) -> f32 {
        self.curve.percent(self.volts())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Camera
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
struct SimCameraState {
    checked_out: Vec<bool>,
    frame_len: usize,
    captures: u64,
    releases: u64,
    faulty: bool,
}

/// A camera with a bounded buffer pool producing small JPEG-framed
/// payloads.
#[derive(Clone)]
pub struct SimCamera {
    state: Arc<Mutex<SimCameraState>>,
}

impl SimCamera {
    pub fn new(buffers: usize, frame_len: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimCameraState {
                checked_out: vec![false; buffers.max(1)],
                frame_len: frame_len.max(4),
                captures: 0,
                releases: 0,
                faulty: false,
            })),
        }
    }

    /// Make every capture fail with a hardware fault.
    pub fn set_faulty(&self, faulty: bool) {
        self.state.lock().faulty = faulty;
    }

    /// Buffers currently checked out.
    pub fn outstanding(&self) -> usize {
        self.state.lock().checked_out.iter().filter(|b| **b).count()
    }

    pub fn captures(&self) -> u64 {
        self.state.lock().captures
    }

    pub fn releases(&self) -> u64 {
        self.state.lock().releases
    }
}

impl ImageSensor for SimCamera {
    fn capture_frame(&mut self) -> Result<CameraFrame, CarError> {
        let mut state = self.state.lock();
        if state.faulty {
            return Err(CarError::hardware("sim_camera", "sensor not responding"));
        }
        let buffer = state
            .checked_out
            .iter()
            .position(|out| !out)
            .ok_or(CarError::FrameUnavailable)?;
        state.checked_out[buffer] = true;
        state.captures += 1;

        // SOI marker, a counter-derived body, EOI marker.
        let mut data = vec![(state.captures & 0xFF) as u8; state.frame_len];
        data[0] = 0xFF;
        data[1] = 0xD8;
        let n = data.len();
        data[n - 2] = 0xFF;
        data[n - 1] = 0xD9;

        Ok(CameraFrame {
            buffer,
            width: 160,
            height: 120,
            data,
        })
    }

    fn release_frame(&mut self, frame: CameraFrame) {
        let mut state = self.state.lock();
        if let Some(slot) = state.checked_out.get_mut(frame.buffer) {
            *slot = false;
        }
        state.releases += 1;
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SimRig builder
// ────────────────────────────────────────────────────────────────────────────

/// One simulated collaborator of each kind.
#[derive(Clone)]
pub struct SimRig {
    pub pairing: Arc<SimPairing>,
    pub network: Arc<SimNetwork>,
    pub motor: SimMotor,
    pub battery: SimBattery,
    pub camera: SimCamera,
}

impl SimRig {
    /// A rig that joins on the first poll, with a 3.9 V pack and two frame
    /// buffers.
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            pairing: Arc::new(SimPairing::new(device_id)),
            network: Arc::new(SimNetwork::new(JoinBehavior::AfterPolls(0))),
            motor: SimMotor::new(),
            battery: SimBattery::new(3.9, BatteryCurve::default()),
            camera: SimCamera::new(2, 512),
        }
    }

    pub fn with_join(self, behavior: JoinBehavior) -> Self {
        self.network.set_behavior(behavior);
        self
    }

    pub fn with_battery(mut self, volts: f32, curve: BatteryCurve) -> Self {
        self.battery = SimBattery::new(volts, curve);
        self
    }

    pub fn with_camera(mut self, buffers: usize, frame_len: usize) -> Self {
        self.camera = SimCamera::new(buffers, frame_len);
        self
    }
}
