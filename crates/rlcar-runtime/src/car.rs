//! [`Core`] – wires the collaborators to the four gated workers.
//!
//! ```text
//!             CONNECT                      RUN
//!   ┌───────────┐ arms ┌─────────┐ ┌───────────────┐ ┌─────────────┐
//!   │ connector │ ───▶ │ monitor │ │ drive control │ │ video       │
//!   └───────────┘ ◀─── └─────────┘ └───────────────┘ └─────────────┘
//!                re-arms on link loss
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use rlcar_hal::sim::SimRig;
use rlcar_hal::{BatterySampler, ImageSensor, MotorBridge, NetworkLink, PairingChannel};
use rlcar_kernel::{
    Connector, GatedDriver, Monitor, Worker, WorkerDescriptor, WorkerHandle, WorkerPhase,
};
use rlcar_middleware::{FlagBus, Flags};
use rlcar_types::CoreConfig;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::drive::DriveControl;
use crate::video::VideoWorker;

/// Everything the core drives.
///
/// The pairing channel and network link are shared by several workers; the
/// motor, battery and camera each belong to exactly one.
pub struct CarContext {
    pub pairing: Arc<dyn PairingChannel>,
    pub network: Arc<dyn NetworkLink>,
    pub motor: Box<dyn MotorBridge>,
    pub battery: Box<dyn BatterySampler>,
    pub camera: Box<dyn ImageSensor>,
}

impl CarContext {
    /// Context backed by the simulated devices of `rig`.
    pub fn simulated(rig: &SimRig) -> Self {
        Self {
            pairing: rig.pairing.clone(),
            network: rig.network.clone(),
            motor: Box::new(rig.motor.clone()),
            battery: Box::new(rig.battery.clone()),
            camera: Box::new(rig.camera.clone()),
        }
    }
}

pub struct Core {
    ctx: CarContext,
    config: CoreConfig,
    bus: FlagBus,
}

impl Core {
    /// Take ownership of the collaborators and allocate the flag bus.
    pub fn init(ctx: CarContext, config: CoreConfig) -> Self {
        Self {
            ctx,
            config,
            bus: FlagBus::new(),
        }
    }

    pub fn bus(&self) -> &FlagBus {
        &self.bus
    }

    /// Launch the four workers and raise `CONNECT`.
    pub fn start(self) -> CoreHandle {
        let Core { ctx, config, bus } = self;
        bus.clear(Flags::PAIRED | Flags::LINKED | Flags::RUN);

        let timing = &config.timing;
        let video = VideoWorker::new(ctx.camera, ctx.network.clone(), &config.video);
        let video_address = video.watch_address();

        let mut drivers: Vec<(WorkerDescriptor, Box<dyn Worker>)> = vec![
            (
                WorkerDescriptor::new("connector", Connector::GATE, timing.connector_period())
                    .with_priority(5),
                Box::new(Connector::new(
                    ctx.pairing.clone(),
                    ctx.network.clone(),
                    bus.clone(),
                    timing,
                )) as Box<dyn Worker>,
            ),
            (
                WorkerDescriptor::new("monitor", Monitor::GATE, timing.monitor_period())
                    .with_priority(4)
                    .with_budget(timing.monitor_period()),
                Box::new(Monitor::new(ctx.pairing.clone(), ctx.network.clone(), bus.clone())),
            ),
            (
                WorkerDescriptor::new("drive", Flags::RUN, timing.drive_period())
                    .with_priority(3)
                    .with_budget(timing.drive_period()),
                Box::new(DriveControl::new(
                    ctx.pairing.clone(),
                    ctx.motor,
                    ctx.battery,
                    &config.motor,
                )),
            ),
            (
                WorkerDescriptor::new("video", Flags::RUN, config.video.period())
                    .with_priority(2)
                    .with_budget(config.video.write_timeout()),
                Box::new(video),
            ),
        ];
        drivers.sort_by(|a, b| b.0.priority.cmp(&a.0.priority));

        let workers: Vec<WorkerHandle> = drivers
            .into_iter()
            .map(|(descriptor, worker)| GatedDriver::new(descriptor, bus.clone(), worker).spawn())
            .collect();
        info!(
            workers = ?workers.iter().map(WorkerHandle::name).collect::<Vec<_>>(),
            "core started"
        );

        bus.set(Flags::CONNECT);
        CoreHandle {
            bus,
            workers,
            video_address,
        }
    }
}

/// Running core.  Dropping it leaves the workers running; call
/// [`shutdown`][Self::shutdown] to stop them.
pub struct CoreHandle {
    bus: FlagBus,
    workers: Vec<WorkerHandle>,
    video_address: watch::Receiver<Option<SocketAddr>>,
}

impl CoreHandle {
    pub fn bus(&self) -> &FlagBus {
        &self.bus
    }

    /// Workers in launch order.
    pub fn workers(&self) -> &[WorkerHandle] {
        &self.workers
    }

    pub fn worker(&self, name: &str) -> Option<&WorkerHandle> {
        self.workers.iter().find(|w| w.name() == name)
    }

    /// Where the video stream is listening, while it is.
    pub fn video_address(&self) -> Option<SocketAddr> {
        *self.video_address.borrow()
    }

    /// Drop every flag, let each worker run its teardown, then stop the
    /// tasks.
    ///
    /// Returns `false` if some worker did not reach Idle within `timeout`.
    pub async fn shutdown(self, timeout: Duration) -> bool {
        self.bus.clear(Flags::all());
        let deadline = Instant::now() + timeout;

        let mut clean = true;
        for worker in &self.workers {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if !worker.wait_for_phase(WorkerPhase::Idle, Some(remaining)).await {
                warn!(
                    worker = worker.name(),
                    phase = ?worker.phase(),
                    "worker did not stop in time"
                );
                clean = false;
            }
        }
        for worker in &self.workers {
            worker.abort();
        }
        info!(clean, "core stopped");
        clean
    }
}

#[cfg(test)]
mod tests {
    use rlcar_hal::sim::JoinBehavior;
    use rlcar_types::VideoConfig;

    use super::*;

    fn config() -> CoreConfig {
        CoreConfig {
            video: VideoConfig {
                port: 0,
                ..VideoConfig::default()
            },
            ..CoreConfig::default()
        }
    }

    fn start(rig: &SimRig) -> CoreHandle {
        Core::init(CarContext::simulated(rig), config()).start()
    }

    async fn wait_running(handle: &CoreHandle) {
        for name in ["monitor", "drive", "video"] {
            let worker = handle.worker(name).unwrap();
            let running = worker
                .wait_for_phase(WorkerPhase::Running, Some(Duration::from_secs(1)))
                .await;
            assert!(running, "{name}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn workers_launch_by_priority() {
        let rig = SimRig::new("RL-CAR-TEST");
        let handle = start(&rig);
        let names: Vec<_> = handle.workers().iter().map(WorkerHandle::name).collect();
        assert_eq!(names, ["connector", "monitor", "drive", "video"]);
        assert!(handle.bus().contains(Flags::CONNECT));
        assert!(handle.shutdown(Duration::from_secs(1)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_without_operator() {
        let rig = SimRig::new("RL-CAR-TEST");
        let handle = start(&rig);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(handle.bus().get(), Flags::CONNECT);
        assert_eq!(handle.worker("drive").unwrap().phase(), WorkerPhase::Idle);
        assert_eq!(rig.motor.state().starts, 0);
        assert!(handle.shutdown(Duration::from_secs(1)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn credentials_arm_every_worker() {
        let rig = SimRig::new("RL-CAR-TEST").with_join(JoinBehavior::AfterPolls(2));
        let handle = start(&rig);

        rig.pairing.set_connected(true);
        rig.pairing.provision("garage", "hunter2");
        assert!(handle.bus().wait_all(Flags::RUN, Some(Duration::from_secs(2))).await);
        wait_running(&handle).await;

        assert!(handle.bus().contains(Flags::PAIRED | Flags::LINKED));
        assert!(!handle.bus().contains(Flags::CONNECT));
        assert!(rig.motor.state().awake);
        assert!(handle.video_address().is_some());

        rig.pairing.steer(0, 100, 100, 0);
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(!rig.motor.state().last.unwrap().is_stopped());
        assert!(rig.pairing.store().battery.get() > 0.0);
        assert!(handle.shutdown(Duration::from_secs(1)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn link_drop_stops_motor_and_rearms() {
        let rig = SimRig::new("RL-CAR-TEST");
        let handle = start(&rig);
        rig.pairing.set_connected(true);
        rig.pairing.provision("garage", "hunter2");
        assert!(handle.bus().wait_all(Flags::RUN, Some(Duration::from_secs(2))).await);
        wait_running(&handle).await;
        rig.pairing.steer(0, 100, 100, 0);
        tokio::time::sleep(Duration::from_millis(1200)).await;

        let dropped_at = Instant::now();
        rig.network.drop_link();
        let drive = handle.worker("drive").unwrap();
        assert!(drive.wait_for_phase(WorkerPhase::Idle, Some(Duration::from_secs(1))).await);
        assert!(dropped_at.elapsed() <= Duration::from_millis(200));
        let video = handle.worker("video").unwrap();
        assert!(video.wait_for_phase(WorkerPhase::Idle, Some(Duration::from_secs(1))).await);

        let motor = rig.motor.state();
        assert!(!motor.awake);
        assert!(motor.last.unwrap().is_stopped());
        assert!(handle.bus().contains(Flags::CONNECT | Flags::PAIRED));
        assert!(!handle.bus().contains(Flags::RUN | Flags::LINKED));
        assert_eq!(handle.video_address(), None);
        assert_eq!(rig.pairing.store().status.get(), "lost");

        // A fresh apply brings the car back.
        rig.pairing.provision("garage", "hunter2");
        assert!(handle.bus().wait_all(Flags::RUN, Some(Duration::from_secs(2))).await);
        wait_running(&handle).await;
        assert_eq!(rig.motor.state().starts, 2);
        assert!(handle.shutdown(Duration::from_secs(1)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn join_timeout_keeps_workers_idle() {
        let rig = SimRig::new("RL-CAR-TEST").with_join(JoinBehavior::Never);
        let handle = start(&rig);
        rig.pairing.set_connected(true);
        rig.pairing.provision("garage", "hunter2");

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert!(!handle.bus().contains(Flags::RUN));
        assert!(handle.bus().contains(Flags::CONNECT));
        assert_eq!(rig.network.connect_calls(), 1);
        assert_eq!(rig.pairing.store().status.get(), "failed");
        assert_eq!(rig.motor.state().starts, 0);
        assert!(handle.shutdown(Duration::from_secs(1)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_tears_down_armed_workers() {
        let rig = SimRig::new("RL-CAR-TEST");
        let handle = start(&rig);
        rig.pairing.set_connected(true);
        rig.pairing.provision("garage", "hunter2");
        assert!(handle.bus().wait_all(Flags::RUN, Some(Duration::from_secs(2))).await);
        wait_running(&handle).await;

        assert!(handle.shutdown(Duration::from_secs(1)).await);
        let motor = rig.motor.state();
        assert!(!motor.awake);
        assert_eq!(motor.stops, 1);
        assert_eq!(rig.camera.outstanding(), 0);
    }
}
