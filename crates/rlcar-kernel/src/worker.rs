//! [`GatedDriver`] – flag-gated worker lifecycle.
//!
//! A driver owns one [`Worker`] and cycles it through
//! Idle → Starting → Running → Stopping → Idle for the life of the process:
//!
//! 1. **Idle** – block until every bit of the descriptor's gate is set.
//! 2. **Starting** – run [`Worker::setup`] once.
//! 3. **Running** – run [`Worker::step`], then sleep for the period (or just
//!    yield when the period is zero and the step paces itself), and repeat
//!    while the gate holds.  The sleep is cut short when the gate drops.
//! 4. **Stopping** – run [`Worker::teardown`] once and go back to Idle.
//!
//! Setup, step and teardown all run on the driver's own task, one at a time,
//! so they never overlap.  Teardown is only reachable after setup returned.

use std::time::Duration;

use async_trait::async_trait;
use rlcar_middleware::{FlagBus, Flags};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{Instrument, debug, info, info_span, warn};

// ────────────────────────────────────────────────────────────────────────────
// Public types
// ────────────────────────────────────────────────────────────────────────────

/// The three hooks a gated worker provides.
#[async_trait]
pub trait Worker: Send {
    /// Runs once each time the gate opens, before the first step.
    async fn setup(&mut self) {}

    /// One loop iteration.
    async fn step(&mut self);

    /// Runs once each time the gate closes, after the last step.
    async fn teardown(&mut self) {}
}

/// Static settings of one gated worker.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerDescriptor {
    pub name: String,
    /// Launch order; higher starts first.
    pub priority: u8,
    /// Per-iteration execution budget.  Overruns are logged, not pre-empted.
    pub budget: Option<Duration>,
    /// Flags that must all be set for the worker to run.
    pub gate: Flags,
    /// Sleep between iterations; zero means the step paces itself.
    pub period: Duration,
}

impl WorkerDescriptor {
    pub fn new(name: impl Into<String>, gate: Flags, period: Duration) -> Self {
        Self {
            name: name.into(),
            priority: 0,
            budget: None,
            gate,
            period,
        }
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = Some(budget);
        self
    }
}

/// Lifecycle phase of a gated worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerPhase {
    /// Waiting for the gate.
    Idle,
    /// Running setup.
    Starting,
    /// Stepping while the gate holds.
    Running,
    /// Running teardown.
    Stopping,
}

// ────────────────────────────────────────────────────────────────────────────
// Driver
// ────────────────────────────────────────────────────────────────────────────

/// Runs one [`Worker`] under the gate of its [`WorkerDescriptor`].
pub struct GatedDriver {
    descriptor: WorkerDescriptor,
    bus: FlagBus,
    worker: Box<dyn Worker>,
    phase: watch::Sender<WorkerPhase>,
}

impl GatedDriver {
    pub fn new(descriptor: WorkerDescriptor, bus: FlagBus, worker: Box<dyn Worker>) -> Self {
        let (phase, _) = watch::channel(WorkerPhase::Idle);
        Self {
            descriptor,
            bus,
            worker,
            phase,
        }
    }

    pub fn descriptor(&self) -> &WorkerDescriptor {
        &self.descriptor
    }

    /// Launch the driver loop on its own task.
    pub fn spawn(self) -> WorkerHandle {
        let name = self.descriptor.name.clone();
        let phase = self.phase.subscribe();
        let span = info_span!("worker", name = %name);
        let task = tokio::spawn(self.run().instrument(span));
        WorkerHandle { name, phase, task }
    }

    /// Cycle the worker forever.
    pub async fn run(mut self) {
        debug!(
            priority = self.descriptor.priority,
            gate = ?self.descriptor.gate,
            period_ms = self.descriptor.period.as_millis() as u64,
            "driver launched"
        );
        loop {
            self.cycle().await;
        }
    }

    /// One full Idle → Starting → Running → Stopping pass.
    async fn cycle(&mut self) {
        let gate = self.descriptor.gate;
        let name = self.descriptor.name.as_str();

        self.set_phase(WorkerPhase::Idle);
        self.bus.wait_all(gate, None).await;

        self.set_phase(WorkerPhase::Starting);
        info!(worker = name, "start");
        self.worker.setup().await;

        self.set_phase(WorkerPhase::Running);
        let mut iterations: u64 = 0;
        while self.bus.contains(gate) {
            let started = Instant::now();
            self.worker.step().await;
            iterations += 1;

            let elapsed = started.elapsed();
            if let Some(budget) = self.descriptor.budget {
                if elapsed > budget {
                    warn!(
                        worker = name,
                        elapsed_ms = elapsed.as_millis() as u64,
                        budget_ms = budget.as_millis() as u64,
                        "iteration overran its budget"
                    );
                }
            }

            if self.descriptor.period.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::select! {
                    _ = tokio::time::sleep(self.descriptor.period) => {}
                    _ = self.bus.wait_cleared(gate, None) => {}
                }
            }
        }

        self.set_phase(WorkerPhase::Stopping);
        self.worker.teardown().await;
        info!(worker = name, iterations, "stop");
    }

    fn set_phase(&self, phase: WorkerPhase) {
        self.phase.send_replace(phase);
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Handle
// ────────────────────────────────────────────────────────────────────────────

/// Observer and kill switch for a spawned [`GatedDriver`].
pub struct WorkerHandle {
    name: String,
    phase: watch::Receiver<WorkerPhase>,
    task: JoinHandle<()>,
}

impl WorkerHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> WorkerPhase {
        *self.phase.borrow()
    }

    /// Wait until the worker reaches `phase`.
    ///
    /// Returns `false` if `timeout` elapses first or the driver task has
    /// ended.
    pub async fn wait_for_phase(&self, phase: WorkerPhase, timeout: Option<Duration>) -> bool {
        let mut receiver = self.phase.clone();
        let reached = receiver.wait_for(|p| *p == phase);
        match timeout {
            None => reached.await.is_ok(),
            Some(limit) => matches!(tokio::time::timeout(limit, reached).await, Ok(Ok(_))),
        }
    }

    /// Cancel the driver task wherever it is suspended.
    pub fn abort(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl std::fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("name", &self.name)
            .field("phase", &self.phase())
            .finish()
    }
}
