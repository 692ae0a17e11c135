//! `rlcar-cli` – bench runner for the car control core.
//!
//! Runs the full core against simulated hardware:
//!
//! 1. Loads `~/.rlcar/config.toml` (defaults when absent) and `RLCAR_*`
//!    overrides.
//! 2. Starts the connector, monitor, drive and video workers.
//! 3. Plays the operator: pairs after a short delay, provisions network
//!    credentials, then sweeps the steering input.
//! 4. Intercepts **Ctrl-C** to drop every gate, let the workers tear down
//!    (motor stopped, sockets closed) and exit.

mod config;

use std::sync::Arc;
use std::time::Duration;

use colored::Colorize;
use rlcar_hal::PairingChannel;
use rlcar_hal::sim::{JoinBehavior, SimRig};
use rlcar_middleware::{FlagBus, Flags};
use rlcar_runtime::{CarContext, Core, CoreHandle, telemetry};
use tokio::sync::Notify;
use tracing::{info, warn};

#[tokio::main]
async fn main() {
    telemetry::init_tracing();
    print_banner();

    let cfg = match config::load() {
        Ok(Some(cfg)) => {
            println!("  Config loaded from {}", config::config_path().display().to_string().bold());
            cfg
        }
        Ok(None) => config::env_defaults(),
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            config::env_defaults()
        }
    };
    info!(device_id = %cfg.device_id, sim = ?cfg.sim, "bench configuration");

    let rig = SimRig::new(cfg.device_id.clone())
        .with_join(JoinBehavior::AfterPolls(cfg.sim.join_polls))
        .with_battery(cfg.sim.battery_volts, cfg.core.battery);

    let handle = Core::init(CarContext::simulated(&rig), cfg.core.clone()).start();
    println!(
        "  {} workers started, waiting for the operator …\n",
        handle.workers().len().to_string().bold()
    );

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    let shutdown = Arc::new(Notify::new());
    let shutdown_signal = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – stopping the car …".yellow().bold());
        shutdown_signal.notify_one();
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; the bench must be killed");
    }

    let operator = tokio::spawn(simulate_operator(rig, cfg.sim.clone(), handle.bus().clone()));
    let reporter = tokio::spawn(report_links(handle.bus().clone(), cfg.core.video.port));

    shutdown.notified().await;
    operator.abort();
    reporter.abort();
    stop(handle).await;
}

async fn stop(handle: CoreHandle) {
    if handle.shutdown(Duration::from_secs(3)).await {
        println!("{}", "  ✓ Motor stopped, stream closed.".green());
    } else {
        println!("{}", "  ✗ Some workers did not stop in time.".red());
    }
    println!("{}", "  ✓ Exiting rlcar.".green());
}

// ─────────────────────────────────────────────────────────────────────────────
// Simulated operator
// ─────────────────────────────────────────────────────────────────────────────

/// Pair, provision, then keep steering while the car is armed.  Re-provisions
/// whenever the connector is waiting again.
async fn simulate_operator(rig: SimRig, sim: config::SimConfig, bus: FlagBus) {
    tokio::time::sleep(Duration::from_millis(sim.pair_after_ms)).await;
    rig.pairing.set_connected(true);
    info!("operator paired");

    let mut tick: i32 = 0;
    loop {
        if bus.contains(Flags::CONNECT | Flags::PAIRED) && !rig.pairing.store().apply.get() {
            rig.pairing.provision(&sim.ssid, &sim.password);
            info!(ssid = %sim.ssid, "operator provisioned credentials");
        }
        if bus.contains(Flags::RUN) {
            // Triangle sweep of the steering input, -50..=50.
            let x = (tick % 20 - 10).abs() * 10 - 50;
            rig.pairing.steer(x as i8, 100, 60, 0);
            tick += 1;
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
}

/// Print a line every time the car goes online or offline.
async fn report_links(bus: FlagBus, port: u16) {
    loop {
        bus.wait_all(Flags::RUN, None).await;
        println!(
            "  {} stream on http://127.0.0.1:{}/stream",
            "● online".green().bold(),
            port
        );
        bus.wait_cleared(Flags::RUN, None).await;
        println!("  {} reconnecting …", "○ offline".yellow().bold());
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"        __                "#.bold().cyan());
    println!("{}", r#"   ____/ /________ ______ "#.bold().cyan());
    println!("{}", r#"  / __/ / ___/ __ `/ ___/ "#.bold().cyan());
    println!("{}", r#" / / / / /__/ /_/ / /     "#.bold().cyan());
    println!("{}", r#"/_/ /_/\___/\__,_/_/      "#.bold().cyan());
    println!();
    println!("  {} {}", "rlcar".bold(), format!("v{}", env!("CARGO_PKG_VERSION")).dimmed());
    println!("  Teleoperated car control core (bench mode)");
    println!();
}
