use std::{
    sync::OnceLock,
    time::{Duration, Instant},
};

use anyhow::Context;
use tokio::{
    signal::unix::{signal, Signal, SignalKind},
    sync::mpsc,
    time::MissedTickBehavior,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use fanctl_common::{
    AgentConfig, CommandEvent, DigitalOutput, DisplaySink, FanSynchronizer, Publisher,
    ShutdownFlag, SyncState, TemperatureSource,
};

use crate::{
    mqtt::{self, MqttPublisher},
    thermal::SysfsThermal,
};

#[cfg(feature = "rpi")]
use crate::rpi::{open_display, open_output};
#[cfg(not(feature = "rpi"))]
use crate::sim::{open_display, open_output};

const COMMAND_QUEUE_DEPTH: usize = 32;

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AgentConfig::load(|key| std::env::var(key).ok(), |path| std::fs::read(path))
        .context("invalid configuration")?;
    info!(config = ?config.redacted(), "fanctl agent starting");

    let shutdown = ShutdownFlag::new();
    spawn_signal_listener(shutdown.clone());

    let output = open_output(&config.hardware).context("failed to open fan output")?;
    let display = open_display(&config.hardware).context("failed to open display")?;

    let (client, eventloop) = mqtt::connect(&config);
    let publisher = MqttPublisher::new(client.clone(), mqtt::qos_from_level(config.mqtt.qos));
    let sensor = SysfsThermal::new(&config.hardware.thermal_path);
    let mut sync = FanSynchronizer::new(&config, sensor, output, display, publisher);

    // Startup publishes are queued before the event loop subscribes, so the
    // retained fan state echoed back is already current.
    let started = sync.start(monotonic_ms());

    let (command_tx, mut command_rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
    let mqtt_task = mqtt::spawn_event_loop(client, eventloop, &config, command_tx);

    let result = match started {
        Ok(()) => {
            run_control_loop(
                &mut sync,
                &mut command_rx,
                &shutdown,
                Duration::from_millis(config.control.loop_tick_ms),
            )
            .await;
            Ok(())
        }
        Err(err) => Err(anyhow::Error::new(err).context("startup failed")),
    };

    if let Some(report) = sync.shutdown() {
        for failure in &report.failures {
            warn!(step = failure.step, "cleanup step failed: {}", failure.error);
        }
    }
    mqtt::await_disconnect(mqtt_task).await;
    info!("fanctl agent stopped");
    result
}

async fn run_control_loop<S, O, D, P>(
    sync: &mut FanSynchronizer<S, O, D, P>,
    commands: &mut mpsc::Receiver<CommandEvent>,
    shutdown: &ShutdownFlag,
    tick: Duration,
) where
    S: TemperatureSource,
    O: DigitalOutput,
    D: DisplaySink,
    P: Publisher,
{
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    while !shutdown.is_triggered() {
        interval.tick().await;

        let mut pending = Vec::new();
        while let Ok(event) = commands.try_recv() {
            pending.push(event);
        }

        if sync.step(monotonic_ms(), pending) != SyncState::Running {
            warn!(state = sync.state().as_str(), "control loop stopping");
            break;
        }
    }
}

fn spawn_signal_listener(shutdown: ShutdownFlag) {
    tokio::spawn(async move {
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(stream) => Some(stream),
            Err(err) => {
                warn!("SIGTERM handler unavailable: {err}");
                None
            }
        };

        loop {
            let name = tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    if let Err(err) = result {
                        warn!("SIGINT handler unavailable: {err}");
                        return;
                    }
                    "SIGINT"
                }
                _ = recv_signal(&mut sigterm) => "SIGTERM",
            };

            if shutdown.trigger() {
                info!(signal = name, "shutdown requested");
            } else {
                info!(signal = name, "shutdown already in progress");
            }
        }
    });
}

async fn recv_signal(stream: &mut Option<Signal>) {
    match stream {
        Some(stream) => {
            stream.recv().await;
        }
        None => std::future::pending::<()>().await,
    }
}

pub fn monotonic_ms() -> u64 {
    static START: OnceLock<Instant> = OnceLock::new();
    START
        .get_or_init(Instant::now)
        .elapsed()
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}
