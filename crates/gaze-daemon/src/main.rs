//! Gimbal face tracking daemon.
//!
//! Runs the tracking engine against the simulated camera and recognizer,
//! driving either a servo controller on a serial device or a logging
//! transport. Control lines are read from stdin.

mod config;
mod console;

use std::sync::Arc;

use anyhow::{bail, Context};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use gaze_models::Point;
use gaze_tracker::sim::{ScriptedFace, SimulatedCamera, SimulatedRecognizer, SimulatedScene};
use gaze_tracker::{LineServoTransport, LogServoTransport, ServoTransport, TrackingConfig, TrackingEngine};

use crate::config::DaemonConfig;
use crate::console::{parse_line, ConsoleInput};

fn init_tracing() {
    // Colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let mut env_filter = EnvFilter::from_default_env();
    for directive in ["gaze_tracker=info", "gaze_daemon=info"] {
        if let Ok(directive) = directive.parse() {
            env_filter = env_filter.add_directive(directive);
        }
    }

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();
    init_tracing();

    info!("Starting gaze-daemon");

    let daemon_config = DaemonConfig::from_env();
    let config = match &daemon_config.config_file {
        Some(path) => TrackingConfig::from_json_file(path)
            .with_context(|| format!("Failed to load tracking config {}", path.display()))?,
        None => TrackingConfig::from_env(),
    };
    info!("Daemon config: {:?}", daemon_config);
    info!("Tracking config: {:?}", config);

    if let Some(port) = daemon_config.metrics_port {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(([0, 0, 0, 0], port))
            .install()
            .context("Failed to install Prometheus exporter")?;
        info!(port, "Prometheus metrics exporter listening");
    }

    let scene = SimulatedScene::new();
    if daemon_config.demo_faces {
        let center_x = f64::from(daemon_config.frame_width) / 2.0;
        let center_y = f64::from(daemon_config.frame_height) / 2.0;
        scene.add(
            ScriptedFace::still("sophia", 0.9, Point::new(center_x + 80.0, center_y))
                .moving(Point::new(-15.0, 0.0)),
        );
    }

    let camera = Arc::new(SimulatedCamera::new(
        daemon_config.frame_width,
        daemon_config.frame_height,
    ));
    let recognizer = Arc::new(SimulatedRecognizer::new(Arc::clone(&scene)));
    let servo: Arc<dyn ServoTransport> = match &daemon_config.servo_device {
        Some(path) => {
            let transport = LineServoTransport::open(path)
                .await
                .with_context(|| format!("Failed to open servo device {}", path.display()))?;
            info!(device = %path.display(), "Using serial servo transport");
            Arc::new(transport)
        }
        None => {
            warn!("GAZE_SERVO_DEVICE not set, servo commands will only be logged");
            Arc::new(LogServoTransport)
        }
    };

    let engine = Arc::new(TrackingEngine::new(config, camera, recognizer, servo));
    if !engine.initialize().await {
        bail!("Tracking engine failed to initialize");
    }
    if daemon_config.autostart {
        engine.start_tracking(false).await;
    }

    // Periodic status line
    let status_engine = Arc::clone(&engine);
    let status_interval = daemon_config.status_interval;
    let status_handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(status_interval);
        loop {
            ticker.tick().await;
            let status = status_engine.get_status();
            info!(
                pan = status.pan(),
                tilt = status.tilt(),
                avg_loop_ms = status.stats.avg_loop_ms,
                "{}",
                status.describe()
            );
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal");
                break;
            }
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => {
                        // stdin closed; keep tracking until a signal arrives
                        tokio::signal::ctrl_c().await.ok();
                        info!("Received shutdown signal");
                        break;
                    }
                    Err(e) => {
                        warn!("Failed to read stdin: {}", e);
                        continue;
                    }
                };
                if !handle_line(&engine, &scene, &line).await? {
                    break;
                }
            }
        }
    }

    status_handle.abort();
    engine.stop_tracking().await;
    info!("gaze-daemon stopped");
    Ok(())
}

/// Apply one console line. Returns `false` when the daemon should exit.
async fn handle_line(
    engine: &TrackingEngine,
    scene: &SimulatedScene,
    line: &str,
) -> anyhow::Result<bool> {
    let Some(input) = parse_line(line) else {
        if !line.trim().is_empty() {
            warn!("Unrecognized input: {}", line.trim());
        }
        return Ok(true);
    };

    match input {
        ConsoleInput::Quit => return Ok(false),
        ConsoleInput::Command(command) => match engine.process_manual_command(command).await {
            Some(response) => println!("{}", response),
            None => warn!(command = %command, "Engine not initialized"),
        },
        ConsoleInput::Converse(target) => engine.set_conversation_mode(true, target),
        ConsoleInput::EndConversation => engine.set_conversation_mode(false, None),
        ConsoleInput::Stage(stage) => engine.set_conversation_stage(stage),
        ConsoleInput::Status => {
            let status = engine.get_status();
            println!(
                "{}",
                serde_json::to_string_pretty(&status).context("Failed to encode status")?
            );
        }
        ConsoleInput::AddFace {
            identity,
            confidence,
            x,
            y,
        } => {
            info!(identity = %identity, x, y, "Adding simulated face");
            scene.add(ScriptedFace::still(identity, confidence, Point::new(x, y)));
        }
        ConsoleInput::RemoveFace(identity) => {
            info!(identity = %identity, "Removing simulated face");
            scene.remove(&identity);
        }
    }

    Ok(true)
}
