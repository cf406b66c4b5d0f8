//! keybed - polyphonic keyboard synth

use anyhow::{bail, Result};
use clap::Parser;
use keybed::config::{self, KeybedConfig};
use keybed::engine::driver::{spawn_performance, Driver};
use keybed::engine::player::{default_device_name, list_output_devices, Player};
use keybed::engine::recorder::render_performance;
use keybed::engine::Engine;
use keybed::input::{list_midi_ports, InputRouter, MidiListener, Performance};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{Cli, Commands};

/// How often the driver polls deferred work when no audio is pulled
const DRIVER_TICK: Duration = Duration::from_millis(10);

/// How long live playback lingers after a script's last cue
const SCRIPT_TAIL: Duration = Duration::from_secs(1);

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("keybed=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Play {
            config: config_path,
            script,
            midi,
        } => {
            let cfg = load_or_default(config_path.as_deref())?;
            if script.is_none() && midi.is_none() {
                bail!("nothing to play: pass --script and/or --midi");
            }

            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(play(cfg, script, midi))?;
        }

        Commands::Record {
            config: config_path,
            script,
            output,
            tail_ms,
        } => {
            let cfg = load_or_default(config_path.as_deref())?;
            let performance = Performance::load(&script)?;
            let mut router = InputRouter::new(cfg.key_range(), cfg.envelope.velocity_mode);
            let events = performance.events(&mut router)?;

            println!(
                "Rendering {} ({} cues) to {:?}...",
                performance.name.as_deref().unwrap_or("performance"),
                performance.cues.len(),
                output
            );

            let mut engine = Engine::with_tones(&cfg);
            let summary =
                render_performance(&mut engine, &events, Duration::from_millis(tail_ms), &output)?;

            println!(
                "Recorded {:.2} s to {:?}",
                summary.samples as f64 / f64::from(cfg.audio.sample_rate),
                output
            );
            if summary.rejected > 0 {
                println!("  {} of {} events were rejected", summary.rejected, summary.events);
            }
        }

        Commands::Devices => {
            println!("Available audio devices:\n");

            if let Some(name) = default_device_name() {
                println!("Default output: {}\n", name);
            }

            println!("Output devices:");
            let devices = list_output_devices();
            if devices.is_empty() {
                println!("  (none)");
            }
            for (name, config) in devices {
                println!(
                    "  - {} ({} Hz, {} ch)",
                    name, config.sample_rate.0, config.channels
                );
            }
        }

        Commands::MidiPorts => {
            let ports = list_midi_ports()?;
            if ports.is_empty() {
                println!("No MIDI input ports found.");
            } else {
                println!("MIDI input ports:");
                for port in ports {
                    println!("  - {}", port);
                }
            }
        }

        Commands::Check { config: config_path } => {
            println!("Checking configuration at {:?}...", config_path);

            match config::load_config(&config_path) {
                Ok(cfg) => {
                    let keys = cfg.key_range();
                    println!("Configuration is valid!");
                    println!("  Sample rate: {} Hz", cfg.audio.sample_rate);
                    println!("  Buffer size: {}", cfg.audio.buffer_size);
                    println!("  Waveform: {}", cfg.envelope.waveform);
                    println!("  Volume: {:.0}%", cfg.envelope.volume * 100.0);
                    println!(
                        "  Envelope: {} ms attack, {} ms release",
                        cfg.envelope.attack_ms, cfg.envelope.release_ms
                    );
                    println!(
                        "  Keyboard: {} keys from {}",
                        keys.span(),
                        keys.base().name()
                    );
                    println!(
                        "  Failsafe: sweep every {} ms, {:?} silence",
                        cfg.failsafe.sweep_interval_ms, cfg.failsafe.silence
                    );
                }
                Err(e) => {
                    println!("Configuration is invalid: {:#}", e);
                    std::process::exit(1);
                }
            }
        }

        Commands::Init => {
            let example_config = include_str!("../keybed.example.yaml");

            let path = "keybed.yaml";
            if Path::new(path).exists() {
                println!("keybed.yaml already exists. Not overwriting.");
            } else {
                std::fs::write(path, example_config)?;
                println!("Created keybed.yaml with example configuration.");
            }
        }
    }

    Ok(())
}

fn load_or_default(path: Option<&Path>) -> Result<KeybedConfig> {
    match path {
        Some(path) => config::load_config(path),
        None => {
            info!("No configuration given, using defaults");
            Ok(KeybedConfig::default())
        }
    }
}

async fn play(cfg: KeybedConfig, script: Option<PathBuf>, midi: Option<String>) -> Result<()> {
    let engine = Arc::new(Mutex::new(Engine::with_tones(&cfg)));

    let mut player = Player::new();
    player.start(engine.clone(), &cfg.audio)?;

    let (mut driver, handle) = Driver::spawn(engine, DRIVER_TICK);

    let _midi = match midi {
        Some(port) => {
            let port = Some(port.as_str()).filter(|port| !port.is_empty());
            let sink = handle.clone();
            let listener = MidiListener::connect(port, move |event| {
                sink.try_send(event);
            })?;
            println!("Listening on MIDI port {}", listener.port_name());
            Some(listener)
        }
        None => None,
    };

    let performance = match script {
        Some(path) => {
            let performance = Performance::load(&path)?;
            let mut router = InputRouter::new(cfg.key_range(), cfg.envelope.velocity_mode);
            let events = performance.events(&mut router)?;
            println!("Playing {:?} ({} events)", path, events.len());
            Some(spawn_performance(handle.clone(), events))
        }
        None => None,
    };

    println!("Press Ctrl-C to stop.");
    let finished = async {
        match performance {
            Some(task) => {
                task.await??;
                tokio::time::sleep(SCRIPT_TAIL).await;
            }
            None => std::future::pending::<()>().await,
        }
        Ok::<(), anyhow::Error>(())
    };

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("Interrupted");
        }
        result = finished => result?,
    }

    handle.shutdown().await;
    driver.join().await?;

    // Give the callback one buffer of the torn-down state
    tokio::time::sleep(Duration::from_millis(50)).await;
    player.stop();
    Ok(())
}
