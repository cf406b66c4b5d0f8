//! Control loop for live playback
//!
//! The driver task is the only writer of engine state outside the audio
//! callback. Input sources send it events over a channel; a ticker polls
//! deferred work even while no audio is being pulled. Shutdown, or every
//! handle being dropped, tears all voices down.

use anyhow::{anyhow, Result};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::Engine;
use crate::input::TimedEvent;
use crate::voice::{Event, FailsafeTrigger};

const COMMAND_BUFFER: usize = 256;

enum Command {
    Input(Event),
    Shutdown,
}

/// Sending side of a running driver
#[derive(Clone)]
pub struct DriverHandle {
    tx: mpsc::Sender<Command>,
}

impl DriverHandle {
    /// Queue an event, waiting for room if the driver is behind
    pub async fn send(&self, event: Event) -> Result<()> {
        self.tx
            .send(Command::Input(event))
            .await
            .map_err(|_| anyhow!("driver has stopped"))
    }

    /// Queue an event without waiting; for callbacks on foreign threads
    pub fn try_send(&self, event: Event) -> bool {
        match self.tx.try_send(Command::Input(event)) {
            Ok(()) => true,
            Err(err) => {
                warn!(%err, "Dropping input event");
                false
            }
        }
    }

    /// Ask the driver to tear down and exit
    pub async fn shutdown(&self) {
        if self.tx.send(Command::Shutdown).await.is_err() {
            debug!("Driver already stopped");
        }
    }
}

/// A running driver task
pub struct Driver {
    handle: JoinHandle<()>,
}

impl Driver {
    /// Start the control loop over `engine`, polling every `tick`
    pub fn spawn(engine: Arc<Mutex<Engine>>, tick: Duration) -> (Driver, DriverHandle) {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let driver = Driver {
            handle: tokio::spawn(async move { Driver::run(engine, rx, tick).await }),
        };
        (driver, DriverHandle { tx })
    }

    /// Wait for the driver to finish
    pub async fn join(&mut self) -> Result<(), JoinError> {
        (&mut self.handle).await
    }

    async fn run(engine: Arc<Mutex<Engine>>, mut rx: mpsc::Receiver<Command>, tick: Duration) {
        let mut ticker = tokio::time::interval(tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(tick_ms = tick.as_millis() as u64, "Driver started");

        loop {
            tokio::select! {
                _ = ticker.tick() => with_engine(&engine, Engine::poll),
                command = rx.recv() => match command {
                    Some(Command::Input(event)) => {
                        with_engine(&engine, |engine| engine.submit(event))
                    }
                    Some(Command::Shutdown) | None => {
                        with_engine(&engine, |engine| {
                            engine.submit(Event::Failsafe(FailsafeTrigger::Unload))
                        });
                        info!("Driver stopped");
                        return;
                    }
                },
            }
        }
    }
}

fn with_engine(engine: &Mutex<Engine>, f: impl FnOnce(&mut Engine)) {
    match engine.lock() {
        Ok(mut guard) => f(&mut guard),
        Err(poisoned) => f(&mut poisoned.into_inner()),
    }
}

/// Feed a scripted performance to the driver in real time
pub fn spawn_performance(handle: DriverHandle, events: Vec<TimedEvent>) -> JoinHandle<Result<()>> {
    tokio::spawn(async move {
        let start = Instant::now();
        info!(events = events.len(), "Performance started");
        for timed in events {
            tokio::time::sleep_until(start + timed.at).await;
            handle.send(timed.event).await?;
        }
        info!("Performance finished");
        Ok(())
    })
}
