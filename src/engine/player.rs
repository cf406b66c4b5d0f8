//! Real-time audio playback using cpal

use anyhow::{anyhow, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, SampleRate, Stream, StreamConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{error, info};

use super::Engine;
use crate::config::AudioConfig;

/// Real-time audio player
///
/// The audio callback only ever `try_lock`s the engine. When the control
/// side holds the lock the callback writes silence for that buffer rather
/// than blocking the audio thread.
pub struct Player {
    stream: Option<Stream>,
    running: Arc<AtomicBool>,
}

impl Player {
    pub fn new() -> Self {
        Self {
            stream: None,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start playing audio from the engine on the configured device
    pub fn start(&mut self, engine: Arc<Mutex<Engine>>, audio: &AudioConfig) -> Result<()> {
        let device = find_device(audio.device.as_deref())?;
        let supported = device.default_output_config()?;
        let sample_format = supported.sample_format();

        let mut stream_config: StreamConfig = supported.into();
        stream_config.sample_rate = SampleRate(audio.sample_rate);

        self.running.store(true, Ordering::SeqCst);
        let running = self.running.clone();

        let stream = match sample_format {
            SampleFormat::F32 => build_stream::<f32>(&device, &stream_config, engine, running)?,
            SampleFormat::I16 => build_stream::<i16>(&device, &stream_config, engine, running)?,
            SampleFormat::U16 => build_stream::<u16>(&device, &stream_config, engine, running)?,
            other => return Err(anyhow!("Unsupported sample format: {:?}", other)),
        };

        stream.play()?;
        info!(
            device = %device.name().unwrap_or_else(|_| "unknown".to_string()),
            sample_rate = audio.sample_rate,
            channels = stream_config.channels,
            "Audio stream started"
        );
        self.stream = Some(stream);

        Ok(())
    }

    /// Stop playback
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        self.stream = None;
    }

    /// Check if currently playing
    pub fn is_playing(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Default for Player {
    fn default() -> Self {
        Self::new()
    }
}

fn find_device(name: Option<&str>) -> Result<Device> {
    let host = cpal::default_host();
    match name {
        Some(name) => host
            .output_devices()?
            .find(|device| device.name().map(|n| n.contains(name)).unwrap_or(false))
            .ok_or_else(|| anyhow!("Output device '{}' not found", name)),
        None => host
            .default_output_device()
            .ok_or_else(|| anyhow!("No output device available")),
    }
}

fn build_stream<T: cpal::Sample + cpal::SizedSample + cpal::FromSample<f32>>(
    device: &Device,
    config: &StreamConfig,
    engine: Arc<Mutex<Engine>>,
    running: Arc<AtomicBool>,
) -> Result<Stream> {
    let channels = config.channels as usize;

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            if !running.load(Ordering::SeqCst) {
                data.fill(T::from_sample(0.0f32));
                return;
            }

            match engine.try_lock() {
                Ok(mut engine) => {
                    for frame in data.chunks_mut(channels) {
                        let sample = T::from_sample(engine.process() as f32);
                        frame.fill(sample);
                    }
                }
                Err(_) => data.fill(T::from_sample(0.0f32)),
            }
        },
        |err| {
            error!(%err, "Audio stream error");
        },
        None,
    )?;

    Ok(stream)
}

/// Get the default output device name
pub fn default_device_name() -> Option<String> {
    let host = cpal::default_host();
    host.default_output_device().and_then(|d| d.name().ok())
}

/// List all available output devices
pub fn list_output_devices() -> Vec<(String, StreamConfig)> {
    let host = cpal::default_host();
    let mut devices = Vec::new();

    if let Ok(output_devices) = host.output_devices() {
        for device in output_devices {
            if let (Ok(name), Ok(config)) = (device.name(), device.default_output_config()) {
                devices.push((name, config.into()));
            }
        }
    }

    devices
}
