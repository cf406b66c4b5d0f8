//! Offline rendering of performances to WAV

use anyhow::{Context, Result};
use hound::{SampleFormat, WavSpec, WavWriter};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

use super::Engine;
use crate::input::TimedEvent;
use crate::voice::{Event, FailsafeTrigger};

/// Mono 32-bit float WAV writer
pub struct Recorder {
    writer: WavWriter<BufWriter<File>>,
    sample_rate: u32,
    samples_written: u64,
}

impl Recorder {
    pub fn new(path: &Path, sample_rate: u32) -> Result<Self> {
        let spec = WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };

        let writer = WavWriter::create(path, spec)
            .with_context(|| format!("failed to create WAV file: {:?}", path))?;

        Ok(Self {
            writer,
            sample_rate,
            samples_written: 0,
        })
    }

    pub fn samples_written(&self) -> u64 {
        self.samples_written
    }

    /// Length of the recording so far
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.samples_written as f64 / f64::from(self.sample_rate))
    }

    pub fn write_sample(&mut self, sample: f32) -> Result<()> {
        self.writer
            .write_sample(sample)
            .context("failed to write sample")?;
        self.samples_written += 1;
        Ok(())
    }

    /// Finalize the WAV file
    ///
    /// This must be called to properly close the file and write the header.
    pub fn finalize(self) -> Result<()> {
        self.writer.finalize().context("failed to finalize WAV file")
    }
}

/// What a render produced
#[derive(Debug, Clone, PartialEq)]
pub struct RenderSummary {
    pub samples: u64,
    pub events: usize,
    pub rejected: usize,
}

/// Play `events` through `engine` and write the output to `path`
///
/// Each event is applied once the sample clock reaches its time. After the
/// last event the engine keeps rendering for `tail`, then tears down so
/// nothing is left sounding when the file ends.
pub fn render_performance(
    engine: &mut Engine,
    events: &[TimedEvent],
    tail: Duration,
    path: &Path,
) -> Result<RenderSummary> {
    let mut recorder = Recorder::new(path, engine.sample_rate())?;
    let mut rejected = 0;

    for timed in events {
        engine.render_until(timed.at, |sample| recorder.write_sample(sample))?;
        if let Err(err) = engine.dispatch(timed.event.clone()) {
            warn!(%err, at_ms = timed.at.as_millis() as u64, "Cue rejected");
            rejected += 1;
        }
    }

    let end = events.last().map(|timed| timed.at).unwrap_or_default() + tail;
    engine.render_until(end, |sample| recorder.write_sample(sample))?;
    engine.submit(Event::Failsafe(FailsafeTrigger::Unload));

    let summary = RenderSummary {
        samples: recorder.samples_written(),
        events: events.len(),
        rejected,
    };
    info!(
        path = ?path,
        seconds = recorder.duration().as_secs_f64(),
        events = summary.events,
        rejected = summary.rejected,
        "Performance rendered"
    );
    recorder.finalize()?;

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KeybedConfig;
    use crate::voice::{PitchKey, Silence};
    use tempfile::NamedTempFile;

    fn engine() -> Engine {
        let mut config = KeybedConfig::default();
        config.audio.sample_rate = 8000;
        Engine::with_tones(&config)
    }

    fn at(millis: u64, event: Event) -> TimedEvent {
        TimedEvent {
            at: Duration::from_millis(millis),
            event,
        }
    }

    #[test]
    fn test_recorder_write_and_finalize() {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().to_path_buf();

        let mut recorder = Recorder::new(&path, 8000).unwrap();
        for _ in 0..8000 {
            recorder.write_sample(0.25).unwrap();
        }
        assert_eq!(recorder.samples_written(), 8000);
        assert_eq!(recorder.duration(), Duration::from_secs(1));
        recorder.finalize().unwrap();

        let reader = hound::WavReader::open(&path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 8000);
        assert_eq!(spec.bits_per_sample, 32);
        assert_eq!(spec.sample_format, SampleFormat::Float);
    }

    #[test]
    fn test_render_performance() {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().to_path_buf();
        let key = PitchKey::new(69);
        let events = vec![
            at(0, Event::note_on(key, 1.0)),
            at(250, Event::NoteOff { key }),
        ];

        let mut engine = engine();
        let summary =
            render_performance(&mut engine, &events, Duration::from_millis(500), &path).unwrap();

        // 750 ms at 8 kHz
        assert_eq!(summary.samples, 6000);
        assert_eq!(summary.events, 2);
        assert_eq!(summary.rejected, 0);

        let samples: Vec<f32> = hound::WavReader::open(&path)
            .unwrap()
            .into_samples()
            .map(|s| s.unwrap())
            .collect();
        assert_eq!(samples.len(), 6000);

        let loud = samples[..2000].iter().fold(0.0f32, |m, s| m.max(s.abs()));
        let tail = samples[5000..].iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!(loud > 0.5, "loud section peak {}", loud);
        assert_eq!(tail, 0.0);
    }

    #[test]
    fn test_render_counts_rejected_cues() {
        let file = NamedTempFile::new().unwrap();
        let events = vec![
            at(0, Event::note_on(PitchKey::new(127), 1.0)),
            at(10, Event::ForceAllOff {
                silence: Silence::Immediate,
            }),
        ];

        let mut engine = engine();
        let summary =
            render_performance(&mut engine, &events, Duration::ZERO, file.path()).unwrap();
        assert_eq!(summary.rejected, 1);
        assert_eq!(summary.samples, 80);
    }

    #[test]
    fn test_render_tears_down_at_the_end() {
        let file = NamedTempFile::new().unwrap();
        let events = vec![at(0, Event::note_on(PitchKey::new(60), 1.0))];

        let mut engine = engine();
        render_performance(&mut engine, &events, Duration::from_millis(100), file.path()).unwrap();
        assert_eq!(engine.manager().active_count(), 0);
        assert_eq!(engine.manager().releasing_count(), 0);
    }
}
