//! CLI interface for keybed

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Polyphonic keyboard synth with sustain and stuck-note failsafes
#[derive(Parser)]
#[command(name = "keybed")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Play live from a performance script and/or a MIDI keyboard
    Play {
        /// Configuration file path (defaults are used when omitted)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Performance script to play
        #[arg(short, long)]
        script: Option<PathBuf>,

        /// Listen on a MIDI input port; without a name the first port is used
        #[arg(short, long, num_args = 0..=1, default_missing_value = "")]
        midi: Option<String>,
    },

    /// Render a performance script to a WAV file
    Record {
        /// Configuration file path (defaults are used when omitted)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Performance script to render
        #[arg(short, long)]
        script: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Time to keep rendering after the last cue, in milliseconds
        #[arg(long, default_value = "2000")]
        tail_ms: u64,
    },

    /// List available audio output devices
    Devices,

    /// List available MIDI input ports
    MidiPorts,

    /// Validate a configuration file
    Check {
        /// Configuration file path
        #[arg(short, long, default_value = "keybed.yaml")]
        config: PathBuf,
    },

    /// Generate an example configuration file
    Init,
}
