//! Etude CLI - The `etude` command.
//!
//! Terminal front-end for the Etude piano trainer.
//!
//! # Architecture
//!
//! The CLI binary orchestrates the following modular crates:
//!
//! - **etude-core**: Exercise model, playback scheduling, metronome, MIDI input
//! - **etude-synth**: Tone synthesis on the default audio output

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Etude - piano practice from the terminal
#[derive(Parser, Debug)]
#[command(name = "etude")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Play piano exercises with a metronome and MIDI input", long_about = None)]
struct Args {
    /// Directory holding the exercise library
    #[arg(
        long,
        global = true,
        value_name = "DIR",
        default_value = "data/exercises"
    )]
    exercises: PathBuf,

    /// Language for titles and instructions
    #[arg(long, global = true, value_name = "LANG", default_value = "en")]
    lang: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the available exercises
    List,

    /// Show an exercise's metadata and instructions
    Info {
        /// Exercise id, e.g. hanon-01
        id: String,
    },

    /// Play an exercise
    Play {
        /// Exercise id, e.g. hanon-01
        id: String,

        /// Tempo in BPM (clamped to the exercise's range)
        #[arg(short, long)]
        tempo: Option<f64>,

        /// Which hands to play: both, right or left
        #[arg(long, default_value = "both")]
        hands: String,

        /// Click along with the exercise
        #[arg(short, long)]
        metronome: bool,
    },

    /// Show (and optionally play) a single measure
    Measure {
        /// Exercise id, e.g. hanon-01
        id: String,

        /// 1-based measure number
        number: u32,

        /// Which hand to show: right or left
        #[arg(long, default_value = "right")]
        hand: String,

        /// Also play the measure at this tempo
        #[arg(short, long)]
        play: Option<f64>,
    },

    /// Run a standalone metronome until interrupted
    Metronome {
        /// Tempo in BPM
        #[arg(short, long, default_value_t = 120.0)]
        tempo: f64,

        /// Beats per measure (the first beat is accented)
        #[arg(short, long, default_value_t = 4)]
        beats: u32,

        /// Stop after this many seconds instead of waiting for Ctrl-C
        #[arg(short, long)]
        duration: Option<f64>,
    },

    /// Listen to MIDI input devices
    Midi {
        /// Connect only to the device whose name contains this string
        #[arg(short, long, value_name = "NAME")]
        device: Option<String>,

        /// Reconnect automatically when devices appear or disappear
        #[arg(short, long)]
        watch: bool,

        /// Echo received notes through the synthesizer
        #[arg(short, long)]
        echo: bool,

        /// Only list the available devices and exit
        #[arg(short, long)]
        list: bool,
    },

    /// Play a single note, e.g. `etude note C4`
    Note {
        /// Note name, e.g. C4, F#3, Bb5
        name: String,

        /// Duration in seconds
        #[arg(short, long, default_value_t = 1.0)]
        duration: f64,

        /// Dynamic marking (ppp..fff)
        #[arg(long, default_value = "mf")]
        dynamic: String,

        /// Waveform: sine, square, triangle or sawtooth
        #[arg(short, long, default_value = "sine")]
        waveform: String,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    let interrupted = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&interrupted))?;

    match args.command {
        Commands::List => commands::list(&args.exercises, &args.lang),
        Commands::Info { id } => commands::info(&args.exercises, &id, &args.lang),
        Commands::Play {
            id,
            tempo,
            hands,
            metronome,
        } => commands::play(&args.exercises, &id, tempo, &hands, metronome, &interrupted),
        Commands::Measure {
            id,
            number,
            hand,
            play,
        } => commands::measure(&args.exercises, &id, number, &hand, play, &interrupted),
        Commands::Metronome {
            tempo,
            beats,
            duration,
        } => commands::metronome(tempo, beats, duration, &interrupted),
        Commands::Midi {
            device,
            watch,
            echo,
            list,
        } => commands::midi(device.as_deref(), watch, echo, list, &interrupted),
        Commands::Note {
            name,
            duration,
            dynamic,
            waveform,
        } => commands::note(&name, duration, &dynamic, &waveform),
    }
}
