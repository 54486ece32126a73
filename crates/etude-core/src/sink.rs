//! The seam between playback logic and sound output.
//!
//! Everything that makes sound in Etude goes through [`ToneSink`]: the
//! scheduler, the metronome and the MIDI echo path all emit [`Tone`]s and
//! never touch an audio device directly. The etude-synth crate provides
//! the real implementation; [`NullSink`] is the silent-degradation
//! fallback used when no audio output is available.

use crate::notes::Dynamic;
use std::fmt;

/// Oscillator waveform for a tone.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Waveform {
    #[default]
    Sine,
    Square,
    Triangle,
    Sawtooth,
}

impl Waveform {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "sine" => Some(Waveform::Sine),
            "square" => Some(Waveform::Square),
            "triangle" => Some(Waveform::Triangle),
            "sawtooth" => Some(Waveform::Sawtooth),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Waveform::Sine => "sine",
            Waveform::Square => "square",
            Waveform::Triangle => "triangle",
            Waveform::Sawtooth => "sawtooth",
        }
    }
}

/// A single synthesized tone: frequency, length, loudness and timbre.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tone {
    /// Frequency in Hz. Must be positive.
    pub frequency: f64,
    /// Duration in seconds. Must be positive.
    pub duration: f64,
    /// Loudness marking, mapped to a volume scalar by the sink.
    pub dynamic: Dynamic,
    /// Oscillator waveform.
    pub waveform: Waveform,
}

impl Tone {
    /// Create a tone with the default dynamic (mf) and waveform (sine).
    pub fn new(frequency: f64, duration: f64) -> Self {
        Self {
            frequency,
            duration,
            dynamic: Dynamic::default(),
            waveform: Waveform::default(),
        }
    }

    pub fn with_dynamic(mut self, dynamic: Dynamic) -> Self {
        self.dynamic = dynamic;
        self
    }

    pub fn with_waveform(mut self, waveform: Waveform) -> Self {
        self.waveform = waveform;
        self
    }
}

/// Handle to a sounding tone, usable to silence it before its duration
/// elapses. Dropping the handle does nothing; tones are self-terminating.
pub struct ToneHandle {
    stop: Option<Box<dyn FnOnce() + Send>>,
}

impl ToneHandle {
    /// A handle that stops nothing (used by [`NullSink`]).
    pub fn noop() -> Self {
        Self { stop: None }
    }

    /// A handle that runs the given closure when stopped.
    pub fn new(stop: impl FnOnce() + Send + 'static) -> Self {
        Self {
            stop: Some(Box::new(stop)),
        }
    }

    /// Silence the tone early. Abrupt cut-off, no fade-out guarantee.
    pub fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            stop();
        }
    }
}

impl fmt::Debug for ToneHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToneHandle")
            .field("stoppable", &self.stop.is_some())
            .finish()
    }
}

/// Destination for synthesized tones.
pub trait ToneSink: Send + Sync {
    /// Start a tone sounding. Never fails; sinks that cannot play must
    /// degrade to a no-op.
    fn play(&self, tone: Tone) -> ToneHandle;

    /// Silence every tone currently in flight.
    fn stop_all(&self);
}

/// Sink that discards every tone. Stands in for the audio engine when no
/// output device is available, so callers never see an error path.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ToneSink for NullSink {
    fn play(&self, _tone: Tone) -> ToneHandle {
        ToneHandle::noop()
    }

    fn stop_all(&self) {}
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Sink that records every tone, for scheduler and metronome tests.
    #[derive(Default, Clone)]
    pub struct RecordingSink {
        pub tones: Arc<Mutex<Vec<Tone>>>,
    }

    impl RecordingSink {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn recorded(&self) -> Vec<Tone> {
            self.tones.lock().unwrap().clone()
        }

        pub fn len(&self) -> usize {
            self.tones.lock().unwrap().len()
        }
    }

    impl ToneSink for RecordingSink {
        fn play(&self, tone: Tone) -> ToneHandle {
            self.tones.lock().unwrap().push(tone);
            ToneHandle::noop()
        }

        fn stop_all(&self) {
            self.tones.lock().unwrap().clear();
        }
    }
}
