//! Exercise playback scheduling.
//!
//! An exercise steps through an eighth-note grid, eight slots per 4/4
//! measure. The scheduler maps a [`TransportClock`] beat position onto
//! that grid and emits the due notes of both hands each tick, so a late
//! tick catches up instead of dropping notes. Playback stops on its own
//! after the final measure.

use crate::events::PlayerEvent;
use crate::exercise::{Exercise, Hand};
use crate::sink::{Tone, ToneSink};
use crate::timing::{BeatTime, TransportClock};
use std::sync::Arc;
use std::time::Instant;

/// Grid slots per measure: eighth notes in 4/4.
pub const NOTES_PER_MEASURE: usize = 8;

/// Sounding length of a scheduled note, in seconds.
const NOTE_DURATION: f64 = 0.5;

/// Which hands sound during playback.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HandMode {
    #[default]
    Both,
    Right,
    Left,
}

impl HandMode {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "both" => Some(HandMode::Both),
            "right" => Some(HandMode::Right),
            "left" => Some(HandMode::Left),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            HandMode::Both => "both",
            HandMode::Right => "right",
            HandMode::Left => "left",
        }
    }

    pub fn plays(self, hand: Hand) -> bool {
        matches!(
            (self, hand),
            (HandMode::Both, _) | (HandMode::Right, Hand::Right) | (HandMode::Left, Hand::Left)
        )
    }
}

pub struct PlaybackScheduler {
    exercise: Arc<Exercise>,
    clock: TransportClock,
    hand_mode: HandMode,
    /// Next grid slot to emit, counted from the start of the exercise.
    next_step: u64,
    total_steps: u64,
}

impl PlaybackScheduler {
    pub fn new(exercise: Arc<Exercise>, bpm: f64) -> Self {
        let total_steps = (exercise.total_measures() * NOTES_PER_MEASURE) as u64;
        Self {
            exercise,
            clock: TransportClock::new(bpm),
            hand_mode: HandMode::default(),
            next_step: 0,
            total_steps,
        }
    }

    pub fn exercise(&self) -> &Arc<Exercise> {
        &self.exercise
    }

    pub fn tempo(&self) -> f64 {
        self.clock.bpm()
    }

    pub fn hand_mode(&self) -> HandMode {
        self.hand_mode
    }

    pub fn is_running(&self) -> bool {
        self.clock.is_running()
    }

    /// Begin playback from the top.
    pub fn start(&mut self, now: Instant, mut on_event: impl FnMut(PlayerEvent)) {
        self.clock.seek(BeatTime::ZERO, now);
        self.clock.start(now);
        self.next_step = 0;
        log::info!(
            "playing '{}' at {} BPM ({})",
            self.exercise.id,
            self.clock.bpm(),
            self.hand_mode.name()
        );
        on_event(PlayerEvent::Started {
            exercise_id: self.exercise.id.clone(),
            tempo: self.clock.bpm(),
        });
    }

    /// Stop playback and reset the cursor to the top.
    pub fn stop(&mut self, now: Instant, mut on_event: impl FnMut(PlayerEvent)) {
        if !self.clock.is_running() {
            return;
        }
        self.clock.stop(now);
        self.next_step = 0;
        on_event(PlayerEvent::Stopped);
    }

    /// Change tempo. Mid-exercise tempo changes restart from the
    /// beginning so the grid never lands between slots.
    pub fn set_tempo(&mut self, bpm: f64, now: Instant, mut on_event: impl FnMut(PlayerEvent)) {
        let bpm = self.exercise.tempo.clamp(bpm);
        let was_running = self.clock.is_running();
        if was_running {
            self.stop(now, &mut on_event);
        }
        self.clock.set_bpm(bpm, now);
        on_event(PlayerEvent::TempoChanged { tempo: bpm });
        if was_running {
            self.start(now, &mut on_event);
        }
    }

    pub fn set_hand_mode(&mut self, mode: HandMode, mut on_event: impl FnMut(PlayerEvent)) {
        if mode != self.hand_mode {
            self.hand_mode = mode;
            on_event(PlayerEvent::HandModeChanged { mode });
        }
    }

    /// Emit every grid slot due by `now`. Returns `true` while playback
    /// is still in progress.
    pub fn tick(
        &mut self,
        now: Instant,
        sink: &dyn ToneSink,
        mut on_event: impl FnMut(PlayerEvent),
    ) -> bool {
        if !self.clock.is_running() {
            return false;
        }

        // Two grid slots per beat; the first note sounds half a beat in.
        let due_steps = (self.clock.beat_at(now).to_float() * 2.0).floor() as u64;
        while self.next_step < due_steps {
            if self.next_step >= self.total_steps {
                self.clock.stop(now);
                log::info!("finished '{}'", self.exercise.id);
                on_event(PlayerEvent::Finished);
                return false;
            }
            let step = self.next_step;
            self.next_step += 1;
            self.emit_step(step, sink, &mut on_event);
        }
        true
    }

    fn emit_step(&self, step: u64, sink: &dyn ToneSink, on_event: &mut impl FnMut(PlayerEvent)) {
        let measure_index = (step as usize) / NOTES_PER_MEASURE;
        let slot = (step as usize) % NOTES_PER_MEASURE;
        let measure_number = measure_index as u32 + 1;

        for hand in [Hand::Right, Hand::Left] {
            if !self.hand_mode.plays(hand) {
                continue;
            }
            let Some(measure) = self.exercise.measure(hand, measure_number) else {
                continue;
            };
            let Some(Some(note)) = measure.notes.get(slot) else {
                continue;
            };
            sink.play(
                Tone::new(note.frequency(), NOTE_DURATION).with_dynamic(measure.dynamics),
            );
            on_event(PlayerEvent::NoteOn {
                hand,
                note: *note,
                fingering: measure.fingering.get(slot).copied().unwrap_or(0),
            });
        }

        let percent = (step + 1) as f64 / self.total_steps as f64 * 100.0;
        on_event(PlayerEvent::Progress {
            percent,
            measure: measure_number,
            note: slot as u32 + 1,
        });
    }
}
