//! Metronome click generation.
//!
//! Clicks are short square-wave tones: a higher, louder click on the
//! first beat of each measure and a softer one on the rest. The beat
//! grid comes from a [`TransportClock`], so tempo changes restart the
//! count from beat one rather than drifting mid-measure.

use crate::events::PlayerEvent;
use crate::notes::Dynamic;
use crate::sink::{Tone, ToneSink, Waveform};
use crate::timing::TransportClock;
use std::time::Instant;

/// Click frequency for the first beat of a measure.
pub const STRONG_BEAT_FREQ: f64 = 800.0;
/// Click frequency for the remaining beats.
pub const WEAK_BEAT_FREQ: f64 = 600.0;
/// Click length in seconds.
pub const CLICK_DURATION: f64 = 0.1;

pub struct Metronome {
    clock: TransportClock,
    beats_per_measure: u32,
    /// Count of beats already clicked since the last (re)start.
    next_beat: u64,
}

impl Metronome {
    pub fn new(bpm: f64, beats_per_measure: u32) -> Self {
        Self {
            clock: TransportClock::new(bpm),
            beats_per_measure: beats_per_measure.max(1),
            next_beat: 0,
        }
    }

    pub fn is_running(&self) -> bool {
        self.clock.is_running()
    }

    pub fn tempo(&self) -> f64 {
        self.clock.bpm()
    }

    /// Start clicking. The first click lands on the very next tick.
    pub fn start(&mut self, now: Instant) {
        self.clock.seek(crate::timing::BeatTime::ZERO, now);
        self.clock.start(now);
        self.next_beat = 0;
        log::debug!(
            "metronome started at {} BPM, {} beats per measure",
            self.clock.bpm(),
            self.beats_per_measure
        );
    }

    pub fn stop(&mut self, now: Instant) {
        self.clock.stop(now);
    }

    /// Change tempo. A running metronome restarts its count from beat
    /// one so the accent pattern stays aligned.
    pub fn set_tempo(&mut self, bpm: f64, now: Instant) {
        self.clock.set_bpm(bpm, now);
        if self.clock.is_running() {
            self.start(now);
        }
    }

    /// Change the accent cycle length, restarting the count if running.
    pub fn set_beats_per_measure(&mut self, beats: u32, now: Instant) {
        self.beats_per_measure = beats.max(1);
        if self.clock.is_running() {
            self.start(now);
        }
    }

    /// Emit every click due by `now`. Usually zero or one per call; a
    /// late tick catches up without skipping accents.
    pub fn tick(
        &mut self,
        now: Instant,
        sink: &dyn ToneSink,
        mut on_event: impl FnMut(PlayerEvent),
    ) {
        if !self.clock.is_running() {
            return;
        }

        let beat = self.clock.beat_at(now).to_float();
        while (self.next_beat as f64) <= beat {
            let in_measure = (self.next_beat % self.beats_per_measure as u64) as u32;
            let strong = in_measure == 0;
            let tone = if strong {
                Tone::new(STRONG_BEAT_FREQ, CLICK_DURATION).with_dynamic(Dynamic::F)
            } else {
                Tone::new(WEAK_BEAT_FREQ, CLICK_DURATION).with_dynamic(Dynamic::Mf)
            };
            sink.play(tone.with_waveform(Waveform::Square));
            on_event(PlayerEvent::MetronomeBeat {
                beat: in_measure + 1,
                strong,
            });
            self.next_beat += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::testing::RecordingSink;
    use std::time::Duration;

    fn collect_ticks(
        metronome: &mut Metronome,
        sink: &RecordingSink,
        now: Instant,
    ) -> Vec<PlayerEvent> {
        let mut events = Vec::new();
        metronome.tick(now, sink, |e| events.push(e));
        events
    }

    #[test]
    fn test_first_click_is_immediate_and_strong() {
        let mut m = Metronome::new(120.0, 4);
        let sink = RecordingSink::new();
        let now = Instant::now();
        m.start(now);

        let events = collect_ticks(&mut m, &sink, now);
        assert_eq!(
            events,
            vec![PlayerEvent::MetronomeBeat {
                beat: 1,
                strong: true
            }]
        );
        let tones = sink.recorded();
        assert_eq!(tones.len(), 1);
        assert_eq!(tones[0].frequency, STRONG_BEAT_FREQ);
        assert_eq!(tones[0].waveform, Waveform::Square);
        assert_eq!(tones[0].dynamic, Dynamic::F);
    }

    #[test]
    fn test_accent_pattern_over_one_measure() {
        let mut m = Metronome::new(120.0, 4);
        let sink = RecordingSink::new();
        let now = Instant::now();
        m.start(now);

        // 120 BPM: beats land every 500 ms. Run just past beat 4.
        let events = collect_ticks(&mut m, &sink, now + Duration::from_millis(1510));
        let strongs: Vec<bool> = events
            .iter()
            .map(|e| match e {
                PlayerEvent::MetronomeBeat { strong, .. } => *strong,
                other => panic!("unexpected event {other:?}"),
            })
            .collect();
        assert_eq!(strongs, vec![true, false, false, false]);

        // Next measure starts strong again.
        let events = collect_ticks(&mut m, &sink, now + Duration::from_millis(2010));
        assert_eq!(
            events,
            vec![PlayerEvent::MetronomeBeat {
                beat: 1,
                strong: true
            }]
        );
    }

    #[test]
    fn test_beat_count_matches_elapsed_time() {
        // floor(run_seconds * bpm / 60) + 1 clicks after running.
        let mut m = Metronome::new(90.0, 4);
        let sink = RecordingSink::new();
        let now = Instant::now();
        m.start(now);
        m.tick(now + Duration::from_secs(4), &sink, |_| {});
        // 4 s at 90 BPM is 6 beats, plus the immediate first click.
        assert_eq!(sink.len(), 7);
    }

    #[test]
    fn test_tempo_change_resets_count() {
        let mut m = Metronome::new(120.0, 4);
        let sink = RecordingSink::new();
        let now = Instant::now();
        m.start(now);
        m.tick(now + Duration::from_millis(1010), &sink, |_| {});
        assert_eq!(sink.len(), 3); // beats 1, 2, 3

        let change = now + Duration::from_millis(1100);
        m.set_tempo(60.0, change);
        let events = collect_ticks(&mut m, &sink, change);
        // Restarted: next click is beat 1 again.
        assert_eq!(
            events,
            vec![PlayerEvent::MetronomeBeat {
                beat: 1,
                strong: true
            }]
        );
    }

    #[test]
    fn test_stopped_metronome_is_silent() {
        let mut m = Metronome::new(120.0, 4);
        let sink = RecordingSink::new();
        let now = Instant::now();
        m.start(now);
        m.tick(now, &sink, |_| {});
        m.stop(now + Duration::from_millis(100));
        m.tick(now + Duration::from_secs(10), &sink, |_| {});
        assert_eq!(sink.len(), 1);
    }
}
