//! Timing primitives for playback and the metronome.
//!
//! All clock queries take an explicit `now: Instant` so that scheduling
//! logic can be driven by synthetic time in tests and by wall-clock time
//! in the runtime thread.

use crate::error::{Error, Result};
use std::str::FromStr;
use std::time::Instant;

/// Fixed-point beat representation with 16 fractional bits.
///
/// Provides sub-beat precision with deterministic arithmetic; fixed-point
/// avoids floating-point drift over long practice sessions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BeatTime {
    beats: i64,
}

impl BeatTime {
    const SCALE: i64 = 65_536;

    /// Zero beat time constant.
    pub const ZERO: BeatTime = BeatTime { beats: 0 };

    /// Create a BeatTime from a floating-point beat value.
    #[inline]
    pub fn from_float(value: f64) -> Self {
        Self {
            beats: (value * Self::SCALE as f64).round() as i64,
        }
    }

    /// Convert to a floating-point beat value.
    #[inline]
    pub fn to_float(self) -> f64 {
        self.beats as f64 / Self::SCALE as f64
    }
}

impl std::ops::Add for BeatTime {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            beats: self.beats.saturating_add(rhs.beats),
        }
    }
}

impl std::ops::Sub for BeatTime {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            beats: self.beats.saturating_sub(rhs.beats),
        }
    }
}

/// Musical time signature (numerator/denominator).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeSignature {
    pub numerator: u32,
    pub denominator: u32,
}

impl TimeSignature {
    /// Create a new time signature.
    ///
    /// Values are clamped to at least 1 to prevent division by zero.
    pub fn new(numerator: u32, denominator: u32) -> Self {
        Self {
            numerator: numerator.max(1),
            denominator: denominator.max(1),
        }
    }

    /// Number of quarter-note beats per bar (4/4 -> 4, 6/8 -> 3).
    pub fn beats_per_bar(&self) -> f64 {
        self.numerator as f64 * (4.0 / self.denominator as f64)
    }
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self::new(4, 4)
    }
}

impl FromStr for TimeSignature {
    type Err = Error;

    /// Parse the `"4/4"` form used in exercise files.
    fn from_str(s: &str) -> Result<Self> {
        let (num, den) = s
            .split_once('/')
            .ok_or_else(|| Error::InvalidExercise(format!("bad time signature '{s}'")))?;
        let numerator: u32 = num
            .trim()
            .parse()
            .map_err(|_| Error::InvalidExercise(format!("bad time signature '{s}'")))?;
        let denominator: u32 = den
            .trim()
            .parse()
            .map_err(|_| Error::InvalidExercise(format!("bad time signature '{s}'")))?;
        Ok(TimeSignature::new(numerator, denominator))
    }
}

/// Transport-aware clock for converting between wall-clock time and beats.
///
/// The clock maintains an anchor point (beat position at a specific
/// instant) and uses BPM to calculate beat positions at other times.
#[derive(Clone, Debug)]
pub struct TransportClock {
    bpm: f64,
    running: bool,
    anchor_instant: Instant,
    anchor_beat: BeatTime,
}

impl TransportClock {
    /// Create a new clock at the given tempo, stopped at beat 0.
    pub fn new(bpm: f64) -> Self {
        Self {
            bpm: bpm.clamp(1.0, 999.0),
            running: false,
            anchor_instant: Instant::now(),
            anchor_beat: BeatTime::ZERO,
        }
    }

    /// Set the BPM, preserving the current beat position.
    pub fn set_bpm(&mut self, bpm: f64, now: Instant) {
        let beat = self.beat_at(now);
        self.anchor_beat = beat;
        self.anchor_instant = now;
        self.bpm = bpm.clamp(1.0, 999.0);
    }

    /// Get the current BPM.
    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    /// Start the clock at the given instant.
    pub fn start(&mut self, now: Instant) {
        self.anchor_instant = now;
        self.running = true;
    }

    /// Stop the clock, preserving the current beat position.
    pub fn stop(&mut self, now: Instant) {
        self.anchor_beat = self.beat_at(now);
        self.running = false;
    }

    /// Move the anchor to a specific beat position.
    pub fn seek(&mut self, beat: BeatTime, now: Instant) {
        self.anchor_beat = beat;
        self.anchor_instant = now;
    }

    /// Calculate the beat position at a given instant.
    pub fn beat_at(&self, time: Instant) -> BeatTime {
        if !self.running || time <= self.anchor_instant {
            return self.anchor_beat;
        }

        let elapsed = time.duration_since(self.anchor_instant).as_secs_f64();
        let beats_elapsed = (elapsed / 60.0) * self.bpm;
        self.anchor_beat + BeatTime::from_float(beats_elapsed)
    }

    /// Check if the clock is running.
    pub fn is_running(&self) -> bool {
        self.running
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_beat_time_roundtrip() {
        for val in [0.0, 1.0, 1.5, 3.75, 100.0, -5.0] {
            let bt = BeatTime::from_float(val);
            assert!((bt.to_float() - val).abs() < 0.0001, "roundtrip failed for {val}");
        }
    }

    #[test]
    fn test_beat_time_arithmetic() {
        let a = BeatTime::from_float(1.5);
        let b = BeatTime::from_float(2.25);
        assert!((a + b).to_float() - 3.75 < 0.001);
        assert!(((b - a).to_float() - 0.75).abs() < 0.001);
    }

    #[test]
    fn test_clock_beat_calculation() {
        let mut clock = TransportClock::new(120.0);
        let now = Instant::now();
        clock.start(now);
        // At 120 BPM one beat is 0.5 seconds.
        let beat = clock.beat_at(now + Duration::from_millis(500));
        assert!((beat.to_float() - 1.0).abs() < 0.001);
        let beat = clock.beat_at(now + Duration::from_secs(2));
        assert!((beat.to_float() - 4.0).abs() < 0.001);
    }

    #[test]
    fn test_clock_stopped_holds_position() {
        let mut clock = TransportClock::new(120.0);
        let now = Instant::now();
        clock.start(now);
        clock.stop(now + Duration::from_millis(500));
        let beat = clock.beat_at(now + Duration::from_secs(10));
        assert!((beat.to_float() - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_set_bpm_preserves_position() {
        let mut clock = TransportClock::new(120.0);
        let now = Instant::now();
        clock.start(now);
        let mid = now + Duration::from_secs(1); // beat 2.0
        clock.set_bpm(60.0, mid);
        // One more second at 60 BPM adds one beat.
        let beat = clock.beat_at(mid + Duration::from_secs(1));
        assert!((beat.to_float() - 3.0).abs() < 0.001);
    }

    #[test]
    fn test_time_signature_parse() {
        let sig: TimeSignature = "4/4".parse().unwrap();
        assert_eq!(sig, TimeSignature::new(4, 4));
        assert!((sig.beats_per_bar() - 4.0).abs() < 0.001);
        let sig: TimeSignature = "6/8".parse().unwrap();
        assert!((sig.beats_per_bar() - 3.0).abs() < 0.001);
        assert!("44".parse::<TimeSignature>().is_err());
        assert!("x/y".parse::<TimeSignature>().is_err());
    }
}
