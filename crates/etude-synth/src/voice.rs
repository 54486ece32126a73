//! A single sounding voice: oscillator plus amplitude envelope.

use crate::waveform;
use etude_core::{Tone, Waveform};

/// Attack ramp length in seconds.
const ATTACK: f64 = 0.01;
/// Envelope floor the decay ramps toward. Inaudible but nonzero so the
/// exponential ramp is well-defined.
const FLOOR: f32 = 0.001;

/// One tone being rendered. The envelope rises linearly to the tone's
/// peak over the attack, then decays exponentially to the floor across
/// the remaining duration.
pub struct Voice {
    pub id: u64,
    phase: f32,
    phase_inc: f32,
    waveform: Waveform,
    peak: f32,
    attack_samples: u64,
    total_samples: u64,
    elapsed: u64,
}

impl Voice {
    pub fn new(id: u64, tone: &Tone, sample_rate: f32) -> Self {
        let total = (tone.duration.max(ATTACK) * sample_rate as f64) as u64;
        Self {
            id,
            phase: 0.0,
            phase_inc: (tone.frequency as f32 / sample_rate).min(0.5),
            waveform: tone.waveform,
            peak: tone.dynamic.volume(),
            attack_samples: (ATTACK * sample_rate as f64) as u64,
            total_samples: total.max(1),
            elapsed: 0,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.elapsed >= self.total_samples
    }

    fn envelope(&self) -> f32 {
        if self.elapsed < self.attack_samples {
            self.peak * self.elapsed as f32 / self.attack_samples as f32
        } else {
            let decay = (self.total_samples - self.attack_samples).max(1);
            let progress = (self.elapsed - self.attack_samples) as f32 / decay as f32;
            self.peak * (FLOOR / self.peak).powf(progress)
        }
    }

    /// Render the next mono sample and advance the voice.
    pub fn next_sample(&mut self) -> f32 {
        if self.is_finished() {
            return 0.0;
        }
        let s = waveform::sample(self.waveform, self.phase) * self.envelope();
        self.phase += self.phase_inc;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }
        self.elapsed += 1;
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use etude_core::Dynamic;

    const RATE: f32 = 48_000.0;

    fn voice(duration: f64) -> Voice {
        let tone = Tone::new(440.0, duration).with_dynamic(Dynamic::Mf);
        Voice::new(1, &tone, RATE)
    }

    #[test]
    fn test_attack_ramps_from_silence() {
        let mut v = voice(0.5);
        assert_eq!(v.next_sample(), 0.0); // envelope starts at zero
        // Midway through the attack the envelope is partial.
        for _ in 0..239 {
            v.next_sample();
        }
        let env = v.envelope();
        assert!(env > 0.0 && env < Dynamic::Mf.volume());
    }

    #[test]
    fn test_peak_after_attack() {
        let mut v = voice(0.5);
        for _ in 0..480 {
            v.next_sample();
        }
        assert!((v.envelope() - Dynamic::Mf.volume()).abs() < 0.01);
    }

    #[test]
    fn test_decays_to_floor() {
        let mut v = voice(0.1);
        let total = (0.1 * RATE as f64) as u64;
        for _ in 0..total - 1 {
            v.next_sample();
        }
        assert!(v.envelope() < 0.002);
        v.next_sample();
        assert!(v.is_finished());
        assert_eq!(v.next_sample(), 0.0);
    }

    #[test]
    fn test_samples_bounded() {
        let mut v = voice(0.05);
        while !v.is_finished() {
            let s = v.next_sample();
            assert!(s.abs() <= 1.0);
        }
    }
}
