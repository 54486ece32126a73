//! Waveform sample generation.

use etude_core::Waveform;

/// Sample a waveform at a phase in `[0, 1)`. Output is in `[-1, 1]`.
pub fn sample(waveform: Waveform, phase: f32) -> f32 {
    match waveform {
        Waveform::Sine => (phase * std::f32::consts::TAU).sin(),
        Waveform::Square => {
            if phase < 0.5 {
                1.0
            } else {
                -1.0
            }
        }
        Waveform::Triangle => 4.0 * (phase - (phase + 0.5).floor()).abs() - 1.0,
        Waveform::Sawtooth => 2.0 * phase - 1.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sine_endpoints() {
        assert!(sample(Waveform::Sine, 0.0).abs() < 1e-6);
        assert!((sample(Waveform::Sine, 0.25) - 1.0).abs() < 1e-6);
        assert!((sample(Waveform::Sine, 0.75) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_square_halves() {
        assert_eq!(sample(Waveform::Square, 0.1), 1.0);
        assert_eq!(sample(Waveform::Square, 0.6), -1.0);
    }

    #[test]
    fn test_triangle_shape() {
        assert!((sample(Waveform::Triangle, 0.0) + 1.0).abs() < 1e-6);
        assert!((sample(Waveform::Triangle, 0.25)).abs() < 1e-6);
        assert!((sample(Waveform::Triangle, 0.5) - 1.0).abs() < 1e-6);
        assert!((sample(Waveform::Triangle, 0.75)).abs() < 1e-6);
    }

    #[test]
    fn test_sawtooth_ramp() {
        assert!((sample(Waveform::Sawtooth, 0.0) + 1.0).abs() < 1e-6);
        assert!((sample(Waveform::Sawtooth, 0.5)).abs() < 1e-6);
        assert!((sample(Waveform::Sawtooth, 0.999) - 0.998).abs() < 0.01);
    }

    #[test]
    fn test_all_waveforms_bounded() {
        for w in [
            Waveform::Sine,
            Waveform::Square,
            Waveform::Triangle,
            Waveform::Sawtooth,
        ] {
            for i in 0..1000 {
                let s = sample(w, i as f32 / 1000.0);
                assert!((-1.0..=1.0).contains(&s), "{w:?} out of range at {i}");
            }
        }
    }
}
