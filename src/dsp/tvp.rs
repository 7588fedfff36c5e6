//! Time-Variant Pitch: combines a one-time static correction computed at
//! note-on with per-sample dynamic modulation from the pitch envelope and
//! the two LFOs.

use super::envelope::{Envelope, EnvelopeSpec, EnvelopeType};
use crate::rom::LookupTables;

const LN2: f32 = std::f32::consts::LN_2;

pub struct Tvp {
    static_pitch_corr: f32,
    pitch_offset_hz: f32,
    envelope: Envelope,
}

impl Tvp {
    pub fn new(sample_rate: f32) -> Self {
        Tvp {
            static_pitch_corr: 1.0,
            pitch_offset_hz: 1.0,
            envelope: Envelope::new(EnvelopeType::Pitch, sample_rate),
        }
    }

    /// Computes the one-time static pitch correction from note number,
    /// coarse/fine tune, key-follow and random detune, then latches it for
    /// the lifetime of the voice. `sample_rate` is the engine's output rate;
    /// the hardware's pitch math is defined relative to a 32kHz clock.
    #[allow(clippy::too_many_arguments)]
    pub fn trigger(
        &mut self,
        key: u8,
        root_key: u8,
        coarse_pitch_semitones: i32,
        fine_pitch_cents: i32,
        pitch_key_follow_percent: f32,
        random_pitch_depth_cents: f32,
        sample_pitch_cents: i32,
        sample_rate: f32,
        spec: &EnvelopeSpec,
        lut: &LookupTables,
    ) {
        let key_diff = key as i32 - root_key as i32;
        let key_follow_cents = key_diff as f32 * 100.0 * pitch_key_follow_percent / 100.0;
        let total_cents = coarse_pitch_semitones as f32 * 100.0
            + fine_pitch_cents as f32
            + key_follow_cents
            + random_pitch_depth_cents
            + sample_pitch_cents as f32;

        self.static_pitch_corr = (total_cents * LN2 / 1200.0).exp();
        self.pitch_offset_hz = 32000.0 / sample_rate;
        self.envelope.trigger(spec, lut);
    }

    pub fn release(&mut self) {
        self.envelope.release();
    }

    pub fn is_finished(&self) -> bool {
        self.envelope.is_finished()
    }

    /// Advances the pitch envelope one sample and returns the pitch
    /// multiplier to apply to the sample playback rate.
    pub fn tick(
        &mut self,
        lfo1_value: f32,
        lfo2_value: f32,
        lfo1_depth_index: u8,
        lfo2_depth_index: u8,
        env_depth_multiplier: f32,
        pitch_bend_cents: f32,
        lut: &LookupTables,
    ) -> f32 {
        let env = self.envelope.tick();

        let vibrato1 = lfo1_value * lut.lfo_tvp_depth[lfo1_depth_index as usize] as f32 / 3650.0;
        let vibrato2 = lfo2_value * lut.lfo_tvp_depth[lfo2_depth_index as usize] as f32 / 3650.0;
        let env_contribution = env * 0.3 * env_depth_multiplier;

        let dyn_pitch_adj = ((env_contribution * LN2 + vibrato1 + vibrato2) / 1200.0).exp();
        let pitch_exp = (pitch_bend_cents * LN2 / 1200.0).exp();

        self.static_pitch_corr * self.pitch_offset_hz * pitch_exp * dyn_pitch_adj
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> EnvelopeSpec {
        EnvelopeSpec {
            durations: [5, 5, 5, 5, 5],
            levels: [0.0, 0.0, 0.0, 0.0, 0.0],
            shapes: [false; 5],
            time_key_follow: 256.0,
            time_velocity_sensitivity: 256.0,
            tone_modify_attack: 0,
            tone_modify_decay: 0,
            tone_modify_release: 0,
        }
    }

    #[test]
    fn flat_envelope_and_no_modulation_gives_unity_ratio_at_root_key() {
        let lut = LookupTables::default();
        let mut tvp = Tvp::new(32000.0);
        tvp.trigger(60, 60, 0, 0, 100.0, 0.0, 0, 32000.0, &spec(), &lut);
        let ratio = tvp.tick(0.0, 0.0, 0, 0, 0.0, 0.0, &lut);
        assert!((ratio - 1.0).abs() < 1e-4);
    }

    #[test]
    fn key_above_root_raises_pitch_ratio() {
        let lut = LookupTables::default();
        let mut tvp = Tvp::new(32000.0);
        tvp.trigger(72, 60, 0, 0, 100.0, 0.0, 0, 32000.0, &spec(), &lut);
        let ratio = tvp.tick(0.0, 0.0, 0, 0, 0.0, 0.0, &lut);
        assert!(ratio > 1.9 && ratio < 2.1);
    }
}
