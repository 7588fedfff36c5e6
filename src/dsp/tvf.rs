//! Time-Variant Filter: a single RBJ biquad (lowpass or highpass, or
//! bypassed entirely) whose cutoff is modulated per-sample by the TVF
//! envelope, key-follow and the two LFOs.

use super::envelope::{Envelope, EnvelopeSpec, EnvelopeType};
use crate::rom::LookupTables;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterType {
    LowPass,
    HighPass,
    Disabled,
}

impl FilterType {
    pub fn from_rom_flag(flag: u8) -> Self {
        match flag {
            0 => FilterType::LowPass,
            1 => FilterType::HighPass,
            _ => FilterType::Disabled,
        }
    }
}

/// Key-follow coefficient selector, matching the four `TVFCFKeyFlwC` modes:
/// flat divisors below key 60, steeper divisors above it.
#[derive(Debug, Clone, Copy)]
pub enum KeyFollowMode {
    Flat,
    Tenth,
    TenthAboveC4,
    HundredthAboveC4,
}

impl KeyFollowMode {
    pub fn from_rom_code(code: u8) -> Self {
        match code {
            0 | 3 => KeyFollowMode::Tenth,
            1 => KeyFollowMode::Tenth,
            2 => KeyFollowMode::HundredthAboveC4,
            _ => KeyFollowMode::Flat,
        }
    }
}

struct Biquad {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl Biquad {
    fn identity() -> Self {
        Biquad { b0: 1.0, b1: 0.0, b2: 0.0, a1: 0.0, a2: 0.0, x1: 0.0, x2: 0.0, y1: 0.0, y2: 0.0 }
    }

    fn set_lowpass(&mut self, sample_rate: f32, cutoff_hz: f32, q: f32) {
        let w0 = 2.0 * std::f32::consts::PI * cutoff_hz / sample_rate;
        let (sin_w0, cos_w0) = w0.sin_cos();
        let alpha = sin_w0 / (2.0 * q.max(0.01));

        let b0 = (1.0 - cos_w0) / 2.0;
        let b1 = 1.0 - cos_w0;
        let b2 = (1.0 - cos_w0) / 2.0;
        let a0 = 1.0 + alpha;
        let a1 = -2.0 * cos_w0;
        let a2 = 1.0 - alpha;

        self.b0 = b0 / a0;
        self.b1 = b1 / a0;
        self.b2 = b2 / a0;
        self.a1 = a1 / a0;
        self.a2 = a2 / a0;
    }

    fn set_highpass(&mut self, sample_rate: f32, cutoff_hz: f32, q: f32) {
        let w0 = 2.0 * std::f32::consts::PI * cutoff_hz / sample_rate;
        let (sin_w0, cos_w0) = w0.sin_cos();
        let alpha = sin_w0 / (2.0 * q.max(0.01));

        let b0 = (1.0 + cos_w0) / 2.0;
        let b1 = -(1.0 + cos_w0);
        let b2 = (1.0 + cos_w0) / 2.0;
        let a0 = 1.0 + alpha;
        let a1 = -2.0 * cos_w0;
        let a2 = 1.0 - alpha;

        self.b0 = b0 / a0;
        self.b1 = b1 / a0;
        self.b2 = b2 / a0;
        self.a1 = a1 / a0;
        self.a2 = a2 / a0;
    }

    fn process(&mut self, input: f32) -> f32 {
        let output = self.b0 * input + self.b1 * self.x1 + self.b2 * self.x2
            - self.a1 * self.y1
            - self.a2 * self.y2;
        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = output;
        output
    }
}

pub struct Tvf {
    filter_type: FilterType,
    key_follow_mode: KeyFollowMode,
    sample_rate: f32,
    biquad: Biquad,
    envelope: Envelope,
}

impl Tvf {
    pub fn new(sample_rate: f32, filter_type: FilterType, key_follow_mode: KeyFollowMode) -> Self {
        Tvf {
            filter_type,
            key_follow_mode,
            sample_rate,
            biquad: Biquad::identity(),
            envelope: Envelope::new(EnvelopeType::Tvf, sample_rate),
        }
    }

    pub fn trigger(&mut self, spec: &EnvelopeSpec, lut: &LookupTables) {
        self.envelope.trigger(spec, lut);
    }

    pub fn release(&mut self) {
        self.envelope.release();
    }

    pub fn is_finished(&self) -> bool {
        self.envelope.is_finished()
    }

    fn key_follow_hz(&self, midi_key: u8) -> f32 {
        let key_diff = midi_key as f32 - 60.0;
        match self.key_follow_mode {
            KeyFollowMode::Flat => 0.0,
            KeyFollowMode::Tenth => key_diff / 10.0,
            KeyFollowMode::TenthAboveC4 => {
                if midi_key > 60 { key_diff / 10.0 } else { 0.0 }
            }
            KeyFollowMode::HundredthAboveC4 => {
                if midi_key > 60 { key_diff / 100.0 } else { 0.0 }
            }
        }
    }

    /// Advances the TVF envelope one sample, recomputes the biquad
    /// coefficients, and filters `input`.
    #[allow(clippy::too_many_arguments)]
    pub fn process(
        &mut self,
        input: f32,
        midi_key: u8,
        env_depth: f32,
        lfo1_value: f32,
        lfo2_value: f32,
        lfo1_depth_index: u8,
        lfo2_depth_index: u8,
        base_cutoff_hz: f32,
        resonance_code: u8,
        lut: &LookupTables,
    ) -> f32 {
        if self.filter_type == FilterType::Disabled {
            return input;
        }

        let env = self.envelope.tick();
        let env_freq = (env - 0.5) * env_depth * 100.0 * 0.01;
        let key_follow = self.key_follow_hz(midi_key);

        let lfo_mod = (lfo1_value * lut.lfo_tvf_depth[lfo1_depth_index as usize] as f32
            + lfo2_value * lut.lfo_tvf_depth[lfo2_depth_index as usize] as f32)
            / 100_000.0;

        let cutoff = (base_cutoff_hz / 4.3 + env_freq + key_follow * 100.0 + lfo_mod * base_cutoff_hz)
            .clamp(35.0, 12500.0);

        let q = 10.0 - (resonance_code as f32 - 106.0) * 9.6 / 149.0;

        match self.filter_type {
            FilterType::LowPass => self.biquad.set_lowpass(self.sample_rate, cutoff, q.max(0.5)),
            FilterType::HighPass => self.biquad.set_highpass(self.sample_rate, cutoff, q.max(0.5)),
            FilterType::Disabled => unreachable!(),
        }

        self.biquad.process(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_filter_passes_signal_unchanged() {
        let mut tvf = Tvf::new(32000.0, FilterType::Disabled, KeyFollowMode::Flat);
        let lut = LookupTables::default();
        assert_eq!(tvf.process(0.5, 60, 0.0, 0.0, 0.0, 0, 0, 1000.0, 106, &lut), 0.5);
    }

    #[test]
    fn lowpass_attenuates_step_input_initially() {
        let mut tvf = Tvf::new(32000.0, FilterType::LowPass, KeyFollowMode::Flat);
        let spec = super::super::envelope::EnvelopeSpec {
            durations: [0, 0, 0, 0, 0],
            levels: [0.5, 0.5, 0.5, 0.5, 0.5],
            shapes: [false; 5],
            time_key_follow: 256.0,
            time_velocity_sensitivity: 256.0,
            tone_modify_attack: 0,
            tone_modify_decay: 0,
            tone_modify_release: 0,
        };
        let lut = LookupTables::default();
        tvf.trigger(&spec, &lut);
        let out = tvf.process(1.0, 60, 0.0, 0.0, 0.0, 0, 0, 500.0, 106, &lut);
        assert!(out.abs() < 1.0);
    }
}
