//! Time-Variant Amplitude: combines the static level contributions (bias
//! point, partial/velocity/sample/instrument volume) with the per-phase TVA
//! envelope, applies tremolo from the two LFOs, and produces a migrating
//! stereo pan split.

use super::envelope::{Envelope, EnvelopeSpec, EnvelopeType};
use crate::rom::LookupTables;

pub struct Tva {
    bias_level: i32,
    level_index: i32,
    envelope: Envelope,
    pan_current: i32,
    pan_target: i32,
    pan_locked: bool,
}

impl Tva {
    pub fn new(sample_rate: f32) -> Self {
        Tva {
            bias_level: 0,
            level_index: 0,
            envelope: Envelope::new(EnvelopeType::Tva, sample_rate),
            pan_current: 64,
            pan_target: 64,
            pan_locked: false,
        }
    }

    /// Resolves the static bias contribution from `TVABiasPoint`/
    /// `TVABiasLevel` via the key-mapper indirection: the key-mapper table
    /// gives a per-key divisor into `TimeKeyFollowDiv`, scaled by the
    /// distance from the bias point.
    fn resolve_bias_level(key: u8, bias_point: u8, bias_level: i8, lut: &LookupTables) -> i32 {
        let key_distance = key as i32 - bias_point as i32;
        if key_distance == 0 {
            return 0;
        }
        let divisor_index = (lut.key_mapper_index[key as usize] as usize)
            .min(lut.time_key_follow_div.len().saturating_sub(1));
        let divisor = lut.time_key_follow_div.get(divisor_index).copied().unwrap_or(1).max(1);
        (key_distance * bias_level as i32) / divisor
    }

    #[allow(clippy::too_many_arguments)]
    pub fn trigger(
        &mut self,
        key: u8,
        bias_point: u8,
        bias_level: i8,
        partial_volume: u8,
        velocity_curved: u8,
        sample_volume: u8,
        inst_volume_att: u8,
        part_panpot: u8,
        random_pan_lock: bool,
        spec: &EnvelopeSpec,
        lut: &LookupTables,
    ) {
        self.bias_level = Self::resolve_bias_level(key, bias_point, bias_level, lut);

        let idx = |v: u8| lut.tva_level_index[v as usize & 0x7f];
        self.level_index = self.bias_level
            + idx(partial_volume)
            + idx(velocity_curved)
            + idx(sample_volume)
            + idx(inst_volume_att);

        self.pan_locked = random_pan_lock;
        self.pan_target = if self.pan_locked {
            (part_panpot as i32 % 127) + 1
        } else {
            part_panpot as i32
        };
        self.pan_current = self.pan_target;

        self.envelope.trigger(spec, lut);
    }

    pub fn release(&mut self) {
        self.envelope.release();
    }

    pub fn is_finished(&self) -> bool {
        self.envelope.is_finished()
    }

    pub fn set_pan_target(&mut self, pan: u8) {
        if !self.pan_locked {
            self.pan_target = pan as i32;
        }
    }

    /// Advances the TVA envelope and tremolo LFOs one sample, returning
    /// `(left_gain, right_gain)` already including the envelope level.
    pub fn tick(
        &mut self,
        lfo1_value: f32,
        lfo2_value: f32,
        tremolo1_depth: f32,
        tremolo2_depth: f32,
        lut: &LookupTables,
    ) -> (f32, f32) {
        let env = self.envelope.tick();
        let env_line = (env * 127.0) as i32;
        let env_contribution = lut.tva_level_index[env_line.clamp(0, 127) as usize];

        let table_index = (255 - (self.level_index + env_contribution)).clamp(0, 255) as usize;
        let level = lut.tva_level[table_index] as f32 / 255.0;

        let tremolo1 = (lfo1_value * tremolo1_depth).clamp(0.0, 3.0);
        let tremolo2 = (lfo2_value * tremolo2_depth).clamp(0.0, 3.0);
        let level = (level * (1.0 - (tremolo1 + tremolo2).abs() * 0.1)).max(0.0);

        if self.pan_current < self.pan_target {
            self.pan_current += 1;
        } else if self.pan_current > self.pan_target {
            self.pan_current -= 1;
        }

        let pan = self.pan_current.clamp(0, 127) as usize;
        let pan_l = lut.tva_panpot[pan] as f32 / 127.0;
        let pan_r = lut.tva_panpot[128 - pan.max(1)] as f32 / 127.0;

        (level * pan_l, level * pan_r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lut_with_unity_levels() -> LookupTables {
        let mut lut = LookupTables::default();
        for v in lut.tva_level.iter_mut() {
            *v = 255;
        }
        for v in lut.tva_panpot.iter_mut() {
            *v = 64;
        }
        lut.time_key_follow_div = [1; 21];
        lut
    }

    fn spec() -> EnvelopeSpec {
        EnvelopeSpec {
            durations: [0, 0, 0, 0, 0],
            levels: [1.0, 1.0, 1.0, 1.0, 1.0],
            shapes: [false; 5],
            time_key_follow: 256.0,
            time_velocity_sensitivity: 256.0,
            tone_modify_attack: 0,
            tone_modify_decay: 0,
            tone_modify_release: 0,
        }
    }

    #[test]
    fn pan_migrates_toward_target_one_step_per_sample() {
        let lut = lut_with_unity_levels();
        let mut tva = Tva::new(32000.0);
        tva.trigger(60, 60, 0, 127, 127, 127, 127, 64, false, &spec(), &lut);
        tva.set_pan_target(70);
        tva.tick(0.0, 0.0, 0.0, 0.0, &lut);
        assert_eq!(tva.pan_current, 65);
    }

    #[test]
    fn random_pan_lock_prevents_target_updates() {
        let lut = lut_with_unity_levels();
        let mut tva = Tva::new(32000.0);
        tva.trigger(60, 60, 0, 127, 127, 127, 127, 0, true, &spec(), &lut);
        let locked_target = tva.pan_target;
        tva.set_pan_target(100);
        assert_eq!(tva.pan_target, locked_target);
    }
}
