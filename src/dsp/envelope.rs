//! Five-phase piecewise envelope generator (Attack1, Attack2, Decay1,
//! Decay2, Release) shared by TVP, TVF and TVA. Durations come from the
//! `envelopeTime` lookup table scaled by time-key-follow and
//! time-velocity-sensitivity; segment shape (linear or exponential) is
//! per-phase ROM data carried in `EnvelopeSpec::shapes` — TVF's envelope is
//! always linear, TVA's varies per partial from the top bit of each
//! `TVAEnvT*` duration byte.

use crate::rom::LookupTables;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeType {
    Pitch,
    Tvf,
    Tva,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Attack1,
    Attack2,
    Decay1,
    Decay2,
    Release,
    Finished,
}

/// Raw (un-scaled) per-phase parameters as read from the instrument/partial
/// control-ROM block: durations 0-127, levels already normalized to the
/// target's natural range (0.0-1.0 for TVF/TVA, arbitrary for pitch cents).
pub struct EnvelopeSpec {
    pub durations: [u8; 5],
    pub levels: [f32; 5],
    /// Per-phase shape, `true` = exponential, `false` = linear. TVF and the
    /// pitch envelope are always all-`false`; TVA reads the top bit of each
    /// `TVAEnvT*` duration byte (bit clear = exponential, bit set = linear).
    pub shapes: [bool; 5],
    pub time_key_follow: f32,
    pub time_velocity_sensitivity: f32,
    /// `(TVFAEnvAttack|Decay|Release - 0x40) * 2`, applied to Attack/Decay/
    /// Release durations. Zero for the pitch envelope, which tone-modify
    /// never touches.
    pub tone_modify_attack: i32,
    pub tone_modify_decay: i32,
    pub tone_modify_release: i32,
}

pub struct Envelope {
    env_type: EnvelopeType,
    phase: Phase,
    phase_durations: [u32; 5],
    phase_levels: [f32; 5],
    phase_shapes: [bool; 5],
    start_level: f32,
    current_value: f32,
    samples_into_phase: u32,
    sample_rate: f32,
    exp_change: [i32; 256],
}

impl Envelope {
    pub fn new(env_type: EnvelopeType, sample_rate: f32) -> Self {
        Envelope {
            env_type,
            phase: Phase::Finished,
            phase_durations: [0; 5],
            phase_levels: [0.0; 5],
            phase_shapes: [false; 5],
            start_level: 0.0,
            current_value: 0.0,
            samples_into_phase: 0,
            sample_rate,
            exp_change: [0; 256],
        }
    }

    pub fn trigger(&mut self, spec: &EnvelopeSpec, lut: &LookupTables) {
        let tone_modify = [
            self.tone_modify_clamped(spec.durations[0], spec.tone_modify_attack),
            self.tone_modify_clamped(spec.durations[1], spec.tone_modify_attack),
            self.tone_modify_clamped(spec.durations[2], spec.tone_modify_decay),
            self.tone_modify_clamped(spec.durations[3], spec.tone_modify_decay),
            self.tone_modify_clamped(spec.durations[4], spec.tone_modify_release),
        ];

        for i in 0..5 {
            let table_index = tone_modify[i] as usize;
            let time_ms = (*lut.envelope_time.get(table_index).unwrap_or(&0) + 1) as f32;
            let seconds = (time_ms / 1000.0)
                * (spec.time_key_follow / 256.0).max(0.0001)
                * (spec.time_velocity_sensitivity / 256.0).max(0.0001);
            self.phase_durations[i] = (seconds * self.sample_rate) as u32;
        }

        self.phase_levels = spec.levels;
        self.phase_shapes = spec.shapes;
        for (i, v) in self.exp_change.iter_mut().enumerate() {
            *v = *lut.tva_env_exp_change.get(i).unwrap_or(&0);
        }
        self.start_level = 0.0;
        self.current_value = 0.0;
        self.samples_into_phase = 0;
        self.phase = Phase::Attack1;
    }

    /// Forces an immediate transition into the Release phase (note-off),
    /// unless already released or never triggered.
    pub fn release(&mut self) {
        if self.phase == Phase::Finished || self.phase == Phase::Release {
            return;
        }
        self.start_level = self.current_value;
        self.samples_into_phase = 0;
        self.phase = Phase::Release;
    }

    pub fn is_finished(&self) -> bool {
        self.phase == Phase::Finished
    }

    fn tone_modify_clamped(&self, duration: u8, offset: i32) -> u8 {
        (duration as i32 + offset).clamp(0, 127) as u8
    }

    fn phase_index(phase: Phase) -> Option<usize> {
        match phase {
            Phase::Attack1 => Some(0),
            Phase::Attack2 => Some(1),
            Phase::Decay1 => Some(2),
            Phase::Decay2 => Some(3),
            Phase::Release => Some(4),
            Phase::Finished => None,
        }
    }

    /// Interpolated read of `LUT.TVAEnvExpChange` at a fractional index,
    /// matching the original's `_calc_exp_change`.
    fn exp_change_at(&self, index: f32) -> f32 {
        let index = index.clamp(0.0, 255.0);
        let p0 = index as usize;
        let p1 = (p0 + 1).min(255);
        let frac1 = index - p0 as f32;
        let frac0 = 1.0 - frac1;
        frac0 * self.exp_change[p0] as f32 + frac1 * self.exp_change[p1] as f32
    }

    fn next_phase(phase: Phase) -> Phase {
        match phase {
            Phase::Attack1 => Phase::Attack2,
            Phase::Attack2 => Phase::Decay1,
            Phase::Decay1 => Phase::Decay2,
            Phase::Decay2 => Phase::Release,
            Phase::Release => Phase::Finished,
            Phase::Finished => Phase::Finished,
        }
    }

    /// Advances one sample, returning the new envelope value.
    pub fn tick(&mut self) -> f32 {
        let Some(index) = Self::phase_index(self.phase) else {
            return self.current_value;
        };

        let duration = self.phase_durations[index];
        let target = self.phase_levels[index];

        if duration == 0 {
            self.current_value = target;
        } else {
            let progress = (self.samples_into_phase as f32 / duration as f32).min(1.0);
            self.current_value = if self.phase_shapes[index] {
                let change = self.exp_change_at(255.0 - 255.0 * progress) / 65535.0;
                target + (self.start_level - target) * change
            } else {
                self.start_level + (target - self.start_level) * progress
            };
        }

        self.samples_into_phase += 1;

        if self.samples_into_phase >= duration.max(1) {
            // Decay2 sustains indefinitely (never auto-advances to Release)
            // whenever its target level is non-zero; a zero target means the
            // note naturally dies out and should fall into Release.
            if self.phase == Phase::Decay2 && self.phase_levels[3] != 0.0 {
                self.samples_into_phase = duration.max(1) - 1;
                return self.current_value;
            }

            self.start_level = self.current_value;
            self.samples_into_phase = 0;
            self.phase = Self::next_phase(self.phase);
        }

        self.current_value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_lut() -> LookupTables {
        let mut lut = LookupTables::default();
        for (i, v) in lut.envelope_time.iter_mut().enumerate() {
            *v = i as i32;
        }
        // A linear ramp 0..65535 so `exp_change_at` traces a straight line
        // too, making the exponential-shape branch's output predictable in
        // tests without needing the real ROM curve.
        for (i, v) in lut.tva_env_exp_change.iter_mut().enumerate() {
            *v = (i as i32) * 65535 / 255;
        }
        lut
    }

    fn spec() -> EnvelopeSpec {
        EnvelopeSpec {
            durations: [10, 10, 20, 20, 30],
            levels: [1.0, 0.8, 0.5, 0.5, 0.0],
            shapes: [false, false, true, true, true],
            time_key_follow: 256.0,
            time_velocity_sensitivity: 256.0,
            tone_modify_attack: 0,
            tone_modify_decay: 0,
            tone_modify_release: 0,
        }
    }

    #[test]
    fn decay2_sustains_when_target_nonzero() {
        let lut = flat_lut();
        let mut env = Envelope::new(EnvelopeType::Tva, 1000.0);
        env.trigger(&spec(), &lut);
        for _ in 0..5000 {
            env.tick();
        }
        assert!((0.4..=0.6).contains(&env.current_value));
        assert!(!env.is_finished());
    }

    #[test]
    fn release_drives_envelope_to_completion() {
        let lut = flat_lut();
        let mut env = Envelope::new(EnvelopeType::Tva, 1000.0);
        env.trigger(&spec(), &lut);
        for _ in 0..100 {
            env.tick();
        }
        env.release();
        for _ in 0..100_000 {
            env.tick();
        }
        assert!(env.is_finished());
    }

    /// Stages an envelope mid-phase directly (bypassing `trigger`'s duration
    /// lookup) so a single phase's shape can be tested in isolation.
    fn staged(env_type: EnvelopeType, shape: bool, start: f32, target: f32, duration: u32, into: u32) -> Envelope {
        let mut env = Envelope::new(env_type, 1000.0);
        for (i, v) in env.exp_change.iter_mut().enumerate() {
            *v = (i as i32) * 65535 / 255;
        }
        env.phase = Phase::Decay1;
        env.phase_durations = [0, 0, duration, 0, 0];
        env.phase_levels = [0.0, 0.0, target, 0.0, 0.0];
        env.phase_shapes = [false, false, shape, false, false];
        env.start_level = start;
        env.current_value = start;
        env.samples_into_phase = into;
        env
    }

    #[test]
    fn linear_shape_advances_by_a_constant_step() {
        let mut env = staged(EnvelopeType::Pitch, false, 0.0, 1.0, 10, 3);
        let before = env.tick();
        let after = env.tick();
        assert!((after - before - 1.0 / 10.0).abs() < 1e-5);
    }

    #[test]
    fn exponential_shape_reads_the_lut_instead_of_a_fixed_curve() {
        // Halfway through a 20-sample Decay1 phase from 0.8 down to 0.5,
        // with a linear `tva_env_exp_change` table so the expected value is
        // exactly halfway between start and target.
        let mut env = staged(EnvelopeType::Tva, true, 0.8, 0.5, 20, 10);
        let mid = env.tick();
        assert!((mid - 0.65).abs() < 1e-3);
    }
}
