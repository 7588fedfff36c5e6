//! Single-partial sample playback: the unit of polyphony. A NoteOn activates
//! one Voice per active partial of the selected instrument (one or two per
//! note), each independently running its own TVP/TVF/TVA chain and reading
//! from the shared PCM ROM.

use crate::dsp::{Envelope, EnvelopeSpec, EnvelopeType, Lfo, Tva, Tvf, Tvp, Waveform};
use crate::dsp::tvf::{FilterType, KeyFollowMode};
use crate::rom::{Instrument, InstPartial, LookupTables, PcmRom, Sample};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopMode {
    Forward,
    OneShot,
    PingPong,
}

impl LoopMode {
    fn from_rom_code(code: u8) -> Self {
        match code {
            0 => LoopMode::Forward,
            1 => LoopMode::PingPong,
            _ => LoopMode::OneShot,
        }
    }
}

/// Everything needed to start a voice, resolved once by the `Part` at
/// note-on time (instrument/partial/sample lookups, key, velocity, channel).
pub struct VoiceTrigger<'a> {
    pub inst_partial: &'a InstPartial,
    pub sample: &'a Sample,
    pub key: u8,
    pub velocity: u8,
    pub part_panpot: u8,
    pub random_pan_lock: bool,
    pub part_level: f32,
    pub uninterruptible: bool,
}

pub struct Voice {
    sample_address: u32,
    position: f64,
    rate_ratio: f64,
    forward: bool,
    loop_mode: LoopMode,
    sample_len: u32,
    loop_len: u32,
    attack_end: u32,

    tvp: Tvp,
    tvf: Tvf,
    tva: Tva,
    lfo1: Lfo,
    lfo2: Lfo,

    lfo1_pitch_depth_index: u8,
    lfo2_pitch_depth_index: u8,
    lfo1_tvf_depth_index: u8,
    lfo2_tvf_depth_index: u8,
    tvf_base_cutoff_hz: f32,
    tvf_resonance_code: u8,
    tremolo1_depth: f32,
    tremolo2_depth: f32,

    part_level: f32,
    held: bool,
    sustained: bool,
    uninterruptible: bool,
    active: bool,

    pub key: u8,
    pub channel: u8,
}

impl Voice {
    pub fn new(sample_rate: f32) -> Self {
        Voice {
            sample_address: 0,
            position: 0.0,
            rate_ratio: 1.0,
            forward: true,
            loop_mode: LoopMode::Forward,
            sample_len: 0,
            loop_len: 0,
            attack_end: 0,
            tvp: Tvp::new(sample_rate),
            tvf: Tvf::new(sample_rate, FilterType::LowPass, KeyFollowMode::Flat),
            tva: Tva::new(sample_rate),
            lfo1: Lfo::new(sample_rate),
            lfo2: Lfo::new(sample_rate),
            lfo1_pitch_depth_index: 0,
            lfo2_pitch_depth_index: 0,
            lfo1_tvf_depth_index: 0,
            lfo2_tvf_depth_index: 0,
            tvf_base_cutoff_hz: 1000.0,
            tvf_resonance_code: 106,
            tremolo1_depth: 0.0,
            tremolo2_depth: 0.0,
            part_level: 1.0,
            held: false,
            sustained: false,
            uninterruptible: false,
            active: false,
            key: 0,
            channel: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_uninterruptible(&self) -> bool {
        self.uninterruptible
    }

    #[allow(clippy::too_many_arguments)]
    pub fn trigger(
        &mut self,
        instrument: &Instrument,
        trigger: &VoiceTrigger,
        sample_rate: f32,
        lut: &LookupTables,
    ) {
        let p = trigger.inst_partial;
        let sample = trigger.sample;

        self.sample_address = sample.address;
        self.position = 0.0;
        self.forward = true;
        self.loop_mode = LoopMode::from_rom_code(sample.loop_mode as u8);
        self.sample_len = sample.sample_len as u32;
        self.loop_len = sample.loop_len as u32;
        self.attack_end = sample.attack_end as u32;
        self.part_level = trigger.part_level;
        self.held = false;
        self.sustained = false;
        self.uninterruptible = trigger.uninterruptible;
        self.active = true;
        self.key = trigger.key;

        self.rate_ratio = (32000.0 / sample_rate) as f64;

        let pitch_env = EnvelopeSpec {
            durations: [
                p.pitch_env_t1 & 0x7f,
                p.pitch_env_t2 & 0x7f,
                p.pitch_env_t3 & 0x7f,
                p.pitch_env_t4 & 0x7f,
                p.pitch_env_t5 & 0x7f,
            ],
            levels: [
                (p.pitch_env_l0 as i32 - 0x40) as f32,
                (p.pitch_env_l1 as i32 - 0x40) as f32,
                (p.pitch_env_l2 as i32 - 0x40) as f32,
                (p.pitch_env_l3 as i32 - 0x40) as f32,
                (p.pitch_env_l5 as i32 - 0x40) as f32,
            ],
            // The pitch envelope has no shape bit; every segment is linear.
            shapes: [false; 5],
            time_key_follow: 256.0,
            time_velocity_sensitivity: 256.0,
            tone_modify_attack: 0,
            tone_modify_decay: 0,
            tone_modify_release: 0,
        };
        self.tvp.trigger(
            trigger.key,
            sample.root_key,
            p.coarse_pitch as i32,
            p.fine_pitch as i32,
            p.pitch_key_follow as f32,
            p.rand_pitch as f32,
            sample.pitch as i32,
            sample_rate,
            &pitch_env,
            lut,
        );

        self.tvf = Tvf::new(
            sample_rate,
            FilterType::from_rom_flag(p.tvf_type),
            KeyFollowMode::from_rom_code(p.tvf_cf_key_flw_c),
        );
        let tvf_env = EnvelopeSpec {
            durations: [
                p.tvf_env_t1 & 0x7f,
                p.tvf_env_t2 & 0x7f,
                p.tvf_env_t3 & 0x7f,
                p.tvf_env_t4 & 0x7f,
                p.tvf_env_t5 & 0x7f,
            ],
            levels: [
                p.tvf_env_l1 as f32 / 127.0,
                p.tvf_env_l2 as f32 / 127.0,
                p.tvf_env_l3 as f32 / 127.0,
                p.tvf_env_l4 as f32 / 127.0,
                p.tvf_env_l5 as f32 / 127.0,
            ],
            // TVF's envelope is always linear; it carries no shape bit.
            shapes: [false; 5],
            time_key_follow: 256.0,
            time_velocity_sensitivity: 256.0,
            tone_modify_attack: 0,
            tone_modify_decay: 0,
            tone_modify_release: 0,
        };
        self.tvf.trigger(&tvf_env, lut);
        self.tvf_base_cutoff_hz =
            lut.tvf_cutoff_freq.get(trigger.key as usize).copied().unwrap_or(1000) as f32;
        self.tvf_resonance_code = p.tvf_resonance;
        self.lfo1_tvf_depth_index = p.tvf_lfo1_depth;
        self.lfo2_tvf_depth_index = p.tvf_lfo2_depth;
        self.lfo1_pitch_depth_index = p.tvp_lfo1_depth;
        self.lfo2_pitch_depth_index = p.tvp_lfo2_depth;
        self.tremolo1_depth = p.tva_lfo1_depth as f32 / 127.0;
        self.tremolo2_depth = p.tva_lfo2_depth as f32 / 127.0;

        let tva_env = EnvelopeSpec {
            durations: [
                p.tva_env_t1 & 0x7f,
                p.tva_env_t2 & 0x7f,
                p.tva_env_t3 & 0x7f,
                p.tva_env_t4 & 0x7f,
                p.tva_env_t5 & 0x7f,
            ],
            levels: [
                p.tva_env_l1 as f32 / 127.0,
                p.tva_env_l2 as f32 / 127.0,
                p.tva_env_l3 as f32 / 127.0,
                p.tva_env_l4 as f32 / 127.0,
                0.0,
            ],
            // Top bit of each TVAEnvT* duration byte: clear means exponential,
            // set means linear.
            shapes: [
                p.tva_env_t1 & 0x80 == 0,
                p.tva_env_t2 & 0x80 == 0,
                p.tva_env_t3 & 0x80 == 0,
                p.tva_env_t4 & 0x80 == 0,
                p.tva_env_t5 & 0x80 == 0,
            ],
            time_key_follow: 256.0,
            time_velocity_sensitivity: 256.0,
            tone_modify_attack: 0,
            tone_modify_decay: 0,
            tone_modify_release: 0,
        };
        let velocity_curved = lut
            .velocity_curves
            .get(trigger.velocity as usize)
            .copied()
            .unwrap_or(trigger.velocity as i32) as u8;
        self.tva.trigger(
            trigger.key,
            p.tva_bias_point,
            p.tva_bias_level as i8,
            p.volume,
            velocity_curved,
            sample.volume,
            p.tva_lvl_vel_curve,
            trigger.part_panpot,
            trigger.random_pan_lock,
            &tva_env,
            lut,
        );

        // LFO1 is shared across both partials of the instrument and driven
        // by the Instrument-level fields; LFO2 is per-partial.
        let lfo_delay_seconds = |code: u8| {
            lut.lfo_delay_time.get(code as usize).copied().unwrap_or(0) as f32 / 1000.0
        };
        self.lfo1.trigger(
            Waveform::from_rom_code(instrument.lfo1_waveform),
            instrument.lfo1_rate as f32 / 10.0,
            lfo_delay_seconds(instrument.lfo1_delay),
            instrument.lfo1_fade as f32 * 0.01,
        );
        self.lfo2.trigger(
            Waveform::from_rom_code(p.lfo2_waveform),
            p.lfo2_rate as f32 / 10.0,
            lfo_delay_seconds(p.lfo2_delay),
            p.lfo2_fade as f32 * 0.01,
        );
    }

    /// Key-off. Uninterruptible drum voices ignore this entirely; all
    /// others enter Release immediately unless Hold1 is currently engaged,
    /// in which case release is deferred until `hold_released`.
    pub fn note_off(&mut self, hold1_engaged: bool) {
        if self.uninterruptible {
            return;
        }
        if hold1_engaged {
            self.held = true;
        } else {
            self.release();
        }
    }

    pub fn hold_released(&mut self) {
        if self.held {
            self.held = false;
            self.release();
        }
    }

    pub fn sostenuto_capture(&mut self) {
        self.sustained = true;
    }

    pub fn sostenuto_release(&mut self) {
        if self.sustained {
            self.sustained = false;
            if !self.held {
                self.release();
            }
        }
    }

    fn release(&mut self) {
        self.tvp.release();
        self.tvf.release();
        self.tva.release();
    }

    /// Immediately silences the voice without a release tail, for All
    /// Sounds Off / panic and voice stealing.
    pub fn kill(&mut self) {
        self.active = false;
    }

    /// Advances one sample, returning stereo output already scaled by the
    /// TVA envelope, pan, and part level. `pitch_bend_cents` is the part's
    /// current pitch-bend-wheel contribution, recomputed by the `Part` each
    /// time a pitch-bend message or RPN (0,0) bend range changes.
    pub fn tick(&mut self, pcm: &PcmRom, lut: &LookupTables, pitch_bend_cents: f32) -> (f32, f32) {
        if !self.active {
            return (0.0, 0.0);
        }

        let lfo1_value = self.lfo1.tick();
        let lfo2_value = self.lfo2.tick();

        let pitch_ratio = self.tvp.tick(
            lfo1_value,
            lfo2_value,
            self.lfo1_pitch_depth_index,
            self.lfo2_pitch_depth_index,
            1.0,
            pitch_bend_cents,
            lut,
        );

        let index = self.position as u32;
        let frac = (self.position - index as f64) as f32;
        let s0 = self.read_sample(pcm, index);
        let s1 = self.read_sample(pcm, index + 1);
        let raw = s0 as f32 * (1.0 - frac) + s1 as f32 * frac;
        let normalized = raw / 32768.0;

        let filtered = self.tvf.process(
            normalized,
            self.key,
            1.0,
            lfo1_value,
            lfo2_value,
            self.lfo1_tvf_depth_index,
            self.lfo2_tvf_depth_index,
            self.tvf_base_cutoff_hz,
            self.tvf_resonance_code,
            lut,
        );

        let (gain_l, gain_r) = self.tva.tick(lfo1_value, lfo2_value, self.tremolo1_depth, self.tremolo2_depth, lut);

        self.advance_position(pitch_ratio as f64 * self.rate_ratio);

        if self.tva.is_finished() {
            self.active = false;
        }

        (filtered * gain_l * self.part_level, filtered * gain_r * self.part_level)
    }

    fn read_sample(&self, pcm: &PcmRom, offset: u32) -> i16 {
        pcm.sample_at(self.sample_address, offset).unwrap_or(0)
    }

    fn advance_position(&mut self, step: f64) {
        if self.forward {
            self.position += step;
        } else {
            self.position -= step;
        }

        let loop_start = (self.sample_len as f64 - self.loop_len as f64).max(0.0);

        match self.loop_mode {
            LoopMode::Forward => {
                if self.position >= self.sample_len as f64 {
                    if self.loop_len > 0 {
                        self.position = loop_start - 1.0 + (self.position - self.sample_len as f64);
                    } else {
                        self.active = false;
                    }
                }
            }
            LoopMode::OneShot => {
                if self.position >= self.sample_len as f64 {
                    self.active = false;
                }
            }
            LoopMode::PingPong => {
                if self.position >= self.sample_len as f64 {
                    self.position = self.sample_len as f64 - (self.position - self.sample_len as f64);
                    self.forward = false;
                } else if !self.forward && self.position <= loop_start {
                    self.position = loop_start + (loop_start - self.position);
                    self.forward = true;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_voice_is_inactive() {
        let voice = Voice::new(32000.0);
        assert!(!voice.is_active());
    }

    #[test]
    fn silent_tick_on_inactive_voice_returns_zero() {
        let mut voice = Voice::new(32000.0);
        let pcm = PcmRom::load(&[vec![0u8; 1024 * 1024]]).unwrap();
        let lut = LookupTables::default();
        assert_eq!(voice.tick(&pcm, &lut, 0.0), (0.0, 0.0));
    }
}
