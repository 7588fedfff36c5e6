//! A MIDI part (channel): the thing a NoteOn/CC/ProgramChange message
//! actually targets. Owns a pool of [`Voice`]s, the RPN/NRPN scratch state
//! needed to assemble a multi-CC parameter write, and one [`SystemEffects`]
//! instance so chorus/reverb sends stay independent per part, matching how
//! `original_source/libemusc/src/part.cc` structures a part.

use crate::effects::SystemEffects;
use crate::rom::{ControlRom, DrumSet, LookupTables, Partial};
use crate::settings::{ControllerDest, ControllerSource, DrumParam, PatchParam, SettingsStore, SystemParam};
use crate::voice::{Voice, VoiceTrigger};

/// Finds the first breakpoint at or above `key` and returns the sample it
/// points to, falling back to the last entry for keys above every break —
/// the hardware's way of mapping one instrument partial's 16 breakpoints
/// onto a full keyboard.
fn resolve_sample_index(partial: &Partial, key: u8) -> u16 {
    for i in 0..partial.breaks.len() {
        if key <= partial.breaks[i] {
            return partial.samples[i];
        }
    }
    partial.samples[partial.breaks.len() - 1]
}

/// A drum instrument's per-note overrides, resolved once at note-on instead
/// of threaded through every DSP call.
struct DrumNoteParams {
    panpot: u8,
    random_pan_lock: bool,
    uninterruptible: bool,
}

fn drum_note_params(drum_set: &DrumSet, key: u8) -> DrumNoteParams {
    let key = key as usize;
    DrumNoteParams {
        panpot: drum_set.panpot[key],
        // A panpot of exactly the ROM's "random" sentinel value means the
        // hardware rolls a fixed stereo position for this hit and keeps it
        // there for the life of the note instead of tracking the part pan.
        random_pan_lock: drum_set.panpot[key] == 0,
        uninterruptible: drum_set.flags[key] & 0x01 == 0,
    }
}

pub struct Part {
    id: u8,
    mute: bool,
    voices: Vec<Voice>,
    effects: SystemEffects,
    last_peak: f32,

    rpn_msb: Option<u8>,
    rpn_lsb: Option<u8>,
    nrpn_msb: Option<u8>,
    nrpn_lsb: Option<u8>,

    pitch_bend_raw14: u16,
    pitch_bend_cents: f32,
}

impl Part {
    pub fn new(id: u8, sample_rate: f32) -> Self {
        Part {
            id,
            mute: false,
            voices: Vec::new(),
            effects: SystemEffects::new(sample_rate),
            last_peak: 0.0,
            rpn_msb: None,
            rpn_lsb: None,
            nrpn_msb: None,
            nrpn_lsb: None,
            pitch_bend_raw14: 0x2000,
            pitch_bend_cents: 0.0,
        }
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    pub fn midi_channel(&self, settings: &SettingsStore) -> u8 {
        settings.get_patch(self.id, PatchParam::RxChannel).saturating_sub(1)
    }

    pub fn mute(&self) -> bool {
        self.mute
    }

    pub fn set_mute(&mut self, mute: bool) {
        self.mute = mute;
    }

    pub fn num_active_voices(&self) -> usize {
        self.voices.iter().filter(|v| v.is_active()).count()
    }

    pub fn take_last_peak(&mut self) -> f32 {
        let peak = self.last_peak.abs();
        self.last_peak = 0.0;
        peak
    }

    fn allocate_voice(&mut self, sample_rate: f32) -> &mut Voice {
        if let Some(idx) = self.voices.iter().position(|v| !v.is_active()) {
            return &mut self.voices[idx];
        }
        self.voices.push(Voice::new(sample_rate));
        self.voices.last_mut().unwrap()
    }

    /// Sets a new program (instrument or, on a rhythm part, drum set),
    /// resolving the variation table's bank-fallback walk described on the
    /// SC-55 owner's manual's program change pages. `bank` is the CC0 bank
    /// select value when present, or `None` to reuse whatever bank is
    /// already set (a bare program-change message).
    pub fn set_program(
        &mut self,
        settings: &mut SettingsStore,
        rom: &ControlRom,
        index: u8,
        bank: Option<u8>,
        ignore_rx_flags: bool,
    ) {
        if !ignore_rx_flags
            && (settings.get_patch(self.id, PatchParam::RxProgramChange) == 0
                || settings.get_system(SystemParam::RxInstrumentChange) == 0)
        {
            return;
        }

        let bank = match bank {
            Some(b) => {
                settings.set_patch(self.id, PatchParam::ToneNumber, b);
                b
            }
            None => settings.get_patch(self.id, PatchParam::ToneNumber),
        };
        settings.set_patch(self.id, PatchParam::ToneNumber2, index);

        let rhythm = settings.get_patch(self.id, PatchParam::UseForRhythm);
        if rhythm == 0 {
            let mut bank = bank;
            let mut instrument = rom.variation(bank as usize).map(|v| v[index as usize]).unwrap_or(0xffff);
            if bank < 63 && index < 120 {
                while instrument == 0xffff && bank > 0 {
                    bank -= 1;
                    instrument = rom.variation(bank as usize).map(|v| v[index as usize]).unwrap_or(0xffff);
                }
            }
            if instrument == 0xffff {
                bank = 0;
            }
            settings.set_patch(self.id, PatchParam::ToneNumber, bank);
        } else {
            let drum_set_index = rom.drum_set_for_program(index);
            settings.set_patch(self.id, PatchParam::ToneNumber, drum_set_index as u8);
        }
    }

    /// Admits (or silently rejects) a NoteOn, resolves its instrument and
    /// one-or-two partials, and triggers a voice per partial used.
    pub fn add_note(&mut self, settings: &mut SettingsStore, rom: &ControlRom, key: u8, velocity: u8, sample_rate: f32) {
        if self.mute || settings.get_patch(self.id, PatchParam::RxNoteMessage) == 0 {
            return;
        }
        if key < settings.get_patch(self.id, PatchParam::KeyRangeLow)
            || key > settings.get_patch(self.id, PatchParam::KeyRangeHigh)
        {
            return;
        }

        let rhythm = settings.get_patch(self.id, PatchParam::UseForRhythm);
        let tone_bank = settings.get_patch(self.id, PatchParam::ToneNumber);
        let drum_set_index = if rhythm != 0 {
            if settings.get_drum(rhythm - 1, DrumParam::RxNoteOn, key) == 0 {
                return;
            }
            Some(tone_bank as usize)
        } else {
            None
        };

        // Velocity-sense depth/offset correction per the SC-55 owner's
        // manual's description of how CC-less velocity curves are derived.
        let depth = settings.get_patch(self.id, PatchParam::VelocitySenseDepth) as f32;
        let offset = settings.get_patch(self.id, PatchParam::VelocitySenseOffset) as f32;
        let mut v = velocity as f32 * (depth / 64.0);
        if offset >= 64.0 {
            v += offset - 64.0;
        } else {
            v *= (offset + 64.0) / 127.0;
        }
        let velocity = v.min(127.0).round() as u8;

        if settings.get_patch(self.id, PatchParam::PolyMode) == 0 && rhythm == 0 {
            self.kill_all_voices();
        }

        let instrument_index = if let Some(drum_idx) = drum_set_index {
            match rom.drum_set(drum_idx) {
                Some(drum_set) => drum_set.preset[key as usize],
                None => return,
            }
        } else {
            let tone_index = settings.get_patch(self.id, PatchParam::ToneNumber2);
            match rom.variation(tone_bank as usize) {
                Some(variation) => variation[tone_index as usize],
                None => return,
            }
        };
        if instrument_index == 0xffff {
            return;
        }

        let instrument = match rom.instrument(instrument_index as usize) {
            Some(i) => i,
            None => return,
        };
        let part_panpot = settings.get_patch(self.id, PatchParam::PartPanpot);
        let lut = rom.lookup_tables();

        for i in 0..instrument.partials.len() {
            if instrument.partials_used & (1 << i) == 0 {
                continue;
            }
            let inst_partial = &instrument.partials[i];
            let partial = match rom.partial(inst_partial.partial_index as usize) {
                Some(p) => p,
                None => continue,
            };
            let sample_index = resolve_sample_index(partial, key);
            let sample = match rom.sample(sample_index as usize) {
                Some(s) => s,
                None => continue,
            };

            let (panpot, random_pan_lock, uninterruptible) = match drum_set_index {
                Some(drum_idx) => {
                    let drum_set = rom.drum_set(drum_idx).expect("checked above");
                    let p = drum_note_params(drum_set, key);
                    (p.panpot, p.random_pan_lock, p.uninterruptible)
                }
                None => (part_panpot, false, false),
            };

            let trigger = VoiceTrigger {
                inst_partial,
                sample,
                key,
                velocity,
                part_panpot: panpot,
                random_pan_lock,
                // PartLevel/Expression are applied live in `tick`, not
                // captured once at trigger time, since they're continuously
                // adjustable controllers (CC7/CC11).
                part_level: 1.0,
                uninterruptible,
            };

            self.allocate_voice(sample_rate)
                .trigger(instrument, &trigger, sample_rate, lut);
        }
    }

    pub fn stop_note(&mut self, settings: &SettingsStore, key: u8) {
        let hold1 = settings.get_patch(self.id, PatchParam::Hold1) != 0;
        for voice in self.voices.iter_mut() {
            if voice.is_active() && voice.key == key {
                voice.note_off(hold1);
            }
        }
    }

    pub fn stop_all_notes(&mut self, settings: &SettingsStore) {
        let hold1 = settings.get_patch(self.id, PatchParam::Hold1) != 0;
        for voice in self.voices.iter_mut() {
            if voice.is_active() {
                voice.note_off(hold1);
            }
        }
    }

    fn kill_all_voices(&mut self) {
        for voice in self.voices.iter_mut() {
            voice.kill();
        }
    }

    pub fn delete_all_notes(&mut self) {
        self.kill_all_voices();
    }

    pub fn reset(&mut self) {
        self.kill_all_voices();
        self.mute = false;
        self.last_peak = 0.0;
        self.rpn_msb = None;
        self.rpn_lsb = None;
        self.nrpn_msb = None;
        self.nrpn_lsb = None;
        self.pitch_bend_raw14 = 0x2000;
        self.pitch_bend_cents = 0.0;
    }

    fn recompute_pitch_bend_cents(&mut self, settings: &SettingsStore) {
        let semitone_range = settings.get_patch(self.id, PatchParam::PitchBendRange) as i32 - 0x40;
        self.pitch_bend_cents = ((self.pitch_bend_raw14 as f32 - 8192.0) / 8192.0) * semitone_range as f32 * 100.0;
    }

    /// `force` bypasses `RxPitchBend`, used for CC121 (Reset All
    /// Controllers) which must re-center the wheel unconditionally.
    pub fn pitch_bend_change(&mut self, settings: &SettingsStore, lsb: u8, msb: u8, force: bool) {
        if !force && settings.get_patch(self.id, PatchParam::RxPitchBend) == 0 {
            return;
        }
        self.pitch_bend_raw14 = ((msb as u16 & 0x7f) << 7) | (lsb as u16 & 0x7f);
        self.recompute_pitch_bend_cents(settings);
    }

    pub fn channel_pressure(&mut self, settings: &mut SettingsStore, value: u8) {
        if settings.get_patch(self.id, PatchParam::RxChPressure) != 0 {
            settings.set_patch(self.id, PatchParam::ChannelPressure, value);
        }
    }

    pub fn poly_key_pressure(&mut self, settings: &mut SettingsStore, _key: u8, value: u8) {
        if settings.get_patch(self.id, PatchParam::RxPolyPressure) != 0 {
            settings.set_patch(self.id, PatchParam::PolyKeyPressure, value);
        }
    }

    /// Full Control Change routing table: plain CC assignments, the
    /// RPN/NRPN four-message scratch-register assembly, and the Channel
    /// Mode messages (120-127) which bypass `RxControlChange` entirely.
    /// Returns `true` when a change worth notifying a host UI about
    /// happened (volume/pan/send levels), mirroring the original's
    /// `updateGUI` return value.
    pub fn control_change(&mut self, settings: &mut SettingsStore, msg_id: u8, value: u8) -> bool {
        if settings.get_patch(self.id, PatchParam::RxControlChange) == 0 && msg_id < 120 {
            return false;
        }

        let mut update_gui = false;

        match msg_id {
            0 => {
                if settings.get_patch(self.id, PatchParam::RxBankSelect) != 0 {
                    settings.set_patch(self.id, PatchParam::ToneNumber, value);
                }
            }
            1 => {
                if settings.get_patch(self.id, PatchParam::RxModulation) != 0 {
                    settings.set_controller_dest(self.id, ControllerSource::Modulation, ControllerDest::Pitch, value);
                    settings.set_patch(self.id, PatchParam::Modulation, value);
                }
            }
            5 => settings.set_patch(self.id, PatchParam::PortamentoTime, value),
            6 => self.data_entry_msb(settings, value),
            7 => {
                if settings.get_patch(self.id, PatchParam::RxVolume) != 0 {
                    settings.set_patch(self.id, PatchParam::PartLevel, value);
                    update_gui = true;
                }
            }
            10 => {
                if settings.get_patch(self.id, PatchParam::RxPanpot) != 0 {
                    settings.set_patch(self.id, PatchParam::PartPanpot, value);
                    update_gui = true;
                }
            }
            11 => {
                if settings.get_patch(self.id, PatchParam::RxExpression) != 0 {
                    settings.set_patch(self.id, PatchParam::Expression, value);
                }
            }
            38 => {
                if self.rpn_msb == Some(0) && self.rpn_lsb == Some(1) {
                    settings.set_patch(self.id, PatchParam::PitchFineTune2, value);
                }
            }
            64 => {
                if settings.get_patch(self.id, PatchParam::RxHold1) != 0 {
                    let hold1 = value >= 64;
                    settings.set_patch(self.id, PatchParam::Hold1, hold1 as u8);
                    if !hold1 {
                        for voice in self.voices.iter_mut() {
                            voice.hold_released();
                        }
                    }
                }
            }
            65 => {
                if settings.get_patch(self.id, PatchParam::RxPortamento) != 0 {
                    settings.set_patch(self.id, PatchParam::Portamento, (value >= 64) as u8);
                }
            }
            66 => {
                if settings.get_patch(self.id, PatchParam::RxSostenuto) != 0 {
                    let sostenuto = value >= 64;
                    settings.set_patch(self.id, PatchParam::Sostenuto, sostenuto as u8);
                    for voice in self.voices.iter_mut() {
                        if sostenuto {
                            if voice.is_active() {
                                voice.sostenuto_capture();
                            }
                        } else {
                            voice.sostenuto_release();
                        }
                    }
                }
            }
            67 => {
                if settings.get_patch(self.id, PatchParam::RxSoft) != 0 {
                    settings.set_patch(self.id, PatchParam::Soft, (value >= 64) as u8);
                }
            }
            91 => {
                settings.set_patch(self.id, PatchParam::ReverbSendLevel, value);
                update_gui = true;
            }
            93 => {
                settings.set_patch(self.id, PatchParam::ChorusSendLevel, value);
                update_gui = true;
            }
            98 => {
                if settings.get_patch(self.id, PatchParam::RxNrpn) != 0 {
                    self.nrpn_lsb = Some(value);
                }
            }
            99 => {
                if settings.get_patch(self.id, PatchParam::RxNrpn) != 0 {
                    self.nrpn_msb = Some(value);
                }
            }
            100 => {
                if settings.get_patch(self.id, PatchParam::RxRpn) != 0 {
                    self.rpn_lsb = Some(value);
                }
            }
            101 => {
                if settings.get_patch(self.id, PatchParam::RxRpn) != 0 {
                    self.rpn_msb = Some(value);
                }
            }
            120 => self.delete_all_notes(),
            121 => {
                self.pitch_bend_change(settings, 0x00, 0x40, true);
                settings.set_patch(self.id, PatchParam::PolyKeyPressure, 0);
                settings.set_patch(self.id, PatchParam::ChannelPressure, 0);
                settings.set_patch(self.id, PatchParam::Modulation, 0);
                settings.set_patch(self.id, PatchParam::Expression, 127);
                settings.set_patch(self.id, PatchParam::Hold1, 0);
                settings.set_patch(self.id, PatchParam::Portamento, 0);
                settings.set_patch(self.id, PatchParam::Sostenuto, 0);
                settings.set_patch(self.id, PatchParam::Soft, 0);
            }
            123 | 124 | 125 => self.stop_all_notes(settings),
            126 => {
                self.stop_all_notes(settings);
                settings.set_patch(self.id, PatchParam::PolyMode, 0);
            }
            127 => {
                self.stop_all_notes(settings);
                settings.set_patch(self.id, PatchParam::PolyMode, 1);
            }
            _ => {}
        }

        if settings.get_patch(self.id, PatchParam::Cc1ControllerNumber) == msg_id {
            settings.set_patch(self.id, PatchParam::Cc1Controller, value);
        }
        if settings.get_patch(self.id, PatchParam::Cc2ControllerNumber) == msg_id {
            settings.set_patch(self.id, PatchParam::Cc2Controller, value);
        }

        update_gui
    }

    /// Commits a Data Entry MSB (CC6) against whichever RPN/NRPN is
    /// currently addressed. Only fires once both halves of the parameter
    /// number are known and neither is the RPN-null value `0x7F`.
    fn data_entry_msb(&mut self, settings: &mut SettingsStore, value: u8) {
        if let (Some(msb), Some(lsb)) = (self.rpn_msb, self.rpn_lsb) {
            if msb != 0x7f && lsb != 0x7f {
                if msb == 0 && lsb == 0 && value <= 24 {
                    settings.set_patch(self.id, PatchParam::PitchBendRange, value + 0x40);
                } else if msb == 0 && lsb == 1 {
                    settings.set_patch(self.id, PatchParam::PitchFineTune, value);
                } else if msb == 0 && lsb == 2 {
                    settings.set_patch(self.id, PatchParam::PitchCoarseTune, value);
                }
            }
        }

        if let (Some(msb), Some(lsb)) = (self.nrpn_msb, self.nrpn_lsb) {
            if msb == 0x7f || lsb == 0x7f {
                return;
            }
            if msb == 0x01 && !(0x0e..=0x72).contains(&value) {
                return;
            }
            match (msb, lsb) {
                (0x01, 0x08) => settings.set_patch(self.id, PatchParam::VibratoRate, value),
                (0x01, 0x09) => settings.set_patch(self.id, PatchParam::VibratoDepth, value),
                (0x01, 0x0a) => settings.set_patch(self.id, PatchParam::VibratoDelay, value),
                (0x01, 0x20) => settings.set_patch(self.id, PatchParam::TvfCutoffFreq, value),
                (0x01, 0x21) => settings.set_patch(self.id, PatchParam::TvfResonance, value),
                (0x01, 0x63) => settings.set_patch(self.id, PatchParam::TvfaEnvAttack, value),
                (0x01, 0x64) => settings.set_patch(self.id, PatchParam::TvfaEnvDecay, value),
                (0x01, 0x66) => settings.set_patch(self.id, PatchParam::TvfaEnvRelease, value),
                (0x18, lsb) => self.set_drum_param(settings, DrumParam::PlayKeyNumber, lsb, value),
                (0x1a, lsb) => self.set_drum_param(settings, DrumParam::Level, lsb, value),
                (0x1c, lsb) => self.set_drum_param(settings, DrumParam::Panpot, lsb, value),
                (0x1d, lsb) => self.set_drum_param(settings, DrumParam::ReverbDepth, lsb, value),
                _ => {}
            }
        }
    }

    fn set_drum_param(&self, settings: &mut SettingsStore, param: DrumParam, note: u8, value: u8) {
        let rhythm = settings.get_patch(self.id, PatchParam::UseForRhythm);
        if rhythm == 0 {
            return;
        }
        let map = rhythm - 1;
        if map == 0 || map == 1 {
            settings.set_drum(map, param, note, value);
        }
    }

    /// Advances every active voice one sample, mixes them down with the
    /// part's level/expression/pan, and runs the result through this
    /// part's chorus and reverb sends.
    pub fn tick(&mut self, settings: &SettingsStore, rom: &ControlRom, pcm: &crate::rom::PcmRom) -> (f32, f32) {
        if self.mute {
            return (0.0, 0.0);
        }

        let lut: &LookupTables = rom.lookup_tables();
        let mut left = 0.0f32;
        let mut right = 0.0f32;
        for voice in self.voices.iter_mut() {
            if voice.is_active() {
                let (vl, vr) = voice.tick(pcm, lut, self.pitch_bend_cents);
                left += vl;
                right += vr;
            }
        }
        let part_level = settings.get_patch(self.id, PatchParam::PartLevel) as f32 / 127.0;
        let expression = settings.get_patch(self.id, PatchParam::Expression) as f32 / 127.0;
        left *= part_level * expression;
        right *= part_level * expression;

        if left.abs() > self.last_peak {
            self.last_peak = left.abs();
        }

        self.effects.set_cross_sends(
            settings.get_patch_common(PatchParam::ChorusSendToReverb),
            settings.get_patch_common(PatchParam::ReverbSendToChorus),
        );

        let chorus_level = settings.get_patch_common(PatchParam::ChorusLevel) as f32 / 127.0;
        let chorus_send = settings.get_patch(self.id, PatchParam::ChorusSendLevel) as f32 / 127.0;
        let reverb_level = settings.get_patch_common(PatchParam::ReverbLevel) as f32 / 127.0;
        let reverb_send = settings.get_patch(self.id, PatchParam::ReverbSendLevel) as f32 / 127.0;

        let mono = (left + right) * 0.5;
        let (wet_l, wet_r) = self.effects.process(mono * chorus_level * chorus_send, mono * reverb_level * reverb_send);

        (left + wet_l, right + wet_r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rom::control::Partial as RomPartial;

    #[test]
    fn resolve_sample_index_picks_first_break_at_or_above_key() {
        let mut partial = RomPartial::default();
        partial.breaks = [59, 127, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];
        partial.samples = [10, 20, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];
        assert_eq!(resolve_sample_index(&partial, 40), 10);
        assert_eq!(resolve_sample_index(&partial, 60), 20);
    }

    #[test]
    fn stop_note_ignores_other_keys() {
        let mut part = Part::new(0, 32000.0);
        part.voices.push(Voice::new(32000.0));
        let settings = SettingsStore::new();
        part.stop_note(&settings, 64);
        assert_eq!(part.num_active_voices(), 0);
    }

    #[test]
    fn mute_silences_tick_output() {
        let mut part = Part::new(0, 32000.0);
        part.set_mute(true);
        assert!(part.mute());
    }
}
