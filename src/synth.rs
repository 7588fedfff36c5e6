//! Top-level synthesizer: owns the 16 [`Part`]s and the shared
//! [`SettingsStore`], routes MIDI short messages and SysEx to them, and mixes
//! their output down to an interleaved 16-bit frame. Grounded in
//! `original_source/libemusc/src/synth.cc`'s `Synth` class, generalized from
//! its `std::mutex`-guarded `_parts` vector to the same shape behind a single
//! `Mutex<SynthState>` so the MIDI actor and the audio actor can never
//! observe a torn Part list.

use std::sync::{Arc, Mutex};

use crate::error::{Sc55Error, Sc55Result};
use crate::part::Part;
use crate::rom::RomSet;
use crate::settings::{PatchParam, ResetMode, SettingsStore, SystemParam};
use crate::sysex::{self, DecodedAddress};

const MIDI_NOTE_OFF: u8 = 0x80;
const MIDI_NOTE_ON: u8 = 0x90;
const MIDI_POLY_PRESSURE: u8 = 0xa0;
const MIDI_CTRL_CHANGE: u8 = 0xb0;
const MIDI_PRG_CHANGE: u8 = 0xc0;
const MIDI_CH_PRESSURE: u8 = 0xd0;
const MIDI_PITCH_BEND: u8 = 0xe0;

/// Observer callback invoked from the audio actor every `OBSERVER_PERIOD`
/// frames, the "optional sub-sampled observer" hook for hosts that want a
/// cheap VU-meter/activity feed without locking per sample.
pub type FrameObserver = Box<dyn FnMut(&[f32]) + Send>;

const OBSERVER_PERIOD: u32 = 100;

struct SynthState {
    settings: SettingsStore,
    parts: Vec<Part>,
    sample_rate: f32,
    observer_countdown: u32,
}

impl SynthState {
    fn rebuild_parts(&mut self) {
        self.parts = (0..16).map(|id| Part::new(id, self.sample_rate)).collect();
    }

    fn channels_for(&self, midi_channel: u8) -> Vec<usize> {
        (0..self.parts.len())
            .filter(|&i| self.parts[i].midi_channel(&self.settings) == midi_channel)
            .collect()
    }
}

/// Owns everything the core needs to turn MIDI into audio: ROM tables
/// (immutable, shared by reference) and the mutex-guarded settings/part
/// state. `rom` is wrapped in an `Arc` so host adapters can clone a cheap
/// handle across threads without duplicating the PCM data.
pub struct Synth {
    rom: Arc<RomSet>,
    state: Mutex<SynthState>,
    observers: Mutex<Vec<FrameObserver>>,
}

impl Synth {
    /// `rom` must already be validated (see [`RomSet::load_from_files`]);
    /// there is no other way this constructor can fail, matching the rule
    /// that only ROM loading can produce a startup error.
    pub fn new(rom: RomSet, mode: ResetMode) -> Self {
        let mut settings = SettingsStore::new();
        settings.reset(mode);
        let mut state = SynthState {
            settings,
            parts: Vec::new(),
            sample_rate: 44_100.0,
            observer_countdown: OBSERVER_PERIOD,
        };
        state.rebuild_parts();

        Synth {
            rom: Arc::new(rom),
            state: Mutex::new(state),
            observers: Mutex::new(Vec::new()),
        }
    }

    pub fn rom(&self) -> &RomSet {
        &self.rom
    }

    /// Reconfigures the output format. Valid channel counts are 1 (mono) or
    /// 2 (stereo); anything else is rejected. Rebuilds all parts (and thus
    /// drops any sounding notes), matching `set_audio_format`'s unconditional
    /// `_init_parts()` call upstream.
    pub fn set_audio_format(&self, sample_rate_hz: u32, channels: u8) -> Sc55Result<()> {
        if channels != 1 && channels != 2 {
            return Err(Sc55Error::InvalidChannels { channels: channels as u16 });
        }
        let mut state = self.state.lock().unwrap();
        state.sample_rate = sample_rate_hz as f32;
        state.settings.set_system(SystemParam::Channels, channels);
        state.rebuild_parts();
        Ok(())
    }

    pub fn add_observer(&self, observer: FrameObserver) {
        self.observers.lock().unwrap().push(observer);
    }

    /// Drops every active voice without running Release. Holds the same
    /// mutex as `next_frame`/`midi_input` for the duration of the clear, so
    /// it is atomic with respect to both.
    pub fn panic(&self) {
        let mut state = self.state.lock().unwrap();
        for part in state.parts.iter_mut() {
            part.delete_all_notes();
        }
    }

    /// Releases (not kills) every active voice across every part.
    pub fn stop_all_notes(&self) {
        let mut state = self.state.lock().unwrap();
        for part in state.parts.iter_mut() {
            part.stop_all_notes(&state.settings);
        }
    }

    /// Rebuilds Settings to the chosen map's factory defaults. `reset_parts`
    /// additionally clears every part's active voices and controller state.
    pub fn reset(&self, mode: ResetMode, reset_parts: bool) {
        let mut state = self.state.lock().unwrap();
        if reset_parts {
            for part in state.parts.iter_mut() {
                part.reset();
            }
        }
        state.settings.reset(mode);
    }

    pub fn mute(&self) {
        let mut state = self.state.lock().unwrap();
        for part in state.parts.iter_mut() {
            part.set_mute(true);
        }
    }

    pub fn unmute(&self) {
        let mut state = self.state.lock().unwrap();
        for part in state.parts.iter_mut() {
            part.set_mute(false);
        }
    }

    pub fn mute_parts(&self, part_ids: &[u8]) {
        let mut state = self.state.lock().unwrap();
        for &id in part_ids {
            if let Some(part) = state.parts.get_mut(id as usize) {
                part.set_mute(true);
            }
        }
    }

    pub fn unmute_parts(&self, part_ids: &[u8]) {
        let mut state = self.state.lock().unwrap();
        for &id in part_ids {
            if let Some(part) = state.parts.get_mut(id as usize) {
                part.set_mute(false);
            }
        }
    }

    pub fn get_system_param(&self, param: SystemParam) -> u8 {
        self.state.lock().unwrap().settings.get_system(param)
    }

    pub fn set_system_param(&self, param: SystemParam, value: u8) {
        self.state.lock().unwrap().settings.set_system(param, value);
    }

    pub fn get_patch_param(&self, part: u8, param: PatchParam) -> u8 {
        self.state.lock().unwrap().settings.get_patch(part, param)
    }

    pub fn set_patch_param(&self, part: u8, param: PatchParam, value: u8) {
        self.state.lock().unwrap().settings.set_patch(part, param, value);
    }

    /// Dispatches one MIDI short message by status nibble. Holds the
    /// Part/Settings mutex for the duration of the message's effect, never
    /// across a call into `next_frame`.
    pub fn midi_input(&self, status: u8, data1: u8, data2: u8) {
        let channel = status & 0x0f;
        let mut state = self.state.lock().unwrap();

        match status & 0xf0 {
            MIDI_NOTE_OFF => {
                for i in state.channels_for(channel) {
                    state.parts[i].stop_note(&state.settings, data1);
                }
            }
            MIDI_NOTE_ON => {
                if data2 == 0 {
                    for i in state.channels_for(channel) {
                        state.parts[i].stop_note(&state.settings, data1);
                    }
                } else {
                    self.add_note(&mut state, channel, data1, data2);
                }
            }
            MIDI_POLY_PRESSURE => {
                for i in state.channels_for(channel) {
                    state.parts[i].poly_key_pressure(&mut state.settings, data1, data2);
                }
            }
            MIDI_CTRL_CHANGE => {
                for i in state.channels_for(channel) {
                    state.parts[i].control_change(&mut state.settings, data1, data2);
                }
            }
            MIDI_PRG_CHANGE => {
                for i in state.channels_for(channel) {
                    state.parts[i].set_program(&mut state.settings, &self.rom.control, data1, None, false);
                }
            }
            MIDI_CH_PRESSURE => {
                for i in state.channels_for(channel) {
                    state.parts[i].channel_pressure(&mut state.settings, data1);
                }
            }
            MIDI_PITCH_BEND => {
                for i in state.channels_for(channel) {
                    state.parts[i].pitch_bend_change(&state.settings, data1, data2, false);
                }
            }
            _ => log::trace!("midi: unrecognized status byte {status:#x}"),
        }
    }

    /// Admits a NoteOn, first checking the engine-wide partial budget (two
    /// partials per voice, `max_polyphony` voices per the ROM's model) the
    /// way the original caps total active partials before ever reaching a
    /// part's own admission logic.
    fn add_note(&self, state: &mut SynthState, channel: u8, key: u8, velocity: u8) {
        let active_partials: usize = state.parts.iter().map(Part::num_active_voices).sum();
        let budget = self.rom.control.max_polyphony() * 2;
        if active_partials >= budget {
            log::trace!("synth: note dropped, partial budget ({budget}) exhausted");
            return;
        }

        let sample_rate = state.sample_rate;
        for i in state.channels_for(channel) {
            state.parts[i].add_note(&mut state.settings, &self.rom.control, key, velocity, sample_rate);
        }
    }

    /// Parses and applies one SysEx buffer (`0xF0`...`0xF7`), discarding it
    /// silently with a log line on any validation failure.
    pub fn midi_input_sysex(&self, data: &[u8]) {
        let mut state = self.state.lock().unwrap();
        if state.settings.get_system(SystemParam::RxSysEx) == 0 {
            return;
        }
        let device_id = state.settings.get_system(SystemParam::DeviceId).wrapping_sub(1);
        let msg = match sysex::parse(data, device_id) {
            Some(m) => m,
            None => return,
        };

        if msg.command == sysex::CMD_RQ1 {
            log::trace!("sysex: RQ1 (request) is not implemented, ignoring");
            return;
        }
        if msg.command != sysex::CMD_DT1 {
            return;
        }

        let decoded = match sysex::decode_address(msg.addr_hi, msg.addr_mid, msg.addr_lo) {
            Some(d) => d,
            None => {
                log::warn!("sysex: unrecognized DT1 address {:02x} {:02x} {:02x}", msg.addr_hi, msg.addr_mid, msg.addr_lo);
                return;
            }
        };

        match decoded {
            DecodedAddress::GsReset => {
                drop(state);
                self.reset(ResetMode::Gs, true);
            }
            DecodedAddress::System(addr, len) | DecodedAddress::Patch(addr, len) | DecodedAddress::Drum(addr, len) => {
                if msg.payload.len() != len {
                    log::warn!("sysex: DT1 message has invalid data length ({} != {len})", msg.payload.len());
                    return;
                }
                if len == 1 {
                    state.settings.set_raw(addr, msg.payload[0]);
                } else {
                    state.settings.set_raw_slice(addr, msg.payload);
                }
            }
        }
    }

    /// Produces one frame of `out.len()` signed-16-bit samples (1 for mono,
    /// 2 for stereo). Sums every part's output (each already including that
    /// part's own chorus/reverb send), applies master pan and volume, clips
    /// to `[-1, 1]` with a diagnostic log line on overrun, then converts to
    /// 16-bit.
    pub fn next_frame(&self, out: &mut [i16]) {
        let mut state = self.state.lock().unwrap();

        let mut left = 0.0f32;
        let mut right = 0.0f32;
        for part in state.parts.iter_mut() {
            let (pl, pr) = part.tick(&state.settings, &self.rom.control, &self.rom.pcm);
            left += pl;
            right += pr;
        }

        // CC10-style pan: 1 = hard left, 64 = center, 127 = hard right.
        let pan = state.settings.get_system(SystemParam::Pan) as i32;
        if pan > 64 {
            left *= 1.0 - (pan - 64) as f32 / 63.0;
        } else if pan < 64 {
            right *= (pan - 1).max(0) as f32 / 63.0;
        }

        let volume = state.settings.get_system(SystemParam::Volume) as f32 / 127.0;
        left *= volume;
        right *= volume;

        let clip = |s: f32| -> f32 {
            if !(-1.0..=1.0).contains(&s) {
                log::warn!("synth: audio clipped ({s})");
                s.clamp(-1.0, 1.0)
            } else {
                s
            }
        };
        left = clip(left);
        right = clip(right);

        if out.len() == 1 {
            out[0] = ((left + right) * 0.5 * i16::MAX as f32) as i16;
        } else {
            if let Some(s) = out.get_mut(0) {
                *s = (left * i16::MAX as f32) as i16;
            }
            if let Some(s) = out.get_mut(1) {
                *s = (right * i16::MAX as f32) as i16;
            }
        }

        state.observer_countdown = state.observer_countdown.saturating_sub(1);
        if state.observer_countdown == 0 {
            state.observer_countdown = OBSERVER_PERIOD;
            let frame = [left, right];
            drop(state);
            for observer in self.observers.lock().unwrap().iter_mut() {
                observer(&frame);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rom::RomSet;

    /// A control ROM carrying just enough of the version-string header to
    /// identify as an SC-55 and a zero-filled CPU ROM of the right size;
    /// every instrument/partial/sample table decodes to empty/zero entries,
    /// which is enough to exercise dispatch and mixing without asserting on
    /// actual instrument tone data.
    fn synthetic_rom() -> RomSet {
        let mut prog_rom = vec![0u8; 430_000];
        prog_rom[0xf380..0xf380 + 3].copy_from_slice(b"Ver");
        prog_rom[0xf380 + 3..0xf380 + 7].copy_from_slice(b"1.21");
        let cpu_rom = vec![0u8; 32_768];
        let pcm_rom = vec![0u8; 1024 * 1024];
        RomSet::load_from_memory(&prog_rom, &cpu_rom, &[pcm_rom]).expect("synthetic rom should load")
    }

    fn synth() -> Synth {
        let synth = Synth::new(synthetic_rom(), ResetMode::Gs);
        synth.set_audio_format(44_100, 2).unwrap();
        synth
    }

    #[test]
    fn silence_with_no_notes_playing() {
        let synth = synth();
        let mut out = [0i16; 2];
        for _ in 0..4410 {
            synth.next_frame(&mut out);
            assert_eq!(out, [0, 0]);
        }
    }

    #[test]
    fn invalid_channel_count_is_rejected() {
        let synth = synth();
        assert!(synth.set_audio_format(44_100, 3).is_err());
        assert!(synth.set_audio_format(44_100, 0).is_err());
    }

    #[test]
    fn mono_format_produces_one_sample_per_frame() {
        let synth = synth();
        synth.set_audio_format(44_100, 1).unwrap();
        let mut out = [0i16; 1];
        synth.next_frame(&mut out);
        assert_eq!(out, [0]);
    }

    #[test]
    fn tampered_sysex_checksum_does_not_change_settings() {
        let synth = synth();
        let before = synth.get_system_param(SystemParam::Volume);
        let mut msg = vec![0xf0, 0x41, 0x10, 0x42, 0x12, 0x40, 0x00, 0x04, 0x20, 0x1c, 0xf7];
        msg[9] ^= 0x01; // corrupt checksum byte
        synth.midi_input_sysex(&msg);
        assert_eq!(synth.get_system_param(SystemParam::Volume), before);
    }

    #[test]
    fn sysex_master_volume_write_round_trips() {
        let synth = synth();
        let msg = [0xf0u8, 0x41, 0x10, 0x42, 0x12, 0x40, 0x00, 0x04, 0x20, 0x1c, 0xf7];
        synth.midi_input_sysex(&msg);
        assert_eq!(synth.get_system_param(SystemParam::Volume), 0x20);
    }

    #[test]
    fn gs_reset_sysex_restores_factory_settings() {
        let synth = synth();
        synth.set_system_param(SystemParam::Volume, 0x01);
        let msg = [0xf0u8, 0x41, 0x10, 0x42, 0x12, 0x40, 0x00, 0x7f, 0x41, 0xf7];
        synth.midi_input_sysex(&msg);
        assert_eq!(synth.get_system_param(SystemParam::Volume), 0x7f);
    }

    #[test]
    fn note_on_off_and_panic_never_panic_the_engine() {
        let synth = synth();
        synth.midi_input(0x90, 60, 100);
        synth.midi_input(0x80, 60, 0);
        synth.panic();
        let mut out = [0i16; 2];
        for _ in 0..1000 {
            synth.next_frame(&mut out);
        }
        let state = synth.state.lock().unwrap();
        let active: usize = state.parts.iter().map(Part::num_active_voices).sum();
        assert_eq!(active, 0);
    }

    #[test]
    fn muted_part_stays_silent_through_note_on() {
        let synth = synth();
        synth.mute_parts(&[0]);
        synth.midi_input(0x90, 60, 100);
        let mut out = [1i16, 1i16];
        synth.next_frame(&mut out);
        assert_eq!(out, [0, 0]);
    }

    #[test]
    fn program_change_reuses_existing_bank_when_no_cc0_sent() {
        let synth = synth();
        synth.midi_input(0xc0, 5, 0);
        assert_eq!(synth.get_patch_param(0, PatchParam::ToneNumber2), 5);
    }
}
