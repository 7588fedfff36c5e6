//! Roland SysEx parsing: header/checksum validation and DT1 (Data Set 1)
//! address decoding, split out of [`crate::Synth`] because the address
//! translation table is a chunk of decode logic in its own right, matching
//! how `original_source/libemusc/src/synth.cc` keeps its own equivalent
//! (`_midi_input_sysex_DT1`) as one big dispatch separate from MIDI and
//! frame production.

use crate::settings::{DrumParam, PatchParam, SystemParam};

pub const ROLAND_ID: u8 = 0x41;
pub const MODEL_ID_GS: u8 = 0x42;
pub const MODEL_ID_SC: u8 = 0x45;
pub const CMD_RQ1: u8 = 0x11;
pub const CMD_DT1: u8 = 0x12;

/// One parsed, checksum-verified SysEx message, still holding a reference
/// into the caller's buffer.
pub struct RolandSysex<'a> {
    pub model_id: u8,
    pub command: u8,
    pub addr_hi: u8,
    pub addr_mid: u8,
    pub addr_lo: u8,
    pub payload: &'a [u8],
}

/// Validates framing, manufacturer, device ID, model ID and checksum.
/// Returns `None` (and logs at `warn!`) for anything that fails — per the
/// spec, malformed SysEx is discarded silently from the caller's point of
/// view, never surfaced as an error.
pub fn parse<'a>(data: &'a [u8], device_id: u8) -> Option<RolandSysex<'a>> {
    if data.len() < 8 || data[0] != 0xf0 || data[data.len() - 1] != 0xf7 {
        return None;
    }
    if data[1] != ROLAND_ID {
        return None;
    }
    if data[2] != device_id {
        log::trace!("sysex: device id {:#x} does not match ours ({:#x})", data[2], device_id);
        return None;
    }
    let model_id = data[3];
    if model_id != MODEL_ID_GS && model_id != MODEL_ID_SC {
        return None;
    }
    let command = data[4];

    // addr(3) + checksum(1) + F7(1) must remain after the 5-byte header.
    if data.len() < 5 + 3 + 2 {
        return None;
    }
    let body_end = data.len() - 2; // index of the checksum byte
    let checksum_region = &data[5..body_end];
    let sum: u32 = checksum_region.iter().map(|&b| b as u32).sum();
    let expected = (128 - (sum % 128)) % 128;
    if data[body_end] as u32 != expected {
        log::warn!("sysex: checksum mismatch, message discarded");
        return None;
    }

    Some(RolandSysex {
        model_id,
        command,
        addr_hi: data[5],
        addr_mid: data[6],
        addr_lo: data[7],
        payload: &data[8..body_end],
    })
}

/// One decoded DT1 write target within the engine's internal flat address
/// space (see `settings::params`), plus the number of payload bytes it
/// expects (per the SysEx chart in the owner's manual, lengths are 1, 2, 4,
/// 12 or 16 bytes depending on which leaf address is addressed).
pub enum DecodedAddress {
    /// `0x40 00 7F`: reset to GS standard mode, parts included.
    GsReset,
    System(u32, usize),
    Patch(u32, usize),
    Drum(u32, usize),
}

/// Translates a Roland `addr-hi addr-mid addr-lo` triple into a flat address
/// this crate's [`crate::settings::SettingsStore`] understands, grounded in
/// `original_source/libemusc/src/synth.cc`'s `_midi_input_sysex_DT1` address
/// dispatch. Returns `None` for an address this engine does not recognize.
pub fn decode_address(addr_hi: u8, addr_mid: u8, addr_lo: u8) -> Option<DecodedAddress> {
    if addr_hi == 0x40 {
        if addr_mid == 0x00 {
            if addr_lo == 0x7f {
                return Some(DecodedAddress::GsReset);
            }
            let len = if addr_lo == SystemParam::Tune as u8 { 4 } else { 1 };
            return Some(DecodedAddress::System(
                crate::settings::params::SYSTEM_REGION | addr_lo as u32,
                len,
            ));
        }
        if addr_mid == 0x01 {
            let len = if addr_lo == 0x00 || addr_lo == 0x10 { 16 } else { 1 };
            return Some(DecodedAddress::Patch(
                crate::settings::params::PATCH_REGION | (0x0100 | addr_lo as u32),
                len,
            ));
        }
        if addr_mid & 0x10 != 0 {
            let part = (addr_mid & 0x0f) as u32;
            let len = match addr_lo {
                0x00 | 0x17 => 2,
                0x40 => 12,
                _ => 1,
            };
            return Some(DecodedAddress::Patch(
                crate::settings::params::PATCH_REGION | (part << 16) | (0x1000 | addr_lo as u32),
                len,
            ));
        }
        if addr_mid & 0x20 != 0 {
            if addr_lo > 0x5a {
                return None;
            }
            let part = (addr_mid & 0x0f) as u32;
            return Some(DecodedAddress::Patch(
                crate::settings::params::PATCH_REGION | (part << 16) | (0x2000 | addr_lo as u32),
                1,
            ));
        }
        return None;
    }

    if addr_hi == 0x41 {
        let map = ((addr_mid >> 4) & 0x0f) as u32;
        let param_hi = (addr_mid & 0x0f) as u32;
        let len = if param_hi == 0 { 12 } else { 1 };
        return Some(DecodedAddress::Drum(
            crate::settings::params::DRUM_REGION | (map << 16) | (param_hi << 8) | addr_lo as u32,
            len,
        ));
    }

    None
}

/// Symbolic parameters the DT1 decoder can resolve to, exposed so the
/// `Synth`'s "notify on address write" hook and tests can name a parameter
/// instead of a raw address. Not every address in the map has a named
/// variant here; unknown-but-valid addresses still write through via the
/// raw `set_raw`/`set_raw_slice` path.
pub fn system_param_from_addr_lo(addr_lo: u8) -> Option<SystemParam> {
    use SystemParam::*;
    Some(match addr_lo {
        0x00 => Tune,
        0x04 => Volume,
        0x05 => KeyShift,
        0x06 => Pan,
        0x80 => SampleRate,
        0x84 => Channels,
        0x90 => RxSysEx,
        0x91 => RxGmOn,
        0x92 => RxGsReset,
        0x93 => RxInstrumentChange,
        0x94 => RxFunctionControl,
        0x95 => DeviceId,
        _ => return None,
    })
}

#[allow(dead_code)]
pub fn patch_param_from_addr_lo(addr_lo: u8, per_part: bool) -> Option<PatchParam> {
    use PatchParam::*;
    if !per_part {
        return Some(match addr_lo {
            0x30 => ReverbMacro,
            0x31 => ReverbCharacter,
            0x32 => ReverbPreLpf,
            0x33 => ReverbLevel,
            0x34 => ReverbTime,
            0x35 => ReverbDelayFeedback,
            0x36 => ReverbSendToChorus,
            0x37 => ReverbPreDelayTime,
            0x38 => ChorusMacro,
            0x39 => ChorusPreLpf,
            0x3a => ChorusLevel,
            0x3b => ChorusFeedback,
            0x3c => ChorusDelay,
            0x3d => ChorusRate,
            0x3e => ChorusDepth,
            0x3f => ChorusSendToReverb,
            _ => return None,
        });
    }
    Some(match addr_lo {
        0x00 => ToneNumber,
        0x01 => ToneNumber2,
        0x02 => RxChannel,
        0x15 => UseForRhythm,
        0x19 => PartLevel,
        0x1c => PartPanpot,
        0x21 => ChorusSendLevel,
        0x22 => ReverbSendLevel,
        _ => return None,
    })
}

#[allow(dead_code)]
pub fn drum_param_from_high_byte(high_byte: u32) -> Option<DrumParam> {
    use DrumParam::*;
    Some(match high_byte {
        0x00 => DrumsMapName,
        0x01 => PlayKeyNumber,
        0x02 => Level,
        0x03 => AssignGroupNumber,
        0x04 => Panpot,
        0x05 => ReverbDepth,
        0x06 => ChorusDepth,
        0x07 => RxNoteOff,
        0x08 => RxNoteOn,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roland_message(addr: [u8; 3], payload: &[u8], device_id: u8) -> Vec<u8> {
        let mut msg = vec![0xf0, ROLAND_ID, device_id, MODEL_ID_GS, CMD_DT1];
        msg.extend_from_slice(&addr);
        msg.extend_from_slice(payload);
        let sum: u32 = msg[5..].iter().map(|&b| b as u32).sum();
        let checksum = ((128 - (sum % 128)) % 128) as u8;
        msg.push(checksum);
        msg.push(0xf7);
        msg
    }

    #[test]
    fn valid_message_round_trips_through_parse() {
        let msg = roland_message([0x40, 0x00, 0x04], &[0x20], 0x10);
        let parsed = parse(&msg, 0x10).expect("should parse");
        assert_eq!(parsed.command, CMD_DT1);
        assert_eq!(parsed.payload, &[0x20]);
    }

    #[test]
    fn tampered_checksum_is_rejected() {
        let mut msg = roland_message([0x40, 0x00, 0x04], &[0x20], 0x10);
        let last_data_idx = msg.len() - 2;
        msg[last_data_idx] ^= 0x01;
        assert!(parse(&msg, 0x10).is_none());
    }

    #[test]
    fn wrong_device_id_is_rejected() {
        let msg = roland_message([0x40, 0x00, 0x04], &[0x20], 0x10);
        assert!(parse(&msg, 0x11).is_none());
    }

    #[test]
    fn system_volume_address_decodes_to_one_byte_write() {
        match decode_address(0x40, 0x00, 0x04) {
            Some(DecodedAddress::System(addr, len)) => {
                assert_eq!(len, 1);
                assert_eq!(addr, crate::settings::params::SYSTEM_REGION | 0x04);
            }
            _ => panic!("expected System address"),
        }
    }

    #[test]
    fn system_tune_address_expects_four_bytes() {
        match decode_address(0x40, 0x00, 0x00) {
            Some(DecodedAddress::System(_, len)) => assert_eq!(len, 4),
            _ => panic!("expected System address"),
        }
    }

    #[test]
    fn gs_reset_sentinel_is_recognized() {
        assert!(matches!(decode_address(0x40, 0x00, 0x7f), Some(DecodedAddress::GsReset)));
    }

    #[test]
    fn per_part_address_folds_part_number_from_addr_mid() {
        match decode_address(0x40, 0x12, 0x19) {
            Some(DecodedAddress::Patch(addr, len)) => {
                assert_eq!(len, 1);
                assert_eq!(addr, crate::settings::params::patch_address(2, PatchParam::PartLevel));
            }
            _ => panic!("expected Patch address"),
        }
    }

    #[test]
    fn drum_map_name_address_expects_twelve_bytes() {
        match decode_address(0x41, 0x00, 0x00) {
            Some(DecodedAddress::Drum(addr, len)) => {
                assert_eq!(len, 12);
                assert_eq!(addr, crate::settings::params::drum_address(0, DrumParam::DrumsMapName, 0));
            }
            _ => panic!("expected Drum address"),
        }
    }

    #[test]
    fn drum_level_address_for_map_two_resolves_correctly() {
        match decode_address(0x41, 0x12, 36) {
            Some(DecodedAddress::Drum(addr, len)) => {
                assert_eq!(len, 1);
                assert_eq!(addr, crate::settings::params::drum_address(1, DrumParam::Level, 36));
            }
            _ => panic!("expected Drum address"),
        }
    }
}
