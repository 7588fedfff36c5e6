//! Default value tables applied by [`super::SettingsStore::reset`].

use super::params::{patch_address, system_address, PatchParam, SystemParam};
use super::SettingsStore;

/// Which power-on/reset personality to install. GS is the native Sound
/// Canvas mode; GM and MT-32 narrow down the same parameter space to the
/// subset those standards expect, matching how a real unit's front-panel
/// reset behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetMode {
    Gs,
    Gm,
    Mt32,
}

pub(super) fn apply(store: &mut SettingsStore, mode: ResetMode) {
    store.set_raw(system_address(SystemParam::Volume), 0x7f);
    store.set_raw(system_address(SystemParam::KeyShift), 0x40);
    store.set_raw(system_address(SystemParam::Pan), 0x40);
    store.set_raw(system_address(SystemParam::RxSysEx), 1);
    store.set_raw(system_address(SystemParam::RxGmOn), 1);
    store.set_raw(system_address(SystemParam::RxGsReset), 1);
    store.set_raw(system_address(SystemParam::RxInstrumentChange), 1);
    store.set_raw(system_address(SystemParam::RxFunctionControl), 1);
    store.set_raw(system_address(SystemParam::DeviceId), 17);

    for part in 0..16u8 {
        store.set_raw(patch_address(part, PatchParam::RxChannel), part + 1);
        store.set_raw(patch_address(part, PatchParam::RxPitchBend), 1);
        store.set_raw(patch_address(part, PatchParam::RxChPressure), 1);
        store.set_raw(patch_address(part, PatchParam::RxProgramChange), 1);
        store.set_raw(patch_address(part, PatchParam::RxControlChange), 1);
        store.set_raw(patch_address(part, PatchParam::RxPolyPressure), 1);
        store.set_raw(patch_address(part, PatchParam::RxNoteMessage), 1);
        store.set_raw(patch_address(part, PatchParam::RxRpn), 1);
        // GM mode has no NRPN vocabulary, matching the note in params.h that
        // NRPN reception is forced off whenever GM mode is active.
        store.set_raw(
            patch_address(part, PatchParam::RxNrpn),
            if mode == ResetMode::Gm { 0 } else { 1 },
        );
        store.set_raw(patch_address(part, PatchParam::RxModulation), 1);
        store.set_raw(patch_address(part, PatchParam::RxVolume), 1);
        store.set_raw(patch_address(part, PatchParam::RxPanpot), 1);
        store.set_raw(patch_address(part, PatchParam::RxExpression), 1);
        store.set_raw(patch_address(part, PatchParam::RxHold1), 1);
        store.set_raw(patch_address(part, PatchParam::RxPortamento), 1);
        store.set_raw(patch_address(part, PatchParam::RxSostenuto), 1);
        store.set_raw(patch_address(part, PatchParam::RxSoft), 1);
        store.set_raw(patch_address(part, PatchParam::PolyMode), 1);
        store.set_raw(patch_address(part, PatchParam::AssignMode), 1);

        // Patch 10 (index 9) defaults to rhythm Map1 in GS/GM mode, matching
        // the hardware's factory-default channel-10-is-drums convention.
        let use_for_rhythm = if part == 9 && mode != ResetMode::Mt32 { 1 } else { 0 };
        store.set_raw(patch_address(part, PatchParam::UseForRhythm), use_for_rhythm);

        store.set_raw(patch_address(part, PatchParam::PitchKeyShift), 0x40);
        store.set_raw(patch_address(part, PatchParam::PartLevel), 0x64);
        store.set_raw(patch_address(part, PatchParam::VelocitySenseDepth), 0x40);
        store.set_raw(patch_address(part, PatchParam::VelocitySenseOffset), 0x40);
        store.set_raw(patch_address(part, PatchParam::PartPanpot), 0x40);
        store.set_raw(patch_address(part, PatchParam::KeyRangeLow), 0x00);
        store.set_raw(patch_address(part, PatchParam::KeyRangeHigh), 0x7f);
        store.set_raw(patch_address(part, PatchParam::Cc1ControllerNumber), 0x40);
        store.set_raw(patch_address(part, PatchParam::Cc2ControllerNumber), 0x40);
        store.set_raw(patch_address(part, PatchParam::ChorusSendLevel), 0x00);
        store.set_raw(patch_address(part, PatchParam::ReverbSendLevel), 0x28);
        store.set_raw(patch_address(part, PatchParam::RxBankSelect), 1);

        for tone_modify in [
            PatchParam::VibratoRate,
            PatchParam::VibratoDepth,
            PatchParam::TvfCutoffFreq,
            PatchParam::TvfResonance,
            PatchParam::TvfaEnvAttack,
            PatchParam::TvfaEnvDecay,
            PatchParam::TvfaEnvRelease,
            PatchParam::VibratoDelay,
        ] {
            store.set_raw(patch_address(part, tone_modify), 0x40);
        }

        for scale_tuning in [
            PatchParam::ScaleTuningC,
            PatchParam::ScaleTuningCSharp,
            PatchParam::ScaleTuningD,
            PatchParam::ScaleTuningDSharp,
            PatchParam::ScaleTuningE,
            PatchParam::ScaleTuningF,
            PatchParam::ScaleTuningFSharp,
            PatchParam::ScaleTuningG,
            PatchParam::ScaleTuningGSharp,
            PatchParam::ScaleTuningA,
            PatchParam::ScaleTuningASharp,
            PatchParam::ScaleTuningB,
        ] {
            store.set_raw(patch_address(part, scale_tuning), 0x40);
        }

        store.set_raw(patch_address(part, PatchParam::ModLfo1PitchDepth), 0x0a);

        store.set_raw(patch_address(part, PatchParam::Expression), 0x7f);
        store.set_raw(patch_address(part, PatchParam::Hold1), 0);
        store.set_raw(patch_address(part, PatchParam::Sostenuto), 0);
        store.set_raw(patch_address(part, PatchParam::Soft), 0);

        // RPN (0,0) bend range defaults to +/-2 semitones; fine tuning is
        // centered (no offset).
        store.set_raw(patch_address(part, PatchParam::PitchBendRange), 0x40 + 2);
        store.set_raw(patch_address(part, PatchParam::PitchFineTune), 0x40);
        store.set_raw(patch_address(part, PatchParam::PitchFineTune2), 0x00);
    }

    store.set_raw(patch_address(0, PatchParam::ReverbMacro), 0x04);
    store.set_raw(patch_address(0, PatchParam::ReverbCharacter), 0x04);
    store.set_raw(patch_address(0, PatchParam::ReverbLevel), 0x40);
    store.set_raw(patch_address(0, PatchParam::ReverbTime), 0x40);
    store.set_raw(patch_address(0, PatchParam::ChorusMacro), 0x02);
    store.set_raw(patch_address(0, PatchParam::ChorusLevel), 0x40);
    store.set_raw(patch_address(0, PatchParam::ChorusFeedback), 0x08);
    store.set_raw(patch_address(0, PatchParam::ChorusDelay), 0x50);
    store.set_raw(patch_address(0, PatchParam::ChorusRate), 0x03);
    store.set_raw(patch_address(0, PatchParam::ChorusDepth), 0x13);
}
