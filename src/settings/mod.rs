//! The flat settings address space: one byte store shared by System, Patch
//! (×16 parts) and Drum (×2 maps ×128 notes) parameters, addressed both by
//! symbolic id and by raw 24-bit address the way the hardware's SysEx
//! address chart does. A single no-argument callback fires on every write so
//! the audio thread can pick up parameter changes without locking per field.

pub mod params;
mod reset;

use params::{
    controller_dest_address, drum_address, patch_address, system_address, ControllerDest,
    ControllerSource, DrumParam, PatchParam, SystemParam,
};
pub use params::{ControllerDest, ControllerSource, DrumParam, PatchParam, SystemParam};
pub use reset::ResetMode;
use std::collections::BTreeMap;

/// Sparse backing store for the 24-bit settings address space.
///
/// Most addresses are never touched (the space is nominally 16M addresses
/// wide but only a few hundred are meaningful), so a `BTreeMap` keyed by
/// address is a closer fit than a dense byte array.
pub struct SettingsStore {
    bytes: BTreeMap<u32, u8>,
    on_change: Option<Box<dyn Fn() + Send + Sync>>,
}

impl SettingsStore {
    pub fn new() -> Self {
        let mut store = SettingsStore {
            bytes: BTreeMap::new(),
            on_change: None,
        };
        store.reset(ResetMode::Gs);
        store
    }

    /// Installs a callback invoked (with no arguments) after every write.
    /// Used by the audio thread to re-read a handful of cached parameters
    /// rather than taking a lock per sample.
    pub fn set_on_change<F: Fn() + Send + Sync + 'static>(&mut self, callback: F) {
        self.on_change = Some(Box::new(callback));
    }

    pub fn reset(&mut self, mode: ResetMode) {
        self.bytes.clear();
        reset::apply(self, mode);
        self.notify();
    }

    fn notify(&self) {
        if let Some(cb) = &self.on_change {
            cb();
        }
    }

    pub fn get_raw(&self, address: u32) -> u8 {
        self.bytes.get(&address).copied().unwrap_or(0)
    }

    pub fn set_raw(&mut self, address: u32, value: u8) {
        self.bytes.insert(address, value);
        self.notify();
    }

    /// Writes `value` into a 2-byte big-endian field (MSB nibble, LSB
    /// nibble), matching how multi-byte SysEx parameters like `Tune` or
    /// `PitchOffsetFine` are documented in the address chart.
    pub fn set_raw_u14(&mut self, address: u32, value: u16) {
        let value = value & 0x3fff;
        self.bytes.insert(address, (value >> 7) as u8);
        self.bytes.insert(address + 1, (value & 0x7f) as u8);
        self.notify();
    }

    pub fn get_raw_u14(&self, address: u32) -> u16 {
        let msb = self.get_raw(address) as u16 & 0x7f;
        let lsb = self.get_raw(address + 1) as u16 & 0x7f;
        (msb << 7) | lsb
    }

    /// Writes a run of consecutive bytes starting at `address`, used for the
    /// multi-byte DT1 leaves (patch/drum-map names, `Tune`'s 4-nibble form,
    /// `PlayKeyNumber`'s 2-byte form) where SysEx delivers the whole field in
    /// one message rather than byte-by-byte.
    pub fn set_raw_slice(&mut self, address: u32, data: &[u8]) {
        for (i, &b) in data.iter().enumerate() {
            self.bytes.insert(address + i as u32, b);
        }
        self.notify();
    }

    pub fn get_raw_slice(&self, address: u32, len: usize) -> Vec<u8> {
        (0..len as u32).map(|i| self.get_raw(address + i)).collect()
    }

    pub fn get_system(&self, param: SystemParam) -> u8 {
        self.get_raw(system_address(param))
    }

    pub fn set_system(&mut self, param: SystemParam, value: u8) {
        self.set_raw(system_address(param), value);
    }

    pub fn get_patch(&self, part: u8, param: PatchParam) -> u8 {
        self.get_raw(patch_address(part, param))
    }

    pub fn set_patch(&mut self, part: u8, param: PatchParam, value: u8) {
        self.set_raw(patch_address(part, param), value);
    }

    pub fn get_patch_common(&self, param: PatchParam) -> u8 {
        self.get_raw(patch_address(0, param))
    }

    pub fn set_patch_common(&mut self, param: PatchParam, value: u8) {
        self.set_raw(patch_address(0, param), value);
    }

    /// Reads a controller-destination depth within a part's `0x2000` block,
    /// generalized across all six controller sources (the `Mod*` patch
    /// params above are the `Modulation` source's slice of this space).
    pub fn get_controller_dest(&self, part: u8, source: ControllerSource, dest: ControllerDest) -> u8 {
        self.get_raw(patch_address(part, PatchParam::ModPitchControl) - 0x2000 + controller_dest_address(source, dest))
    }

    pub fn set_controller_dest(
        &mut self,
        part: u8,
        source: ControllerSource,
        dest: ControllerDest,
        value: u8,
    ) {
        let base = patch_address(part, PatchParam::ModPitchControl) - 0x2000;
        self.set_raw(base + controller_dest_address(source, dest), value);
    }

    pub fn get_drum(&self, map: u8, param: DrumParam, note: u8) -> u8 {
        self.get_raw(drum_address(map, param, note))
    }

    pub fn set_drum(&mut self, map: u8, param: DrumParam, note: u8, value: u8) {
        self.set_raw(drum_address(map, param, note), value);
    }
}

impl Default for SettingsStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_installs_gs_factory_defaults() {
        let store = SettingsStore::new();
        assert_eq!(store.get_system(SystemParam::Volume), 0x7f);
        assert_eq!(store.get_patch(0, PatchParam::PartLevel), 0x64);
        assert_eq!(store.get_patch(9, PatchParam::UseForRhythm), 1);
        assert_eq!(store.get_patch(0, PatchParam::UseForRhythm), 0);
    }

    #[test]
    fn gm_reset_disables_nrpn_reception() {
        let mut store = SettingsStore::new();
        store.reset(ResetMode::Gm);
        assert_eq!(store.get_patch(3, PatchParam::RxNrpn), 0);
    }

    #[test]
    fn on_change_fires_on_every_write() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let counter = Arc::new(AtomicUsize::new(0));
        let counter2 = counter.clone();
        let mut store = SettingsStore::new();
        store.set_on_change(move || {
            counter2.fetch_add(1, Ordering::SeqCst);
        });

        store.set_system(SystemParam::Volume, 100);
        store.set_patch(2, PatchParam::PartLevel, 50);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn u14_roundtrips_through_two_bytes() {
        let mut store = SettingsStore::new();
        store.set_raw_u14(0x1234, 0x1fff);
        assert_eq!(store.get_raw_u14(0x1234), 0x1fff);
    }

    #[test]
    fn drum_params_are_addressed_per_map_and_note() {
        let mut store = SettingsStore::new();
        store.set_drum(0, DrumParam::Level, 36, 100);
        store.set_drum(1, DrumParam::Level, 36, 50);
        assert_eq!(store.get_drum(0, DrumParam::Level, 36), 100);
        assert_eq!(store.get_drum(1, DrumParam::Level, 36), 50);
        assert_eq!(store.get_drum(0, DrumParam::Level, 37), 0);
    }
}
