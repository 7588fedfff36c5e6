//! ROM loading: control ROM (instrument/partial/sample/drum-set tables and
//! lookup tables) and PCM ROM (descrambled wave data).

pub mod control;
pub mod pcm;
mod tables;

pub use control::{ControlRom, DrumSet, Instrument, InstPartial, LookupTables, Partial, Sample, Sc55Model};
pub use pcm::PcmRom;

use crate::error::Sc55Result;
use std::fs;
use std::path::Path;

/// The two ROM images a synth instance needs: decoded tables and raw wave
/// data, loaded once at startup and shared behind an `Arc` thereafter.
pub struct RomSet {
    pub control: ControlRom,
    pub pcm: PcmRom,
}

impl RomSet {
    /// Loads a control ROM (PROG + CPU images) and 1-3 PCM ROM files from
    /// disk. `prog_rom_path`/`cpu_rom_path` are the two halves dumped from a
    /// real unit; `pcm_rom_paths` is typically `["waverom1.bin", "waverom2.bin"]`.
    pub fn load_from_files(
        prog_rom_path: &Path,
        cpu_rom_path: &Path,
        pcm_rom_paths: &[&Path],
    ) -> Sc55Result<Self> {
        let prog_rom = read_file(prog_rom_path)?;
        let cpu_rom = read_file(cpu_rom_path)?;
        let control = ControlRom::load(&prog_rom, &cpu_rom)?;

        let mut pcm_roms = Vec::with_capacity(pcm_rom_paths.len());
        for path in pcm_rom_paths {
            pcm_roms.push(read_file(path)?);
        }
        let pcm = PcmRom::load(&pcm_roms)?;

        Ok(RomSet { control, pcm })
    }

    /// Builds a `RomSet` from in-memory ROM images, bypassing the filesystem
    /// entirely. Used by hosts that embed ROM data or fetch it from a bundle.
    pub fn load_from_memory(prog_rom: &[u8], cpu_rom: &[u8], pcm_roms: &[Vec<u8>]) -> Sc55Result<Self> {
        let control = ControlRom::load(prog_rom, cpu_rom)?;
        let pcm = PcmRom::load(pcm_roms)?;
        Ok(RomSet { control, pcm })
    }
}

fn read_file(path: &Path) -> Sc55Result<Vec<u8>> {
    fs::read(path).map_err(|_| crate::error::Sc55Error::RomNotFound(path.display().to_string()))
}
