use crate::error::{Sc55Error, Sc55Result};
use crate::rom::tables::{
    self, DRUM_SET_BLOCK_LEN, DRUM_SET_TABLE_END, INSTRUMENT_BLOCK_LEN,
    PARTIAL_BLOCK_LEN, SAMPLE_BLOCK_LEN,
};

/// Which hardware model a control ROM identifies as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sc55Model {
    Sc55,
    Sc55mkII,
}

impl Sc55Model {
    pub fn max_polyphony(self) -> usize {
        match self {
            Sc55Model::Sc55 => 24,
            Sc55Model::Sc55mkII => 28,
        }
    }
}

/// One of the 16-byte sample descriptors, pointing into the PCM ROM.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sample {
    pub volume: u8,
    pub address: u32,
    pub attack_end: u16,
    pub sample_len: u16,
    pub loop_len: u16,
    pub loop_mode: u8,
    pub root_key: u8,
    pub pitch: u16,
    pub fine_volume: u16,
}

/// Per-InstPartial parameter block (92 bytes on disk; 90 carry data).
#[derive(Debug, Clone, Copy, Default)]
pub struct InstPartial {
    pub partial_index: u16,

    pub lfo2_waveform: u8,
    pub lfo2_rate: u8,
    pub lfo2_delay: u8,
    pub lfo2_fade: u8,

    pub panpot: i8,
    pub coarse_pitch: i8,
    pub fine_pitch: i8,
    pub rand_pitch: i8,
    pub pitch_key_follow: u8,

    pub tvp_lfo1_depth: u8,
    pub tvp_lfo2_depth: u8,
    pub pitch_env_depth: u8,
    pub pitch_env_l0: u8,
    pub pitch_env_l1: u8,
    pub pitch_env_l2: u8,
    pub pitch_env_l3: u8,
    pub pitch_env_l5: u8,
    pub pitch_env_t1: u8,
    pub pitch_env_t2: u8,
    pub pitch_env_t3: u8,
    pub pitch_env_t4: u8,
    pub pitch_env_t5: u8,
    pub pitch_et_key_f14: u8,
    pub pitch_et_key_f5: u8,
    pub pitch_env_vel_sens: u8,

    pub tvf_cof_vel_curve: u8,
    pub tvf_base_flt: u8,
    pub tvf_resonance: u8,
    pub tvf_type: u8,
    pub tvf_cf_key_flw_c: u8,
    pub tvf_cf_key_flw: u8,
    pub tvf_lfo1_depth: u8,
    pub tvf_lfo2_depth: u8,
    pub tvf_env_depth: u8,
    pub tvf_env_l1: u8,
    pub tvf_env_l2: u8,
    pub tvf_env_l3: u8,
    pub tvf_env_l4: u8,
    pub tvf_env_l5: u8,
    pub tvf_env_t1: u8,
    pub tvf_env_t2: u8,
    pub tvf_env_t3: u8,
    pub tvf_env_t4: u8,
    pub tvf_env_t5: u8,
    pub tvf_et_key_fp14: u8,
    pub tvf_et_key_fp5: u8,
    pub tvf_et_key_f14: u8,
    pub tvf_et_key_f5: u8,
    pub tvf_cof_v_sens: u8,
    pub tvf_et_v_sens12: u8,
    pub tvf_et_v_sens35: u8,

    pub tva_lvl_vel_curve: u8,
    pub volume: u8,
    pub tva_bias_point: u8,
    pub tva_bias_level: u8,
    pub tva_lfo1_depth: u8,
    pub tva_lfo2_depth: u8,
    pub tva_env_l1: u8,
    pub tva_env_l2: u8,
    pub tva_env_l3: u8,
    pub tva_env_l4: u8,
    pub tva_env_t1: u8,
    pub tva_env_t2: u8,
    pub tva_env_t3: u8,
    pub tva_env_t4: u8,
    pub tva_env_t5: u8,
    pub tva_et_key_fp14: u8,
    pub tva_et_key_fp5: u8,
    pub tva_et_key_f14: u8,
    pub tva_et_key_f5: u8,
    pub tva_et_v_sens12: u8,
    pub tva_et_v_sens35: u8,
}

#[derive(Debug, Clone, Default)]
pub struct Instrument {
    pub name: String,
    pub volume: u8,
    pub lfo1_waveform: u8,
    pub lfo1_rate: u8,
    pub lfo1_delay: u8,
    pub lfo1_fade: u8,
    pub partials_used: u8,
    pub pitch_curve: u8,
    pub partials: [InstPartial; 2],
}

#[derive(Debug, Clone, Default)]
pub struct Partial {
    pub name: String,
    pub breaks: [u8; 16],
    pub samples: [u16; 16],
}

#[derive(Debug, Clone)]
pub struct DrumSet {
    pub name: String,
    pub preset: [u16; 128],
    pub volume: [u8; 128],
    pub key: [u8; 128],
    pub assign_group: [u8; 128],
    pub panpot: [u8; 128],
    pub reverb: [u8; 128],
    pub chorus: [u8; 128],
    pub flags: [u8; 128],
}

impl Default for DrumSet {
    fn default() -> Self {
        DrumSet {
            name: String::new(),
            preset: [0xffff; 128],
            volume: [0; 128],
            key: [0; 128],
            assign_group: [0; 128],
            panpot: [0x40; 128],
            reverb: [0; 128],
            chorus: [0; 128],
            flags: [0; 128],
        }
    }
}

/// The ~22 numeric lookup tables shared by the whole engine. Named fields
/// instead of the upstream's `_lookupTables[19]` array of raw bytes so call
/// sites read `lut.envelope_time[idx]` rather than a numeric table index.
#[derive(Debug, Clone, Default)]
pub struct LookupTables {
    pub velocity_curves: Vec<i32>,
    pub key_mapper_index: [i32; 128],
    pub key_mapper: Vec<i32>,
    pub key_mapper_offset: i32,
    pub time_key_follow_div: [i32; 21],
    pub tvf_resonance_freq: [i32; 256],
    pub tvf_resonance: [i32; 128],
    pub tvf_env_scale: [i32; 64],
    pub lfo_sine: [i32; 130],
    pub tva_bias_level: [i32; 130],
    pub tva_panpot: [i32; 128],
    pub tva_level_index: [i32; 128],
    pub tva_level: [i32; 256],
    pub time_key_follow: [i32; 136],
    pub tvf_env_depth: [i32; 11],
    pub tvf_cutoff_freq: [i32; 128],
    pub envelope_time: [i32; 128],
    pub lfo_rate: [i32; 128],
    pub lfo_delay_time: [i32; 128],
    pub lfo_tvf_depth: [i32; 128],
    pub lfo_tvp_depth: [i32; 128],
    pub pitch_env_depth: [i32; 11],
    pub tva_env_exp_change: [i32; 256],
    pub tvf_cutoff_vsens: [i32; 128],
    pub tvf_cutoff_freq_kf: [i32; 128],
}

/// Decoded control-ROM tables: immutable after load, shared by reference
/// with every downstream component.
#[derive(Debug, Clone)]
pub struct ControlRom {
    model: Sc55Model,
    instruments: Vec<Instrument>,
    partials: Vec<Partial>,
    samples: Vec<Sample>,
    drum_sets: Vec<DrumSet>,
    drum_sets_lut: [u8; 128],
    variations: Vec<[u16; 128]>,
    lut: LookupTables,
}

fn be_u16(b: &[u8]) -> u16 {
    u16::from_be_bytes([b[0], b[1]])
}

fn be_u24_as_u32(b: &[u8]) -> u32 {
    u32::from_be_bytes([0, b[0], b[1], b[2]])
}

fn trim_name(raw: &[u8]) -> String {
    let s = String::from_utf8_lossy(raw);
    s.trim_end_matches(['\0', ' ']).to_string()
}

impl ControlRom {
    /// Identifies the model from byte patterns at fixed offsets and parses
    /// every table out of the combined control + CPU ROM images.
    pub fn load(prog_rom: &[u8], cpu_rom: &[u8]) -> Sc55Result<Self> {
        if cpu_rom.len() != tables::CPU_ROM_SIZE {
            return Err(Sc55Error::RomWrongSize {
                expected: tables::CPU_ROM_SIZE,
                actual: cpu_rom.len(),
            });
        }

        let model = identify_model(prog_rom)?;

        let instruments = read_instruments(prog_rom);
        let partials = read_partials(prog_rom);
        let samples = read_samples(prog_rom);
        let variations = read_variations(prog_rom);
        let (drum_sets_lut, drum_sets) = read_drum_sets(prog_rom);
        let lut = read_lookup_tables(prog_rom, cpu_rom, model);

        Ok(ControlRom {
            model,
            instruments,
            partials,
            samples,
            drum_sets,
            drum_sets_lut,
            variations,
            lut,
        })
    }

    pub fn model(&self) -> Sc55Model {
        self.model
    }

    pub fn max_polyphony(&self) -> usize {
        self.model.max_polyphony()
    }

    pub fn instrument(&self, index: usize) -> Option<&Instrument> {
        self.instruments.get(index)
    }

    pub fn partial(&self, index: usize) -> Option<&Partial> {
        self.partials.get(index)
    }

    pub fn sample(&self, index: usize) -> Option<&Sample> {
        self.samples.get(index)
    }

    pub fn drum_set(&self, index: usize) -> Option<&DrumSet> {
        self.drum_sets.get(index)
    }

    pub fn drum_set_for_program(&self, program: u8) -> usize {
        self.drum_sets_lut
            .get(program as usize)
            .copied()
            .unwrap_or(0) as usize
    }

    pub fn variation(&self, bank: usize) -> Option<&[u16; 128]> {
        self.variations.get(bank)
    }

    pub fn lookup_tables(&self) -> &LookupTables {
        &self.lut
    }

    pub fn num_instruments(&self) -> usize {
        self.instruments.len()
    }
}

fn identify_model(prog_rom: &[u8]) -> Sc55Result<Sc55Model> {
    if prog_rom.len() >= 0xf380 + 29 && &prog_rom[0xf380..0xf380 + 3] == b"Ver" {
        return Ok(Sc55Model::Sc55);
    }

    if prog_rom.len() >= 0x3d148 + 32
        && &prog_rom[0x3d148..0x3d148 + 32] == b"GS-28 VER=2.00  SC              "
    {
        return Ok(Sc55Model::Sc55mkII);
    }

    if prog_rom.len() >= 0x3d148 + 32
        && &prog_rom[0x3d148..0x3d148 + 32] == b"GS-28 VER=2.00  LCGS-3 module   "
    {
        return Ok(Sc55Model::Sc55mkII);
    }

    if prog_rom.len() >= 0x7fc0 + 24 && &prog_rom[0x7fc0..0x7fc0 + 24] == b"GS-64 VER=3.00  SC-88   " {
        return Err(Sc55Error::RomSc88Unsupported);
    }

    Err(Sc55Error::RomUnknownModel)
}

fn read_instruments(rom: &[u8]) -> Vec<Instrument> {
    let banks = tables::BANKS_SC55;
    let mut instruments = Vec::new();
    let mut x = banks[0];
    while x < banks[4] {
        if x == banks[1] {
            x = banks[3];
        }
        if x + INSTRUMENT_BLOCK_LEN > rom.len() {
            break;
        }

        let block = &rom[x..x + INSTRUMENT_BLOCK_LEN];
        if block[0] == 0 {
            x += INSTRUMENT_BLOCK_LEN;
            continue;
        }

        let mut inst = Instrument {
            name: trim_name(&block[0..12]),
            volume: block[12],
            lfo1_waveform: block[14],
            lfo1_rate: block[15],
            lfo1_delay: block[16],
            lfo1_fade: block[17],
            partials_used: block[18],
            pitch_curve: block[19],
            partials: Default::default(),
        };

        for p in 0..2 {
            let base = 34 + p * 92;
            let d = &block[base..base + 90];
            inst.partials[p] = InstPartial {
                partial_index: be_u16(&d[0..2]),
                lfo2_waveform: d[2],
                lfo2_rate: d[3],
                lfo2_delay: d[4],
                lfo2_fade: d[5],
                panpot: d[7] as i8,
                coarse_pitch: d[8] as i8,
                fine_pitch: d[9] as i8,
                rand_pitch: d[10] as i8,
                pitch_key_follow: d[11],
                tvp_lfo1_depth: d[12],
                tvp_lfo2_depth: d[13],
                pitch_env_depth: d[14],
                pitch_env_l0: d[16],
                pitch_env_l1: d[17],
                pitch_env_l2: d[18],
                pitch_env_l3: d[19],
                pitch_env_l5: d[20],
                pitch_env_t1: d[21],
                pitch_env_t2: d[22],
                pitch_env_t3: d[23],
                pitch_env_t4: d[24],
                pitch_env_t5: d[25],
                pitch_et_key_f14: d[30],
                pitch_et_key_f5: d[31],
                pitch_env_vel_sens: d[32],
                tvf_cof_vel_curve: d[34],
                tvf_base_flt: d[35],
                tvf_resonance: d[36],
                tvf_type: d[37],
                tvf_cf_key_flw_c: d[38],
                tvf_cf_key_flw: d[39],
                tvf_lfo1_depth: d[40],
                tvf_lfo2_depth: d[41],
                tvf_env_depth: d[42],
                tvf_env_l1: d[43],
                tvf_env_l2: d[44],
                tvf_env_l3: d[45],
                tvf_env_l4: d[46],
                tvf_env_l5: d[47],
                tvf_env_t1: d[48],
                tvf_env_t2: d[49],
                tvf_env_t3: d[50],
                tvf_env_t4: d[51],
                tvf_env_t5: d[52],
                tvf_et_key_fp14: d[55],
                tvf_et_key_fp5: d[56],
                tvf_et_key_f14: d[57],
                tvf_et_key_f5: d[58],
                tvf_cof_v_sens: d[59],
                tvf_et_v_sens12: d[60],
                tvf_et_v_sens35: d[61],
                tva_lvl_vel_curve: d[62],
                volume: d[67],
                tva_bias_point: d[68],
                tva_bias_level: d[69],
                tva_lfo1_depth: d[70],
                tva_lfo2_depth: d[71],
                tva_env_l1: d[72],
                tva_env_l2: d[73],
                tva_env_l3: d[74],
                tva_env_l4: d[75],
                tva_env_t1: d[76],
                tva_env_t2: d[77],
                tva_env_t3: d[78],
                tva_env_t4: d[79],
                tva_env_t5: d[80],
                tva_et_key_fp14: d[83],
                tva_et_key_fp5: d[84],
                tva_et_key_f14: d[85],
                tva_et_key_f5: d[86],
                tva_et_v_sens12: d[87],
                tva_et_v_sens35: d[88],
            };
        }

        instruments.push(inst);
        x += INSTRUMENT_BLOCK_LEN;
    }
    instruments
}

fn read_partials(rom: &[u8]) -> Vec<Partial> {
    let banks = tables::BANKS_SC55;
    let mut partials = Vec::new();
    let mut x = banks[1];
    while x < banks[5] {
        if x == banks[2] {
            x = banks[4];
        }
        if x + PARTIAL_BLOCK_LEN > rom.len() {
            break;
        }

        let block = &rom[x..x + PARTIAL_BLOCK_LEN];
        let name = trim_name(&block[0..12]);
        if !name.is_empty() {
            let mut breaks = [0u8; 16];
            breaks.copy_from_slice(&block[12..28]);

            let mut samples = [0u16; 16];
            for i in 0..16 {
                samples[i] = be_u16(&block[28 + 2 * i..30 + 2 * i]);
            }

            partials.push(Partial { name, breaks, samples });
        }
        x += PARTIAL_BLOCK_LEN;
    }
    partials
}

fn read_samples(rom: &[u8]) -> Vec<Sample> {
    let banks = tables::BANKS_SC55;
    let mut samples = Vec::new();
    let mut x = banks[2];
    while x < banks[6] {
        if x == banks[3] {
            x = banks[5];
        }
        if x + SAMPLE_BLOCK_LEN > rom.len() {
            break;
        }

        let d = &rom[x..x + SAMPLE_BLOCK_LEN];
        let sample_len = be_u16(&d[6..8]);
        if sample_len != 0 {
            samples.push(Sample {
                volume: d[0],
                address: be_u24_as_u32(&d[1..4]),
                attack_end: be_u16(&d[4..6]),
                sample_len,
                loop_len: be_u16(&d[8..10]),
                loop_mode: d[10],
                root_key: d[11],
                pitch: be_u16(&d[12..14]),
                fine_volume: be_u16(&d[14..16]),
            });
        }
        x += SAMPLE_BLOCK_LEN;
    }
    samples
}

fn read_variations(rom: &[u8]) -> Vec<[u16; 128]> {
    let banks = tables::BANKS_SC55;
    let mut variations = Vec::with_capacity(128);
    for bank in 0..128 {
        let mut row = [0xffffu16; 128];
        let offset = banks[6] + bank * 128 * 2;
        for program in 0..128 {
            let pos = offset + program * 2;
            if pos + 2 <= rom.len() {
                row[program] = be_u16(&rom[pos..pos + 2]);
            }
        }
        variations.push(row);
    }
    variations
}

fn read_drum_sets(rom: &[u8]) -> ([u8; 128], Vec<DrumSet>) {
    let banks = tables::BANKS_SC55;
    let mut lut = [0u8; 128];
    let lut_start = banks[7];
    if lut_start + 128 <= rom.len() {
        lut.copy_from_slice(&rom[lut_start..lut_start + 128]);
    }

    let mut drum_sets = Vec::new();
    let mut x = banks[7] + 128;
    while x < DRUM_SET_TABLE_END {
        if x + DRUM_SET_BLOCK_LEN > rom.len() {
            break;
        }
        let block = &rom[x..x + DRUM_SET_BLOCK_LEN];

        let mut ds = DrumSet::default();
        for i in 0..128 {
            ds.preset[i] = be_u16(&block[2 * i..2 * i + 2]);
        }
        let mut off = 256;
        ds.volume.copy_from_slice(&block[off..off + 128]);
        off += 128;
        ds.key.copy_from_slice(&block[off..off + 128]);
        off += 128;
        ds.assign_group.copy_from_slice(&block[off..off + 128]);
        off += 128;
        ds.panpot.copy_from_slice(&block[off..off + 128]);
        off += 128;
        ds.reverb.copy_from_slice(&block[off..off + 128]);
        off += 128;
        ds.chorus.copy_from_slice(&block[off..off + 128]);
        off += 128;
        ds.flags.copy_from_slice(&block[off..off + 128]);
        off += 128;
        ds.name = trim_name(&block[off..off + 12]);

        if !ds.name.starts_with("AC.") && block[off] != 0 {
            drum_sets.push(ds);
        }

        x += DRUM_SET_BLOCK_LEN;
    }

    (lut, drum_sets)
}

fn read_lut16<const N: usize>(rom: &[u8], offset: usize) -> [i32; N] {
    let mut out = [0i32; N];
    for i in 0..N {
        let pos = offset + 2 * i;
        if pos + 2 <= rom.len() {
            out[i] = be_u16(&rom[pos..pos + 2]) as i32;
        }
    }
    out
}

fn read_lut16_vec(rom: &[u8], offset: usize, n: usize) -> Vec<i32> {
    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        let pos = offset + 2 * i;
        out.push(if pos + 2 <= rom.len() {
            be_u16(&rom[pos..pos + 2]) as i32
        } else {
            0
        });
    }
    out
}

fn read_lookup_tables(prog_rom: &[u8], cpu_rom: &[u8], model: Sc55Model) -> LookupTables {
    let off = match model {
        Sc55Model::Sc55 => &tables::SC55_LUT_OFFSETS,
        Sc55Model::Sc55mkII => &tables::SC55MK2_LUT_OFFSETS,
    };

    let velocity_curves =
        read_lut16_vec(prog_rom, off.velocity_curves, 128 * off.num_velocity_curves)
            .iter()
            .map(|&v| v & 0xff)
            .collect();

    let key_mapper_index: [i32; 128] = read_lut16(prog_rom, off.key_mapper_index);
    let km_size = (128
        + key_mapper_index.last().copied().unwrap_or(0)
        - key_mapper_index.first().copied().unwrap_or(0))
    .max(0) as usize;
    let key_mapper = if off.key_mapper + km_size <= prog_rom.len() {
        prog_rom[off.key_mapper..off.key_mapper + km_size]
            .iter()
            .map(|&b| b as i32)
            .collect()
    } else {
        vec![0; km_size]
    };

    LookupTables {
        velocity_curves,
        key_mapper_index,
        key_mapper,
        key_mapper_offset: off.key_mapper as i32 - 0x30000,
        time_key_follow_div: read_lut16(cpu_rom, off.time_key_follow_div),
        tvf_resonance_freq: read_lut16(cpu_rom, off.tvf_resonance_freq),
        tvf_resonance: read_lut16(cpu_rom, off.tvf_resonance),
        tvf_env_scale: read_lut16(cpu_rom, off.tvf_env_scale),
        lfo_sine: read_lut16(cpu_rom, off.lfo_sine),
        tva_bias_level: read_lut16(cpu_rom, off.tva_bias_level),
        tva_panpot: read_lut16(cpu_rom, off.tva_panpot),
        tva_level_index: read_lut16(cpu_rom, off.tva_level_index),
        tva_level: read_lut16(cpu_rom, off.tva_level),
        time_key_follow: read_lut16(cpu_rom, off.time_key_follow),
        tvf_env_depth: read_lut16(cpu_rom, off.tvf_env_depth),
        tvf_cutoff_freq: read_lut16(cpu_rom, off.tvf_cutoff_freq),
        envelope_time: read_lut16(cpu_rom, off.envelope_time),
        lfo_rate: read_lut16(cpu_rom, off.lfo_rate),
        lfo_delay_time: read_lut16(cpu_rom, off.lfo_delay_time),
        lfo_tvf_depth: read_lut16(cpu_rom, off.lfo_tvf_depth),
        lfo_tvp_depth: read_lut16(cpu_rom, off.lfo_tvp_depth),
        pitch_env_depth: read_lut16(cpu_rom, off.pitch_env_depth),
        tva_env_exp_change: read_lut16(cpu_rom, off.tva_env_exp_change),
        tvf_cutoff_vsens: read_lut16(cpu_rom, off.tvf_cutoff_vsens),
        tvf_cutoff_freq_kf: read_lut16(cpu_rom, off.tvf_cutoff_freq_kf),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synthetic_prog_rom() -> Vec<u8> {
        let mut rom = vec![0u8; tables::BANKS_SC55[7] + 200_000];
        rom[0xf380..0xf380 + 3].copy_from_slice(b"Ver");
        rom[0xf380 + 3..0xf380 + 7].copy_from_slice(b"1.21");
        rom
    }

    #[test]
    fn identifies_sc55_by_version_string() {
        let rom = synthetic_prog_rom();
        assert_eq!(identify_model(&rom).unwrap(), Sc55Model::Sc55);
    }

    #[test]
    fn rejects_unrecognized_rom() {
        let rom = vec![0u8; 0x40000];
        assert!(matches!(identify_model(&rom), Err(Sc55Error::RomUnknownModel)));
    }

    #[test]
    fn rejects_sc88_rom() {
        let mut rom = vec![0u8; 0x40000];
        rom[0x7fc0..0x7fc0 + 24].copy_from_slice(b"GS-64 VER=3.00  SC-88   ");
        assert!(matches!(identify_model(&rom), Err(Sc55Error::RomSc88Unsupported)));
    }

    #[test]
    fn cpu_rom_wrong_size_is_rejected() {
        let prog = synthetic_prog_rom();
        let cpu = vec![0u8; 100];
        assert!(matches!(
            ControlRom::load(&prog, &cpu),
            Err(Sc55Error::RomWrongSize { .. })
        ));
    }
}
