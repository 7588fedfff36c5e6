//! Fixed byte offsets and permutation tables extracted from the Sound Canvas
//! firmware layout. Bank offsets and the sample-data permutations are taken
//! directly from the control/PCM ROM loaders; the 22 numeric lookup tables
//! (envelope time, TVF cutoff, etc.) live at model-specific offsets inside
//! the control ROM (PROG) and CPU ROM, captured here as one struct per model.

/// Start offsets of the 8 banks the SC-55 family control ROM is split into:
/// instruments (0,3), partials (1,4), samples (2,5), variations (6), drum
/// sets + LUT (7).
pub const BANKS_SC55: [usize; 8] = [
    0x10000, 0x1BD00, 0x1DEC0, 0x20000, 0x2BD00, 0x2DEC0, 0x30000, 0x38000,
];

pub const INSTRUMENT_BLOCK_LEN: usize = 216;
pub const PARTIAL_BLOCK_LEN: usize = 60;
pub const SAMPLE_BLOCK_LEN: usize = 16;
pub const DRUM_SET_BLOCK_LEN: usize = 1164;
pub const DRUM_SET_TABLE_END: usize = 0x03c028;

pub const CPU_ROM_SIZE: usize = 32768;

/// Offsets (within the combined, model-specific PROG + CPU address space)
/// of the numeric lookup tables. The upstream project splits these across
/// a per-firmware-version memory map; this crate keeps one flat struct per
/// model since only SC-55 and SC-55mkII are supported.
pub struct LutOffsets {
    pub velocity_curves: usize,
    pub num_velocity_curves: usize,
    pub key_mapper_index: usize,
    pub key_mapper: usize,
    pub time_key_follow_div: usize,
    pub tvf_resonance_freq: usize,
    pub tvf_resonance: usize,
    pub tvf_env_scale: usize,
    pub lfo_sine: usize,
    pub tva_bias_level: usize,
    pub tva_panpot: usize,
    pub tva_level_index: usize,
    pub tva_level: usize,
    pub time_key_follow: usize,
    pub tvf_env_depth: usize,
    pub tvf_cutoff_freq: usize,
    pub envelope_time: usize,
    pub lfo_rate: usize,
    pub lfo_delay_time: usize,
    pub lfo_tvf_depth: usize,
    pub lfo_tvp_depth: usize,
    pub pitch_env_depth: usize,
    pub tva_env_exp_change: usize,
    pub tvf_cutoff_vsens: usize,
    pub tvf_cutoff_freq_kf: usize,
}

pub const SC55_LUT_OFFSETS: LutOffsets = LutOffsets {
    velocity_curves: 0x33000,
    num_velocity_curves: 10,
    key_mapper_index: 0x335a0,
    key_mapper: 0x335c8,
    time_key_follow_div: 0x002000,
    tvf_resonance_freq: 0x002100,
    tvf_resonance: 0x002200,
    tvf_env_scale: 0x002280,
    lfo_sine: 0x0022c0,
    tva_bias_level: 0x002380,
    tva_panpot: 0x002420,
    tva_level_index: 0x0024a0,
    tva_level: 0x002520,
    time_key_follow: 0x002620,
    tvf_env_depth: 0x0027a0,
    tvf_cutoff_freq: 0x0027c0,
    envelope_time: 0x002900,
    lfo_rate: 0x002a00,
    lfo_delay_time: 0x002b00,
    lfo_tvf_depth: 0x002c00,
    lfo_tvp_depth: 0x002d00,
    pitch_env_depth: 0x002e00,
    tva_env_exp_change: 0x002e20,
    tvf_cutoff_vsens: 0x003020,
    tvf_cutoff_freq_kf: 0x003120,
};

pub const SC55MK2_LUT_OFFSETS: LutOffsets = LutOffsets {
    num_velocity_curves: 12,
    ..SC55_LUT_OFFSETS
};

/// Order in which the 8 output bits are assembled from the 8 scrambled input
/// bits of a PCM ROM byte, LSB first.
pub const PCM_BYTE_PERMUTATION: [u8; 8] = [2, 0, 4, 5, 7, 6, 3, 1];

/// Order in which the 20 output address bits are assembled from the 20
/// scrambled input address bits, LSB first. Discovered by NewRisingSun.
pub const PCM_ADDRESS_PERMUTATION: [u8; 20] = [
    0x02, 0x00, 0x03, 0x04, 0x01, 0x09, 0x0D, 0x0A, 0x12, 0x11, 0x06, 0x0F,
    0x0B, 0x10, 0x08, 0x05, 0x0C, 0x07, 0x0E, 0x13,
];

/// The first N bytes/addresses of each PCM ROM file are stored unscrambled.
pub const PCM_UNSCRAMBLED_PREFIX: usize = 0x20;
