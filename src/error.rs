use thiserror::Error;

/// Fatal errors surfaced while constructing a [`crate::Synth`] from ROM data.
///
/// Everything that can go wrong once the synth is running (bad SysEx,
/// clipping, polyphony exhaustion) is handled in place and logged; it never
/// reaches this type.
#[derive(Debug, Error)]
pub enum Sc55Error {
    #[error("ROM file not found: {0}")]
    RomNotFound(String),

    #[error("ROM has wrong size: expected {expected}, got {actual}")]
    RomWrongSize { expected: usize, actual: usize },

    #[error("control ROM does not match any known Sound Canvas model")]
    RomUnknownModel,

    #[error("control ROM identifies as SC-88 family, which is not supported")]
    RomSc88Unsupported,

    #[error("PCM ROM permutation produced an out-of-range address")]
    RomPermutationInvalid,

    #[error("invalid audio format: {channels} channels is not 1 or 2")]
    InvalidChannels { channels: u16 },
}

pub type Sc55Result<T> = Result<T, Sc55Error>;
