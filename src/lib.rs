//! sc55-core: a polyphonic wavetable synthesizer core emulating the Roland
//! Sound Canvas SC-55 / SC-55mkII.
//!
//! Load a control ROM and PCM ROM with [`rom::RomSet`], hand the result to
//! [`Synth::new`], then feed it MIDI short messages and SysEx through
//! [`Synth::midi_input`]/[`Synth::midi_input_sysex`] and pull audio out
//! through [`Synth::next_frame`]. Everything downstream of ROM loading is
//! infallible by design: malformed MIDI, bad SysEx checksums and clipped
//! output are all logged via the `log` crate rather than surfaced as errors.

pub mod dsp;
pub mod effects;
pub mod error;
pub mod part;
pub mod rom;
pub mod settings;
pub mod sysex;
pub mod synth;
pub mod voice;

pub use error::{Sc55Error, Sc55Result};
pub use part::Part;
pub use rom::{ControlRom, PcmRom, RomSet, Sc55Model};
pub use settings::{ControllerDest, ControllerSource, DrumParam, PatchParam, ResetMode, SettingsStore, SystemParam};
pub use synth::{FrameObserver, Synth};
pub use voice::Voice;

/// Crate version, surfaced for hosts that want to print it in a log line or
/// About dialog rather than depending on `CARGO_PKG_VERSION` themselves.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
