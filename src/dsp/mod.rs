//! Per-voice modulation chain: LFOs, envelope generators, and the TVP/TVF/TVA
//! stages that turn a raw ROM sample into a note.

pub mod envelope;
pub mod lfo;
pub mod tva;
pub mod tvf;
pub mod tvp;

pub use envelope::{Envelope, EnvelopeSpec, EnvelopeType};
pub use lfo::{Lfo, Waveform};
pub use tva::Tva;
pub use tvf::Tvf;
pub use tvp::Tvp;
