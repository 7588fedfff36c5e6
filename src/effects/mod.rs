//! System effects: one shared Chorus and one shared Reverb, fed by a
//! per-part send level plus a chorus->reverb / reverb->chorus cross-send,
//! and auto-disabled after a second of silence to save cycles the way the
//! hardware's voice allocator reclaims idle effect taps.

pub mod allpass;
pub mod chorus;
pub mod comb;
pub mod delay;
pub mod lowpass;
pub mod reverb;

pub use chorus::Chorus;
pub use reverb::{Reverb, ReverbMode};

const SILENCE_THRESHOLD: f32 = 1.0e-5;

pub struct SystemEffects {
    sample_rate: f32,
    chorus: Chorus,
    reverb: Reverb,
    chorus_send_to_reverb: f32,
    reverb_send_to_chorus: f32,
    silent_samples: u32,
    disable_after_samples: u32,
    active: bool,
}

impl SystemEffects {
    pub fn new(sample_rate: f32) -> Self {
        SystemEffects {
            sample_rate,
            chorus: Chorus::new(sample_rate),
            reverb: Reverb::new(sample_rate),
            chorus_send_to_reverb: 0.0,
            reverb_send_to_chorus: 0.0,
            silent_samples: 0,
            disable_after_samples: sample_rate as u32,
            active: true,
        }
    }

    pub fn chorus_mut(&mut self) -> &mut Chorus {
        &mut self.chorus
    }

    pub fn reverb_mut(&mut self) -> &mut Reverb {
        &mut self.reverb
    }

    pub fn set_cross_sends(&mut self, chorus_send_to_reverb: u8, reverb_send_to_chorus: u8) {
        self.chorus_send_to_reverb = chorus_send_to_reverb as f32 / 127.0;
        self.reverb_send_to_chorus = reverb_send_to_chorus as f32 / 127.0;
    }

    /// Mixes one sample's worth of chorus and reverb sends (already scaled
    /// by each part's send level and summed across parts by the caller) into
    /// a stereo wet pair, auto-disabling the effect processors once both
    /// sends have been silent for a full second.
    pub fn process(&mut self, chorus_send: f32, reverb_send: f32) -> (f32, f32) {
        if chorus_send.abs() < SILENCE_THRESHOLD && reverb_send.abs() < SILENCE_THRESHOLD {
            self.silent_samples = self.silent_samples.saturating_add(1);
        } else {
            self.silent_samples = 0;
            self.active = true;
        }

        if self.silent_samples > self.disable_after_samples {
            self.active = false;
        }

        if !self.active {
            return (0.0, 0.0);
        }

        let chorus_input = chorus_send + reverb_send * self.reverb_send_to_chorus;
        let reverb_input = reverb_send + chorus_send * self.chorus_send_to_reverb;

        let (chorus_l, chorus_r) = self.chorus.process_sample(chorus_input);
        let (reverb_l, reverb_r) = self.reverb.process_sample(reverb_input);

        (chorus_l + reverb_l, chorus_r + reverb_r)
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disables_after_one_second_of_silence() {
        let mut fx = SystemEffects::new(1000.0);
        fx.process(1.0, 1.0);
        for _ in 0..1001 {
            fx.process(0.0, 0.0);
        }
        assert!(!fx.is_active());
    }

    #[test]
    fn reactivates_on_new_signal() {
        let mut fx = SystemEffects::new(1000.0);
        for _ in 0..1001 {
            fx.process(0.0, 0.0);
        }
        assert!(!fx.is_active());
        fx.process(1.0, 0.0);
        assert!(fx.is_active());
    }
}
