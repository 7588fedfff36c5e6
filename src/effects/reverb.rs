//! Schroeder reverb network: 3 series allpass filters feeding 4 parallel
//! comb filters, with two short decorrelation delays on the stereo output.
//! Modes 6 (Delay) and 7 (Panning Delay) bypass the network entirely and
//! use a single feedback delay line instead.

use super::allpass::AllPassFilter;
use super::comb::CombFilter;
use super::delay::Delay;

const FREEVERB_DELAYS_44100: [usize; 9] = [225, 341, 441, 1116, 1356, 1422, 1617, 211, 179];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReverbMode {
    Room1,
    Room2,
    Room3,
    Hall1,
    Hall2,
    Plate,
    Delay,
    PanningDelay,
}

impl ReverbMode {
    pub fn from_macro(value: u8) -> Self {
        match value {
            0 => ReverbMode::Room1,
            1 => ReverbMode::Room2,
            2 => ReverbMode::Room3,
            3 => ReverbMode::Hall1,
            4 => ReverbMode::Hall2,
            5 => ReverbMode::Plate,
            6 => ReverbMode::Delay,
            _ => ReverbMode::PanningDelay,
        }
    }

    fn uses_schroeder_network(self) -> bool {
        !matches!(self, ReverbMode::Delay | ReverbMode::PanningDelay)
    }
}

pub struct Reverb {
    mode: ReverbMode,
    sample_rate: f32,
    allpasses: [AllPassFilter; 3],
    combs: [CombFilter; 4],
    comb_delays: [usize; 4],
    output_delay_l: Delay,
    output_delay_r: Delay,
    delay_filter: Delay,
    panning_delay_toggle: bool,
    panning_traversal_count: usize,
    level: f32,
    time: f32,
    delay_feedback: f32,
}

fn scaled_delay(base: usize, sample_rate: f32) -> usize {
    let scaled = (base as f32 * sample_rate / 44100.0) as usize;
    if scaled % 2 == 0 {
        scaled + 1
    } else {
        scaled
    }
}

impl Reverb {
    pub fn new(sample_rate: f32) -> Self {
        let lengths: Vec<usize> = FREEVERB_DELAYS_44100
            .iter()
            .map(|&d| scaled_delay(d, sample_rate))
            .collect();

        let allpasses = [
            AllPassFilter::new(lengths[0] + 1, lengths[0]),
            AllPassFilter::new(lengths[1] + 1, lengths[1]),
            AllPassFilter::new(lengths[2] + 1, lengths[2]),
        ];

        let t60 = 0.5;
        let combs = [
            CombFilter::new(lengths[3] + 1, lengths[3], t60, sample_rate),
            CombFilter::new(lengths[4] + 1, lengths[4], t60, sample_rate),
            CombFilter::new(lengths[5] + 1, lengths[5], t60, sample_rate),
            CombFilter::new(lengths[6] + 1, lengths[6], t60, sample_rate),
        ];

        let mut output_delay_l = Delay::new(lengths[7] + 1);
        output_delay_l.set_delay(lengths[7]);
        let mut output_delay_r = Delay::new(lengths[8] + 1);
        output_delay_r.set_delay(lengths[8]);

        let max_delay_samples = (sample_rate * 0.430).ceil() as usize + 1;
        let delay_filter = Delay::new(max_delay_samples.max(1));

        Reverb {
            mode: ReverbMode::Hall1,
            sample_rate,
            allpasses,
            combs,
            comb_delays: [lengths[3], lengths[4], lengths[5], lengths[6]],
            output_delay_l,
            output_delay_r,
            delay_filter,
            panning_delay_toggle: false,
            panning_traversal_count: 0,
            level: 0.5,
            time: 0.5,
            delay_feedback: 0.0,
        }
    }

    pub fn set_params(&mut self, mode: ReverbMode, level: u8, time: u8, delay_feedback: u8) {
        self.mode = mode;
        self.level = level as f32 / 127.0;
        self.time = time as f32 / 127.0;
        self.delay_feedback = delay_feedback as f32;

        let t60 = (time as f32 / 32.0).max(0.01);
        for (comb, &delay_samples) in self.combs.iter_mut().zip(self.comb_delays.iter()) {
            comb.set_t60(delay_samples, t60, self.sample_rate);
        }

        if !self.mode.uses_schroeder_network() {
            let delay_samples = ((time as f32 / 127.0) * self.sample_rate * 0.430) as usize;
            self.delay_filter.set_delay(delay_samples.min(self.delay_filter.len() - 1));
            self.delay_filter.set_feedback((delay_feedback as f32 / 180.0).clamp(0.0, 0.98));
        }
    }

    /// Processes one mono send sample, returning a stereo wet pair.
    pub fn process_sample(&mut self, input: f32) -> (f32, f32) {
        if !self.mode.uses_schroeder_network() {
            let wet = self.delay_filter.process_sample(input);
            return match self.mode {
                ReverbMode::PanningDelay => {
                    self.panning_traversal_count += 1;
                    if self.panning_traversal_count >= self.delay_filter.len() {
                        self.panning_traversal_count = 0;
                        self.panning_delay_toggle = !self.panning_delay_toggle;
                    }
                    if self.panning_delay_toggle {
                        (0.0, wet * self.level)
                    } else {
                        (wet * self.level, 0.0)
                    }
                }
                _ => (wet * self.level, wet * self.level),
            };
        }

        let mut signal = input;
        for allpass in &mut self.allpasses {
            signal = allpass.process_sample(signal);
        }

        let mut sum = 0.0;
        for comb in &mut self.combs {
            sum += comb.process_sample(signal);
        }
        sum *= 0.25;

        let left = self.output_delay_l.process_sample(sum);
        let right = self.output_delay_r.process_sample(sum);

        (left * self.level, right * self.level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schroeder_modes_produce_decaying_tail_from_impulse() {
        let mut reverb = Reverb::new(44100.0);
        reverb.set_params(ReverbMode::Hall1, 100, 64, 0);
        let (l0, _) = reverb.process_sample(1.0);
        let mut energy_later = 0.0f32;
        for _ in 0..2000 {
            let (l, _) = reverb.process_sample(0.0);
            energy_later += l.abs();
        }
        assert!(energy_later > 0.0);
        let _ = l0;
    }

    #[test]
    fn panning_delay_alternates_output_channel() {
        let mut reverb = Reverb::new(8000.0);
        reverb.set_params(ReverbMode::PanningDelay, 127, 20, 100);
        let mut saw_left = false;
        let mut saw_right = false;
        for _ in 0..20000 {
            let (l, r) = reverb.process_sample(1.0);
            if l > 0.0 {
                saw_left = true;
            }
            if r > 0.0 {
                saw_right = true;
            }
        }
        assert!(saw_left && saw_right);
    }
}
