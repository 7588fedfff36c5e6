//! Comb filter: a feedback delay line whose coefficient is derived from the
//! desired T60 decay time rather than set directly.

use super::delay::Delay;

pub struct CombFilter {
    delay: Delay,
}

impl CombFilter {
    pub fn new(max_delay: usize, delay_samples: usize, t60_seconds: f32, sample_rate: f32) -> Self {
        let mut delay = Delay::new(max_delay);
        delay.set_delay(delay_samples);
        let coefficient = coefficient_for_t60(delay_samples, t60_seconds, sample_rate);
        delay.set_feedback(coefficient);
        CombFilter { delay }
    }

    pub fn set_t60(&mut self, delay_samples: usize, t60_seconds: f32, sample_rate: f32) {
        self.delay.set_feedback(coefficient_for_t60(delay_samples, t60_seconds, sample_rate));
    }

    pub fn process_sample(&mut self, input: f32) -> f32 {
        self.delay.process_sample(input)
    }
}

fn coefficient_for_t60(delay_samples: usize, t60_seconds: f32, sample_rate: f32) -> f32 {
    if t60_seconds <= 0.0 {
        return 0.0;
    }
    let delay_seconds = delay_samples as f32 / sample_rate;
    10f32.powf(-3.0 * delay_seconds / t60_seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coefficient_decreases_as_t60_shortens() {
        let long = coefficient_for_t60(100, 2.0, 44100.0);
        let short = coefficient_for_t60(100, 0.2, 44100.0);
        assert!(short < long);
    }
}
