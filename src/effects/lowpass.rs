//! One-pole lowpass used ahead of the chorus's modulated delay line.

pub struct LowPassFilter1 {
    a: f32,
    prev_out: f32,
}

impl LowPassFilter1 {
    pub fn new() -> Self {
        LowPassFilter1 { a: 1.0, prev_out: 0.0 }
    }

    pub fn calculate_coefficients(&mut self, sample_rate: f32, cutoff_hz: f32) {
        let two_pi_f = 2.0 * std::f32::consts::PI * cutoff_hz;
        self.a = two_pi_f / (sample_rate + two_pi_f);
    }

    pub fn apply(&mut self, input: f32) -> f32 {
        let output = self.a * input + (1.0 - self.a) * self.prev_out;
        self.prev_out = output;
        output
    }
}

impl Default for LowPassFilter1 {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smooths_a_step_input() {
        let mut lpf = LowPassFilter1::new();
        lpf.calculate_coefficients(44100.0, 500.0);
        let first = lpf.apply(1.0);
        assert!(first < 1.0 && first > 0.0);
    }
}
