//! Schroeder allpass filter: fixed coefficient of 0.7, diffuses the signal
//! without colouring its spectrum.

pub struct AllPassFilter {
    buffer: Vec<f32>,
    write_index: usize,
    delay: usize,
    coefficient: f32,
}

const COEFFICIENT: f32 = 0.7;

impl AllPassFilter {
    pub fn new(max_delay: usize, delay_samples: usize) -> Self {
        AllPassFilter {
            buffer: vec![0.0; max_delay.max(1)],
            write_index: 0,
            delay: delay_samples.min(max_delay.max(1) - 1),
            coefficient: COEFFICIENT,
        }
    }

    fn read_index(&self) -> usize {
        let len = self.buffer.len();
        (self.write_index + len - self.delay - 1) % len
    }

    pub fn process_sample(&mut self, input: f32) -> f32 {
        let delayed = self.buffer[self.read_index()];
        let output = -self.coefficient * input + delayed;
        self.buffer[self.write_index] = input + self.coefficient * output;
        self.write_index = (self.write_index + 1) % self.buffer.len();
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_dc_through_with_unity_gain_eventually() {
        let mut ap = AllPassFilter::new(16, 4);
        let mut last = 0.0;
        for _ in 0..200 {
            last = ap.process_sample(1.0);
        }
        assert!((last - 1.0).abs() < 0.05);
    }
}
