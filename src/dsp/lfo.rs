//! Low frequency oscillator feeding TVP/TVF/TVA modulation depth.
//!
//! The hardware supports (at least) five waveforms: a sine table for the
//! smooth shapes, a hard sign-of-sine square, and period-counted
//! sawtooth/triangle/random ramps. Each LFO instance is preceded by a fixed
//! delay and a linear fade-in before its waveform starts contributing.

const SINE_TABLE_SIZE: usize = 128;

fn sine_table() -> [f32; SINE_TABLE_SIZE] {
    let mut table = [0.0f32; SINE_TABLE_SIZE];
    for (i, slot) in table.iter_mut().enumerate() {
        *slot = (2.0 * std::f32::consts::PI * i as f32 / SINE_TABLE_SIZE as f32).sin();
    }
    table
}

/// One of the waveforms reverse-engineering has identified on SC-55
/// hardware. The exact generation method for each is unconfirmed; these
/// implementations follow the best current understanding (sine/square via
/// a phase-accumulated lookup table, the rest via a period counter).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Square,
    Sawtooth,
    Triangle,
    Random,
}

impl Waveform {
    pub fn from_rom_code(code: u8) -> Self {
        match code {
            0 => Waveform::Sine,
            1 => Waveform::Square,
            2 => Waveform::Sawtooth,
            3 => Waveform::Triangle,
            _ => Waveform::Random,
        }
    }
}

pub struct Lfo {
    sample_rate: f32,
    waveform: Waveform,
    phase: f32,
    period_index: f32,
    random_value: f32,
    rate_hz: f32,
    delay_samples: u32,
    delay_remaining: u32,
    fade_samples: u32,
    fade_elapsed: u32,
    last_value: f32,
    table: [f32; SINE_TABLE_SIZE],
}

impl Lfo {
    pub fn new(sample_rate: f32) -> Self {
        Lfo {
            sample_rate,
            waveform: Waveform::Sine,
            phase: 0.0,
            period_index: 0.0,
            random_value: 0.0,
            rate_hz: 0.0,
            delay_samples: 0,
            delay_remaining: 0,
            fade_samples: 0,
            fade_elapsed: 0,
            last_value: 0.0,
            table: sine_table(),
        }
    }

    /// Restarts the phase/delay/fade state. Called on note-on.
    pub fn trigger(&mut self, waveform: Waveform, rate_hz: f32, delay_seconds: f32, fade_seconds: f32) {
        self.waveform = waveform;
        self.phase = 0.0;
        self.period_index = 0.0;
        self.random_value = 0.0;
        self.rate_hz = rate_hz;
        self.delay_samples = (delay_seconds * self.sample_rate) as u32;
        self.delay_remaining = self.delay_samples;
        self.fade_samples = (fade_seconds * self.sample_rate) as u32;
        self.fade_elapsed = 0;
        self.last_value = 0.0;
    }

    pub fn set_rate(&mut self, rate_hz: f32) {
        self.rate_hz = rate_hz;
    }

    /// Advances one sample and returns the current LFO value in [-1, 1],
    /// already scaled by the delay/fade-in envelope. A rate of zero (or
    /// negative, after controller modulation) holds the last output rather
    /// than stopping dead, matching the hardware's behavior of freezing the
    /// waveform instead of collapsing it to its origin.
    pub fn tick(&mut self) -> f32 {
        if self.delay_remaining > 0 {
            self.delay_remaining -= 1;
            return 0.0;
        }

        if self.rate_hz <= 0.0 {
            return self.last_value;
        }

        let raw = match self.waveform {
            Waveform::Sine => self.tick_sine(),
            Waveform::Square => self.tick_square(),
            Waveform::Sawtooth => self.tick_sawtooth(),
            Waveform::Triangle => self.tick_triangle(),
            Waveform::Random => self.tick_random(),
        };

        let fade = if self.fade_samples == 0 {
            1.0
        } else {
            self.fade_elapsed = (self.fade_elapsed + 1).min(self.fade_samples);
            self.fade_elapsed as f32 / self.fade_samples as f32
        };

        let value = raw * fade;
        self.last_value = value;
        value
    }

    fn advance_sine_phase(&mut self) -> usize {
        let index = (self.phase * SINE_TABLE_SIZE as f32) as usize % SINE_TABLE_SIZE;
        self.phase += self.rate_hz / self.sample_rate;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }
        index
    }

    fn tick_sine(&mut self) -> f32 {
        let index = self.advance_sine_phase();
        self.table[index]
    }

    fn tick_square(&mut self) -> f32 {
        let index = self.advance_sine_phase();
        if self.table[index] > 0.0 {
            1.0
        } else {
            -1.0
        }
    }

    fn period_samples(&self) -> f32 {
        self.sample_rate / self.rate_hz
    }

    fn tick_sawtooth(&mut self) -> f32 {
        let period = self.period_samples();
        let pos = self.period_index % period;
        let value = (pos / period) * 2.0 - 1.0;
        self.advance_period_index(period);
        value
    }

    fn tick_triangle(&mut self) -> f32 {
        let period = self.period_samples();
        let pos = self.period_index / period;
        let value = if pos < 0.25 {
            pos * 4.0
        } else if pos < 0.75 {
            2.0 - pos * 4.0
        } else {
            pos * 4.0 - 4.0
        };
        self.advance_period_index(period);
        value
    }

    /// Observed on hardware as a square wave with random amplitude: the
    /// sign/level is re-rolled twice per period, at the start and at the
    /// 50%-phase crossing, and held steady in between.
    fn tick_random(&mut self) -> f32 {
        let period = self.period_samples();
        let pos1 = self.period_index / period;
        let pos2 = (self.period_index + 1.0) / period;

        if self.period_index == 0.0 || (pos1 <= 0.5 && pos2 > 0.5) {
            self.random_value = rand::random::<f32>() * 2.0 - 1.0;
        }

        let value = self.random_value;
        self.advance_period_index(period);
        value
    }

    fn advance_period_index(&mut self, period: f32) {
        self.period_index = if self.period_index + 1.0 < period {
            self.period_index + 1.0
        } else {
            0.0
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_holds_output_at_zero() {
        let mut lfo = Lfo::new(32000.0);
        lfo.trigger(Waveform::Sine, 5.0, 0.01, 0.0);
        for _ in 0..(0.01 * 32000.0) as usize {
            assert_eq!(lfo.tick(), 0.0);
        }
    }

    #[test]
    fn fade_in_ramps_amplitude_toward_full_scale() {
        let mut lfo = Lfo::new(32000.0);
        lfo.trigger(Waveform::Sine, 1.0, 0.0, 1.0);
        let early = lfo.tick().abs();
        for _ in 0..32000 {
            lfo.tick();
        }
        let late = lfo.tick().abs();
        assert!(late >= early);
    }

    #[test]
    fn oscillates_within_unit_range() {
        let mut lfo = Lfo::new(32000.0);
        lfo.trigger(Waveform::Sine, 10.0, 0.0, 0.0);
        for _ in 0..10000 {
            let v = lfo.tick();
            assert!((-1.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn square_wave_only_takes_extreme_values() {
        let mut lfo = Lfo::new(32000.0);
        lfo.trigger(Waveform::Square, 10.0, 0.0, 0.0);
        for _ in 0..1000 {
            let v = lfo.tick();
            assert!(v == 1.0 || v == -1.0);
        }
    }

    #[test]
    fn sawtooth_ramps_monotonically_within_a_period() {
        let mut lfo = Lfo::new(32000.0);
        lfo.trigger(Waveform::Sawtooth, 10.0, 0.0, 0.0);
        let first = lfo.tick();
        let second = lfo.tick();
        assert!(second > first);
    }

    #[test]
    fn zero_rate_holds_last_value() {
        let mut lfo = Lfo::new(32000.0);
        lfo.trigger(Waveform::Sine, 0.0, 0.0, 0.0);
        assert_eq!(lfo.tick(), 0.0);
        assert_eq!(lfo.tick(), 0.0);
    }
}
