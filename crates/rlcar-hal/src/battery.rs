//! Battery voltage sampling.

use rlcar_types::{BatteryCurve, BatterySample};

/// A battery gauge refreshed on demand.
pub trait BatterySampler: Send {
    /// Take a fresh measurement.
    fn read(&mut self);

    /// Pack voltage of the last [`read`][Self::read].
    fn volts(&self) -> f32;

    /// State of charge (`0..=100`) of the last [`read`][Self::read].
    fn percent(&self) -> f32;

    fn sample(&self) -> BatterySample {
        BatterySample {
            volts: self.volts(),
            percent: self.percent(),
        }
    }
}

/// Calibrated ADC input, in millivolts at the pin.
pub trait MillivoltSource: Send {
    fn read_millivolts(&mut self) -> u32;
}

/// Resistor divider between the pack and the ADC pin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Divider {
    /// Resistor between the pack and the ADC pin.
    pub r_battery_ohms: f32,
    /// Resistor between the ADC pin and ground.
    pub r_ground_ohms: f32,
}

impl Divider {
    /// Pack voltage per volt measured at the pin.
    pub fn ratio(&self) -> f32 {
        (self.r_battery_ohms + self.r_ground_ohms) / self.r_ground_ohms
    }
}

/// Averages several ADC readings behind a divider and maps them onto a
/// [`BatteryCurve`].
pub struct DividerBattery<S> {
    source: S,
    divider: Divider,
    curve: BatteryCurve,
    samples: u8,
    last: BatterySample,
}

impl<S: MillivoltSource> DividerBattery<S> {
    pub fn new(source: S, divider: Divider, curve: BatteryCurve, samples: u8) -> Self {
        Self {
            source,
            divider,
            curve,
            samples: samples.max(1),
            last: BatterySample::default(),
        }
    }
}

impl<S: MillivoltSource> BatterySampler for DividerBattery<S> {
    fn read(&mut self) {
        let total: u64 = (0..self.samples)
            .map(|_| u64::from(self.source.read_millivolts()))
            .sum();
        let pin_volts = total as f32 / f32::from(self.samples) / 1000.0;
        let volts = pin_volts * self.divider.ratio();
        self.last = BatterySample {
            volts,
            percent: self.curve.percent(volts),
        };
    }

    fn volts(&self) -> f32 {
        self.last.volts
    }

    fn percent(&self) -> f32 {
        self.last.percent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Sequence(Vec<u32>, usize);

    impl MillivoltSource for Sequence {
        fn read_millivolts(&mut self) -> u32 {
            let v = self.0[self.1 % self.0.len()];
            self.1 += 1;
            v
        }
    }

    const HALF: Divider = Divider {
        r_battery_ohms: 100_000.0,
        r_ground_ohms: 100_000.0,
    };

    #[test]
    fn averages_and_scales_by_divider() {
        let source = Sequence(vec![1900, 2100], 0);
        let mut battery = DividerBattery::new(source, HALF, BatteryCurve::new(3.0, 5.0), 4);
        battery.read();
        assert!((battery.volts() - 4.0).abs() < 1e-4);
        assert!((battery.percent() - 50.0).abs() < 1e-3);
    }

    #[test]
    fn values_hold_until_next_read() {
        let curve = BatteryCurve::new(3.3, 4.2);
        let mut battery = DividerBattery::new(Sequence(vec![2100], 0), HALF, curve, 1);
        assert_eq!(battery.sample(), BatterySample::default());
        battery.read();
        assert_eq!(battery.percent(), 100.0);
    }

    #[test]
    fn zero_samples_still_reads_once() {
        let curve = BatteryCurve::default();
        let mut battery = DividerBattery::new(Sequence(vec![1000], 0), HALF, curve, 0);
        battery.read();
        assert!((battery.volts() - 2.0).abs() < 1e-4);
        assert_eq!(battery.percent(), 0.0);
    }
}
