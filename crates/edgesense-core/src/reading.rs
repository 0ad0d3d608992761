//! Latest-observation shared state between the sampler and the reporter.

use core::cell::Cell;

use critical_section::Mutex;

/// One paired temperature/humidity observation in reporting units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Reading {
    /// Temperature in degrees Fahrenheit.
    pub temperature_f: f32,
    /// Relative humidity in percent.
    pub relative_humidity: f32,
}

impl Reading {
    /// Convert a Celsius measurement into reporting units.
    pub fn from_celsius(temperature_c: f32, relative_humidity: f32) -> Self {
        Self {
            temperature_f: temperature_c * 9.0 / 5.0 + 32.0,
            relative_humidity,
        }
    }
}

/// Single-writer/single-reader cell holding the most recent reading.
///
/// The sampler replaces the stored pair as one unit; the reporter only ever
/// observes the previous complete pair or the new complete pair, never a
/// mix. Created unset and stays unset until the first successful sensor
/// read, so the reporter can tell "no data yet" from a real observation.
pub struct ReadingCell {
    latest: Mutex<Cell<Option<Reading>>>,
}

impl ReadingCell {
    pub const fn new() -> Self {
        Self {
            latest: Mutex::new(Cell::new(None)),
        }
    }

    /// Atomically replace the stored pair.
    pub fn publish(&self, reading: Reading) {
        critical_section::with(|cs| self.latest.borrow(cs).set(Some(reading)));
    }

    /// Latest complete pair, or `None` before the first successful sample.
    pub fn latest(&self) -> Option<Reading> {
        critical_section::with(|cs| self.latest.borrow(cs).get())
    }
}

impl Default for ReadingCell {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn celsius_to_fahrenheit_conversion() {
        let reading = Reading::from_celsius(20.0, 55.5);
        assert_eq!(reading.temperature_f, 68.0);
        assert_eq!(reading.relative_humidity, 55.5);
    }

    #[test]
    fn freezing_point_converts_to_32f() {
        assert_eq!(Reading::from_celsius(0.0, 40.0).temperature_f, 32.0);
    }

    #[test]
    fn cell_starts_unset() {
        let cell = ReadingCell::new();
        assert_eq!(cell.latest(), None);
    }

    #[test]
    fn publish_replaces_the_whole_pair() {
        let cell = ReadingCell::new();
        cell.publish(Reading::from_celsius(20.0, 50.0));
        cell.publish(Reading::from_celsius(25.0, 61.0));

        let latest = cell.latest().unwrap();
        assert_eq!(latest.temperature_f, 77.0);
        assert_eq!(latest.relative_humidity, 61.0);
    }
}
