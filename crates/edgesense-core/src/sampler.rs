//! Fixed-cadence sensor polling into the shared reading cell.

use core::fmt::Debug;

use log::{debug, warn};

use crate::config::Cadence;
use crate::reading::{Reading, ReadingCell};

/// One raw sensor observation in sensor units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Measurement {
    pub temperature_c: f32,
    pub relative_humidity: f32,
}

/// Pollable temperature/humidity sensor.
pub trait SensorSource {
    type Error: Debug;

    fn read(&mut self) -> Result<Measurement, Self::Error>;
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SampleOutcome {
    Published(Reading),
    /// Read failed; the previous value stays in place. Stale-but-valid
    /// data beats erasing the last good reading.
    SensorError,
}

/// Polls the sensor once per cycle and publishes converted readings.
pub struct Sampler {
    interval_secs: u32,
}

impl Sampler {
    pub const fn new(cadence: &Cadence) -> Self {
        Self {
            interval_secs: cadence.sampling_interval_secs,
        }
    }

    /// Seconds to sleep after every cycle, success or not.
    pub const fn interval_secs(&self) -> u32 {
        self.interval_secs
    }

    pub fn poll<S: SensorSource>(&mut self, sensor: &mut S, readings: &ReadingCell) -> SampleOutcome {
        match sensor.read() {
            Ok(measurement) => {
                let reading =
                    Reading::from_celsius(measurement.temperature_c, measurement.relative_humidity);
                readings.publish(reading);
                debug!(
                    "sensor: temperature_f={} relative_humidity={}",
                    reading.temperature_f, reading.relative_humidity
                );
                SampleOutcome::Published(reading)
            }
            Err(err) => {
                warn!("sensor: read failed: {:?}", err);
                SampleOutcome::SensorError
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ScriptedSensor<'a> {
        outcomes: &'a [Result<Measurement, &'static str>],
        cursor: usize,
    }

    impl<'a> ScriptedSensor<'a> {
        const fn new(outcomes: &'a [Result<Measurement, &'static str>]) -> Self {
            Self { outcomes, cursor: 0 }
        }
    }

    impl SensorSource for ScriptedSensor<'_> {
        type Error = &'static str;

        fn read(&mut self) -> Result<Measurement, Self::Error> {
            let outcome = self.outcomes[self.cursor];
            self.cursor += 1;
            outcome
        }
    }

    fn sampler() -> Sampler {
        Sampler::new(&Cadence {
            sampling_interval_secs: 30,
            reporting_interval_secs: 300,
        })
    }

    const fn measurement(temperature_c: f32, relative_humidity: f32) -> Measurement {
        Measurement {
            temperature_c,
            relative_humidity,
        }
    }

    #[test]
    fn successful_read_publishes_converted_pair() {
        let cell = ReadingCell::new();
        let outcomes = [Ok(measurement(20.0, 55.0))];
        let mut sensor = ScriptedSensor::new(&outcomes);

        let outcome = sampler().poll(&mut sensor, &cell);

        assert!(matches!(outcome, SampleOutcome::Published(_)));
        let latest = cell.latest().unwrap();
        assert_eq!(latest.temperature_f, 68.0);
        assert_eq!(latest.relative_humidity, 55.0);
    }

    #[test]
    fn failed_read_leaves_previous_value_in_place() {
        let cell = ReadingCell::new();
        let outcomes = [Ok(measurement(20.0, 55.0)), Err("i2c nack")];
        let mut sensor = ScriptedSensor::new(&outcomes);
        let mut sampler = sampler();

        sampler.poll(&mut sensor, &cell);
        let outcome = sampler.poll(&mut sensor, &cell);

        assert_eq!(outcome, SampleOutcome::SensorError);
        assert_eq!(cell.latest().unwrap().temperature_f, 68.0);
    }

    #[test]
    fn failed_first_read_keeps_the_cell_unset() {
        let cell = ReadingCell::new();
        let mut sensor = ScriptedSensor::new(&[Err("sensor not ready")]);

        sampler().poll(&mut sensor, &cell);

        assert_eq!(cell.latest(), None);
    }

    #[test]
    fn recovery_after_a_failed_cycle_publishes_the_new_value() {
        // Error on cycle K, success on K+1: the cell reflects K+1.
        let cell = ReadingCell::new();
        let outcomes = [
            Ok(measurement(20.0, 55.0)),
            Err("crc mismatch"),
            Ok(measurement(25.0, 60.0)),
        ];
        let mut sensor = ScriptedSensor::new(&outcomes);
        let mut sampler = sampler();

        for _ in 0..3 {
            sampler.poll(&mut sensor, &cell);
        }

        let latest = cell.latest().unwrap();
        assert_eq!(latest.temperature_f, 77.0);
        assert_eq!(latest.relative_humidity, 60.0);
    }
}
