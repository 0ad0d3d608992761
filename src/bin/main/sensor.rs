//! SHT41 adapter for the sensor sampler.

use edgesense_core::{Measurement, SensorSource};
use esp_hal::Blocking;
use esp_hal::delay::Delay;
use esp_hal::i2c::master::I2c;
use log::{info, warn};
use sht4x::{Precision, Sht4x};

pub(super) struct Sht41Source<'d> {
    sensor: Sht4x<I2c<'d, Blocking>>,
    delay: Delay,
}

impl<'d> Sht41Source<'d> {
    pub(super) fn new(i2c: I2c<'d, Blocking>) -> Self {
        Self {
            sensor: Sht4x::new(i2c),
            delay: Delay::new(),
        }
    }

    /// Log the factory serial once at boot to confirm the part is wired up.
    /// A failure here is not fatal; the sampler keeps retrying reads.
    pub(super) fn log_serial_number(&mut self) {
        match self.sensor.serial_number(&mut self.delay) {
            Ok(serial) => info!("sht41: found, serial=0x{serial:08x}"),
            Err(err) => warn!("sht41: serial number read failed: {:?}", err),
        }
    }
}

impl SensorSource for Sht41Source<'_> {
    type Error = sht4x::Error<esp_hal::i2c::master::Error>;

    fn read(&mut self) -> Result<Measurement, Self::Error> {
        // High precision, heater off: the sensor sits indoors and the
        // cadence is far too slow for self-heating to matter.
        let measurement = self.sensor.measure(Precision::High, &mut self.delay)?;
        Ok(Measurement {
            temperature_c: measurement.temperature_c,
            relative_humidity: measurement.relative_humidity,
        })
    }
}
