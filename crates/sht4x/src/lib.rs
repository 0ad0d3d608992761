#![cfg_attr(not(test), no_std)]

//! Sensirion SHT4x temperature/humidity sensor driver (blocking I2C).

pub mod protocol;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

/// Driver errors.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Error<E> {
    /// I2C transaction failed.
    I2c(E),
    /// Response failed checksum validation.
    Crc,
}

/// Measurement repeatability. Higher precision takes longer and draws more
/// current; none of the variants drive the heater.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Precision {
    Low,
    Medium,
    High,
}

impl Precision {
    const fn command(self) -> u8 {
        match self {
            Self::Low => protocol::CMD_MEASURE_LOW_PRECISION,
            Self::Medium => protocol::CMD_MEASURE_MEDIUM_PRECISION,
            Self::High => protocol::CMD_MEASURE_HIGH_PRECISION,
        }
    }

    /// Worst-case measurement duration per the datasheet.
    const fn measurement_delay_us(self) -> u32 {
        match self {
            Self::Low => 1_700,
            Self::Medium => 4_500,
            Self::High => 8_300,
        }
    }
}

/// One converted measurement.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Measurement {
    /// Temperature in degrees Celsius.
    pub temperature_c: f32,
    /// Relative humidity in percent, clamped to 0..=100.
    pub relative_humidity: f32,
}

/// SHT4x driver.
#[derive(Debug)]
pub struct Sht4x<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C, E> Sht4x<I2C>
where
    I2C: I2c<Error = E>,
{
    /// Driver at the default address 0x44.
    pub const fn new(i2c: I2C) -> Self {
        Self::with_address(i2c, protocol::DEFAULT_ADDRESS)
    }

    pub const fn with_address(i2c: I2C, address: u8) -> Self {
        Self { i2c, address }
    }

    /// Factory-programmed serial number.
    pub fn serial_number(&mut self, delay: &mut impl DelayNs) -> Result<u32, Error<E>> {
        let (high, low) = self.command_response(protocol::CMD_READ_SERIAL, 1_000, delay)?;
        Ok((high as u32) << 16 | low as u32)
    }

    /// One temperature/humidity measurement at the requested precision.
    pub fn measure(
        &mut self,
        precision: Precision,
        delay: &mut impl DelayNs,
    ) -> Result<Measurement, Error<E>> {
        let (raw_temperature, raw_humidity) = self.command_response(
            precision.command(),
            precision.measurement_delay_us(),
            delay,
        )?;

        Ok(Measurement {
            temperature_c: protocol::convert_temperature(raw_temperature),
            relative_humidity: protocol::convert_humidity(raw_humidity),
        })
    }

    /// Soft-reset the sensor. Ready again after ~1 ms.
    pub fn soft_reset(&mut self, delay: &mut impl DelayNs) -> Result<(), Error<E>> {
        self.i2c
            .write(self.address, &[protocol::CMD_SOFT_RESET])
            .map_err(Error::I2c)?;
        delay.delay_us(1_000);
        Ok(())
    }

    fn command_response(
        &mut self,
        command: u8,
        wait_us: u32,
        delay: &mut impl DelayNs,
    ) -> Result<(u16, u16), Error<E>> {
        self.i2c
            .write(self.address, &[command])
            .map_err(Error::I2c)?;
        delay.delay_us(wait_us);

        let mut response = [0u8; protocol::RESPONSE_SIZE];
        self.i2c
            .read(self.address, &mut response)
            .map_err(Error::I2c)?;

        protocol::parse_words(&response).ok_or(Error::Crc)
    }
}
