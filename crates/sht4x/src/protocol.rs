//! Wire-level protocol helpers for the Sensirion SHT4x.

/// Default I2C address for SHT40/41/45 parts.
pub const DEFAULT_ADDRESS: u8 = 0x44;

/// High precision measurement, heater off.
pub const CMD_MEASURE_HIGH_PRECISION: u8 = 0xFD;
/// Medium precision measurement, heater off.
pub const CMD_MEASURE_MEDIUM_PRECISION: u8 = 0xF6;
/// Low precision measurement, heater off.
pub const CMD_MEASURE_LOW_PRECISION: u8 = 0xE0;
/// Read the factory-programmed serial number.
pub const CMD_READ_SERIAL: u8 = 0x89;
/// Soft reset.
pub const CMD_SOFT_RESET: u8 = 0x94;

/// Response size for measurement and serial reads.
///
/// Layout: two 16-bit big-endian words, each followed by its CRC-8.
pub const RESPONSE_SIZE: usize = 6;

/// Sensirion CRC-8: polynomial 0x31, init 0xFF, no reflection.
pub fn crc8(data: &[u8]) -> u8 {
    let mut crc: u8 = 0xFF;
    for &byte in data {
        crc ^= byte;
        for _ in 0..8 {
            crc = if crc & 0x80 != 0 {
                (crc << 1) ^ 0x31
            } else {
                crc << 1
            };
        }
    }
    crc
}

/// Splits a 6-byte response into its two words, validating both CRCs.
///
/// Returns `None` when either checksum fails.
pub fn parse_words(response: &[u8; RESPONSE_SIZE]) -> Option<(u16, u16)> {
    if crc8(&response[0..2]) != response[2] || crc8(&response[3..5]) != response[5] {
        return None;
    }
    let first = u16::from_be_bytes([response[0], response[1]]);
    let second = u16::from_be_bytes([response[3], response[4]]);
    Some((first, second))
}

/// Raw temperature ticks to degrees Celsius (datasheet section 4.6).
pub fn convert_temperature(raw: u16) -> f32 {
    -45.0 + 175.0 * raw as f32 / 65_535.0
}

/// Raw humidity ticks to percent relative humidity, clamped to the
/// physically meaningful range.
pub fn convert_humidity(raw: u16) -> f32 {
    (-6.0 + 125.0 * raw as f32 / 65_535.0).clamp(0.0, 100.0)
}
