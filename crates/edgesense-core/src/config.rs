//! Startup configuration: cadence intervals and the upload destination.
//!
//! Everything here is parsed once at boot and immutable afterwards. A
//! malformed value is a fatal startup error, never a runtime one.

use core::fmt::{self, Write};

use heapless::String;

pub const MAX_HOST_BYTES: usize = 64;
pub const MAX_TARGET_BYTES: usize = 192;

/// Upstream expects this content type even though the body is
/// line-protocol text, not JSON.
pub const CONTENT_TYPE: &str = "application/json";

/// Authorization scheme used by the destination database.
pub const AUTH_SCHEME: &str = "Token";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConfigError {
    /// Interval value missing, non-numeric, or zero.
    InvalidInterval(&'static str),
    /// Destination URL scheme is not plain `http`.
    UnsupportedScheme,
    /// Destination URL has an empty host.
    MissingHost,
    /// Destination URL port is not a valid number.
    InvalidPort,
    /// A configured value does not fit its buffer.
    ValueTooLong(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidInterval(name) => {
                write!(f, "{name} must be a positive whole number of seconds")
            }
            Self::UnsupportedScheme => f.write_str("destination URL must use http://"),
            Self::MissingHost => f.write_str("destination URL has no host"),
            Self::InvalidPort => f.write_str("destination URL port is not a number"),
            Self::ValueTooLong(name) => write!(f, "{name} is too long"),
        }
    }
}

/// Sampling and reporting cadence. Both values are required; there is no
/// default cadence to fall back to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Cadence {
    pub sampling_interval_secs: u32,
    pub reporting_interval_secs: u32,
}

impl Cadence {
    pub fn parse(sampling: &str, reporting: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            sampling_interval_secs: parse_interval("SENSOR_SAMPLING_INTERVAL", sampling)?,
            reporting_interval_secs: parse_interval("REPORTING_INTERVAL_SECONDS", reporting)?,
        })
    }
}

fn parse_interval(name: &'static str, raw: &str) -> Result<u32, ConfigError> {
    match raw.trim().parse::<u32>() {
        Ok(secs) if secs > 0 => Ok(secs),
        _ => Err(ConfigError::InvalidInterval(name)),
    }
}

/// Immutable destination for line-protocol uploads, resolved once at boot
/// from the base URL plus org/bucket/token settings.
#[derive(Debug)]
pub struct UploadTarget {
    pub host: String<MAX_HOST_BYTES>,
    pub port: u16,
    /// Request target including the org/bucket query, e.g.
    /// `/api/v2/write?org=home&bucket=sensors`.
    pub request_target: String<MAX_TARGET_BYTES>,
    pub token: &'static str,
}

impl UploadTarget {
    pub fn parse(
        base_url: &str,
        org: &str,
        bucket: &str,
        token: &'static str,
    ) -> Result<Self, ConfigError> {
        let rest = base_url
            .strip_prefix("http://")
            .ok_or(ConfigError::UnsupportedScheme)?;

        let (authority, path) = match rest.find('/') {
            Some(idx) => (&rest[..idx], &rest[idx..]),
            None => (rest, "/"),
        };

        let (host, port) = match authority.split_once(':') {
            Some((host, port)) => (
                host,
                port.parse::<u16>().map_err(|_| ConfigError::InvalidPort)?,
            ),
            None => (authority, 80),
        };
        if host.is_empty() {
            return Err(ConfigError::MissingHost);
        }

        let host: String<MAX_HOST_BYTES> = host
            .try_into()
            .map_err(|_| ConfigError::ValueTooLong("destination host"))?;

        let mut request_target = String::new();
        write!(request_target, "{path}?org={org}&bucket={bucket}")
            .map_err(|_| ConfigError::ValueTooLong("destination URL"))?;

        Ok(Self {
            host,
            port,
            request_target,
            token,
        })
    }
}
