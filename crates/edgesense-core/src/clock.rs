//! Periodic wall-clock synchronization.
//!
//! Keeps system time accurate for any timestamping the upstream may rely
//! on. Sync failures are logged and retried on the next cycle; they never
//! block or crash another task.

use core::fmt::{self, Debug};

use log::{info, warn};

use crate::link::LinkStatus;

/// Fixed interval between sync attempts.
pub const SYNC_INTERVAL_SECS: u64 = 3600;
/// Poll interval while waiting for the network to first come up.
pub const NETWORK_POLL_SECS: u64 = 1;

/// Source of wall-clock time, e.g. an SNTP client.
#[allow(async_fn_in_trait)]
pub trait TimeSource {
    type Error: Debug;

    /// Current Unix time in seconds.
    async fn now(&mut self) -> Result<u64, Self::Error>;
}

/// Civil date-time after applying the configured timezone offset.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CivilTime {
    pub year: i32,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl CivilTime {
    /// Proleptic-Gregorian conversion from seconds since the Unix epoch.
    pub fn from_unix(secs: i64) -> Self {
        let days = secs.div_euclid(86_400);
        let rem = secs.rem_euclid(86_400);

        let z = days + 719_468;
        let era = z.div_euclid(146_097);
        let doe = z.rem_euclid(146_097);
        let yoe = (doe - doe / 1_460 + doe / 36_524 - doe / 146_096) / 365;
        let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
        let mp = (5 * doy + 2) / 153;
        let day = (doy - (153 * mp + 2) / 5 + 1) as u8;
        let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u8;
        let mut year = (yoe + era * 400) as i32;
        if month <= 2 {
            year += 1;
        }

        Self {
            year,
            month,
            day,
            hour: (rem / 3_600) as u8,
            minute: (rem % 3_600 / 60) as u8,
            second: (rem % 60) as u8,
        }
    }
}

impl fmt::Display for CivilTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{:02}-{:02} {:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

/// What one sync cycle did, and how long to wait before the next.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ClockOutcome {
    /// Network has never been up; poll again shortly.
    WaitingForNetwork,
    Synced(CivilTime),
    /// Sync failed; retried on the next regular cycle.
    Failed,
}

impl ClockOutcome {
    pub const fn wait_secs(self) -> u64 {
        match self {
            Self::WaitingForNetwork => NETWORK_POLL_SECS,
            Self::Synced(_) | Self::Failed => SYNC_INTERVAL_SECS,
        }
    }
}

/// Hourly wall-clock sync with a fixed timezone offset.
///
/// Gates on connectivity only before the first attempt; once the network
/// has been seen up, the cadence continues even through later drops and the
/// resulting failures are just logged.
pub struct ClockSync {
    tz_offset_secs: i32,
    network_seen: bool,
}

impl ClockSync {
    pub const fn new(tz_offset_secs: i32) -> Self {
        Self {
            tz_offset_secs,
            network_seen: false,
        }
    }

    pub async fn poll<T: TimeSource>(&mut self, source: &mut T, status: &LinkStatus) -> ClockOutcome {
        if !self.network_seen {
            if !status.is_connected() {
                return ClockOutcome::WaitingForNetwork;
            }
            self.network_seen = true;
        }

        match source.now().await {
            Ok(epoch) => {
                let local = CivilTime::from_unix(epoch as i64 + self.tz_offset_secs as i64);
                info!("clock: synced, local time {}", local);
                ClockOutcome::Synced(local)
            }
            Err(err) => {
                warn!("clock: sync failed: {:?}", err);
                ClockOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_futures::block_on;

    struct FixedTime(Result<u64, &'static str>);

    impl TimeSource for FixedTime {
        type Error = &'static str;

        async fn now(&mut self) -> Result<u64, Self::Error> {
            self.0
        }
    }

    #[test]
    fn civil_conversion_matches_known_dates() {
        assert_eq!(
            CivilTime::from_unix(0),
            CivilTime {
                year: 1970,
                month: 1,
                day: 1,
                hour: 0,
                minute: 0,
                second: 0
            }
        );
        // 2023-07-01 12:34:56 UTC
        assert_eq!(
            CivilTime::from_unix(1_688_214_896),
            CivilTime {
                year: 2023,
                month: 7,
                day: 1,
                hour: 12,
                minute: 34,
                second: 56
            }
        );
        // Leap day: 2024-02-29 00:00:00 UTC
        assert_eq!(
            CivilTime::from_unix(1_709_164_800),
            CivilTime {
                year: 2024,
                month: 2,
                day: 29,
                hour: 0,
                minute: 0,
                second: 0
            }
        );
    }

    #[test]
    fn formats_with_zero_padding() {
        let t = CivilTime::from_unix(1_688_214_896);
        let formatted = format!("{t}");
        assert_eq!(formatted, "2023-07-01 12:34:56");
    }

    #[test]
    fn waits_for_network_before_first_sync_only() {
        let status = LinkStatus::new();
        let mut sync = ClockSync::new(0);
        let mut source = FixedTime(Ok(1_688_214_896));

        let outcome = block_on(sync.poll(&mut source, &status));
        assert_eq!(outcome, ClockOutcome::WaitingForNetwork);
        assert_eq!(outcome.wait_secs(), NETWORK_POLL_SECS);

        mark_connected(&status);
        assert!(matches!(
            block_on(sync.poll(&mut source, &status)),
            ClockOutcome::Synced(_)
        ));

        // A later drop does not re-gate the cadence.
        let status = LinkStatus::new();
        assert!(matches!(
            block_on(sync.poll(&mut source, &status)),
            ClockOutcome::Synced(_)
        ));
    }

    #[test]
    fn applies_timezone_offset() {
        let status = LinkStatus::new();
        mark_connected(&status);
        let mut sync = ClockSync::new(-7 * 3600);
        let mut source = FixedTime(Ok(1_688_214_896));

        match block_on(sync.poll(&mut source, &status)) {
            ClockOutcome::Synced(local) => {
                assert_eq!(local.hour, 5);
                assert_eq!(local.minute, 34);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn failure_keeps_the_hourly_cadence() {
        let status = LinkStatus::new();
        mark_connected(&status);
        let mut sync = ClockSync::new(0);
        let mut source = FixedTime(Err("timeout"));

        let outcome = block_on(sync.poll(&mut source, &status));
        assert_eq!(outcome, ClockOutcome::Failed);
        assert_eq!(outcome.wait_secs(), SYNC_INTERVAL_SECS);
    }

    fn mark_connected(status: &LinkStatus) {
        // Exercise the supervisor-owned write path without a supervisor.
        use crate::link::{LinkSupervisor, NetworkLink};

        struct AlwaysUp;
        impl NetworkLink for AlwaysUp {
            type Error = &'static str;
            fn is_connected(&self) -> bool {
                true
            }
            async fn connect(&mut self) -> Result<(), Self::Error> {
                Ok(())
            }
        }

        let _ = block_on(LinkSupervisor::new().poll(&mut AlwaysUp, status));
    }
}
