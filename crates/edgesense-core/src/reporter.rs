//! Periodic upload of the latest reading to the time-series database.
//!
//! Every failure mode here is recoverable: a dropped request, a rejected
//! status, or an empty cell just moves the loop on to the next cycle. There
//! is no retry-within-cycle and no buffering of unsent points; a missed
//! interval's data is lost by design.

use core::fmt::{Debug, Write};

use heapless::String;
use log::{info, warn};

use crate::link::LinkStatus;
use crate::reading::{Reading, ReadingCell};

/// Payload buffer size; generous for one measurement line.
pub const PAYLOAD_BYTES: usize = 192;
/// How much of a rejection body is kept for the failure log.
pub const BODY_EXCERPT_BYTES: usize = 192;

/// Pause after task start before the first upload, so sensor power-on
/// transients settle before any value is shipped.
pub const WARMUP_DELAY_SECS: u64 = 60;
/// Poll interval while waiting for the network to first come up.
pub const NETWORK_POLL_SECS: u64 = 1;

/// The upstream answers a successful write with 204 and an empty body.
pub const STATUS_NO_CONTENT: u16 = 204;

/// Outcome of one upload attempt as seen from the transport.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UploadResponse {
    pub status: u16,
    /// Leading bytes of the response body, for failure logs.
    pub body: String<BODY_EXCERPT_BYTES>,
}

impl UploadResponse {
    pub fn is_success(&self) -> bool {
        self.status == STATUS_NO_CONTENT
    }
}

/// One long-lived upload session, constructed before the report loop starts.
#[allow(async_fn_in_trait)]
pub trait Uploader {
    type Error: Debug;

    async fn send(&mut self, body: &str) -> Result<UploadResponse, Self::Error>;
}

/// Line-protocol body for one reading:
/// `<measurement>,device=<tag> temperature=<T>,relative_humidity=<H>`.
pub fn line_protocol(
    measurement: &str,
    device_tag: &str,
    reading: Reading,
) -> Result<String<PAYLOAD_BYTES>, core::fmt::Error> {
    let mut body = String::new();
    write!(
        body,
        "{},device={} temperature={},relative_humidity={}",
        measurement, device_tag, reading.temperature_f, reading.relative_humidity
    )?;
    Ok(body)
}

/// What one report cycle did, and how long to wait before the next.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReportOutcome {
    /// Still inside the post-boot warm-up window; nothing is sent.
    WarmingUp,
    /// Network has never been up; poll again shortly.
    WaitingForNetwork,
    /// No complete reading yet; nothing to send is not an error.
    NothingToSend,
    Sent,
    /// Upstream answered with a non-204 status; the point is dropped.
    Rejected(u16),
    /// Transport-level failure; the point is dropped.
    TransportError,
    /// Measurement/tag configuration overflows the payload buffer.
    PayloadOverflow,
}

impl ReportOutcome {
    pub const fn wait_secs(self, reporting_interval_secs: u32) -> u64 {
        match self {
            Self::WarmingUp | Self::WaitingForNetwork => NETWORK_POLL_SECS,
            _ => reporting_interval_secs as u64,
        }
    }
}

/// Ships the latest complete reading on a fixed cadence.
pub struct Reporter {
    measurement: &'static str,
    device_tag: &'static str,
    warmup_until_ms: Option<u64>,
    network_seen: bool,
}

impl Reporter {
    pub const fn new(measurement: &'static str, device_tag: &'static str) -> Self {
        Self {
            measurement,
            device_tag,
            warmup_until_ms: None,
            network_seen: false,
        }
    }

    /// One report cycle. `now_ms` is milliseconds since boot; the first call
    /// anchors the warm-up window.
    pub async fn poll<U: Uploader>(
        &mut self,
        uploader: &mut U,
        readings: &ReadingCell,
        status: &LinkStatus,
        now_ms: u64,
    ) -> ReportOutcome {
        let warmup_until = *self
            .warmup_until_ms
            .get_or_insert(now_ms + WARMUP_DELAY_SECS * 1_000);
        if now_ms < warmup_until {
            return ReportOutcome::WarmingUp;
        }

        if !self.network_seen {
            if !status.is_connected() {
                return ReportOutcome::WaitingForNetwork;
            }
            self.network_seen = true;
        }

        let Some(reading) = readings.latest() else {
            return ReportOutcome::NothingToSend;
        };

        let Ok(body) = line_protocol(self.measurement, self.device_tag, reading) else {
            warn!("report: payload overflow, measurement/tag too long");
            return ReportOutcome::PayloadOverflow;
        };

        match uploader.send(&body).await {
            Ok(response) if response.is_success() => {
                info!("report: shipped to time-series database");
                ReportOutcome::Sent
            }
            Ok(response) => {
                warn!(
                    "report: upstream rejected status={} body={}",
                    response.status, response.body
                );
                ReportOutcome::Rejected(response.status)
            }
            Err(err) => {
                warn!("report: upload failed: {:?}", err);
                ReportOutcome::TransportError
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_futures::block_on;

    const WARMUP_MS: u64 = WARMUP_DELAY_SECS * 1_000;

    struct RecordingUploader {
        sent: Vec<std::string::String>,
        responses: Vec<Result<UploadResponse, &'static str>>,
    }

    impl RecordingUploader {
        fn answering(responses: Vec<Result<UploadResponse, &'static str>>) -> Self {
            Self {
                sent: Vec::new(),
                responses,
            }
        }

        fn always_204() -> Self {
            Self::answering(vec![])
        }
    }

    impl Uploader for RecordingUploader {
        type Error = &'static str;

        async fn send(&mut self, body: &str) -> Result<UploadResponse, Self::Error> {
            self.sent.push(body.into());
            if self.responses.is_empty() {
                return Ok(UploadResponse {
                    status: STATUS_NO_CONTENT,
                    body: String::new(),
                });
            }
            self.responses.remove(0)
        }
    }

    fn connected_status() -> LinkStatus {
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

        let status = LinkStatus::new();
        let _ = block_on(LinkSupervisor::new().poll(&mut AlwaysUp, &status));
        status
    }

    fn cell_with(temperature_c: f32, relative_humidity: f32) -> ReadingCell {
        let cell = ReadingCell::new();
        cell.publish(Reading::from_celsius(temperature_c, relative_humidity));
        cell
    }

    #[test]
    fn payload_matches_the_line_protocol_shape() {
        let body = line_protocol("office", "sht41", Reading::from_celsius(20.0, 55.5)).unwrap();
        assert_eq!(
            body.as_str(),
            "office,device=sht41 temperature=68,relative_humidity=55.5"
        );
    }

    #[test]
    fn nothing_is_sent_during_warmup() {
        let status = connected_status();
        let cell = cell_with(20.0, 50.0);
        let mut uploader = RecordingUploader::always_204();
        let mut reporter = Reporter::new("office", "sht41");

        assert_eq!(
            block_on(reporter.poll(&mut uploader, &cell, &status, 0)),
            ReportOutcome::WarmingUp
        );
        assert_eq!(
            block_on(reporter.poll(&mut uploader, &cell, &status, WARMUP_MS - 1)),
            ReportOutcome::WarmingUp
        );
        assert!(uploader.sent.is_empty());

        assert_eq!(
            block_on(reporter.poll(&mut uploader, &cell, &status, WARMUP_MS)),
            ReportOutcome::Sent
        );
        assert_eq!(uploader.sent.len(), 1);
    }

    #[test]
    fn unset_cell_sends_nothing() {
        let status = connected_status();
        let cell = ReadingCell::new();
        let mut uploader = RecordingUploader::always_204();
        let mut reporter = Reporter::new("office", "sht41");

        let outcome = block_on(reporter.poll(&mut uploader, &cell, &status, WARMUP_MS));
        assert_eq!(outcome, ReportOutcome::NothingToSend);
        assert!(uploader.sent.is_empty());
        // Skipped cycles still honor the reporting cadence.
        assert_eq!(outcome.wait_secs(300), 300);
    }

    #[test]
    fn waits_for_network_before_first_send_only() {
        let status = LinkStatus::new();
        let cell = cell_with(20.0, 50.0);
        let mut uploader = RecordingUploader::always_204();
        let mut reporter = Reporter::new("office", "sht41");

        let outcome = block_on(reporter.poll(&mut uploader, &cell, &status, WARMUP_MS));
        assert_eq!(outcome, ReportOutcome::WaitingForNetwork);
        assert_eq!(outcome.wait_secs(300), NETWORK_POLL_SECS);
        assert!(uploader.sent.is_empty());

        let status = connected_status();
        assert_eq!(
            block_on(reporter.poll(&mut uploader, &cell, &status, WARMUP_MS + 1_000)),
            ReportOutcome::Sent
        );
    }

    #[test]
    fn rejection_does_not_stop_the_loop() {
        let status = connected_status();
        let cell = cell_with(20.0, 50.0);
        let mut excerpt = String::new();
        excerpt.push_str("bucket not found").unwrap();
        let mut uploader = RecordingUploader::answering(vec![
            Ok(UploadResponse {
                status: 404,
                body: excerpt,
            }),
            Ok(UploadResponse {
                status: STATUS_NO_CONTENT,
                body: String::new(),
            }),
        ]);
        let mut reporter = Reporter::new("office", "sht41");

        assert_eq!(
            block_on(reporter.poll(&mut uploader, &cell, &status, WARMUP_MS)),
            ReportOutcome::Rejected(404)
        );
        assert_eq!(
            block_on(reporter.poll(&mut uploader, &cell, &status, WARMUP_MS + 300_000)),
            ReportOutcome::Sent
        );
        assert_eq!(uploader.sent.len(), 2);
    }

    #[test]
    fn transport_error_drops_the_point_and_continues() {
        let status = connected_status();
        let cell = cell_with(20.0, 50.0);
        let mut uploader = RecordingUploader::answering(vec![Err("connection reset")]);
        let mut reporter = Reporter::new("office", "sht41");

        let outcome = block_on(reporter.poll(&mut uploader, &cell, &status, WARMUP_MS));
        assert_eq!(outcome, ReportOutcome::TransportError);
        assert_eq!(outcome.wait_secs(300), 300);

        assert_eq!(
            block_on(reporter.poll(&mut uploader, &cell, &status, WARMUP_MS + 300_000)),
            ReportOutcome::Sent
        );
    }

    #[test]
    fn sends_the_latest_value_not_the_first() {
        let status = connected_status();
        let cell = cell_with(20.0, 50.0);
        let mut uploader = RecordingUploader::always_204();
        let mut reporter = Reporter::new("office", "sht41");

        let _ = block_on(reporter.poll(&mut uploader, &cell, &status, WARMUP_MS));
        cell.publish(Reading::from_celsius(25.0, 61.0));
        let _ = block_on(reporter.poll(&mut uploader, &cell, &status, WARMUP_MS + 300_000));

        assert_eq!(
            uploader.sent[1],
            "office,device=sht41 temperature=77,relative_humidity=61"
        );
    }
}
