//! Minimal SNTP client used as the wall-clock time source.

use edgesense_core::TimeSource;
use embassy_net::udp::{PacketMetadata, UdpSocket};
use embassy_net::{IpEndpoint, Stack, dns::DnsQueryType};
use embassy_time::{Duration, WithTimeout};

const NTP_PORT: u16 = 123;
const PACKET_BYTES: usize = 48;
/// Seconds between the NTP era (1900-01-01) and the Unix epoch.
const NTP_UNIX_OFFSET_SECS: u64 = 2_208_988_800;
const RESPONSE_TIMEOUT_SECS: u64 = 5;
/// Transmit-timestamp seconds field within the response.
const TRANSMIT_TS_RANGE: core::ops::Range<usize> = 40..44;

/// LI=0, version 4, mode 3 (client).
const CLIENT_REQUEST_HEADER: u8 = 0x23;

#[derive(Debug)]
pub(super) enum SntpError {
    DnsFailed,
    BindFailed,
    SendFailed,
    Timeout,
    MalformedResponse,
}

pub(super) struct SntpClient<'d> {
    stack: Stack<'d>,
    server: &'static str,
}

impl<'d> SntpClient<'d> {
    pub(super) fn new(stack: Stack<'d>, server: &'static str) -> Self {
        Self { stack, server }
    }
}

impl TimeSource for SntpClient<'_> {
    type Error = SntpError;

    async fn now(&mut self) -> Result<u64, Self::Error> {
        let addresses = self
            .stack
            .dns_query(self.server, DnsQueryType::A)
            .await
            .map_err(|_| SntpError::DnsFailed)?;
        let address = addresses.first().copied().ok_or(SntpError::DnsFailed)?;

        let mut rx_meta = [PacketMetadata::EMPTY; 2];
        let mut tx_meta = [PacketMetadata::EMPTY; 2];
        let mut rx_buffer = [0u8; PACKET_BYTES * 2];
        let mut tx_buffer = [0u8; PACKET_BYTES * 2];
        let mut socket = UdpSocket::new(
            self.stack,
            &mut rx_meta,
            &mut rx_buffer,
            &mut tx_meta,
            &mut tx_buffer,
        );
        socket.bind(0).map_err(|_| SntpError::BindFailed)?;

        let mut request = [0u8; PACKET_BYTES];
        request[0] = CLIENT_REQUEST_HEADER;
        socket
            .send_to(&request, IpEndpoint::new(address, NTP_PORT))
            .await
            .map_err(|_| SntpError::SendFailed)?;

        let mut response = [0u8; PACKET_BYTES];
        let (len, _meta) = socket
            .recv_from(&mut response)
            .with_timeout(Duration::from_secs(RESPONSE_TIMEOUT_SECS))
            .await
            .map_err(|_| SntpError::Timeout)?
            .map_err(|_| SntpError::MalformedResponse)?;
        if len < TRANSMIT_TS_RANGE.end {
            return Err(SntpError::MalformedResponse);
        }

        let seconds = &response[TRANSMIT_TS_RANGE];
        let ntp_secs =
            u32::from_be_bytes([seconds[0], seconds[1], seconds[2], seconds[3]]) as u64;
        ntp_secs
            .checked_sub(NTP_UNIX_OFFSET_SECS)
            .ok_or(SntpError::MalformedResponse)
    }
}
