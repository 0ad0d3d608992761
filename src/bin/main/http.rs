//! Plain-HTTP uploader for the time-series database write endpoint.
//!
//! One instance lives for the whole process; it caches the resolved server
//! address so the periodic work is just connect, POST, read status, close.

use core::fmt::Write as _;

use edgesense_core::config::{AUTH_SCHEME, CONTENT_TYPE};
use edgesense_core::reporter::BODY_EXCERPT_BYTES;
use edgesense_core::{UploadResponse, UploadTarget, Uploader};
use embassy_net::tcp::TcpSocket;
use embassy_net::{IpAddress, Stack, dns::DnsQueryType};
use embassy_time::Duration;
use embedded_io_async::Write;
use heapless::String;

const SOCKET_BUFFER_BYTES: usize = 1_024;
const REQUEST_HEAD_BYTES: usize = 512;
const RESPONSE_BYTES: usize = 1_024;
const SOCKET_TIMEOUT_SECS: u64 = 10;

#[derive(Debug)]
pub(super) enum HttpError {
    DnsFailed,
    ConnectFailed,
    WriteFailed,
    ReadFailed,
    RequestTooLarge,
    MalformedStatusLine,
}

pub(super) struct HttpUploader<'d> {
    stack: Stack<'d>,
    target: &'d UploadTarget,
    /// Resolved once and reused; cleared when a connect fails so the next
    /// cycle re-resolves.
    address: Option<IpAddress>,
    rx_buffer: [u8; SOCKET_BUFFER_BYTES],
    tx_buffer: [u8; SOCKET_BUFFER_BYTES],
}

impl<'d> HttpUploader<'d> {
    pub(super) fn new(stack: Stack<'d>, target: &'d UploadTarget) -> Self {
        Self {
            stack,
            target,
            address: None,
            rx_buffer: [0; SOCKET_BUFFER_BYTES],
            tx_buffer: [0; SOCKET_BUFFER_BYTES],
        }
    }

    async fn resolve(&mut self) -> Result<IpAddress, HttpError> {
        if let Some(address) = self.address {
            return Ok(address);
        }
        let addresses = self
            .stack
            .dns_query(self.target.host.as_str(), DnsQueryType::A)
            .await
            .map_err(|_| HttpError::DnsFailed)?;
        let address = addresses.first().copied().ok_or(HttpError::DnsFailed)?;
        self.address = Some(address);
        Ok(address)
    }

    async fn exchange(
        socket: &mut TcpSocket<'_>,
        head: &str,
        body: &str,
    ) -> Result<UploadResponse, HttpError> {
        socket
            .write_all(head.as_bytes())
            .await
            .map_err(|_| HttpError::WriteFailed)?;
        socket
            .write_all(body.as_bytes())
            .await
            .map_err(|_| HttpError::WriteFailed)?;
        socket.flush().await.map_err(|_| HttpError::WriteFailed)?;

        let mut response = [0u8; RESPONSE_BYTES];
        let mut filled = 0;
        loop {
            if filled == response.len() {
                break;
            }
            match socket.read(&mut response[filled..]).await {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(_) => {
                    if filled == 0 {
                        return Err(HttpError::ReadFailed);
                    }
                    break;
                }
            }
        }

        parse_response(&response[..filled])
    }
}

impl Uploader for HttpUploader<'_> {
    type Error = HttpError;

    async fn send(&mut self, body: &str) -> Result<UploadResponse, Self::Error> {
        let address = self.resolve().await?;

        let mut head: String<REQUEST_HEAD_BYTES> = String::new();
        write!(
            head,
            "POST {} HTTP/1.1\r\n\
             Host: {}\r\n\
             Authorization: {} {}\r\n\
             Content-Type: {}\r\n\
             Content-Length: {}\r\n\
             Connection: close\r\n\r\n",
            self.target.request_target,
            self.target.host,
            AUTH_SCHEME,
            self.target.token,
            CONTENT_TYPE,
            body.len()
        )
        .map_err(|_| HttpError::RequestTooLarge)?;

        let mut socket = TcpSocket::new(self.stack, &mut self.rx_buffer, &mut self.tx_buffer);
        socket.set_timeout(Some(Duration::from_secs(SOCKET_TIMEOUT_SECS)));

        if socket
            .connect((address, self.target.port))
            .await
            .is_err()
        {
            self.address = None;
            return Err(HttpError::ConnectFailed);
        }

        let result = Self::exchange(&mut socket, &head, body).await;
        // Close on every path so a failed cycle never leaks the connection.
        socket.close();
        result
    }
}

/// Pulls the status code out of `HTTP/1.1 <code> ...` and keeps the leading
/// bytes of the body for failure logs.
fn parse_response(raw: &[u8]) -> Result<UploadResponse, HttpError> {
    // A partial read can cut the response mid-character; keep the valid
    // prefix. The status line itself is always ASCII.
    let head = match core::str::from_utf8(raw) {
        Ok(text) => text,
        Err(err) => core::str::from_utf8(&raw[..err.valid_up_to()]).unwrap_or(""),
    };

    let mut after_version = head
        .split_once(' ')
        .ok_or(HttpError::MalformedStatusLine)?
        .1
        .splitn(2, ' ');
    let status = after_version
        .next()
        .and_then(|code| code.parse::<u16>().ok())
        .ok_or(HttpError::MalformedStatusLine)?;

    let mut body = String::new();
    if let Some((_, rest)) = head.split_once("\r\n\r\n") {
        let mut cut = rest.len().min(BODY_EXCERPT_BYTES);
        while !rest.is_char_boundary(cut) {
            cut -= 1;
        }
        let _ = body.push_str(&rest[..cut]);
    }

    Ok(UploadResponse { status, body })
}
