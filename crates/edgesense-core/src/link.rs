//! Wireless link supervision.
//!
//! The supervisor is the sole owner of connection initiation: no other task
//! ever calls [`NetworkLink::connect`]. Everything else observes the shared
//! [`LinkStatus`] flag, which only the supervisor writes.

use core::fmt::Debug;
use core::sync::atomic::{AtomicBool, Ordering};

use log::{info, warn};

/// Fixed wait before retrying a failed connection attempt.
pub const CONNECT_BACKOFF_SECS: u64 = 10;
/// Wait between re-checks while the link is healthy.
pub const IDLE_RECHECK_SECS: u64 = 60;

/// Mutating view of the wireless link. Credentials are bound when the
/// concrete link is constructed; the supervisor just asks it to connect.
#[allow(async_fn_in_trait)]
pub trait NetworkLink {
    type Error: Debug;

    /// Whether the link currently reports connected.
    fn is_connected(&self) -> bool;

    /// Attempt to (re)establish the link.
    async fn connect(&mut self) -> Result<(), Self::Error>;
}

/// Lock-free connectivity flag written by the supervisor, read by the
/// clock-sync and reporter tasks.
pub struct LinkStatus {
    connected: AtomicBool,
}

impl LinkStatus {
    pub const fn new() -> Self {
        Self {
            connected: AtomicBool::new(false),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    fn set(&self, up: bool) {
        self.connected.store(up, Ordering::Release);
    }
}

impl Default for LinkStatus {
    fn default() -> Self {
        Self::new()
    }
}

/// What one supervision cycle decided, and how long to wait before the next.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LinkOutcome {
    /// Link already up; re-check after the idle interval.
    Idle,
    /// Connect attempt succeeded; re-check immediately.
    Connected,
    /// Connect attempt failed; retry after the backoff interval.
    Backoff,
}

impl LinkOutcome {
    pub const fn wait_secs(self) -> u64 {
        match self {
            Self::Idle => IDLE_RECHECK_SECS,
            Self::Connected => 0,
            Self::Backoff => CONNECT_BACKOFF_SECS,
        }
    }
}

/// Keeps the link connected forever. Connect failures are recoverable and
/// retried indefinitely; there is no maximum retry count.
pub struct LinkSupervisor;

impl LinkSupervisor {
    pub const fn new() -> Self {
        Self
    }

    /// One supervision cycle. Never called while another cycle is in
    /// flight; the caller sleeps for [`LinkOutcome::wait_secs`] in between.
    pub async fn poll<L: NetworkLink>(&mut self, link: &mut L, status: &LinkStatus) -> LinkOutcome {
        if link.is_connected() {
            status.set(true);
            return LinkOutcome::Idle;
        }

        status.set(false);
        info!("wifi: attempting to connect");
        match link.connect().await {
            Ok(()) => {
                status.set(true);
                info!("wifi: connected");
                LinkOutcome::Connected
            }
            Err(err) => {
                warn!("wifi: connect failed: {:?}", err);
                LinkOutcome::Backoff
            }
        }
    }
}

impl Default for LinkSupervisor {
    fn default() -> Self {
        Self::new()
    }
}
