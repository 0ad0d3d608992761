//! Wi-Fi STA adapter driven by the link supervisor.

use edgesense_core::NetworkLink;
use embassy_net::Stack;
use embassy_time::{Duration, WithTimeout};
use esp_radio::wifi::{WifiController, WifiError};
use log::info;

const DHCP_TIMEOUT_SECS: u64 = 15;

/// Why a connect attempt failed.
#[derive(Debug)]
pub(super) enum WifiLinkError {
    Start(WifiError),
    Connect(WifiError),
    DhcpTimeout,
}

/// Radio controller plus network stack, presented as one link. The
/// supervisor is the only caller of [`NetworkLink::connect`]; credentials
/// were bound via `set_config` before this adapter was built.
pub(super) struct WifiLink<'d> {
    controller: WifiController<'d>,
    stack: Stack<'d>,
}

impl<'d> WifiLink<'d> {
    pub(super) fn new(controller: WifiController<'d>, stack: Stack<'d>) -> Self {
        Self { controller, stack }
    }
}

impl NetworkLink for WifiLink<'_> {
    type Error = WifiLinkError;

    fn is_connected(&self) -> bool {
        matches!(self.controller.is_connected(), Ok(true))
            && self.stack.is_link_up()
            && self.stack.config_v4().is_some()
    }

    async fn connect(&mut self) -> Result<(), Self::Error> {
        if !self.controller.is_started().unwrap_or(false) {
            self.controller
                .start_async()
                .await
                .map_err(WifiLinkError::Start)?;
        }

        if let Err(err) = self.controller.connect_async().await {
            let _ = self.controller.disconnect_async().await;
            return Err(WifiLinkError::Connect(err));
        }

        // Associated is not connected: the link counts once DHCP hands out
        // an address the uploader can actually route from.
        match self
            .stack
            .wait_config_up()
            .with_timeout(Duration::from_secs(DHCP_TIMEOUT_SECS))
            .await
        {
            Ok(()) => {
                if let Some(config) = self.stack.config_v4() {
                    info!("wifi: dhcp ready ip={}", config.address);
                }
                Ok(())
            }
            Err(_) => {
                let _ = self.controller.disconnect_async().await;
                Err(WifiLinkError::DhcpTimeout)
            }
        }
    }
}
