//! WiFi association and the network address shown on the status banner.

#![allow(clippy::future_not_send, reason = "single-threaded")]

use core::cell::RefCell;
use core::fmt::Write as _;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_time::{Duration, Instant, Timer};
use heapless::String;

use crate::config::WifiCredentials;
use crate::status::StatusSink;
use crate::{Error, Result};

/// Dotted IPv4 (or short IPv6) address text.
pub type NetworkAddress = String<40>;

/// The one network address, written once by association and read by the banner.
pub struct AddressCell(Mutex<CriticalSectionRawMutex, RefCell<Option<NetworkAddress>>>);

impl Default for AddressCell {
    fn default() -> Self {
        Self::new()
    }
}

impl AddressCell {
    #[must_use]
    pub const fn new() -> Self {
        Self(Mutex::new(RefCell::new(None)))
    }

    /// Store `address`, clipped to the cell's capacity.
    pub fn set(&self, address: &str) {
        let mut value = NetworkAddress::new();
        for ch in address.chars() {
            if value.push(ch).is_err() {
                break;
            }
        }
        self.0.lock(|cell| *cell.borrow_mut() = Some(value));
    }

    #[must_use]
    pub fn get(&self) -> Option<NetworkAddress> {
        self.0.lock(|cell| cell.borrow().clone())
    }
}

/// WiFi collaborator.
#[allow(async_fn_in_trait, reason = "single-threaded executor; futures need not be Send")]
pub trait WifiLink {
    /// Start joining the network described by `credentials`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Network`] if the join request is refused outright.
    async fn connect(&mut self, credentials: &WifiCredentials) -> Result<()>;

    /// Whether the link is up and has an address.
    async fn is_connected(&mut self) -> bool;

    fn local_address(&self) -> Option<NetworkAddress>;
}

/// How [`associate`] waits for the link.
#[derive(Clone, Copy, Debug)]
pub struct AssociationConfig {
    pub poll_interval: Duration,
    /// `None` waits forever.
    pub timeout: Option<Duration>,
}

impl Default for AssociationConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            timeout: None,
        }
    }
}

/// Join the network and poll until it is up, then publish the address.
///
/// # Errors
///
/// Returns the link's error if the join request fails, or
/// [`Error::AssociationTimeout`] once `config.timeout` has elapsed.
pub async fn associate(
    link: &mut impl WifiLink,
    credentials: &WifiCredentials,
    address: &AddressCell,
    config: AssociationConfig,
    status: &mut impl StatusSink,
) -> Result<NetworkAddress> {
    link.connect(credentials).await?;
    status.log("Connecting to WiFi...").await;

    let started = Instant::now();
    while !link.is_connected().await {
        if config
            .timeout
            .is_some_and(|timeout| started.elapsed() >= timeout)
        {
            status.log("WiFi association timed out").await;
            return Err(Error::AssociationTimeout);
        }
        Timer::after(config.poll_interval).await;
    }

    let ip = link.local_address().unwrap_or_default();
    address.set(&ip);

    let mut message: String<64> = String::new();
    let _ = write!(message, "Connected to WiFi {ip}");
    status.log(&message).await;
    message.clear();
    let _ = write!(message, "IP Address: {ip}");
    status.log(&message).await;
    Ok(ip)
}

// ============================================================================
// CYW43 link
// ============================================================================

#[cfg(feature = "wifi")]
mod wifi_impl {
    use core::fmt::Write as _;

    use cyw43::{Control, JoinOptions};
    use embassy_net::Stack;

    use super::{NetworkAddress, WifiLink};
    use crate::config::WifiCredentials;
    use crate::{Error, Result};

    /// CYW43 radio plus the `embassy-net` stack it feeds.
    pub struct Cyw43Link<'a> {
        control: Control<'a>,
        stack: Stack<'a>,
    }

    impl<'a> Cyw43Link<'a> {
        #[must_use]
        pub const fn new(control: Control<'a>, stack: Stack<'a>) -> Self {
            Self { control, stack }
        }
    }

    impl WifiLink for Cyw43Link<'_> {
        async fn connect(&mut self, credentials: &WifiCredentials) -> Result<()> {
            info!("Joining {}", credentials.ssid.as_str());
            self.control
                .join(
                    credentials.ssid.as_str(),
                    JoinOptions::new(credentials.password.as_bytes()),
                )
                .await
                .map_err(|err| {
                    warn!("Join failed: {}", err.status);
                    Error::Network("WiFi join failed")
                })
        }

        async fn is_connected(&mut self) -> bool {
            self.stack.is_link_up() && self.stack.is_config_up()
        }

        fn local_address(&self) -> Option<NetworkAddress> {
            let config = self.stack.config_v4()?;
            let mut text = NetworkAddress::new();
            write!(text, "{}", config.address.address()).ok()?;
            Some(text)
        }
    }
}

#[cfg(feature = "wifi")]
pub use wifi_impl::Cyw43Link;
