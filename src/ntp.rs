//! Asking the network for the current UTC time.
//!
//! Only the contract matters to the rest of the crate: give a host name, get back NTP
//! seconds (since 1900-01-01) or an error. The `wifi` feature adds an SNTP client over
//! an `embassy-net` stack.

/// Network time collaborator.
#[allow(async_fn_in_trait, reason = "single-threaded executor; futures need not be Send")]
pub trait NetworkTime {
    /// Request the server's transmit timestamp, in whole NTP seconds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NtpMalformed`](crate::Error::NtpMalformed) for a reply that cannot
    /// be decoded, or [`Error::Network`](crate::Error::Network) for lookup/socket failures.
    async fn request_utc(&mut self, host: &str) -> crate::Result<u32>;
}

/// Size of an NTPv3 packet.
pub const NTP_PACKET_LEN: usize = 48;
/// LI = 0, VN = 3, Mode = 3 (client).
pub const NTP_CLIENT_HEADER: u8 = 0x1B;
const TRANSMIT_SECONDS: core::ops::Range<usize> = 40..44;

/// A client request: all zero apart from the header byte.
#[must_use]
pub const fn client_request() -> [u8; NTP_PACKET_LEN] {
    let mut request = [0_u8; NTP_PACKET_LEN];
    request[0] = NTP_CLIENT_HEADER;
    request
}

/// Pull the transmit-timestamp seconds out of a server reply.
///
/// # Errors
///
/// Returns [`Error::NtpMalformed`](crate::Error::NtpMalformed) for a short reply or a zero
/// timestamp (a server that has not synchronized yet).
pub fn transmit_seconds(reply: &[u8]) -> crate::Result<u32> {
    let bytes: [u8; 4] = reply
        .get(TRANSMIT_SECONDS)
        .and_then(|slice| slice.try_into().ok())
        .ok_or(crate::Error::NtpMalformed)?;
    match u32::from_be_bytes(bytes) {
        0 => Err(crate::Error::NtpMalformed),
        seconds => Ok(seconds),
    }
}

#[cfg(feature = "wifi")]
mod wifi_impl {
    use embassy_net::udp::{PacketMetadata, UdpSocket};
    use embassy_net::{Stack, dns::DnsQueryType};

    use super::{NTP_PACKET_LEN, NetworkTime, client_request, transmit_seconds};
    use crate::{Error, Result};

    const NTP_PORT: u16 = 123;

    /// SNTP over UDP on an `embassy-net` stack.
    ///
    /// The caller bounds the whole exchange with a timeout, so the receive here waits
    /// as long as it is allowed to.
    pub struct StackNetworkTime<'a> {
        stack: Stack<'a>,
    }

    impl<'a> StackNetworkTime<'a> {
        #[must_use]
        pub const fn new(stack: Stack<'a>) -> Self {
            Self { stack }
        }
    }

    impl NetworkTime for StackNetworkTime<'_> {
        async fn request_utc(&mut self, host: &str) -> Result<u32> {
            let addresses = self
                .stack
                .dns_query(host, DnsQueryType::A)
                .await
                .map_err(|_| Error::Network("DNS lookup failed"))?;
            let server = *addresses
                .first()
                .ok_or(Error::Network("No DNS results"))?;

            let mut rx_meta = [PacketMetadata::EMPTY; 1];
            let mut rx_buffer = [0; 128];
            let mut tx_meta = [PacketMetadata::EMPTY; 1];
            let mut tx_buffer = [0; 128];
            let mut socket = UdpSocket::new(
                self.stack,
                &mut rx_meta,
                &mut rx_buffer,
                &mut tx_meta,
                &mut tx_buffer,
            );
            socket
                .bind(0)
                .map_err(|_| Error::Network("Socket bind failed"))?;

            socket
                .send_to(&client_request(), (server, NTP_PORT))
                .await
                .map_err(|_| Error::Network("NTP send failed"))?;

            let mut reply = [0_u8; NTP_PACKET_LEN];
            let (len, _from) = socket
                .recv_from(&mut reply)
                .await
                .map_err(|_| Error::Network("NTP receive failed"))?;
            debug!("NTP reply of {} bytes", len);
            transmit_seconds(reply.get(..len).unwrap_or(&[]))
        }
    }
}

#[cfg(feature = "wifi")]
pub use wifi_impl::StackNetworkTime;
