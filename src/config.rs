//! WiFi credentials and the settings baked in by `build.rs`.
//!
//! `wifi_config.txt` holds `KEY=VALUE` lines:
//!
//! ```text
//! SSID=my-network
//! PASSWORD=hunter22
//! ```

use core::fmt::Write as _;

use heapless::String;

use crate::status::StatusSink;
use crate::time_sync::SyncConfig;
use crate::{Error, Result};

/// `wifi_config.txt` as found at build time (empty if there was none).
pub const EMBEDDED_WIFI_CONFIG: &str = include_str!(concat!(env!("OUT_DIR"), "/wifi_config.txt"));
/// NTP server name, from `NTP_HOST` at build time.
pub const NTP_HOST: &str = env!("NTP_HOST");
/// Whole-hour UTC offset text, from `UTC_OFFSET_HOURS` at build time.
pub const UTC_OFFSET_HOURS: &str = env!("UTC_OFFSET_HOURS");

/// WiFi network credentials (SSID and password).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WifiCredentials {
    /// Network SSID (up to 32 characters).
    pub ssid: String<32>,
    /// Network password (up to 64 characters).
    pub password: String<64>,
}

impl WifiCredentials {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ssid.is_empty()
    }
}

/// Parse `KEY=VALUE` lines.
///
/// Lines are split on the first `=`, both sides are trimmed and blank lines are
/// skipped. Keys other than `SSID` and `PASSWORD` are ignored.
///
/// # Errors
///
/// Returns [`Error::ConfigMalformed`] with the 1-based line number of the first line
/// that has no `=` or whose value does not fit.
pub fn parse_wifi_config(text: &str) -> Result<WifiCredentials> {
    let mut credentials = WifiCredentials::default();
    for (index, line) in text.lines().enumerate() {
        let line_number = index.saturating_add(1);
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (key, value) = line
            .split_once('=')
            .ok_or(Error::ConfigMalformed(line_number))?;
        let value = value.trim();
        let stored = match key.trim() {
            "SSID" => String::try_from(value).map(|ssid| credentials.ssid = ssid),
            "PASSWORD" => String::try_from(value).map(|password| credentials.password = password),
            _ => Ok(()),
        };
        stored.map_err(|()| Error::ConfigMalformed(line_number))?;
    }
    Ok(credentials)
}

/// Parse `text`, falling back to empty credentials (and saying so) on any problem.
///
/// A file without an SSID, including the empty file `build.rs` embeds when there is
/// none, counts as a failure.
pub async fn load_wifi_config(text: &str, status: &mut impl StatusSink) -> WifiCredentials {
    let loaded = parse_wifi_config(text).and_then(|credentials| {
        if credentials.is_empty() {
            Err(Error::ConfigMissing)
        } else {
            Ok(credentials)
        }
    });
    match loaded {
        Ok(credentials) => credentials,
        Err(err) => {
            warn!("Wi-Fi config unusable");
            let mut message: String<64> = String::new();
            let _ = write!(message, "Failed to load Wi-Fi config: {err}");
            status.log(&message).await;
            WifiCredentials::default()
        }
    }
}

/// Time sync settings from the build-time environment. An unparsable offset means UTC.
#[must_use]
pub fn sync_config() -> SyncConfig {
    SyncConfig::new(NTP_HOST, UTC_OFFSET_HOURS.trim().parse().unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::testing::RecordingStatus;
    use embassy_futures::block_on;

    #[test]
    fn reads_ssid_and_password() {
        let credentials =
            parse_wifi_config("SSID = home\n\n  PASSWORD=a=b=c  \nCOUNTRY=NL\n").unwrap();
        assert_eq!(credentials.ssid, "home");
        assert_eq!(credentials.password, "a=b=c");
    }

    #[test]
    fn line_without_separator_is_malformed() {
        let err = parse_wifi_config("SSID=home\njunk\n").unwrap_err();
        assert!(matches!(err, Error::ConfigMalformed(2)));
    }

    #[test]
    fn oversized_ssid_is_malformed() {
        let err = parse_wifi_config("SSID=0123456789012345678901234567890123456789").unwrap_err();
        assert!(matches!(err, Error::ConfigMalformed(1)));
    }

    #[test]
    fn malformed_file_loads_as_empty_credentials() {
        let mut status = RecordingStatus::default();
        let credentials = block_on(load_wifi_config("garbage", &mut status));

        assert!(credentials.is_empty());
        assert!(credentials.password.is_empty());
        assert!(status.contains("Failed to load Wi-Fi config: malformed config line 1"));
    }

    #[test]
    fn empty_file_parses_to_empty_credentials() {
        assert_eq!(parse_wifi_config("").unwrap(), WifiCredentials::default());
    }

    #[test]
    fn missing_file_is_reported_on_the_status_log() {
        let mut status = RecordingStatus::default();
        let credentials = block_on(load_wifi_config("", &mut status));

        assert!(credentials.is_empty());
        assert_eq!(status.lines, ["Failed to load Wi-Fi config: no SSID configured"]);
    }

    #[test]
    fn password_without_ssid_is_reported() {
        let mut status = RecordingStatus::default();
        let credentials = block_on(load_wifi_config("PASSWORD=secret\n", &mut status));

        assert_eq!(credentials, WifiCredentials::default());
        assert!(status.contains("Failed to load Wi-Fi config: no SSID configured"));
    }

    #[test]
    fn good_file_loads_quietly() {
        let mut status = RecordingStatus::default();
        let credentials = block_on(load_wifi_config("SSID=home\nPASSWORD=pw\n", &mut status));

        assert_eq!(credentials.ssid, "home");
        assert!(status.lines.is_empty());
    }
}
