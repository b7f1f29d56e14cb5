//! Fakes shared by the host integration tests.
#![allow(dead_code, reason = "each test binary uses a different subset")]

use embedded_hal::i2c::{ErrorKind, ErrorType, NoAcknowledgeSource, Operation};
use embedded_hal_async::i2c::I2c;
use octo_clock::mux;
use octo_clock::rtc::DS3231_ADDRESS;
use octo_clock::surface::{SSD1306_ADDRESS, SSD1306_ALT_ADDRESS};

const NACK: ErrorKind = ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address);

/// One transaction as the devices saw it, in bus order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BusEvent {
    Select(u8),
    /// Column/page window write that starts a panel present, tagged with the routed
    /// channel.
    PanelWindow(u8),
    PanelData(u8),
    PanelCommand(u8),
    Status,
    Rtc,
}

/// Saturday 2024-03-09 23:30:00 in DS3231 registers.
pub const RTC_REGISTERS: [u8; 7] = [0x00, 0x30, 0x23, 0x06, 0x09, 0x03, 0x24];

/// An I2C bus with a TCA9548A, a clock panel on every channel, the status panel and a
/// DS3231, counting what reaches each device.
#[derive(Debug, Default)]
pub struct FakeBus {
    selected: Option<u8>,
    /// Bitmask of channels whose panel does not acknowledge.
    pub dead: u8,
    /// Frame presents per channel.
    pub presents: [u32; 8],
    /// Frame presents on the status panel.
    pub status_presents: u32,
    pub rtc: [u8; 7],
    pub rtc_writes: u32,
    /// Every acknowledged transaction since the last clear.
    pub trace: Vec<BusEvent>,
}

impl FakeBus {
    pub fn new() -> Self {
        Self {
            rtc: RTC_REGISTERS,
            ..Self::default()
        }
    }

    pub fn with_dead_channels(mask: u8) -> Self {
        Self {
            dead: mask,
            ..Self::new()
        }
    }

    pub fn clear_counts(&mut self) {
        self.presents = [0; 8];
        self.status_presents = 0;
        self.trace.clear();
    }

    /// Channels presented since the last clear, ascending.
    pub fn presented_channels(&self) -> Vec<u8> {
        (0..8_u8)
            .filter(|&channel| self.presents[usize::from(channel)] > 0)
            .collect()
    }

    fn panel(&mut self, operations: &mut [Operation<'_>]) -> Result<(), ErrorKind> {
        let channel = self.selected.ok_or(NACK)?;
        if self.dead & (1 << channel) != 0 {
            return Err(NACK);
        }
        if operations.iter().any(is_present_command) {
            self.presents[usize::from(channel)] += 1;
        }
        let event = match operations.first() {
            Some(operation) if is_present_command(operation) => BusEvent::PanelWindow(channel),
            Some(Operation::Write([0x40, ..])) => BusEvent::PanelData(channel),
            _ => BusEvent::PanelCommand(channel),
        };
        self.trace.push(event);
        Ok(())
    }

    fn ds3231(&mut self, operations: &mut [Operation<'_>]) {
        let mut pointer = 0_usize;
        for operation in operations.iter_mut() {
            match operation {
                Operation::Write(bytes) => {
                    if let Some((&register, data)) = bytes.split_first() {
                        pointer = usize::from(register);
                        if !data.is_empty() {
                            self.rtc_writes += 1;
                        }
                        for (offset, byte) in data.iter().enumerate() {
                            if let Some(slot) = self.rtc.get_mut(pointer + offset) {
                                *slot = *byte;
                            }
                        }
                    }
                }
                Operation::Read(buffer) => {
                    for (offset, byte) in buffer.iter_mut().enumerate() {
                        *byte = self.rtc.get(pointer + offset).copied().unwrap_or(0);
                    }
                }
            }
        }
    }
}

// A present starts by setting the column window: control byte 0x00, command 0x21.
fn is_present_command(operation: &Operation<'_>) -> bool {
    matches!(operation, Operation::Write(bytes) if bytes.starts_with(&[0x00, 0x21]))
}

impl ErrorType for FakeBus {
    type Error = ErrorKind;
}

impl I2c for FakeBus {
    async fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        // Let any other future on the executor run between transactions.
        embassy_futures::yield_now().await;
        match address {
            mux::ADDRESS => {
                for operation in operations.iter() {
                    if let Operation::Write([mask]) = operation {
                        if mask.is_power_of_two() {
                            self.selected = u8::try_from(mask.trailing_zeros()).ok();
                            if let Some(channel) = self.selected {
                                self.trace.push(BusEvent::Select(channel));
                            }
                        }
                    }
                }
                Ok(())
            }
            SSD1306_ADDRESS => self.panel(operations),
            SSD1306_ALT_ADDRESS => {
                if operations.iter().any(is_present_command) {
                    self.status_presents += 1;
                }
                self.trace.push(BusEvent::Status);
                Ok(())
            }
            DS3231_ADDRESS => {
                self.ds3231(operations);
                self.trace.push(BusEvent::Rtc);
                Ok(())
            }
            _ => Err(NACK),
        }
    }
}
