//! Transport configuration

use std::time::Duration;

/// Delay between the two halves of the first write (microseconds)
pub const DEFAULT_FIRST_WRITE_DELAY_US: u32 = 50;
/// Settle time after each inbound frame while chip-select is held (microseconds)
pub const DEFAULT_RX_SETTLE_US: u32 = 100_000;
/// Settle time at the end of `open` (milliseconds)
pub const DEFAULT_OPEN_SETTLE_MS: u64 = 100;

/// Timing and bus ownership settings of a [`Transport`](crate::Transport)
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, deny_unknown_fields))]
pub struct TransportConfig {
    /// The transport is the only user of the SPI peripheral
    ///
    /// Exclusive buses are started on `open` and stopped on `close`. Shared
    /// buses are started and stopped around every selection.
    pub bus_exclusive: bool,
    /// Delay around the second half of the first write
    pub first_write_delay_us: u32,
    /// Settle time after reading an inbound frame
    pub rx_settle_us: u32,
    /// Settle time at the end of `open`
    pub open_settle_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            bus_exclusive: true,
            first_write_delay_us: DEFAULT_FIRST_WRITE_DELAY_US,
            rx_settle_us: DEFAULT_RX_SETTLE_US,
            open_settle_ms: DEFAULT_OPEN_SETTLE_MS,
        }
    }
}

impl TransportConfig {
    /// Create a configuration with default timings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether the transport owns the SPI peripheral
    pub fn with_bus_exclusive(mut self, exclusive: bool) -> Self {
        self.bus_exclusive = exclusive;
        self
    }

    /// Set the first-write delay in microseconds
    pub fn with_first_write_delay_us(mut self, us: u32) -> Self {
        self.first_write_delay_us = us;
        self
    }

    /// Set the post-read settle time in microseconds
    pub fn with_rx_settle_us(mut self, us: u32) -> Self {
        self.rx_settle_us = us;
        self
    }

    /// Set the open settle time in milliseconds
    pub fn with_open_settle_ms(mut self, ms: u64) -> Self {
        self.open_settle_ms = ms;
        self
    }

    /// Open settle time as a [`Duration`]
    pub fn open_settle(&self) -> Duration {
        Duration::from_millis(self.open_settle_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TransportConfig::default();
        assert!(config.bus_exclusive);
        assert_eq!(config.first_write_delay_us, 50);
        assert_eq!(config.rx_settle_us, 100_000);
        assert_eq!(config.open_settle(), Duration::from_millis(100));
    }

    #[test]
    fn test_builder() {
        let config = TransportConfig::new()
            .with_bus_exclusive(false)
            .with_open_settle_ms(0)
            .with_rx_settle_us(10);
        assert!(!config.bus_exclusive);
        assert_eq!(config.open_settle(), Duration::ZERO);
        assert_eq!(config.rx_settle_us, 10);
        assert_eq!(config.first_write_delay_us, 50);
    }
}
