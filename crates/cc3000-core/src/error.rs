//! Error types for cc3000-core
//!
//! This module provides a no_std compatible error type shared by the
//! hardware traits and the frame codec.

use core::fmt;

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    // Bus errors
    /// SPI transfer failed
    BusFailed,
    /// SPI peripheral could not be started or stopped
    BusConfigFailed,
    /// Chip-select line could not be driven
    ChipSelectFailed,

    // Line errors
    /// Interrupt line could not be monitored or read
    IrqFailed,
    /// Output pin could not be driven
    PinFailed,

    // Framing errors
    /// Provided buffer is too small for the frame
    BufferTooSmall,
    /// Frame length does not fit the 16-bit length field
    LengthTooLarge,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BusFailed => write!(f, "SPI transfer failed"),
            Self::BusConfigFailed => write!(f, "SPI peripheral configuration failed"),
            Self::ChipSelectFailed => write!(f, "chip-select line could not be driven"),
            Self::IrqFailed => write!(f, "interrupt line error"),
            Self::PinFailed => write!(f, "output pin could not be driven"),
            Self::BufferTooSmall => write!(f, "buffer too small"),
            Self::LengthTooLarge => write!(f, "frame length too large"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
