//! Error types for transport operations

use cc3000_core::Error as CoreError;
use thiserror::Error;

/// Recoverable transport errors
///
/// Conditions that indicate memory corruption or a broken state machine are
/// not reported here; they halt the transport (see [`Fault`](crate::Fault)).
#[derive(Debug, Error)]
pub enum TransportError {
    /// No session is open
    #[error("Transport is not open")]
    NotOpen,

    /// Payload does not fit the transmit buffer
    #[error("Payload of {len} bytes exceeds the maximum of {max} bytes")]
    PayloadTooLarge {
        /// Requested payload length
        len: usize,
        /// Largest payload the transmit buffer can carry
        max: usize,
    },

    /// SPI bus failure
    #[error("SPI bus error: {0}")]
    Bus(#[source] CoreError),

    /// IRQ line failure
    #[error("IRQ line error: {0}")]
    Irq(#[source] CoreError),

    /// The worker thread could not be spawned
    #[error("Failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Result type for transport operations
pub type Result<T> = std::result::Result<T, TransportError>;
