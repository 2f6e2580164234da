//! Fatal transport faults
//!
//! A fault means memory next to a transfer buffer was overwritten or the
//! state machine was driven somewhere it cannot be. Neither is recoverable;
//! the thread that detects it logs the fault and panics.

use std::fmt;

use cc3000_core::state::TransportState;

/// Unrecoverable transport condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// The transmit buffer guard byte was overwritten
    TxOverflow,
    /// The receive buffer guard byte was overwritten
    RxOverflow,
    /// An inbound frame declares more bytes than the receive buffer holds
    FrameTooLarge {
        /// Frame length declared by the chip
        needed: usize,
        /// Receive buffer capacity
        capacity: usize,
    },
    /// The worker was woken in a state it cannot handle
    IllegalState(TransportState),
    /// A transition outside the state table was attempted
    IllegalTransition {
        /// Current state
        from: TransportState,
        /// Requested state
        to: TransportState,
    },
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TxOverflow => write!(f, "transmit buffer overflow"),
            Self::RxOverflow => write!(f, "receive buffer overflow"),
            Self::FrameTooLarge { needed, capacity } => write!(
                f,
                "inbound frame of {} bytes exceeds receive buffer of {} bytes",
                needed, capacity
            ),
            Self::IllegalState(state) => write!(f, "interrupt serviced in state {}", state),
            Self::IllegalTransition { from, to } => {
                write!(f, "illegal state transition {} -> {}", from, to)
            }
        }
    }
}

/// Log `fault` and stop the calling thread
#[cold]
#[track_caller]
pub(crate) fn halt(fault: Fault) -> ! {
    log::error!("cc3000: fatal: {}", fault);
    panic!("cc3000 transport halted: {}", fault);
}
