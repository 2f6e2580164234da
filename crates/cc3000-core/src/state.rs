//! Transport state machine

use core::fmt;

/// Current activity of the SPI link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportState {
    /// Session opened, waiting for the chip's first interrupt
    PowerUp,
    /// Chip is ready, the first write has not happened yet
    Initialized,
    /// No transaction in progress
    Idle,
    /// A caller wants to write and is waiting for the chip to grant it
    WriteRequested,
    /// The chip granted the write, the caller may clock out the frame
    WritePermitted,
    /// The worker is reading an inbound frame
    Read,
}

impl TransportState {
    /// Whether moving from `self` to `next` is a legal transition
    ///
    /// Returning to [`PowerUp`](Self::PowerUp) is not part of the table; it
    /// only happens when a session is (re)opened.
    pub fn can_transition_to(self, next: Self) -> bool {
        use TransportState::*;
        matches!(
            (self, next),
            (PowerUp, Initialized)
                | (Initialized, Idle)
                | (Idle, Read)
                | (Read, Idle)
                | (Idle, WriteRequested)
                | (WriteRequested, WritePermitted)
                | (WritePermitted, Idle)
                // write withdrawn before the chip was selected
                | (WriteRequested, Idle)
        )
    }

    /// Human readable name
    pub fn name(self) -> &'static str {
        match self {
            Self::PowerUp => "power-up",
            Self::Initialized => "initialized",
            Self::Idle => "idle",
            Self::WriteRequested => "write-requested",
            Self::WritePermitted => "write-permitted",
            Self::Read => "read",
        }
    }
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A state change as reported to observers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// State before the change
    pub from: TransportState,
    /// State after the change
    pub to: TransportState,
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

#[cfg(test)]
mod tests {
    use super::TransportState::*;

    #[test]
    fn test_lifecycle_transitions_allowed() {
        assert!(PowerUp.can_transition_to(Initialized));
        assert!(Initialized.can_transition_to(Idle));
        assert!(Idle.can_transition_to(Read));
        assert!(Read.can_transition_to(Idle));
        assert!(Idle.can_transition_to(WriteRequested));
        assert!(WriteRequested.can_transition_to(WritePermitted));
        assert!(WritePermitted.can_transition_to(Idle));
    }

    #[test]
    fn test_handshake_cannot_be_skipped() {
        assert!(!Idle.can_transition_to(WritePermitted));
        assert!(!Read.can_transition_to(WriteRequested));
        assert!(!WritePermitted.can_transition_to(Read));
        assert!(!PowerUp.can_transition_to(Idle));
        assert!(!Initialized.can_transition_to(Read));
    }

    #[test]
    fn test_power_up_not_reachable_through_table() {
        for state in [Initialized, Idle, WriteRequested, WritePermitted, Read] {
            assert!(!state.can_transition_to(PowerUp));
        }
    }
}
