//! Interrupt line abstraction and edge signalling
//!
//! The CC3000 pulls its IRQ line low whenever it wants attention: a frame
//! is ready to be read, the chip finished powering up, or a write has been
//! granted. Backends watch the line for falling edges and report each one
//! through an [`IrqSignal`]. Raising a signal never blocks and never
//! allocates, so it is safe to call from a monitor thread or callback.
//!
//! The receiving half counts edges: one edge raised is one wakeup consumed.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, Thread};

use crate::error::Result;

struct Pending {
    count: AtomicUsize,
    closed: AtomicBool,
    waiter: OnceLock<Thread>,
}

/// Sending half, handed to the interrupt line backend
#[derive(Clone)]
pub struct IrqSignal {
    pending: Arc<Pending>,
}

/// Receiving half, owned by the thread servicing interrupts
pub struct IrqReceiver {
    pending: Arc<Pending>,
}

/// Create a connected signal/receiver pair
pub fn channel() -> (IrqSignal, IrqReceiver) {
    let pending = Arc::new(Pending {
        count: AtomicUsize::new(0),
        closed: AtomicBool::new(false),
        waiter: OnceLock::new(),
    });
    (
        IrqSignal {
            pending: Arc::clone(&pending),
        },
        IrqReceiver { pending },
    )
}

impl IrqSignal {
    /// Record one falling edge and wake the receiver
    pub fn raise(&self) {
        self.pending.count.fetch_add(1, Ordering::AcqRel);
        if let Some(waiter) = self.pending.waiter.get() {
            waiter.unpark();
        }
    }

    /// Discard edges that have not been consumed yet
    pub fn clear(&self) -> usize {
        self.pending.count.swap(0, Ordering::AcqRel)
    }

    /// Number of edges not consumed yet
    pub fn pending(&self) -> usize {
        self.pending.count.load(Ordering::Acquire)
    }

    /// Make the receiver's [`wait`](IrqReceiver::wait) return `false`
    pub fn close(&self) {
        self.pending.closed.store(true, Ordering::Release);
        if let Some(waiter) = self.pending.waiter.get() {
            waiter.unpark();
        }
    }
}

impl IrqReceiver {
    /// Block until an edge is available and consume it
    ///
    /// Returns `false` once the signal has been closed.
    pub fn wait(&self) -> bool {
        self.pending.waiter.get_or_init(thread::current);
        loop {
            if self.pending.closed.load(Ordering::Acquire) {
                return false;
            }
            let taken = self
                .pending
                .count
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
                .is_ok();
            if taken {
                return true;
            }
            thread::park();
        }
    }
}

/// Interrupt line of the CC3000
pub trait IrqLine {
    /// Start reporting falling edges to `signal`
    fn start(&mut self, signal: IrqSignal) -> Result<()>;

    /// Stop reporting edges
    fn stop(&mut self) -> Result<()>;

    /// Whether the line is currently held low by the chip
    fn is_asserted(&self) -> Result<bool>;
}

impl IrqLine for alloc::boxed::Box<dyn IrqLine + Send> {
    fn start(&mut self, signal: IrqSignal) -> Result<()> {
        (**self).start(signal)
    }

    fn stop(&mut self) -> Result<()> {
        (**self).stop()
    }

    fn is_asserted(&self) -> Result<bool> {
        (**self).is_asserted()
    }
}
