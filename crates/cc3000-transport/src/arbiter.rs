//! SPI bus ownership
//!
//! Every transaction with the chip happens inside a [`Selection`]: the bus
//! mutex is held and chip-select is asserted for as long as the selection
//! lives. Dropping a selection deasserts chip-select, so an early return
//! never leaves the chip selected.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use cc3000_core::bus::SpiBus;
use cc3000_core::error::Result;

/// Serialises access to an SPI bus
///
/// In exclusive mode the peripheral stays started between [`start`] and
/// [`stop`]. In shared mode the bus mutex may be shared with other drivers,
/// and the peripheral is started and stopped around each selection so it
/// can be reconfigured for them in between.
///
/// [`start`]: BusArbiter::start
/// [`stop`]: BusArbiter::stop
pub struct BusArbiter<B> {
    bus: Arc<Mutex<B>>,
    exclusive: bool,
}

impl<B: SpiBus> BusArbiter<B> {
    /// Wrap a bus
    pub fn new(bus: Arc<Mutex<B>>, exclusive: bool) -> Self {
        Self { bus, exclusive }
    }

    /// Whether the peripheral is owned for the whole session
    pub fn is_exclusive(&self) -> bool {
        self.exclusive
    }

    fn lock(&self) -> MutexGuard<'_, B> {
        self.bus.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start the peripheral for the session (exclusive mode only)
    pub fn start(&self) -> Result<()> {
        if self.exclusive {
            self.lock().start()?;
        }
        Ok(())
    }

    /// Stop the peripheral at the end of the session (exclusive mode only)
    pub fn stop(&self) -> Result<()> {
        if self.exclusive {
            self.lock().stop()?;
        }
        Ok(())
    }

    /// Take the bus and assert chip-select
    pub fn select(&self) -> Result<Selection<'_, B>> {
        let mut bus = self.lock();
        if !self.exclusive {
            bus.start()?;
        }
        if let Err(e) = bus.select() {
            if !self.exclusive {
                let _ = bus.stop();
            }
            return Err(e);
        }
        Ok(Selection {
            bus,
            exclusive: self.exclusive,
            selected: true,
        })
    }
}

/// Chip-select held on a locked bus
pub struct Selection<'a, B: SpiBus> {
    bus: MutexGuard<'a, B>,
    exclusive: bool,
    selected: bool,
}

impl<B: SpiBus> Selection<'_, B> {
    /// Full-duplex transfer
    pub fn exchange(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<()> {
        self.bus.exchange(tx, rx)
    }

    /// Transmit only
    pub fn send(&mut self, tx: &[u8]) -> Result<()> {
        self.bus.send(tx)
    }

    /// Receive only
    pub fn receive(&mut self, rx: &mut [u8]) -> Result<()> {
        self.bus.receive(rx)
    }

    /// Delay with chip-select held
    pub fn delay_us(&mut self, us: u32) {
        self.bus.delay_us(us)
    }

    /// Deassert chip-select and give the bus back
    pub fn release(mut self) -> Result<()> {
        self.deselect()
    }

    fn deselect(&mut self) -> Result<()> {
        if !self.selected {
            return Ok(());
        }
        self.selected = false;
        let result = self.bus.unselect();
        if !self.exclusive {
            self.bus.stop()?;
        }
        result
    }
}

impl<B: SpiBus> Drop for Selection<'_, B> {
    fn drop(&mut self) {
        if let Err(e) = self.deselect() {
            log::error!("cc3000: failed to release SPI bus: {}", e);
        }
    }
}
