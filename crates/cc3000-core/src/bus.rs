//! Hardware traits for the SPI bus and the power-enable pin
//!
//! Backends implement these for real hardware (spidev, GPIO character
//! devices) or for an emulated chip. All methods are blocking.

use crate::error::Result;

/// SPI master connected to the CC3000
///
/// The chip-select line is driven through [`select`](Self::select) and
/// [`unselect`](Self::unselect) rather than per transfer, because one frame
/// spans several transfers.
pub trait SpiBus {
    /// Power up and configure the SPI peripheral
    fn start(&mut self) -> Result<()>;

    /// Release the SPI peripheral
    fn stop(&mut self) -> Result<()>;

    /// Assert chip-select
    fn select(&mut self) -> Result<()>;

    /// Deassert chip-select
    fn unselect(&mut self) -> Result<()>;

    /// Full-duplex transfer; `tx` and `rx` have the same length
    fn exchange(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<()>;

    /// Transmit only, received bytes are discarded
    fn send(&mut self, tx: &[u8]) -> Result<()>;

    /// Receive only, the bus clocks out filler bytes
    fn receive(&mut self, rx: &mut [u8]) -> Result<()>;

    /// Busy-wait or sleep for the specified number of microseconds
    fn delay_us(&mut self, us: u32);
}

/// Output pin that powers the chip on and off
pub trait PowerPin {
    /// Drive the enable pin
    fn set_enabled(&mut self, enabled: bool) -> Result<()>;
}

#[cfg(feature = "alloc")]
impl SpiBus for alloc::boxed::Box<dyn SpiBus + Send> {
    fn start(&mut self) -> Result<()> {
        (**self).start()
    }

    fn stop(&mut self) -> Result<()> {
        (**self).stop()
    }

    fn select(&mut self) -> Result<()> {
        (**self).select()
    }

    fn unselect(&mut self) -> Result<()> {
        (**self).unselect()
    }

    fn exchange(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<()> {
        (**self).exchange(tx, rx)
    }

    fn send(&mut self, tx: &[u8]) -> Result<()> {
        (**self).send(tx)
    }

    fn receive(&mut self, rx: &mut [u8]) -> Result<()> {
        (**self).receive(rx)
    }

    fn delay_us(&mut self, us: u32) {
        (**self).delay_us(us)
    }
}

#[cfg(feature = "alloc")]
impl PowerPin for alloc::boxed::Box<dyn PowerPin + Send> {
    fn set_enabled(&mut self, enabled: bool) -> Result<()> {
        (**self).set_enabled(enabled)
    }
}
