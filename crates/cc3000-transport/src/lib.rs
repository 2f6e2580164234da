//! cc3000-transport - SPI transport for the CC3000 Wi-Fi co-processor
//!
//! The CC3000 talks HCI over a 4-wire SPI bus plus an active-low IRQ line.
//! This crate owns the bus, the IRQ line and both transfer buffers, and
//! serialises the two directions of traffic:
//!
//! - Inbound frames are read by a dedicated worker thread whenever the chip
//!   pulls IRQ low while the transport is idle. Each frame is handed to the
//!   receive callback registered with [`Transport::open`], after which the
//!   transport stays paused until [`Transport::resume`] is called.
//! - Outbound frames are written by the caller. The very first write of a
//!   session goes out unconditionally; every later write asserts
//!   chip-select and waits for the chip to grant it through an IRQ edge.
//!
//! ```no_run
//! use cc3000_transport::{Transport, TransportConfig};
//! # fn demo<B, I>(bus: B, irq: I) -> cc3000_transport::Result<()>
//! # where B: cc3000_core::bus::SpiBus + Send + 'static,
//! #       I: cc3000_core::irq::IrqLine + Send + 'static {
//! let transport = Transport::new(bus, irq, TransportConfig::default())?;
//! transport.open(|frame| println!("received {} bytes", frame.len()))?;
//! transport.send(&[0x01, 0x0B, 0x40, 0x00])?;
//! transport.close()?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod arbiter;
mod config;
mod error;
mod fault;
#[cfg(test)]
mod testutil;
mod transport;
mod worker;
mod write;

pub use arbiter::{BusArbiter, Selection};
pub use config::TransportConfig;
pub use error::{Result, TransportError};
pub use fault::Fault;
pub use transport::{Transport, TxPacket, RX_BUFFER_SIZE, TX_BUFFER_SIZE};

pub use cc3000_core::state::{Transition, TransportState};
