//! cc3000-core - Core definitions for the CC3000 SPI transport
//!
//! This crate holds everything about the CC3000 SPI link that does not need
//! threads: the frame codec, the guarded transfer buffers, the transport
//! state table and the hardware traits a backend has to implement. It is
//! `no_std` compatible so the same framing code can run on a microcontroller.
//!
//! # Features
//!
//! - `std` - Enable standard library support (includes `alloc`) and the
//!   interrupt line abstraction in [`irq`]
//! - `alloc` - Enable boxed trait object implementations
//!
//! # Example
//!
//! ```
//! use cc3000_core::frame;
//!
//! let mut buf = [0u8; 16];
//! buf[frame::SPI_HEADER_SIZE..frame::SPI_HEADER_SIZE + 4].copy_from_slice(&[1, 2, 3, 4]);
//! let total = frame::encode_write_header(&mut buf, 4).unwrap();
//! assert_eq!(total, frame::SPI_HEADER_SIZE + 5);
//! assert_eq!(&buf[..5], &[frame::OP_WRITE, 0x00, 0x05, 0x00, 0x00]);
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod bus;
pub mod error;
pub mod frame;
pub mod guard;
#[cfg(feature = "std")]
pub mod irq;
pub mod state;

pub use error::{Error, Result};
