//! cc3000-linux-spi - Linux spidev bus for the CC3000
//!
//! This crate drives the CC3000's SPI bus through the `/dev/spidevX.Y`
//! character device, with chip-select on a separate GPIO line.
//!
//! # Example
//!
//! ```no_run
//! use cc3000_linux_spi::{LinuxSpiBus, LinuxSpiConfig};
//!
//! // spidev0.0 at 4 MHz, mode 1, chip-select on GPIO 8 of gpiochip0
//! let config = LinuxSpiConfig::new("/dev/spidev0.0", 8).with_speed(4_000_000);
//! let bus = LinuxSpiBus::open(&config)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # System Requirements
//!
//! - Linux kernel with spidev support enabled (`CONFIG_SPI_SPIDEV`)
//! - Read/write access to `/dev/spidevX.Y` and `/dev/gpiochipN`
//! - An SPI controller that honours `SPI_NO_CS`, or a spidev node whose
//!   hardware chip-select is not wired to the CC3000

pub mod device;
pub mod error;

// Re-exports
pub use device::{mode, parse_options, LinuxSpiBus, LinuxSpiConfig};
pub use error::{LinuxSpiError, Result};

/// Open a Linux SPI bus and return it boxed
///
/// # Example Options
///
/// - `spidev=/dev/spidev0.0` - Required: device path
/// - `cs=8` - Required: chip-select GPIO line
/// - `gpiochip=0` - Optional: GPIO chip of the chip-select line (default: 0)
/// - `spispeed=4000` - Optional: speed in kHz (default: 4000)
/// - `mode=1` - Optional: SPI mode 0-3 (default: 1)
pub fn open_linux_spi(
    options: &[(&str, &str)],
) -> std::result::Result<Box<dyn cc3000_core::bus::SpiBus + Send>, Box<dyn std::error::Error>> {
    let config = parse_options(options)?;
    let bus = LinuxSpiBus::open(&config)?;
    Ok(Box::new(bus))
}
