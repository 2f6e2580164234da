//! cc3000-linux-gpio - Linux GPIO lines for the CC3000
//!
//! This crate provides the CC3000's IRQ input and power-enable output using
//! the Linux character device GPIO interface (gpiocdev), the modern
//! replacement for the deprecated sysfs interface.
//!
//! # Example
//!
//! ```no_run
//! use cc3000_core::bus::PowerPin;
//! use cc3000_linux_gpio::{LinuxGpioIrq, LinuxGpioPower};
//!
//! let irq = LinuxGpioIrq::open("/dev/gpiochip0", 25)?;
//! let mut power = LinuxGpioPower::open("/dev/gpiochip0", 24)?;
//! power.set_enabled(true)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Wiring
//!
//! | CC3000 Pin | GPIO Function   | Description |
//! |------------|-----------------|-------------|
//! | SPI_IRQ    | IRQ (input)     | Active low, falling edge requests service |
//! | VBAT_SW_EN | EN (output)     | Active high power enable |
//!
//! # System Requirements
//!
//! - Linux kernel 5.10+ with GPIO character device support (v2 uAPI)
//! - Access to `/dev/gpiochipN` devices (may require root or udev rules)

pub mod device;
pub mod error;

// Re-exports
pub use device::{parse_options, LinuxGpioConfig, LinuxGpioIrq, LinuxGpioPower};
pub use error::{LinuxGpioError, Result};

/// Boxed IRQ line and power-enable pin
pub type LinuxGpioLines = (
    Box<dyn cc3000_core::irq::IrqLine + Send>,
    Box<dyn cc3000_core::bus::PowerPin + Send>,
);

/// Open the IRQ and power-enable lines
///
/// # Example Options
///
/// - `irq=25` - Required: IRQ line offset
/// - `en=24` - Required: power-enable line offset
/// - `gpiochip=0` - Optional: GPIO chip number (default: 0)
/// - `gpiodev=/dev/gpiochip0` - Optional: GPIO chip path, overrides `gpiochip`
pub fn open_linux_gpio(
    options: &[(&str, &str)],
) -> std::result::Result<LinuxGpioLines, Box<dyn std::error::Error>> {
    let config = parse_options(options)?;
    let irq_line = config.irq.ok_or(LinuxGpioError::MissingParameter("irq"))?;
    let enable_line = config
        .enable
        .ok_or(LinuxGpioError::MissingParameter("en"))?;

    let irq = LinuxGpioIrq::open(&config.device, irq_line)?;
    let power = LinuxGpioPower::open(&config.device, enable_line)?;
    log::info!(
        "linux_gpio: Opened {} (irq={}, en={})",
        config.device,
        irq_line,
        enable_line
    );
    Ok((Box::new(irq), Box::new(power)))
}
