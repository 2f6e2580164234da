//! Linux SPI device implementation
//!
//! This module provides the `LinuxSpiBus` struct that implements the
//! `SpiBus` trait using Linux's spidev interface. Chip-select is driven
//! through a GPIO line because a CC3000 frame spans several transfers and
//! spidev only holds its own chip-select for the duration of one message.

use crate::error::{LinuxSpiError, Result};

use cc3000_core::bus::SpiBus;
use cc3000_core::error::{Error as CoreError, Result as CoreResult};

use gpiocdev::line::{Offset, Value};
use gpiocdev::request::{Config, Request};

use std::fs::{File, OpenOptions};
use std::os::unix::io::AsRawFd;

/// Default SPI clock speed in Hz (4 MHz)
const DEFAULT_SPEED_HZ: u32 = 4_000_000;

/// Default GPIO chip carrying the chip-select line
const DEFAULT_GPIOCHIP: &str = "/dev/gpiochip0";

/// Consumer label for requested GPIO lines
const CONSUMER: &str = "cc3000";

/// SPI mode constants
pub mod mode {
    /// SPI mode 0: CPOL=0, CPHA=0
    pub const MODE_0: u8 = 0;
    /// SPI mode 1: CPOL=0, CPHA=1 (what the CC3000 expects)
    pub const MODE_1: u8 = 1;
    /// SPI mode 2: CPOL=1, CPHA=0
    pub const MODE_2: u8 = 2;
    /// SPI mode 3: CPOL=1, CPHA=1
    pub const MODE_3: u8 = 3;
    /// Leave the controller's own chip-select alone
    pub const NO_CS: u8 = 0x40;
}

/// Linux spidev ioctl constants
mod ioctl {
    use nix::ioctl_write_ptr;

    // SPI ioctl magic number
    const SPI_IOC_MAGIC: u8 = b'k';

    // SPI ioctl type numbers
    const SPI_IOC_TYPE_MODE: u8 = 1;
    const SPI_IOC_TYPE_BITS_PER_WORD: u8 = 3;
    const SPI_IOC_TYPE_MAX_SPEED_HZ: u8 = 4;

    ioctl_write_ptr!(spi_ioc_wr_mode, SPI_IOC_MAGIC, SPI_IOC_TYPE_MODE, u8);
    ioctl_write_ptr!(
        spi_ioc_wr_bits_per_word,
        SPI_IOC_MAGIC,
        SPI_IOC_TYPE_BITS_PER_WORD,
        u8
    );
    ioctl_write_ptr!(
        spi_ioc_wr_max_speed_hz,
        SPI_IOC_MAGIC,
        SPI_IOC_TYPE_MAX_SPEED_HZ,
        u32
    );

    // SPI_IOC_MESSAGE(n) = _IOW(SPI_IOC_MAGIC, 0, char[n * sizeof(struct spi_ioc_transfer)])

    /// Size of struct spi_ioc_transfer
    pub const SPI_IOC_TRANSFER_SIZE: usize = 32;

    /// Calculate ioctl number for SPI_IOC_MESSAGE(n)
    pub fn spi_ioc_message(n: u8) -> libc::c_ulong {
        let size = (n as usize) * SPI_IOC_TRANSFER_SIZE;
        // _IOC(dir, type, nr, size) = ((dir)<<30)|((size)<<16)|((type)<<8)|(nr), _IOC_WRITE = 1
        ((1u32 << 30) | ((size as u32) << 16) | ((SPI_IOC_MAGIC as u32) << 8)) as libc::c_ulong
    }
}

/// SPI transfer structure for ioctl
/// This must match the kernel's struct spi_ioc_transfer layout
#[repr(C)]
#[derive(Debug, Default, Clone)]
struct SpiIocTransfer {
    tx_buf: u64,          // __u64 tx_buf
    rx_buf: u64,          // __u64 rx_buf
    len: u32,             // __u32 len
    speed_hz: u32,        // __u32 speed_hz
    delay_usecs: u16,     // __u16 delay_usecs
    bits_per_word: u8,    // __u8 bits_per_word
    cs_change: u8,        // __u8 cs_change
    tx_nbits: u8,         // __u8 tx_nbits
    rx_nbits: u8,         // __u8 rx_nbits
    word_delay_usecs: u8, // __u8 word_delay_usecs
    _pad: u8,             // padding
}

/// Configuration for opening the CC3000 SPI bus
#[derive(Debug, Clone)]
pub struct LinuxSpiConfig {
    /// Device path (e.g., "/dev/spidev0.0")
    pub device: String,
    /// SPI clock speed in Hz (default: 4 MHz)
    pub speed_hz: u32,
    /// SPI mode (0-3, default: 1)
    pub mode: u8,
    /// GPIO chip carrying the chip-select line
    pub gpiochip: String,
    /// Chip-select line offset (active low)
    pub cs: Option<Offset>,
}

impl Default for LinuxSpiConfig {
    fn default() -> Self {
        Self {
            device: String::new(),
            speed_hz: DEFAULT_SPEED_HZ,
            mode: mode::MODE_1,
            gpiochip: DEFAULT_GPIOCHIP.to_string(),
            cs: None,
        }
    }
}

impl LinuxSpiConfig {
    /// Create a new configuration with the given device path and chip-select line
    pub fn new(device: impl Into<String>, cs: Offset) -> Self {
        Self {
            device: device.into(),
            cs: Some(cs),
            ..Default::default()
        }
    }

    /// Set the SPI clock speed in Hz
    pub fn with_speed(mut self, speed_hz: u32) -> Self {
        self.speed_hz = speed_hz;
        self
    }

    /// Set the SPI mode (0-3)
    pub fn with_mode(mut self, mode: u8) -> Self {
        self.mode = mode;
        self
    }

    /// Set the GPIO chip carrying the chip-select line
    pub fn with_gpiochip(mut self, gpiochip: impl Into<String>) -> Self {
        self.gpiochip = gpiochip.into();
        self
    }
}

/// CC3000 SPI bus on Linux spidev with a GPIO chip-select
pub struct LinuxSpiBus {
    /// File handle for spidev device
    file: File,
    /// Chip-select line request
    cs_request: Request,
    /// Chip-select line offset
    cs: Offset,
    /// Current speed in Hz
    speed_hz: u32,
    /// Configured SPI mode
    mode: u8,
}

impl LinuxSpiBus {
    /// Open the spidev device and request the chip-select line
    pub fn open(config: &LinuxSpiConfig) -> Result<Self> {
        if config.device.is_empty() {
            return Err(LinuxSpiError::NoDevice);
        }
        let cs = config.cs.ok_or_else(|| {
            LinuxSpiError::InvalidParameter("chip-select line required (cs=N)".into())
        })?;
        if config.mode > mode::MODE_3 {
            return Err(LinuxSpiError::InvalidParameter(format!(
                "SPI mode {} (must be 0-3)",
                config.mode
            )));
        }

        log::debug!("linux_spi: Opening device {}", config.device);

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&config.device)
            .map_err(|e| LinuxSpiError::OpenFailed {
                path: config.device.clone(),
                source: e,
            })?;

        // CS is active low and starts deasserted
        let mut cs_config = Config::default();
        cs_config.with_line(cs).as_output(Value::Active);
        let cs_request = Request::from_config(cs_config)
            .on_chip(&config.gpiochip)
            .with_consumer(CONSUMER)
            .request()
            .map_err(LinuxSpiError::ChipSelectFailed)?;

        let mut bus = Self {
            file,
            cs_request,
            cs,
            speed_hz: config.speed_hz,
            mode: config.mode,
        };
        bus.configure()?;

        log::info!(
            "linux_spi: Opened {} (mode={}, speed={} kHz, cs={}:{})",
            config.device,
            config.mode,
            config.speed_hz / 1000,
            config.gpiochip,
            cs
        );
        Ok(bus)
    }

    /// Apply mode, word size and clock speed
    fn configure(&mut self) -> Result<()> {
        let fd = self.file.as_raw_fd();

        let mode = self.mode | mode::NO_CS;
        unsafe {
            ioctl::spi_ioc_wr_mode(fd, &mode).map_err(|e| LinuxSpiError::SetModeFailed {
                mode,
                source: std::io::Error::from_raw_os_error(e as i32),
            })?;
        }

        let bits: u8 = 8;
        unsafe {
            ioctl::spi_ioc_wr_bits_per_word(fd, &bits).map_err(|e| {
                LinuxSpiError::SetBitsPerWordFailed {
                    bits,
                    source: std::io::Error::from_raw_os_error(e as i32),
                }
            })?;
        }

        let speed = self.speed_hz;
        unsafe {
            ioctl::spi_ioc_wr_max_speed_hz(fd, &speed).map_err(|e| {
                LinuxSpiError::SetSpeedFailed {
                    speed,
                    source: std::io::Error::from_raw_os_error(e as i32),
                }
            })?;
        }
        Ok(())
    }

    /// Perform one SPI_IOC_MESSAGE transfer
    ///
    /// Either buffer may be absent; the kernel clocks out zeros when there
    /// is nothing to send and discards input when there is nowhere to put it.
    fn spi_transfer(&mut self, tx: Option<&[u8]>, rx: Option<&mut [u8]>, len: usize) -> Result<()> {
        if len == 0 {
            return Ok(());
        }
        let len = u32::try_from(len)
            .map_err(|_| LinuxSpiError::InvalidParameter(format!("transfer of {} bytes", len)))?;

        let transfer = SpiIocTransfer {
            tx_buf: tx.map_or(0, |b| b.as_ptr() as u64),
            rx_buf: rx.map_or(0, |b| b.as_mut_ptr() as u64),
            len,
            speed_hz: self.speed_hz,
            bits_per_word: 8,
            ..Default::default()
        };

        let ioctl_num = ioctl::spi_ioc_message(1);
        let ret = unsafe {
            libc::ioctl(
                self.file.as_raw_fd(),
                ioctl_num,
                &transfer as *const SpiIocTransfer,
            )
        };
        if ret < 0 {
            return Err(LinuxSpiError::TransferFailed(
                std::io::Error::last_os_error(),
            ));
        }
        Ok(())
    }

    fn set_cs(&mut self, active: bool) -> Result<()> {
        // CS is active low
        let value = if active {
            Value::Inactive
        } else {
            Value::Active
        };
        self.cs_request
            .set_value(self.cs, value)
            .map_err(LinuxSpiError::ChipSelectFailed)?;
        Ok(())
    }

    /// Get current speed setting
    pub fn speed_hz(&self) -> u32 {
        self.speed_hz
    }
}

fn bus_error(e: LinuxSpiError) -> CoreError {
    log::error!("linux_spi: {}", e);
    match e {
        LinuxSpiError::ChipSelectFailed(_) => CoreError::ChipSelectFailed,
        LinuxSpiError::SetModeFailed { .. }
        | LinuxSpiError::SetBitsPerWordFailed { .. }
        | LinuxSpiError::SetSpeedFailed { .. } => CoreError::BusConfigFailed,
        _ => CoreError::BusFailed,
    }
}

impl SpiBus for LinuxSpiBus {
    fn start(&mut self) -> CoreResult<()> {
        // Another driver may have reconfigured a shared controller
        self.configure().map_err(bus_error)
    }

    fn stop(&mut self) -> CoreResult<()> {
        self.set_cs(false).map_err(bus_error)
    }

    fn select(&mut self) -> CoreResult<()> {
        self.set_cs(true).map_err(bus_error)
    }

    fn unselect(&mut self) -> CoreResult<()> {
        self.set_cs(false).map_err(bus_error)
    }

    fn exchange(&mut self, tx: &[u8], rx: &mut [u8]) -> CoreResult<()> {
        if tx.len() != rx.len() {
            return Err(bus_error(LinuxSpiError::InvalidParameter(format!(
                "exchange of {} bytes into {} byte buffer",
                tx.len(),
                rx.len()
            ))));
        }
        let len = tx.len();
        self.spi_transfer(Some(tx), Some(rx), len)
            .map_err(bus_error)
    }

    fn send(&mut self, tx: &[u8]) -> CoreResult<()> {
        self.spi_transfer(Some(tx), None, tx.len())
            .map_err(bus_error)
    }

    fn receive(&mut self, rx: &mut [u8]) -> CoreResult<()> {
        let len = rx.len();
        self.spi_transfer(None, Some(rx), len).map_err(bus_error)
    }

    fn delay_us(&mut self, us: u32) {
        std::thread::sleep(std::time::Duration::from_micros(us as u64));
    }
}

/// Parse bus options from a list of key-value pairs
///
/// Unrelated keys are ignored so one option string can configure several
/// backends.
pub fn parse_options(options: &[(&str, &str)]) -> std::result::Result<LinuxSpiConfig, String> {
    let mut config = LinuxSpiConfig::default();

    for (key, value) in options {
        match *key {
            "dev" | "spidev" => {
                config.device = value.to_string();
            }
            "spispeed" => {
                // Parse speed in kHz
                let speed_khz: u32 = value
                    .parse()
                    .map_err(|_| format!("Invalid spispeed value: {}", value))?;
                config.speed_hz = speed_khz * 1000;
            }
            "mode" => {
                let mode: u8 = value
                    .parse()
                    .map_err(|_| format!("Invalid mode value: {}", value))?;
                if mode > 3 {
                    return Err(format!("Invalid SPI mode: {} (must be 0-3)", mode));
                }
                config.mode = mode;
            }
            "gpiochip" => {
                let n: u32 = value
                    .parse()
                    .map_err(|_| format!("Invalid gpiochip value: {}", value))?;
                config.gpiochip = format!("/dev/gpiochip{}", n);
            }
            "cs" => {
                config.cs = Some(
                    value
                        .parse()
                        .map_err(|_| format!("Invalid cs value: {}", value))?,
                );
            }
            _ => {
                log::trace!("linux_spi: Ignoring option: {}={}", key, value);
            }
        }
    }

    if config.device.is_empty() {
        return Err("No device specified. Use spidev=/dev/spidevX.Y".to_string());
    }
    if config.cs.is_none() {
        return Err("No chip-select line specified. Use cs=N".to_string());
    }

    Ok(config)
}
