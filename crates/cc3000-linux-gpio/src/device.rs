//! Linux GPIO line implementations
//!
//! `LinuxGpioIrq` watches the CC3000's IRQ line for falling edges on a
//! monitor thread; `LinuxGpioPower` drives the power-enable line.

use crate::error::{LinuxGpioError, Result};

use cc3000_core::bus::PowerPin;
use cc3000_core::error::{Error as CoreError, Result as CoreResult};
use cc3000_core::irq::{IrqLine, IrqSignal};

use gpiocdev::line::{EdgeDetection, Offset, Value};
use gpiocdev::request::{Config, Request};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Consumer label for requested GPIO lines
const CONSUMER: &str = "cc3000";

/// How long the monitor blocks before checking whether it should stop
const EDGE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// GPIO lines of the CC3000 other than the SPI bus
#[derive(Debug, Clone, Default)]
pub struct LinuxGpioConfig {
    /// GPIO chip device path (e.g., "/dev/gpiochip0")
    pub device: String,
    /// IRQ line (input, active low)
    pub irq: Option<Offset>,
    /// Power-enable line (output, active high)
    pub enable: Option<Offset>,
}

struct Monitor {
    stop: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

/// CC3000 IRQ line on a Linux GPIO character device
pub struct LinuxGpioIrq {
    request: Arc<Request>,
    line: Offset,
    monitor: Option<Monitor>,
}

impl LinuxGpioIrq {
    /// Request `line` on `device` as an input with falling-edge detection
    pub fn open(device: &str, line: Offset) -> Result<Self> {
        log::debug!("linux_gpio: Requesting IRQ line {} on {}", line, device);

        let mut cfg = Config::default();
        cfg.with_line(line)
            .as_input()
            .with_edge_detection(EdgeDetection::FallingEdge);
        let request = Request::from_config(cfg)
            .on_chip(device)
            .with_consumer(CONSUMER)
            .request()
            .map_err(|source| LinuxGpioError::LineRequestFailed {
                chip: device.to_string(),
                line,
                source,
            })?;

        Ok(Self {
            request: Arc::new(request),
            line,
            monitor: None,
        })
    }

    fn spawn_monitor(&self, signal: IrqSignal) -> Result<Monitor> {
        let stop = Arc::new(AtomicBool::new(false));
        let request = Arc::clone(&self.request);
        let thread = thread::Builder::new()
            .name("cc3000-irq-monitor".into())
            .spawn({
                let stop = Arc::clone(&stop);
                move || watch_edges(&request, &stop, &signal)
            })
            .map_err(LinuxGpioError::MonitorSpawnFailed)?;
        Ok(Monitor { stop, thread })
    }
}

fn watch_edges(request: &Request, stop: &AtomicBool, signal: &IrqSignal) {
    while !stop.load(Ordering::Acquire) {
        match request.wait_edge_event(EDGE_POLL_INTERVAL) {
            Ok(true) => match request.read_edge_event() {
                Ok(_) => signal.raise(),
                Err(e) => log::error!("linux_gpio: {}", LinuxGpioError::EdgeEventFailed(e)),
            },
            Ok(false) => {}
            Err(e) => {
                log::error!("linux_gpio: {}", LinuxGpioError::EdgeEventFailed(e));
                break;
            }
        }
    }
    log::debug!("linux_gpio: IRQ monitor stopped");
}

impl IrqLine for LinuxGpioIrq {
    fn start(&mut self, signal: IrqSignal) -> CoreResult<()> {
        if self.monitor.is_some() {
            self.stop()?;
        }
        let monitor = self.spawn_monitor(signal).map_err(|e| {
            log::error!("linux_gpio: {}", e);
            CoreError::IrqFailed
        })?;
        self.monitor = Some(monitor);
        Ok(())
    }

    fn stop(&mut self) -> CoreResult<()> {
        if let Some(monitor) = self.monitor.take() {
            monitor.stop.store(true, Ordering::Release);
            if monitor.thread.join().is_err() {
                log::error!("linux_gpio: IRQ monitor panicked");
                return Err(CoreError::IrqFailed);
            }
        }
        Ok(())
    }

    fn is_asserted(&self) -> CoreResult<bool> {
        // IRQ is active low
        match self.request.value(self.line) {
            Ok(value) => Ok(value == Value::Inactive),
            Err(e) => {
                log::error!("linux_gpio: {}", LinuxGpioError::GetValueFailed(e));
                Err(CoreError::IrqFailed)
            }
        }
    }
}

impl Drop for LinuxGpioIrq {
    fn drop(&mut self) {
        let _ = IrqLine::stop(self);
    }
}

/// CC3000 power-enable line on a Linux GPIO character device
pub struct LinuxGpioPower {
    request: Request,
    line: Offset,
}

impl LinuxGpioPower {
    /// Request `line` on `device` as an output, initially off
    pub fn open(device: &str, line: Offset) -> Result<Self> {
        log::debug!("linux_gpio: Requesting enable line {} on {}", line, device);

        let mut cfg = Config::default();
        cfg.with_line(line).as_output(Value::Inactive);
        let request = Request::from_config(cfg)
            .on_chip(device)
            .with_consumer(CONSUMER)
            .request()
            .map_err(|source| LinuxGpioError::LineRequestFailed {
                chip: device.to_string(),
                line,
                source,
            })?;

        Ok(Self { request, line })
    }
}

impl PowerPin for LinuxGpioPower {
    fn set_enabled(&mut self, enabled: bool) -> CoreResult<()> {
        let value = if enabled {
            Value::Active
        } else {
            Value::Inactive
        };
        self.request.set_value(self.line, value).map_err(|e| {
            log::error!("linux_gpio: {}", LinuxGpioError::SetValueFailed(e));
            CoreError::PinFailed
        })?;
        log::debug!("linux_gpio: CC3000 power {}", if enabled { "on" } else { "off" });
        Ok(())
    }
}

/// Parse line options from a list of key-value pairs
///
/// Unrelated keys are ignored so one option string can configure several
/// backends.
pub fn parse_options(options: &[(&str, &str)]) -> std::result::Result<LinuxGpioConfig, String> {
    let mut config = LinuxGpioConfig::default();
    let mut gpiochip: Option<u32> = None;

    for (key, value) in options {
        match *key {
            "gpiodev" => {
                config.device = value.to_string();
            }
            "gpiochip" => {
                gpiochip = Some(
                    value
                        .parse()
                        .map_err(|_| format!("Invalid gpiochip value: {}", value))?,
                );
            }
            "irq" => {
                config.irq = Some(
                    value
                        .parse()
                        .map_err(|_| format!("Invalid irq value: {}", value))?,
                );
            }
            "en" => {
                config.enable = Some(
                    value
                        .parse()
                        .map_err(|_| format!("Invalid en value: {}", value))?,
                );
            }
            _ => {
                log::trace!("linux_gpio: Ignoring option: {}={}", key, value);
            }
        }
    }

    if config.device.is_empty() {
        config.device = format!("/dev/gpiochip{}", gpiochip.unwrap_or(0));
    }
    if config.irq.is_none() {
        return Err("No IRQ line specified. Use irq=N".to_string());
    }
    if config.enable.is_none() {
        return Err("No power-enable line specified. Use en=N".to_string());
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_options() {
        let config =
            parse_options(&[("gpiochip", "1"), ("irq", "25"), ("en", "24"), ("cs", "8")]).unwrap();
        assert_eq!(config.device, "/dev/gpiochip1");
        assert_eq!(config.irq, Some(25));
        assert_eq!(config.enable, Some(24));
    }

    #[test]
    fn test_parse_options_default_chip() {
        let config = parse_options(&[("irq", "25"), ("en", "24")]).unwrap();
        assert_eq!(config.device, "/dev/gpiochip0");
    }

    #[test]
    fn test_parse_options_explicit_device_wins() {
        let config = parse_options(&[
            ("gpiodev", "/dev/gpiochip4"),
            ("gpiochip", "1"),
            ("irq", "25"),
            ("en", "24"),
        ])
        .unwrap();
        assert_eq!(config.device, "/dev/gpiochip4");
    }

    #[test]
    fn test_parse_options_ignores_spidev_path() {
        let config =
            parse_options(&[("dev", "/dev/spidev0.0"), ("irq", "25"), ("en", "24")]).unwrap();
        assert_eq!(config.device, "/dev/gpiochip0");
    }

    #[test]
    fn test_parse_options_missing_lines() {
        assert!(parse_options(&[("en", "24")]).is_err());
        assert!(parse_options(&[("irq", "25")]).is_err());
        assert!(parse_options(&[("irq", "x"), ("en", "24")]).is_err());
    }
}
