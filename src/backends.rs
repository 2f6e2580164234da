//! Backend registration and dispatch
//!
//! A backend string names the hardware and its options, e.g. `dummy` or
//! `linux:spidev=/dev/spidev0.0,cs=8,irq=25,en=24`.

use cc3000_core::bus::{PowerPin, SpiBus};
use cc3000_core::irq::IrqLine;
use cc3000_transport::{Transport, TransportConfig};
use std::error::Error;

/// Bus of any backend
pub type BoxedBus = Box<dyn SpiBus + Send>;
/// IRQ line of any backend
pub type BoxedIrq = Box<dyn IrqLine + Send>;
/// Power-enable pin of any backend
pub type BoxedPower = Box<dyn PowerPin + Send>;
/// Transport over any backend
pub type LinkTransport = Transport<BoxedBus, BoxedIrq>;

/// Information about a backend
pub struct BackendInfo {
    /// Primary name (used for matching)
    pub name: &'static str,
    /// Alternative names
    pub aliases: &'static [&'static str],
    /// Short description
    pub description: &'static str,
}

/// Get information about all backends enabled at compile time
#[allow(unused_mut, clippy::vec_init_then_push)]
pub fn available_backends() -> Vec<BackendInfo> {
    let mut backends = Vec::new();

    #[cfg(feature = "dummy")]
    backends.push(BackendInfo {
        name: "dummy",
        aliases: &["emulator"],
        description: "Emulated CC3000 (autoreply=<0|1>,realtime=<0|1>)",
    });

    #[cfg(feature = "linux")]
    backends.push(BackendInfo {
        name: "linux",
        aliases: &["linux_spi", "spidev"],
        description: "Linux spidev + gpiochip (spidev=<path>,cs=<N>,irq=<N>,en=<N>,gpiochip=<N>,spispeed=<kHz>,mode=<0-3>)",
    });

    backends
}

/// Comma-separated list of backend names for short help text
pub fn backend_names_short() -> String {
    let names: Vec<&str> = available_backends().iter().map(|b| b.name).collect();
    if names.is_empty() {
        "none (rebuild with backend features)".to_string()
    } else {
        names.join(", ")
    }
}

/// Find the primary name of a backend by name or alias
pub fn resolve(name: &str) -> Option<&'static str> {
    available_backends()
        .into_iter()
        .find(|b| b.name == name || b.aliases.contains(&name))
        .map(|b| b.name)
}

/// A parsed backend string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendParams {
    /// Backend name as given
    pub name: String,
    /// Options in the order given
    pub params: Vec<(String, String)>,
}

impl BackendParams {
    /// Borrow the options as the key-value slice the backend crates expect
    pub fn options(&self) -> Vec<(&str, &str)> {
        self.params
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }
}

/// Parse a backend string of the form `name[:key=value,...]`
pub fn parse_backend_params(s: &str) -> Result<BackendParams, Box<dyn Error>> {
    let (name, opts_str) = s.split_once(':').unwrap_or((s, ""));
    if name.is_empty() {
        return Err("Empty backend name".into());
    }

    let mut params = Vec::new();
    if !opts_str.is_empty() {
        for opt in opts_str.split(',') {
            if let Some((key, value)) = opt.split_once('=') {
                params.push((key.to_string(), value.to_string()));
            } else {
                return Err(
                    format!("Invalid parameter format: '{}' (expected key=value)", opt).into(),
                );
            }
        }
    }

    Ok(BackendParams {
        name: name.to_string(),
        params,
    })
}

/// An opened backend: the transport plus the chip's power-enable pin
pub struct Link {
    /// Transport over the backend's bus and IRQ line
    pub transport: LinkTransport,
    /// Power-enable pin
    pub power: BoxedPower,
}

/// Open a backend and build a transport on it
pub fn open_link(backend: &str, config: TransportConfig) -> Result<Link, Box<dyn Error>> {
    let params = parse_backend_params(backend)?;
    let options = params.options();

    let (bus, irq, power): (BoxedBus, BoxedIrq, BoxedPower) = match resolve(&params.name) {
        #[cfg(feature = "dummy")]
        Some("dummy") => open_dummy(&options)?,
        #[cfg(feature = "linux")]
        Some("linux") => open_linux(&options)?,
        _ => {
            return Err(format!(
                "Unknown backend: {} (available: {})",
                params.name,
                backend_names_short()
            )
            .into())
        }
    };

    log::debug!("Opened backend {}", params.name);
    let transport = Transport::new(bus, irq, config)?;
    Ok(Link { transport, power })
}

#[cfg(feature = "dummy")]
fn open_dummy(
    options: &[(&str, &str)],
) -> Result<(BoxedBus, BoxedIrq, BoxedPower), Box<dyn Error>> {
    let config = cc3000_dummy::DummyConfig::from_options(options)?;
    let chip = cc3000_dummy::DummyChip::new(config);
    Ok((
        Box::new(chip.bus()),
        Box::new(chip.irq()),
        Box::new(chip.power()),
    ))
}

#[cfg(feature = "linux")]
fn open_linux(
    options: &[(&str, &str)],
) -> Result<(BoxedBus, BoxedIrq, BoxedPower), Box<dyn Error>> {
    let bus = cc3000_linux_spi::open_linux_spi(options)?;
    let (irq, power) = cc3000_linux_gpio::open_linux_gpio(options)?;
    Ok((bus, irq, power))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_backend_params() {
        let params = parse_backend_params("linux:spidev=/dev/spidev0.0,cs=8").unwrap();
        assert_eq!(params.name, "linux");
        assert_eq!(
            params.options(),
            vec![("spidev", "/dev/spidev0.0"), ("cs", "8")]
        );
    }

    #[test]
    fn test_parse_backend_params_no_options() {
        let params = parse_backend_params("dummy").unwrap();
        assert_eq!(params.name, "dummy");
        assert!(params.params.is_empty());
    }

    #[test]
    fn test_parse_backend_params_invalid() {
        assert!(parse_backend_params("dummy:autoreply").is_err());
        assert!(parse_backend_params(":cs=8").is_err());
    }

    #[test]
    fn test_unknown_backend() {
        assert!(resolve("ch341a").is_none());
        assert!(open_link("ch341a", TransportConfig::default()).is_err());
    }

    #[cfg(feature = "dummy")]
    #[test]
    fn test_resolve_alias() {
        assert_eq!(resolve("emulator"), Some("dummy"));
        assert!(backend_names_short().contains("dummy"));
    }

    #[cfg(feature = "dummy")]
    #[test]
    fn test_open_dummy_link() {
        let config = TransportConfig::default()
            .with_rx_settle_us(0)
            .with_open_settle_ms(0);
        let mut link = open_link("dummy:autoreply=1", config).unwrap();
        let (tx, rx) = std::sync::mpsc::channel();
        link.transport
            .open(move |frame| {
                let _ = tx.send(frame.to_vec());
            })
            .unwrap();
        link.power.set_enabled(true).unwrap();

        link.transport.send(&[0x01, 0x0B, 0x40, 0x00]).unwrap();
        let reply = rx
            .recv_timeout(std::time::Duration::from_secs(5))
            .unwrap();
        assert_eq!(reply, vec![0x04, 0x0B, 0x40, 0x01, 0x00]);

        link.power.set_enabled(false).unwrap();
        link.transport.close().unwrap();
    }

    #[cfg(feature = "dummy")]
    #[test]
    fn test_open_dummy_bad_option() {
        assert!(open_link("dummy:autoreply=maybe", TransportConfig::default()).is_err());
    }
}
