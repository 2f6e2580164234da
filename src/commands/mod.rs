//! CLI command implementations
//!
//! `listen` and `send` both open a session on a [`Link`], power the chip up
//! and print inbound frames; `send` also writes packets once the chip is up.

mod list;
mod listen;
mod send;

pub use list::list_backends;
pub use listen::run_listen;
pub use send::run_send;

use crate::backends::Link;
use cc3000_core::frame::{self, PacketType};
use std::error::Error;
use std::sync::mpsc::{self, Receiver};

/// Open a session on `link` and switch the chip on
///
/// Frames received by the transport arrive on the returned channel.
fn power_up(link: &mut Link) -> Result<Receiver<Vec<u8>>, Box<dyn Error>> {
    let (tx, rx) = mpsc::channel();
    link.transport.open(move |frame| {
        let _ = tx.send(frame.to_vec());
    })?;
    link.power.set_enabled(true)?;
    Ok(rx)
}

/// Switch the chip off and end the session
fn power_down(link: &mut Link) -> Result<(), Box<dyn Error>> {
    link.power.set_enabled(false)?;
    link.transport.close()?;
    Ok(())
}

/// Format bytes as space-separated hex
pub fn format_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// One-line description of an inbound HCI frame
pub fn describe_frame(hci: &[u8]) -> String {
    let kind = match frame::packet_type(hci) {
        Some(PacketType::Event) if hci.len() >= 3 => {
            format!("event 0x{:04x}", u16::from_le_bytes([hci[1], hci[2]]))
        }
        Some(PacketType::Data) if hci.len() >= 2 => format!("data 0x{:02x}", hci[1]),
        Some(PacketType::Other(t)) => format!("type 0x{:02x}", t),
        _ => "short".to_string(),
    };
    format!("{:<12} [{:4} bytes] {}", kind, hci.len(), format_hex(hci))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_hex() {
        assert_eq!(format_hex(&[0x04, 0x0B, 0x40]), "04 0b 40");
        assert_eq!(format_hex(&[]), "");
    }

    #[test]
    fn test_describe_frame() {
        assert!(describe_frame(&[0x04, 0x0B, 0x40, 0x01, 0x00]).starts_with("event 0x400b"));
        assert!(describe_frame(&[0x02, 0x85, 0x04, 0x06, 0x00]).starts_with("data 0x85"));
        assert!(describe_frame(&[0x07, 0x00]).starts_with("type 0x07"));
        assert!(describe_frame(&[]).starts_with("short"));
    }
}
