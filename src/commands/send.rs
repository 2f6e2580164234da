//! Send command implementation

use super::{describe_frame, format_hex, power_down, power_up};
use crate::backends::{Link, LinkTransport};
use std::error::Error;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

/// Write each packet in turn and print the frames that arrive within `wait`
///
/// The first packet goes out once the chip has signalled power-up.
pub fn run_send(mut link: Link, packets: &[Vec<u8>], wait: Duration) -> Result<(), Box<dyn Error>> {
    let frames = power_up(&mut link)?;

    for packet in packets {
        link.transport.send(packet)?;
        println!("sent         [{:4} bytes] {}", packet.len(), format_hex(packet));
        print_replies(&link.transport, &frames, wait);
    }

    power_down(&mut link)?;
    Ok(())
}

fn print_replies(transport: &LinkTransport, frames: &Receiver<Vec<u8>>, wait: Duration) {
    let deadline = Instant::now() + wait;
    while let Some(left) = deadline.checked_duration_since(Instant::now()) {
        match frames.recv_timeout(left) {
            Ok(frame) => {
                println!("{}", describe_frame(&frame));
                transport.resume();
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

#[cfg(all(test, feature = "dummy"))]
mod tests {
    use super::*;
    use crate::backends::open_link;
    use cc3000_transport::{TransportConfig, TransportState};

    #[test]
    fn test_run_send_on_dummy() {
        let config = TransportConfig::default()
            .with_rx_settle_us(0)
            .with_open_settle_ms(0);
        let link = open_link("dummy", config).unwrap();
        let packets = vec![vec![0x01, 0x0B, 0x40, 0x00], vec![0x01, 0x0C, 0x40, 0x00]];
        run_send(link, &packets, Duration::from_millis(50)).unwrap();
    }

    #[test]
    fn test_print_replies_releases_each_frame() {
        let config = TransportConfig::default()
            .with_rx_settle_us(0)
            .with_open_settle_ms(0);
        let mut link = open_link("dummy", config).unwrap();
        let frames = power_up(&mut link).unwrap();

        link.transport.send(&[0x01, 0x0B, 0x40, 0x00]).unwrap();
        print_replies(&link.transport, &frames, Duration::from_millis(200));
        link.transport.send(&[0x01, 0x0C, 0x40, 0x00]).unwrap();
        assert_eq!(
            frames.recv_timeout(Duration::from_secs(5)).unwrap(),
            vec![0x04, 0x0C, 0x40, 0x01, 0x00]
        );
        power_down(&mut link).unwrap();
    }

    #[test]
    fn test_power_up_reaches_initialized() {
        let config = TransportConfig::default()
            .with_rx_settle_us(0)
            .with_open_settle_ms(0);
        let mut link = open_link("dummy", config).unwrap();
        let transitions = link.transport.transitions();
        let _frames = power_up(&mut link).unwrap();

        loop {
            let transition = transitions.recv_timeout(Duration::from_secs(5)).unwrap();
            if transition.to == TransportState::Initialized {
                break;
            }
        }
        power_down(&mut link).unwrap();
    }
}
