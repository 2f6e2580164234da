//! Outbound write path

use std::thread;

use cc3000_core::bus::SpiBus;
use cc3000_core::frame::{self, SPI_HEADER_SIZE};
use cc3000_core::irq::IrqLine;
use cc3000_core::state::TransportState;

use crate::error::{Result, TransportError};
use crate::fault::Fault;
use crate::transport::{Transport, TxPacket};

/// Bytes of the first write sent before the mid-frame delay
const FIRST_WRITE_SPLIT: usize = 4;

impl<B, I> Transport<B, I>
where
    B: SpiBus + Send + 'static,
    I: IrqLine + Send + 'static,
{
    /// Write `len` payload bytes from `packet` to the chip
    ///
    /// Blocks until the frame has been clocked out and the transport is idle
    /// again. If the chip has not powered up yet, waits for it first. There
    /// is no timeout: a chip that never raises IRQ blocks the caller.
    pub fn write(&self, mut packet: TxPacket<'_>, len: usize) -> Result<()> {
        let max = packet.max_payload();
        let total = frame::encode_write_header(packet.buffer.as_mut_slice(), len)
            .map_err(|_| TransportError::PayloadTooLarge { len, max })?;
        if !packet.buffer.is_intact() {
            self.shared.halt(Fault::TxOverflow);
        }
        let data = &packet.buffer.as_slice()[..total];

        let first = {
            let mut session = self.shared.session();
            if !session.open {
                return Err(TransportError::NotOpen);
            }
            if session.state == TransportState::PowerUp {
                log::debug!("cc3000: waiting for the chip to power up");
                session = self
                    .shared
                    .wait_while(session, |s| s.open && s.state == TransportState::PowerUp);
                if !session.open {
                    return Err(TransportError::NotOpen);
                }
            }
            session.state == TransportState::Initialized
        };

        if first {
            self.first_write(data)?;
        } else {
            self.steady_write(data)?;
        }

        let session = self.shared.session();
        drop(
            self.shared
                .wait_while(session, |s| s.open && s.state != TransportState::Idle),
        );
        log::debug!("cc3000: wrote {} byte frame", total);
        Ok(())
    }

    /// Copy `payload` into the transmit buffer and write it
    pub fn send(&self, payload: &[u8]) -> Result<()> {
        let mut packet = self.tx_packet();
        let max = packet.max_payload();
        if payload.len() > max {
            return Err(TransportError::PayloadTooLarge {
                len: payload.len(),
                max,
            });
        }
        packet.payload_mut()[..payload.len()].copy_from_slice(payload);
        self.write(packet, payload.len())
    }

    /// The first write after power-up goes out without a grant
    fn first_write(&self, data: &[u8]) -> Result<()> {
        let delay = self.shared.config.first_write_delay_us;
        let mut selection = self
            .shared
            .arbiter
            .select()
            .map_err(TransportError::Bus)?;

        selection.delay_us(delay);
        selection
            .send(&data[..FIRST_WRITE_SPLIT])
            .map_err(TransportError::Bus)?;
        selection.delay_us(delay);
        selection
            .send(&data[FIRST_WRITE_SPLIT..])
            .map_err(TransportError::Bus)?;

        {
            let mut session = self.shared.session();
            self.shared.set_state(&mut session, TransportState::Idle);
        }
        log::debug!("cc3000: first write complete");
        selection.release().map_err(TransportError::Bus)
    }

    /// Request the bus with chip-select and wait for the chip's grant
    fn steady_write(&self, data: &[u8]) -> Result<()> {
        self.pause();
        {
            let mut session = self.shared.session();
            session = self
                .shared
                .wait_while(session, |s| s.open && s.state != TransportState::Idle);
            if !session.open {
                drop(session);
                self.resume();
                return Err(TransportError::NotOpen);
            }
            self.shared
                .set_state(&mut session, TransportState::WriteRequested);
            session.pending_tx_len = data.len() - SPI_HEADER_SIZE;
        }

        let mut selection = match self.shared.arbiter.select() {
            Ok(selection) => selection,
            Err(e) => {
                self.finish_write();
                self.resume();
                return Err(TransportError::Bus(e));
            }
        };
        {
            let mut session = self.shared.session();
            session.awaiting_grant = true;
            self.shared.notify();
        }
        self.resume();
        thread::yield_now();

        {
            let session = self.shared.session();
            let session = self.shared.wait_while(session, |s| {
                s.open && s.state != TransportState::WritePermitted
            });
            if session.state != TransportState::WritePermitted {
                drop(session);
                self.finish_write();
                drop(selection);
                return Err(TransportError::NotOpen);
            }
        }

        let sent = selection.send(data).map_err(TransportError::Bus);
        self.finish_write();
        selection.release().map_err(TransportError::Bus)?;
        sent
    }

    fn finish_write(&self) {
        let mut session = self.shared.session();
        session.pending_tx_len = 0;
        session.awaiting_grant = false;
        self.shared.set_state(&mut session, TransportState::Idle);
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{self, AssertUnwindSafe};
    use std::thread;
    use std::time::Duration;

    use cc3000_core::bus::PowerPin;
    use cc3000_dummy::{BusOp, DummyChip};

    use super::*;
    use crate::testutil::*;
    use crate::{Transition, TX_BUFFER_SIZE};

    fn first_write_delays(chip: &DummyChip) -> usize {
        chip.ops()
            .iter()
            .filter(|op| **op == BusOp::Delay(50))
            .count()
    }

    #[test]
    fn test_first_write_is_split_with_delays() {
        let chip = quiet_chip();
        let transport = transport(&chip, test_config());
        let _session = open_powered(&chip, &transport);
        chip.clear_ops();

        transport.send(b"CMD").unwrap();

        assert_eq!(
            chip.ops(),
            vec![
                BusOp::Select,
                BusOp::Delay(50),
                BusOp::Send(4),
                BusOp::Delay(50),
                BusOp::Send(4),
                BusOp::Unselect,
            ]
        );
        assert_eq!(chip.received(), vec![b"CMD".to_vec()]);
        assert_eq!(transport.state(), TransportState::Idle);
    }

    #[test]
    fn test_even_payload_is_padded() {
        let chip = quiet_chip();
        let transport = transport(&chip, test_config());
        let _session = open_powered(&chip, &transport);

        transport.send(&[0x01, 0x02, 0x03, 0x04]).unwrap();

        assert_eq!(chip.received(), vec![vec![0x01, 0x02, 0x03, 0x04, 0x00]]);
        assert!(chip.ops().contains(&BusOp::Send(6)));
    }

    #[test]
    fn test_write_waits_for_power_up() {
        let chip = quiet_chip();
        let transport = transport(&chip, test_config());
        let _frames = open(&transport);

        thread::scope(|s| {
            let writer = s.spawn(|| transport.send(b"CMD"));
            thread::sleep(Duration::from_millis(50));
            assert_eq!(transport.state(), TransportState::PowerUp);
            assert!(chip.received().is_empty());

            chip.power().set_enabled(true).unwrap();
            writer.join().unwrap().unwrap();
        });
        assert_eq!(chip.received(), vec![b"CMD".to_vec()]);
    }

    #[test]
    fn test_steady_write_handshake() {
        let chip = quiet_chip();
        let transport = transport(&chip, test_config());
        let (_frames, transitions) = open_idle(&chip, &transport);
        transitions.try_iter().for_each(drop);
        chip.clear_ops();

        transport.send(&[0x01, 0x01, 0x40, 0x00, 0x00]).unwrap();

        assert_eq!(
            chip.ops(),
            vec![BusOp::Select, BusOp::Send(10), BusOp::Unselect]
        );
        let seen: Vec<Transition> = transitions.try_iter().collect();
        assert_eq!(
            seen,
            vec![
                Transition {
                    from: TransportState::Idle,
                    to: TransportState::WriteRequested
                },
                Transition {
                    from: TransportState::WriteRequested,
                    to: TransportState::WritePermitted
                },
                Transition {
                    from: TransportState::WritePermitted,
                    to: TransportState::Idle
                },
            ]
        );
    }

    #[test]
    fn test_write_granted_while_paused() {
        let chip = quiet_chip();
        let transport = transport(&chip, test_config());
        let (frames, _transitions) = open_idle(&chip, &transport);

        transport.pause();
        thread::scope(|s| {
            let writer = s.spawn(|| transport.send(b"CMD"));
            writer.join().unwrap().unwrap();
        });
        assert_eq!(transport.state(), TransportState::Idle);
        assert_eq!(chip.received().last(), Some(&b"CMD".to_vec()));

        // The caller's pause still holds off reads
        chip.queue_event(0x4001, &[0x00]);
        assert!(frames.recv_timeout(Duration::from_millis(100)).is_err());
        transport.resume();
        assert!(frames.recv_timeout(TIMEOUT).is_ok());
    }

    #[test]
    fn test_reply_window_allows_write() {
        let chip = DummyChip::new_default();
        let transport = transport(&chip, test_config());
        let (frames, _transitions) = open_idle(&chip, &transport);

        // Reply to the opening write leaves the transport paused
        frames.recv_timeout(TIMEOUT).unwrap();
        transport.send(&[0x01, 0x05, 0x40, 0x00]).unwrap();
        assert!(frames.recv_timeout(Duration::from_millis(100)).is_err());

        transport.resume();
        assert_eq!(
            frames.recv_timeout(TIMEOUT).unwrap(),
            vec![0x04, 0x05, 0x40, 0x01, 0x00]
        );
    }

    #[test]
    fn test_first_write_once_per_session() {
        let chip = quiet_chip();
        let transport = transport(&chip, test_config());
        let _session = open_idle(&chip, &transport);
        transport.send(b"ONE").unwrap();
        transport.send(b"TWO").unwrap();
        assert_eq!(first_write_delays(&chip), 2);

        transport.close().unwrap();
        chip.power().set_enabled(false).unwrap();
        chip.clear_ops();

        let _session = open_powered(&chip, &transport);
        transport.send(b"ONE").unwrap();
        transport.send(b"TWO").unwrap();
        assert_eq!(first_write_delays(&chip), 2);
        assert_eq!(chip.received().len(), 5);
    }

    #[test]
    fn test_write_when_closed_fails() {
        let chip = quiet_chip();
        let transport = transport(&chip, test_config());
        assert!(matches!(
            transport.send(b"CMD"),
            Err(TransportError::NotOpen)
        ));
        assert!(chip.ops().is_empty());
    }

    #[test]
    fn test_payload_too_large() {
        let chip = quiet_chip();
        let transport = transport(&chip, test_config());
        let _session = open_powered(&chip, &transport);

        let payload = vec![0u8; TX_BUFFER_SIZE - SPI_HEADER_SIZE - 1];
        match transport.send(&payload) {
            Err(TransportError::PayloadTooLarge { len, max }) => {
                assert_eq!(len, 1514);
                assert_eq!(max, 1513);
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(chip.received().is_empty());
    }

    #[test]
    fn test_largest_payload_fits() {
        let chip = quiet_chip();
        let transport = transport(&chip, test_config());
        let _session = open_powered(&chip, &transport);

        transport.send(&[0xA5; 1513]).unwrap();
        assert_eq!(chip.received()[0].len(), 1513);
    }

    #[test]
    #[should_panic(expected = "transmit buffer overflow")]
    fn test_tx_guard_corruption_halts() {
        let chip = quiet_chip();
        let transport = transport(&chip, test_config());
        let _session = open_idle(&chip, &transport);

        let mut packet = transport.tx_packet();
        packet.raw_mut()[TX_BUFFER_SIZE - 1] = 0x00;
        let _ = transport.write(packet, 4);
    }

    #[test]
    fn test_tx_guard_corruption_recorded() {
        let chip = quiet_chip();
        let transport = transport(&chip, test_config());
        let _session = open_idle(&chip, &transport);
        chip.clear_ops();

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            let mut packet = transport.tx_packet();
            packet.raw_mut().fill(0x11);
            let _ = transport.write(packet, 4);
        }));

        assert!(result.is_err());
        assert_eq!(transport.fault(), Some(Fault::TxOverflow));
        assert!(chip.ops().is_empty());
    }

    #[test]
    fn test_bus_failure_returns_error_and_recovers() {
        let chip = quiet_chip();
        let transport = transport(&chip, test_config());
        let _session = open_idle(&chip, &transport);

        chip.fail_transfers(true);
        assert!(matches!(
            transport.send(b"BAD"),
            Err(TransportError::Bus(_))
        ));
        assert_eq!(transport.state(), TransportState::Idle);
        assert_eq!(chip.ops().last(), Some(&BusOp::Unselect));

        chip.fail_transfers(false);
        transport.send(b"OK!").unwrap();
        assert_eq!(chip.received().last(), Some(&b"OK!".to_vec()));
        assert_eq!(transport.fault(), None);
    }

    #[test]
    fn test_shared_bus_started_per_selection() {
        let chip = quiet_chip();
        let transport = transport(&chip, test_config().with_bus_exclusive(false));
        let _session = open_idle(&chip, &transport);
        chip.clear_ops();

        transport.send(b"CMD").unwrap();

        assert_eq!(
            chip.ops(),
            vec![
                BusOp::Start,
                BusOp::Select,
                BusOp::Send(8),
                BusOp::Unselect,
                BusOp::Stop
            ]
        );
    }
}
