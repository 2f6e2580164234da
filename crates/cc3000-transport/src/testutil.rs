//! Helpers shared by the transport tests

use std::sync::mpsc::{self, Receiver};
use std::time::Duration;

use cc3000_core::bus::PowerPin;
use cc3000_dummy::{DummyBus, DummyChip, DummyConfig, DummyIrq};

use crate::{Transition, Transport, TransportConfig, TransportState};

pub(crate) const TIMEOUT: Duration = Duration::from_secs(5);

pub(crate) type DummyTransport = Transport<DummyBus, DummyIrq>;

pub(crate) fn quiet_chip() -> DummyChip {
    DummyChip::new(DummyConfig {
        auto_reply: false,
        ..Default::default()
    })
}

pub(crate) fn test_config() -> TransportConfig {
    TransportConfig::default().with_open_settle_ms(0)
}

pub(crate) fn transport(chip: &DummyChip, config: TransportConfig) -> DummyTransport {
    Transport::new(chip.bus(), chip.irq(), config).unwrap()
}

/// Open a session that forwards every frame into a channel
pub(crate) fn open(transport: &DummyTransport) -> Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    transport
        .open(move |frame| {
            let _ = tx.send(frame.to_vec());
        })
        .unwrap();
    rx
}

pub(crate) fn wait_for(transitions: &Receiver<Transition>, state: TransportState) {
    loop {
        let transition = transitions
            .recv_timeout(TIMEOUT)
            .unwrap_or_else(|_| panic!("timed out waiting for {}", state));
        if transition.to == state {
            return;
        }
    }
}

/// Open, power the chip and wait until it reports ready
pub(crate) fn open_powered(
    chip: &DummyChip,
    transport: &DummyTransport,
) -> (Receiver<Vec<u8>>, Receiver<Transition>) {
    let transitions = transport.transitions();
    let frames = open(transport);
    chip.power().set_enabled(true).unwrap();
    wait_for(&transitions, TransportState::Initialized);
    (frames, transitions)
}

/// Open, power up and complete the first write
pub(crate) fn open_idle(
    chip: &DummyChip,
    transport: &DummyTransport,
) -> (Receiver<Vec<u8>>, Receiver<Transition>) {
    let (frames, transitions) = open_powered(chip, transport);
    transport.send(&[0x01, 0x00, 0x40, 0x00]).unwrap();
    assert_eq!(transport.state(), TransportState::Idle);
    (frames, transitions)
}
