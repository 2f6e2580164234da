//! Interrupt servicing thread
//!
//! One falling edge on IRQ means one of three things depending on the
//! current state: the chip finished powering up, a frame is waiting to be
//! read, or a requested write has been granted.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use cc3000_core::bus::SpiBus;
use cc3000_core::frame::{self, MIN_READ_LEN, READ_PREAMBLE, SPI_HEADER_SIZE};
use cc3000_core::irq::{IrqLine, IrqReceiver};
use cc3000_core::state::TransportState;

use crate::arbiter::Selection;
use crate::fault::Fault;
use crate::transport::{lock, RxBuffer, Shared};

pub(crate) fn run<B: SpiBus, I: IrqLine>(shared: Arc<Shared<B, I>>, irq: IrqReceiver) {
    log::debug!("cc3000: worker started");

    while irq.wait() {
        let mut session = shared.session();
        let generation = session.generation;
        session = shared.wait_while(session, |s| !s.shutdown && !s.delivering());
        if session.shutdown {
            break;
        }
        if session.generation != generation {
            log::debug!("cc3000: dropping interrupt from previous session");
            continue;
        }

        match session.state {
            TransportState::PowerUp => {
                log::debug!("cc3000: chip signalled power-up");
                shared.set_state(&mut session, TransportState::Initialized);
            }
            TransportState::Idle => {
                shared.set_state(&mut session, TransportState::Read);
                drop(session);
                receive(&shared);
            }
            TransportState::WriteRequested => {
                log::trace!("cc3000: granting {} byte write", session.pending_tx_len);
                shared.set_state(&mut session, TransportState::WritePermitted);
            }
            state => shared.halt(Fault::IllegalState(state)),
        }
    }

    log::debug!("cc3000: worker stopped");
}

/// Read one inbound frame and hand it to the callback
fn receive<B: SpiBus, I: IrqLine>(shared: &Shared<B, I>) {
    let mut rx = lock(&shared.rx);
    let result = read_frame(shared, &mut rx);

    if !rx.is_intact() {
        shared.halt(Fault::RxOverflow);
    }
    let received = shared.rx_bytes.swap(0, Ordering::Relaxed);

    {
        let mut session = shared.session();
        shared.set_state(&mut session, TransportState::Idle);
    }

    match result {
        Ok(len) => {
            log::debug!("cc3000: received {} byte frame", received);
            {
                // Held off until the receiver has consumed the frame
                let mut session = shared.session();
                session.pause_depth += 1;
                log::trace!("cc3000: pause for receive (depth {})", session.pause_depth);
            }
            shared.deliver(&rx.as_slice()[SPI_HEADER_SIZE..len]);
        }
        Err(e) => log::error!("cc3000: dropping inbound frame: {}", e),
    }
}

/// Clock a whole frame into `rx`, returning its length on the wire
fn read_frame<B: SpiBus, I: IrqLine>(
    shared: &Shared<B, I>,
    rx: &mut RxBuffer,
) -> cc3000_core::Result<usize> {
    let mut selection = shared.arbiter.select()?;
    let buf = rx.as_mut_slice();

    read_chunk(shared, &mut selection, &mut buf[..MIN_READ_LEN])?;
    let header = frame::parse_header(&buf[..MIN_READ_LEN])?;
    let len = header.frame_len();
    if len > buf.len() {
        if let Err(e) = selection.release() {
            log::error!("cc3000: failed to release SPI bus: {}", e);
        }
        shared.halt(Fault::FrameTooLarge {
            needed: len,
            capacity: buf.len(),
        });
    }

    log::trace!(
        "cc3000: {:?} frame, {} more bytes",
        header.packet_type,
        header.remaining
    );
    if header.remaining > 0 {
        read_chunk(shared, &mut selection, &mut buf[MIN_READ_LEN..len])?;
    }

    selection.delay_us(shared.config.rx_settle_us);
    selection.release()?;
    Ok(len)
}

/// Clock in `chunk`, sending the read preamble over its first bytes
fn read_chunk<B: SpiBus, I: IrqLine>(
    shared: &Shared<B, I>,
    selection: &mut Selection<'_, B>,
    chunk: &mut [u8],
) -> cc3000_core::Result<()> {
    let preamble = chunk.len().min(READ_PREAMBLE.len());
    selection.exchange(&READ_PREAMBLE[..preamble], &mut chunk[..preamble])?;
    if chunk.len() > preamble {
        selection.receive(&mut chunk[preamble..])?;
    }
    shared.rx_bytes.fetch_add(chunk.len(), Ordering::Relaxed);
    Ok(())
}
