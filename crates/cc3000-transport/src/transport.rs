//! Transport session and shared state

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, OnceLock, PoisonError};
use std::thread::{self, JoinHandle};

use cc3000_core::bus::SpiBus;
use cc3000_core::frame::SPI_HEADER_SIZE;
use cc3000_core::guard::GuardedBuffer;
use cc3000_core::irq::{self, IrqLine, IrqSignal};
use cc3000_core::state::{Transition, TransportState};

use crate::arbiter::BusArbiter;
use crate::config::TransportConfig;
use crate::error::{Result, TransportError};
use crate::fault::{self, Fault};
use crate::worker;

/// Transmit buffer size: the largest CC3000 frame (1519 bytes) plus the guard
pub const TX_BUFFER_SIZE: usize = 1520;
/// Receive buffer size: the largest CC3000 frame (1519 bytes) plus the guard
pub const RX_BUFFER_SIZE: usize = 1520;

pub(crate) type TxBuffer = GuardedBuffer<TX_BUFFER_SIZE>;
pub(crate) type RxBuffer = GuardedBuffer<RX_BUFFER_SIZE>;

type ReceiveCallback = Box<dyn FnMut(&[u8]) + Send>;

/// Per-session bookkeeping, guarded by [`Shared::session`]
pub(crate) struct Session {
    pub(crate) state: TransportState,
    pub(crate) open: bool,
    pub(crate) pause_depth: u32,
    /// Bumped by every `open` so the worker can drop edges from an earlier session
    pub(crate) generation: u64,
    pub(crate) pending_tx_len: usize,
    /// A writer holds chip-select and waits for the grant edge
    pub(crate) awaiting_grant: bool,
    pub(crate) shutdown: bool,
}

impl Session {
    /// Interrupts are serviced while open and not paused
    ///
    /// A pending write grant is serviced even while paused, since the
    /// writer has already asserted chip-select and blocks until granted.
    pub(crate) fn delivering(&self) -> bool {
        self.open && (self.pause_depth == 0 || self.awaiting_grant)
    }
}

pub(crate) struct Shared<B, I> {
    pub(crate) config: TransportConfig,
    session: Mutex<Session>,
    state_changed: Condvar,
    pub(crate) arbiter: BusArbiter<B>,
    pub(crate) irq: Mutex<I>,
    pub(crate) tx: Mutex<Box<TxBuffer>>,
    pub(crate) rx: Mutex<Box<RxBuffer>>,
    pub(crate) rx_bytes: AtomicUsize,
    pub(crate) callback: Mutex<Option<ReceiveCallback>>,
    observers: Mutex<Vec<mpsc::Sender<Transition>>>,
    fault: OnceLock<Fault>,
}

/// Lock a mutex, ignoring poisoning left behind by a halted thread
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<B: SpiBus, I: IrqLine> Shared<B, I> {
    pub(crate) fn session(&self) -> MutexGuard<'_, Session> {
        lock(&self.session)
    }

    /// Block until `condition` turns false
    pub(crate) fn wait_while<'a>(
        &self,
        guard: MutexGuard<'a, Session>,
        condition: impl FnMut(&mut Session) -> bool,
    ) -> MutexGuard<'a, Session> {
        self.state_changed
            .wait_while(guard, condition)
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn notify(&self) {
        self.state_changed.notify_all();
    }

    /// Move to `next`, halting if the state table forbids it
    pub(crate) fn set_state(&self, session: &mut Session, next: TransportState) {
        let from = session.state;
        if !from.can_transition_to(next) {
            self.halt(Fault::IllegalTransition { from, to: next });
        }
        self.enter(session, next);
    }

    fn enter(&self, session: &mut Session, next: TransportState) {
        let transition = Transition {
            from: session.state,
            to: next,
        };
        log::trace!("cc3000: {}", transition);
        session.state = next;
        self.notify();
        lock(&self.observers).retain(|tx| tx.send(transition).is_ok());
    }

    pub(crate) fn halt(&self, fault: Fault) -> ! {
        let _ = self.fault.set(fault);
        fault::halt(fault)
    }

    /// Hand an inbound frame to the receive callback
    pub(crate) fn deliver(&self, frame: &[u8]) {
        match lock(&self.callback).as_mut() {
            Some(callback) => callback(frame),
            None => log::warn!("cc3000: dropping {} byte frame, no receiver", frame.len()),
        }
    }
}

/// Exclusive lease on the transmit buffer
///
/// Fill the payload area and pass the packet to [`Transport::write`].
pub struct TxPacket<'a> {
    pub(crate) buffer: MutexGuard<'a, Box<TxBuffer>>,
}

impl TxPacket<'_> {
    /// The area after the SPI header where the HCI packet goes
    pub fn payload_mut(&mut self) -> &mut [u8] {
        &mut self.buffer.as_mut_slice()[SPI_HEADER_SIZE..]
    }

    /// Largest payload that fits once header and padding are added
    pub fn max_payload(&self) -> usize {
        TxBuffer::CAPACITY - SPI_HEADER_SIZE - 1
    }

    /// The whole transmit buffer, guard byte included
    ///
    /// A write that clobbers the guard halts the transport on the next
    /// [`Transport::write`].
    pub fn raw_mut(&mut self) -> &mut [u8; TX_BUFFER_SIZE] {
        self.buffer.storage_mut()
    }
}

/// SPI transport to a CC3000
///
/// Owns the bus, the IRQ line and a worker thread that services interrupts.
/// The worker lives as long as the transport; sessions are opened and
/// closed any number of times in between.
pub struct Transport<B, I>
where
    B: SpiBus + Send + 'static,
    I: IrqLine + Send + 'static,
{
    pub(crate) shared: Arc<Shared<B, I>>,
    signal: IrqSignal,
    worker: Option<JoinHandle<()>>,
}

impl<B, I> Transport<B, I>
where
    B: SpiBus + Send + 'static,
    I: IrqLine + Send + 'static,
{
    /// Create a transport that owns `bus`
    pub fn new(bus: B, irq: I, config: TransportConfig) -> Result<Self> {
        Self::with_shared_bus(Arc::new(Mutex::new(bus)), irq, config)
    }

    /// Create a transport on a bus shared with other drivers
    ///
    /// Pair this with `bus_exclusive: false` so the peripheral is only
    /// started while the CC3000 is selected.
    pub fn with_shared_bus(bus: Arc<Mutex<B>>, irq: I, config: TransportConfig) -> Result<Self> {
        let (signal, receiver) = irq::channel();
        let shared = Arc::new(Shared {
            arbiter: BusArbiter::new(bus, config.bus_exclusive),
            config,
            session: Mutex::new(Session {
                state: TransportState::PowerUp,
                open: false,
                pause_depth: 0,
                generation: 0,
                pending_tx_len: 0,
                awaiting_grant: false,
                shutdown: false,
            }),
            state_changed: Condvar::new(),
            irq: Mutex::new(irq),
            tx: Mutex::new(Box::default()),
            rx: Mutex::new(Box::default()),
            rx_bytes: AtomicUsize::new(0),
            callback: Mutex::new(None),
            observers: Mutex::new(Vec::new()),
            fault: OnceLock::new(),
        });

        let worker = thread::Builder::new()
            .name("cc3000-irq".into())
            .spawn({
                let shared = Arc::clone(&shared);
                move || worker::run(shared, receiver)
            })
            .map_err(TransportError::Spawn)?;

        Ok(Self {
            shared,
            signal,
            worker: Some(worker),
        })
    }

    /// Start a session
    ///
    /// Clears both buffers, registers `on_receive` for inbound frames and
    /// starts watching the IRQ line. The transport then waits for the chip
    /// to signal that it powered up; the chip must be powered after this
    /// call (or already be asserting IRQ once monitoring starts).
    ///
    /// `on_receive` runs on the worker thread with the HCI bytes of each
    /// frame (SPI header stripped, read padding kept). It must not write to
    /// the transport: the worker is what grants writes.
    ///
    /// The transport pauses itself before every call to `on_receive`. Call
    /// [`resume`](Self::resume) once the frame has been consumed to let the
    /// next one in. Writes are still granted in the meantime.
    ///
    /// Must not be called while a [`TxPacket`] is held or from inside the
    /// receive callback.
    pub fn open<F>(&self, on_receive: F) -> Result<()>
    where
        F: FnMut(&[u8]) + Send + 'static,
    {
        let shared = &self.shared;
        lock(&shared.rx).reset();
        lock(&shared.tx).reset();
        shared.rx_bytes.store(0, Ordering::Relaxed);
        *lock(&shared.callback) = Some(Box::new(on_receive));

        {
            let mut session = shared.session();
            session.open = false;
            session.pause_depth = 0;
            session.pending_tx_len = 0;
            session.awaiting_grant = false;
            session.generation = session.generation.wrapping_add(1);
            shared.enter(&mut session, TransportState::PowerUp);
        }

        let stale = self.signal.clear();
        if stale > 0 {
            log::debug!("cc3000: discarded {} stale interrupt(s)", stale);
        }
        lock(&shared.irq)
            .start(self.signal.clone())
            .map_err(TransportError::Irq)?;
        shared.arbiter.start().map_err(TransportError::Bus)?;

        {
            let mut session = shared.session();
            session.open = true;
            shared.notify();
        }

        thread::sleep(shared.config.open_settle());
        log::info!("cc3000: transport open");
        Ok(())
    }

    /// End the session
    ///
    /// Interrupts stop being serviced and the bus is released. A frame being
    /// read when this is called is finished first.
    pub fn close(&self) -> Result<()> {
        let shared = &self.shared;
        {
            let mut session = shared.session();
            session.open = false;
            shared.notify();
        }
        lock(&shared.irq).stop().map_err(TransportError::Irq)?;
        shared.arbiter.stop().map_err(TransportError::Bus)?;
        log::info!("cc3000: transport closed");
        Ok(())
    }

    /// Stop servicing interrupts until the matching [`resume`](Self::resume)
    ///
    /// Calls nest. Edges arriving meanwhile are kept and serviced on resume,
    /// except the grant of a write already waiting on chip-select.
    pub fn pause(&self) {
        let mut session = self.shared.session();
        session.pause_depth += 1;
        log::trace!("cc3000: pause (depth {})", session.pause_depth);
    }

    /// Undo one [`pause`](Self::pause)
    ///
    /// A resume without a matching pause is ignored.
    pub fn resume(&self) {
        let mut session = self.shared.session();
        match session.pause_depth {
            0 => log::debug!("cc3000: resume without pause ignored"),
            depth => {
                session.pause_depth = depth - 1;
                log::trace!("cc3000: resume (depth {})", session.pause_depth);
                if session.pause_depth == 0 {
                    self.shared.notify();
                }
            }
        }
    }

    /// Lease the transmit buffer
    ///
    /// Blocks while another caller holds it.
    pub fn tx_packet(&self) -> TxPacket<'_> {
        TxPacket {
            buffer: lock(&self.shared.tx),
        }
    }

    /// Current state
    pub fn state(&self) -> TransportState {
        self.shared.session().state
    }

    /// Whether a session is open
    pub fn is_open(&self) -> bool {
        self.shared.session().open
    }

    /// Whether the chip is holding its IRQ line low right now
    pub fn irq_asserted(&self) -> Result<bool> {
        lock(&self.shared.irq)
            .is_asserted()
            .map_err(TransportError::Irq)
    }

    /// Subscribe to state transitions
    pub fn transitions(&self) -> mpsc::Receiver<Transition> {
        let (tx, rx) = mpsc::channel();
        lock(&self.shared.observers).push(tx);
        rx
    }

    /// The fault that halted the worker, if any
    pub fn fault(&self) -> Option<Fault> {
        self.shared.fault.get().copied()
    }

    /// Configuration in use
    pub fn config(&self) -> &TransportConfig {
        &self.shared.config
    }
}

impl<B, I> Drop for Transport<B, I>
where
    B: SpiBus + Send + 'static,
    I: IrqLine + Send + 'static,
{
    fn drop(&mut self) {
        let open = {
            let mut session = self.shared.session();
            session.shutdown = true;
            self.shared.notify();
            session.open
        };
        if open {
            if let Err(e) = self.close() {
                log::warn!("cc3000: close on drop failed: {}", e);
            }
        }
        self.signal.close();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("cc3000: worker thread panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::time::Duration;

    use cc3000_core::bus::PowerPin;
    use cc3000_dummy::BusOp;

    use super::*;
    use crate::testutil::*;

    #[test]
    fn test_new_transport_is_closed() {
        let chip = quiet_chip();
        let transport = transport(&chip, test_config());
        assert!(!transport.is_open());
        assert_eq!(transport.state(), TransportState::PowerUp);
        assert_eq!(transport.fault(), None);
    }

    #[test]
    fn test_open_starts_exclusive_bus_once() {
        let chip = quiet_chip();
        let transport = transport(&chip, test_config());
        let _frames = open(&transport);
        assert!(transport.is_open());
        assert_eq!(chip.ops(), vec![BusOp::Start]);

        transport.close().unwrap();
        assert!(!transport.is_open());
        assert_eq!(chip.ops(), vec![BusOp::Start, BusOp::Stop]);
    }

    #[test]
    fn test_shared_bus_not_started_on_open() {
        let chip = quiet_chip();
        let transport = transport(&chip, test_config().with_bus_exclusive(false));
        let _frames = open(&transport);
        transport.close().unwrap();
        assert!(chip.ops().is_empty());
    }

    #[test]
    fn test_irq_asserted_follows_chip() {
        let chip = quiet_chip();
        let transport = transport(&chip, test_config());
        let _frames = open(&transport);
        assert!(!transport.irq_asserted().unwrap());
        chip.power().set_enabled(true).unwrap();
        assert!(transport.irq_asserted().unwrap());
    }

    #[test]
    fn test_closed_transport_ignores_interrupts() {
        let chip = quiet_chip();
        let transport = transport(&chip, test_config());
        let (frames, _transitions) = open_idle(&chip, &transport);
        transport.close().unwrap();
        chip.clear_ops();

        chip.queue_event(0x4001, &[0x00]);

        assert!(frames.recv_timeout(Duration::from_millis(100)).is_err());
        assert!(chip.ops().is_empty());
        assert_eq!(transport.state(), TransportState::Idle);
    }

    #[test]
    fn test_reopen_drops_edges_from_previous_session() {
        let chip = quiet_chip();
        let transport = transport(&chip, test_config());
        let _frames = open(&transport);

        // The power-up edge is consumed but held back by the pause
        transport.pause();
        chip.power().set_enabled(true).unwrap();
        std::thread::sleep(Duration::from_millis(50));

        let _frames = open(&transport);
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(transport.state(), TransportState::PowerUp);

        let transitions = transport.transitions();
        chip.power().set_enabled(false).unwrap();
        chip.power().set_enabled(true).unwrap();
        wait_for(&transitions, TransportState::Initialized);
    }

    #[test]
    fn test_reopen_replaces_callback() {
        let chip = quiet_chip();
        let transport = transport(&chip, test_config());
        let (old_frames, _transitions) = open_idle(&chip, &transport);
        transport.close().unwrap();
        chip.power().set_enabled(false).unwrap();

        let (new_frames, _transitions) = open_idle(&chip, &transport);
        chip.queue_event(0x4001, &[0x00]);

        assert!(new_frames.recv_timeout(TIMEOUT).is_ok());
        assert!(old_frames.try_recv().is_err());
    }

    #[test]
    fn test_transitions_reported_in_order() {
        let chip = quiet_chip();
        let transport = transport(&chip, test_config());
        let transitions = transport.transitions();
        let (_frames, _) = open_idle(&chip, &transport);

        let states: Vec<TransportState> = transitions.try_iter().map(|t| t.to).collect();
        assert_eq!(
            states,
            vec![
                TransportState::PowerUp,
                TransportState::Initialized,
                TransportState::Idle
            ]
        );
    }

    #[test]
    fn test_dropped_observer_is_forgotten() {
        let chip = quiet_chip();
        let transport = transport(&chip, test_config());
        drop(transport.transitions());
        let _frames = open(&transport);
        assert!(lock(&transport.shared.observers).is_empty());
    }

    #[test]
    fn test_frames_without_callback_are_dropped() {
        let chip = quiet_chip();
        let transport = transport(&chip, test_config());
        let (tx, rx) = mpsc::channel::<()>();
        transport
            .open(move |_| {
                let _ = tx.send(());
            })
            .unwrap();
        *lock(&transport.shared.callback) = None;
        transport.shared.deliver(&[0x04]);
        assert!(rx.try_recv().is_err());
    }
}
