//! cc3000-dummy - Emulated CC3000 co-processor for testing
//!
//! This crate emulates the SPI side of a CC3000: the IRQ line, chip-select
//! handling, the write grant handshake and the framing of inbound packets.
//! It does not run a network stack; commands written by the host are only
//! recorded and, optionally, acknowledged with a command-complete event.
//!
//! A [`DummyChip`] is a cheap handle to the shared chip state. It hands out
//! the three hardware pieces a transport needs ([`DummyBus`], [`DummyIrq`]
//! and [`DummyPower`]) and lets tests queue inbound packets and inspect
//! every bus operation the host performed.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use cc3000_core::bus::{PowerPin, SpiBus};
use cc3000_core::error::{Error, Result};
use cc3000_core::frame::{
    self, HCI_TYPE_COMMAND, HCI_TYPE_DATA, HCI_TYPE_EVENT, MIN_READ_LEN, OP_READ, OP_READ_REPLY,
    OP_WRITE, SPI_HEADER_SIZE,
};
use cc3000_core::irq::{IrqLine, IrqSignal};

/// Configuration for the emulated chip
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// Answer every HCI command with a command-complete event
    pub auto_reply: bool,
    /// Actually sleep in `delay_us` instead of only recording the delay
    pub realtime: bool,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            auto_reply: true,
            realtime: false,
        }
    }
}

impl DummyConfig {
    /// Build a configuration from backend options
    ///
    /// Supported options:
    /// - `autoreply=0|1` - acknowledge commands with an event (default: 1)
    /// - `realtime=0|1` - sleep for requested delays (default: 0)
    pub fn from_options(options: &[(&str, &str)]) -> core::result::Result<Self, String> {
        let mut config = Self::default();
        for &(key, value) in options {
            match key {
                "autoreply" => config.auto_reply = parse_flag(key, value)?,
                "realtime" => config.realtime = parse_flag(key, value)?,
                _ => log::warn!("dummy: unknown option '{}', ignoring", key),
            }
        }
        Ok(config)
    }
}

fn parse_flag(key: &str, value: &str) -> core::result::Result<bool, String> {
    match value {
        "1" | "yes" | "on" | "true" => Ok(true),
        "0" | "no" | "off" | "false" => Ok(false),
        _ => Err(format!("Invalid value for {}: {}", key, value)),
    }
}

/// A bus operation performed by the host, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusOp {
    /// Peripheral started
    Start,
    /// Peripheral stopped
    Stop,
    /// Chip-select asserted
    Select,
    /// Chip-select deasserted
    Unselect,
    /// Full-duplex transfer of this many bytes
    Exchange(usize),
    /// Transmit-only transfer of this many bytes
    Send(usize),
    /// Receive-only transfer of this many bytes
    Receive(usize),
    /// Delay in microseconds
    Delay(u32),
}

#[derive(Default)]
struct Transaction {
    mosi: Vec<u8>,
    served: usize,
}

struct Chip {
    config: DummyConfig,
    powered: bool,
    running: bool,
    irq_low: bool,
    monitor: Option<IrqSignal>,
    selected: bool,
    transaction: Option<Transaction>,
    outbound: VecDeque<Vec<u8>>,
    received: Vec<Vec<u8>>,
    ops: Vec<BusOp>,
    overlapping_selects: usize,
    fail_transfers: bool,
    fail_chip_select: bool,
}

impl Chip {
    fn set_irq(&mut self, low: bool) {
        if low && !self.irq_low {
            self.irq_low = true;
            if let Some(signal) = &self.monitor {
                signal.raise();
            }
        } else if !low {
            self.irq_low = false;
        }
    }

    fn check_transfer(&self) -> Result<()> {
        if self.fail_transfers {
            return Err(Error::BusFailed);
        }
        if !self.running {
            log::warn!("dummy: transfer while the peripheral is stopped");
            return Err(Error::BusFailed);
        }
        Ok(())
    }

    fn serve(&mut self, rx: &mut [u8]) {
        rx.fill(0);
        let Some(txn) = self.transaction.as_mut() else {
            return;
        };
        if txn.mosi.first() != Some(&OP_READ) {
            return;
        }
        if let Some(frame) = self.outbound.front() {
            let start = txn.served.min(frame.len());
            let n = rx.len().min(frame.len() - start);
            rx[..n].copy_from_slice(&frame[start..start + n]);
        }
        txn.served += rx.len();
    }

    fn finish_transaction(&mut self) {
        let Some(txn) = self.transaction.take() else {
            return;
        };
        match txn.mosi.first() {
            Some(&OP_WRITE) => self.accept_write(&txn.mosi),
            Some(&OP_READ) => {
                if txn.served > 0 && self.outbound.pop_front().is_some() {
                    log::trace!("dummy: frame delivered");
                }
            }
            _ => {}
        }
        self.set_irq(false);
        if self.powered && !self.outbound.is_empty() {
            self.set_irq(true);
        }
    }

    fn accept_write(&mut self, mosi: &[u8]) {
        if mosi.len() < SPI_HEADER_SIZE {
            log::warn!("dummy: short write of {} bytes", mosi.len());
            return;
        }
        let declared = usize::from(u16::from_be_bytes([mosi[1], mosi[2]]));
        let end = (SPI_HEADER_SIZE + declared).min(mosi.len());
        let payload = mosi[SPI_HEADER_SIZE..end].to_vec();
        log::debug!("dummy: host wrote {} byte packet", payload.len());

        if self.config.auto_reply && payload.first() == Some(&HCI_TYPE_COMMAND) && payload.len() >= 3
        {
            let reply = [HCI_TYPE_EVENT, payload[1], payload[2], 1, 0x00];
            self.outbound.push_back(wire_frame(&reply));
        }
        self.received.push(payload);
    }
}

/// Wrap an HCI packet into the frame the chip clocks out on a read
///
/// The frame is zero-padded to exactly the length the host will read.
pub fn wire_frame(hci: &[u8]) -> Vec<u8> {
    let mut prefix = [0u8; MIN_READ_LEN];
    let head = hci.len().min(MIN_READ_LEN - SPI_HEADER_SIZE);
    prefix[SPI_HEADER_SIZE..SPI_HEADER_SIZE + head].copy_from_slice(&hci[..head]);
    let total = frame::parse_header(&prefix)
        .map(|h| h.frame_len())
        .unwrap_or(MIN_READ_LEN);

    let mut out = vec![0u8; total.max(SPI_HEADER_SIZE + hci.len())];
    let body_len = u16::try_from(out.len() - SPI_HEADER_SIZE).unwrap_or(u16::MAX);
    let [msb, lsb] = body_len.to_be_bytes();
    out[..SPI_HEADER_SIZE].copy_from_slice(&[OP_READ_REPLY, 0x00, 0x00, msb, lsb]);
    out[SPI_HEADER_SIZE..SPI_HEADER_SIZE + hci.len()].copy_from_slice(hci);
    out
}

/// Handle to an emulated CC3000
#[derive(Clone)]
pub struct DummyChip {
    inner: Arc<Mutex<Chip>>,
}

impl DummyChip {
    /// Create a new powered-off chip
    pub fn new(config: DummyConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Chip {
                config,
                powered: false,
                running: false,
                irq_low: false,
                monitor: None,
                selected: false,
                transaction: None,
                outbound: VecDeque::new(),
                received: Vec::new(),
                ops: Vec::new(),
                overlapping_selects: 0,
                fail_transfers: false,
                fail_chip_select: false,
            })),
        }
    }

    /// Create a chip with the default configuration
    pub fn new_default() -> Self {
        Self::new(DummyConfig::default())
    }

    fn lock(&self) -> MutexGuard<'_, Chip> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// SPI bus connected to this chip
    pub fn bus(&self) -> DummyBus {
        DummyBus { chip: self.clone() }
    }

    /// IRQ line of this chip
    pub fn irq(&self) -> DummyIrq {
        DummyIrq { chip: self.clone() }
    }

    /// Power-enable pin of this chip
    pub fn power(&self) -> DummyPower {
        DummyPower { chip: self.clone() }
    }

    /// Queue a raw HCI packet for the host to read
    pub fn queue_hci(&self, hci: &[u8]) {
        let mut chip = self.lock();
        chip.outbound.push_back(wire_frame(hci));
        if chip.powered {
            chip.set_irq(true);
        }
    }

    /// Queue an HCI event with the given opcode and arguments
    pub fn queue_event(&self, opcode: u16, args: &[u8]) {
        let [lo, hi] = opcode.to_le_bytes();
        let mut hci = vec![HCI_TYPE_EVENT, lo, hi, args.len() as u8];
        hci.extend_from_slice(args);
        self.queue_hci(&hci);
    }

    /// Queue an HCI data packet with the given opcode, arguments and payload
    pub fn queue_data(&self, opcode: u8, args: &[u8], payload: &[u8]) {
        let total = (args.len() + payload.len()) as u16;
        let [lo, hi] = total.to_le_bytes();
        let mut hci = vec![HCI_TYPE_DATA, opcode, args.len() as u8, lo, hi];
        hci.extend_from_slice(args);
        hci.extend_from_slice(payload);
        self.queue_hci(&hci);
    }

    /// Packets written by the host, padding included
    pub fn received(&self) -> Vec<Vec<u8>> {
        self.lock().received.clone()
    }

    /// Every bus operation recorded so far
    pub fn ops(&self) -> Vec<BusOp> {
        self.lock().ops.clone()
    }

    /// Forget recorded bus operations
    pub fn clear_ops(&self) {
        self.lock().ops.clear();
    }

    /// Number of times chip-select was asserted while already asserted
    pub fn overlapping_selects(&self) -> usize {
        self.lock().overlapping_selects
    }

    /// Whether the chip currently holds its IRQ line low
    pub fn irq_asserted(&self) -> bool {
        self.lock().irq_low
    }

    /// Inbound frames not yet read by the host
    pub fn pending_frames(&self) -> usize {
        self.lock().outbound.len()
    }

    /// Make every subsequent transfer fail with [`Error::BusFailed`]
    pub fn fail_transfers(&self, fail: bool) {
        self.lock().fail_transfers = fail;
    }

    /// Make every subsequent deselect fail with [`Error::ChipSelectFailed`]
    ///
    /// Chip-select stays asserted and the transaction stays open.
    pub fn fail_chip_select(&self, fail: bool) {
        self.lock().fail_chip_select = fail;
    }
}

/// SPI bus of a [`DummyChip`]
pub struct DummyBus {
    chip: DummyChip,
}

impl SpiBus for DummyBus {
    fn start(&mut self) -> Result<()> {
        let mut chip = self.chip.lock();
        chip.ops.push(BusOp::Start);
        chip.running = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        let mut chip = self.chip.lock();
        chip.ops.push(BusOp::Stop);
        chip.running = false;
        Ok(())
    }

    fn select(&mut self) -> Result<()> {
        let mut chip = self.chip.lock();
        chip.ops.push(BusOp::Select);
        if chip.selected {
            log::error!("dummy: chip-select asserted twice");
            chip.overlapping_selects += 1;
        }
        chip.selected = true;
        chip.transaction = Some(Transaction::default());
        // An idle chip answers chip-select by granting the write
        if chip.powered && !chip.irq_low && chip.outbound.is_empty() {
            chip.set_irq(true);
        }
        Ok(())
    }

    fn unselect(&mut self) -> Result<()> {
        let mut chip = self.chip.lock();
        chip.ops.push(BusOp::Unselect);
        if chip.fail_chip_select {
            return Err(Error::ChipSelectFailed);
        }
        chip.selected = false;
        chip.finish_transaction();
        Ok(())
    }

    fn exchange(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<()> {
        let mut chip = self.chip.lock();
        chip.ops.push(BusOp::Exchange(tx.len()));
        chip.check_transfer()?;
        if let Some(txn) = chip.transaction.as_mut() {
            txn.mosi.extend_from_slice(tx);
        }
        chip.serve(rx);
        Ok(())
    }

    fn send(&mut self, tx: &[u8]) -> Result<()> {
        let mut chip = self.chip.lock();
        chip.ops.push(BusOp::Send(tx.len()));
        chip.check_transfer()?;
        if let Some(txn) = chip.transaction.as_mut() {
            txn.mosi.extend_from_slice(tx);
        }
        Ok(())
    }

    fn receive(&mut self, rx: &mut [u8]) -> Result<()> {
        let mut chip = self.chip.lock();
        chip.ops.push(BusOp::Receive(rx.len()));
        chip.check_transfer()?;
        chip.serve(rx);
        Ok(())
    }

    fn delay_us(&mut self, us: u32) {
        let realtime = {
            let mut chip = self.chip.lock();
            chip.ops.push(BusOp::Delay(us));
            chip.config.realtime
        };
        if realtime {
            thread::sleep(Duration::from_micros(u64::from(us)));
        }
    }
}

/// IRQ line of a [`DummyChip`]
pub struct DummyIrq {
    chip: DummyChip,
}

impl IrqLine for DummyIrq {
    fn start(&mut self, signal: IrqSignal) -> Result<()> {
        self.chip.lock().monitor = Some(signal);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.chip.lock().monitor = None;
        Ok(())
    }

    fn is_asserted(&self) -> Result<bool> {
        Ok(self.chip.irq_asserted())
    }
}

/// Power-enable pin of a [`DummyChip`]
pub struct DummyPower {
    chip: DummyChip,
}

impl PowerPin for DummyPower {
    fn set_enabled(&mut self, enabled: bool) -> Result<()> {
        let mut chip = self.chip.lock();
        if enabled == chip.powered {
            return Ok(());
        }
        chip.powered = enabled;
        if enabled {
            log::debug!("dummy: powered on");
            // Ready indication after boot
            chip.set_irq(true);
        } else {
            log::debug!("dummy: powered off");
            chip.outbound.clear();
            chip.transaction = None;
            chip.set_irq(false);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cc3000_core::irq;

    fn started_bus(chip: &DummyChip) -> DummyBus {
        let mut bus = chip.bus();
        bus.start().unwrap();
        bus
    }

    #[test]
    fn test_power_on_raises_edge() {
        let chip = DummyChip::new_default();
        let (signal, _rx) = irq::channel();
        chip.irq().start(signal.clone()).unwrap();
        chip.power().set_enabled(true).unwrap();
        assert!(chip.irq_asserted());
        assert_eq!(signal.pending(), 1);
    }

    #[test]
    fn test_edges_lost_without_monitor() {
        let chip = DummyChip::new_default();
        let (signal, _rx) = irq::channel();
        chip.power().set_enabled(true).unwrap();
        chip.irq().start(signal.clone()).unwrap();
        assert!(chip.irq_asserted());
        assert_eq!(signal.pending(), 0);
    }

    #[test]
    fn test_write_recorded_and_acknowledged() {
        let chip = DummyChip::new_default();
        chip.power().set_enabled(true).unwrap();
        let mut bus = started_bus(&chip);

        bus.select().unwrap();
        bus.send(&[OP_WRITE, 0x00, 0x05, 0x00, 0x00]).unwrap();
        bus.send(&[HCI_TYPE_COMMAND, 0x0B, 0x40, 0x00, 0x00]).unwrap();
        bus.unselect().unwrap();

        assert_eq!(
            chip.received(),
            vec![vec![HCI_TYPE_COMMAND, 0x0B, 0x40, 0x00, 0x00]]
        );
        assert_eq!(chip.pending_frames(), 1);
        assert!(chip.irq_asserted());
    }

    #[test]
    fn test_read_serves_queued_frame() {
        let chip = DummyChip::new(DummyConfig {
            auto_reply: false,
            ..Default::default()
        });
        chip.power().set_enabled(true).unwrap();
        chip.queue_event(0x4001, &[0x00, 0x11, 0x22]);
        let mut bus = started_bus(&chip);

        let mut frame = [0u8; 12];
        bus.select().unwrap();
        bus.exchange(&frame::READ_PREAMBLE, &mut frame[..3]).unwrap();
        bus.receive(&mut frame[3..]).unwrap();
        bus.unselect().unwrap();

        assert_eq!(
            &frame[SPI_HEADER_SIZE..],
            &[HCI_TYPE_EVENT, 0x01, 0x40, 0x03, 0x00, 0x11, 0x22]
        );
        assert_eq!(chip.pending_frames(), 0);
    }

    #[test]
    fn test_select_grants_write_when_idle() {
        let chip = DummyChip::new_default();
        chip.power().set_enabled(true).unwrap();
        let mut bus = started_bus(&chip);
        // Finish the boot indication
        bus.select().unwrap();
        bus.send(&[OP_WRITE, 0x00, 0x01, 0x00, 0x00, 0x00]).unwrap();
        bus.unselect().unwrap();
        assert!(!chip.irq_asserted());

        let (signal, _rx) = irq::channel();
        chip.irq().start(signal.clone()).unwrap();
        bus.select().unwrap();
        assert!(chip.irq_asserted());
        assert_eq!(signal.pending(), 1);
    }

    #[test]
    fn test_transfer_fails_when_stopped() {
        let chip = DummyChip::new_default();
        let mut bus = chip.bus();
        bus.select().unwrap();
        assert_eq!(bus.send(&[0x01]), Err(Error::BusFailed));
    }

    #[test]
    fn test_overlapping_select_counted() {
        let chip = DummyChip::new_default();
        let mut bus = chip.bus();
        bus.select().unwrap();
        bus.select().unwrap();
        assert_eq!(chip.overlapping_selects(), 1);
    }

    #[test]
    fn test_wire_frame_padding() {
        // Event with two argument bytes: one in the prefix, one plus padding after
        let framed = wire_frame(&[HCI_TYPE_EVENT, 0x01, 0x40, 0x02, 0xAA, 0xBB]);
        assert_eq!(framed.len(), 12);
        assert_eq!(&framed[..3], &[OP_READ_REPLY, 0x00, 0x00]);
        assert_eq!(&framed[SPI_HEADER_SIZE..], &[0x04, 0x01, 0x40, 0x02, 0xAA, 0xBB, 0x00]);
    }

    #[test]
    fn test_failed_deselect_keeps_chip_selected() {
        let chip = DummyChip::new_default();
        let mut bus = started_bus(&chip);
        chip.fail_chip_select(true);
        bus.select().unwrap();
        assert_eq!(bus.unselect(), Err(Error::ChipSelectFailed));

        chip.fail_chip_select(false);
        bus.select().unwrap();
        assert_eq!(chip.overlapping_selects(), 1);
    }

    #[test]
    fn test_from_options() {
        let config = DummyConfig::from_options(&[("autoreply", "0"), ("realtime", "1")]).unwrap();
        assert!(!config.auto_reply);
        assert!(config.realtime);
        assert!(DummyConfig::from_options(&[("autoreply", "maybe")]).is_err());
    }
}
