//! CC3000 SPI frame codec
//!
//! Every SPI transaction with the CC3000 starts with a 5-byte SPI header
//! followed by an HCI packet. Outbound frames carry a big-endian length and
//! are padded so the whole transfer is an even number of bytes. Inbound
//! frames are read in two steps: a fixed 10-byte prefix (SPI header plus the
//! first 5 HCI bytes) and then a remainder whose size depends on the HCI
//! packet type found in that prefix.

use crate::error::{Error, Result};

// ============================================================================
// SPI header
// ============================================================================

/// Size of the SPI header preceding every HCI packet
pub const SPI_HEADER_SIZE: usize = 5;

/// Opcode of a host-to-chip write transaction
pub const OP_WRITE: u8 = 0x01;
/// Opcode of a chip-to-host read transaction
pub const OP_READ: u8 = 0x03;
/// Opcode the chip clocks back in the SPI header of a read
pub const OP_READ_REPLY: u8 = 0x02;
/// Filler byte clocked out while the chip is busy
pub const BUSY: u8 = 0x00;

/// First bytes clocked out at the start of every read transaction
pub const READ_PREAMBLE: [u8; 3] = [OP_READ, BUSY, BUSY];

// ============================================================================
// HCI packet layout (offsets relative to the HCI region)
// ============================================================================

/// HCI packet type byte
pub const HCI_PACKET_TYPE_OFFSET: usize = 0;
/// 8-bit argument length of an event packet
pub const HCI_EVENT_LENGTH_OFFSET: usize = 3;
/// 16-bit little-endian payload length of a data packet
pub const HCI_DATA_LENGTH_OFFSET: usize = 3;

/// HCI command packet type
pub const HCI_TYPE_COMMAND: u8 = 0x01;
/// HCI data packet type
pub const HCI_TYPE_DATA: u8 = 0x02;
/// HCI event packet type
pub const HCI_TYPE_EVENT: u8 = 0x04;

/// SPI header plus the fixed HCI event header
pub const EVENT_HEADERS_SIZE: usize = SPI_HEADER_SIZE + 5;
/// Number of bytes read before the remaining length is known
pub const MIN_READ_LEN: usize = EVENT_HEADERS_SIZE;

/// HCI packet type of an inbound frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    /// HCI data packet (socket payload)
    Data,
    /// HCI event packet (command completion or unsolicited event)
    Event,
    /// Any other type byte
    Other(u8),
}

impl PacketType {
    /// Decode the HCI packet type byte
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            HCI_TYPE_DATA => Self::Data,
            HCI_TYPE_EVENT => Self::Event,
            other => Self::Other(other),
        }
    }
}

/// Classify an HCI packet by its first byte
pub fn packet_type(hci: &[u8]) -> Option<PacketType> {
    hci.get(HCI_PACKET_TYPE_OFFSET)
        .copied()
        .map(PacketType::from_byte)
}

// ============================================================================
// Outbound frames
// ============================================================================

/// Length of a write payload after padding
///
/// The chip expects the total transfer (header plus payload) to be an even
/// number of bytes; with a 5-byte header this means an even payload gets one
/// byte of padding.
pub fn padded_write_len(payload_len: usize) -> usize {
    if payload_len % 2 == 0 {
        payload_len + 1
    } else {
        payload_len
    }
}

/// Stamp the SPI write header in front of a payload
///
/// `buf` must hold the payload at `buf[SPI_HEADER_SIZE..]`. Returns the
/// total number of bytes to transfer, header and padding included.
pub fn encode_write_header(buf: &mut [u8], payload_len: usize) -> Result<usize> {
    let padded = padded_write_len(payload_len);
    let wire_len = u16::try_from(padded).map_err(|_| Error::LengthTooLarge)?;
    let total = SPI_HEADER_SIZE + padded;
    if buf.len() < total {
        return Err(Error::BufferTooSmall);
    }

    let [msb, lsb] = wire_len.to_be_bytes();
    buf[..SPI_HEADER_SIZE].copy_from_slice(&[OP_WRITE, msb, lsb, 0x00, 0x00]);
    Ok(total)
}

// ============================================================================
// Inbound frames
// ============================================================================

/// What the fixed 10-byte prefix of an inbound frame tells us
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InboundHeader {
    /// HCI packet type
    pub packet_type: PacketType,
    /// Bytes still to read after the prefix, padding included
    pub remaining: usize,
}

impl InboundHeader {
    /// Total frame length on the wire, SPI header included
    pub fn frame_len(&self) -> usize {
        MIN_READ_LEN + self.remaining
    }
}

/// Remaining length of a data packet declaring `declared` payload bytes
pub fn data_remaining(declared: usize) -> usize {
    if (EVENT_HEADERS_SIZE + declared) % 2 == 0 {
        declared + 1
    } else {
        declared
    }
}

/// Remaining length of an event packet declaring `declared` argument bytes
///
/// One argument byte is already part of the fixed prefix.
pub fn event_remaining(declared: u8) -> usize {
    let mut remaining = i32::from(declared) - 1;
    if (EVENT_HEADERS_SIZE as i32 + remaining) & 1 != 0 {
        remaining += 1;
    }
    remaining.max(0) as usize
}

/// Parse the fixed prefix of an inbound frame
///
/// Packet types other than data and event carry no remainder.
pub fn parse_header(prefix: &[u8]) -> Result<InboundHeader> {
    if prefix.len() < MIN_READ_LEN {
        return Err(Error::BufferTooSmall);
    }

    let hci = &prefix[SPI_HEADER_SIZE..MIN_READ_LEN];
    let packet_type = PacketType::from_byte(hci[HCI_PACKET_TYPE_OFFSET]);
    let remaining = match packet_type {
        PacketType::Data => {
            let declared = u16::from_le_bytes([
                hci[HCI_DATA_LENGTH_OFFSET],
                hci[HCI_DATA_LENGTH_OFFSET + 1],
            ]);
            data_remaining(usize::from(declared))
        }
        PacketType::Event => event_remaining(hci[HCI_EVENT_LENGTH_OFFSET]),
        PacketType::Other(_) => 0,
    };

    Ok(InboundHeader {
        packet_type,
        remaining,
    })
}
