//! Wire format for frames exchanged over aggregated links.
//!
//! Frames travel directly in the data link layer, so the header is an
//! Ethernet header followed by a sequence number. All multi-byte fields use
//! network byte order (big-endian).
//!
//! # Frame Format
//!
//! - Destination hardware address (6 bytes)
//! - Source hardware address (6 bytes)
//! - Type tag (2 bytes): always [`ETHERTYPE_LAGG`]
//! - Sequence number (2 bytes)
//! - Payload (variable): one IP packet, unfragmented
//!
//! There is no length field; the payload is whatever remains of the read.

use std::fmt;
use std::str::FromStr;

use crate::seq::SeqNum;

/// Ethertype identifying aggregated frames on the wire.
pub const ETHERTYPE_LAGG: u16 = 0x4242;

/// Length of a hardware (MAC) address.
pub const MAC_ADDR_LEN: usize = 6;

/// Protocol-related errors
#[derive(Debug, thiserror::Error)]
pub enum ProtoError {
    #[error("Invalid hardware address: {0:?}")]
    InvalidMacAddress(String),

    #[error("Frame too short: expected at least {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },
}

/// Hardware (MAC) address of one end of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MacAddress(pub [u8; MAC_ADDR_LEN]);

impl MacAddress {
    pub fn octets(&self) -> [u8; MAC_ADDR_LEN] {
        self.0
    }
}

impl FromStr for MacAddress {
    type Err = ProtoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ProtoError::InvalidMacAddress(s.to_string());

        let mut octets = [0u8; MAC_ADDR_LEN];
        let mut parts = s.trim().split(':');
        for octet in octets.iter_mut() {
            let part = parts.next().ok_or_else(invalid)?;
            if part.is_empty() || part.len() > 2 {
                return Err(invalid());
            }
            *octet = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
        }
        if parts.next().is_some() {
            return Err(invalid());
        }

        Ok(Self(octets))
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

/// Frame header structure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Hardware address of the receiving end
    pub destination: MacAddress,
    /// Hardware address of the sending end
    pub source: MacAddress,
    /// Type tag, [`ETHERTYPE_LAGG`] for our frames
    pub ethertype: u16,
    /// Sequence number shared by every copy of one payload
    pub sequence: SeqNum,
}

impl FrameHeader {
    /// Size of the header in bytes
    pub const SIZE: usize = 16;

    /// Create a header for our ethertype
    pub fn new(destination: MacAddress, source: MacAddress, sequence: SeqNum) -> Self {
        Self {
            destination,
            source,
            ethertype: ETHERTYPE_LAGG,
            sequence,
        }
    }

    /// Encode header to bytes (network byte order)
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..6].copy_from_slice(&self.destination.0);
        buf[6..12].copy_from_slice(&self.source.0);
        buf[12..14].copy_from_slice(&self.ethertype.to_be_bytes());
        buf[14..16].copy_from_slice(&self.sequence.to_be_bytes());
        buf
    }

    /// Decode header from bytes (network byte order)
    pub fn decode(buf: &[u8]) -> Result<Self, ProtoError> {
        if buf.len() < Self::SIZE {
            return Err(ProtoError::Truncated {
                expected: Self::SIZE,
                actual: buf.len(),
            });
        }

        let mut destination = [0u8; MAC_ADDR_LEN];
        destination.copy_from_slice(&buf[0..6]);
        let mut source = [0u8; MAC_ADDR_LEN];
        source.copy_from_slice(&buf[6..12]);

        Ok(Self {
            destination: MacAddress(destination),
            source: MacAddress(source),
            ethertype: u16::from_be_bytes([buf[12], buf[13]]),
            sequence: u16::from_be_bytes([buf[14], buf[15]]),
        })
    }
}

/// Read just the sequence number of a raw frame.
pub fn frame_sequence(frame: &[u8]) -> Option<SeqNum> {
    if frame.len() < FrameHeader::SIZE {
        return None;
    }
    Some(u16::from_be_bytes([frame[14], frame[15]]))
}

/// Build a complete frame (header followed by payload).
pub fn encode_frame(header: &FrameHeader, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(FrameHeader::SIZE + payload.len());
    buf.extend_from_slice(&header.encode());
    buf.extend_from_slice(payload);
    buf
}
