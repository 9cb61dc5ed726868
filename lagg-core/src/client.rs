//! The packet source and sink on the local side of the aggregator.
//!
//! A client produces outbound IP packets and consumes inbound ones. The
//! aggregator waits on [`Client::readiness_fd`] and then reads without
//! blocking, so implementations must be non-blocking.

use std::io;
use std::os::fd::RawFd;

pub mod tun;

pub use tun::TunClient;

/// Local packet endpoint driven by the aggregator's event loop.
pub trait Client: Send {
    /// Read the next outbound packet.
    ///
    /// Returns `Ok(None)` when nothing is waiting.
    fn receive_packet(&mut self) -> io::Result<Option<Vec<u8>>>;

    /// Hand an inbound packet to the local side.
    fn send_packet(&mut self, packet: &[u8]) -> io::Result<()>;

    /// Descriptor that becomes readable when a packet can be received.
    fn readiness_fd(&self) -> RawFd;
}
