//! Client backed by a Linux TUN device.
//!
//! # Safety Requirements
//!
//! - Root privileges (or `CAP_NET_ADMIN`) required for device creation
//! - Requires TUN/TAP kernel module loaded (`modprobe tun`)
//! - `/dev/net/tun` must be accessible
//!
//! The device carries raw IP packets (no packet-information prefix) and is
//! switched to non-blocking mode after creation.

use std::io;
use std::os::fd::{AsRawFd, RawFd};

use tun_rs::{DeviceBuilder, SyncDevice};

use super::Client;

/// Default TUN device name
pub const DEFAULT_TUN_NAME: &str = "lagg0";

/// Default TUN MTU
pub const DEFAULT_TUN_MTU: u16 = 1400;

/// Non-blocking TUN device used as the aggregator's client.
pub struct TunClient {
    device: SyncDevice,
    name: String,
    mtu: u16,
    buf: Vec<u8>,
}

impl TunClient {
    /// Create (or attach to) the TUN device `name` with the given MTU.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Root privileges are insufficient
    /// - TUN module is not loaded
    /// - The device cannot be created or made non-blocking
    pub fn new(name: &str, mtu: u16) -> io::Result<Self> {
        let device = DeviceBuilder::new()
            .name(name)
            .mtu(mtu)
            .build_sync()
            .map_err(|e| {
                io::Error::new(
                    io::ErrorKind::PermissionDenied,
                    format!("Failed to create TUN device '{name}' (root privileges required): {e}"),
                )
            })?;

        device.set_nonblocking(true)?;

        let name = device
            .name()
            .map_err(|e| io::Error::other(format!("Failed to get device name: {e}")))?;

        tracing::info!("Created TUN device '{name}' with MTU {mtu}");

        Ok(Self {
            device,
            name,
            mtu,
            buf: vec![0u8; usize::from(mtu) + 64],
        })
    }

    /// Name assigned by the kernel
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mtu(&self) -> u16 {
        self.mtu
    }
}

impl Client for TunClient {
    fn receive_packet(&mut self) -> io::Result<Option<Vec<u8>>> {
        match self.device.recv(&mut self.buf) {
            Ok(0) => Ok(None),
            Ok(n) => Ok(Some(self.buf[..n].to_vec())),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn send_packet(&mut self, packet: &[u8]) -> io::Result<()> {
        if packet.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "Cannot write empty packet",
            ));
        }
        self.device.send(packet)?;
        Ok(())
    }

    fn readiness_fd(&self) -> RawFd {
        self.device.as_raw_fd()
    }
}
