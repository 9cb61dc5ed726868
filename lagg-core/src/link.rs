//! One physical path used for redundant transmission.
//!
//! A link is a raw `AF_PACKET` socket bound to a named interface, filtered to
//! [`ETHERTYPE_LAGG`]. Frames carry their own Ethernet header, so each link
//! knows both its own and its peer's hardware address.
//!
//! # Safety Requirements
//!
//! - `CAP_NET_RAW` (or root) is required to open the socket
//! - The interface must exist and be up
//!
//! Sockets are non-blocking: reads that find no data return `Ok(None)`.

use std::ffi::CString;
use std::fs;
use std::io::{self, Read};
use std::fmt;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::os::unix::net::UnixDatagram;

use socket2::{Domain, Protocol, SockAddr, Socket, Type};

use crate::proto::{FrameHeader, MacAddress, ProtoError, ETHERTYPE_LAGG};

/// MTU assumed when the interface does not report one.
pub const DEFAULT_MTU: usize = 1500;

/// Link setup errors
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("Invalid interface name: {0:?}")]
    InvalidInterface(String),

    #[error("Interface not found: {0}")]
    InterfaceNotFound(String),

    #[error("Failed to read hardware address of '{if_name}': {source}")]
    HardwareAddress {
        if_name: String,
        #[source]
        source: io::Error,
    },

    #[error("Socket setup failed on '{if_name}': {source}")]
    Socket {
        if_name: String,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Address(#[from] ProtoError),
}

/// A bound, non-blocking link socket plus its addressing.
pub struct Link {
    socket: Socket,
    if_name: String,
    own_addr: MacAddress,
    peer_addr: MacAddress,
    mtu: usize,
}

impl Link {
    /// Open a raw socket on `if_name` towards the peer hardware address `peer`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `peer` is not a valid hardware address
    /// - the interface does not exist
    /// - privileges are insufficient to create or bind the socket
    pub fn bind(if_name: &str, peer: &str) -> Result<Self, LinkError> {
        Self::open(if_name, peer.parse()?)
    }

    /// Like [`bind`](Self::bind), with the peer address already parsed.
    pub fn open(if_name: &str, peer_addr: MacAddress) -> Result<Self, LinkError> {
        let c_name =
            CString::new(if_name).map_err(|_| LinkError::InvalidInterface(if_name.to_string()))?;
        // SAFETY: `c_name` is a valid NUL-terminated string for the call.
        let index = unsafe { libc::if_nametoindex(c_name.as_ptr()) };
        if index == 0 {
            return Err(LinkError::InterfaceNotFound(if_name.to_string()));
        }

        let socket_err = |source: io::Error| LinkError::Socket {
            if_name: if_name.to_string(),
            source,
        };

        let protocol = ETHERTYPE_LAGG.to_be();

        let socket = Socket::new(
            Domain::PACKET,
            Type::RAW,
            Some(Protocol::from(libc::c_int::from(protocol))),
        )
        .map_err(socket_err)?;

        // SAFETY: the storage handed to the closure is zeroed and large enough
        // for any socket address, including sockaddr_ll.
        let (_, addr) = unsafe {
            SockAddr::try_init(|storage, len| {
                let sll = storage.cast::<libc::sockaddr_ll>();
                (*sll).sll_family = libc::AF_PACKET as libc::c_ushort;
                (*sll).sll_protocol = protocol;
                (*sll).sll_ifindex = index as libc::c_int;
                *len = std::mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t;
                Ok(())
            })
        }
        .map_err(socket_err)?;

        socket.bind(&addr).map_err(socket_err)?;
        socket.set_nonblocking(true).map_err(socket_err)?;

        let own_addr: MacAddress = read_sysfs(if_name, "address")
            .map_err(|source| LinkError::HardwareAddress {
                if_name: if_name.to_string(),
                source,
            })?
            .parse()?;

        let mtu = read_sysfs(if_name, "mtu")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_MTU);

        tracing::info!("Link '{if_name}' bound: own={own_addr} peer={peer_addr} mtu={mtu}");

        Ok(Self {
            socket,
            if_name: if_name.to_string(),
            own_addr,
            peer_addr,
            mtu,
        })
    }

    /// Wrap an already connected datagram socket.
    pub fn from_socket(
        socket: Socket,
        if_name: &str,
        own_addr: MacAddress,
        peer_addr: MacAddress,
        mtu: usize,
    ) -> io::Result<Self> {
        socket.set_nonblocking(true)?;
        Ok(Self {
            socket,
            if_name: if_name.to_string(),
            own_addr,
            peer_addr,
            mtu,
        })
    }

    /// Two links connected back to back over a Unix datagram socketpair.
    ///
    /// Lets the link manager run without raw sockets (tests, local demos).
    pub fn pair(if_name: &str, a: MacAddress, b: MacAddress) -> io::Result<(Self, Self)> {
        let (sa, sb) = UnixDatagram::pair()?;
        let sa = Socket::from(OwnedFd::from(sa));
        let sb = Socket::from(OwnedFd::from(sb));
        Ok((
            Self::from_socket(sa, if_name, a, b, DEFAULT_MTU)?,
            Self::from_socket(sb, if_name, b, a, DEFAULT_MTU)?,
        ))
    }

    /// Transmit one complete frame.
    pub fn send_frame(&self, frame: &[u8]) -> io::Result<()> {
        let sent = self.socket.send(frame)?;
        if sent != frame.len() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("short send on '{}': {sent} of {} bytes", self.if_name, frame.len()),
            ));
        }
        Ok(())
    }

    /// Read one frame into `buf`.
    ///
    /// Returns `Ok(None)` when no frame is waiting.
    pub fn recv_frame(&self, buf: &mut [u8]) -> io::Result<Option<usize>> {
        match (&self.socket).read(buf) {
            Ok(n) => Ok(Some(n)),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn fd(&self) -> RawFd {
        self.socket.as_raw_fd()
    }

    pub fn if_name(&self) -> &str {
        &self.if_name
    }

    pub fn own_addr(&self) -> MacAddress {
        self.own_addr
    }

    pub fn peer_addr(&self) -> MacAddress {
        self.peer_addr
    }

    pub fn mtu(&self) -> usize {
        self.mtu
    }

    /// Largest payload that fits in one frame on this link.
    pub fn max_payload(&self) -> usize {
        self.mtu.saturating_sub(FrameHeader::SIZE)
    }
}

impl fmt::Debug for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Link")
            .field("if_name", &self.if_name)
            .field("own_addr", &format_args!("{}", self.own_addr))
            .field("peer_addr", &format_args!("{}", self.peer_addr))
            .field("mtu", &self.mtu)
            .finish()
    }
}

fn read_sysfs(if_name: &str, attr: &str) -> io::Result<String> {
    let path = format!("/sys/class/net/{if_name}/{attr}");
    Ok(fs::read_to_string(path)?.trim().to_string())
}
