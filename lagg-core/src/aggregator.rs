//! Event loop joining a [`Client`] to a [`LinkManager`].
//!
//! The loop runs on the calling thread and multiplexes three descriptors:
//! the client's readiness descriptor, the manager's delivery signal and a
//! shutdown signal. It never touches link sockets itself.

use std::io;
use std::net::Ipv4Addr;
use std::os::fd::AsRawFd;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::client::Client;
use crate::manager::LinkManager;
use crate::notify::{wait_readable, Notifier};

/// Stops a running [`Aggregator::run`] from another thread.
#[derive(Clone)]
pub struct ShutdownHandle {
    signal: Arc<Notifier>,
}

impl ShutdownHandle {
    /// Ask the loop to return. Once triggered the loop stays stopped.
    pub fn trigger(&self) {
        if let Err(e) = self.signal.notify() {
            tracing::warn!("failed to signal shutdown: {e}");
        }
    }
}

/// Moves packets between the client and the links.
pub struct Aggregator<C: Client> {
    client: C,
    manager: LinkManager,
    destination: Ipv4Addr,
    health_interval: Duration,
    shutdown: Arc<Notifier>,
}

impl<C: Client> Aggregator<C> {
    pub fn new(
        client: C,
        manager: LinkManager,
        destination: Ipv4Addr,
        health_interval: Duration,
    ) -> io::Result<Self> {
        Ok(Self {
            client,
            manager,
            destination,
            health_interval,
            shutdown: Arc::new(Notifier::new()?),
        })
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            signal: Arc::clone(&self.shutdown),
        }
    }

    /// Log the proxied destination and every link as `own <--if--> peer`.
    pub fn log_setup(&self) {
        tracing::info!("Proxying traffic destined for {}", self.destination);
        for link in self.manager.links() {
            tracing::info!(
                "  {} <--{}--> {}",
                link.own_addr(),
                link.if_name(),
                link.peer_addr()
            );
        }
    }

    /// Run until the shutdown handle is triggered.
    ///
    /// Only a failing `poll` ends the loop with an error; per-packet failures
    /// are logged and skipped.
    pub fn run(&mut self) -> io::Result<()> {
        let fds = [
            self.client.readiness_fd(),
            self.manager.signal_fd(),
            self.shutdown.as_raw_fd(),
        ];
        let mut last_health = Instant::now();

        loop {
            let ready = wait_readable(&fds, Some(self.health_interval))?;

            if ready[2] {
                tracing::info!("Shutdown requested, leaving event loop");
                return Ok(());
            }

            if ready[0] {
                self.transmit();
            }

            if ready[1] {
                self.deliver();
            }

            if last_health.elapsed() >= self.health_interval {
                self.log_health();
                last_health = Instant::now();
            }
        }
    }

    /// Client to links
    fn transmit(&mut self) {
        match self.client.receive_packet() {
            Ok(Some(packet)) => match self.manager.send(&packet) {
                Ok(0) => tracing::warn!("no link accepted packet ({} bytes)", packet.len()),
                Ok(_) => {}
                Err(e) => tracing::warn!("dropping outbound packet: {e}"),
            },
            Ok(None) => {}
            Err(e) => tracing::warn!("client read failed: {e}"),
        }
    }

    /// Links to client
    fn deliver(&mut self) {
        if let Err(e) = self.manager.drain_signal() {
            tracing::warn!("failed to consume delivery signal: {e}");
        }

        while let Some(payload) = self.manager.recv() {
            if let Err(e) = self.client.send_packet(&payload) {
                tracing::warn!("client write failed ({} bytes): {e}", payload.len());
            }
        }
    }

    fn log_health(&self) {
        let stats = self.manager.stats();
        tracing::info!(
            "health: links={} delivered={} duplicates={} stale={} lost={} next_tx_seq={}",
            self.manager.links().len(),
            stats.delivered,
            stats.duplicates,
            stats.stale,
            stats.lost,
            self.manager.tx_seq()
        );
    }
}
