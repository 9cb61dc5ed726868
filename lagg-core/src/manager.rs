//! Link manager: redundant transmission and the reception worker.
//!
//! The manager owns every [`Link`], the reorder engine and the ready queue.
//!
//! - **Send**: each payload gets the next sequence number and is written to
//!   every link, one frame per link with that link's addressing.
//! - **Receive**: a background worker waits on all link sockets, reads one
//!   frame per wake from the next ready link in round-robin order, and hands
//!   it to the engine. Delivered payloads are popped with [`LinkManager::recv`]
//!   after [`LinkManager::signal_fd`] becomes readable.

use std::io;
use std::os::fd::{AsRawFd, RawFd};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::link::Link;
use crate::notify::{poll_readiness, Notifier, Readiness};
use crate::proto::{encode_frame, FrameHeader};
use crate::queue::ReadyQueue;
use crate::reorder::{ReorderEngine, ReorderStats};
use crate::seq::{self, SeqNum};
use crate::worker::{ExecMode, PipedWorker, WorkerHandle};

/// Receive buffer size; larger than any link MTU.
const RECV_BUF_SIZE: usize = 65536;

/// Link manager errors
#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    #[error("No links configured")]
    NoLinks,

    #[error("Payload of {size} bytes exceeds link limit of {max} bytes")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Owns the link set, the reorder engine and the reception worker.
pub struct LinkManager {
    links: Arc<Vec<Link>>,
    engine: Arc<ReorderEngine>,
    ready: Arc<ReadyQueue>,
    /// Sequence number for the next send
    tx_seq: SeqNum,
    /// Smallest payload limit across links
    max_payload: usize,
    /// Stopped and joined on drop
    worker: PipedWorker,
}

impl LinkManager {
    /// Take ownership of `links` and start receiving on them.
    pub fn new(links: Vec<Link>, reorder_timeout: Duration) -> Result<Self, ManagerError> {
        let max_payload = links
            .iter()
            .map(Link::max_payload)
            .min()
            .ok_or(ManagerError::NoLinks)?;

        let links = Arc::new(links);
        let signal = Arc::new(Notifier::new()?);
        let ready = Arc::new(ReadyQueue::new(Arc::clone(&signal)));
        let engine = ReorderEngine::new(Arc::clone(&ready), reorder_timeout);

        let mut rx = ReceptionLoop::new(Arc::clone(&links), Arc::clone(&engine));
        let worker = PipedWorker::with_signal("lagg-rx", ExecMode::Repeat, signal, move |h| {
            rx.run_once(h)
        })?;

        tracing::info!(
            "Link manager started: {} link(s), max payload {max_payload} bytes, reorder timeout {reorder_timeout:?}",
            links.len()
        );

        Ok(Self {
            links,
            engine,
            ready,
            tx_seq: 1,
            max_payload,
            worker,
        })
    }

    /// Send one payload redundantly over every link.
    ///
    /// Returns how many links accepted the frame. A failing link is logged and
    /// skipped; the others still transmit.
    pub fn send(&mut self, payload: &[u8]) -> Result<usize, ManagerError> {
        if payload.len() > self.max_payload {
            return Err(ManagerError::PayloadTooLarge {
                size: payload.len(),
                max: self.max_payload,
            });
        }

        let seq = self.tx_seq;
        self.tx_seq = seq::next(seq);

        let mut accepted = 0;
        for link in self.links.iter() {
            let header = FrameHeader::new(link.peer_addr(), link.own_addr(), seq);
            match link.send_frame(&encode_frame(&header, payload)) {
                Ok(()) => accepted += 1,
                Err(e) => tracing::warn!("send seq={seq} on '{}' failed: {e}", link.if_name()),
            }
        }

        tracing::trace!("sent seq={seq} ({} bytes) on {accepted} link(s)", payload.len());
        Ok(accepted)
    }

    /// Pop the next in-order payload, if one is ready.
    pub fn recv(&self) -> Option<Vec<u8>> {
        self.ready.pop()
    }

    /// Descriptor that becomes readable when payloads are ready.
    pub fn signal_fd(&self) -> RawFd {
        self.worker.signal().as_raw_fd()
    }

    /// Consume pending delivery notifications.
    ///
    /// Wakes coalesce, so call [`recv`](Self::recv) until it returns `None`
    /// afterwards.
    pub fn drain_signal(&self) -> io::Result<u64> {
        self.worker.signal().drain()
    }

    pub fn stats(&self) -> ReorderStats {
        self.engine.stats()
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// Sequence number the next send will use.
    pub fn tx_seq(&self) -> SeqNum {
        self.tx_seq
    }

    /// Largest payload accepted by [`send`](Self::send).
    pub fn max_payload(&self) -> usize {
        self.max_payload
    }

    pub fn reorder_timeout(&self) -> Duration {
        self.engine.timeout()
    }
}

/// State owned by the reception worker thread.
struct ReceptionLoop {
    links: Arc<Vec<Link>>,
    engine: Arc<ReorderEngine>,
    /// Links still polled; a hung-up link is dropped for good
    active: Vec<bool>,
    /// Link to try first on the next wake
    cursor: usize,
    buf: Vec<u8>,
}

impl ReceptionLoop {
    fn new(links: Arc<Vec<Link>>, engine: Arc<ReorderEngine>) -> Self {
        Self {
            active: vec![true; links.len()],
            links,
            engine,
            cursor: 0,
            buf: vec![0u8; RECV_BUF_SIZE],
        }
    }

    /// Wait for any link (or a stop request) and service at most one link.
    ///
    /// A ready link is always read, even when `poll` only reported an error or
    /// a hangup: the read consumes a pending socket error, and a hung-up link
    /// that yields no data is removed from the poll set.
    fn run_once(&mut self, handle: &WorkerHandle) {
        let count = self.links.len();
        let polled: Vec<usize> = (0..count).filter(|&i| self.active[i]).collect();
        let mut fds: Vec<RawFd> = polled.iter().map(|&i| self.links[i].fd()).collect();
        fds.push(handle.stop_fd());

        let ready = match poll_readiness(&fds, None) {
            Ok(ready) => ready,
            Err(e) => {
                tracing::warn!("link poll failed: {e}");
                thread::sleep(Duration::from_millis(10));
                return;
            }
        };

        if ready[polled.len()].is_ready() || handle.is_stopped() {
            return;
        }

        let mut by_link = vec![Readiness::default(); count];
        for (pos, &i) in polled.iter().enumerate() {
            by_link[i] = ready[pos];
        }

        let chosen = (0..count)
            .map(|i| (self.cursor + i) % count)
            .find(|&i| by_link[i].is_ready());
        self.cursor = (self.cursor + 1) % count;

        let Some(idx) = chosen else {
            return;
        };
        let link = &self.links[idx];

        let got_frame = match link.recv_frame(&mut self.buf) {
            Ok(Some(n)) if n > 0 => {
                let outcome = self.engine.add(self.buf[..n].to_vec());
                tracing::trace!("rx {n} bytes on '{}': {outcome:?}", link.if_name());
                true
            }
            Ok(_) => false,
            Err(e) => {
                tracing::warn!("receive on '{}' failed: {e}", link.if_name());
                false
            }
        };

        if by_link[idx].hangup && !got_frame {
            self.active[idx] = false;
            tracing::warn!("link '{}' hung up, no longer receiving on it", link.if_name());
            if self.active_links() == 0 {
                tracing::warn!("no links left to receive on");
            }
        }
    }

    fn active_links(&self) -> usize {
        self.active.iter().filter(|a| **a).count()
    }
}
