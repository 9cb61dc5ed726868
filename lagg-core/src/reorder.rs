//! Reorder buffer with duplicate suppression and timeout-bounded gaps.
//!
//! Every payload is sent over all links, so the same sequence number usually
//! arrives several times and in no particular order. This module keeps the
//! first copy of each sequence number, holds frames that arrive ahead of a
//! gap, and delivers payloads to the [`ReadyQueue`] strictly in ascending
//! sequence order.
//!
//! There is no retransmission. When a frame arrives out of order a deferred
//! flush is scheduled for it; when that fires, any sequence numbers still
//! missing before it are given up as lost. The reorder timeout is therefore
//! the worst-case latency a gap can add.

use std::collections::VecDeque;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;

use crate::proto::{frame_sequence, FrameHeader};
use crate::queue::ReadyQueue;
use crate::seq::{self, is_recent, seq_distance, SeqNum};
use crate::timer::DeferredTimer;

/// Default time a gap may hold back later frames.
pub const DEFAULT_REORDER_TIMEOUT: Duration = Duration::from_millis(50);

/// What happened to a frame handed to [`ReorderEngine::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// In sequence; delivered together with any buffered successors.
    Flushed,
    /// Ahead of a gap; buffered and a deferred flush scheduled.
    Buffered,
    /// Already buffered (a redundant copy); dropped.
    Duplicate,
    /// Already delivered or outside the recency window; dropped.
    Stale,
    /// Shorter than a frame header; dropped.
    Truncated,
}

/// Counters describing engine activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReorderStats {
    /// Payloads pushed to the ready queue
    pub delivered: u64,
    /// Redundant copies dropped
    pub duplicates: u64,
    /// Old, out-of-window or truncated frames dropped
    pub stale: u64,
    /// Sequence numbers skipped by a timed flush
    pub lost: u64,
}

struct ReorderState {
    /// Last delivered (or skipped) sequence number
    rx_seq: SeqNum,
    /// Slot `i` holds the frame for `rx_seq + 1 + i`
    slots: VecDeque<Option<Vec<u8>>>,
    stats: ReorderStats,
}

/// Sequence-keyed reordering and deduplication engine.
pub struct ReorderEngine {
    state: Mutex<ReorderState>,
    ready: Arc<ReadyQueue>,
    timeout: Duration,
    this: Weak<ReorderEngine>,
}

impl ReorderEngine {
    /// Create an engine expecting sequence number 1 next.
    pub fn new(ready: Arc<ReadyQueue>, timeout: Duration) -> Arc<Self> {
        Self::with_rx_seq(ready, timeout, 0)
    }

    /// Create an engine whose last delivered sequence number is `rx_seq`.
    pub fn with_rx_seq(ready: Arc<ReadyQueue>, timeout: Duration, rx_seq: SeqNum) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            state: Mutex::new(ReorderState {
                rx_seq,
                slots: VecDeque::new(),
                stats: ReorderStats::default(),
            }),
            ready,
            timeout,
            this: this.clone(),
        })
    }

    /// Accept one received frame (header included).
    ///
    /// Ownership of the buffer moves into the engine; it is either stored,
    /// delivered, or dropped here.
    pub fn add(&self, frame: Vec<u8>) -> AddOutcome {
        let mut state = self.state.lock();

        let Some(seq) = frame_sequence(&frame) else {
            state.stats.stale += 1;
            tracing::trace!("dropping truncated frame ({} bytes)", frame.len());
            return AddOutcome::Truncated;
        };

        if !is_recent(seq, state.rx_seq) {
            state.stats.stale += 1;
            tracing::trace!("dropping stale seq={seq} (rx_seq={})", state.rx_seq);
            return AddOutcome::Stale;
        }

        let idx = (seq_distance(state.rx_seq, seq) - 1) as usize;
        if idx >= state.slots.len() {
            state.slots.resize_with(idx + 1, || None);
        }

        if state.slots[idx].is_some() {
            state.stats.duplicates += 1;
            tracing::trace!("dropping duplicate seq={seq}");
            return AddOutcome::Duplicate;
        }
        state.slots[idx] = Some(frame);

        if idx == 0 {
            self.flush_locked(&mut state, seq);
            return AddOutcome::Flushed;
        }
        drop(state);

        let engine = self.this.clone();
        let scheduled = DeferredTimer::schedule(self.timeout, move || {
            if let Some(engine) = engine.upgrade() {
                engine.flush(seq);
            }
        });
        if let Err(e) = scheduled {
            // Without its own timer this frame waits for the gap to fill or for
            // a later frame's timer, which can exceed the reorder timeout.
            tracing::warn!("failed to schedule flush for seq={seq}: {e}");
        }

        AddOutcome::Buffered
    }

    /// Deliver everything up to and including `upto`, skipping gaps.
    ///
    /// Buffered frames directly following `upto` are delivered in the same
    /// pass. Targets that have already been passed are ignored, so repeated
    /// flushes never deliver anything twice.
    pub fn flush(&self, upto: SeqNum) {
        let mut state = self.state.lock();
        self.flush_locked(&mut state, upto);
    }

    fn flush_locked(&self, state: &mut ReorderState, upto: SeqNum) {
        let dist = seq_distance(state.rx_seq, upto) as usize;
        if dist > state.slots.len() {
            return;
        }

        for _ in 0..dist {
            self.advance(state);
        }

        while matches!(state.slots.front(), Some(Some(_))) {
            self.advance(state);
        }
    }

    /// Evict the front slot, delivering its payload if present.
    fn advance(&self, state: &mut ReorderState) {
        state.rx_seq = seq::next(state.rx_seq);

        match state.slots.pop_front().flatten() {
            Some(mut frame) => {
                frame.drain(..FrameHeader::SIZE);
                self.ready.push(frame);
                state.stats.delivered += 1;
            }
            None => {
                state.stats.lost += 1;
                tracing::debug!("seq={} lost after reorder timeout", state.rx_seq);
            }
        }
    }

    /// Last delivered sequence number.
    pub fn rx_seq(&self) -> SeqNum {
        self.state.lock().rx_seq
    }

    /// Number of frames buffered behind a gap.
    pub fn pending(&self) -> usize {
        self.state.lock().slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn stats(&self) -> ReorderStats {
        self.state.lock().stats
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}
