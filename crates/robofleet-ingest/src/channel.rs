// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Bounded motion handoff between network readers and the tick consumer
//!
//! Many producers offer, one consumer takes. Neither side ever blocks: a full
//! channel resolves by the configured [`OverflowPolicy`], an empty channel
//! yields `None`.

use crate::error::{IngestError, Result};
use crate::sample::MotionSample;
use crossbeam::queue::ArrayQueue;
use robofleet_config::OverflowPolicy;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// What happened to an offered sample
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferOutcome {
    Accepted,
    /// Channel full under `DropNewest`; the offered sample was discarded
    Dropped,
    /// Channel full under `DropOldest`; the oldest pending sample was evicted
    ReplacedOldest,
}

impl OfferOutcome {
    pub fn is_loss(self) -> bool {
        !matches!(self, OfferOutcome::Accepted)
    }
}

#[derive(Default, Debug)]
struct ChannelCounters {
    offered: AtomicU64,
    accepted: AtomicU64,
    dropped: AtomicU64,
    replaced: AtomicU64,
    taken: AtomicU64,
    high_watermark: AtomicUsize,
}

impl ChannelCounters {
    fn record_accept(&self, current_len: usize) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
        self.update_high_watermark(current_len);
    }

    fn update_high_watermark(&self, current_len: usize) {
        let mut previous = self.high_watermark.load(Ordering::Relaxed);
        while current_len > previous {
            match self.high_watermark.compare_exchange(
                previous,
                current_len,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => previous = actual,
            }
        }
    }
}

/// Point-in-time counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelStats {
    pub capacity: usize,
    pub len: usize,
    pub offered: u64,
    pub accepted: u64,
    pub dropped: u64,
    pub replaced: u64,
    pub taken: u64,
    pub high_watermark: usize,
}

pub struct MotionChannel {
    queue: ArrayQueue<MotionSample>,
    policy: OverflowPolicy,
    counters: ChannelCounters,
}

impl std::fmt::Debug for MotionChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MotionChannel")
            .field("capacity", &self.queue.capacity())
            .field("len", &self.queue.len())
            .field("policy", &self.policy)
            .finish()
    }
}

impl MotionChannel {
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Result<Self> {
        if capacity == 0 {
            return Err(IngestError::Config(
                "motion channel capacity must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            queue: ArrayQueue::new(capacity),
            policy,
            counters: ChannelCounters::default(),
        })
    }

    /// Enqueue without blocking
    pub fn offer(&self, sample: MotionSample) -> OfferOutcome {
        self.counters.offered.fetch_add(1, Ordering::Relaxed);

        match self.policy {
            OverflowPolicy::DropNewest => match self.queue.push(sample) {
                Ok(()) => {
                    self.counters.record_accept(self.queue.len());
                    OfferOutcome::Accepted
                }
                Err(_rejected) => {
                    self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                    OfferOutcome::Dropped
                }
            },
            OverflowPolicy::DropOldest => match self.queue.force_push(sample) {
                None => {
                    self.counters.record_accept(self.queue.len());
                    OfferOutcome::Accepted
                }
                Some(_evicted) => {
                    self.counters.replaced.fetch_add(1, Ordering::Relaxed);
                    self.counters.update_high_watermark(self.queue.len());
                    OfferOutcome::ReplacedOldest
                }
            },
        }
    }

    /// Oldest pending sample, or `None` immediately when empty
    pub fn try_take(&self) -> Option<MotionSample> {
        let sample = self.queue.pop();
        if sample.is_some() {
            self.counters.taken.fetch_add(1, Ordering::Relaxed);
        }
        sample
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    /// Discard every pending sample, returning how many were dropped
    pub fn clear(&self) -> usize {
        let mut cleared = 0;
        while self.queue.pop().is_some() {
            cleared += 1;
        }
        cleared
    }

    pub fn stats(&self) -> ChannelStats {
        ChannelStats {
            capacity: self.queue.capacity(),
            len: self.queue.len(),
            offered: self.counters.offered.load(Ordering::Relaxed),
            accepted: self.counters.accepted.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            replaced: self.counters.replaced.load(Ordering::Relaxed),
            taken: self.counters.taken.load(Ordering::Relaxed),
            high_watermark: self.counters.high_watermark.load(Ordering::Relaxed),
        }
    }
}
