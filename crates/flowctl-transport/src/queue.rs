// Copyright 2024-2026 Farlight Networks, LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Outbound queue with progressive backpressure.
//!
//! A send that cannot be written immediately escalates through
//! [`SendStatus::Congestion`], then a single [`SendStatus::QueueFull`]
//! warning when the queue reaches capacity, and finally
//! [`SendStatus::Dropped`] for every send after that warning. Callers are
//! expected to stop sending once they see anything other than
//! [`SendStatus::Normal`].

use bytes::Bytes;
use std::collections::VecDeque;

/// Outcome of queueing a buffer for transmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SendStatus {
    /// Accepted; the socket is keeping up.
    Normal,
    /// Accepted, but the socket would block.
    Congestion,
    /// Accepted as the last buffer the queue will hold.
    QueueFull,
    /// Not accepted.
    Dropped,
}

impl SendStatus {
    /// Returns true if the buffer was queued or written.
    #[must_use]
    pub const fn is_accepted(self) -> bool {
        !matches!(self, Self::Dropped)
    }

    /// Returns true if the caller should hold off further sends.
    #[must_use]
    pub const fn is_backpressure(self) -> bool {
        !matches!(self, Self::Normal)
    }
}

impl std::fmt::Display for SendStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Normal => write!(f, "normal"),
            Self::Congestion => write!(f, "congestion"),
            Self::QueueFull => write!(f, "queue full"),
            Self::Dropped => write!(f, "dropped"),
        }
    }
}

/// Bounded FIFO of buffers waiting for the socket to become writable.
#[derive(Debug)]
pub struct OutboundQueue {
    bufs: VecDeque<Bytes>,
    capacity: usize,
    would_block: bool,
    full_notified: bool,
}

impl OutboundQueue {
    /// Creates an empty queue holding at most `capacity` buffers.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            bufs: VecDeque::with_capacity(capacity),
            capacity,
            would_block: false,
            full_notified: false,
        }
    }

    /// Appends a buffer and reports the resulting condition.
    pub fn push(&mut self, buf: Bytes) -> SendStatus {
        if self.bufs.len() >= self.capacity && self.full_notified {
            return SendStatus::Dropped;
        }

        self.bufs.push_back(buf);

        if self.bufs.len() >= self.capacity {
            self.full_notified = true;
            SendStatus::QueueFull
        } else if self.would_block {
            SendStatus::Congestion
        } else {
            SendStatus::Normal
        }
    }

    /// Returns the buffer at the head of the queue.
    #[must_use]
    pub fn front(&self) -> Option<&Bytes> {
        self.bufs.front()
    }

    /// Drops the first `n` bytes of the head buffer after a short write.
    pub fn advance(&mut self, n: usize) {
        if let Some(front) = self.bufs.front_mut() {
            let n = n.min(front.len());
            *front = front.slice(n..);
        }
    }

    /// Removes the head buffer.
    pub fn pop(&mut self) -> Option<Bytes> {
        let buf = self.bufs.pop_front();
        if self.bufs.len() < self.capacity {
            self.full_notified = false;
        }
        buf
    }

    /// Records whether the last write attempt would have blocked.
    pub fn set_would_block(&mut self, would_block: bool) {
        self.would_block = would_block;
    }

    /// Returns true if the socket last reported it would block.
    #[must_use]
    pub const fn would_block(&self) -> bool {
        self.would_block
    }

    /// Returns true if the queue-full condition has been reported.
    #[must_use]
    pub const fn full_notified(&self) -> bool {
        self.full_notified
    }

    /// Discards every queued buffer and resets the congestion flags.
    pub fn clear(&mut self) {
        self.bufs.clear();
        self.would_block = false;
        self.full_notified = false;
    }

    /// Number of queued buffers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bufs.len()
    }

    /// Returns true if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bufs.is_empty()
    }

    /// Maximum number of queued buffers.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}
