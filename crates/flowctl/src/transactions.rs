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

//! Transaction table for correlating replies with requests.
//!
//! Every request that expects a reply gets a transaction id (xid) from the
//! table together with a deadline. Replies are matched by xid; whatever is
//! still live when its deadline passes is reported by [`TransactionTable::sweep`]
//! so the owner can map it back to a handshake step or an application
//! request.

use flowctl_wire::{MessageType, StatsType};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// An outstanding request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    /// Transaction id carried by the request and its reply.
    pub xid: u32,
    /// Message type the reply must have.
    pub expected_type: MessageType,
    /// Statistics type of a stats request.
    pub sub_type: Option<StatsType>,
    /// When the transaction expires.
    pub deadline: Instant,
}

/// Live transactions of one connection, keyed by xid.
#[derive(Debug)]
pub struct TransactionTable {
    live: HashMap<u32, Transaction>,
    next_xid: u32,
}

impl Default for TransactionTable {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionTable {
    /// Creates an empty table handing out ids from 1.
    #[must_use]
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    /// Creates an empty table whose first id is `xid`.
    #[must_use]
    pub fn starting_at(xid: u32) -> Self {
        Self {
            live: HashMap::new(),
            next_xid: xid,
        }
    }

    /// Registers a request and returns its xid.
    ///
    /// The id is unique among live transactions; the counter wraps and
    /// skips ids still in use.
    pub fn allocate(
        &mut self,
        expected_type: MessageType,
        sub_type: Option<StatsType>,
        timeout: Duration,
        now: Instant,
    ) -> u32 {
        let xid = self.next_free();
        self.live.insert(
            xid,
            Transaction {
                xid,
                expected_type,
                sub_type,
                deadline: now + timeout,
            },
        );
        xid
    }

    /// Returns an xid for a message that expects no reply.
    ///
    /// The id is not recorded, but it never collides with a live
    /// transaction.
    pub fn next_async_xid(&mut self) -> u32 {
        self.next_free()
    }

    fn next_free(&mut self) -> u32 {
        loop {
            let xid = self.next_xid;
            self.next_xid = self.next_xid.wrapping_add(1);
            if !self.live.contains_key(&xid) {
                return xid;
            }
        }
    }

    /// Removes and returns the transaction for `xid`.
    ///
    /// Returns `None` and leaves the table untouched for unknown ids.
    pub fn complete(&mut self, xid: u32) -> Option<Transaction> {
        self.live.remove(&xid)
    }

    /// Returns the transaction for `xid` without removing it.
    #[must_use]
    pub fn peek(&self, xid: u32) -> Option<&Transaction> {
        self.live.get(&xid)
    }

    /// Removes and returns every transaction whose deadline is at or
    /// before `now`, oldest deadline first.
    pub fn sweep(&mut self, now: Instant) -> Vec<Transaction> {
        let expired: Vec<u32> = self
            .live
            .values()
            .filter(|tx| tx.deadline <= now)
            .map(|tx| tx.xid)
            .collect();

        let mut out: Vec<Transaction> = expired
            .into_iter()
            .filter_map(|xid| self.live.remove(&xid))
            .collect();
        out.sort_by_key(|tx| (tx.deadline, tx.xid));
        out
    }

    /// Drops every live transaction.
    pub fn clear(&mut self) {
        self.live.clear();
    }

    /// Earliest deadline among live transactions.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.live.values().map(|tx| tx.deadline).min()
    }

    /// Returns the number of live transactions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.live.len()
    }

    /// Returns true if no transaction is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[test]
    fn allocate_and_complete() {
        let now = Instant::now();
        let mut table = TransactionTable::new();
        let xid = table.allocate(MessageType::FeaturesReply, None, TIMEOUT, now);

        assert_eq!(table.len(), 1);
        let tx = table.complete(xid).expect("transaction should be live");
        assert_eq!(tx.expected_type, MessageType::FeaturesReply);
        assert_eq!(tx.deadline, now + TIMEOUT);
        assert!(table.is_empty());
    }

    #[test]
    fn complete_unknown_is_noop() {
        let now = Instant::now();
        let mut table = TransactionTable::new();
        let xid = table.allocate(MessageType::EchoReply, None, TIMEOUT, now);

        assert!(table.complete(xid.wrapping_add(100)).is_none());
        assert_eq!(table.len(), 1);
        assert!(table.peek(xid).is_some());
    }

    #[test]
    fn ids_are_unique_among_live() {
        let now = Instant::now();
        let mut table = TransactionTable::new();
        let mut seen = std::collections::HashSet::new();
        for _ in 0..1000 {
            let xid = table.allocate(MessageType::BarrierReply, None, TIMEOUT, now);
            assert!(seen.insert(xid), "xid {xid} handed out twice");
        }
    }

    #[test]
    fn counter_wraps_and_skips_live_ids() {
        let now = Instant::now();
        let mut table = TransactionTable::starting_at(u32::MAX - 1);
        let a = table.allocate(MessageType::EchoReply, None, TIMEOUT, now);
        let b = table.allocate(MessageType::EchoReply, None, TIMEOUT, now);
        assert_eq!((a, b), (u32::MAX - 1, u32::MAX));

        let c = table.allocate(MessageType::EchoReply, None, TIMEOUT, now);
        assert_eq!(c, 0);

        // Force the counter back onto live ids.
        table.next_xid = u32::MAX - 1;
        let d = table.allocate(MessageType::EchoReply, None, TIMEOUT, now);
        assert_eq!(d, 1);
    }

    #[test]
    fn async_xids_avoid_live_transactions() {
        let now = Instant::now();
        let mut table = TransactionTable::new();
        let live = table.allocate(MessageType::StatsReply, Some(StatsType::Flow), TIMEOUT, now);
        table.next_xid = live;

        let xid = table.next_async_xid();
        assert_ne!(xid, live);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn sweep_reports_expired_in_deadline_order() {
        let now = Instant::now();
        let mut table = TransactionTable::new();
        let slow = table.allocate(MessageType::StatsReply, Some(StatsType::Port), TIMEOUT * 2, now);
        let fast = table.allocate(MessageType::FeaturesReply, None, TIMEOUT, now);
        let later = table.allocate(MessageType::EchoReply, None, TIMEOUT * 10, now);

        assert!(table.sweep(now).is_empty());
        assert_eq!(table.next_deadline(), Some(now + TIMEOUT));

        let expired = table.sweep(now + TIMEOUT * 2);
        let xids: Vec<u32> = expired.iter().map(|tx| tx.xid).collect();
        assert_eq!(xids, vec![fast, slow]);
        assert_eq!(expired[1].sub_type, Some(StatsType::Port));

        assert_eq!(table.len(), 1);
        assert!(table.peek(later).is_some());
    }

    #[test]
    fn clear_drops_everything() {
        let now = Instant::now();
        let mut table = TransactionTable::new();
        table.allocate(MessageType::GetConfigReply, None, TIMEOUT, now);
        table.allocate(MessageType::RoleReply, None, TIMEOUT, now);
        table.clear();
        assert!(table.is_empty());
        assert_eq!(table.next_deadline(), None);
    }
}
