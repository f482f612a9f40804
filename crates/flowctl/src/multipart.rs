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

//! Reassembly of multipart statistics replies.

use crate::config::DEFAULT_MAX_MULTIPART_PARTS;
use crate::Error;
use flowctl_wire::stats::STATS_MORE;
use flowctl_wire::StatsReply;
use std::collections::HashMap;
use tracing::trace;

/// Buffers reply parts flagged "more" until the final part arrives.
///
/// Parts are joined in arrival order. The transaction of the request
/// stays live until the final part; callers discard a buffer when its
/// transaction expires. A reply may span at most `max_parts` parts.
#[derive(Debug)]
pub struct MultipartAssembler {
    partial: HashMap<u32, Partial>,
    max_parts: usize,
}

#[derive(Debug)]
struct Partial {
    reply: StatsReply,
    parts: usize,
}

impl Default for MultipartAssembler {
    fn default() -> Self {
        Self::with_max_parts(DEFAULT_MAX_MULTIPART_PARTS)
    }
}

impl MultipartAssembler {
    /// Creates an empty assembler with the default part limit.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty assembler that rejects replies spanning more than
    /// `max_parts` parts.
    #[must_use]
    pub fn with_max_parts(max_parts: usize) -> Self {
        Self {
            partial: HashMap::new(),
            max_parts: max_parts.max(1),
        }
    }

    /// Adds one part of the reply to request `xid`.
    ///
    /// Returns the joined reply, with the "more" flag cleared, once the
    /// final part has been added, and `None` while parts are still
    /// expected.
    ///
    /// # Errors
    ///
    /// Returns a protocol violation if a part's type differs from the
    /// earlier parts, the type cannot span several parts, or the reply
    /// grows beyond the part limit. The buffered parts are dropped.
    pub fn push(&mut self, xid: u32, part: StatsReply) -> Result<Option<StatsReply>, Error> {
        let more = part.has_more();
        let mut joined = match self.partial.remove(&xid) {
            Some(mut acc) => {
                if acc.parts >= self.max_parts {
                    return Err(Error::protocol_violation(format!(
                        "multipart reply {xid}: more than {} parts",
                        self.max_parts
                    )));
                }
                let first = acc.reply.body.stats_type();
                if let Err(other) = acc.reply.body.merge(part.body) {
                    return Err(Error::protocol_violation(format!(
                        "multipart reply {xid}: cannot join {:?} part onto {first:?}",
                        other.stats_type()
                    )));
                }
                acc.parts += 1;
                acc
            }
            None => Partial {
                reply: part,
                parts: 1,
            },
        };

        if more {
            trace!(xid, parts = joined.parts, "buffering multipart part");
            self.partial.insert(xid, joined);
            return Ok(None);
        }
        joined.reply.flags &= !STATS_MORE;
        Ok(Some(joined.reply))
    }

    /// Drops any parts buffered for `xid`. Returns true if there were
    /// some.
    pub fn discard(&mut self, xid: u32) -> bool {
        self.partial.remove(&xid).is_some()
    }

    /// Drops all buffered parts.
    pub fn clear(&mut self) {
        self.partial.clear();
    }

    /// Number of replies with parts outstanding.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.partial.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowctl_wire::stats::DescStats;
    use flowctl_wire::{Port, StatsReplyBody};

    fn ports(numbers: &[u32], more: bool) -> StatsReply {
        let ports = numbers
            .iter()
            .map(|&port_no| Port {
                port_no,
                ..Port::default()
            })
            .collect();
        StatsReply {
            flags: if more { STATS_MORE } else { 0 },
            body: StatsReplyBody::PortDesc(ports),
        }
    }

    #[test]
    fn single_part_passes_through() {
        let mut assembler = MultipartAssembler::new();
        let reply = assembler
            .push(7, ports(&[1, 2], false))
            .expect("push should succeed")
            .expect("reply should be complete");
        assert_eq!(reply, ports(&[1, 2], false));
        assert_eq!(assembler.pending(), 0);
    }

    #[test]
    fn parts_are_joined_in_order() {
        let mut assembler = MultipartAssembler::new();
        assert!(assembler
            .push(7, ports(&[1, 2], true))
            .expect("push should succeed")
            .is_none());
        assert!(assembler
            .push(9, ports(&[100], true))
            .expect("push should succeed")
            .is_none());
        assert!(assembler
            .push(7, ports(&[3], true))
            .expect("push should succeed")
            .is_none());

        let reply = assembler
            .push(7, ports(&[4], false))
            .expect("push should succeed")
            .expect("reply should be complete");
        assert!(!reply.has_more());
        assert_eq!(reply, ports(&[1, 2, 3, 4], false));
        assert_eq!(assembler.pending(), 1);
    }

    #[test]
    fn type_change_is_a_violation() {
        let mut assembler = MultipartAssembler::new();
        assembler
            .push(3, ports(&[1], true))
            .expect("push should succeed");
        let err = assembler
            .push(3, StatsReply::new(StatsReplyBody::Desc(DescStats::default())))
            .expect_err("mixed types should fail");
        assert!(matches!(err, Error::ProtocolViolation(_)));
        assert_eq!(assembler.pending(), 0);
    }

    #[test]
    fn part_limit_is_a_violation() {
        let mut assembler = MultipartAssembler::with_max_parts(3);
        for port_no in 1..=3 {
            assert!(assembler
                .push(5, ports(&[port_no], true))
                .expect("push should succeed")
                .is_none());
        }
        let err = assembler
            .push(5, ports(&[4], false))
            .expect_err("a fourth part should fail");
        assert!(matches!(err, Error::ProtocolViolation(_)));
        assert_eq!(assembler.pending(), 0);

        // Exactly at the limit is fine.
        let mut assembler = MultipartAssembler::with_max_parts(2);
        assembler
            .push(6, ports(&[1], true))
            .expect("push should succeed");
        let reply = assembler
            .push(6, ports(&[2], false))
            .expect("push should succeed")
            .expect("reply should be complete");
        assert_eq!(reply, ports(&[1, 2], false));
    }

    #[test]
    fn discard_drops_partial_reply() {
        let mut assembler = MultipartAssembler::new();
        assembler
            .push(3, ports(&[1], true))
            .expect("push should succeed");
        assert!(assembler.discard(3));
        assert!(!assembler.discard(3));

        // A late final part starts from scratch.
        let reply = assembler
            .push(3, ports(&[2], false))
            .expect("push should succeed")
            .expect("reply should be complete");
        assert_eq!(reply, ports(&[2], false));
    }
}
