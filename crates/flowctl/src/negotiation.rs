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

//! Hello negotiation.
//!
//! Both ends open with a hello stamped with their highest version. 1.3
//! speakers add a version bitmap; when both sides sent one, the highest
//! version in both bitmaps wins. Otherwise the lower of the two header
//! versions is used, provided this side supports it.
//!
//! These functions perform no I/O; the connection driver feeds them the
//! first frame from the peer and sends whatever they return.

use crate::error::NegotiationError;
use crate::Error;
use flowctl_wire::hello::{bitmap_contains, HELLO_TYPE_CODE};
use flowctl_wire::{
    peek_hello, Body, ErrorMsg, Hello, Message, MessageType, PeerHello, RawHeader, Version,
};
use tracing::{debug, trace, warn};

/// Builds the hello this side sends when a link comes up.
#[must_use]
pub fn local_hello(versions: &[Version], xid: u32) -> Message {
    let highest = versions.iter().copied().max().unwrap_or(Version::V1_0);
    let hello = if highest == Version::V1_3 {
        Hello::with_versions(versions)
    } else {
        Hello::new()
    };
    trace!(version = %highest, xid, "sending hello");
    Message::new(highest, xid, Body::Hello(hello))
}

/// Parses the first frame received from the peer.
///
/// # Errors
///
/// Returns [`NegotiationError::Rejected`] if the peer answered with an
/// error, [`NegotiationError::UnexpectedMessage`] for any other
/// non-hello message, and a decode error if the frame is malformed.
pub fn read_peer_hello(frame: &[u8]) -> Result<PeerHello, Error> {
    let header = RawHeader::parse(frame)?;
    if header.type_code != HELLO_TYPE_CODE {
        let is_error = Version::from_wire(header.version)
            .and_then(|v| MessageType::from_code(v, header.type_code))
            == Some(MessageType::Error);
        if is_error {
            if let Ok(Message {
                body: Body::Error(err),
                ..
            }) = Message::decode(frame)
            {
                warn!(
                    err_type = err.err_type,
                    code = err.code,
                    data = %String::from_utf8_lossy(&err.data),
                    "peer rejected hello"
                );
            }
            return Err(NegotiationError::Rejected.into());
        }
        warn!(type_code = header.type_code, "expected hello");
        return Err(NegotiationError::UnexpectedMessage {
            type_code: header.type_code,
        }
        .into());
    }

    let hello = peek_hello(frame)?;
    trace!(
        version = hello.wire_version,
        xid = hello.xid,
        bitmap = ?hello.bitmap,
        "received hello"
    );
    Ok(hello)
}

/// Picks the version to use with a peer.
///
/// # Errors
///
/// Returns [`NegotiationError::NoCommonVersion`] if the peer's offer and
/// `local` share no version.
pub fn negotiate(local: &[Version], peer: &PeerHello) -> Result<Version, NegotiationError> {
    let mismatch = || NegotiationError::NoCommonVersion {
        local: local.to_vec(),
        remote: peer.wire_version,
    };
    let highest = local.iter().copied().max().ok_or_else(mismatch)?;

    // Only a 1.3 hello from this side carries a bitmap.
    if let (Some(bitmap), Version::V1_3) = (&peer.bitmap, highest) {
        let version = local
            .iter()
            .copied()
            .filter(|v| bitmap_contains(bitmap, v.wire()))
            .max()
            .ok_or_else(mismatch)?;
        debug!(%version, "negotiated from version bitmaps");
        return Ok(version);
    }

    let candidate = highest.wire().min(peer.wire_version);
    let version = Version::from_wire(candidate)
        .filter(|v| local.contains(v))
        .ok_or_else(mismatch)?;
    debug!(%version, "negotiated from header versions");
    Ok(version)
}

/// Builds the hello-failed error sent before dropping a peer that shares
/// no version with this side.
///
/// The error carries the peer's hello xid and is encoded in the peer's
/// version when possible so it can parse it.
#[must_use]
pub fn hello_failure(local: &[Version], peer: &PeerHello) -> Message {
    let version = Version::from_wire(peer.wire_version)
        .or_else(|| local.iter().copied().min())
        .unwrap_or(Version::V1_0);
    let supported: Vec<String> = local.iter().map(ToString::to_string).collect();
    let reason = format!("supported versions: {}", supported.join(", "));
    Message::new(
        version,
        peer.xid,
        Body::Error(ErrorMsg::hello_incompatible(&reason)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowctl_wire::hello::bitmap_of;

    fn peer(wire_version: u8, bitmap: Option<&[Version]>) -> PeerHello {
        PeerHello {
            wire_version,
            xid: 42,
            bitmap: bitmap.map(bitmap_of),
        }
    }

    #[test]
    fn local_hello_carries_bitmap_only_for_1_3() {
        let msg = local_hello(&Version::ALL, 1);
        assert_eq!(msg.version, Version::V1_3);
        match &msg.body {
            Body::Hello(hello) => assert!(hello.bitmap().is_some()),
            other => panic!("expected hello, got {other:?}"),
        }

        let msg = local_hello(&[Version::V1_0, Version::V1_2], 1);
        assert_eq!(msg.version, Version::V1_2);
        assert_eq!(msg.body, Body::Hello(Hello::new()));
        assert!(msg.to_bytes().is_ok());
    }

    #[test]
    fn bitmaps_pick_highest_common() {
        let local = [Version::V1_0, Version::V1_3];
        let offer = peer(0x04, Some(&[Version::V1_0, Version::V1_2]));
        assert_eq!(negotiate(&local, &offer).expect("should agree"), Version::V1_0);

        let offer = peer(0x04, Some(&Version::ALL));
        assert_eq!(negotiate(&local, &offer).expect("should agree"), Version::V1_3);
    }

    #[test]
    fn bitmaps_without_overlap_fail() {
        let offer = peer(0x04, Some(&[Version::V1_2]));
        assert!(matches!(
            negotiate(&[Version::V1_0, Version::V1_3], &offer),
            Err(NegotiationError::NoCommonVersion { remote: 0x04, .. })
        ));
    }

    #[test]
    fn header_fallback_uses_lower_version() {
        let local = Version::ALL;
        assert_eq!(
            negotiate(&local, &peer(0x01, None)).expect("should agree"),
            Version::V1_0
        );
        assert_eq!(
            negotiate(&local, &peer(0x03, None)).expect("should agree"),
            Version::V1_2
        );
        // A newer peer falls back to our highest.
        assert_eq!(
            negotiate(&local, &peer(0x06, None)).expect("should agree"),
            Version::V1_3
        );
    }

    #[test]
    fn header_fallback_requires_local_support() {
        // 1.1 is never spoken here.
        assert!(negotiate(&Version::ALL, &peer(0x02, None)).is_err());
        assert!(negotiate(&[Version::V1_3], &peer(0x01, None)).is_err());
    }

    #[test]
    fn peer_bitmap_ignored_without_our_own() {
        let local = [Version::V1_0, Version::V1_2];
        let offer = peer(0x04, Some(&[Version::V1_3]));
        assert_eq!(negotiate(&local, &offer).expect("should agree"), Version::V1_2);
    }

    #[test]
    fn reads_hello_frames() {
        let frame = local_hello(&Version::ALL, 9).to_bytes().expect("hello encodes");
        let hello = read_peer_hello(&frame).expect("hello should parse");
        assert_eq!(hello.wire_version, 0x04);
        assert_eq!(hello.xid, 9);
        assert!(hello.bitmap.is_some());
    }

    #[test]
    fn non_hello_first_message() {
        let frame = Message::new(Version::V1_0, 1, Body::FeaturesRequest)
            .to_bytes()
            .expect("encode");
        assert!(matches!(
            read_peer_hello(&frame),
            Err(Error::NegotiationFailed(NegotiationError::UnexpectedMessage { type_code: 5 }))
        ));

        let frame = Message::new(
            Version::V1_0,
            1,
            Body::Error(ErrorMsg::hello_incompatible("nope")),
        )
        .to_bytes()
        .expect("encode");
        assert!(matches!(
            read_peer_hello(&frame),
            Err(Error::NegotiationFailed(NegotiationError::Rejected))
        ));

        assert!(matches!(read_peer_hello(&[1, 0]), Err(Error::Decode(_))));
    }

    #[test]
    fn failure_reply_uses_peer_version_and_xid() {
        let failure = hello_failure(&[Version::V1_3], &peer(0x01, None));
        assert_eq!(failure.version, Version::V1_0);
        assert_eq!(failure.xid, 42);
        match &failure.body {
            Body::Error(err) => assert!(err.is_hello_failed()),
            other => panic!("expected error, got {other:?}"),
        }
        assert!(failure.to_bytes().is_ok());

        let failure = hello_failure(&[Version::V1_2, Version::V1_3], &peer(0x02, None));
        assert_eq!(failure.version, Version::V1_2);
    }
}
