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

//! Connection state machine states.
//!
//! Defines the lifecycle of one control connection, from the first link
//! event through the handshake to an established session.

/// Connection lifecycle state.
///
/// The connection progresses through these states:
/// ```text
/// Init ──► Connected ──► FeaturesReceived ──► ConfigReceived ──► Established
///  ▲           │                │       │            │                 │
///  │           │                │       └── 1.0 / auxiliary ──────────►│
///  │           ▼                ▼                    ▼                 ▼
///  └──────────────────────────── Disconnected ◄───────────────────────┘
/// ```
///
/// `ConfigReceived` covers the version-specific discovery steps: table
/// statistics on 1.2, table features followed by port descriptions on
/// 1.3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// Waiting for a negotiated link.
    #[default]
    Init,
    /// Link up and version agreed; features request sent.
    Connected,
    /// Features reply received; config request sent.
    FeaturesReceived,
    /// Config reply received; discovery in progress.
    ConfigReceived,
    /// Handshake complete.
    Established,
    /// Link lost or handshake failed.
    Disconnected,
}

impl ConnectionState {
    /// Converts from u8 representation used in atomic storage.
    #[must_use]
    pub(crate) const fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Init,
            1 => Self::Connected,
            2 => Self::FeaturesReceived,
            3 => Self::ConfigReceived,
            4 => Self::Established,
            _ => Self::Disconnected,
        }
    }

    /// Returns true once the handshake has completed.
    #[must_use]
    pub const fn is_established(&self) -> bool {
        matches!(self, Self::Established)
    }

    /// Returns true while the handshake is running.
    #[must_use]
    pub const fn is_handshaking(&self) -> bool {
        matches!(
            self,
            Self::Connected | Self::FeaturesReceived | Self::ConfigReceived
        )
    }

    /// Returns true if the link was lost.
    #[must_use]
    pub const fn is_disconnected(&self) -> bool {
        matches!(self, Self::Disconnected)
    }

    /// Returns true if a transition to the target state is valid.
    #[must_use]
    #[allow(clippy::match_same_arms)] // Keep separate for documentation clarity
    pub const fn can_transition_to(&self, target: Self) -> bool {
        use ConnectionState::{
            ConfigReceived, Connected, Disconnected, Established, FeaturesReceived, Init,
        };

        match (*self, target) {
            // Handshake progression
            (Init, Connected) => true,
            (Connected, FeaturesReceived) => true,
            (FeaturesReceived, ConfigReceived) => true,
            (ConfigReceived, Established) => true,

            // 1.0 and auxiliary channels skip discovery
            (FeaturesReceived, Established) => true,

            // Link loss or handshake failure
            (Connected | FeaturesReceived | ConfigReceived | Established, Disconnected) => true,

            // Reconnect
            (Disconnected, Init) => true,

            _ => false,
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Init => write!(f, "init"),
            Self::Connected => write!(f, "connected"),
            Self::FeaturesReceived => write!(f, "features-received"),
            Self::ConfigReceived => write!(f, "config-received"),
            Self::Established => write!(f, "established"),
            Self::Disconnected => write!(f, "disconnected"),
        }
    }
}
