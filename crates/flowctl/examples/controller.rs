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

//! Minimal controller that accepts datapaths over TCP and logs what they
//! send.
//!
//! This example shows:
//! - Loading a [`Config`] from TOML
//! - Accepting connections on the configured address
//! - Sending a request once a datapath is established
//!
//! Run with: cargo run --example controller -p flowctl [config.toml]
//!
//! Set `RUST_LOG=flowctl=debug` to follow the handshakes.

use flowctl::{Body, Config, SessionEvent, SessionManager};
use flowctl_wire::stats::StatsRequestBody;
use flowctl_wire::StatsRequest;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => toml::from_str::<Config>(&std::fs::read_to_string(path)?)?,
        None => Config::new(),
    };

    let (manager, mut events) = SessionManager::new(config)?;
    let addr = manager.listen_tcp().await?;
    info!(%addr, "controller ready");

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                on_event(&manager, event).await;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        }
    }

    manager.shutdown().await;
    Ok(())
}

async fn on_event(manager: &SessionManager, event: SessionEvent) {
    match event {
        SessionEvent::ConnectionOpened { peer, info } => {
            info!(
                %peer,
                datapath_id = format_args!("{:016x}", info.datapath_id()),
                version = ?info.version,
                ports = info.ports.len(),
                tables = info.features.n_tables,
                "datapath connected"
            );
            let desc = Body::StatsRequest(StatsRequest::new(StatsRequestBody::Desc));
            if let Err(e) = manager.send_request(peer, desc).await {
                warn!(%peer, error = %e, "description request failed");
            }
        }
        SessionEvent::ConnectionClosed { peer } => info!(%peer, "datapath disconnected"),
        SessionEvent::Message {
            peer,
            auxiliary_id,
            message,
        } => match message.body {
            Body::StatsReply(reply) => info!(%peer, body = ?reply.body, "stats"),
            Body::PacketIn(packet) => info!(%peer, auxiliary_id, len = packet.data.len(), "packet in"),
            Body::PortStatus(status) => {
                info!(%peer, port = status.desc.port_no, reason = status.reason, "port status");
            }
            other => info!(%peer, auxiliary_id, msg_type = %other.msg_type(), "message"),
        },
        SessionEvent::RequestTimeout { peer, xid, expected, .. } => {
            warn!(%peer, xid, %expected, "request timed out");
        }
    }
}
