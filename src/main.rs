// Copyright 2026 Daniel Pelikan
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

//! Simulated tap-to-pair sessions against in-process drivers.
//!
//! Usage: `nfc-oob-pair [config.toml]`

use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::info;

use nfc_oob_pair::ble::{ConnHandle, SecurityParameters};
use nfc_oob_pair::events::{self, EventProcessor};
use nfc_oob_pair::sim::{SimEntropy, SimKeyProvider, SimStack, SimTag, StackCall};
use nfc_oob_pair::{logging, Collaborators, Coordinator, PairingConfig, PairingEvent};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .or_else(PairingConfig::default_path);

    let config = match &config_path {
        Some(path) => PairingConfig::load(path)?,
        None => PairingConfig::default(),
    };

    logging::init(&config.log_level);
    info!("Starting NFC OOB pairing simulation");

    let tag = SimTag::new();
    let stack = SimStack::new();
    let keys = SimKeyProvider::generated();

    let coordinator = Coordinator::new(
        config,
        Collaborators {
            entropy: Box::new(SimEntropy::new()),
            tag: Box::new(tag.clone()),
            stack: Box::new(stack.clone()),
            keys: Box::new(keys.clone()),
        },
    )?;
    let coordinator = Arc::new(Mutex::new(coordinator));

    let (tx, rx) = events::channel();
    coordinator
        .lock()
        .init(tx.clone())
        .context("Failed to initialize NFC pairing")?;

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let processor = EventProcessor::new(coordinator.clone());
    let event_loop = tokio::spawn(processor.run(rx, async move {
        let _ = stop_rx.await;
    }));

    // Legacy OOB: a phone taps the tag and pairs with the temporary key.
    let conn = ConnHandle(0x0001);
    tag.tap();
    tag.release();
    tx.send(PairingEvent::ConnSecParamsRequest {
        conn,
        peer: SecurityParameters {
            oob: true,
            ..Default::default()
        },
    });
    tx.send(PairingEvent::AuthKeyRequest { conn });
    tx.send(PairingEvent::AuthStatus {
        conn,
        success: true,
    });

    wait_until("first session to finish", || {
        stack
            .calls()
            .iter()
            .any(|c| matches!(c, StackCall::AuthKeyReply { .. }))
            && !coordinator.lock().is_emulating()
    })
    .await?;

    // LESC OOB: after a key rotation the tag is re-armed and tapped again.
    let conn = ConnHandle(0x0002);
    keys.rotate();
    {
        let mut coordinator = coordinator.lock();
        coordinator
            .set_pairing_data()
            .context("Failed to publish rotated pairing data")?;
        coordinator
            .resume_emulation()
            .context("Failed to resume tag emulation")?;
    }
    tag.tap();
    tx.send(PairingEvent::ConnSecParamsRequest {
        conn,
        peer: SecurityParameters {
            lesc: true,
            ..Default::default()
        },
    });
    tx.send(PairingEvent::DhKeyRequest {
        conn,
        oob_requested: true,
    });
    tx.send(PairingEvent::AuthStatus {
        conn,
        success: true,
    });

    let _ = stop_tx.send(());
    event_loop.await.context("Event loop panicked")?;

    let coordinator = coordinator.lock();
    let report = serde_json::json!({
        "state": format!("{:?}", coordinator.state()),
        "emulating": coordinator.is_emulating(),
        "payload": coordinator.payload().map(|p| hex::encode(p.as_bytes())),
        "stack_calls": stack.calls().iter().map(|c| format!("{:?}", c)).collect::<Vec<_>>(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}

/// Poll `done` until it holds, giving the event loop time to run.
async fn wait_until(what: &str, done: impl Fn() -> bool) -> Result<()> {
    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        if done() {
            return Ok(());
        }
        if Instant::now() > deadline {
            anyhow::bail!("Timed out waiting for {}", what);
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
