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

//! Event processing and dispatch.
//!
//! Drivers push [`PairingEvent`]s into an unbounded channel from whatever
//! context their callbacks run in. A single [`EventProcessor`] drains the
//! channel and feeds the coordinator one event at a time.

use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::{FaultHandler, LogFaultHandler};
use crate::pairing::{Coordinator, PairingEvent};

pub type EventReceiver = mpsc::UnboundedReceiver<PairingEvent>;

/// Handle given to drivers for delivering events. Sending never blocks.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<PairingEvent>,
}

impl EventSender {
    /// Queue an event. Returns `false` if the processor has shut down.
    pub fn send(&self, event: PairingEvent) -> bool {
        match self.tx.send(event) {
            Ok(()) => true,
            Err(mpsc::error::SendError(event)) => {
                warn!("Event processor gone, dropping {}", event.name());
                false
            }
        }
    }
}

/// Create a connected sender/receiver pair.
pub fn channel() -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSender { tx }, rx)
}

/// Feeds events to the coordinator and reports handler faults.
pub struct EventProcessor {
    coordinator: Arc<Mutex<Coordinator>>,
    faults: Box<dyn FaultHandler>,
}

impl EventProcessor {
    /// Create a processor that logs faults.
    pub fn new(coordinator: Arc<Mutex<Coordinator>>) -> Self {
        Self::with_fault_handler(coordinator, Box::new(LogFaultHandler))
    }

    pub fn with_fault_handler(
        coordinator: Arc<Mutex<Coordinator>>,
        faults: Box<dyn FaultHandler>,
    ) -> Self {
        Self {
            coordinator,
            faults,
        }
    }

    /// Process a single event.
    pub fn process_event(&self, event: PairingEvent) {
        let name = event.name();
        debug!("Processing {}", name);

        let result = self.coordinator.lock().handle_event(event);
        if let Err(e) = result {
            self.faults.report(&e, name);
        }
    }

    /// Process everything already queued without waiting for more.
    /// Returns the number of events handled.
    pub fn drain(&self, rx: &mut EventReceiver) -> usize {
        let mut handled = 0;
        while let Ok(event) = rx.try_recv() {
            self.process_event(event);
            handled += 1;
        }
        handled
    }

    /// Process events until every sender is dropped or `shutdown` resolves.
    /// Events queued before shutdown are still handled.
    pub async fn run<F>(self, mut rx: EventReceiver, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        info!("Pairing event loop started");
        tokio::pin!(shutdown);

        loop {
            let received = tokio::select! {
                biased;
                event = rx.recv() => Some(event),
                _ = &mut shutdown => None,
            };

            match received {
                Some(Some(event)) => self.process_event(event),
                Some(None) => break,
                None => {
                    self.drain(&mut rx);
                    break;
                }
            }
        }

        info!("Pairing event loop stopped");
    }
}
