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

//! In-process stand-ins for the hardware and stack drivers.
//!
//! Each simulator is a cheap `Clone` handle over shared state, so a test (or
//! the demo binary) can keep one handle and give the other to the
//! coordinator, then inspect what the coordinator did with it.

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::debug;

use crate::ble::{
    AddrKind, AuthKeyType, BdAddr, ConnHandle, LescOobData, PublicKey, PublicKeyProvider,
    SecurityParameters, SecurityStack, TemporaryKey, LESC_VALUE_LEN, PUBLIC_KEY_LEN,
};
use crate::crypto::EntropySource;
use crate::error::{EntropyError, FaultHandler, PairError, StackError, TagError};
use crate::events::EventSender;
use crate::nfc::TagEmulator;
use crate::pairing::PairingEvent;

/// Hardware RNG model: a queue of buffered bytes.
#[derive(Clone)]
pub struct SimEntropy {
    inner: Arc<Mutex<EntropyInner>>,
}

struct EntropyInner {
    rng: StdRng,
    available: usize,
    capacity: usize,
    auto_refill: bool,
    failure: Option<EntropyError>,
}

impl SimEntropy {
    /// A source whose queue is always topped up.
    pub fn new() -> Self {
        Self::build(StdRng::from_entropy(), 64, true)
    }

    /// A deterministic source with a fixed pool of `available` bytes.
    pub fn with_pool(seed: u64, available: usize) -> Self {
        Self::build(StdRng::seed_from_u64(seed), available, false)
    }

    fn build(rng: StdRng, capacity: usize, auto_refill: bool) -> Self {
        Self {
            inner: Arc::new(Mutex::new(EntropyInner {
                rng,
                available: capacity,
                capacity,
                auto_refill,
                failure: None,
            })),
        }
    }

    /// Make every following draw fail with `err`.
    pub fn fail_with(&self, err: EntropyError) {
        self.inner.lock().failure = Some(err);
    }

    pub fn refill(&self) {
        let mut inner = self.inner.lock();
        inner.available = inner.capacity;
    }
}

impl Default for SimEntropy {
    fn default() -> Self {
        Self::new()
    }
}

impl EntropySource for SimEntropy {
    fn bytes_available(&self) -> usize {
        self.inner.lock().available
    }

    fn draw(&mut self, buf: &mut [u8]) -> Result<(), EntropyError> {
        let mut inner = self.inner.lock();
        if let Some(err) = inner.failure.clone() {
            return Err(err);
        }
        if buf.len() > inner.available {
            return Err(EntropyError::Insufficient);
        }
        inner.rng.fill_bytes(buf);
        inner.available -= buf.len();
        if inner.auto_refill {
            inner.available = inner.capacity;
        }
        Ok(())
    }
}

/// NFC tag emulator model. [`SimTag::tap`] plays the role of a phone.
#[derive(Clone, Default)]
pub struct SimTag {
    inner: Arc<Mutex<TagInner>>,
}

#[derive(Default)]
struct TagInner {
    events: Option<EventSender>,
    payload: Option<Vec<u8>>,
    writes: usize,
    active: bool,
    stops: usize,
}

impl SimTag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bring a reader into the field. Does nothing while emulation is off.
    pub fn tap(&self) -> bool {
        self.deliver(PairingEvent::FieldOn)
    }

    /// Take the reader away again.
    pub fn release(&self) -> bool {
        self.deliver(PairingEvent::FieldOff)
    }

    pub fn current_payload(&self) -> Option<Vec<u8>> {
        self.inner.lock().payload.clone()
    }

    pub fn payload_writes(&self) -> usize {
        self.inner.lock().writes
    }

    pub fn is_active(&self) -> bool {
        self.inner.lock().active
    }

    pub fn stop_count(&self) -> usize {
        self.inner.lock().stops
    }

    fn deliver(&self, event: PairingEvent) -> bool {
        let inner = self.inner.lock();
        match (&inner.events, inner.active) {
            (Some(events), true) => events.send(event),
            _ => {
                debug!("Tag not emulating, {} not delivered", event.name());
                false
            }
        }
    }
}

impl TagEmulator for SimTag {
    fn setup(&mut self, events: EventSender) -> Result<(), TagError> {
        self.inner.lock().events = Some(events);
        Ok(())
    }

    fn set_payload(&mut self, payload: &[u8]) -> Result<(), TagError> {
        let mut inner = self.inner.lock();
        if inner.events.is_none() {
            return Err(TagError::NotSetUp);
        }
        inner.payload = Some(payload.to_vec());
        inner.writes += 1;
        Ok(())
    }

    fn start(&mut self) -> Result<(), TagError> {
        self.inner.lock().active = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), TagError> {
        let mut inner = self.inner.lock();
        inner.active = false;
        inner.stops += 1;
        Ok(())
    }
}

/// A call the coordinator made into the security stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackCall {
    AuthKeyReply {
        conn: ConnHandle,
        kind: AuthKeyType,
        key: TemporaryKey,
    },
    LescOobDataSet {
        conn: ConnHandle,
        local: Option<LescOobData>,
        peer: Option<LescOobData>,
    },
    LescOobDataGet {
        conn: ConnHandle,
        public_key: PublicKey,
    },
    ConnSecParamsReply {
        conn: ConnHandle,
        params: SecurityParameters,
    },
}

/// Security-manager model that records every call.
///
/// OOB data it hands out is random plus a SHA-256 commitment to the public
/// key; it only has to look like LESC OOB data, not verify as such.
#[derive(Clone)]
pub struct SimStack {
    inner: Arc<Mutex<StackInner>>,
}

struct StackInner {
    calls: Vec<StackCall>,
    rng: StdRng,
    address: BdAddr,
    failure: Option<StackError>,
}

impl SimStack {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(StackInner {
                calls: Vec::new(),
                rng: StdRng::from_entropy(),
                address: BdAddr::new([0xC0, 0xFF, 0xEE, 0x00, 0x00, 0x01], AddrKind::Random),
                failure: None,
            })),
        }
    }

    pub fn calls(&self) -> Vec<StackCall> {
        self.inner.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.inner.lock().calls.clear();
    }

    /// Make the next call fail with `err`.
    pub fn fail_next(&self, err: StackError) {
        self.inner.lock().failure = Some(err);
    }

    fn record(&self, call: StackCall) -> Result<(), StackError> {
        let mut inner = self.inner.lock();
        if let Some(err) = inner.failure.take() {
            return Err(err);
        }
        inner.calls.push(call);
        Ok(())
    }
}

impl Default for SimStack {
    fn default() -> Self {
        Self::new()
    }
}

impl SecurityStack for SimStack {
    fn auth_key_reply(
        &mut self,
        conn: ConnHandle,
        kind: AuthKeyType,
        key: &TemporaryKey,
    ) -> Result<(), StackError> {
        if !conn.is_valid() {
            return Err(StackError::InvalidConnHandle(conn.0));
        }
        self.record(StackCall::AuthKeyReply {
            conn,
            kind,
            key: *key,
        })
    }

    fn lesc_oob_data_set(
        &mut self,
        conn: ConnHandle,
        local: Option<&LescOobData>,
        peer: Option<&LescOobData>,
    ) -> Result<(), StackError> {
        if !conn.is_valid() {
            return Err(StackError::InvalidConnHandle(conn.0));
        }
        self.record(StackCall::LescOobDataSet {
            conn,
            local: local.copied(),
            peer: peer.copied(),
        })
    }

    fn lesc_oob_data_get(
        &mut self,
        conn: ConnHandle,
        public_key: &PublicKey,
    ) -> Result<LescOobData, StackError> {
        self.record(StackCall::LescOobDataGet {
            conn,
            public_key: *public_key,
        })?;

        let mut inner = self.inner.lock();
        let mut random = [0u8; LESC_VALUE_LEN];
        inner.rng.fill_bytes(&mut random);

        let digest = Sha256::new()
            .chain_update(public_key.0)
            .chain_update(random)
            .finalize();
        let mut confirm = [0u8; LESC_VALUE_LEN];
        confirm.copy_from_slice(&digest[..LESC_VALUE_LEN]);

        Ok(LescOobData {
            addr: inner.address,
            random,
            confirm,
        })
    }

    fn conn_sec_params_reply(
        &mut self,
        conn: ConnHandle,
        params: &SecurityParameters,
    ) -> Result<(), StackError> {
        self.record(StackCall::ConnSecParamsReply {
            conn,
            params: *params,
        })
    }

    fn local_address(&self) -> Result<BdAddr, StackError> {
        Ok(self.inner.lock().address)
    }
}

/// LESC key pair holder whose public key can be rotated.
#[derive(Clone, Default)]
pub struct SimKeyProvider {
    key: Arc<Mutex<Option<PublicKey>>>,
}

impl SimKeyProvider {
    /// A provider with a random key already in place.
    pub fn generated() -> Self {
        let provider = Self::default();
        provider.rotate();
        provider
    }

    /// Replace the public key with a new random one.
    pub fn rotate(&self) -> PublicKey {
        let mut bytes = [0u8; PUBLIC_KEY_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        let key = PublicKey(bytes);
        *self.key.lock() = Some(key);
        key
    }
}

impl PublicKeyProvider for SimKeyProvider {
    fn current_public_key(&self) -> Option<PublicKey> {
        *self.key.lock()
    }
}

/// Fault handler that keeps what it was told.
#[derive(Clone, Default)]
pub struct RecordingFaultHandler {
    faults: Arc<Mutex<Vec<(String, PairError)>>>,
}

impl RecordingFaultHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(event name, error)` pairs in report order.
    pub fn faults(&self) -> Vec<(String, PairError)> {
        self.faults.lock().clone()
    }
}

impl FaultHandler for RecordingFaultHandler {
    fn report(&self, err: &PairError, context: &str) {
        self.faults.lock().push((context.to_string(), err.clone()));
    }
}
