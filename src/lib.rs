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

//! NFC out-of-band pairing for BLE.
//!
//! Publishes a legacy Temporary Key and LE Secure Connections OOB data on an
//! emulated NFC tag, then hands the right material to the BLE security
//! manager when a peer that tapped the tag (or whose tag we read) pairs.

pub mod ble;
pub mod config;
pub mod crypto;
pub mod error;
pub mod events;
pub mod logging;
pub mod nfc;
pub mod pairing;
pub mod sim;

pub use config::PairingConfig;
pub use error::{PairError, Result};
pub use events::{EventProcessor, EventSender};
pub use pairing::{Collaborators, Coordinator, HandshakeState, PairingEvent, PairingRole};
