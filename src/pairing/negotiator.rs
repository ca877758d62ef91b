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

//! Security parameter negotiation for NFC-initiated pairing.

use tracing::debug;

use super::role::PairingRole;
use crate::ble::{IoCapability, SecurityParameters};
use crate::config::StaticSecurityConfig;

/// Choose local security parameters from what the peer advertised.
///
/// Only a presenter adapts its parameters; a reader keeps the statically
/// configured ones. Returns `None` when nothing needs to change, which is
/// the normal outcome for non-OOB pairing.
pub fn negotiate(
    role: &PairingRole,
    peer: &SecurityParameters,
    statics: &StaticSecurityConfig,
) -> Option<SecurityParameters> {
    if !role.is_presenter() {
        return None;
    }

    let (lesc, oob, io_caps) = if peer.lesc {
        debug!("LESC OOB mode flags set");
        (true, false, IoCapability::DisplayYesNo)
    } else if peer.oob {
        debug!("Legacy OOB mode flags set");
        (false, true, IoCapability::NoInputNoOutput)
    } else {
        return None;
    };

    Some(SecurityParameters {
        bond: statics.bond,
        mitm: true,
        lesc,
        keypress: statics.keypress,
        oob,
        io_caps,
        min_key_size: statics.min_key_size,
        max_key_size: statics.max_key_size,
        kdist_own: statics.kdist_own,
        kdist_peer: statics.kdist_peer,
    })
}
