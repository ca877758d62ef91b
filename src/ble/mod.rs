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

//! BLE security-manager types and the collaborator traits the coordinator
//! drives: the security stack and the LESC public key provider.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::StackError;

/// Length of the legacy pairing Temporary Key.
pub const TK_LEN: usize = 16;

/// Length of the LESC OOB random and confirmation values.
pub const LESC_VALUE_LEN: usize = 16;

/// Length of an uncompressed P-256 public key (X || Y).
pub const PUBLIC_KEY_LEN: usize = 64;

/// Connection handle assigned by the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnHandle(pub u16);

impl ConnHandle {
    /// Used when no connection is active.
    pub const INVALID: ConnHandle = ConnHandle(0xFFFF);

    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

impl fmt::Display for ConnHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

/// Device address kind, as carried in the LE Bluetooth Device Address AD.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum AddrKind {
    Public = 0x00,
    #[default]
    Random = 0x01,
}

/// A Bluetooth device address.
///
/// `addr` is stored in display order (most significant octet first).
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct BdAddr {
    pub addr: [u8; 6],
    pub kind: AddrKind,
}

impl BdAddr {
    pub fn new(addr: [u8; 6], kind: AddrKind) -> Self {
        Self { addr, kind }
    }

    /// Address in over-the-air order (least significant octet first).
    pub fn to_le_bytes(&self) -> [u8; 6] {
        let mut out = self.addr;
        out.reverse();
        out
    }
}

impl fmt::Debug for BdAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?})", self, self.kind)
    }
}

impl fmt::Display for BdAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let a = self.addr;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            a[0], a[1], a[2], a[3], a[4], a[5]
        )
    }
}

/// Legacy OOB pairing Temporary Key.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct TemporaryKey(pub [u8; TK_LEN]);

impl TemporaryKey {
    pub fn as_bytes(&self) -> &[u8; TK_LEN] {
        &self.0
    }
}

// Key material never reaches the logs.
impl fmt::Debug for TemporaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TemporaryKey(<redacted>)")
    }
}

/// LESC OOB data: random and confirmation values bound to a public key.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct LescOobData {
    pub addr: BdAddr,
    pub random: [u8; LESC_VALUE_LEN],
    pub confirm: [u8; LESC_VALUE_LEN],
}

impl fmt::Debug for LescOobData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LescOobData")
            .field("addr", &self.addr)
            .field("confirm", &hex::encode(self.confirm))
            .finish_non_exhaustive()
    }
}

/// Uncompressed P-256 public key used for LE Secure Connections.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PublicKey(pub [u8; PUBLIC_KEY_LEN]);

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({}..)", hex::encode(&self.0[..8]))
    }
}

/// IO capability advertised in the pairing request/response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum IoCapability {
    DisplayOnly = 0x00,
    DisplayYesNo = 0x01,
    KeyboardOnly = 0x02,
    #[default]
    NoInputNoOutput = 0x03,
    KeyboardDisplay = 0x04,
}

/// Which keys a side distributes after pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyDistribution {
    /// Long term key.
    pub enc: bool,
    /// Identity resolving key.
    pub id: bool,
}

impl KeyDistribution {
    pub fn any(&self) -> bool {
        self.enc || self.id
    }
}

/// Security parameters exchanged during the pairing feature exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SecurityParameters {
    pub bond: bool,
    pub mitm: bool,
    pub lesc: bool,
    pub keypress: bool,
    pub oob: bool,
    pub io_caps: IoCapability,
    pub min_key_size: u8,
    pub max_key_size: u8,
    pub kdist_own: KeyDistribution,
    pub kdist_peer: KeyDistribution,
}

/// Kind of key supplied in an auth key reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthKeyType {
    Passkey,
    Oob,
}

/// The security-manager half of the BLE stack.
pub trait SecurityStack: Send {
    /// Answer an auth key request.
    fn auth_key_reply(
        &mut self,
        conn: ConnHandle,
        kind: AuthKeyType,
        key: &TemporaryKey,
    ) -> Result<(), StackError>;

    /// Provide LESC OOB data for the DH key check. Either side may be
    /// withheld; the stack derives the missing one itself.
    fn lesc_oob_data_set(
        &mut self,
        conn: ConnHandle,
        local: Option<&LescOobData>,
        peer: Option<&LescOobData>,
    ) -> Result<(), StackError>;

    /// Compute local LESC OOB data for `public_key`.
    fn lesc_oob_data_get(
        &mut self,
        conn: ConnHandle,
        public_key: &PublicKey,
    ) -> Result<LescOobData, StackError>;

    /// Answer a connection security parameters request.
    fn conn_sec_params_reply(
        &mut self,
        conn: ConnHandle,
        params: &SecurityParameters,
    ) -> Result<(), StackError>;

    /// The local identity address.
    fn local_address(&self) -> Result<BdAddr, StackError>;
}

/// Source of the local LESC key pair's public half.
pub trait PublicKeyProvider: Send {
    /// The current public key, or `None` before one has been generated.
    fn current_public_key(&self) -> Option<PublicKey>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bd_addr_order() {
        let addr = BdAddr::new([0xC0, 0x11, 0x22, 0x33, 0x44, 0x55], AddrKind::Random);
        assert_eq!(addr.to_string(), "C0:11:22:33:44:55");
        assert_eq!(addr.to_le_bytes(), [0x55, 0x44, 0x33, 0x22, 0x11, 0xC0]);
    }

    #[test]
    fn test_temporary_key_debug_is_redacted() {
        let tk = TemporaryKey([0xAB; TK_LEN]);
        let shown = format!("{:?}", tk);
        assert!(!shown.to_lowercase().contains("ab"));
    }

    #[test]
    fn test_invalid_conn_handle() {
        assert!(!ConnHandle::INVALID.is_valid());
        assert!(ConnHandle(0x0001).is_valid());
        assert_eq!(ConnHandle::INVALID.to_string(), "0xffff");
    }
}
