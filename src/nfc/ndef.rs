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

//! NDEF encoding of BLE OOB pairing data.
//!
//! The message carries an LE OOB record (`application/vnd.bluetooth.le.oob`)
//! made of AD structures, either on its own or behind a Connection Handover
//! Select record. The builder remembers where the TK and LESC values landed
//! so later refreshes can patch them without re-encoding.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ble::{LescOobData, PublicKey, TemporaryKey, LESC_VALUE_LEN, TK_LEN};
use crate::config::PairingConfig;
use crate::error::{PairError, Result};

/// MIME type identifying BLE as the carrier.
pub const LE_OOB_MIME_TYPE: &[u8] = b"application/vnd.bluetooth.le.oob";

/// Connection Handover version 1.3.
const HANDOVER_VERSION: u8 = 0x13;
/// Carrier data reference tying the alternative carrier to the LE record.
const CARRIER_ID: &[u8] = b"0";
/// Carrier power state: active.
const CPS_ACTIVE: u8 = 0x01;

/// Longest payload a short NDEF record can hold.
const SHORT_RECORD_MAX: usize = u8::MAX as usize;
/// Longest name that fits a single AD structure.
const MAX_NAME_LEN: usize = u8::MAX as usize - 1;

mod header {
    pub const MB: u8 = 0x80;
    pub const ME: u8 = 0x40;
    pub const SR: u8 = 0x10;
    pub const IL: u8 = 0x08;
    pub const TNF_WELL_KNOWN: u8 = 0x01;
    pub const TNF_MIME: u8 = 0x02;
}

mod ad {
    pub const FLAGS: u8 = 0x01;
    pub const COMPLETE_LOCAL_NAME: u8 = 0x09;
    pub const TK_VALUE: u8 = 0x10;
    pub const LE_ADDRESS: u8 = 0x1B;
    pub const LE_ROLE: u8 = 0x1C;
    pub const LESC_CONFIRM: u8 = 0x22;
    pub const LESC_RANDOM: u8 = 0x23;

    /// LE General Discoverable, BR/EDR not supported.
    pub const FLAGS_VALUE: u8 = 0x06;
    pub const ROLE_PERIPHERAL_PREFERRED: u8 = 0x02;
    pub const ROLE_CENTRAL_PREFERRED: u8 = 0x03;
}

/// NDEF message layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportTag {
    /// A lone LE OOB record.
    #[default]
    LeShort,
    /// Handover Select record followed by the LE OOB carrier record.
    LeHandover,
}

/// Where the LESC values sit inside an encoded message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LescOffsets {
    pub confirm: usize,
    pub random: usize,
}

/// An encoded NDEF message plus the locations of its mutable fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NdefPayload {
    bytes: Vec<u8>,
    capacity: usize,
    tk_offsets: Vec<usize>,
    lesc_offsets: Option<LescOffsets>,
    role_offset: usize,
}

impl NdefPayload {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn tk_offsets(&self) -> &[usize] {
        &self.tk_offsets
    }

    pub fn lesc_offsets(&self) -> Option<LescOffsets> {
        self.lesc_offsets
    }

    /// Value of the LE Role AD.
    pub fn le_role(&self) -> u8 {
        self.bytes[self.role_offset]
    }

    /// Whether the message was encoded for the presenting side.
    pub fn is_presenter(&self) -> bool {
        self.le_role() == ad::ROLE_PERIPHERAL_PREFERRED
    }

    /// Overwrite every TK location with `tk`.
    pub fn patch_temp_key(&mut self, tk: &TemporaryKey) -> Result<()> {
        if self.tk_offsets.is_empty() {
            return Err(PairError::PayloadShape("temporary key"));
        }
        for &offset in &self.tk_offsets {
            self.bytes[offset..offset + TK_LEN].copy_from_slice(tk.as_bytes());
        }
        Ok(())
    }

    /// Overwrite the LESC confirmation and random values.
    pub fn patch_lesc(&mut self, oob: &LescOobData) -> Result<()> {
        let offsets = self
            .lesc_offsets
            .ok_or(PairError::PayloadShape("LESC OOB"))?;
        self.bytes[offsets.confirm..offsets.confirm + LESC_VALUE_LEN]
            .copy_from_slice(&oob.confirm);
        self.bytes[offsets.random..offsets.random + LESC_VALUE_LEN].copy_from_slice(&oob.random);
        Ok(())
    }
}

/// Builds the OOB pairing message published on the tag.
#[derive(Debug, Clone)]
pub struct OobPayloadBuilder {
    transport: TransportTag,
    capacity: usize,
    device_name: Option<String>,
}

impl OobPayloadBuilder {
    pub fn new(config: &PairingConfig) -> Self {
        Self {
            transport: config.transport,
            capacity: config.ndef_capacity,
            device_name: config.device_name.clone(),
        }
    }

    /// Encode the pairing message.
    ///
    /// LESC values are included only when a public key exists; without one
    /// the confirmation value would not commit to anything.
    pub fn build(
        &self,
        presenter: bool,
        tk: &TemporaryKey,
        oob: &LescOobData,
        public_key: Option<&PublicKey>,
    ) -> Result<NdefPayload> {
        let mut data = AdWriter::default();
        data.push(ad::FLAGS, &[ad::FLAGS_VALUE]);

        let mut address = [0u8; 7];
        address[..6].copy_from_slice(&oob.addr.to_le_bytes());
        address[6] = oob.addr.kind as u8;
        data.push(ad::LE_ADDRESS, &address);

        let role = if presenter {
            ad::ROLE_PERIPHERAL_PREFERRED
        } else {
            ad::ROLE_CENTRAL_PREFERRED
        };
        let role_at = data.push(ad::LE_ROLE, &[role]);

        let tk_at = data.push(ad::TK_VALUE, tk.as_bytes());

        let lesc_at = public_key.map(|_| LescOffsets {
            confirm: data.push(ad::LESC_CONFIRM, &oob.confirm),
            random: data.push(ad::LESC_RANDOM, &oob.random),
        });

        if let Some(name) = &self.device_name {
            if name.len() > MAX_NAME_LEN {
                return Err(PairError::Config(format!(
                    "device name longer than {} bytes",
                    MAX_NAME_LEN
                )));
            }
            data.push(ad::COMPLETE_LOCAL_NAME, name.as_bytes());
        }

        let mut out = Vec::with_capacity(self.capacity);
        let base = match self.transport {
            TransportTag::LeShort => write_record(
                &mut out,
                header::MB | header::ME | header::TNF_MIME,
                LE_OOB_MIME_TYPE,
                None,
                &data.buf,
            )?,
            TransportTag::LeHandover => {
                let mut select = vec![HANDOVER_VERSION];
                let ac = [CPS_ACTIVE, CARRIER_ID.len() as u8, CARRIER_ID[0], 0x00];
                write_record(
                    &mut select,
                    header::MB | header::ME | header::TNF_WELL_KNOWN,
                    b"ac",
                    None,
                    &ac,
                )?;
                write_record(
                    &mut out,
                    header::MB | header::TNF_WELL_KNOWN,
                    b"Hs",
                    None,
                    &select,
                )?;
                write_record(
                    &mut out,
                    header::ME | header::TNF_MIME,
                    LE_OOB_MIME_TYPE,
                    Some(CARRIER_ID),
                    &data.buf,
                )?
            }
        };

        if out.len() > self.capacity {
            return Err(PairError::Encoding {
                needed: out.len(),
                capacity: self.capacity,
            });
        }

        debug!(
            "Encoded {:?} NDEF message: {} bytes, LESC {}",
            self.transport,
            out.len(),
            if lesc_at.is_some() { "included" } else { "omitted" }
        );

        Ok(NdefPayload {
            bytes: out,
            capacity: self.capacity,
            tk_offsets: vec![base + tk_at],
            lesc_offsets: lesc_at.map(|l| LescOffsets {
                confirm: base + l.confirm,
                random: base + l.random,
            }),
            role_offset: base + role_at,
        })
    }
}

/// Accumulates AD structures (`[len][type][data]`).
#[derive(Default)]
struct AdWriter {
    buf: Vec<u8>,
}

impl AdWriter {
    /// Append one structure, returning the offset of its data.
    fn push(&mut self, ad_type: u8, data: &[u8]) -> usize {
        self.buf.push((data.len() + 1) as u8);
        self.buf.push(ad_type);
        let at = self.buf.len();
        self.buf.extend_from_slice(data);
        at
    }
}

/// Append a short NDEF record, returning the offset of its payload.
fn write_record(
    out: &mut Vec<u8>,
    flags: u8,
    record_type: &[u8],
    id: Option<&[u8]>,
    payload: &[u8],
) -> Result<usize> {
    if payload.len() > SHORT_RECORD_MAX {
        return Err(PairError::Encoding {
            needed: payload.len(),
            capacity: SHORT_RECORD_MAX,
        });
    }

    let il = if id.is_some() { header::IL } else { 0 };
    out.push(flags | header::SR | il);
    out.push(record_type.len() as u8);
    out.push(payload.len() as u8);
    if let Some(id) = id {
        out.push(id.len() as u8);
    }
    out.extend_from_slice(record_type);
    if let Some(id) = id {
        out.extend_from_slice(id);
    }
    let start = out.len();
    out.extend_from_slice(payload);
    Ok(start)
}
