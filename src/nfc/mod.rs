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

//! NFC side: NDEF OOB message encoding and tag emulation.

pub mod ndef;
pub mod tag;

pub use ndef::{LescOffsets, NdefPayload, OobPayloadBuilder, TransportTag, LE_OOB_MIME_TYPE};
pub use tag::{TagBridge, TagEmulator};
