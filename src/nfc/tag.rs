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

//! Bridge between the pairing coordinator and the NFC tag emulation driver.

use tracing::{debug, info};

use super::ndef::NdefPayload;
use crate::ble::{LescOobData, TemporaryKey};
use crate::error::{PairError, Result, TagError};
use crate::events::EventSender;

/// NFC Type 2 Tag emulation driver.
pub trait TagEmulator: Send {
    /// Register the sink for `FieldOn`/`FieldOff` events.
    fn setup(&mut self, events: EventSender) -> Result<(), TagError>;

    /// Replace the read-only content presented to readers.
    fn set_payload(&mut self, payload: &[u8]) -> Result<(), TagError>;

    /// Start presenting the tag to readers.
    fn start(&mut self) -> Result<(), TagError>;

    /// Stop presenting the tag.
    fn stop(&mut self) -> Result<(), TagError>;
}

/// Owns the published NDEF payload and the emulation on/off state.
pub struct TagBridge {
    driver: Box<dyn TagEmulator>,
    payload: Option<NdefPayload>,
    set_up: bool,
    active: bool,
}

impl TagBridge {
    pub fn new(driver: Box<dyn TagEmulator>) -> Self {
        Self {
            driver,
            payload: None,
            set_up: false,
            active: false,
        }
    }

    /// Wire the driver's field events into `events`.
    pub fn setup(&mut self, events: EventSender) -> Result<()> {
        self.driver.setup(events)?;
        self.set_up = true;
        debug!("Tag emulation set up");
        Ok(())
    }

    /// Publish a freshly encoded payload.
    pub fn publish(&mut self, payload: NdefPayload) -> Result<()> {
        self.ensure_set_up()?;
        self.driver.set_payload(payload.as_bytes())?;
        debug!("Published {} byte NDEF payload", payload.len());
        self.payload = Some(payload);
        Ok(())
    }

    /// Patch the TK bytes of the published payload and re-publish it.
    pub fn refresh_temp_key_region(&mut self, tk: &TemporaryKey) -> Result<()> {
        self.ensure_set_up()?;
        let payload = self
            .payload
            .as_mut()
            .ok_or(PairError::PayloadShape("temporary key"))?;
        payload.patch_temp_key(tk)?;
        self.driver.set_payload(payload.as_bytes())?;
        debug!(
            "Refreshed temporary key at {} location(s)",
            payload.tk_offsets().len()
        );
        Ok(())
    }

    /// Patch the LESC confirmation/random bytes and re-publish.
    pub fn refresh_lesc_region(&mut self, oob: &LescOobData) -> Result<()> {
        self.ensure_set_up()?;
        let payload = self
            .payload
            .as_mut()
            .ok_or(PairError::PayloadShape("LESC OOB"))?;
        payload.patch_lesc(oob)?;
        self.driver.set_payload(payload.as_bytes())?;
        debug!("Refreshed LESC OOB data");
        Ok(())
    }

    pub fn start(&mut self) -> Result<()> {
        self.ensure_set_up()?;
        if !self.active {
            self.driver.start()?;
            self.active = true;
            info!("NFC tag emulation started");
        }
        Ok(())
    }

    pub fn stop(&mut self) -> Result<()> {
        if self.active {
            self.driver.stop()?;
            self.active = false;
            info!("NFC tag emulation stopped");
        }
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn payload(&self) -> Option<&NdefPayload> {
        self.payload.as_ref()
    }

    fn ensure_set_up(&self) -> Result<()> {
        if self.set_up {
            Ok(())
        } else {
            Err(TagError::NotSetUp.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ble::{PublicKey, TK_LEN};
    use crate::config::PairingConfig;
    use crate::events;
    use crate::nfc::OobPayloadBuilder;
    use crate::sim::SimTag;

    fn payload(tk: &TemporaryKey) -> NdefPayload {
        OobPayloadBuilder::new(&PairingConfig::default())
            .build(true, tk, &LescOobData::default(), Some(&PublicKey([1; 64])))
            .unwrap()
    }

    fn bridge() -> (TagBridge, SimTag) {
        let tag = SimTag::new();
        let mut bridge = TagBridge::new(Box::new(tag.clone()));
        let (tx, _rx) = events::channel();
        bridge.setup(tx).unwrap();
        (bridge, tag)
    }

    #[test]
    fn test_publish_requires_setup() {
        let mut bridge = TagBridge::new(Box::new(SimTag::new()));
        let err = bridge.publish(payload(&TemporaryKey::default())).unwrap_err();
        assert_eq!(err, PairError::Tag(TagError::NotSetUp));
    }

    #[test]
    fn test_publish_hands_bytes_to_driver() {
        let (mut bridge, tag) = bridge();
        let p = payload(&TemporaryKey([3; TK_LEN]));
        bridge.publish(p.clone()).unwrap();
        assert_eq!(tag.current_payload(), Some(p.as_bytes().to_vec()));
    }

    #[test]
    fn test_refresh_patches_in_place() {
        let (mut bridge, tag) = bridge();
        bridge.publish(payload(&TemporaryKey([3; TK_LEN]))).unwrap();

        let next = TemporaryKey([9; TK_LEN]);
        bridge.refresh_temp_key_region(&next).unwrap();

        assert_eq!(tag.current_payload(), Some(payload(&next).as_bytes().to_vec()));
        assert_eq!(tag.payload_writes(), 2);
    }

    #[test]
    fn test_refresh_without_payload_is_shape_error() {
        let (mut bridge, _tag) = bridge();
        let err = bridge
            .refresh_temp_key_region(&TemporaryKey::default())
            .unwrap_err();
        assert_eq!(err, PairError::PayloadShape("temporary key"));
    }

    #[test]
    fn test_start_stop_are_idempotent() {
        let (mut bridge, tag) = bridge();
        bridge.start().unwrap();
        bridge.start().unwrap();
        assert!(bridge.is_active());
        assert!(tag.is_active());

        bridge.stop().unwrap();
        bridge.stop().unwrap();
        assert!(!bridge.is_active());
        assert!(!tag.is_active());
        assert_eq!(tag.stop_count(), 1);
    }
}
