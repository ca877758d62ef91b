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

//! Security handshake coordinator.
//!
//! Owns every piece of per-device pairing state (temporary key, LESC OOB
//! data, role, published tag payload) and reacts to NFC field events and
//! security-manager events one at a time.

use tracing::{debug, info, trace, warn};

use super::negotiator::negotiate;
use super::role::{PairingRole, PeerOobData, RoleTracker};
use crate::ble::{
    AuthKeyType, ConnHandle, LescOobData, PublicKeyProvider, SecurityParameters, SecurityStack,
    TemporaryKey, TK_LEN,
};
use crate::config::PairingConfig;
use crate::crypto::{generate, EntropySource};
use crate::error::{PairError, Result};
use crate::events::EventSender;
use crate::nfc::{NdefPayload, OobPayloadBuilder, TagBridge, TagEmulator};

/// Events delivered to the coordinator.
#[derive(Debug, Clone)]
pub enum PairingEvent {
    /// An NFC reader powered our tag.
    FieldOn,
    /// The reader's field went away.
    FieldOff,
    /// The application read a peer's OOB tag.
    PeerTagRead(PeerOobData),
    /// The stack needs the OOB temporary key.
    AuthKeyRequest { conn: ConnHandle },
    /// The stack is about to compute the LESC DH key.
    DhKeyRequest {
        conn: ConnHandle,
        oob_requested: bool,
    },
    /// A pairing attempt concluded.
    AuthStatus { conn: ConnHandle, success: bool },
    /// The peer manager asks for local security parameters.
    ConnSecParamsRequest {
        conn: ConnHandle,
        peer: SecurityParameters,
    },
}

impl PairingEvent {
    pub fn name(&self) -> &'static str {
        match self {
            PairingEvent::FieldOn => "FIELD_ON",
            PairingEvent::FieldOff => "FIELD_OFF",
            PairingEvent::PeerTagRead(_) => "PEER_TAG_READ",
            PairingEvent::AuthKeyRequest { .. } => "AUTH_KEY_REQUEST",
            PairingEvent::DhKeyRequest { .. } => "LESC_DHKEY_REQUEST",
            PairingEvent::AuthStatus { .. } => "AUTH_STATUS",
            PairingEvent::ConnSecParamsRequest { .. } => "CONN_SEC_PARAMS_REQ",
        }
    }
}

/// Where the current pairing attempt stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    Idle,
    /// Fresh key material is on the tag.
    FieldDetected,
    /// The temporary key was handed to the stack.
    AwaitingKeyReply,
    /// LESC OOB data was handed to the stack.
    AwaitingDhKeyReply,
    Completed,
}

/// External drivers the coordinator talks to.
pub struct Collaborators {
    pub entropy: Box<dyn EntropySource>,
    pub tag: Box<dyn TagEmulator>,
    pub stack: Box<dyn SecurityStack>,
    pub keys: Box<dyn PublicKeyProvider>,
}

/// NFC OOB pairing coordinator.
pub struct Coordinator {
    config: PairingConfig,
    builder: OobPayloadBuilder,
    entropy: Box<dyn EntropySource>,
    bridge: TagBridge,
    stack: Box<dyn SecurityStack>,
    keys: Box<dyn PublicKeyProvider>,
    roles: RoleTracker,
    state: HandshakeState,
    temp_key: TemporaryKey,
    lesc_oob: LescOobData,
    initialized: bool,
}

impl Coordinator {
    /// Create a coordinator. Nothing touches the hardware until [`init`].
    ///
    /// [`init`]: Coordinator::init
    pub fn new(config: PairingConfig, parts: Collaborators) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            builder: OobPayloadBuilder::new(&config),
            config,
            entropy: parts.entropy,
            bridge: TagBridge::new(parts.tag),
            stack: parts.stack,
            keys: parts.keys,
            roles: RoleTracker::new(),
            state: HandshakeState::Idle,
            temp_key: TemporaryKey::default(),
            lesc_oob: LescOobData::default(),
            initialized: false,
        })
    }

    /// Bring up the entropy source and tag emulation and publish the first
    /// pairing message.
    pub fn init(&mut self, events: EventSender) -> Result<()> {
        info!("Initializing NFC OOB pairing...");

        self.entropy.init()?;
        self.refresh_temp_key()?;

        self.bridge.setup(events)?;
        self.initialized = true;

        self.set_pairing_data()?;
        self.bridge.start()?;

        info!("NFC OOB pairing ready");
        Ok(())
    }

    /// Regenerate LESC OOB data for the current public key and publish a
    /// fully re-encoded message. Call after rotating the LESC key pair.
    pub fn set_pairing_data(&mut self) -> Result<()> {
        self.ensure_initialized()?;
        self.regenerate_lesc_oob()?;
        self.rebuild_payload()
    }

    /// Restart tag emulation after a completed session.
    pub fn resume_emulation(&mut self) -> Result<()> {
        self.ensure_initialized()?;
        self.bridge.start()
    }

    /// Security parameters request from the peer manager.
    ///
    /// Returns the parameters sent in the reply, or `None` when the static
    /// configuration applies and no reply was needed.
    pub fn on_conn_sec_params_request(
        &mut self,
        conn: ConnHandle,
        peer: &SecurityParameters,
    ) -> Result<Option<SecurityParameters>> {
        debug!("CONN_SEC_PARAMS_REQ on {}", conn);

        let Some(params) = negotiate(self.roles.current(), peer, &self.config.security) else {
            return Ok(None);
        };

        self.stack.conn_sec_params_reply(conn, &params)?;
        Ok(Some(params))
    }

    /// Dispatch one event.
    pub fn handle_event(&mut self, event: PairingEvent) -> Result<()> {
        self.ensure_initialized()?;

        match event {
            PairingEvent::FieldOn => self.on_field_on(),
            PairingEvent::FieldOff => {
                debug!("NFC field off");
                Ok(())
            }
            PairingEvent::PeerTagRead(peer) => {
                self.roles.enter_reader(peer);
                self.sync_payload_role()
            }
            PairingEvent::AuthKeyRequest { conn } => self.on_auth_key_request(conn),
            PairingEvent::DhKeyRequest {
                conn,
                oob_requested,
            } => self.on_dh_key_request(conn, oob_requested),
            PairingEvent::AuthStatus { conn, success } => self.on_auth_status(conn, success),
            PairingEvent::ConnSecParamsRequest { conn, peer } => {
                self.on_conn_sec_params_request(conn, &peer).map(|_| ())
            }
        }
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    pub fn role(&self) -> &PairingRole {
        self.roles.current()
    }

    /// The local temporary key currently on the tag.
    pub fn temp_key(&self) -> &TemporaryKey {
        &self.temp_key
    }

    pub fn lesc_oob_data(&self) -> &LescOobData {
        &self.lesc_oob
    }

    pub fn payload(&self) -> Option<&NdefPayload> {
        self.bridge.payload()
    }

    pub fn is_emulating(&self) -> bool {
        self.bridge.is_active()
    }

    fn on_field_on(&mut self) -> Result<()> {
        debug!("NFC field on");

        self.refresh_temp_key()?;
        self.roles.enter_presenter();
        if self.payload_matches_role() {
            self.bridge.refresh_temp_key_region(&self.temp_key)?;
        } else {
            self.rebuild_payload()?;
        }
        self.bridge.start()?;

        self.state = HandshakeState::FieldDetected;
        Ok(())
    }

    fn on_auth_key_request(&mut self, conn: ConnHandle) -> Result<()> {
        debug!("AUTH_KEY_REQUEST on {}", conn);

        let key = match self.roles.current() {
            PairingRole::Reader(peer) => peer.temp_key,
            PairingRole::Presenter => self.temp_key,
            PairingRole::None => {
                debug!("No NFC pairing in progress, leaving auth key request alone");
                return Ok(());
            }
        };

        self.stack.auth_key_reply(conn, AuthKeyType::Oob, &key)?;
        self.state = HandshakeState::AwaitingKeyReply;
        Ok(())
    }

    fn on_dh_key_request(&mut self, conn: ConnHandle, oob_requested: bool) -> Result<()> {
        debug!("LESC_DHKEY_REQUEST on {} (oob={})", conn, oob_requested);

        if !oob_requested {
            return Ok(());
        }

        match self.roles.current() {
            PairingRole::Reader(peer) => {
                let Some(peer_oob) = peer.lesc else {
                    warn!("Peer tag carried no LESC OOB data, cannot answer DH key request");
                    return Ok(());
                };
                self.stack.lesc_oob_data_set(conn, None, Some(&peer_oob))?;
            }
            PairingRole::Presenter => {
                self.stack
                    .lesc_oob_data_set(conn, Some(&self.lesc_oob), None)?;
            }
            PairingRole::None => {
                // TODO: decide whether an OOB DH key request outside any NFC session should abort pairing.
                warn!("OOB DH key request on {} with no NFC pairing role", conn);
                return Ok(());
            }
        }

        self.state = HandshakeState::AwaitingDhKeyReply;
        Ok(())
    }

    fn on_auth_status(&mut self, conn: ConnHandle, success: bool) -> Result<()> {
        self.state = HandshakeState::Completed;
        info!(
            "Pairing on {} finished ({})",
            conn,
            if success { "success" } else { "failure" }
        );

        // Material for the next tap; cleanup runs even if regeneration fails.
        self.roles.clear();
        let regenerated = self.regenerate_lesc_oob().and_then(|()| self.republish_lesc());
        let stopped = self.bridge.stop();
        self.state = HandshakeState::Idle;

        regenerated?;
        stopped
    }

    /// Draw a fresh temporary key. A short draw keeps the old tail bytes.
    fn refresh_temp_key(&mut self) -> Result<()> {
        let mut tk = self.temp_key.0;
        let length = generate(self.entropy.as_mut(), &mut tk, TK_LEN)?;
        self.temp_key = TemporaryKey(tk);
        trace!("Temporary key refreshed: {} of {} bytes", length, TK_LEN);
        Ok(())
    }

    fn regenerate_lesc_oob(&mut self) -> Result<()> {
        match self.keys.current_public_key() {
            Some(public_key) => {
                self.lesc_oob = self
                    .stack
                    .lesc_oob_data_get(ConnHandle::INVALID, &public_key)?;
                debug!("LESC OOB data regenerated");
            }
            None => {
                warn!("No LESC public key yet, tag will carry legacy OOB data only");
                self.lesc_oob = LescOobData {
                    addr: self.stack.local_address()?,
                    ..LescOobData::default()
                };
            }
        }
        Ok(())
    }

    /// Patch new LESC values into the payload, re-encoding if it has no
    /// LESC fields, gained or lost a public key, or carries a stale role.
    fn republish_lesc(&mut self) -> Result<()> {
        let has_key = self.keys.current_public_key().is_some();
        let has_fields = self
            .bridge
            .payload()
            .is_some_and(|p| p.lesc_offsets().is_some());

        if has_key && has_fields && self.payload_matches_role() {
            self.bridge.refresh_lesc_region(&self.lesc_oob)
        } else {
            self.rebuild_payload()
        }
    }

    /// True when a payload is published and its LE Role matches our side.
    fn payload_matches_role(&self) -> bool {
        let presenter = !self.roles.current().is_reader();
        self.bridge
            .payload()
            .is_some_and(|p| p.is_presenter() == presenter)
    }

    fn sync_payload_role(&mut self) -> Result<()> {
        if self.payload_matches_role() {
            return Ok(());
        }
        debug!("Pairing role changed, re-encoding tag payload");
        self.rebuild_payload()
    }

    fn rebuild_payload(&mut self) -> Result<()> {
        let public_key = self.keys.current_public_key();
        let presenter = !self.roles.current().is_reader();
        let payload = self.builder.build(
            presenter,
            &self.temp_key,
            &self.lesc_oob,
            public_key.as_ref(),
        )?;
        self.bridge.publish(payload)
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(PairError::NotInitialized)
        }
    }
}
