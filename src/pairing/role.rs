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

//! Tracks which side of the NFC exchange the local device is on.
//!
//! A reader (central) read the peer's tag and consumes the peer's OOB data.
//! A presenter (peripheral) had its own tag read and hands out local data.
//! Both are variants of one enum, so a session can never be both.

use tracing::{debug, info};

use crate::ble::{LescOobData, TemporaryKey};

/// OOB material read from a peer's tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerOobData {
    pub temp_key: TemporaryKey,
    pub lesc: Option<LescOobData>,
}

/// Role of the local device for the current pairing session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PairingRole {
    #[default]
    None,
    Reader(PeerOobData),
    Presenter,
}

impl PairingRole {
    pub fn is_reader(&self) -> bool {
        matches!(self, PairingRole::Reader(_))
    }

    pub fn is_presenter(&self) -> bool {
        matches!(self, PairingRole::Presenter)
    }
}

/// Holder of the single process-wide pairing role.
#[derive(Debug, Default)]
pub struct RoleTracker {
    role: PairingRole,
}

impl RoleTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> &PairingRole {
        &self.role
    }

    /// The peer's tag was read; act as the OOB data consumer.
    pub fn enter_reader(&mut self, peer: PeerOobData) {
        if self.role.is_presenter() {
            info!("Peer tag read during presenter session, switching to reader");
        }
        self.role = PairingRole::Reader(peer);
        debug!("Pairing role: reader (peer LESC data: {})", peer.lesc.is_some());
    }

    /// Our tag was read; act as the OOB data source.
    ///
    /// An active reader session takes precedence and is left untouched.
    /// Returns whether the local device is now the presenter.
    pub fn enter_presenter(&mut self) -> bool {
        match self.role {
            PairingRole::Reader(_) => {
                debug!("Field detected while reading a peer tag, keeping reader role");
                false
            }
            _ => {
                self.role = PairingRole::Presenter;
                debug!("Pairing role: presenter");
                true
            }
        }
    }

    pub fn clear(&mut self) {
        self.role = PairingRole::None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ble::TK_LEN;

    fn peer() -> PeerOobData {
        PeerOobData {
            temp_key: TemporaryKey([0x42; TK_LEN]),
            lesc: None,
        }
    }

    #[test]
    fn test_starts_with_no_role() {
        let tracker = RoleTracker::new();
        assert_eq!(tracker.current(), &PairingRole::None);
    }

    #[test]
    fn test_reader_takes_precedence_over_presenter() {
        let mut tracker = RoleTracker::new();
        tracker.enter_reader(peer());
        assert!(!tracker.enter_presenter());
        assert!(tracker.current().is_reader());
        assert!(!tracker.current().is_presenter());
    }

    #[test]
    fn test_reader_replaces_presenter() {
        let mut tracker = RoleTracker::new();
        assert!(tracker.enter_presenter());
        tracker.enter_reader(peer());
        assert_eq!(tracker.current(), &PairingRole::Reader(peer()));
    }

    #[test]
    fn test_clear() {
        let mut tracker = RoleTracker::new();
        tracker.enter_presenter();
        tracker.clear();
        assert_eq!(tracker.current(), &PairingRole::None);
    }
}
