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

//! Pairing configuration.
//!
//! Loaded from `config.toml` in the user's config directory. A missing file
//! means defaults; a present but malformed file is an error.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::ble::KeyDistribution;
use crate::error::PairError;
use crate::nfc::TransportTag;

/// Smallest NDEF buffer that can hold a TK-only LE OOB record.
pub const MIN_NDEF_CAPACITY: usize = 32;

/// Static security parameters applied on every negotiation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticSecurityConfig {
    pub min_key_size: u8,
    pub max_key_size: u8,
    pub keypress: bool,
    pub bond: bool,
    pub kdist_own: KeyDistribution,
    pub kdist_peer: KeyDistribution,
}

impl Default for StaticSecurityConfig {
    fn default() -> Self {
        let both = KeyDistribution { enc: true, id: true };
        Self {
            min_key_size: 7,
            max_key_size: 16,
            keypress: false,
            bond: true,
            kdist_own: both,
            kdist_peer: both,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PairingConfig {
    /// Default tracing filter; `RUST_LOG` overrides it.
    pub log_level: String,
    /// NDEF message layout published on the tag.
    pub transport: TransportTag,
    /// Capacity of the NDEF message buffer in bytes.
    pub ndef_capacity: usize,
    /// Optional local name included in the OOB record.
    pub device_name: Option<String>,
    pub security: StaticSecurityConfig,
}

impl Default for PairingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            transport: TransportTag::LeShort,
            ndef_capacity: 256,
            device_name: None,
            security: StaticSecurityConfig::default(),
        }
    }
}

impl PairingConfig {
    /// `$XDG_CONFIG_HOME/nfc-oob-pair/config.toml`, if a config dir exists.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("nfc-oob-pair").join("config.toml"))
    }

    /// Load and validate configuration from `path`.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("Config file {:?} doesn't exist, using defaults", path);
            return Ok(Self::default());
        }

        let content =
            std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;

        let config: PairingConfig =
            toml::from_str(&content).with_context(|| format!("Failed to parse {:?}", path))?;

        config
            .validate()
            .with_context(|| format!("Invalid configuration in {:?}", path))?;

        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Check the invariants the coordinator relies on.
    pub fn validate(&self) -> Result<(), PairError> {
        let sec = &self.security;

        if !(7..=16).contains(&sec.min_key_size) || !(7..=16).contains(&sec.max_key_size) {
            return Err(PairError::Config(format!(
                "key sizes must be within 7..=16 (got {}..={})",
                sec.min_key_size, sec.max_key_size
            )));
        }
        if sec.min_key_size > sec.max_key_size {
            return Err(PairError::Config(format!(
                "min_key_size {} exceeds max_key_size {}",
                sec.min_key_size, sec.max_key_size
            )));
        }
        if sec.bond && !sec.kdist_own.any() && !sec.kdist_peer.any() {
            return Err(PairError::Config(
                "bonding requires at least one key distribution flag".to_string(),
            ));
        }
        if self.ndef_capacity < MIN_NDEF_CAPACITY {
            return Err(PairError::Config(format!(
                "ndef_capacity must be at least {} bytes",
                MIN_NDEF_CAPACITY
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config = PairingConfig::load(&temp_dir.path().join("config.toml"))?;
        assert_eq!(config, PairingConfig::default());
        Ok(())
    }

    #[test]
    fn test_partial_file_keeps_defaults() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
transport = "le_handover"
device_name = "Tap Lock"

[security]
keypress = true
"#,
        )?;

        let config = PairingConfig::load(&path)?;
        assert_eq!(config.transport, TransportTag::LeHandover);
        assert_eq!(config.device_name.as_deref(), Some("Tap Lock"));
        assert!(config.security.keypress);
        assert_eq!(config.security.max_key_size, 16);
        assert_eq!(config.ndef_capacity, 256);
        Ok(())
    }

    #[test]
    fn test_malformed_file_is_error() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "ndef_capacity = \"big\"")?;
        assert!(PairingConfig::load(&path).is_err());
        Ok(())
    }

    #[test]
    fn test_bonding_without_key_distribution_rejected() {
        let mut config = PairingConfig::default();
        config.security.kdist_own = KeyDistribution::default();
        config.security.kdist_peer = KeyDistribution::default();
        assert!(matches!(config.validate(), Err(PairError::Config(_))));

        config.security.bond = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_key_size_bounds_rejected() {
        let mut config = PairingConfig::default();
        config.security.min_key_size = 12;
        config.security.max_key_size = 10;
        assert!(config.validate().is_err());

        config.security.min_key_size = 6;
        config.security.max_key_size = 16;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_tiny_capacity_rejected() {
        let config = PairingConfig {
            ndef_capacity: 8,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
