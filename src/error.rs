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

//! Error types and the process-wide fault handler.
//!
//! Synchronous entry points (`init`, `set_pairing_data`) return errors to
//! their caller. Event handlers have no caller waiting on them, so the event
//! processor hands their errors to a [`FaultHandler`] instead.

use thiserror::Error;
use tracing::error;

/// Errors reported by the security-manager stack.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StackError {
    #[error("invalid state")]
    InvalidState,
    #[error("invalid connection handle {0:#06x}")]
    InvalidConnHandle(u16),
    #[error("stack busy")]
    Busy,
    #[error("out of resources")]
    NoResources,
    #[error("{0}")]
    Other(String),
}

/// Errors reported by the NFC tag emulation driver.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TagError {
    #[error("tag emulation not set up")]
    NotSetUp,
    #[error("payload of {0} bytes rejected by driver")]
    PayloadRejected(usize),
    #[error("driver failure: {0}")]
    Driver(String),
}

/// Errors reported by an entropy source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntropyError {
    /// Fewer bytes buffered than requested. Not fatal.
    #[error("not enough random bytes buffered")]
    Insufficient,
    #[error("entropy hardware failure: {0}")]
    Hardware(String),
}

/// Errors produced by the pairing coordinator and its components.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PairError {
    #[error("NDEF message needs {needed} bytes but the buffer holds {capacity}")]
    Encoding { needed: usize, capacity: usize },
    #[error("published payload has no {0} field to patch")]
    PayloadShape(&'static str),
    #[error("entropy source: {0}")]
    Entropy(#[from] EntropyError),
    #[error("tag emulation: {0}")]
    Tag(#[from] TagError),
    #[error("security stack: {0}")]
    Stack(#[from] StackError),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("coordinator used before init")]
    NotInitialized,
}

pub type Result<T, E = PairError> = std::result::Result<T, E>;

/// Receives fatal errors raised inside asynchronous event handlers.
pub trait FaultHandler: Send {
    fn report(&self, err: &PairError, context: &str);
}

/// Default fault handler: logs the fault and carries on.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogFaultHandler;

impl FaultHandler for LogFaultHandler {
    fn report(&self, err: &PairError, context: &str) {
        error!("Fatal pairing fault while handling {}: {}", context, err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_errors_convert() {
        let err: PairError = StackError::InvalidConnHandle(0xFFFF).into();
        assert_eq!(
            err.to_string(),
            "security stack: invalid connection handle 0xffff"
        );

        let err: PairError = TagError::NotSetUp.into();
        assert!(matches!(err, PairError::Tag(TagError::NotSetUp)));
    }

    #[test]
    fn test_encoding_error_message() {
        let err = PairError::Encoding {
            needed: 300,
            capacity: 256,
        };
        assert_eq!(
            err.to_string(),
            "NDEF message needs 300 bytes but the buffer holds 256"
        );
    }
}
