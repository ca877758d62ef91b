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

//! Random material generation from a buffered entropy source.

use tracing::{trace, warn};

use crate::error::{EntropyError, Result};

/// A non-blocking entropy source with an internal output queue, such as a
/// hardware RNG peripheral.
pub trait EntropySource: Send {
    /// Prepare the source. Sources that are already running return `Ok`.
    fn init(&mut self) -> Result<(), EntropyError> {
        Ok(())
    }

    /// Number of random bytes currently buffered.
    fn bytes_available(&self) -> usize;

    /// Fill `buf` from the buffered output.
    fn draw(&mut self, buf: &mut [u8]) -> Result<(), EntropyError>;
}

/// Draw up to `requested` bytes into `buf` without waiting for more entropy.
///
/// Returns the number of bytes written: `min(requested, available, buf.len())`.
/// A short draw is not an error; callers may call again once the source has
/// refilled. Any failure other than [`EntropyError::Insufficient`] is fatal.
pub fn generate(source: &mut dyn EntropySource, buf: &mut [u8], requested: usize) -> Result<usize> {
    let available = source.bytes_available();
    let length = requested.min(available).min(buf.len());

    if length == 0 {
        if requested > 0 {
            warn!("Entropy source has no bytes buffered");
        }
        return Ok(0);
    }

    match source.draw(&mut buf[..length]) {
        Ok(()) => {}
        Err(EntropyError::Insufficient) => {
            warn!("Entropy source drained between query and draw");
            return Ok(0);
        }
        Err(e) => return Err(e.into()),
    }

    if length < requested {
        warn!("Short random draw: {} of {} bytes", length, requested);
    } else {
        trace!("Random draw: {} bytes", length);
    }

    Ok(length)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PairError;

    /// Hands out a counting byte pattern from a fixed-size pool.
    struct PoolSource {
        available: usize,
        next: u8,
        fail: Option<EntropyError>,
    }

    impl PoolSource {
        fn with(available: usize) -> Self {
            Self {
                available,
                next: 1,
                fail: None,
            }
        }
    }

    impl EntropySource for PoolSource {
        fn bytes_available(&self) -> usize {
            self.available
        }

        fn draw(&mut self, buf: &mut [u8]) -> Result<(), EntropyError> {
            if let Some(e) = self.fail.clone() {
                return Err(e);
            }
            assert!(buf.len() <= self.available, "overdraw");
            for b in buf.iter_mut() {
                *b = self.next;
                self.next = self.next.wrapping_add(1);
            }
            self.available -= buf.len();
            Ok(())
        }
    }

    #[test]
    fn test_generate_is_min_of_requested_and_available() {
        for requested in [0usize, 1, 8, 16] {
            for available in [0usize, 3, 16, 64] {
                let mut source = PoolSource::with(available);
                let mut buf = [0u8; 16];
                let n = generate(&mut source, &mut buf, requested).unwrap();
                assert_eq!(n, requested.min(available), "L={requested} A={available}");
                assert_eq!(source.available, available - n);
            }
        }
    }

    #[test]
    fn test_generate_never_exceeds_buffer() {
        let mut source = PoolSource::with(100);
        let mut buf = [0u8; 4];
        let n = generate(&mut source, &mut buf, 32).unwrap();
        assert_eq!(n, 4);
        assert_eq!(buf, [1, 2, 3, 4]);
    }

    #[test]
    fn test_short_draw_leaves_tail_untouched() {
        let mut source = PoolSource::with(2);
        let mut buf = [0xEEu8; 4];
        assert_eq!(generate(&mut source, &mut buf, 4).unwrap(), 2);
        assert_eq!(buf, [1, 2, 0xEE, 0xEE]);
    }

    #[test]
    fn test_insufficient_is_not_fatal() {
        let mut source = PoolSource::with(16);
        source.fail = Some(EntropyError::Insufficient);
        let mut buf = [0u8; 16];
        assert_eq!(generate(&mut source, &mut buf, 16).unwrap(), 0);
    }

    #[test]
    fn test_hardware_failure_is_fatal() {
        let mut source = PoolSource::with(16);
        source.fail = Some(EntropyError::Hardware("rng fault".into()));
        let mut buf = [0u8; 16];
        let err = generate(&mut source, &mut buf, 16).unwrap_err();
        assert!(matches!(err, PairError::Entropy(EntropyError::Hardware(_))));
    }
}
