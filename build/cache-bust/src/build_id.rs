// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use core::fmt;
use core::str::FromStr;

use rand::Rng;

/// Length of a generated [`BuildId`].
pub const BUILD_ID_LEN: usize = 8;

const ALPHABET: &[u8; 36] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// A token embedded into every asset filename of one build.
///
/// The id only has to differ from the unmodified filenames, so there is no
/// attempt at global uniqueness.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BuildId(String);

impl BuildId {
    /// Draws a fresh id from the thread-local RNG.
    pub fn generate() -> Self {
        Self::generate_with(&mut rand::rng())
    }

    pub fn generate_with<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let id = (0..BUILD_ID_LEN)
            .map(|_| char::from(ALPHABET[rng.random_range(0..ALPHABET.len())]))
            .collect();
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BuildId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for BuildId {
    type Err = InvalidBuildId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(InvalidBuildId {
                id: s.to_string(),
                reason: "must not be empty",
            });
        }
        // the id becomes a dot-separated filename segment of its own
        if !s.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(InvalidBuildId {
                id: s.to_string(),
                reason: "may only contain ASCII letters and digits",
            });
        }
        Ok(Self(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidBuildId {
    pub id: String,
    pub reason: &'static str,
}

impl fmt::Display for InvalidBuildId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid build id {:?}: {}", self.id, self.reason)
    }
}

impl core::error::Error for InvalidBuildId {}
