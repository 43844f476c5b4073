//! BIP-32 derivation paths.
//!
//! A path is an ordered list of child indices. Hardened indices carry the
//! high bit ([`HARDENED_OFFSET`]) and print with a `'` suffix.

use std::fmt;
use std::str::FromStr;

use micro_core::constants::HARDENED_OFFSET;
use micro_core::error::DerivationError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Ordered sequence of child indices, relative to some root key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DerivationPath(Vec<u32>);

/// Harden a child index.
pub fn hardened(index: u32) -> u32 {
    index | HARDENED_OFFSET
}

/// Whether a child index is hardened.
pub fn is_hardened(index: u32) -> bool {
    index & HARDENED_OFFSET != 0
}

impl DerivationPath {
    /// The empty path (the root key itself).
    pub fn master() -> Self {
        Self(Vec::new())
    }

    /// Account root path `m/purpose'/coin'/account'`.
    pub fn account(purpose: u32, slip44: u32, account: u32) -> Self {
        Self(vec![hardened(purpose), hardened(slip44), hardened(account)])
    }

    /// Path segments.
    pub fn segments(&self) -> &[u32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// This path extended by one segment.
    pub fn child(&self, index: u32) -> Self {
        let mut segments = self.0.clone();
        segments.push(index);
        Self(segments)
    }

    /// This path followed by `other`.
    pub fn extend(&self, other: &DerivationPath) -> Self {
        let mut segments = self.0.clone();
        segments.extend_from_slice(&other.0);
        Self(segments)
    }

    /// First hardened segment, if any.
    pub fn first_hardened(&self) -> Option<u32> {
        self.0.iter().copied().find(|&i| is_hardened(i))
    }

    /// BIP-43 purpose of a full path, if its first segment is hardened.
    pub fn purpose(&self) -> Option<u32> {
        match self.0.first() {
            Some(&first) if is_hardened(first) => Some(first & !HARDENED_OFFSET),
            _ => None,
        }
    }
}

impl From<Vec<u32>> for DerivationPath {
    fn from(segments: Vec<u32>) -> Self {
        Self(segments)
    }
}

impl FromStr for DerivationPath {
    type Err = DerivationError;

    /// Parse `m/49'/0'/0'/1/5`. The leading `m` is optional; `'`, `h` and
    /// `H` all mark a hardened segment.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let body = match s.strip_prefix('m') {
            Some("") => return Ok(Self::master()),
            Some(rest) => rest
                .strip_prefix('/')
                .ok_or_else(|| DerivationError::InvalidPath(s.to_string()))?,
            None => s,
        };
        if body.is_empty() {
            return Ok(Self::master());
        }

        let mut segments = Vec::new();
        for part in body.split('/') {
            let (digits, harden) = match part.strip_suffix(['\'', 'h', 'H']) {
                Some(digits) => (digits, true),
                None => (part, false),
            };
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return Err(DerivationError::InvalidPath(format!(
                    "{s}: malformed segment {part:?}"
                )));
            }
            let index: u32 = digits.parse().map_err(|_| {
                DerivationError::InvalidPath(format!("{s}: segment {part:?} out of range"))
            })?;
            if is_hardened(index) {
                return Err(DerivationError::InvalidPath(format!(
                    "{s}: segment {part:?} out of range"
                )));
            }
            segments.push(if harden { hardened(index) } else { index });
        }
        Ok(Self(segments))
    }
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("m")?;
        for &index in &self.0 {
            if is_hardened(index) {
                write!(f, "/{}'", index & !HARDENED_OFFSET)?;
            } else {
                write!(f, "/{index}")?;
            }
        }
        Ok(())
    }
}

impl Serialize for DerivationPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DerivationPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
