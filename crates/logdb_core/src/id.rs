//! Record identifier.

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Length of the hex rendering of a [`RecordId`].
pub const RECORD_ID_HEX_LEN: usize = 24;

const COUNTER_MASK: u32 = 0x00ff_ffff;

/// Salt shared by every id generated in this process.
fn process_salt() -> &'static [u8; 5] {
    static SALT: OnceLock<[u8; 5]> = OnceLock::new();
    SALT.get_or_init(rand::random)
}

fn process_counter() -> &'static AtomicU32 {
    static COUNTER: OnceLock<AtomicU32> = OnceLock::new();
    COUNTER.get_or_init(|| AtomicU32::new(rand::random::<u32>() & COUNTER_MASK))
}

/// Unique identifier of a record (its `_id` field).
///
/// Twelve bytes:
/// - 4-byte big-endian Unix timestamp in seconds
/// - 5-byte salt generated once per process
/// - 3-byte big-endian counter, wrapping modulo 2^24
///
/// Ids are rendered as 24 lowercase hex characters. Byte order and hex
/// order agree, so ids created by one process sort by creation second.
/// Ids are assigned on insert and never change.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordId([u8; 12]);

impl RecordId {
    /// Generates a fresh id for the current time.
    #[must_use]
    pub fn new() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let timestamp = u32::try_from(secs).unwrap_or(u32::MAX);
        let counter = process_counter().fetch_add(1, Ordering::Relaxed) & COUNTER_MASK;
        Self::from_parts(timestamp, *process_salt(), counter)
    }

    /// Builds an id from its three components. The counter is truncated to 24 bits.
    #[must_use]
    pub fn from_parts(timestamp: u32, salt: [u8; 5], counter: u32) -> Self {
        let mut bytes = [0u8; 12];
        bytes[..4].copy_from_slice(&timestamp.to_be_bytes());
        bytes[4..9].copy_from_slice(&salt);
        bytes[9..].copy_from_slice(&(counter & COUNTER_MASK).to_be_bytes()[1..]);
        Self(bytes)
    }

    /// Creates an id from raw bytes.
    #[inline]
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    /// Returns the raw bytes.
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 12] {
        &self.0
    }

    /// Returns the creation time in Unix seconds.
    #[must_use]
    pub fn timestamp(&self) -> u32 {
        u32::from_be_bytes([self.0[0], self.0[1], self.0[2], self.0[3]])
    }

    /// Returns the hex rendering.
    #[must_use]
    pub fn to_hex(&self) -> String {
        self.to_string()
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordId({self})")
    }
}

/// Error returned when parsing a malformed record id.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid record id {0:?}: expected 24 hex characters")]
pub struct ParseRecordIdError(pub String);

impl FromStr for RecordId {
    type Err = ParseRecordIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseRecordIdError(s.to_string());
        if s.len() != RECORD_ID_HEX_LEN || !s.is_ascii() {
            return Err(err());
        }
        let mut bytes = [0u8; 12];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16).map_err(|_| err())?;
        }
        Ok(Self(bytes))
    }
}

impl From<[u8; 12]> for RecordId {
    fn from(bytes: [u8; 12]) -> Self {
        Self::from_bytes(bytes)
    }
}

impl Serialize for RecordId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

struct RecordIdVisitor;

impl Visitor<'_> for RecordIdVisitor {
    type Value = RecordId;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a 24 character hex record id")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<RecordId, E> {
        v.parse().map_err(E::custom)
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_str(RecordIdVisitor)
    }
}
