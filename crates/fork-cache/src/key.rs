//! Fork target identifiers and their fixed-width key encoding.

use alloy_primitives::{hex, B256};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, str::FromStr};

/// A fork target: the remote block a session reads through to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForkBlock {
    /// Block number on the remote chain.
    pub number: u64,
    /// Block hash on the remote chain.
    pub hash: B256,
}

impl ForkBlock {
    pub fn new(number: u64, hash: B256) -> Self {
        Self { number, hash }
    }

    /// The ancestry node key for this fork target.
    pub fn key(&self) -> NodeKey {
        NodeKey { number: self.number, hash: self.hash }
    }
}

impl fmt::Display for ForkBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.number, self.hash)
    }
}

/// Length in bytes of an encoded [`NodeKey`].
pub const NODE_KEY_LEN: usize = 40;

/// Deterministic identifier of one ancestry node.
///
/// Encodes as the 8-byte big-endian block number followed by the 32-byte
/// block hash, so the derived ordering sorts by number first. This encoding
/// is also the persisted representation, rendered as `0x` + 80 hex chars.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeKey {
    number: u64,
    hash: B256,
}

impl NodeKey {
    pub fn number(&self) -> u64 {
        self.number
    }

    pub fn hash(&self) -> B256 {
        self.hash
    }

    /// The fork target this key identifies.
    pub fn block(&self) -> ForkBlock {
        ForkBlock { number: self.number, hash: self.hash }
    }

    pub fn encode(&self) -> [u8; NODE_KEY_LEN] {
        let mut out = [0u8; NODE_KEY_LEN];
        out[..8].copy_from_slice(&self.number.to_be_bytes());
        out[8..].copy_from_slice(self.hash.as_slice());
        out
    }

    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != NODE_KEY_LEN {
            return None;
        }
        let mut number = [0u8; 8];
        number.copy_from_slice(&bytes[..8]);
        Some(Self { number: u64::from_be_bytes(number), hash: B256::from_slice(&bytes[8..]) })
    }
}

impl From<ForkBlock> for NodeKey {
    fn from(block: ForkBlock) -> Self {
        block.key()
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode_prefixed(self.encode()))
    }
}

impl fmt::Debug for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeKey({self})")
    }
}

impl FromStr for NodeKey {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)?;
        Self::decode(&bytes).ok_or(hex::FromHexError::InvalidStringLength)
    }
}

impl Serialize for NodeKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for NodeKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}
