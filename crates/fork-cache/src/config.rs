//! Cache location configuration.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::PathBuf;

/// File name of the persisted document inside a chain's cache directory.
pub const CACHE_FILE_NAME: &str = "forks.json";

/// Returns the cache directory: `~/.fork-cache/cache`.
pub fn cache_dir() -> Option<PathBuf> {
    dirs_next::home_dir().map(|home| home.join(".fork-cache").join("cache"))
}

/// Returns the rpc cache directory: `~/.fork-cache/cache/rpc`.
pub fn rpc_cache_dir() -> Option<PathBuf> {
    Some(cache_dir()?.join("rpc"))
}

/// Returns the cache location for `chain_id`:
/// `~/.fork-cache/cache/rpc/<chain_id>/forks.json`.
pub fn chain_cache_location(chain_id: u64) -> Option<PathBuf> {
    Some(rpc_cache_dir()?.join(chain_id.to_string()).join(CACHE_FILE_NAME))
}

/// Settings controlling which forks get a persistent cache.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachingConfig {
    /// Chains to cache.
    pub chains: CachedChains,
}

impl CachingConfig {
    /// Whether caching should be enabled for the chain id.
    pub fn enable_for_chain_id(&self, chain_id: u64) -> bool {
        // ignore dev chains
        if [99, 1337, 31337].contains(&chain_id) {
            return false;
        }
        self.chains.is_match(chain_id)
    }
}

/// What chains to cache.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CachedChains {
    /// Cache all chains.
    All,
    /// Don't cache anything.
    None,
    /// Only cache these chains.
    Chains(Vec<u64>),
}

impl CachedChains {
    /// Whether the chain id matches.
    pub fn is_match(&self, chain_id: u64) -> bool {
        match self {
            Self::All => true,
            Self::None => false,
            Self::Chains(chains) => chains.contains(&chain_id),
        }
    }
}

impl Serialize for CachedChains {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::All => serializer.serialize_str("all"),
            Self::None => serializer.serialize_str("none"),
            Self::Chains(chains) => chains.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for CachedChains {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Chains {
            All(String),
            Chains(Vec<u64>),
        }

        match Chains::deserialize(deserializer)? {
            Chains::All(s) => match s.as_str() {
                "all" => Ok(Self::All),
                "none" => Ok(Self::None),
                s => Err(serde::de::Error::unknown_variant(s, &["all", "none"])),
            },
            Chains::Chains(chains) => Ok(Self::Chains(chains)),
        }
    }
}

impl Default for CachedChains {
    fn default() -> Self {
        Self::All
    }
}
