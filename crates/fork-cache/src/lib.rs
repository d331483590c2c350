//! # fork-cache
//!
//! Persistent, ancestry-aware cache for forked chains.
//!
//! A local development node that forks off a live chain serves reads for
//! not-yet-mutated data from the remote. This crate remembers those remote
//! reads across process restarts and across independent fork sessions, and
//! tracks how fork targets relate to each other in chain history so cached
//! data is reused between sessions that provably share history and never
//! between sessions that do not.
//!
//! Relationships are discovered lazily through targeted remote probes (a
//! "block at this number" query supplied by the caller), never by replaying
//! history. The cache itself is byte-oriented and makes no network calls.
//!
//! ```no_run
//! use fork_cache::{testing::MockChain, CacheHandle};
//! # async fn demo() -> fork_cache::Result<()> {
//! let chain = MockChain::generate(1, 64);
//! let handle = CacheHandle::in_memory();
//! let session = handle.resolve(chain.head(), &chain).await?;
//! session.put(b"block:63".to_vec(), b"...".to_vec());
//! assert!(session.get(b"block:63").is_some());
//! session.close()?;
//! # Ok(())
//! # }
//! ```

#[macro_use]
extern crate tracing;

mod ancestry;
mod error;
mod key;
mod rebalance;
mod registry;
mod remote;
mod resolve;
mod session;
mod store;

pub mod config;
pub mod testing;

pub use error::{Error, RemoteSourceError, Result};
pub use key::{ForkBlock, NodeKey, NODE_KEY_LEN};
pub use registry::{CacheHandle, NetworkCache};
pub use remote::RemoteChainSource;
pub use session::ForkSession;
