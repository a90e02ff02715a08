//! # state-store
//!
//! A keyed map with one writer and any number of readers. The writer
//! mutates a private working copy and publishes it atomically; readers
//! always see a whole published version. A read holds the lock only long
//! enough to clone the published snapshot, never across a writer's mutation.
//!
//! ```rust
//! use state_store::StateStore;
//!
//! let mut store = StateStore::<u32, String>::new();
//! let reader = store.reader();
//!
//! store.insert(1, "on".to_string());
//! store.modify(&1, |value| value.push_str("line"));
//! store.publish();
//!
//! let snapshot = reader.snapshot();
//! assert_eq!(snapshot.get(&1).as_deref().map(String::as_str), Some("online"));
//! assert_eq!(snapshot.version(), 1);
//! ```

pub mod snapshot;
pub mod store;

pub use snapshot::Snapshot;
pub use store::{StateStore, StoreReader};
