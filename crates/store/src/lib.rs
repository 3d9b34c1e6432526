//! Durable, versioned, append-only genesis transaction store.
//!
//! [`GenesisStore`] is the single mutable shared resource of the pool
//! coordinator: all mutation funnels through its `append` operation, which is
//! the sole serialization point. Readers take immutable [`GenesisSnapshot`]s
//! and can never observe a partial append.

#![deny(unsafe_code)]

mod store;

pub use store::GenesisStore;
pub use genpool_types::GenesisSnapshot;
