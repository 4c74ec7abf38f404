//! In-memory resource storage.
//!
//! # Data Flow
//! ```text
//! pipeline dispatch
//!     → ResourceStore (create/get/list/update/delete)
//!         → allocator.rs (fresh id on create)
//!         → DashMap<u64, Resource> (sharded locking)
//! ```
//!
//! # Design Decisions
//! - The store owns its synchronization and is injected, never global
//! - Ids come only from the allocator; callers cannot supply one on create
//! - Update and delete are a single check-and-mutate under one shard lock

pub mod allocator;
pub mod memory;

pub use allocator::IdAllocator;
pub use memory::{Resource, ResourceStore, StoreError};
