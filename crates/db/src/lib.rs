//! In-process reference store for the Tally ledger engine.
//!
//! This crate provides:
//! - [`MemStore`], an implementation of the `tally-core` storage
//!   contract over guarded hash maps with real row locking: blocking
//!   acquisition, wait-for-graph deadlock detection, lock-wait
//!   timeouts, and duplicate-key detection
//! - [`LineFilter`], the predicate-based query surface over posted
//!   lines
//!
//! Hosts that embed the engine without a database use this store
//! directly; it is also the backend of the integration suite.

pub mod mem;
pub mod query;

pub use mem::{MemStore, MemTransaction};
pub use query::LineFilter;
