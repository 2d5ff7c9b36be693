//! Core ledger engine for Tally.
//!
//! This crate contains the pure engine with ZERO web or database dependencies.
//! Hosts declare their ledger once through [`definition::Definition::configure`],
//! then execute entries against any storage backend implementing the contract
//! in [`store`].
//!
//! # Modules
//!
//! - `definition` - Declared tenants, accounts, entries, and revaluations
//! - `execution` - Resolution of host input into validated, postable views
//! - `engine` - The create/adjust posting machine
//! - `locking` - Sorted row-lock protocol with bounded, jittered retries
//! - `revaluation` - FX drift correction executor
//! - `store` - Storage contract: traits, row shapes, error taxonomy

pub mod definition;
pub mod engine;
pub mod execution;
pub mod locking;
pub mod revaluation;
pub mod store;
