//! Shared types and configuration for Tally.
//!
//! This crate provides the primitives every other crate builds on:
//! - Money with exact decimal arithmetic and open currency codes
//! - Canonical symbolic identifiers for definition names
//! - References to host-application records
//! - Engine runtime configuration

pub mod config;
pub mod types;

pub use config::{EngineConfig, LockingConfig};
pub use types::{Currency, EntityRef, Ident, IdentError, Money, MoneyError};
