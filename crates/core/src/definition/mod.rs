//! Declaration side of the engine: tenants, accounts, entries,
//! movements, and revaluations, frozen into an immutable [`Definition`].
//!
//! Hosts build the definition once at startup through
//! [`Definition::configure`]; everything in this module is
//! configuration-time and fails with [`ConfigError`] before any ledger
//! row is touched.

pub mod account;
pub mod builder;
pub mod entry;
pub mod error;
pub mod registry;
pub mod revaluation;
pub mod tenant;

pub use account::{AccountDefinition, AccountType};
pub use builder::{AccountSpec, DefinitionBuilder, EntryBuilder, RevaluationBuilder, TenantBuilder};
pub use entry::{EntryDefinition, MovementDefinition, Side};
pub use error::ConfigError;
pub use registry::Definition;
pub use revaluation::{RevaluationDefinition, RevaluationDirection, RevaluationTarget};
pub use tenant::TenantDefinition;
