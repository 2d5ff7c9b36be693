//! Execution side of the engine: turning host input into validated,
//! postable entry views.
//!
//! Nothing here touches storage; resolution is pure and every invalid
//! input fails before a lock is taken.

pub mod account;
pub mod entry;
pub mod error;
pub mod movement;

pub use account::AccountKey;
pub use entry::{EntryParams, EntryView, MovementsBuilder, ResolvedEntry};
pub use error::ExecutionError;
pub use movement::{signed_amount, ResolvedMovement};
