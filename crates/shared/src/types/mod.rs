//! Common types used across the engine.

pub mod entity;
pub mod ident;
pub mod money;

pub use entity::EntityRef;
pub use ident::{Ident, IdentError};
pub use money::{Currency, Money, MoneyError};
