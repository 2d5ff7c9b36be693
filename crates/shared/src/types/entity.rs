//! References to host-application records.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ident::{Ident, IdentError};

/// A reference to a host-application record: its model kind plus its id.
///
/// Tenants, documents, and accountables are rows owned by the host. The
/// engine never loads them; it stores and compares references.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityRef {
    /// Canonical host model kind, e.g. `portfolio` or `user`.
    pub kind: Ident,
    /// The record's identifier.
    pub id: Uuid,
}

impl EntityRef {
    /// Creates a reference from an already-canonical kind.
    #[must_use]
    pub const fn new(kind: Ident, id: Uuid) -> Self {
        Self { kind, id }
    }

    /// Creates a reference, normalizing the kind.
    pub fn of(kind: &str, id: Uuid) -> Result<Self, IdentError> {
        Ok(Self::new(Ident::new(kind)?, id))
    }
}

impl std::fmt::Display for EntityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_of_normalizes_kind() {
        let id = Uuid::now_v7();
        let entity = EntityRef::of("Portfolio", id).unwrap();
        assert_eq!(entity.kind.as_str(), "portfolio");
        assert_eq!(entity.id, id);
    }

    #[test]
    fn test_display() {
        let id = Uuid::nil();
        let entity = EntityRef::of("user", id).unwrap();
        assert_eq!(
            entity.to_string(),
            "user:00000000-0000-0000-0000-000000000000"
        );
    }

    #[test]
    fn test_ordering_is_kind_then_id() {
        let a = EntityRef::of("alpha", Uuid::nil()).unwrap();
        let b = EntityRef::of("beta", Uuid::nil()).unwrap();
        assert!(a < b);
    }
}
