use core::fmt;
use std::borrow::Borrow;
use std::collections::{HashMap, HashSet};
use std::ops::Deref;

use serde::{Deserialize, Serialize};

use crate::HnError;

/// Stable string identifier for a network entity (node, link or companion).
///
/// Ids are user-visible (`J1`, `P12`, `PU3`) and are what the solver input
/// format refers to, so they are kept as strings rather than arena indices.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Create an id, rejecting empty strings and whitespace (INP tokens are whitespace-separated).
    pub fn new(id: impl Into<String>) -> Result<Self, HnError> {
        let id = id.into();
        if id.is_empty() || id.chars().any(|c| c.is_whitespace() || c == ';') {
            return Err(HnError::InvalidId { id });
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split into alphabetic prefix and numeric suffix (`PU12` -> `("PU", 12)`).
    pub fn prefix_and_number(&self) -> Option<(&str, u32)> {
        let split = self.0.find(|c: char| c.is_ascii_digit())?;
        let (prefix, digits) = self.0.split_at(split);
        if prefix.is_empty() || !prefix.chars().all(|c| c.is_ascii_alphabetic()) {
            return None;
        }
        digits.parse().ok().map(|n| (prefix, n))
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Deref for EntityId {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for EntityId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for EntityId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for EntityId {
    type Error = HnError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Domain-specific ID aliases for clarity (no runtime cost).
pub type NodeId = EntityId;
pub type LinkId = EntityId;

/// Session-scoped id allocator.
///
/// Remembers every id it has ever seen, so an id that was issued (or
/// imported) and later deleted is never handed out or accepted again.
#[derive(Debug, Clone, Default)]
pub struct IdAllocator {
    /// Highest numeric suffix seen per prefix.
    counters: HashMap<String, u32>,
    spent: HashSet<EntityId>,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next free id for `prefix` (e.g. `"J"` -> `J7`).
    pub fn next(&mut self, prefix: &str) -> EntityId {
        let counter = self.counters.entry(prefix.to_string()).or_insert(0);
        loop {
            *counter += 1;
            let candidate = EntityId(format!("{prefix}{counter}"));
            if self.spent.insert(candidate.clone()) {
                return candidate;
            }
        }
    }

    /// Claim a caller-supplied id. Returns `false` if it was already used this session.
    pub fn claim(&mut self, id: &EntityId) -> bool {
        if !self.spent.insert(id.clone()) {
            return false;
        }
        if let Some((prefix, n)) = id.prefix_and_number() {
            let counter = self.counters.entry(prefix.to_string()).or_insert(0);
            *counter = (*counter).max(n);
        }
        true
    }

    pub fn is_spent(&self, id: &str) -> bool {
        self.spent.contains(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_id_rejects_whitespace() {
        assert!(EntityId::new("J 1").is_err());
        assert!(EntityId::new("").is_err());
        assert!(EntityId::new("J;1").is_err());
        assert_eq!(EntityId::new("J1").unwrap().as_str(), "J1");
    }

    #[test]
    fn prefix_and_number_split() {
        let id = EntityId::new("PU12").unwrap();
        assert_eq!(id.prefix_and_number(), Some(("PU", 12)));
        let odd = EntityId::new("pipe-7").unwrap();
        assert_eq!(odd.prefix_and_number(), None);
    }

    #[test]
    fn allocator_never_reuses() {
        let mut alloc = IdAllocator::new();
        let a = alloc.next("J");
        let b = alloc.next("J");
        assert_eq!(a.as_str(), "J1");
        assert_eq!(b.as_str(), "J2");
        // Re-claiming a spent id is refused even after the entity is gone
        assert!(!alloc.claim(&a));
    }

    #[test]
    fn allocator_skips_past_claimed_ids() {
        let mut alloc = IdAllocator::new();
        assert!(alloc.claim(&EntityId::new("P9").unwrap()));
        assert_eq!(alloc.next("P").as_str(), "P10");
        // Different prefixes count independently
        assert_eq!(alloc.next("PU").as_str(), "PU1");
    }
}
